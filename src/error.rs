//! Error taxonomy for the ingestion pipeline and the Read API.
//!
//! Severity follows how each error is consumed:
//! - `ConfigError` is fatal at startup
//! - `FetchError` is retried per URL by the cycle
//! - `SkipReason` never leaves the aggregator, it only feeds counters
//! - `StoreError::Unavailable` is fatal on the first write of a cycle, per-record afterwards
//! - `SweepError` is logged and swallowed

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Failures while driving a page. All variants are retriable.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("navigation to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("invalid selector `{0}`")]
    Selector(String),

    #[error("browser engine error: {0}")]
    Engine(String),
}

/// Why a single row did not become an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkipReason {
    MissingModel,
    MissingCapacity,
    UnknownCapacity,
    MissingPrice,
    UnparsablePrice,
    PriceOutOfRange,
    UnknownModel,
    InvalidCombination,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::MissingModel => "missing_model",
            SkipReason::MissingCapacity => "missing_capacity",
            SkipReason::UnknownCapacity => "unknown_capacity",
            SkipReason::MissingPrice => "missing_price",
            SkipReason::UnparsablePrice => "unparsable_price",
            SkipReason::PriceOutOfRange => "price_out_of_range",
            SkipReason::UnknownModel => "unknown_model",
            SkipReason::InvalidCombination => "invalid_combination",
        }
    }

    /// Parse errors come from DOM shape; validation errors from catalog and range checks.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SkipReason::UnknownCapacity
                | SkipReason::PriceOutOfRange
                | SkipReason::UnknownModel
                | SkipReason::InvalidCombination
        )
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),

    #[error("write conflict on {0}")]
    WriteConflict(String),

    #[error("document store error: {0}")]
    Backend(String),

    #[error("stored document could not be decoded: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("could not list expired history: {0}")]
    Listing(#[source] StoreError),
}

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("object store io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("object could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Offline reset-and-reload failures. Validation happens before any wipe.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("could not read snapshot {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid snapshot entry {series} {capacity}: {reason}")]
    InvalidEntry {
        series: String,
        capacity: String,
        reason: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Fatal outcomes of a cycle. Everything else degrades into the summary.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("storage unavailable on first write: {0}")]
    StorageUnavailable(#[source] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
