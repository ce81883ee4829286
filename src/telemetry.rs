use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogLevel;

/// Initialize tracing. `RUST_LOG` wins over the configured level.
pub fn init_tracing(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{},kaitori_tracker={}", level.as_filter(), level.as_filter()).into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
