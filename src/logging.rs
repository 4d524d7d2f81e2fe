use std::env;

use crate::config::AppConfig;

/// Initializes tracing using the configured log level as the default filter.
///
/// `RUST_LOG` overrides the configured level when set. Safe to call more
/// than once; later calls are no-ops.
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::fmt;

    let default_directive = format!("storefront_carts={}", config.log_level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if config.log_json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}
