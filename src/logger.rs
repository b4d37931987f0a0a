use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

// Install the global subscriber, "RUST_LOG" overrides the default level
pub fn init_logging() {
    let level = if cfg!(debug_assertions) { "trace" } else { "info" };

    let (filter, from_env) = match EnvFilter::try_from_default_env() {
        Ok(f) => (f, true),
        Err(_) => (EnvFilter::new(format!("liquidfan={level}")), false),
    };

    let fmt_layer = fmt::layer().with_target(false);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .init();

    // Logged after init, otherwise nothing would receive it
    if !from_env {
        info!("\"RUST_LOG\" variable not set, defaulting to {level}");
    }
}
