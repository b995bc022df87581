//! Structured logging setup
//!
//! Logs go to stderr so they never interleave with the conversation on
//! stdout. The level is taken from `RUST_LOG`; by default only warnings are
//! shown, which keeps the console clean during normal use.
//!
//! ```text
//! RUST_LOG=echo_console=debug echo-console 2>echo.log
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset or invalid
const DEFAULT_FILTER: &str = "warn";

/// Initialize the tracing subsystem
///
/// # Arguments
/// * `service_name` - Name recorded in the startup event
pub fn init_tracing(service_name: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!(
        service = service_name,
        version = env!("CARGO_PKG_VERSION"),
        "Tracing initialized"
    );

    Ok(())
}
