//! Logging infrastructure
//!
//! Structured logging setup for both development and production:
//! console output always, plus an optional daily-rotating file appender.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the logging system
///
/// # Arguments
/// * `level` - default log level when `RUST_LOG` is unset (e.g. "info")
/// * `json_format` - JSON output (production) vs human-readable (development)
/// * `log_dir` - optional directory for daily-rotating file logs
pub fn init_logger(level: &str, json_format: bool, log_dir: Option<&str>) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(env_filter);

    match log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "fulfillment.log");
            if json_format {
                registry
                    .with(fmt::layer())
                    .with(fmt::layer().json().with_ansi(false).with_writer(file_appender))
                    .try_init()?;
            } else {
                registry
                    .with(fmt::layer())
                    .with(fmt::layer().with_ansi(false).with_writer(file_appender))
                    .try_init()?;
            }
        }
        None => {
            if json_format {
                registry.with(fmt::layer().json()).try_init()?;
            } else {
                registry.with(fmt::layer()).try_init()?;
            }
        }
    }

    Ok(())
}
