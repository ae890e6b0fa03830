use std::path::Path;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directives for the `asdfw` command, e.g. `ASDFW_LOG=asdfw=debug`.
pub const LOG_ENV: &str = "ASDFW_LOG";

/// When set, shim invocations append their logs to `<logs>/shim.<date>.log`.
pub const DEBUG_SHIM_ENV: &str = "ASDFW_DEBUG_SHIM";

/// Shim log files kept, one per day.
pub const SHIM_LOG_FILES: usize = 6;

fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)))
}

/// Logs to stderr. `ASDFW_LOG` wins over `-v`.
pub fn init_cli(verbosity: u8) {
    let _ = tracing_subscriber::registry()
        .with(filter(verbosity))
        .with(fmt::layer().without_time().with_target(false).with_writer(std::io::stderr))
        .try_init();
}

/// Daily `shim.<date>.log` files in `log_dir`; the oldest go once there are
/// more than [`SHIM_LOG_FILES`].
pub fn shim_appender(log_dir: &Path) -> Result<RollingFileAppender, InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("shim")
        .filename_suffix("log")
        .max_log_files(SHIM_LOG_FILES)
        .build(log_dir)
}

/// Shims stay silent unless `ASDFW_DEBUG_SHIM` is set: their stderr belongs
/// to the tool being run. Failing to open the log file is not an error.
pub fn init_shim(log_dir: &Path) {
    if std::env::var_os(DEBUG_SHIM_ENV).is_none() {
        return;
    }
    let Ok(appender) = shim_appender(log_dir) else {
        return;
    };
    let _ = tracing_subscriber::registry()
        .with(filter(2))
        .with(fmt::layer().with_ansi(false).with_writer(appender))
        .try_init();
}
