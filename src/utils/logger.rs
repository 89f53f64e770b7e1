use std::path::PathBuf;

use once_cell::sync::OnceCell;
use tracing_subscriber::{
    fmt, fmt::time::UtcTime, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::error::{AppError, AppResult};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();
static LOGGER_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

const DEFAULT_LOG_DIRECTIVES: &str =
    "info,app::scheduler=debug,app::recurrence=info,app::dependency=info,app::config=info";
const LOG_FILE_PREFIX: &str = "dayplan.log";

#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// Directory for the daily rolling log file; console only when unset
    pub log_dir: Option<PathBuf>,
    /// Filter directives used when `RUST_LOG` is not set
    pub directives: Option<String>,
}

/// Install the global subscriber once. Later calls are no-ops.
pub fn init_logging(config: &LoggingConfig) -> AppResult<()> {
    LOGGER_INIT
        .get_or_try_init(|| {
            let directives = config
                .directives
                .as_deref()
                .unwrap_or(DEFAULT_LOG_DIRECTIVES);
            let env_filter = EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(directives))
                .map_err(|err| AppError::other(format!("invalid log directives: {err}")))?;

            let (file_layer, guard) = match &config.log_dir {
                Some(log_dir) => {
                    std::fs::create_dir_all(log_dir)?;
                    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
                    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                    let layer = fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true)
                        .with_timer(UtcTime::rfc_3339());
                    (Some(layer), Some(guard))
                }
                None => (None, None),
            };

            tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_timer(UtcTime::rfc_3339()),
                )
                .try_init()
                .map_err(|err| AppError::other(format!("failed to install logger: {err}")))?;

            if let Some(guard) = guard {
                LOGGER_GUARD
                    .set(guard)
                    .map_err(|_| AppError::other("logger already initialized"))?;
            }

            Ok(())
        })
        .map(|_| ())
}
