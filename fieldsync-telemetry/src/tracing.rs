use std::path::PathBuf;
use std::sync::Once;

use serde::Deserialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

const LOG_FILE_PREFIX: &str = "fieldsync.log";

/// Output format for log lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Rolling file output next to stdout logging.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FileLogging {
    pub dir: PathBuf,
    #[serde(default)]
    pub rotation: LogRotation,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogRotation {
    #[default]
    Daily,
    Hourly,
    Never,
}

/// Logging settings for a binary.
#[derive(Clone, Debug, Default)]
pub struct TracingOptions {
    pub format: LogFormat,
    pub file: Option<FileLogging>,
    /// Directive used when `RUST_LOG` is not set.
    pub default_directive: Option<String>,
}

/// Keeps the non-blocking file writer alive. Dropping it flushes pending lines.
pub struct TracingGuard {
    _guards: Vec<WorkerGuard>,
}

/// Errors that can occur while installing the global subscriber.
#[derive(Debug)]
pub struct TracingInitError(String);

impl std::fmt::Display for TracingInitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to initialize tracing: {}", self.0)
    }
}

impl std::error::Error for TracingInitError {}

/// Installs the global tracing subscriber.
///
/// Logs go to stderr in the requested format and, when configured, to a rolling
/// file in `file.dir`. The filter is read from `RUST_LOG` and defaults to `info`.
pub fn init_tracing(options: TracingOptions) -> Result<TracingGuard, TracingInitError> {
    let default_directive = options.default_directive.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .map_err(|err| TracingInitError(err.to_string()))?;

    let mut guards = Vec::new();
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    layers.push(stdout_layer(options.format));

    if let Some(file) = &options.file {
        std::fs::create_dir_all(&file.dir).map_err(|err| {
            TracingInitError(format!(
                "log dir init failed for {}: {err}",
                file.dir.display()
            ))
        })?;

        let rotation = match file.rotation {
            LogRotation::Daily => tracing_appender::rolling::Rotation::DAILY,
            LogRotation::Hourly => tracing_appender::rolling::Rotation::HOURLY,
            LogRotation::Never => tracing_appender::rolling::Rotation::NEVER,
        };
        let appender = tracing_appender::rolling::RollingFileAppender::new(
            rotation,
            &file.dir,
            LOG_FILE_PREFIX,
        );
        let (writer, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);

        let layer: Box<dyn Layer<Registry> + Send + Sync> = match options.format {
            LogFormat::Pretty => Box::new(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true),
            ),
            LogFormat::Json => Box::new(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_target(true)
                    .with_current_span(true),
            ),
        };
        layers.push(layer);
    }

    layers.push(Box::new(filter));

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|err| TracingInitError(err.to_string()))?;

    Ok(TracingGuard { _guards: guards })
}

fn stdout_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Pretty => Box::new(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        ),
        LogFormat::Json => Box::new(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_current_span(true)
                .with_span_list(true),
        ),
    }
}

static TEST_TRACING: Once = Once::new();

/// Installs a test writer subscriber once per test binary.
///
/// Output is only shown for failing tests, unless `ENABLE_TRACING` is set.
pub fn init_test_tracing() {
    TEST_TRACING.call_once(|| {
        if std::env::var("ENABLE_TRACING").is_err() {
            return;
        }

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
