use anyhow::Context;
use configuration::{LogFormat, LoggingSettings};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

const LOG_FILE_PREFIX: &str = "ledger.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Installs the global subscriber.
///
/// Console output goes through the progress-bar layer so bars are redrawn below
/// log lines. `RUST_LOG` wins over the configured level. The returned guard
/// flushes the log file and must live until the program exits.
pub fn init(settings: &LoggingSettings, format: LogFormat) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .with_context(|| format!("Invalid log level '{}'", settings.level))?;

    let indicatif_layer = IndicatifLayer::new();
    let mut layers: Vec<BoxedLayer> = vec![console_layer(format, indicatif_layer.get_stderr_writer())];

    let guard = match &settings.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(fmt::layer().with_ansi(false).with_writer(writer).boxed());
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .with(indicatif_layer)
        .try_init()
        .context("Failed to install the tracing subscriber")?;

    if let Some(directory) = &settings.directory {
        tracing::debug!(%directory, "Writing daily log files.");
    }
    Ok(guard)
}

fn console_layer<W>(format: LogFormat, writer: W) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_target(false).with_writer(writer);
    match format {
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Full => layer.boxed(),
    }
}
