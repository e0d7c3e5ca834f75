//! Per-stage loggers.
//!
//! Every stage run gets its own [`StageLogger`]: a private `tracing`
//! dispatcher with a console layer and, when a log directory is set, a file
//! layer writing `<log_dir>/<stage>_<YYYYmmdd_HHMMSS>.log`. Nothing is
//! installed globally, so two stages never share a log stream.

use std::future::Future;
use std::path::{Path, PathBuf};

use tracing::Dispatch;
use tracing::instrument::{Instrument, WithSubscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};
use uuid::Uuid;

use almanac_shared::{AlmanacError, Result, Stage};

/// Default filter when neither `RUST_LOG` nor `-v` says otherwise.
pub const DEFAULT_FILTER: &str = "almanac=info";

/// Line format for console and file output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// How stage loggers are built.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// `EnvFilter` directives, e.g. `almanac=debug`.
    pub filter: String,
    pub format: LogFormat,
    /// Directory for per-stage log files. `None` logs to the console only.
    pub log_dir: Option<PathBuf>,
    /// Mirror events to stderr.
    pub console: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::Text,
            log_dir: None,
            console: true,
        }
    }
}

type BoxedLayer = Box<dyn Layer<Layered<EnvFilter, Registry>> + Send + Sync>;

/// Logger scoped to one stage run.
pub struct StageLogger {
    stage: Stage,
    run_id: Uuid,
    dispatch: Dispatch,
    log_path: Option<PathBuf>,
    // Flushes the file writer on drop.
    _guard: Option<WorkerGuard>,
}

impl StageLogger {
    pub fn new(stage: Stage, settings: &LogSettings) -> Result<Self> {
        let filter = EnvFilter::try_new(&settings.filter).map_err(|e| {
            AlmanacError::config(format!("invalid log filter '{}': {e}", settings.filter))
        })?;

        let mut layers: Vec<BoxedLayer> = Vec::new();

        if settings.console {
            let console = fmt::layer().with_target(false).with_writer(std::io::stderr);
            layers.push(match settings.format {
                LogFormat::Text => console.boxed(),
                LogFormat::Json => console.json().boxed(),
            });
        }

        let mut log_path = None;
        let mut guard = None;
        if let Some(dir) = &settings.log_dir {
            std::fs::create_dir_all(dir).map_err(|e| AlmanacError::io(dir, e))?;
            let file_name = format!(
                "{}_{}.log",
                stage,
                chrono::Local::now().format("%Y%m%d_%H%M%S")
            );
            let appender = tracing_appender::rolling::never(dir, &file_name);
            let (writer, file_guard) = tracing_appender::non_blocking(appender);

            let file = fmt::layer().with_ansi(false).with_writer(writer);
            layers.push(match settings.format {
                LogFormat::Text => file.boxed(),
                LogFormat::Json => file.json().boxed(),
            });
            log_path = Some(dir.join(file_name));
            guard = Some(file_guard);
        }

        let subscriber = Registry::default().with(filter).with(layers);

        Ok(Self {
            stage,
            run_id: Uuid::now_v7(),
            dispatch: Dispatch::new(subscriber),
            log_path,
            _guard: guard,
        })
    }

    /// A logger that drops every event.
    pub fn silent(stage: Stage) -> Self {
        Self {
            stage,
            run_id: Uuid::now_v7(),
            dispatch: Dispatch::none(),
            log_path: None,
            _guard: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// File this logger appends to, if any.
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// Run `fut` with this logger as its subscriber, inside a span naming
    /// the stage and run id.
    pub async fn scope<F: Future>(&self, fut: F) -> F::Output {
        let span = tracing::dispatcher::with_default(&self.dispatch, || {
            tracing::info_span!("stage", stage = %self.stage, run_id = %self.run_id)
        });
        fut.instrument(span)
            .with_subscriber(self.dispatch.clone())
            .await
    }
}
