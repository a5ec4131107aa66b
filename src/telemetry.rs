//! Tracing setup.
//!
//! Log output goes to stdout, a rolling file, or both; the filter comes
//! from `RUST_LOG` with an `info` default.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Where log lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDestination {
    /// Pretty output on stdout only.
    Stdout,
    /// JSON lines into `logs/gravnet.log` only.
    File,
    /// Both of the above.
    Both,
}

impl LogDestination {
    /// Parse the `GRAVNET_LOG_DEST` value; unknown values fall back to
    /// stdout.
    pub fn from_env() -> Self {
        match std::env::var("GRAVNET_LOG_DEST").as_deref() {
            Ok("file") => Self::File,
            Ok("both") => Self::Both,
            _ => Self::Stdout,
        }
    }
}

/// Install the global subscriber. The returned guard must be held for the
/// lifetime of the process when a file destination is active, or buffered
/// lines are lost on exit.
pub fn init(destination: LogDestination) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match destination {
        LogDestination::Stdout => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            None
        }
        LogDestination::File => {
            let (writer, guard) = file_writer();
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
                .init();
            Some(guard)
        }
        LogDestination::Both => {
            let (writer, guard) = file_writer();
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
                .init();
            Some(guard)
        }
    }
}

fn file_writer() -> (tracing_appender::non_blocking::NonBlocking, WorkerGuard) {
    let appender = tracing_appender::rolling::daily("logs", "gravnet.log");
    tracing_appender::non_blocking(appender)
}
