//! Logging infrastructure
//!
//! - JSON file logging, rolled daily (for analysis)
//! - Console logging on stderr in verbose mode; stdout carries the story

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// File name prefix of the rolling log
pub const LOG_FILE: &str = "story_forge.log";

/// Keeps the file writer alive; drop it last
pub struct Telemetry {
    _file_guard: Option<WorkerGuard>,
}

impl Telemetry {
    /// Initialize logging into `log_dir`
    pub fn init(log_dir: PathBuf, verbose: bool) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&log_dir)?;

        let session_id = Uuid::new_v4();

        let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE);
        let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);

        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if verbose {
                EnvFilter::new("debug,hyper=info,reqwest=info,h2=info,rustls=info")
            } else {
                EnvFilter::new("info,hyper=warn,reqwest=warn,h2=warn,rustls=warn")
            }
        });

        if verbose {
            // Verbose mode: console + file
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_target(false)
                        .compact()
                        .with_writer(std::io::stderr),
                )
                .with(fmt::layer().json().with_writer(non_blocking))
                .try_init()
                .ok();
        } else {
            // Normal mode: file only (no console noise)
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(non_blocking))
                .try_init()
                .ok();
        }

        tracing::info!(
            session_id = %session_id,
            log_dir = %log_dir.display(),
            "Telemetry initialized"
        );

        Ok(Self {
            _file_guard: Some(file_guard),
        })
    }

    /// No subscriber, no files (for tests and `--no-log` runs)
    pub fn disabled() -> Self {
        Self {
            _file_guard: None,
        }
    }
}

/// Get the default log directory
pub fn default_log_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("story-forge").join("logs"))
        .unwrap_or_else(|| PathBuf::from(".story_forge_logs"))
}
