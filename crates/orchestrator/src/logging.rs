use std::fs::OpenOptions;

use slog::{o, Drain, Level, Logger};

use crate::config::{LogConfig, LogMode};
use crate::error::OrchestratorError;

/// Build the root logger described by `config`.
pub fn setup_log(config: &LogConfig) -> Result<Logger, OrchestratorError> {
    let level = parse_level(&config.level)?;
    match config.mode {
        LogMode::StderrTerminal => {
            let decorator = slog_term::TermDecorator::new().stderr().build();
            let drain = slog_term::FullFormat::new(decorator).build().fuse();
            let drain = slog::LevelFilter::new(drain, level).fuse();
            let drain = slog_async::Async::new(drain).build().fuse();
            Ok(Logger::root(drain, o!("component" => "nfvo")))
        }
        LogMode::File => {
            let path = config
                .path
                .as_ref()
                .ok_or_else(|| OrchestratorError::config("log mode \"file\" requires a path"))?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    OrchestratorError::config(format!(
                        "error opening log file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
            let decorator = slog_term::PlainDecorator::new(file);
            let drain = slog_term::FullFormat::new(decorator).build().fuse();
            let drain = slog::LevelFilter::new(drain, level).fuse();
            let drain = slog_async::Async::new(drain).build().fuse();
            Ok(Logger::root(drain, o!("component" => "nfvo")))
        }
    }
}

/// A logger that drops everything; used by tests and embedders that do
/// their own reporting.
pub fn discard() -> Logger {
    Logger::root(slog::Discard, o!())
}

fn parse_level(name: &str) -> Result<Level, OrchestratorError> {
    match name.to_ascii_lowercase().as_str() {
        "trace" => Ok(Level::Trace),
        "debug" => Ok(Level::Debug),
        "info" => Ok(Level::Info),
        "warn" | "warning" => Ok(Level::Warning),
        "error" => Ok(Level::Error),
        "crit" | "critical" => Ok(Level::Critical),
        other => Err(OrchestratorError::config(format!(
            "unknown log level '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names() {
        assert_eq!(parse_level("INFO").unwrap(), Level::Info);
        assert_eq!(parse_level("warn").unwrap(), Level::Warning);
        assert!(parse_level("loud").is_err());
    }

    #[test]
    fn file_mode_without_path_is_rejected() {
        let config = LogConfig {
            level: "info".into(),
            mode: LogMode::File,
            path: None,
        };
        assert!(setup_log(&config).is_err());
    }

    #[test]
    fn file_mode_writes_to_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            level: "debug".into(),
            mode: LogMode::File,
            path: Some(dir.path().join("nfvo.log")),
        };
        let log = setup_log(&config).unwrap();
        slog::info!(log, "hello"; "nsr_id" => "abc");
        drop(log);
        assert!(dir.path().join("nfvo.log").exists());
    }
}
