use std::fs::File;
use std::path::PathBuf;
use thiserror::Error;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{self},
    prelude::*,
};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Could not open log file '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("A global tracing subscriber is already installed")]
    AlreadyInitialized,
}

pub fn level_for(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::OFF;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the global subscriber: compact output on stderr and, when
/// `log_file` is given, a plain copy of every event in that file.
pub fn init(verbosity: u8, quiet: bool, log_file: Option<PathBuf>) -> Result<(), LoggingError> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact();

    let subscriber = tracing_subscriber::registry()
        .with(level_for(verbosity, quiet))
        .with(stderr_layer);

    if let Some(path) = log_file {
        let file = File::create(&path).map_err(|source| LoggingError::Io { path, source })?;
        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_target(true);

        subscriber
            .with(file_layer)
            .try_init()
            .map_err(|_| LoggingError::AlreadyInitialized)
    } else {
        subscriber.try_init().map_err(|_| LoggingError::AlreadyInitialized)
    }
}

#[cfg(test)]
mod logging_tests {
    use super::*;
    use serial_test::serial;
    use tracing::{debug, info};

    #[test]
    fn test_levels() {
        assert_eq!(level_for(0, false), LevelFilter::WARN);
        assert_eq!(level_for(1, false), LevelFilter::INFO);
        assert_eq!(level_for(2, false), LevelFilter::DEBUG);
        assert_eq!(level_for(9, false), LevelFilter::TRACE);
        assert_eq!(level_for(3, true), LevelFilter::OFF);
    }

    #[test]
    #[serial]
    fn test_file_layer_receives_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search.log");
        let file = File::create(&path).unwrap();
        let subscriber = tracing_subscriber::registry().with(fmt::layer().with_writer(file).with_ansi(false));

        tracing::subscriber::with_default(subscriber, || {
            debug!(evals = 12, "simplex step");
        });

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("simplex step"));
        assert!(content.contains("DEBUG"));
    }

    #[test]
    #[serial]
    fn test_second_init_is_rejected() {
        let _ = init(0, true, None);
        assert!(matches!(init(0, true, None), Err(LoggingError::AlreadyInitialized)));
        info!("still usable");
    }

    #[test]
    #[serial]
    fn test_unwritable_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = init(0, true, Some(dir.path().to_path_buf()));
        assert!(matches!(result, Err(LoggingError::Io { .. })));
    }
}
