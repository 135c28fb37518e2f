use directories::ProjectDirs;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;

pub const LOG_FILE_NAME: &str = "daily.log";

/// Where log lines are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    Stderr,
    File(PathBuf),
}

impl LogSink {
    /// `daily.log` in the platform cache dir; stderr if there is no home directory.
    pub fn browse_default() -> Self {
        ProjectDirs::from("", "", "daily")
            .map(|dirs| LogSink::File(dirs.cache_dir().join(LOG_FILE_NAME)))
            .unwrap_or(LogSink::Stderr)
    }
}

#[derive(Debug)]
pub enum LoggingError {
    Directive { directive: String, source: ParseError },
    LogFile { path: PathBuf, source: io::Error },
    AlreadyInstalled(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoggingError::Directive { directive, .. } => write!(
                f,
                "'{}' is not a valid log level (try warn, info, debug or daily=debug)",
                directive
            ),
            LoggingError::LogFile { path, .. } => {
                write!(f, "cannot open log file {}", path.display())
            }
            LoggingError::AlreadyInstalled(err) => write!(f, "logger already installed: {err}"),
        }
    }
}

impl std::error::Error for LoggingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoggingError::Directive { source, .. } => Some(source),
            LoggingError::LogFile { source, .. } => Some(source),
            LoggingError::AlreadyInstalled(err) => Some(&**err),
        }
    }
}

/// `RUST_LOG` wins over the configured level.
pub fn filter_for(log_level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(log_level).map_err(|source| LoggingError::Directive {
        directive: log_level.to_string(),
        source,
    })
}

fn open_log_file(path: &Path) -> Result<File, LoggingError> {
    let log_file_error = |source| LoggingError::LogFile {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(log_file_error)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(log_file_error)
}

pub fn init(log_level: &str, sink: &LogSink) -> Result<(), LoggingError> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter_for(log_level)?)
        .with_target(false)
        .compact();

    let installed = match sink {
        LogSink::Stderr => builder.with_writer(io::stderr).try_init(),
        LogSink::File(path) => builder
            .with_ansi(false)
            .with_writer(Mutex::new(open_log_file(path)?))
            .try_init(),
    };
    installed.map_err(LoggingError::AlreadyInstalled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_rejects_invalid_level() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let err = filter_for("daily=loud").unwrap_err();
        assert!(err.to_string().contains("daily=loud"));
    }

    #[test]
    fn test_accepts_directives() {
        assert!(filter_for("info").is_ok());
        assert!(filter_for("daily=debug,reqwest=warn").is_ok());
    }

    #[test]
    fn test_log_file_created_with_parents_and_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(LOG_FILE_NAME);

        writeln!(open_log_file(&path).unwrap(), "first").unwrap();
        writeln!(open_log_file(&path).unwrap(), "second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_unopenable_log_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_log_file(dir.path()).unwrap_err();
        assert!(err.to_string().contains(&dir.path().display().to_string()));
    }
}
