//! Process logging.
//!
//! stdout carries IPC responses, so log output goes to stderr, or to rotating
//! files when a log directory is configured. Events carry counts and codes only,
//! never marks or personal fields.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

pub const LEVEL_ENV: &str = "RECORDBOOKD_LOG";
pub const DIR_ENV: &str = "RECORDBOOKD_LOG_DIR";

const LOG_FILE_BASENAME: &str = "recordbookd";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 5 * 1024 * 1024;
const MAX_LOG_FILES: usize = 3;

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();

struct LoggingState {
    level: &'static str,
    log_dir: Option<PathBuf>,
    _handle: LoggerHandle,
}

fn normalize_level(level: &str) -> Result<&'static str, String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "" | "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        "off" => Ok("off"),
        other => Err(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error|off"
        )),
    }
}

/// Starts the global logger once. Repeating the same configuration is a no-op;
/// a different one is refused.
pub fn init_logging(level: &str, log_dir: Option<&Path>) -> Result<(), String> {
    let level = normalize_level(level)?;
    let log_dir = log_dir.map(Path::to_path_buf);

    let state = LOGGING_STATE.get_or_try_init(|| -> Result<LoggingState, String> {
        let logger = Logger::try_with_str(level)
            .map_err(|e| format!("invalid log level `{level}`: {e}"))?;
        let logger = match &log_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|e| {
                    format!("failed to create log directory `{}`: {e}", dir.display())
                })?;
                logger
                    .log_to_file(
                        FileSpec::default()
                            .directory(dir.as_path())
                            .basename(LOG_FILE_BASENAME),
                    )
                    .rotate(
                        Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
                        Naming::Numbers,
                        Cleanup::KeepLogFiles(MAX_LOG_FILES),
                    )
                    .append()
                    .format_for_files(flexi_logger::detailed_format)
                    .write_mode(WriteMode::BufferAndFlush)
            }
            None => logger.log_to_stderr(),
        };
        let handle = logger
            .start()
            .map_err(|e| format!("failed to start logger: {e}"))?;
        log::info!(
            "event=start version={} level={}",
            env!("CARGO_PKG_VERSION"),
            level
        );
        Ok(LoggingState {
            level,
            log_dir: log_dir.clone(),
            _handle: handle,
        })
    })?;

    if state.level != level || state.log_dir != log_dir {
        return Err(format!(
            "logging already initialized with level `{}`; refusing to reconfigure",
            state.level
        ));
    }
    Ok(())
}

/// Reads `RECORDBOOKD_LOG` / `RECORDBOOKD_LOG_DIR`.
pub fn init_from_env() -> Result<(), String> {
    let level = std::env::var(LEVEL_ENV).unwrap_or_default();
    let dir = std::env::var(DIR_ENV)
        .ok()
        .filter(|d| !d.trim().is_empty())
        .map(PathBuf::from);
    init_logging(&level, dir.as_deref())
}
