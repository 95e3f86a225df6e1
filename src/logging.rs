use log::LevelFilter;
use simplelog::*;
use std::fs::{self, File, OpenOptions};
use std::io::{Error, ErrorKind};
use std::path::PathBuf;
use std::sync::Once;

static INIT: Once = Once::new();

/// Log directory under the user's home.
pub fn log_dir() -> Result<PathBuf, Error> {
    let home = std::env::var("HOME")
        .map_err(|_| Error::new(ErrorKind::NotFound, "HOME environment variable not set"))?;

    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("rowsyncrs")
        .join("logs"))
}

pub fn log_file_name() -> String {
    format!("rowsyncrs-{}.log", chrono::Local::now().format("%Y%m%d"))
}

fn open_log_file() -> Result<File, Error> {
    let dir = log_dir()?;
    fs::create_dir_all(&dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(log_file_name()))
}

/// Writes to a dated file; falls back to stderr via `env_logger` when the
/// log directory is unusable. Only the first call has any effect.
pub fn init_logger(level: LevelFilter) -> Result<(), Error> {
    let mut result = Ok(());

    INIT.call_once(|| {
        result = match open_log_file() {
            Ok(log_file) => {
                let config = ConfigBuilder::new()
                    .set_thread_level(LevelFilter::Debug)
                    .build();
                CombinedLogger::init(vec![WriteLogger::new(level, config, log_file)])
                    .map_err(|e| Error::new(ErrorKind::Other, e))
            }
            Err(e) => {
                eprintln!("File logging unavailable ({}), logging to stderr", e);
                env_logger::Builder::new()
                    .filter_level(level)
                    .try_init()
                    .map_err(|e| Error::new(ErrorKind::Other, e))
            }
        };
    });

    result
}
