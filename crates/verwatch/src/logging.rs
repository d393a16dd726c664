use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use verwatch_platform::AppPaths;

/// Append-only handle on `verwatch.log`.
///
/// The file is opened again whenever it has disappeared, so deleting the log
/// while `watch` runs only loses the lines written before the deletion.
/// `WriteLogger` serializes access, so no locking happens here.
struct LogFile {
    path: PathBuf,
    file: Option<File>,
}

impl LogFile {
    fn open(path: PathBuf) -> io::Result<Self> {
        let file = append_to(&path)?;
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    fn current(&mut self) -> io::Result<&mut File> {
        if self.file.is_none() || !self.path.exists() {
            if let Some(dir) = self.path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            self.file = Some(append_to(&self.path)?);
        }
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("log file not open"))
    }
}

fn append_to(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl Write for LogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.current()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// The newest whole lines of `contents` that fit in `budget` bytes.
fn retained_tail(contents: &[u8], budget: usize) -> &[u8] {
    if contents.len() <= budget {
        return contents;
    }
    let cut = contents.len() - budget;
    if contents[cut - 1] == b'\n' {
        return &contents[cut..];
    }
    match contents[cut..].iter().position(|&byte| byte == b'\n') {
        Some(newline) => &contents[cut + newline + 1..],
        None => &[],
    }
}

/// Shrink the log to half of `max_size` once it grows past `max_size`.
/// Returns whether anything was dropped.
fn shrink_log(path: &Path, max_size: u64) -> io::Result<bool> {
    let size = match std::fs::metadata(path) {
        Ok(metadata) => metadata.len(),
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(error) => return Err(error),
    };
    if size <= max_size {
        return Ok(false);
    }

    let contents = std::fs::read(path)?;
    let budget = usize::try_from(max_size / 2).unwrap_or(usize::MAX);
    std::fs::write(path, retained_tail(&contents, budget))?;
    Ok(true)
}

/// Stderr shows warnings and errors, plus debug output when enabled. The log
/// file takes everything the global level lets through.
fn terminal_level(debug_enabled: bool) -> LevelFilter {
    if debug_enabled {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    }
}

fn log_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("verwatch")
        .build()
}

pub fn init_logging(paths: &AppPaths, debug_enabled: bool, max_log_size: u64) {
    let dirs = paths.ensure_dirs();
    let log_path = paths.log_file();
    let shrunk = shrink_log(&log_path, max_log_size);
    let log_file = dirs.and_then(|()| LogFile::open(log_path.clone()));

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::with_capacity(2);
    loggers.push(TermLogger::new(
        terminal_level(debug_enabled),
        log_config(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    ));
    let file_error = match log_file {
        Ok(file) => {
            loggers.push(WriteLogger::new(LevelFilter::Debug, log_config(), file));
            None
        }
        Err(error) => Some(error),
    };
    let _ = CombinedLogger::init(loggers);
    set_debug_logging(debug_enabled);

    if let Some(error) = file_error {
        log::warn!("Logging to stderr only, {} unavailable: {error}", log_path.display());
    }
    match shrunk {
        Ok(true) => log::debug!(
            "Trimmed {} to stay under {max_log_size} bytes",
            log_path.display()
        ),
        Ok(false) => {}
        Err(error) => log::warn!("Could not trim {}: {error}", log_path.display()),
    }
    log::debug!("Debug logging enabled, log file: {}", log_path.display());
}

/// Debug output when enabled, otherwise informational and above.
pub fn set_debug_logging(enabled: bool) {
    log::set_max_level(if enabled {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use simplelog::LevelFilter;

    use super::{LogFile, retained_tail, set_debug_logging, shrink_log, terminal_level};

    #[test]
    fn log_file_is_recreated_after_deletion() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let log_dir = temp_dir.path().join("data");
        let log_path = log_dir.join("verwatch.log");
        std::fs::create_dir_all(&log_dir).expect("log dir");
        let mut log = LogFile::open(log_path.clone()).expect("log file should open");

        log.write_all(b"poller started\n").expect("first write");
        std::fs::remove_dir_all(&log_dir).expect("log dir should be removable");
        log.write_all(b"update found\n")
            .expect("write after deletion should recreate the file");

        assert_eq!(
            std::fs::read_to_string(&log_path).expect("recreated log"),
            "update found\n"
        );
    }

    #[test]
    fn tail_starts_on_a_line_boundary() {
        let contents = b"check-1\ncheck-2\ncheck-3\n";

        assert_eq!(retained_tail(contents, 100), contents);
        assert_eq!(retained_tail(contents, 16), b"check-2\ncheck-3\n");
        assert_eq!(retained_tail(contents, 12), b"check-3\n");
        assert_eq!(retained_tail(contents, 4), b"");
    }

    #[test]
    fn oversized_log_is_shrunk_to_half() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let log_path = temp_dir.path().join("verwatch.log");
        std::fs::write(&log_path, "check-1\ncheck-2\ncheck-3\ncheck-4\n")
            .expect("test log file should be written");

        assert!(shrink_log(&log_path, 20).expect("shrink should succeed"));

        assert_eq!(
            std::fs::read_to_string(&log_path).expect("log should be readable"),
            "check-4\n"
        );
    }

    #[test]
    fn small_or_missing_log_is_left_alone() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let log_path = temp_dir.path().join("verwatch.log");
        assert!(!shrink_log(&log_path, 1024).expect("missing log is fine"));

        std::fs::write(&log_path, "check-1\n").expect("test log file should be written");
        assert!(!shrink_log(&log_path, 1024).expect("small log is fine"));

        assert_eq!(
            std::fs::read_to_string(&log_path).expect("log should be readable"),
            "check-1\n"
        );
    }

    #[test]
    fn warnings_reach_stderr_without_debug_logging() {
        assert_eq!(terminal_level(false), LevelFilter::Warn);
        assert_eq!(terminal_level(true), LevelFilter::Debug);
    }

    #[test]
    fn debug_flag_switches_global_level() {
        set_debug_logging(true);
        assert_eq!(log::max_level(), log::LevelFilter::Debug);

        set_debug_logging(false);
        assert_eq!(log::max_level(), log::LevelFilter::Info);
    }
}
