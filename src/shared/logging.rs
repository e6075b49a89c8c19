//! Tracing setup: human-readable stderr output plus a plain log file the
//! HTTP `/logs` route tails.
//!
//! The log file is size-capped: once it would grow past [`MAX_LOG_BYTES`] it
//! is renamed to `<name>.1` (replacing the previous backup) and a new file is
//! started.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Size at which the log file is rotated.
pub const MAX_LOG_BYTES: u64 = 5 * 1024 * 1024;

/// Append-only log file that rotates itself when it reaches `max_bytes`.
pub struct RotatingFile {
    path: PathBuf,
    file: File,
    len: u64,
    max_bytes: u64,
}

impl RotatingFile {
    pub fn open(path: &Path, max_bytes: u64) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let len = file.metadata()?.len();
        let mut me = Self {
            path: path.to_path_buf(),
            file,
            len,
            max_bytes,
        };
        if me.len >= max_bytes {
            me.rotate()?;
        }
        Ok(me)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        fs::rename(&self.path, backup_path(&self.path))?;
        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.len = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.len > 0 && self.len + buf.len() as u64 > self.max_bytes {
            // Keep writing to the current file if the rename fails.
            if let Err(e) = self.rotate() {
                eprintln!("log rotation failed for {}: {}", self.path.display(), e);
            }
        }
        let n = self.file.write(buf)?;
        self.len += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// `<log>.1`, the single kept backup.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".1");
    PathBuf::from(name)
}

/// Install the global subscriber. `RUST_LOG` overrides the default `info` level.
///
/// When the log file cannot be opened, logging continues on stderr only and
/// the error is returned so the caller can report it.
pub fn init(log_path: &Path) -> io::Result<()> {
    let file = RotatingFile::open(log_path, MAX_LOG_BYTES);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let stderr = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match file {
        Ok(f) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(f)),
                )
                .init();
            Ok(())
        }
        Err(e) => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            Err(e)
        }
    }
}

/// Last `n` lines of the log file plus the file's total line count.
/// A missing file reads as empty. The file is bounded by [`MAX_LOG_BYTES`].
pub fn recent_lines(log_path: &Path, n: usize) -> io::Result<(Vec<String>, usize)> {
    let file = match File::open(log_path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
        Err(e) => return Err(e),
    };
    let mut tail = std::collections::VecDeque::with_capacity(n);
    let mut total = 0;
    for line in BufReader::new(file).lines() {
        let line = line?;
        total += 1;
        if tail.len() == n {
            tail.pop_front();
        }
        if n > 0 {
            tail.push_back(line);
        }
    }
    Ok((tail.into_iter().collect(), total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_lines_keeps_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let mut f = std::fs::File::create(&path).unwrap();
        for i in 1..=60 {
            writeln!(f, "line {}", i).unwrap();
        }
        let (lines, total) = recent_lines(&path, 50).unwrap();
        assert_eq!(total, 60);
        assert_eq!(lines.len(), 50);
        assert_eq!(lines[0], "line 11");
        assert_eq!(lines[49], "line 60");
    }

    #[test]
    fn test_missing_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (lines, total) = recent_lines(&dir.path().join("none.log"), 50).unwrap();
        assert!(lines.is_empty());
        assert_eq!(total, 0);
    }

    #[test]
    fn test_rotates_when_cap_is_reached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedpilot.log");
        let mut log = RotatingFile::open(&path, 100).unwrap();

        let line = format!("{}\n", "a".repeat(59));
        log.write_all(line.as_bytes()).unwrap();
        log.write_all(line.as_bytes()).unwrap();
        log.write_all(line.as_bytes()).unwrap();
        log.flush().unwrap();

        assert_eq!(std::fs::read_to_string(backup_path(&path)).unwrap(), line);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), line);
    }

    #[test]
    fn test_oversized_file_is_rotated_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedpilot.log");
        std::fs::write(&path, "x".repeat(200)).unwrap();

        let mut log = RotatingFile::open(&path, 100).unwrap();
        writeln!(log, "fresh").unwrap();

        assert_eq!(std::fs::metadata(backup_path(&path)).unwrap().len(), 200);
        let (lines, total) = recent_lines(&path, 50).unwrap();
        assert_eq!(total, 1);
        assert_eq!(lines, vec!["fresh"]);
    }
}
