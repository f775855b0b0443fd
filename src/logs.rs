//! Timestamped append-only record logs.
//!
//! Two independent files: the control log (process lifecycle, warnings,
//! errors; also the backend of the [log] facade) and the data log (one
//! record per forwarded trap). Records are lists of lines: the first
//! line carries a fixed-width timestamp, continuation lines carry
//! matching padding. Logging never propagates failures to callers; a
//! record that cannot be written goes to stderr instead.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use log::{Level, LevelFilter, Log, Metadata, Record};

/// Default control log file name, in the working directory.
pub const CONTROL_LOG_FILE: &str = "traplicator.log";
/// Default data log file name, in the working directory.
pub const DATA_LOG_FILE: &str = "traplicator-data.log";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S:%6f";
// As wide as the rendered timestamp, so continuation lines align.
const CONTINUATION_PAD: &str = "                          ";

/// An append-only record log.
///
/// Cloning shares the mutex, so clones serialize against each other. The
/// file is opened per record; there is nothing to flush or rotate.
#[derive(Debug, Clone)]
pub struct Sink {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl Sink {
    pub fn new(path: impl Into<PathBuf>) -> Sink {
        Sink {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Build the control and data sinks together. If both paths resolve
    /// to the same file the sinks share one mutex, so records from the
    /// two never interleave within a line.
    pub fn pair(control: impl Into<PathBuf>, data: impl Into<PathBuf>) -> (Sink, Sink) {
        let control = Sink::new(control);
        let data_path: PathBuf = data.into();
        let data = if canonical(&control.path) == canonical(&data_path) {
            Sink {
                path: data_path,
                lock: Arc::clone(&control.lock),
            }
        } else {
            Sink::new(data_path)
        };
        (control, data)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. Items are split on embedded newlines; every
    /// line is left-trimmed.
    pub fn append<I, S>(&self, record: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        let mut text = String::new();
        let mut first = true;
        for item in record {
            for line in item.as_ref().split('\n') {
                text.push_str(if first { &timestamp } else { CONTINUATION_PAD });
                first = false;
                text.push_str(" :: ");
                text.push_str(line.trim_start());
                text.push_str(" \n");
            }
        }

        if let Err(err) = self.write(&text) {
            eprintln!("ERROR: Logging failed - this may or may not be critical");
            eprintln!("{err}");
            eprint!("{text}");
        }
    }

    fn write(&self, text: &str) -> io::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(text.as_bytes())
    }
}

// Canonicalize the parent directory and reattach the file name, so
// unequal spellings of the same file compare equal even before the file
// exists.
fn canonical(path: &Path) -> PathBuf {
    let Some(file_name) = path.file_name() else {
        return path.to_path_buf();
    };
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.canonicalize().ok(),
        _ => std::env::current_dir().ok(),
    };
    match parent {
        Some(dir) => dir.join(file_name),
        None => path.to_path_buf(),
    }
}

/// Write a fatal bootstrap record. The caller exits non-zero afterwards.
pub fn fatal(sink: &Sink, message: &str) {
    sink.append(prefixed_lines("FATALERROR: ", message));
}

fn prefixed_lines(prefix: &str, message: &str) -> Vec<String> {
    message
        .split('\n')
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                format!("{prefix}{line}")
            } else {
                line.to_string()
            }
        })
        .collect()
}

struct ControlLogger {
    sink: Sink,
}

impl Log for ControlLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Info
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let prefix = match record.level() {
            Level::Error => "ERROR: ",
            Level::Warn => "WARNING: ",
            _ => "",
        };
        self.sink
            .append(prefixed_lines(prefix, &record.args().to_string()));
    }

    fn flush(&self) {}
}

/// Install the control sink as the backend of the [log] facade.
pub fn init(sink: Sink) -> Result<(), log::SetLoggerError> {
    log::set_boxed_logger(Box::new(ControlLogger { sink }))?;
    log::set_max_level(LevelFilter::Info);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn record_format() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Sink::new(dir.path().join("control.log"));
        sink.append(["first line", "  second line"]);

        let text = fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        // 26-column timestamp, then separator, then the trimmed line.
        assert_eq!(&lines[0][26..], " :: first line ");
        assert_eq!(lines[1], format!("{CONTINUATION_PAD} :: second line "));
        assert_eq!(lines[0].as_bytes()[4], b'-');
        assert_eq!(lines[0].as_bytes()[19], b':');
    }

    #[test]
    fn embedded_newlines_become_continuations() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Sink::new(dir.path().join("control.log"));
        sink.append(["a\nb\nc"]);

        let text = fs::read_to_string(sink.path()).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert_eq!(text.matches(" :: ").count(), 3);
    }

    #[test]
    fn records_append() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Sink::new(dir.path().join("control.log"));
        sink.append(["one"]);
        sink.append(["two"]);

        let text = fs::read_to_string(sink.path()).unwrap();
        assert!(text.contains(":: one"));
        assert!(text.contains(":: two"));
    }

    #[test]
    fn aliased_paths_share_the_mutex() {
        let dir = tempfile::tempdir().unwrap();
        let spelled_plain = dir.path().join("both.log");
        let spelled_dotted = dir.path().join(".").join("both.log");
        let (control, data) = Sink::pair(spelled_plain, spelled_dotted);
        assert!(Arc::ptr_eq(&control.lock, &data.lock));
    }

    #[test]
    fn distinct_paths_do_not_share() {
        let dir = tempfile::tempdir().unwrap();
        let (control, data) = Sink::pair(dir.path().join("a.log"), dir.path().join("b.log"));
        assert!(!Arc::ptr_eq(&control.lock, &data.lock));
    }

    #[test]
    fn fatal_records_are_prefixed() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Sink::new(dir.path().join("control.log"));
        fatal(&sink, "unable to parse config file\nbad things");

        let text = fs::read_to_string(sink.path()).unwrap();
        assert!(text.contains(":: FATALERROR: unable to parse config file"));
        assert!(text.contains(":: bad things"));
    }
}
