//! Append-only run log.
//!
//! One line per experiment entry, flushed immediately so partial progress
//! survives a crash mid-run. The sink is explicitly owned by the runner
//! (opened at construction, closed on drop) rather than process-global
//! state, and each line is written as a single atomic append under a lock
//! so interleaved completion order from parallel workers cannot corrupt
//! individual entries.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::Result;

/// Append-only, per-entry-flushed result log.
#[derive(Debug)]
pub struct RunLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl RunLog {
    /// Open (or create) a run log in append mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(RunLog {
            path,
            file: Mutex::new(file),
        })
    }

    /// The log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a successful entry: `"<algorithm-name>: <result-summary>"`.
    pub fn append_success(&self, algorithm: &str, summary: &str) -> Result<()> {
        self.append_line(&format!("{algorithm}: {summary}"))
    }

    /// Record a failed entry: `"<algorithm-name> - Exception: <message>"`.
    pub fn append_failure(&self, algorithm: &str, message: &str) -> Result<()> {
        self.append_line(&format!("{algorithm} - Exception: {message}"))
    }

    fn append_line(&self, line: &str) -> Result<()> {
        let mut file = self.file.lock();
        writeln!(file, "{line}")?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_and_failure_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::open(dir.path().join("run.txt")).unwrap();

        log.append_success("ItemKNN", "MAP: 0.05").unwrap();
        log.append_failure("ScoreFusion", "component failed").unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "ItemKNN: MAP: 0.05");
        assert_eq!(lines[1], "ScoreFusion - Exception: component failed");
    }

    #[test]
    fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.txt");

        {
            let log = RunLog::open(&path).unwrap();
            log.append_success("A", "first run").unwrap();
        }
        {
            let log = RunLog::open(&path).unwrap();
            log.append_success("B", "second run").unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/result_all_algorithms.txt");
        let log = RunLog::open(&path).unwrap();
        log.append_success("A", "ok").unwrap();
        assert!(path.exists());
    }
}
