//! Durable record of combat lines.
//!
//! Lines are appended to a text file, each batch after a blank line and a
//! `[timestamp]` header. When the file cannot be written they stay buffered,
//! up to a bound, and are retried on the next append.

use chrono::Local;
use log::warn;
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const MAX_PENDING_LINES: usize = 1024;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub trait CombatSink {
    fn record(&mut self, lines: &[String]);
}

pub struct CombatLog {
    path: PathBuf,
    pending: VecDeque<String>,
    max_pending: usize,
}

impl CombatLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_capacity(path, MAX_PENDING_LINES)
    }

    pub fn with_capacity(path: impl Into<PathBuf>, max_pending: usize) -> Self {
        Self {
            path: path.into(),
            pending: VecDeque::new(),
            max_pending: max_pending.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines still waiting to reach the file.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let mut text = String::new();
        for line in &self.pending {
            text.push_str(line);
            text.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(text.as_bytes())?;

        self.pending.clear();
        Ok(())
    }
}

impl CombatSink for CombatLog {
    fn record(&mut self, lines: &[String]) {
        if !lines.is_empty() {
            self.pending.push_back(String::new());
            self.pending
                .push_back(format!("[{}]", Local::now().format(TIMESTAMP_FORMAT)));
        }
        self.pending.extend(lines.iter().cloned());

        let overflow = self.pending.len().saturating_sub(self.max_pending);
        if overflow > 0 {
            self.pending.drain(..overflow);
            warn!("Combat log buffer full, dropped {} oldest lines", overflow);
        }

        if let Err(e) = self.flush() {
            warn!(
                "Combat log {} unavailable ({}), {} lines buffered",
                self.path.display(),
                e,
                self.pending.len()
            );
        }
    }
}

/// Sink that keeps lines in memory.
#[derive(Debug, Default)]
pub struct MemoryLog {
    pub lines: Vec<String>,
}

impl CombatSink for MemoryLog {
    fn record(&mut self, lines: &[String]) {
        self.lines.extend_from_slice(lines);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(|s| s.to_string()).collect()
    }

    /// File contents with the batch headers removed.
    fn body(written: &str) -> Vec<&str> {
        written
            .lines()
            .filter(|line| !line.is_empty() && !line.starts_with('['))
            .collect()
    }

    #[test]
    fn test_appends_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("combat.log");
        let mut log = CombatLog::new(&path);

        log.record(&lines(&["You hit the rat.", "The rat bites you."]));
        log.record(&lines(&["The rat has been slain."]));

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            body(&written),
            vec!["You hit the rat.", "The rat bites you.", "The rat has been slain."]
        );
        assert_eq!(log.pending(), 0);
    }

    #[test]
    fn test_each_batch_gets_a_timestamp_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("combat.log");
        let mut log = CombatLog::new(&path);

        log.record(&lines(&["You hit the rat."]));
        log.record(&[]);
        log.record(&lines(&["The rat has been slain."]));

        let written = std::fs::read_to_string(&path).unwrap();
        let rows: Vec<&str> = written.lines().collect();
        assert_eq!(rows.len(), 6);
        for batch in rows.chunks(3) {
            assert_eq!(batch[0], "");
            assert!(batch[1].starts_with('[') && batch[1].ends_with(']'));
            assert_eq!(batch[1].len(), "[2026-01-01 00:00:00]".len());
        }
        assert_eq!(rows[2], "You hit the rat.");
        assert_eq!(rows[5], "The rat has been slain.");
    }

    #[test]
    fn test_unavailable_file_buffers_and_retries() {
        let dir = tempdir().unwrap();
        let folder = dir.path().join("later");
        let path = folder.join("combat.log");
        let mut log = CombatLog::new(&path);

        log.record(&lines(&["first"]));
        assert_eq!(log.pending(), 3);
        assert!(!path.exists());

        std::fs::create_dir_all(&folder).unwrap();
        log.record(&lines(&["second"]));

        assert_eq!(log.pending(), 0);
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(body(&written), vec!["first", "second"]);
    }

    #[test]
    fn test_buffer_is_bounded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("combat.log");
        let mut log = CombatLog::with_capacity(&path, 2);

        log.record(&lines(&["a", "b", "c"]));
        assert_eq!(log.pending(), 2);
        assert_eq!(log.pending.front().map(String::as_str), Some("b"));
    }

    #[test]
    fn test_memory_log_collects() {
        let mut log = MemoryLog::default();
        log.record(&lines(&["x"]));
        log.record(&[]);
        assert_eq!(log.lines, vec!["x".to_string()]);
    }
}
