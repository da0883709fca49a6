use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::game::EndedReport;
use crate::session::SessionStatus;

/// One row of the session history log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub date: DateTime<Local>,
    pub session_id: String,
    pub status: SessionStatus,
    pub words: usize,
    pub duration_secs: f64,
    pub wpm: f64,
}

impl HistoryRecord {
    pub fn from_report(report: &EndedReport, date: DateTime<Local>) -> Self {
        Self {
            date,
            session_id: report.session.session_id().to_string(),
            status: report.session.status(),
            words: report.summary.word_count,
            duration_secs: (report.summary.duration_secs * 100.0).round() / 100.0,
            wpm: (report.summary.wpm * 100.0).round() / 100.0,
        }
    }
}

/// Append-only CSV of ended sessions
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &HistoryRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // If the log doesn't exist yet, we need to emit a header
        let needs_header = !self.path.exists();

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }

    /// All records, oldest first. A missing log is empty.
    pub fn records(&self) -> Result<Vec<HistoryRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let records = reader
            .deserialize::<HistoryRecord>()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn record(id: &str, status: SessionStatus, words: usize) -> HistoryRecord {
        HistoryRecord {
            date: Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
            session_id: id.to_string(),
            status,
            words,
            duration_secs: 61.5,
            wpm: 12.25,
        }
    }

    #[test]
    fn test_missing_log_is_empty() {
        let dir = tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("history.csv"));
        assert!(log.records().unwrap().is_empty());
    }

    #[test]
    fn test_append_writes_header_once() {
        let dir = tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("state").join("history.csv"));

        log.append(&record("a", SessionStatus::Draft, 10)).unwrap();
        log.append(&record("b", SessionStatus::Anky, 900)).unwrap();

        let raw = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(raw.matches("session_id").count(), 1);

        let records = log.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].session_id, "a");
        assert_eq!(records[1].status, SessionStatus::Anky);
        assert_eq!(records[1].words, 900);
        assert_eq!(records[1].wpm, 12.25);
    }
}
