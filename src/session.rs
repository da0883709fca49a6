use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::util::count_words;

pub const DEFAULT_INACTIVITY_SECS: f64 = 8.0;
pub const DEFAULT_TARGET_SECS: f64 = 480.0;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
pub const DEFAULT_WARNING_FRACTION: f64 = 0.88;

/// Thresholds that drive a writing session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionTiming {
    pub inactivity_deadline: Duration,
    pub target_duration: Duration,
    pub poll_interval: Duration,
    /// fraction of the inactivity window after which the UI warns
    pub warning_fraction: f64,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            inactivity_deadline: Duration::from_secs_f64(DEFAULT_INACTIVITY_SECS),
            target_duration: Duration::from_secs_f64(DEFAULT_TARGET_SECS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            warning_fraction: DEFAULT_WARNING_FRACTION,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    /// ended below the target threshold
    Draft,
    /// ended at or above the target threshold
    Anky,
    /// ended with nothing written
    Discarded,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Draft | SessionStatus::Anky | SessionStatus::Discarded
        )
    }
}

/// One free-writing session. Fields are only mutated through
/// [`crate::game::WritingGame`], which keeps the lifecycle invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WritingSession {
    pub(crate) session_id: String,
    pub(crate) owner_id: Option<String>,
    pub(crate) prompt: String,
    pub(crate) started_at: Option<DateTime<Utc>>,
    pub(crate) ended_at: Option<DateTime<Utc>>,
    pub(crate) active_secs: f64,
    pub(crate) content: String,
    pub(crate) is_anky: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) anky_id: Option<String>,
    pub(crate) status: SessionStatus,
}

impl WritingSession {
    pub fn new(prompt: impl Into<String>, owner_id: Option<String>) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            owner_id,
            prompt: prompt.into(),
            started_at: None,
            ended_at: None,
            active_secs: 0.0,
            content: String::new(),
            is_anky: false,
            anky_id: None,
            status: SessionStatus::NotStarted,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn active_secs(&self) -> f64 {
        self.active_secs
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn word_count(&self) -> usize {
        count_words(&self.content)
    }

    pub fn is_anky(&self) -> bool {
        self.is_anky
    }

    pub fn anky_id(&self) -> Option<&str> {
        self.anky_id.as_deref()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_not_started() {
        let session = WritingSession::new("tell us who you are", None);

        assert_eq!(session.status(), SessionStatus::NotStarted);
        assert_eq!(session.prompt(), "tell us who you are");
        assert!(session.started_at().is_none());
        assert!(session.ended_at().is_none());
        assert_eq!(session.word_count(), 0);
        assert!(!session.is_anky());
        assert!(Uuid::parse_str(session.session_id()).is_ok());
    }

    #[test]
    fn test_sessions_get_distinct_ids() {
        let a = WritingSession::new("p", None);
        let b = WritingSession::new("p", None);
        assert_ne!(a.session_id(), b.session_id());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!SessionStatus::NotStarted.is_terminal());
        assert!(!SessionStatus::InProgress.is_terminal());
        assert!(SessionStatus::Draft.is_terminal());
        assert!(SessionStatus::Anky.is_terminal());
        assert!(SessionStatus::Discarded.is_terminal());
    }

    #[test]
    fn test_status_names() {
        assert_eq!(SessionStatus::InProgress.to_string(), "in_progress");
        assert_eq!(
            serde_json::to_string(&SessionStatus::NotStarted).unwrap(),
            "\"not_started\""
        );
    }

    #[test]
    fn test_default_timing() {
        let timing = SessionTiming::default();
        assert_eq!(timing.inactivity_deadline, Duration::from_secs(8));
        assert_eq!(timing.target_duration, Duration::from_secs(480));
        assert_eq!(timing.poll_interval, Duration::from_millis(100));
    }
}
