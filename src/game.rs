use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};
use uuid::Uuid;

use crate::keylog;
use crate::keystroke::{Key, Keystroke, KeystrokeStats};
use crate::session::{SessionStatus, SessionTiming, WritingSession};
use crate::util::{duration_from_secs, elapsed_between, time_diff_ms, words_per_minute};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    Idle,
    Active,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EndReason {
    Inactivity,
    Stopped,
}

/// Statistics computed once when a session ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub duration_secs: f64,
    pub word_count: usize,
    pub wpm: f64,
    pub keystrokes: KeystrokeStats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EndedReport {
    pub session: WritingSession,
    pub summary: SessionSummary,
    pub reason: EndReason,
    /// encoded keystroke log, only kept when recording was requested
    pub keylog: Option<String>,
    /// id of the stored draft this session continued, if any
    pub resumed_from: Option<String>,
}

/// Side effects a transition asks for. They are executed elsewhere and their
/// outcome never feeds back into the game.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    SessionStarted(WritingSession),
    SessionEnded(Box<EndedReport>),
}

/// The writing session state machine: idle -> active -> ended.
///
/// Every operation takes the current wall-clock time so the caller owns the
/// clock; all timing decisions compare timestamps rather than counting ticks.
#[derive(Debug)]
pub struct WritingGame {
    session: WritingSession,
    timing: SessionTiming,
    started_at: Option<SystemTime>,
    last_activity: Option<SystemTime>,
    keystrokes: Vec<Keystroke>,
    carried_secs: f64,
    resumed_from: Option<String>,
    target_reached: bool,
    record_keylog: bool,
    summary: Option<SessionSummary>,
    end_reason: Option<EndReason>,
}

impl WritingGame {
    pub fn new(prompt: impl Into<String>, owner_id: Option<String>, timing: SessionTiming) -> Self {
        Self {
            session: WritingSession::new(prompt, owner_id),
            timing,
            started_at: None,
            last_activity: None,
            keystrokes: Vec::new(),
            carried_secs: 0.0,
            resumed_from: None,
            target_reached: false,
            record_keylog: false,
            summary: None,
            end_reason: None,
        }
    }

    /// Continue writing from a stored draft. The new session gets its own
    /// identity; content and active time carry over. The draft itself stays
    /// stored until the continuation ends with something worth keeping.
    pub fn resume(draft: &WritingSession, timing: SessionTiming) -> Self {
        let mut game = Self::new(draft.prompt.clone(), draft.owner_id.clone(), timing);
        game.session.content = draft.content.clone();
        game.carried_secs = duration_from_secs(draft.active_secs).as_secs_f64();
        game.resumed_from = Some(draft.session_id.clone());
        debug!(
            from = %draft.session_id,
            to = %game.session.session_id,
            carried_secs = game.carried_secs,
            "resuming draft"
        );
        game
    }

    /// Keep an encoded keystroke log in the end-of-session report
    pub fn with_keylog(mut self, record: bool) -> Self {
        self.record_keylog = record;
        self
    }

    pub fn phase(&self) -> Phase {
        match self.session.status {
            status if status.is_terminal() => Phase::Ended,
            SessionStatus::NotStarted => Phase::Idle,
            _ => Phase::Active,
        }
    }

    pub fn session(&self) -> &WritingSession {
        &self.session
    }

    pub fn timing(&self) -> &SessionTiming {
        &self.timing
    }

    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    pub fn word_count(&self) -> usize {
        self.session.word_count()
    }

    pub fn target_reached(&self) -> bool {
        self.target_reached
    }

    pub fn resumed_from(&self) -> Option<&str> {
        self.resumed_from.as_deref()
    }

    /// idle -> active
    pub fn start(&mut self, now: SystemTime) -> Option<Effect> {
        if self.phase() != Phase::Idle {
            return None;
        }

        self.started_at = Some(now);
        self.last_activity = Some(now);
        self.session.started_at = Some(DateTime::<Utc>::from(now));
        self.session.status = SessionStatus::InProgress;

        info!(
            session_id = %self.session.session_id,
            prompt = %self.session.prompt,
            "writing session started"
        );
        Some(Effect::SessionStarted(self.session.clone()))
    }

    /// Apply a key. The first key of an idle session starts it.
    pub fn keystroke(&mut self, key: Key, now: SystemTime) -> Option<Effect> {
        let effect = match self.phase() {
            Phase::Ended => return None,
            Phase::Idle => self.start(now),
            Phase::Active => {
                // a key arriving after the deadline cannot revive the session
                if let Some(ended) = self.end_if_expired(now) {
                    return ended;
                }
                None
            }
        };

        let previous = self.last_activity.unwrap_or(now);
        self.keystrokes.push(Keystroke {
            key,
            at: now,
            delta_ms: time_diff_ms(previous, now),
        });
        key.apply(&mut self.session.content);
        self.last_activity = Some(now);
        self.latch_target(now);

        effect
    }

    /// Periodic check against the inactivity deadline
    pub fn poll(&mut self, now: SystemTime) -> Option<Effect> {
        if self.phase() != Phase::Active {
            return None;
        }
        if let Some(ended) = self.end_if_expired(now) {
            return ended;
        }
        self.latch_target(now);
        None
    }

    /// Explicit stop. Calling it again is a no-op.
    pub fn stop(&mut self, now: SystemTime) -> Option<Effect> {
        match self.phase() {
            Phase::Ended => None,
            Phase::Idle => {
                self.session.status = SessionStatus::Discarded;
                self.session.ended_at = Some(DateTime::<Utc>::from(now));
                self.session.active_secs = self.carried_secs;
                self.end_reason = Some(EndReason::Stopped);
                info!(session_id = %self.session.session_id, "writing session discarded before it started");
                None
            }
            Phase::Active => match self.end_if_expired(now) {
                Some(ended) => ended,
                None => self.finish(now, EndReason::Stopped),
            },
        }
    }

    /// Active time so far: carried time plus wall clock since the start
    pub fn elapsed(&self, now: SystemTime) -> Duration {
        match (self.phase(), self.started_at) {
            (Phase::Ended, _) => duration_from_secs(self.session.active_secs),
            (Phase::Active, Some(started)) => duration_from_secs(self.carried_secs)
                .saturating_add(elapsed_between(started, now)),
            _ => duration_from_secs(self.carried_secs),
        }
    }

    pub fn since_last_keystroke(&self, now: SystemTime) -> Duration {
        self.last_activity
            .map(|last| elapsed_between(last, now))
            .unwrap_or_default()
    }

    /// Rendering signal only: 1.0 right after a keystroke, 0.0 at the deadline
    pub fn life_remaining(&self, now: SystemTime) -> f64 {
        match self.phase() {
            Phase::Idle => 1.0,
            Phase::Ended => 0.0,
            Phase::Active => {
                let deadline = self.timing.inactivity_deadline.as_secs_f64();
                if deadline <= 0.0 {
                    return 0.0;
                }
                (1.0 - self.since_last_keystroke(now).as_secs_f64() / deadline).clamp(0.0, 1.0)
            }
        }
    }

    pub fn is_warning(&self, now: SystemTime) -> bool {
        self.phase() == Phase::Active
            && self.since_last_keystroke(now).as_secs_f64()
                >= self.timing.inactivity_deadline.as_secs_f64() * self.timing.warning_fraction
    }

    /// Progress toward the target duration, capped at 1.0
    pub fn target_progress(&self, now: SystemTime) -> f64 {
        let target = self.timing.target_duration.as_secs_f64();
        if target <= 0.0 {
            return 1.0;
        }
        (self.elapsed(now).as_secs_f64() / target).min(1.0)
    }

    fn latch_target(&mut self, now: SystemTime) {
        if !self.target_reached && self.elapsed(now) >= self.timing.target_duration {
            self.target_reached = true;
            self.session.is_anky = true;
            info!(session_id = %self.session.session_id, "target duration reached");
        }
    }

    /// Ends the session via the inactivity path when the deadline has passed.
    /// The outer `Option` says whether the session ended, the inner one
    /// carries the effect (absent for discarded sessions).
    fn end_if_expired(&mut self, now: SystemTime) -> Option<Option<Effect>> {
        let last = self.last_activity?;
        if elapsed_between(last, now) < self.timing.inactivity_deadline {
            return None;
        }
        Some(self.finish(last + self.timing.inactivity_deadline, EndReason::Inactivity))
    }

    fn finish(&mut self, ended_at: SystemTime, reason: EndReason) -> Option<Effect> {
        let started = self.started_at.unwrap_or(ended_at);
        let duration_secs = self.carried_secs + elapsed_between(started, ended_at).as_secs_f64();

        self.session.ended_at = Some(DateTime::<Utc>::from(ended_at));
        self.session.active_secs = duration_secs;
        self.end_reason = Some(reason);
        let keystrokes = std::mem::take(&mut self.keystrokes);

        if self.session.content.trim().is_empty() {
            self.session.status = SessionStatus::Discarded;
            info!(
                session_id = %self.session.session_id,
                %reason,
                "writing session discarded: nothing was written"
            );
            return None;
        }

        // the stop path never promotes; only a flag latched earlier survives
        if reason == EndReason::Inactivity
            && duration_secs >= self.timing.target_duration.as_secs_f64()
        {
            self.target_reached = true;
        }
        self.session.is_anky = self.target_reached;
        if self.session.is_anky {
            self.session.status = SessionStatus::Anky;
            self.session.anky_id = Some(Uuid::new_v4().to_string());
        } else {
            self.session.status = SessionStatus::Draft;
        }

        let word_count = self.session.word_count();
        let summary = SessionSummary {
            duration_secs,
            word_count,
            wpm: words_per_minute(word_count, duration_secs),
            keystrokes: KeystrokeStats::from_keystrokes(&keystrokes),
        };
        self.summary = Some(summary.clone());

        let keylog = self
            .record_keylog
            .then(|| keylog::encode(&self.session, &keystrokes));

        info!(
            session_id = %self.session.session_id,
            status = %self.session.status,
            %reason,
            words = word_count,
            duration_secs,
            "writing session ended"
        );

        Some(Effect::SessionEnded(Box::new(EndedReport {
            session: self.session.clone(),
            summary,
            reason,
            keylog,
            resumed_from: self.resumed_from.clone(),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn at(ms: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_millis(1_700_000_000_000 + ms)
    }

    fn game() -> WritingGame {
        WritingGame::new("tell us who you are", None, SessionTiming::default())
    }

    fn type_text(game: &mut WritingGame, text: &str, start_ms: u64, gap_ms: u64) -> u64 {
        let mut t = start_ms;
        for c in text.chars() {
            game.keystroke(Key::Char(c), at(t));
            t += gap_ms;
        }
        t - gap_ms
    }

    #[test]
    fn test_new_game_is_idle() {
        let g = game();
        assert_eq!(g.phase(), Phase::Idle);
        assert_eq!(g.session().status(), SessionStatus::NotStarted);
        assert_eq!(g.life_remaining(at(0)), 1.0);
        assert_eq!(g.elapsed(at(5_000)), Duration::ZERO);
    }

    #[test]
    fn test_start_emits_started_effect() {
        let mut g = game();
        let effect = g.start(at(0));

        assert_matches!(effect, Some(Effect::SessionStarted(ref s)) if s.status() == SessionStatus::InProgress);
        assert_eq!(g.phase(), Phase::Active);
        assert!(g.session().started_at().is_some());
        assert!(g.session().ended_at().is_none());
    }

    #[test]
    fn test_start_twice_is_noop() {
        let mut g = game();
        assert!(g.start(at(0)).is_some());
        assert!(g.start(at(10)).is_none());
    }

    #[test]
    fn test_first_keystroke_starts_session() {
        let mut g = game();
        let effect = g.keystroke(Key::Char('h'), at(0));

        assert_matches!(effect, Some(Effect::SessionStarted(_)));
        assert_eq!(g.phase(), Phase::Active);
        assert_eq!(g.session().content(), "h");
    }

    #[test]
    fn test_keystrokes_edit_buffer_and_word_count() {
        let mut g = game();
        type_text(&mut g, "hello  world", 0, 50);
        assert_eq!(g.word_count(), 2);

        for _ in 0..5 {
            g.keystroke(Key::Backspace, at(1_000));
        }
        assert_eq!(g.session().content(), "hello  ");
        assert_eq!(g.word_count(), 1);

        g.keystroke(Key::Enter, at(1_100));
        g.keystroke(Key::Char('x'), at(1_200));
        assert_eq!(g.session().content(), "hello  \nx");
        assert_eq!(g.word_count(), 2);
    }

    #[test]
    fn test_poll_before_deadline_keeps_session_active() {
        let mut g = game();
        g.keystroke(Key::Char('a'), at(0));

        assert!(g.poll(at(7_999)).is_none());
        assert_eq!(g.phase(), Phase::Active);
    }

    #[test]
    fn test_life_remaining_decays_linearly() {
        let mut g = game();
        g.keystroke(Key::Char('a'), at(0));

        assert_eq!(g.life_remaining(at(0)), 1.0);
        assert!((g.life_remaining(at(4_000)) - 0.5).abs() < 1e-9);
        assert_eq!(g.life_remaining(at(9_000)), 0.0);
        // the indicator alone never ends the session
        assert_eq!(g.phase(), Phase::Active);
    }

    #[test]
    fn test_warning_window() {
        let mut g = game();
        g.keystroke(Key::Char('a'), at(0));

        assert!(!g.is_warning(at(7_000)));
        assert!(g.is_warning(at(7_100)));
    }

    #[test]
    fn test_inactivity_ends_session_at_deadline() {
        let mut g = game();
        let last = type_text(&mut g, "short text", 0, 1_000);

        let effect = g.poll(at(last + 8_050));
        let report = match effect {
            Some(Effect::SessionEnded(report)) => report,
            other => panic!("expected SessionEnded, got {other:?}"),
        };

        assert_eq!(report.reason, EndReason::Inactivity);
        assert_eq!(report.session.status(), SessionStatus::Draft);
        assert_eq!(
            report.session.ended_at(),
            Some(DateTime::<Utc>::from(at(last + 8_000)))
        );
        assert_eq!(report.summary.word_count, 2);
        assert_eq!(report.summary.keystrokes.count, 10);
        assert!(report.keylog.is_none());
        assert_eq!(g.phase(), Phase::Ended);
    }

    #[test]
    fn test_scenario_a_continuous_writing_becomes_anky() {
        let mut g = game();
        let mut t = 0;
        while t <= 500_000 {
            let key = if (t / 2_000) % 5 == 4 { Key::Char(' ') } else { Key::Char('w') };
            assert!(!matches!(g.keystroke(key, at(t)), Some(Effect::SessionEnded(_))));
            // polls between keystrokes never end the session
            assert!(g.poll(at(t + 1_000)).is_none());
            t += 2_000;
        }
        assert!(g.target_reached());

        let mut ended = None;
        let mut now = 500_000;
        while ended.is_none() {
            now += 100;
            ended = g.poll(at(now));
        }

        let report = match ended {
            Some(Effect::SessionEnded(report)) => report,
            other => panic!("expected SessionEnded, got {other:?}"),
        };
        assert_eq!(g.phase(), Phase::Ended);
        assert!(report.session.is_anky());
        assert_eq!(report.session.status(), SessionStatus::Anky);
        assert!(report.session.anky_id().is_some());
        assert!((report.summary.duration_secs - 508.0).abs() < 1e-6);
    }

    #[test]
    fn test_scenario_b_pause_ends_as_draft() {
        let mut g = game();
        for i in 0..=10u64 {
            g.keystroke(Key::Char(if i % 3 == 2 { ' ' } else { 'k' }), at(i * 1_000));
        }

        let mut ended = None;
        let mut now = 10_000;
        while now <= 19_000 && ended.is_none() {
            ended = g.poll(at(now));
            now += 100;
        }

        let report = match ended {
            Some(Effect::SessionEnded(report)) => report,
            other => panic!("expected SessionEnded, got {other:?}"),
        };
        assert_eq!(
            report.session.ended_at(),
            Some(DateTime::<Utc>::from(at(18_000)))
        );
        assert!(!report.session.is_anky());
        assert_eq!(report.session.status(), SessionStatus::Draft);
        assert!((report.summary.duration_secs - 18.0).abs() < 1e-6);
    }

    #[test]
    fn test_scenario_c_empty_session_is_discarded() {
        let mut g = game();
        assert!(g.start(at(0)).is_some());

        let mut effects = Vec::new();
        let mut now = 0;
        while now <= 9_000 {
            effects.extend(g.poll(at(now)));
            now += 100;
        }

        assert!(effects.is_empty());
        assert_eq!(g.phase(), Phase::Ended);
        assert_eq!(g.session().status(), SessionStatus::Discarded);
        assert!(g.summary().is_none());
        assert!(g.session().ended_at().is_some());
    }

    #[test]
    fn test_whitespace_only_session_is_discarded() {
        let mut g = game();
        type_text(&mut g, "   ", 0, 100);

        assert!(g.poll(at(9_000)).is_none());
        assert_eq!(g.session().status(), SessionStatus::Discarded);
    }

    #[test]
    fn test_scenario_d_explicit_stop() {
        let mut g = game();
        g.keystroke(Key::Char('a'), at(0));
        g.keystroke(Key::Char('b'), at(1_000));
        g.keystroke(Key::Char('c'), at(2_000));

        let report = match g.stop(at(2_000)) {
            Some(Effect::SessionEnded(report)) => report,
            other => panic!("expected SessionEnded, got {other:?}"),
        };
        assert_eq!(report.reason, EndReason::Stopped);
        assert!(!report.session.is_anky());
        assert_eq!(report.session.status(), SessionStatus::Draft);
        assert_eq!(g.phase(), Phase::Ended);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut g = game();
        type_text(&mut g, "abc", 0, 500);

        assert!(g.stop(at(2_000)).is_some());
        let snapshot = g.session().clone();

        assert!(g.stop(at(3_000)).is_none());
        assert_eq!(g.session(), &snapshot);
    }

    #[test]
    fn test_stop_does_not_evaluate_target() {
        let timing = SessionTiming {
            target_duration: Duration::from_secs(2),
            ..SessionTiming::default()
        };
        let mut g = WritingGame::new("p", None, timing);
        g.keystroke(Key::Char('a'), at(0));

        // 3s elapsed, but nothing has latched the target yet
        let effect = g.stop(at(3_000));
        assert_matches!(effect, Some(Effect::SessionEnded(ref r)) if !r.session.is_anky());
    }

    #[test]
    fn test_latched_target_survives_stop() {
        let timing = SessionTiming {
            target_duration: Duration::from_secs(2),
            ..SessionTiming::default()
        };
        let mut g = WritingGame::new("p", None, timing);
        g.keystroke(Key::Char('a'), at(0));
        assert!(g.poll(at(2_500)).is_none());
        assert!(g.session().is_anky());

        let effect = g.stop(at(3_000));
        assert_matches!(effect, Some(Effect::SessionEnded(ref r)) if r.session.is_anky());
        assert_eq!(g.session().status(), SessionStatus::Anky);
    }

    #[test]
    fn test_stop_idle_session_discards_without_effect() {
        let mut g = game();
        assert!(g.stop(at(0)).is_none());
        assert_eq!(g.session().status(), SessionStatus::Discarded);
        assert!(g.session().ended_at().is_some());
        assert!(g.start(at(10)).is_none());
    }

    #[test]
    fn test_stop_after_deadline_uses_inactivity_path() {
        let mut g = game();
        g.keystroke(Key::Char('a'), at(0));

        let effect = g.stop(at(20_000));
        assert_matches!(effect, Some(Effect::SessionEnded(ref r)) if r.reason == EndReason::Inactivity);
        assert_eq!(
            g.session().ended_at(),
            Some(DateTime::<Utc>::from(at(8_000)))
        );
    }

    #[test]
    fn test_late_keystroke_cannot_revive_session() {
        let mut g = game();
        g.keystroke(Key::Char('a'), at(0));

        let effect = g.keystroke(Key::Char('b'), at(8_500));
        assert_matches!(effect, Some(Effect::SessionEnded(_)));
        assert_eq!(g.session().content(), "a");
        assert!(g.keystroke(Key::Char('c'), at(8_600)).is_none());
        assert_eq!(g.session().content(), "a");
    }

    #[test]
    fn test_resume_carries_content_and_time() {
        let mut first = game();
        type_text(&mut first, "draft", 0, 1_000);
        first.stop(at(5_000));
        let draft = first.session().clone();

        let mut resumed = WritingGame::resume(&draft, SessionTiming::default());
        assert_eq!(resumed.phase(), Phase::Idle);
        assert_ne!(resumed.session().session_id(), draft.session_id());
        assert_eq!(resumed.session().content(), "draft");

        resumed.keystroke(Key::Char('s'), at(100_000));
        assert_eq!(resumed.session().content(), "drafts");
        assert_eq!(
            resumed.elapsed(at(101_000)),
            Duration::from_secs(6)
        );
    }

    #[test]
    fn test_resume_names_the_draft_it_continues() {
        let mut first = game();
        type_text(&mut first, "draft", 0, 1_000);
        first.stop(at(5_000));
        let draft = first.session().clone();

        let mut resumed = WritingGame::resume(&draft, SessionTiming::default());
        assert_eq!(resumed.resumed_from(), Some(draft.session_id()));
        resumed.keystroke(Key::Char('!'), at(50_000));

        let report = match resumed.stop(at(51_000)) {
            Some(Effect::SessionEnded(report)) => report,
            other => panic!("expected SessionEnded, got {other:?}"),
        };
        assert_eq!(report.resumed_from.as_deref(), Some(draft.session_id()));
        assert!(game().resumed_from().is_none());
    }

    #[test]
    fn test_resume_ignores_corrupt_active_time() {
        let mut first = game();
        type_text(&mut first, "draft", 0, 1_000);
        first.stop(at(5_000));

        for secs in [f64::NAN, -12.0, f64::INFINITY] {
            let mut draft = first.session().clone();
            draft.active_secs = secs;
            let mut resumed = WritingGame::resume(&draft, SessionTiming::default());

            resumed.elapsed(at(0));
            resumed.keystroke(Key::Char('s'), at(100_000));
            resumed.elapsed(at(101_000));
            resumed.poll(at(101_000));
        }
    }

    #[test]
    fn test_keylog_recorded_when_requested() {
        let mut g = game().with_keylog(true);
        type_text(&mut g, "hi", 0, 100);

        let report = match g.stop(at(1_000)) {
            Some(Effect::SessionEnded(report)) => report,
            other => panic!("expected SessionEnded, got {other:?}"),
        };
        let log = report.keylog.expect("keylog requested");
        let parsed = keylog::parse(&log).unwrap();
        assert_eq!(parsed.reconstruct(), "hi");
        assert_eq!(parsed.session_id, report.session.session_id());
    }

    #[test]
    fn test_target_progress() {
        let mut g = game();
        g.keystroke(Key::Char('a'), at(0));
        assert!((g.target_progress(at(4_000)) - 4.0 / 480.0).abs() < 1e-9);
    }
}
