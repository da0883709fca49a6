//! Plain-text keystroke log of a writing session.
//!
//! ```text
//! <owner id or "anonymous">
//! <session id>
//! <prompt>
//! <start timestamp, unix milliseconds>
//! <key> <delta ms>
//! ...
//! ```
//!
//! A key is a single character, `Backspace` or `Enter`. A space keystroke
//! therefore reads as two spaces followed by the delta.

use std::fmt::Write;

use crate::error::KeyLogError;
use crate::keystroke::{Key, KeystrokeStats, Keystroke};
use crate::session::WritingSession;
use crate::util::count_words;

pub const ANONYMOUS: &str = "anonymous";

#[derive(Debug, Clone, PartialEq)]
pub struct KeyLog {
    pub owner_id: String,
    pub session_id: String,
    pub prompt: String,
    pub started_at_ms: i64,
    pub keystrokes: Vec<(Key, u64)>,
}

impl KeyLog {
    /// Replay the keys into the text they produced
    pub fn reconstruct(&self) -> String {
        let mut text = String::new();
        for (key, _) in &self.keystrokes {
            key.apply(&mut text);
        }
        text
    }

    pub fn total_ms(&self) -> u64 {
        self.keystrokes.iter().map(|(_, delta)| delta).sum()
    }

    pub fn word_count(&self) -> usize {
        count_words(&self.reconstruct())
    }

    pub fn stats(&self) -> KeystrokeStats {
        KeystrokeStats::from_deltas(self.keystrokes.iter().map(|(key, delta)| (key, *delta)))
    }
}

pub fn encode(session: &WritingSession, keystrokes: &[Keystroke]) -> String {
    let mut out = String::new();
    let started_ms = session
        .started_at()
        .map(|t| t.timestamp_millis())
        .unwrap_or_default();

    // writing into a String cannot fail
    let _ = writeln!(out, "{}", session.owner_id().unwrap_or(ANONYMOUS));
    let _ = writeln!(out, "{}", session.session_id());
    let _ = writeln!(out, "{}", session.prompt().replace(['\r', '\n'], " "));
    let _ = writeln!(out, "{started_ms}");
    for stroke in keystrokes {
        let _ = writeln!(out, "{} {}", stroke.key.label(), stroke.delta_ms);
    }
    out
}

/// Parse a keystroke log. Keystroke lines that cannot be read are skipped.
pub fn parse(input: &str) -> Result<KeyLog, KeyLogError> {
    let lines: Vec<&str> = input.split('\n').collect();
    if lines.len() < 4 {
        return Err(KeyLogError::MissingHeader(lines.len()));
    }

    let timestamp = lines[3].trim();
    let started_at_ms = timestamp
        .parse::<i64>()
        .map_err(|_| KeyLogError::Timestamp(timestamp.to_string()))?;

    let keystrokes = lines[4..]
        .iter()
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let (key, delta) = line.rsplit_once(' ')?;
            let delta = delta.trim().parse::<u64>().ok()?;
            Some((Key::from_label(key)?, delta))
        })
        .collect();

    Ok(KeyLog {
        owner_id: lines[0].trim().to_string(),
        session_id: lines[1].trim().to_string(),
        prompt: lines[2].trim().to_string(),
        started_at_ms,
        keystrokes,
    })
}
