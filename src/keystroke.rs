use itertools::{Itertools, MinMaxResult};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::util::{mean, std_dev};

/// A key as far as the writing buffer is concerned
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Backspace,
    Enter,
}

impl Key {
    /// Identifier used in keystroke logs: the character itself, `Backspace` or `Enter`
    pub fn label(&self) -> String {
        match self {
            Key::Char(c) => c.to_string(),
            Key::Backspace => "Backspace".to_string(),
            Key::Enter => "Enter".to_string(),
        }
    }

    pub fn from_label(label: &str) -> Option<Key> {
        match label {
            "Backspace" => Some(Key::Backspace),
            "Enter" => Some(Key::Enter),
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(Key::Char(c)),
                    _ => None,
                }
            }
        }
    }

    /// Apply this key to a text buffer
    pub fn apply(&self, buffer: &mut String) {
        match self {
            Key::Char(c) => buffer.push(*c),
            Key::Enter => buffer.push('\n'),
            Key::Backspace => {
                buffer.pop();
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keystroke {
    pub key: Key,
    pub at: SystemTime,
    /// milliseconds since the previous keystroke (or since the session started)
    pub delta_ms: u64,
}

/// Timing statistics computed once a session ends
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KeystrokeStats {
    pub count: usize,
    pub backspaces: usize,
    pub mean_delta_ms: f64,
    pub std_dev_delta_ms: f64,
    pub shortest_gap_ms: u64,
    pub longest_pause_ms: u64,
}

impl KeystrokeStats {
    pub fn from_deltas<'a>(keys: impl IntoIterator<Item = (&'a Key, u64)>) -> Self {
        let (keys, deltas): (Vec<&Key>, Vec<u64>) = keys.into_iter().unzip();
        let as_f64 = deltas.iter().map(|d| *d as f64).collect::<Vec<f64>>();

        let (shortest_gap_ms, longest_pause_ms) = match deltas.iter().minmax() {
            MinMaxResult::NoElements => (0, 0),
            MinMaxResult::OneElement(d) => (*d, *d),
            MinMaxResult::MinMax(lo, hi) => (*lo, *hi),
        };

        Self {
            count: keys.len(),
            backspaces: keys.iter().filter(|k| ***k == Key::Backspace).count(),
            mean_delta_ms: mean(&as_f64).unwrap_or(0.0),
            std_dev_delta_ms: std_dev(&as_f64).unwrap_or(0.0),
            shortest_gap_ms,
            longest_pause_ms,
        }
    }

    pub fn from_keystrokes(keystrokes: &[Keystroke]) -> Self {
        Self::from_deltas(keystrokes.iter().map(|k| (&k.key, k.delta_ms)))
    }
}
