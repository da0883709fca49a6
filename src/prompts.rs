use include_dir::{include_dir, Dir};
use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::store::{KvStore, SessionArchive};

static PROMPT_DIR: Dir = include_dir!("src/prompts");

pub const FALLBACK_PROMPT: &str = "tell us who you are";

#[derive(Deserialize, Clone, Debug)]
struct PromptFile {
    #[allow(dead_code)]
    name: String,
    prompts: Vec<String>,
}

/// Every built-in prompt, collected from the embedded JSON files
#[derive(Debug, Clone)]
pub struct PromptBook {
    prompts: Vec<String>,
}

impl PromptBook {
    pub fn builtin() -> Self {
        let mut prompts = Vec::new();
        for file in PROMPT_DIR.files() {
            let Some(raw) = file.contents_utf8() else {
                continue;
            };
            match serde_json::from_str::<PromptFile>(raw) {
                Ok(parsed) => prompts.extend(parsed.prompts),
                Err(e) => warn!(file = %file.path().display(), error = %e, "skipping prompt file"),
            }
        }
        let book = Self::from_prompts(prompts);
        debug!(count = book.prompts.len(), "prompt book loaded");
        book
    }

    pub fn from_prompts(prompts: impl IntoIterator<Item = String>) -> Self {
        Self {
            prompts: prompts
                .into_iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn random(&self) -> &str {
        self.prompts
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or(FALLBACK_PROMPT)
    }

    /// Prompt for the next session: an explicit choice wins, then the
    /// stored upcoming prompt (used once), then a random built-in one.
    pub fn next<S: KvStore>(&self, explicit: Option<&str>, archive: &SessionArchive<S>) -> String {
        if let Some(prompt) = explicit.map(str::trim).filter(|p| !p.is_empty()) {
            return prompt.to_string();
        }
        match archive.upcoming_prompt() {
            Ok(Some(prompt)) if !prompt.trim().is_empty() => {
                if let Err(e) = archive.clear_upcoming_prompt() {
                    warn!(error = %e, "could not clear upcoming prompt");
                }
                prompt
            }
            Ok(_) => self.random().to_string(),
            Err(e) => {
                warn!(error = %e, "could not read upcoming prompt");
                self.random().to_string()
            }
        }
    }
}

impl Default for PromptBook {
    fn default() -> Self {
        Self::builtin()
    }
}
