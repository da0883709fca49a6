use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::SystemTime;
use tracing::info;

use crate::game::{Effect, Phase, WritingGame};
use crate::prompts::PromptBook;
use crate::reporter::Reporter;
use crate::runtime::translate_key;
use crate::session::{SessionStatus, SessionTiming};

/// What the event loop should do after handling an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

/// Session settings that outlive a single game
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub timing: SessionTiming,
    pub owner_id: Option<String>,
    pub record_keylog: bool,
}

/// Root controller: owns the current game and routes its effects to the
/// reporter. The views only read from it.
pub struct App {
    game: WritingGame,
    reporter: Option<Reporter>,
    prompts: PromptBook,
    settings: AppSettings,
    wrote_today: bool,
}

impl App {
    pub fn new(
        game: WritingGame,
        reporter: Reporter,
        prompts: PromptBook,
        settings: AppSettings,
        wrote_today: bool,
    ) -> Self {
        Self {
            game,
            reporter: Some(reporter),
            prompts,
            settings,
            wrote_today,
        }
    }

    /// Build an app around a fresh game for `prompt`
    pub fn with_prompt(
        prompt: &str,
        reporter: Reporter,
        prompts: PromptBook,
        settings: AppSettings,
        wrote_today: bool,
    ) -> Self {
        let game = Self::fresh_game(prompt, &settings);
        Self::new(game, reporter, prompts, settings, wrote_today)
    }

    fn fresh_game(prompt: &str, settings: &AppSettings) -> WritingGame {
        WritingGame::new(prompt, settings.owner_id.clone(), settings.timing)
            .with_keylog(settings.record_keylog)
    }

    pub fn game(&self) -> &WritingGame {
        &self.game
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn wrote_today(&self) -> bool {
        self.wrote_today
    }

    pub fn on_key(&mut self, event: &KeyEvent, now: SystemTime) -> Control {
        if event.modifiers.contains(KeyModifiers::CONTROL) && event.code == KeyCode::Char('c') {
            return Control::Quit;
        }

        match (self.game.phase(), event.code) {
            (Phase::Active, KeyCode::Esc) => {
                let effect = self.game.stop(now);
                self.dispatch(effect);
                Control::Continue
            }
            (_, KeyCode::Esc) => Control::Quit,
            (Phase::Ended, KeyCode::Char('n')) => {
                self.new_session(None);
                Control::Continue
            }
            (Phase::Ended, KeyCode::Char('q')) => Control::Quit,
            (Phase::Ended, _) => Control::Continue,
            (Phase::Idle | Phase::Active, _) => {
                if let Some(key) = translate_key(event) {
                    let effect = self.game.keystroke(key, now);
                    self.dispatch(effect);
                }
                Control::Continue
            }
        }
    }

    pub fn on_poll(&mut self, now: SystemTime) -> Control {
        let effect = self.game.poll(now);
        self.dispatch(effect);
        Control::Continue
    }

    /// Replace the finished game with a new one. Ignored while writing.
    pub fn new_session(&mut self, prompt: Option<String>) {
        if self.game.phase() == Phase::Active {
            return;
        }
        let prompt = prompt.unwrap_or_else(|| self.prompts.random().to_string());
        info!(%prompt, "new session");
        self.game = Self::fresh_game(&prompt, &self.settings);
    }

    /// Stop an active session, then wait for every queued effect
    pub fn quit(&mut self, now: SystemTime) {
        if self.game.phase() == Phase::Active {
            let effect = self.game.stop(now);
            self.dispatch(effect);
        }
        if let Some(reporter) = self.reporter.take() {
            reporter.shutdown();
        }
    }

    fn dispatch(&mut self, effect: Option<Effect>) {
        let Some(effect) = effect else {
            return;
        };
        if let Effect::SessionEnded(report) = &effect {
            if matches!(
                report.session.status(),
                SessionStatus::Draft | SessionStatus::Anky
            ) {
                self.wrote_today = true;
            }
        }
        if let Some(reporter) = &self.reporter {
            reporter.dispatch(effect);
        }
    }
}
