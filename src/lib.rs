// Library surface for the binary and the integration tests.
pub mod api;
pub mod app;
pub mod app_dirs;
pub mod config;
pub mod error;
pub mod game;
pub mod history;
pub mod keylog;
pub mod keystroke;
pub mod logging;
pub mod prompts;
pub mod reporter;
pub mod runtime;
pub mod session;
pub mod store;
pub mod ui;
pub mod util;
