use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "anky";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// State lives under $HOME/.local/state/anky, falling back to the
    /// platform data dir and finally the working directory.
    pub fn state_dir() -> PathBuf {
        if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".local")
                .join("state")
                .join(APP_NAME)
        } else if let Some(proj_dirs) = ProjectDirs::from("", "", APP_NAME) {
            proj_dirs.data_local_dir().to_path_buf()
        } else {
            PathBuf::from(".")
        }
    }

    pub fn db_path() -> PathBuf {
        Self::state_dir().join("anky.db")
    }

    pub fn history_path() -> PathBuf {
        Self::state_dir().join("history.csv")
    }

    pub fn log_dir() -> PathBuf {
        Self::state_dir().join("logs")
    }

    pub fn config_path() -> PathBuf {
        match ProjectDirs::from("", "", APP_NAME) {
            Some(pd) => pd.config_dir().join("config.json"),
            None => PathBuf::from("anky_config.json"),
        }
    }
}
