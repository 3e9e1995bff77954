use std::path::PathBuf;

use crate::error::{BotError, Result};

/// Process-level settings read from the environment (and `.env`)
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub token: String,

    /// Directory holding persisted state
    pub state_path: PathBuf,

    /// Directory holding JSON configuration files
    pub data_path: PathBuf,

    pub log_level: String,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let token = lookup("DISCORD_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| BotError::MissingEnv {
                name: "DISCORD_TOKEN".to_string(),
            })?;

        Ok(Self {
            token,
            state_path: lookup("STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("state")),
            data_path: lookup("DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Location of the lockdown state file
    pub fn lockdown_state_file(&self) -> PathBuf {
        self.state_path.join("lockdown_state.json")
    }

    /// Location of the optional lockdown settings file
    pub fn lockdown_settings_file(&self) -> PathBuf {
        self.data_path.join("lockdown.json")
    }
}
