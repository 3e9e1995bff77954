use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::state::LockdownScope;

/// Lockdown behaviour settings
/// Loaded from data/lockdown.json; every field is optional
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LockdownSettings {
    /// Prefix of the audit log reason on every overwrite edit
    pub audit_tag: String,

    /// Scope used when `/lockdown enable` is run without one
    pub default_scope: LockdownScope,

    /// How many skipped channels a reply lists before summarising the rest
    pub skipped_preview_limit: usize,

    /// Maximum length of a moderator-supplied reason
    pub reason_max_length: usize,
}

impl Default for LockdownSettings {
    fn default() -> Self {
        Self {
            audit_tag: "LOCKDOWN".to_string(),
            default_scope: LockdownScope::Channel,
            skipped_preview_limit: 6,
            reason_max_length: 200,
        }
    }
}

impl LockdownSettings {
    /// Load from a JSON file
    pub fn load_from_file(path: &Path) -> crate::error::Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| crate::error::BotError::ConfigLoad {
                path: path.display().to_string(),
                source: e,
            })?;

        serde_json::from_str(&content).map_err(|e| crate::error::BotError::ConfigParse {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Load from a JSON file, falling back to defaults when it does not exist
    pub fn load_or_default(path: &Path) -> crate::error::Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Trim a reason and cut it down to `reason_max_length` characters.
    /// Empty reasons become `None`.
    pub fn normalize_reason(&self, reason: Option<String>) -> Option<String> {
        reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .map(|r| r.chars().take(self.reason_max_length).collect())
    }
}
