//! Persistent user configuration.

use dirs_next as dirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::history::{DEFAULT_MAX_UNDO, MAX_UNDO_LIMIT};
use crate::paths;
use crate::record::WeightUnit;

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "WORKOUT_LEDGER_DIR";

fn default_profile() -> String {
    "default".into()
}

fn default_max_undo() -> usize {
    DEFAULT_MAX_UNDO
}

/// Settings stored as JSON in the user's config directory.
///
/// Every field has a `#[serde(default)]` so older or hand-trimmed files still
/// load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Where ledger and profile files live. `None` uses the platform data
    /// directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Profile that receives data migrated from the pre-profile layout.
    #[serde(default = "default_profile")]
    pub default_profile: String,
    #[serde(default = "default_max_undo")]
    pub max_undo: usize,
    #[serde(default)]
    pub weight_unit: WeightUnit,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: None,
            default_profile: default_profile(),
            max_undo: DEFAULT_MAX_UNDO,
            weight_unit: WeightUnit::Kg,
        }
    }
}

impl Settings {
    const FILE: &'static str = "workout_ledger_settings.json";

    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(Self::FILE))
    }

    /// Load settings, falling back to defaults when the file is missing or
    /// unreadable.
    pub fn load() -> Self {
        let mut settings = Self::path()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|data| match serde_json::from_str::<Self>(&data) {
                Ok(cfg) => Some(cfg),
                Err(e) => {
                    log::warn!("Ignoring unreadable settings: {e}");
                    None
                }
            })
            .unwrap_or_default();
        if !paths::is_valid_profile_name(&settings.default_profile) {
            log::warn!(
                "Invalid default profile {:?}, using \"default\"",
                settings.default_profile
            );
            settings.default_profile = default_profile();
        }
        let max_undo = settings.max_undo.clamp(1, MAX_UNDO_LIMIT);
        if max_undo != settings.max_undo {
            log::warn!(
                "Undo depth {} out of range, using {max_undo}",
                settings.max_undo
            );
            settings.max_undo = max_undo;
        }
        settings
    }

    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = Self::path() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no config directory",
            ));
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, data)
    }

    /// Data directory to use: the environment variable wins over the
    /// settings file, which wins over the platform default.
    pub fn resolve_data_dir(&self) -> Option<PathBuf> {
        std::env::var_os(DATA_DIR_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| self.data_dir.clone())
            .or_else(|| dirs::data_dir().map(|p| p.join("workout_ledger")))
    }
}
