//! Settings persistence using TOML
//!
//! Stores settings in ~/.config/blockfall/settings.toml (or platform equivalent)

use crate::game::GameConfig;
use crate::gravity::MIN_INTERVAL;
use crate::skill::SkillTimings;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default leaderboard address for both the server and the client
pub const DEFAULT_SERVER: &str = "127.0.0.1:7878";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize settings")]
    Serialize(#[from] toml::ser::Error),
    #[error("{0}")]
    Invalid(String),
}

/// Game settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub player: PlayerSettings,
    pub leaderboard: LeaderboardSettings,
    pub gameplay: GameplaySettings,
    pub skills: SkillSettings,
    /// Keybindings
    pub keys: KeyBindings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// Name shown on the leaderboard
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderboardSettings {
    pub enabled: bool,
    /// host:port of the leaderboard service
    pub server: String,
}

/// Gameplay settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameplaySettings {
    /// Delayed Auto Shift in milliseconds
    pub das_ms: u64,
    /// Auto Repeat Rate in milliseconds
    pub arr_ms: u64,
    /// Gravity interval at the start of a game
    pub initial_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillSettings {
    pub slow_cooldown_ms: u64,
    pub slow_duration_ms: u64,
    pub clear_row_cooldown_ms: u64,
    pub swap_next_cooldown_ms: u64,
}

/// Key bindings (stored as strings for easy editing)
/// Each action can have one or more keys bound to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    #[serde(deserialize_with = "deserialize_keys", serialize_with = "serialize_keys")]
    pub move_left: Vec<String>,
    #[serde(deserialize_with = "deserialize_keys", serialize_with = "serialize_keys")]
    pub move_right: Vec<String>,
    #[serde(deserialize_with = "deserialize_keys", serialize_with = "serialize_keys")]
    pub soft_drop: Vec<String>,
    #[serde(deserialize_with = "deserialize_keys", serialize_with = "serialize_keys")]
    pub hard_drop: Vec<String>,
    #[serde(deserialize_with = "deserialize_keys", serialize_with = "serialize_keys")]
    pub rotate: Vec<String>,
    #[serde(deserialize_with = "deserialize_keys", serialize_with = "serialize_keys")]
    pub pause: Vec<String>,
    #[serde(deserialize_with = "deserialize_keys", serialize_with = "serialize_keys")]
    pub reset: Vec<String>,
    #[serde(deserialize_with = "deserialize_keys", serialize_with = "serialize_keys")]
    pub skill_slow: Vec<String>,
    #[serde(deserialize_with = "deserialize_keys", serialize_with = "serialize_keys")]
    pub skill_clear_row: Vec<String>,
    #[serde(deserialize_with = "deserialize_keys", serialize_with = "serialize_keys")]
    pub skill_swap_next: Vec<String>,
    #[serde(deserialize_with = "deserialize_keys", serialize_with = "serialize_keys")]
    pub quit: Vec<String>,
}

/// Deserialize keys as either a single string or array of strings
fn deserialize_keys<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct KeysVisitor;

    impl<'de> Visitor<'de> for KeysVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or array of strings")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![v.to_string()])
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: de::SeqAccess<'de>,
        {
            let mut keys = Vec::new();
            while let Some(key) = seq.next_element::<String>()? {
                keys.push(key);
            }
            Ok(keys)
        }
    }

    deserializer.deserialize_any(KeysVisitor)
}

/// Serialize keys: single key as string, multiple as array
fn serialize_keys<S>(keys: &[String], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeSeq;

    match keys {
        [single] => serializer.serialize_str(single),
        _ => {
            let mut seq = serializer.serialize_seq(Some(keys.len()))?;
            for key in keys {
                seq.serialize_element(key)?;
            }
            seq.end()
        }
    }
}

fn keys(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            name: "Anonymous".to_string(),
        }
    }
}

impl Default for LeaderboardSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            server: DEFAULT_SERVER.to_string(),
        }
    }
}

impl Default for GameplaySettings {
    fn default() -> Self {
        Self {
            das_ms: 170,
            arr_ms: 50,
            initial_interval_ms: 800,
        }
    }
}

impl Default for SkillSettings {
    fn default() -> Self {
        Self {
            slow_cooldown_ms: 30_000,
            slow_duration_ms: 10_000,
            clear_row_cooldown_ms: 20_000,
            swap_next_cooldown_ms: 15_000,
        }
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            move_left: keys(&["Left"]),
            move_right: keys(&["Right"]),
            soft_drop: keys(&["Down"]),
            hard_drop: keys(&["Space"]),
            rotate: keys(&["Up"]),
            pause: keys(&["p", "Esc"]),
            reset: keys(&["r"]),
            skill_slow: keys(&["1"]),
            skill_clear_row: keys(&["2"]),
            skill_swap_next: keys(&["3"]),
            quit: keys(&["q"]),
        }
    }
}

impl Settings {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("com", "blockfall", "blockfall")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the default settings file path
    pub fn default_path() -> Result<PathBuf, SettingsError> {
        Self::config_dir()
            .map(|dir| dir.join("settings.toml"))
            .ok_or(SettingsError::NoConfigDir)
    }

    /// Parse and validate a settings file
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings =
            toml::from_str(&contents).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from `path`, writing the defaults there if it doesn't exist yet
    pub fn load_or_create(path: &Path) -> Result<Self, SettingsError> {
        if path.exists() {
            return Self::load_from(path);
        }
        let settings = Self::default();
        match settings.save_to(path) {
            Ok(()) => tracing::info!(path = %path.display(), "wrote default settings"),
            Err(e) => tracing::warn!(error = %e, "could not write default settings"),
        }
        Ok(settings)
    }

    /// Save settings to file
    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| SettingsError::Write {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let floor = MIN_INTERVAL.as_millis() as u64;
        if self.gameplay.initial_interval_ms < floor {
            return Err(SettingsError::Invalid(format!(
                "gameplay.initial_interval_ms must be at least {floor}"
            )));
        }
        if self.skills.slow_cooldown_ms < self.skills.slow_duration_ms {
            return Err(SettingsError::Invalid(
                "skills.slow_cooldown_ms must not be shorter than skills.slow_duration_ms"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Session tunables derived from these settings
    pub fn game_config(&self, seed: Option<u64>) -> GameConfig {
        let skills = &self.skills;
        GameConfig {
            initial_interval: Duration::from_millis(self.gameplay.initial_interval_ms),
            skills: SkillTimings {
                slow_cooldown: Duration::from_millis(skills.slow_cooldown_ms),
                slow_duration: Duration::from_millis(skills.slow_duration_ms),
                clear_row_cooldown: Duration::from_millis(skills.clear_row_cooldown_ms),
                swap_next_cooldown: Duration::from_millis(skills.swap_next_cooldown_ms),
            },
            seed,
        }
    }
}
