//! Configuration – reads/writes `~/.mnemos/config.toml`.

use mnemos_memory::EngineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted user configuration stored in `~/.mnemos/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite file holding the durable memory mirror.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Session label attached to every turn added from the shell.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_database_path() -> PathBuf {
    mnemos_dir().join("memories.db")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            session_id: None,
            engine: EngineConfig::default(),
        }
    }
}

fn home_dir() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string())
}

fn mnemos_dir() -> PathBuf {
    PathBuf::from(home_dir()).join(".mnemos")
}

/// Return the path to `~/.mnemos/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(&home_dir())
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".mnemos").join("config.toml")
}

/// Load the config from disk, falling back to defaults when the file does
/// not exist. Environment overrides are applied in both cases.
pub fn load() -> Result<Config, String> {
    let mut cfg = load_from(&config_path())?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load the config from a specific path. Returns `None` if it is missing.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `MNEMOS_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `MNEMOS_DB_PATH` | `database_path` |
/// | `MNEMOS_SESSION` | `session_id` |
/// | `MNEMOS_MAX_ENTRIES` | `engine.max_entries` |
/// | `MNEMOS_SIMILARITY_THRESHOLD` | `engine.similarity_threshold` |
///
/// Values that fail to parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("MNEMOS_DB_PATH") {
        cfg.database_path = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("MNEMOS_SESSION") {
        cfg.session_id = Some(v);
    }
    if let Ok(v) = std::env::var("MNEMOS_MAX_ENTRIES")
        && let Ok(n) = v.parse::<usize>()
    {
        cfg.engine.max_entries = n;
    }
    if let Ok(v) = std::env::var("MNEMOS_SIMILARITY_THRESHOLD")
        && let Ok(t) = v.parse::<f32>()
    {
        cfg.engine.similarity_threshold = t;
    }
}

/// Save the config to disk, creating `~/.mnemos/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
