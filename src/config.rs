//! Configuration file handling for ~/.config/gator/config.toml.
//!
//! The file is optional; a missing or empty file yields `Config::default()`.
//! Unlike most settings files it is also written by gator itself: `register`
//! and `login` record the current user here.
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Config file exceeds [`Config::MAX_FILE_SIZE`].
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid config value: {0}")]
    Invalid(String),

    #[error("HOME environment variable not set")]
    NoHome,
}

// ============================================================================
// Configuration
// ============================================================================

/// Persistent settings plus the logged-in user.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file. Relative paths resolve against the config
    /// directory; `:memory:` is passed through. Defaults to `gator.db`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,

    /// Name of the logged-in user, set by `register` and `login`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_user_name: Option<String>,

    /// Upper bound on a single feed download, headers and body together.
    pub request_timeout_secs: u64,

    /// `User-Agent` header sent with every feed request.
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            current_user_name: None,
            request_timeout_secs: 30,
            user_agent: "gator".to_string(),
        }
    }
}

const KNOWN_KEYS: [&str; 4] = [
    "db_path",
    "current_user_name",
    "request_timeout_secs",
    "user_agent",
];

const DEFAULT_DB_FILE: &str = "gator.db";

impl Config {
    /// Maximum config file size (1 MB).
    pub const MAX_FILE_SIZE: u64 = 1_048_576;

    /// `~/.config/gator/config.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = std::env::var_os("HOME").ok_or(ConfigError::NoHome)?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("gator")
            .join("config.toml"))
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    /// - Zero timeout or empty user agent → `Err(ConfigError::Invalid)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Size check before reading
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::debug!(
            path = %path.display(),
            user = ?config.current_user_name,
            "Loaded configuration"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid("user_agent must not be empty".to_string()));
        }
        Ok(())
    }

    /// Record `name` as the logged-in user and persist the file.
    pub fn set_user(&mut self, path: &Path, name: &str) -> Result<(), ConfigError> {
        self.current_user_name = Some(name.to_string());
        self.save(path)
    }

    /// Write the configuration to `path`, replacing it atomically.
    ///
    /// The parent directory is created if needed. The file is written to a
    /// fresh temporary sibling, synced, then renamed over the target, so a
    /// crash never leaves a half-written config behind.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        // Unpredictable temp name, created exclusively
        let temp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut temp_file = options.open(&temp_path)?;
        let written = temp_file
            .write_all(content.as_bytes())
            .and_then(|()| temp_file.sync_all());
        drop(temp_file);

        let renamed = written.and_then(|()| {
            #[cfg(windows)]
            if path.exists() {
                std::fs::remove_file(path)?;
            }
            std::fs::rename(&temp_path, path)
        });
        if let Err(e) = renamed {
            let _ = std::fs::remove_file(&temp_path);
            return Err(ConfigError::Io(e));
        }

        tracing::debug!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Where the database lives, given the directory holding the config file.
    pub fn database_location(&self, config_dir: &Path) -> String {
        match self.db_path.as_deref() {
            Some(":memory:") => ":memory:".to_string(),
            Some(p) if Path::new(p).is_absolute() => p.to_string(),
            Some(p) => config_dir.join(p).to_string_lossy().into_owned(),
            None => config_dir
                .join(DEFAULT_DB_FILE)
                .to_string_lossy()
                .into_owned(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Create the directory holding the config file and database.
///
/// The directory is made user-only on Unix when gator creates it, or when
/// `restrict` is set (the default `~/.config/gator`). An existing directory
/// chosen with `--config` keeps its permissions.
pub fn prepare_config_dir(dir: &Path, restrict: bool) -> Result<(), ConfigError> {
    let created = if dir.exists() {
        false
    } else {
        std::fs::create_dir_all(dir)?;
        true
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if created || restrict {
            let perms = std::fs::Permissions::from_mode(0o700);
            if let Err(e) = std::fs::set_permissions(dir, perms) {
                tracing::warn!(
                    path = %dir.display(),
                    error = %e,
                    "Failed to set config directory permissions to 0700"
                );
            }
        }
    }
    #[cfg(not(unix))]
    let _ = (created, restrict);

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
