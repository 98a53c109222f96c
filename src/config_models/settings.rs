use std::fmt;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context;
use anyhow::Result;
use directories::ProjectDirs;
use serde::Deserialize;
use serde::Serialize;

pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// User settings as stored: every value is an optional string and is only
/// validated when an exchange is prepared.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_email: Option<String>,
    pub server_host: Option<String>,
    pub server_port: Option<String>,
    pub alphabet: Option<String>,
    pub password_length: Option<String>,
    pub hmac_key: Option<String>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_email", &self.api_email)
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("alphabet", &self.alphabet)
            .field("password_length", &self.password_length)
            .field("hmac_key", &self.hmac_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Names of the settings, as typed on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SettingKey {
    ApiEmail,
    ServerHost,
    ServerPort,
    Alphabet,
    PasswordLength,
    HmacKey,
}

impl Settings {
    pub fn get(&self, key: SettingKey) -> Option<&str> {
        self.slot(key).as_deref()
    }

    pub fn set(&mut self, key: SettingKey, value: impl Into<String>) {
        *self.slot_mut(key) = Some(value.into());
    }

    fn slot(&self, key: SettingKey) -> &Option<String> {
        match key {
            SettingKey::ApiEmail => &self.api_email,
            SettingKey::ServerHost => &self.server_host,
            SettingKey::ServerPort => &self.server_port,
            SettingKey::Alphabet => &self.alphabet,
            SettingKey::PasswordLength => &self.password_length,
            SettingKey::HmacKey => &self.hmac_key,
        }
    }

    fn slot_mut(&mut self, key: SettingKey) -> &mut Option<String> {
        match key {
            SettingKey::ApiEmail => &mut self.api_email,
            SettingKey::ServerHost => &mut self.server_host,
            SettingKey::ServerPort => &mut self.server_port,
            SettingKey::Alphabet => &mut self.alphabet,
            SettingKey::PasswordLength => &mut self.password_length,
            SettingKey::HmacKey => &mut self.hmac_key,
        }
    }
}

/// Where settings live between runs.
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<Settings>;

    fn save(&self, settings: &Settings) -> Result<()>;
}

/// Settings kept as JSON in a single file.
///
/// The file holds the HMAC key, so it is created readable by its owner only.
#[derive(Debug, Clone)]
pub struct JsonSettingsFile {
    path: PathBuf,
}

impl JsonSettingsFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The platform default location, e.g.
    ///
    /// - Linux:   /home/alice/.config/oopass/settings.json
    /// - Windows: C:\Users\Alice\AppData\Roaming\oopass\oopass\config\settings.json
    /// - macOS:   /Users/Alice/Library/Application Support/org.oopass.oopass/settings.json
    pub fn default_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("org", "oopass", "oopass")
            .context("Could not determine settings directory")?;
        Ok(project_dirs.config_dir().join(SETTINGS_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(unix)]
    fn create_file_unix(path: &Path, contents: String) -> Result<()> {
        // 0600 so other users on the same machine cannot read the HMAC key
        use std::os::unix::prelude::OpenOptionsExt;
        fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .mode(0o600)
            .open(path)?;
        fs::write(path, contents).context("Failed to write settings file to disk")
    }

    #[cfg(not(unix))]
    fn create_file_windows(path: &Path, contents: String) -> Result<()> {
        fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        fs::write(path, contents).context("Failed to write settings file to disk")
    }
}

impl SettingsStore for JsonSettingsFile {
    /// A missing file reads as empty settings.
    fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to decode settings from {}", self.path.display()))
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }

        let json = serde_json::to_string_pretty(settings)?;

        #[cfg(unix)]
        {
            Self::create_file_unix(&self.path, json)
        }
        #[cfg(not(unix))]
        {
            Self::create_file_windows(&self.path, json)
        }
    }
}

/// In-memory store, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySettings {
    settings: Mutex<Settings>,
}

impl MemorySettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Settings> {
        self.settings
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl SettingsStore for MemorySettings {
    fn load(&self) -> Result<Settings> {
        Ok(self.lock().clone())
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        *self.lock() = settings.clone();
        Ok(())
    }
}
