use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use clap::Subcommand;

use super::settings::JsonSettingsFile;
use super::settings::SettingKey;

/// The `oopass` command-line program derives site passwords through an OPRF
/// server without revealing the master password to it.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct Args {
    /// The settings file holding server address, API email, alphabet, length
    /// and HMAC key
    ///
    /// The default varies by operating system, e.g.
    ///
    /// Linux:   /home/alice/.config/oopass/settings.json
    ///
    /// Windows: C:\Users\Alice\AppData\Roaming\oopass\oopass\config\settings.json
    ///
    /// macOS:   /Users/Alice/Library/Application Support/org.oopass.oopass/settings.json
    #[clap(long, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Seconds to wait for each message from the server before giving up.
    #[clap(long, default_value = "10", value_parser = duration_from_seconds_str)]
    pub timeout: Duration,

    /// Seconds to wait for the TCP connection to the server.
    #[clap(long, default_value = "10", value_parser = duration_from_seconds_str)]
    pub connect_timeout: Duration,

    /// Send trace events to tokio-console instead of stdout. Requires the
    /// `tokio-console` build feature.
    #[clap(long)]
    pub tokio_console: bool,

    #[clap(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Derive the password for a user on a domain.
    ///
    /// The master password is read from the terminal, or from
    /// OOPASS_MASTER_PASSWORD when set.
    Derive {
        #[clap(long)]
        user: String,

        #[clap(long)]
        domain: String,

        /// Rotates the password for the same user and domain.
        #[clap(long, default_value = "0")]
        offset: u32,
    },

    /// Store one setting.
    Set { key: SettingKey, value: String },

    /// Print the stored settings, with the HMAC key hidden.
    Show,
}

impl Args {
    pub fn settings_file(&self) -> Result<JsonSettingsFile> {
        let path = match &self.settings {
            Some(path) => path.clone(),
            None => JsonSettingsFile::default_path()?,
        };
        Ok(JsonSettingsFile::new(path))
    }
}

impl Default for Args {
    fn default() -> Self {
        let empty: Vec<String> = vec![];
        Self::parse_from(empty)
    }
}

fn duration_from_seconds_str(s: &str) -> Result<Duration, String> {
    match s.parse::<u64>() {
        Ok(0) => Err("must be at least 1 second".to_owned()),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(e.to_string()),
    }
}
