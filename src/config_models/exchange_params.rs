use std::fmt;

use rand::RngCore;
use tracing::info;
use zeroize::Zeroizing;

use super::settings::Settings;
use super::settings::SettingsStore;
use crate::error::ExchangeError;

/// Password length used when none is configured.
pub const DEFAULT_PASSWORD_LENGTH: usize = 16;

/// Random bytes in a freshly generated HMAC key.
pub const HMAC_KEY_BYTES: usize = 16;

/// Validated settings for one exchange.
#[derive(Clone)]
pub struct ExchangeParams {
    pub hmac_key: Zeroizing<String>,
    pub api_email: String,
    pub server_host: String,
    pub server_port: u16,
    pub alphabet: String,
    pub password_length: usize,
}

impl fmt::Debug for ExchangeParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeParams")
            .field("api_email", &self.api_email)
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("alphabet", &self.alphabet)
            .field("password_length", &self.password_length)
            .finish_non_exhaustive()
    }
}

impl ExchangeParams {
    /// Reads and validates the stored settings.
    ///
    /// An absent or blank HMAC key is generated and persisted first, so a
    /// key exists even when validation then fails. Nothing here touches the
    /// network.
    pub fn resolve(store: &dyn SettingsStore) -> Result<Self, ExchangeError> {
        let mut settings = store.load().map_err(settings_error)?;

        if is_blank(settings.hmac_key.as_deref()) {
            settings.hmac_key = Some(generate_hmac_key());
            store.save(&settings).map_err(settings_error)?;
            info!("generated and stored a new HMAC key");
        }

        Self::validate(&settings)
    }

    fn validate(settings: &Settings) -> Result<Self, ExchangeError> {
        let hmac_key = Zeroizing::new(
            settings
                .hmac_key
                .clone()
                .ok_or_else(|| ExchangeError::invalid_input("HMAC key is missing"))?,
        );

        let api_email = required(settings.api_email.as_deref(), "API email")?;
        if api_email.contains(',') {
            return Err(ExchangeError::invalid_input("API email must not contain ','"));
        }

        let server_host = required(settings.server_host.as_deref(), "server host")?;

        let port = required(settings.server_port.as_deref(), "server port")?;
        let server_port = match port.parse::<u16>() {
            Ok(p) if p > 0 => p,
            _ => {
                return Err(ExchangeError::invalid_input(format!(
                    "server port must be a number from 1 to 65535, got '{port}'"
                )))
            }
        };

        // kept untrimmed: spaces may be part of the alphabet
        let alphabet = match settings.alphabet.as_deref() {
            Some(alphabet) if !alphabet.trim().is_empty() => alphabet.to_owned(),
            _ => return Err(ExchangeError::invalid_input("alphabet is missing")),
        };

        let password_length = match settings.password_length.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_PASSWORD_LENGTH,
            Some(length) => match length.parse::<usize>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(ExchangeError::invalid_input(format!(
                        "password length must be a whole number of at least 1, got '{length}'"
                    )))
                }
            },
        };

        Ok(Self {
            hmac_key,
            api_email,
            server_host,
            server_port,
            alphabet,
            password_length,
        })
    }
}

fn settings_error(e: anyhow::Error) -> ExchangeError {
    ExchangeError::Settings(format!("{e:#}"))
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

fn required(value: Option<&str>, name: &str) -> Result<String, ExchangeError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_owned()),
        _ => Err(ExchangeError::invalid_input(format!("{name} is missing"))),
    }
}

fn generate_hmac_key() -> String {
    let mut bytes = Zeroizing::new([0u8; HMAC_KEY_BYTES]);
    rand::rng().fill_bytes(bytes.as_mut_slice());
    hex::encode(bytes.as_slice())
}
