//! Oblivious password derivation.
//!
//! A site password is derived from a master password, a user name and a
//! domain with the help of a remote OPRF server. The server contributes a
//! secret key to the derivation but never sees the master password, and the
//! client never sees the server key.
//!
//! - [`oprf`]: blinding, unblinding and the final keyed hash over secp256k1
//! - [`protocol`]: the message exchange with the server
//! - [`prng`]: turning the shared secret into characters
//! - [`config_models`]: settings and command-line arguments
//
// If code coverage tool `cargo-llvm-cov` is running with the nightly toolchain,
// enable the unstable “coverage” attribute. Test modules are annotated with
// `#[cfg_attr(coverage_nightly, coverage(off))]`.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config_models;
pub mod error;
pub mod master_password;
pub mod oprf;
pub mod prng;
pub mod protocol;

use anyhow::Context;
use anyhow::Result;
use config_models::cli_args;
use config_models::cli_args::Command;
use config_models::exchange_params::ExchangeParams;
use config_models::settings::SettingKey;
use config_models::settings::SettingsStore;
use oprf::ExchangeRequest;
use protocol::ClientConfig;
use protocol::OprfClient;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use error::ExchangeError;

/// Announced to the server in the client hello.
pub const CLIENT_VERSION: &str = "1.1.2.android";

/// Expected verbatim in the server's handshake acknowledgement.
pub const PROTOCOL_VERSION: &str = "2.0.*";

/// Runs the command selected on the command line.
///
/// Ctrl-C cancels a derivation in progress; the connection is closed and no
/// setting is changed.
pub async fn run(args: cli_args::Args) -> Result<()> {
    let store = args.settings_file()?;

    let Some(command) = args.command.clone() else {
        show_settings(&store)?;
        return Ok(());
    };

    match command {
        Command::Derive {
            user,
            domain,
            offset,
        } => {
            let params = ExchangeParams::resolve(&store)?;
            let master = master_password::read_master_password()?;
            let request = ExchangeRequest::new(master.as_str(), user, domain)?.with_offset(offset);

            let client = OprfClient::new(ClientConfig {
                response_timeout: args.timeout,
                ..ClientConfig::default()
            });

            let cancel = CancellationToken::new();
            let ctrl_c = {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        info!("interrupted, cancelling exchange");
                        cancel.cancel();
                    }
                })
            };

            let derived = client
                .derive_password_over_tcp(request, &params, args.connect_timeout, &cancel)
                .await;
            ctrl_c.abort();

            let password = derived?;
            println!("{}", password.as_str());
        }
        Command::Set { key, value } => {
            let mut settings = store.load()?;
            settings.set(key, value);
            store
                .save(&settings)
                .with_context(|| format!("Failed to save {}", store.path().display()))?;
            info!("stored {key:?} in {}", store.path().display());
        }
        Command::Show => show_settings(&store)?,
    }

    Ok(())
}

fn show_settings(store: &config_models::settings::JsonSettingsFile) -> Result<()> {
    let settings = store.load()?;
    println!("settings file: {}", store.path().display());
    for (name, key) in [
        ("api-email", SettingKey::ApiEmail),
        ("server-host", SettingKey::ServerHost),
        ("server-port", SettingKey::ServerPort),
        ("alphabet", SettingKey::Alphabet),
        ("password-length", SettingKey::PasswordLength),
    ] {
        println!("{name:>16}: {}", settings.get(key).unwrap_or("<unset>"));
    }
    let hmac_key_state = if settings.get(SettingKey::HmacKey).is_some() {
        "<set>"
    } else {
        "<generated on first derive>"
    };
    println!("{:>16}: {hmac_key_state}", "hmac-key");
    Ok(())
}
