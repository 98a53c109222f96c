mod common;

use std::time::Duration;

use common::fake_server::FakeOprfServer;
use common::fake_server::ServerMode;
use common::logging;
use oopass::config_models::exchange_params::ExchangeParams;
use oopass::config_models::settings::MemorySettings;
use oopass::config_models::settings::SettingKey;
use oopass::config_models::settings::Settings;
use oopass::config_models::settings::SettingsStore;
use oopass::oprf::ExchangeRequest;
use oopass::oprf::OprfKey;
use oopass::protocol::ClientConfig;
use oopass::protocol::OprfClient;
use oopass::protocol::SessionPhase;
use oopass::ExchangeError;
use tokio_util::sync::CancellationToken;

const SERVER_KEY: &str = "2b1f5ad1c0ffee0000000000000000000000000000000000000000000000beef";
const HMAC_KEY: &str = "00112233445566778899aabbccddeeff";
const MASTER: &str = "correct horse battery staple";
const ALPHANUMERIC: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

fn settings_for(port: u16) -> Settings {
    Settings {
        api_email: Some("alice@example.com".to_owned()),
        server_host: Some("127.0.0.1".to_owned()),
        server_port: Some(port.to_string()),
        alphabet: Some(ALPHANUMERIC.to_owned()),
        password_length: None,
        hmac_key: Some(HMAC_KEY.to_owned()),
    }
}

fn alice() -> ExchangeRequest {
    ExchangeRequest::new(MASTER, "alice", "example.com").unwrap()
}

async fn honest_server() -> anyhow::Result<FakeOprfServer> {
    FakeOprfServer::start(OprfKey::from_hex(SERVER_KEY)?, ServerMode::Honest).await
}

/// test: the full flow over TCP reproduces a known password
///
/// With a fixed server key and HMAC key the derived password depends only on
/// the inputs, whatever blinding scalar the client draws.
#[tokio::test(flavor = "multi_thread")]
async fn known_inputs_derive_known_password() -> anyhow::Result<()> {
    logging::tracing_logger();

    let server = honest_server().await?;
    let params = ExchangeParams::resolve(&MemorySettings::new(settings_for(server.port())))?;
    let client = OprfClient::default();

    let password = client
        .derive_password_over_tcp(alice(), &params, CONNECT_TIMEOUT, &CancellationToken::new())
        .await?;
    assert_eq!("XnD4zM6Ju9uM0lBO", password.as_str());

    let requests = server.blinded_requests();
    assert_eq!(1, requests.len());
    assert!(requests[0].ends_with(
        ",2db5bab7423e63c524edab39de2e8965e36e7edcdea2230e96797c212eb2ffd9,alice@example.com"
    ));
    assert!(!requests[0].contains(MASTER));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn offset_rotates_the_password() -> anyhow::Result<()> {
    logging::tracing_logger();

    let server = honest_server().await?;
    let params = ExchangeParams::resolve(&MemorySettings::new(settings_for(server.port())))?;

    let password = OprfClient::default()
        .derive_password_over_tcp(
            alice().with_offset(1),
            &params,
            CONNECT_TIMEOUT,
            &CancellationToken::new(),
        )
        .await?;
    assert_eq!("6ybpvGkTgQd2sswr", password.as_str());

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_derivations_blind_differently() -> anyhow::Result<()> {
    logging::tracing_logger();

    let server = honest_server().await?;
    let params = ExchangeParams::resolve(&MemorySettings::new(settings_for(server.port())))?;
    let client = OprfClient::default();
    let cancel = CancellationToken::new();

    let first = client
        .derive_password_over_tcp(alice(), &params, CONNECT_TIMEOUT, &cancel)
        .await?;
    let second = client
        .derive_password_over_tcp(alice(), &params, CONNECT_TIMEOUT, &cancel)
        .await?;
    assert_eq!(first, second);

    let requests = server.blinded_requests();
    assert_eq!(2, requests.len());
    assert_ne!(requests[0], requests[1]);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn generated_hmac_key_is_reused_across_runs() -> anyhow::Result<()> {
    logging::tracing_logger();

    let server = honest_server().await?;
    let mut settings = settings_for(server.port());
    settings.hmac_key = None;
    settings.password_length = Some("24".to_owned());
    let store = MemorySettings::new(settings);
    let client = OprfClient::default();
    let cancel = CancellationToken::new();

    let first_params = ExchangeParams::resolve(&store)?;
    let first = client
        .derive_password_over_tcp(alice(), &first_params, CONNECT_TIMEOUT, &cancel)
        .await?;

    let stored_key = store.load()?.get(SettingKey::HmacKey).map(str::to_owned);
    assert_eq!(Some(first_params.hmac_key.as_str().to_owned()), stored_key);

    let second = client
        .derive_password_over_tcp(
            alice(),
            &ExchangeParams::resolve(&store)?,
            CONNECT_TIMEOUT,
            &cancel,
        )
        .await?;
    assert_eq!(24, first.chars().count());
    assert_eq!(first, second);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_point_is_invalid_curve_point() -> anyhow::Result<()> {
    logging::tracing_logger();

    let server = FakeOprfServer::start(OprfKey::random(), ServerMode::RejectAll).await?;
    let params = ExchangeParams::resolve(&MemorySettings::new(settings_for(server.port())))?;

    let result = OprfClient::default()
        .derive_password_over_tcp(alice(), &params, CONNECT_TIMEOUT, &CancellationToken::new())
        .await;
    let err = result.unwrap_err();
    assert!(matches!(err, ExchangeError::InvalidCurvePoint));
    assert_eq!("invalid curve point", err.to_string());

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn off_curve_answer_is_invalid_curve_point() -> anyhow::Result<()> {
    logging::tracing_logger();

    let server = FakeOprfServer::start(OprfKey::random(), ServerMode::MangledBeta).await?;
    let params = ExchangeParams::resolve(&MemorySettings::new(settings_for(server.port())))?;

    let result = OprfClient::default()
        .derive_password_over_tcp(alice(), &params, CONNECT_TIMEOUT, &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(ExchangeError::InvalidCurvePoint)));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn silent_server_times_out() -> anyhow::Result<()> {
    logging::tracing_logger();

    let server = FakeOprfServer::start(OprfKey::random(), ServerMode::SilentAfterHello).await?;
    let params = ExchangeParams::resolve(&MemorySettings::new(settings_for(server.port())))?;
    let client = OprfClient::new(ClientConfig {
        response_timeout: Duration::from_millis(200),
        ..ClientConfig::default()
    });

    let result = client
        .derive_password_over_tcp(alice(), &params, CONNECT_TIMEOUT, &CancellationToken::new())
        .await;
    let err = result.unwrap_err();
    assert!(matches!(
        err,
        ExchangeError::Timeout {
            phase: SessionPhase::AwaitingHandshakeAck,
            ..
        }
    ));
    assert!(err.is_transient());

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn silence_after_ack_times_out_awaiting_beta_and_hangs_up() -> anyhow::Result<()> {
    logging::tracing_logger();

    let server = FakeOprfServer::start(OprfKey::random(), ServerMode::SilentAfterAck).await?;
    let params = ExchangeParams::resolve(&MemorySettings::new(settings_for(server.port())))?;
    let client = OprfClient::new(ClientConfig {
        response_timeout: Duration::from_millis(200),
        ..ClientConfig::default()
    });

    let result = client
        .derive_password_over_tcp(alice(), &params, CONNECT_TIMEOUT, &CancellationToken::new())
        .await;
    assert!(matches!(
        result,
        Err(ExchangeError::Timeout {
            phase: SessionPhase::AwaitingBetaPoint,
            ..
        })
    ));
    assert_eq!(1, server.blinded_requests().len());

    // the server notices the closed connection shortly after
    let mut waited = Duration::ZERO;
    while server.client_hangups() == 0 && waited < Duration::from_secs(2) {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += Duration::from_millis(10);
    }
    assert_eq!(1, server.client_hangups());

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn cancellation_ends_a_stalled_exchange() -> anyhow::Result<()> {
    logging::tracing_logger();

    let server = FakeOprfServer::start(OprfKey::random(), ServerMode::SilentAfterHello).await?;
    let params = ExchangeParams::resolve(&MemorySettings::new(settings_for(server.port())))?;
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        })
    };

    let result = OprfClient::default()
        .derive_password_over_tcp(alice(), &params, CONNECT_TIMEOUT, &cancel)
        .await;
    canceller.await?;
    assert!(matches!(result, Err(ExchangeError::Cancelled)));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_server_is_a_transient_error() -> anyhow::Result<()> {
    logging::tracing_logger();

    let port = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        listener.local_addr()?.port()
    };
    let params = ExchangeParams::resolve(&MemorySettings::new(settings_for(port)))?;

    let result = OprfClient::default()
        .derive_password_over_tcp(alice(), &params, CONNECT_TIMEOUT, &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(ExchangeError::Transport(_))));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_clients_do_not_interfere() -> anyhow::Result<()> {
    logging::tracing_logger();

    let server = honest_server().await?;
    let params = ExchangeParams::resolve(&MemorySettings::new(settings_for(server.port())))?;

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let params = params.clone();
            tokio::spawn(async move {
                OprfClient::default()
                    .derive_password_over_tcp(
                        alice(),
                        &params,
                        CONNECT_TIMEOUT,
                        &CancellationToken::new(),
                    )
                    .await
            })
        })
        .collect();

    for handle in handles {
        assert_eq!("XnD4zM6Ju9uM0lBO", handle.await??.as_str());
    }

    Ok(())
}
