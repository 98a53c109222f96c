use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use oopass::config_models::cli_args;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::FmtSubscriber;

pub fn main() -> Result<()> {
    let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .build()
        .context("Could not create tokio runtime")?;

    let run_result = tokio_runtime.block_on(async {
        // Fetch the CLI arguments
        let args = cli_args::Args::parse();

        #[cfg(not(feature = "tokio-console"))]
        {
            if args.tokio_console {
                anyhow::bail!("tokio-console not included. Build with tokio-console feature-flag.");
            }
            set_up_logger()?;
        }

        #[cfg(feature = "tokio-console")]
        if args.tokio_console {
            console_subscriber::init();
        } else {
            set_up_logger()?;
        }

        oopass::run(args).await
    });

    tokio_runtime.shutdown_timeout(tokio::time::Duration::from_secs(2));

    run_result
}

/// Configure logger to use ISO-8601, of which rfc3339 is a subset. Install
/// global collector configured based on RUST_LOG env var. Accepted `RUST_LOG`
/// values are `trace`, `debug`, `info`, `warn`, and `error`.
///
/// Log lines go to stderr so that a derived password is the only thing on
/// stdout.
fn set_up_logger() -> Result<()> {
    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .finish(),
    )
    .context("Failed to set trace subscriber")
}
