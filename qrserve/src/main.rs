use anyhow::Context;
use clap::Parser;
use qrserve::{Application, Config, telemetry};

/// Registers the Ctrl+C and SIGTERM listeners and returns a future that resolves on the first
/// signal. Registration errors are returned here so the server never starts without them.
#[cfg(unix)]
fn shutdown_signal() -> anyhow::Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt()).context("Failed to listen for Ctrl+C")?;
    let mut terminate = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => {
                tracing::info!("Received Ctrl+C, shutting down gracefully...");
            },
            _ = terminate.recv() => {
                tracing::info!("Received SIGTERM, shutting down gracefully...");
            },
        }
    })
}

#[cfg(windows)]
fn shutdown_signal() -> anyhow::Result<impl Future<Output = ()>> {
    let mut ctrl_c = tokio::signal::windows::ctrl_c().context("Failed to listen for Ctrl+C")?;

    Ok(async move {
        ctrl_c.recv().await;
        tracing::info!("Received Ctrl+C, shutting down gracefully...");
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = qrserve::config::Args::parse();

    let config = Config::load(&args)?;

    if args.validate {
        println!("Configuration is valid.");
        return Ok(());
    }

    telemetry::init_telemetry(config.enable_otel_export)?;

    tracing::debug!("{:?}", args);

    let shutdown = shutdown_signal()?;
    Application::new(config).await?.serve(shutdown).await
}
