//! Exporter binary: parses the command line, installs the logger and serves metrics until
//! a termination signal is received.

use anyhow::Context as _;
use clap::Parser;
use instance_health::{HealthCollector, Registry, EXPORTER_NAME};
use instance_health_exporter::{cli::Cli, MetricsExporter};
use tokio::{runtime::Handle, sync::watch};

use std::{io, sync::Arc};

#[cfg(unix)]
async fn wait_for_stop_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.map(|()| "SIGINT"),
        _ = sigterm.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_stop_signal() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "Ctrl-C")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let log_config = cli.log_config();
    tracing::subscriber::set_global_default(log_config.subscriber())
        .context("Failed installing logger")?;
    tracing::debug!(?log_config, "Installed logger");

    let target = cli
        .target_config()
        .context("Invalid configuration of the monitored application")?;
    tracing::debug!(?target, "Set the instance health endpoint to {}", target.url());
    let collector = HealthCollector::new(target).context("Failed creating collector")?;
    let registry = Registry::new(collector, Handle::current());

    let (stop_sender, mut stop_receiver) = watch::channel(());
    tokio::spawn(async move {
        match wait_for_stop_signal().await {
            Ok(signal) => tracing::info!("{signal} received"),
            Err(err) => tracing::error!(%err, "Failed listening to termination signals"),
        }
        stop_sender.send_replace(());
    });

    let bind_address = cli.bind_address();
    let server = MetricsExporter::new(Arc::new(registry))
        .with_format(cli.format.into())
        .with_graceful_shutdown(async move {
            stop_receiver.changed().await.ok();
        })
        .bind(bind_address)
        .await
        .with_context(|| format!("Failed binding to `{bind_address}`"))?;
    let local_addr = server.local_addr();
    println!("local_addr={local_addr}");
    // ^ Print the local server address so that it can be used in integration tests
    tracing::info!("{EXPORTER_NAME} is ready to take requests at {local_addr}");

    server.start().await.context("Metrics server failed")?;
    tracing::info!("{EXPORTER_NAME} was gracefully shut down");
    Ok(())
}
