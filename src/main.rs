//! `smpp-pool` binary: binds a pool of sessions and sends numbered messages.
//!
//! Sends `MSG 0` through `MSG <count-1>`, logs completed inbound messages,
//! and stops early on Ctrl+C or SIGTERM.

mod cli;

use std::{error::Error, sync::Arc, time::Duration};

use clap::Parser;
use smpp_pool::{
    CompletedMessage,
    Config,
    DataCoding,
    EncodingPolicy,
    Handler,
    SmscConfig,
    TcpConnector,
    reassembly::ReassemblyPolicy,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Encoding};

fn config_from(cli: &Cli) -> Config {
    let mut smsc = SmscConfig::new(&cli.host, cli.port, &cli.system_id, &cli.password);
    smsc.system_type.clone_from(&cli.system_type);
    smsc.enquire_link = Duration::from_secs(cli.enquire_link_secs);
    smsc.read_timeout = Duration::from_secs(cli.read_timeout_secs);
    smsc.bind_timeout = Duration::from_secs(cli.bind_timeout_secs);

    let mut config = Config::new(smsc);
    config.pool_size = cli.pool_size;
    config.max_outstanding = cli.max_outstanding;
    config.global_limit = cli.global_limit;
    config.per_session_limit = cli.per_session_limit;
    config.reset_interval = Duration::from_secs(cli.reset_interval_secs);
    config.backoff = Duration::from_millis(cli.backoff_ms);
    config.reassembly = ReassemblyPolicy {
        ttl: Some(Duration::from_secs(cli.reassembly_ttl_secs)),
        max_pending: Some(cli.reassembly_max_pending),
    };
    config.encoding = match cli.encoding {
        Encoding::Default => EncodingPolicy::Fixed(DataCoding::Default),
        Encoding::Latin1 => EncodingPolicy::Fixed(DataCoding::Latin1),
        Encoding::Ucs2 => EncodingPolicy::Fixed(DataCoding::Ucs2),
        Encoding::Narrowest => EncodingPolicy::Narrowest,
    };
    config
}

#[cfg(feature = "metrics")]
fn install_metrics(cli: &Cli) -> Result<(), Box<dyn Error>> {
    if let Some(addr) = cli.metrics_addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        info!(%addr, "serving Prometheus metrics");
    }
    Ok(())
}

#[cfg(not(feature = "metrics"))]
fn install_metrics(cli: &Cli) -> Result<(), Box<dyn Error>> {
    if cli.metrics_addr.is_some() {
        warn!("built without the metrics feature; ignoring --metrics-addr");
    }
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = config_from(&cli);
    install_metrics(&cli)?;

    let connector = TcpConnector::new(config.smsc.clone());
    let handler = Handler::connect(
        &config,
        &connector,
        Arc::new(|message: CompletedMessage| {
            info!(
                session = %message.session,
                source = %message.source,
                receipt = message.is_receipt,
                text = %message.text,
                "inbound message"
            );
        }),
    )
    .await?;

    let cancel = CancellationToken::new();
    let signal_task = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            info!("shutdown requested");
            cancel.cancel();
        }
    });

    let report = handler
        .send_and_receive((0..cli.count).map(|i| format!("MSG {i}")), &cancel)
        .await;
    for failed in &report.failed {
        warn!(text = %failed.text, error = %failed.error, "message not sent");
    }
    info!(sent = report.sent, failed = report.failed.len(), "done");

    handler.close().await;
    signal_task.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use serial_test::serial;

    use super::*;
    use crate::cli::clear_environment;

    #[test]
    #[serial(env)]
    fn cli_maps_onto_config() {
        clear_environment();
        let cli = Cli::parse_from([
            "smpp-pool",
            "--host",
            "smsc.local",
            "--port",
            "2775",
            "--system-id",
            "esme",
            "--password",
            "secret",
            "--backoff-ms",
            "250",
            "--encoding",
            "latin1",
        ]);
        let config = config_from(&cli);
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.smsc.host, "smsc.local");
        assert_eq!(config.backoff, Duration::from_millis(250));
        assert_eq!(config.encoding, EncodingPolicy::Fixed(DataCoding::Latin1));
        assert_eq!(config.reassembly, ReassemblyPolicy::default());
    }
}
