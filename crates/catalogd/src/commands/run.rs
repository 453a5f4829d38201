//! The `run` subcommand: wires the catalog client, configured listeners,
//! and readiness sink into the watch engine, and drives it to completion.

use std::sync::Arc;

use anyhow::{Context, Result};
use catalogd_catalog::CatalogClient;
use catalogd_config::Config;
use catalogd_dns::{DnsListener, RegistrarClient};
use catalogd_listener::{GatewayListener, HostsListener, Listener};
use catalogd_notify::{NotifySink, SystemdNotifySink};
use catalogd_watch::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::fatal;

/// Loads configuration from `project`, then runs the agent on a fresh
/// multi-threaded runtime until a shutdown signal arrives or a watch task
/// fails fatally.
pub fn run(project: &str) -> Result<()> {
    let config = Config::load_from_dir(project).context("failed to load configuration")?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(run_async(config))
}

async fn run_async(config: Config) -> Result<()> {
    let notify: Arc<dyn NotifySink> = Arc::new(SystemdNotifySink::new());
    let cancel = CancellationToken::new();
    tokio::spawn(wait_for_shutdown_signal(cancel.clone()));

    let source = Arc::new(
        CatalogClient::new(
            &config.catalog.address,
            config.catalog.token.clone(),
            config.catalog.datacenter.clone(),
        )
        .context("failed to construct catalog client")?,
    );

    let listeners = build_listeners(&config)?;
    info!(listeners = listeners.len(), "starting watch engine");

    let result = watch(source, listeners, notify.clone(), cancel).await;
    notify.stopping().await;

    match result {
        Ok(()) => {
            info!("shut down cleanly");
            Ok(())
        }
        Err(err) => {
            let err =
                anyhow::Error::from(err).context("watch engine exited with a fatal error");
            fatal::report(&err);
            Err(err)
        }
    }
}

/// Builds the listener set named by enabled config sections. The watch
/// engine treats these uniformly; which ones exist is the only thing this
/// binary decides on the library crates' behalf.
fn build_listeners(config: &Config) -> Result<Vec<Arc<dyn Listener>>> {
    let mut listeners: Vec<Arc<dyn Listener>> = Vec::new();

    if config.hosts.enabled {
        listeners.push(Arc::new(HostsListener::new(
            config.hosts.file.clone(),
            config.domains.node.clone(),
        )));
    }

    if config.gateway.enabled {
        listeners.push(Arc::new(GatewayListener::new(
            config.gateway.key_prefix.clone(),
            config.gateway.http_file.clone(),
            config.gateway.exec.clone(),
        )));
    }

    if config.dns.enabled {
        let client = RegistrarClient::new(
            config.dns.registrar.api_key.clone(),
            config.dns.registrar.secret_key.clone(),
        );
        listeners.push(Arc::new(DnsListener::new(
            client,
            config.dns.domains.clone(),
            config.dns.dry_run,
        )));
    }

    if listeners.is_empty() {
        anyhow::bail!(
            "no listener is enabled; enable at least one of hosts/gateway/dns in configuration"
        );
    }

    Ok(listeners)
}

/// Waits for any signal that should trigger a graceful shutdown —
/// interrupt, hangup, quit, or terminate — and cancels the watch group.
async fn wait_for_shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = unix_signal(tokio::signal::unix::SignalKind::terminate());
    #[cfg(unix)]
    let hangup = unix_signal(tokio::signal::unix::SignalKind::hangup());
    #[cfg(unix)]
    let quit = unix_signal(tokio::signal::unix::SignalKind::quit());

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    #[cfg(not(unix))]
    let hangup = std::future::pending::<()>();
    #[cfg(not(unix))]
    let quit = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received interrupt, shutting down"),
        () = terminate => info!("received terminate signal, shutting down"),
        () = hangup => info!("received hangup signal, shutting down"),
        () = quit => info!("received quit signal, shutting down"),
    }

    cancel.cancel();
}

#[cfg(unix)]
async fn unix_signal(kind: tokio::signal::unix::SignalKind) {
    let Ok(mut stream) = tokio::signal::unix::signal(kind) else {
        return;
    };
    stream.recv().await;
}
