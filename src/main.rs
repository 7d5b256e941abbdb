//! OSC Console GW
//!
//! Gateway keeping a live mirror of a digital mixing console over OSC/UDP.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use osc_console_gw::config::{watcher::ConfigWatcher, AppConfig};
use osc_console_gw::sniffer;
use osc_console_gw::{
    Algorithm, ConnectionStatus, ConsoleTransport, Curve, InboundMessage, LinkMonitor, SyncActor,
    SyncHandle, TransitionRequest, Transport, UdpTransport, Value,
};

/// OSC Console Gateway - mirror and automate an OSC mixing console
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Print raw inbound OSC traffic instead of running the gateway
    #[arg(long)]
    sniffer: bool,

    /// Log outbound commands instead of sending them
    #[arg(long)]
    dry_run: bool,

    /// Fade one address once the gateway is running
    #[arg(long, value_name = "ADDRESS=VALUE")]
    fade: Option<String>,

    /// Fade duration in milliseconds
    #[arg(long, default_value = "1000")]
    fade_ms: u64,

    /// Fade easing algorithm (linear, quadratic, cubic, ..., bounce)
    #[arg(long, default_value = "linear")]
    easing: Algorithm,

    /// Fade easing curve (in, out, in-out)
    #[arg(long, default_value = "in-out")]
    curve: Curve,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("Starting OSC Console GW v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    if args.sniffer {
        let config = AppConfig::load(&args.config).await?;
        sniffer::run_cli_sniffer(&config).await?;
        return Ok(());
    }

    let (config_watcher, initial_config) = ConfigWatcher::new(args.config.clone()).await?;
    info!("Configuration loaded successfully with hot-reload enabled");

    let fade = args
        .fade
        .as_deref()
        .map(|spec| {
            parse_fade(spec).map(|(address, to)| {
                TransitionRequest::new(address, to, Duration::from_millis(args.fade_ms))
                    .easing(args.easing, args.curve)
            })
        })
        .transpose()?;

    run_app(
        (*initial_config).clone(),
        config_watcher,
        args.dry_run,
        fade,
        shutdown_signal(),
    )
    .await?;

    info!("OSC Console GW shutdown complete");
    Ok(())
}

async fn run_app(
    mut config: AppConfig,
    mut config_watcher: ConfigWatcher,
    dry_run: bool,
    fade: Option<TransitionRequest>,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    info!("Starting main application loop...");

    let (transport, inbound): (Arc<dyn Transport>, Option<mpsc::UnboundedReceiver<InboundMessage>>) =
        if dry_run {
            info!("Dry run: outbound commands are logged, nothing is sent");
            let console = Arc::new(ConsoleTransport::new("dry-run").verbose());
            (console as Arc<dyn Transport>, None)
        } else {
            let (udp, inbound) =
                UdpTransport::connect(config.console.bind_addr()?, config.console.remote_addr()?)
                    .await?;
            (Arc::new(udp) as Arc<dyn Transport>, Some(inbound))
        };

    let handle = SyncActor::spawn(&config.sync, transport);
    if let Some(inbound) = inbound {
        tokio::spawn(pump_inbound(inbound, handle.clone()));
    }

    let mut changes = handle.subscribe_changes();
    let mut failures = handle.subscribe_failures();

    let mut monitor = LinkMonitor::new(config.status.unreachable_after_failures);
    let (status_tx, mut status_rx) = mpsc::unbounded_channel();
    monitor.on_status_change(Arc::new(move |status: ConnectionStatus| {
        let _ = status_tx.send(status);
    }));
    let mut was_unreachable = false;

    // While the link is down, keep asking so a returning console is noticed
    let mut retry = tokio::time::interval(config.sync.heartbeat_interval());
    retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

    handle.start();
    load_watch_list(&handle, &config.watch);
    info!("✅ Gateway running ({} watched addresses)", config.watch.len());

    if let Some(request) = fade {
        // Load the start value first, or the fade would snap
        handle.ensure_loaded(request.address.clone());
        let fade_handle = handle.clone();
        let settle = config.sync.request_timeout();
        tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            info!(
                "Fading {} to {} over {:?} ({} {})",
                request.address, request.to, request.duration, request.algorithm, request.curve
            );
            fade_handle.run_transition(request);
        });
    }

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            batch = changes.recv() => match batch {
                Ok(batch) => {
                    monitor.record_activity();
                    log_batch(&handle, &batch).await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Change listener lagged, {} batches skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    warn!("Sync actor stopped unexpectedly");
                    break;
                }
            },

            failure = failures.recv() => match failure {
                Ok(failure) => {
                    debug!(addr = %failure.address, "Query failed");
                    monitor.record_failure(&failure);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Failure listener lagged, {} signals skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            Some(status) = status_rx.recv() => match status {
                ConnectionStatus::Unreachable => was_unreachable = true,
                ConnectionStatus::Connected if was_unreachable => {
                    // The console may have rebooted: start over from a clean mirror
                    info!("🔄 Console is back, reloading state");
                    was_unreachable = false;
                    handle.reset();
                    handle.start();
                    load_watch_list(&handle, &config.watch);
                }
                _ => {}
            },

            _ = retry.tick() => {
                if monitor.status() != &ConnectionStatus::Connected {
                    debug!("Link {}, re-querying watch list", monitor.status());
                    load_watch_list(&handle, &config.watch);
                }
            }

            Some(reload) = config_watcher.next_reload() => {
                info!("📝 Configuration file changed, reloading...");

                let added = reload.current.added_watches(&reload.previous);
                for address in &added {
                    handle.ensure_loaded(*address);
                }
                if !added.is_empty() {
                    info!("Watching {} new addresses", added.len());
                }
                if reload.current.needs_restart(&reload.previous) {
                    warn!("⚠️  Console or sync settings changed; restart to apply them");
                }

                config.watch = reload.current.watch.clone();
            }

            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    handle.shutdown();
    Ok(())
}

/// Forward decoded datagrams to the sync actor until the socket closes
async fn pump_inbound(mut inbound: mpsc::UnboundedReceiver<InboundMessage>, handle: SyncHandle) {
    while let Some(msg) = inbound.recv().await {
        handle.on_message(msg);
    }
    debug!("Inbound stream closed");
}

/// Split `ADDRESS=VALUE` into a fade target
fn parse_fade(spec: &str) -> Result<(String, Value)> {
    let (address, value) = spec
        .split_once('=')
        .with_context(|| format!("--fade expects ADDRESS=VALUE, got '{}'", spec))?;
    let address = address.trim();
    if !address.starts_with('/') {
        anyhow::bail!("fade address '{}' must start with '/'", address);
    }
    let value = value.parse::<Value>().unwrap_or_else(|never| match never {});
    Ok((address.to_string(), value))
}

fn load_watch_list(handle: &SyncHandle, watch: &[String]) {
    for address in watch {
        handle.ensure_loaded(address.as_str());
    }
}

async fn log_batch(handle: &SyncHandle, batch: &osc_console_gw::ChangeBatch) {
    info!("🎛️  {} parameters changed", batch.len());

    let mut addresses: Vec<_> = batch.addresses.iter().collect();
    addresses.sort();
    for address in addresses {
        match handle.get(address.clone()).await {
            Some(value) => debug!("  {} = {}", address, value),
            None => debug!("  {} (cleared)", address),
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
