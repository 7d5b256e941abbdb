//! OSC sniffer for debugging and development
//!
//! Subscribes to the console's push updates and prints every inbound
//! message. Nothing goes through the sync actor, so this shows the raw
//! traffic the mirror would be fed with.

use anyhow::Result;
use colored::*;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::info;

use crate::config::AppConfig;
use crate::state::{Address, Value};
use crate::transport::{InboundMessage, OutboundCommand, Transport, UdpTransport};

/// Counters shown when the sniffer exits
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SnifferStats {
    pub messages: u64,
    pub subscriptions: u64,
}

/// CLI OSC sniffer
pub async fn run_cli_sniffer(config: &AppConfig) -> Result<()> {
    println!("{}", "=== OSC Sniffer ===".bold().cyan());
    println!("Press Ctrl+C to exit\n");

    let (transport, mut inbound) =
        UdpTransport::connect(config.console.bind_addr()?, config.console.remote_addr()?).await?;

    let subscribe = Address::new(&config.sync.subscribe_address);
    let mut heartbeat = tokio::time::interval(config.sync.heartbeat_interval());
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Ask for the watched values once so there is something to see right away
    for address in &config.watch {
        transport
            .send(OutboundCommand::query(Address::new(address)))
            .await?;
    }

    println!(
        "{}",
        format!("Monitoring {} ...", transport.remote()).green()
    );
    println!("{}", "Format: [elapsed] ADDRESS TYPE VALUE".dimmed());
    println!("{}\n", "─".repeat(80).dimmed());

    let start_time = Instant::now();
    let mut stats = SnifferStats::default();

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                transport.send(OutboundCommand::query(subscribe.clone())).await?;
                stats.subscriptions += 1;
            }
            msg = inbound.recv() => {
                let Some(msg) = msg else {
                    break;
                };
                stats.messages += 1;
                println!("{}", format_message(start_time.elapsed(), &msg));
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    println!(
        "\n{} ({} messages, {} subscriptions)",
        "Sniffer stopped".yellow(),
        stats.messages,
        stats.subscriptions
    );
    info!("Sniffer exited after {:?}", start_time.elapsed());
    Ok(())
}

/// One output line: elapsed time, address, type tag and value
pub fn format_message(elapsed: Duration, msg: &InboundMessage) -> String {
    let timestamp = format!("{:08}", elapsed.as_millis());
    let tag = msg.value.type_tag().to_string();

    let value = match &msg.value {
        Value::Int(_) => msg.value.to_string().bright_yellow(),
        Value::Float(_) => msg.value.to_string().bright_cyan(),
        Value::Text(_) => msg.value.to_string().bright_green(),
    };

    format!(
        "[{}ms] {:40} {} {}",
        timestamp.dimmed(),
        msg.address.as_str().white(),
        tag.bright_black(),
        value
    )
}
