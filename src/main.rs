//! CLI for inform-relay
//!
//! Subcommands:
//! - `relay`: consume the notification queue and forward to HTTP
//! - `publish`: publish one JSON message onto the exchange
//! - `watch`: print live messages over web-STOMP

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use inform_relay::broker::{AmqpLink, Declare, Publisher, retry_forever};
use inform_relay::config::{Settings, load_config};
use inform_relay::relay::{HttpForwarder, Relay};
use inform_relay::transport::StompClient;
use inform_relay::utils::{Result, logging};
use serde_json::Value;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "inform-relay")]
enum Command {
    /// Consume the notification queue and forward every message over HTTP
    Relay,
    /// Publish a single JSON message to the configured exchange
    Publish {
        /// Routing key, e.g. card.inform
        #[arg(long)]
        routing_key: String,
        /// JSON payload
        #[arg(long)]
        payload: String,
    },
    /// Print messages arriving on a queue or an exchange binding via web-STOMP
    Watch {
        #[arg(long, conflicts_with_all = ["exchange", "binding_key"])]
        queue: Option<String>,
        /// Defaults to the configured exchange
        #[arg(long)]
        exchange: Option<String>,
        /// Defaults to the configured binding key
        #[arg(long)]
        binding_key: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    logging::init(&config.logging.level);

    let cmd = Command::parse();

    let result = match cmd {
        Command::Relay => run_relay(config).await,
        Command::Publish {
            routing_key,
            payload,
        } => run_publish(config, &routing_key, &payload).await,
        Command::Watch {
            queue,
            exchange,
            binding_key,
        } => run_watch(config, queue, exchange, binding_key).await,
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
}

async fn run_relay(config: Settings) -> Result<()> {
    let forwarder = Arc::new(HttpForwarder::new(&config.forward)?);
    info!(endpoint = forwarder.endpoint(), "forwarding notifications");
    let relay = Relay::new(config.broker, forwarder);

    tokio::select! {
        _ = relay.run() => {
            error!("Relay exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}

async fn run_publish(config: Settings, routing_key: &str, payload: &str) -> Result<()> {
    let payload: Value = serde_json::from_str(payload)?;
    let link = AmqpLink::open(&config.broker.url).await?;
    link.channel.declare_exchange(&config.broker.exchange).await?;
    let publisher = Publisher::new(link.channel.clone(), &config.broker.exchange).await?;
    let result = publisher.publish(routing_key, &payload).await;
    link.close().await;
    result
}

async fn run_watch(
    config: Settings,
    queue: Option<String>,
    exchange: Option<String>,
    binding_key: Option<String>,
) -> Result<()> {
    let delay = Duration::from_millis(config.stomp.reconnect_delay_ms);

    loop {
        let client = retry_forever(delay, |_| StompClient::connect(&config.stomp)).await;
        let subscribed = match &queue {
            Some(queue) => client.subscribe_to_queue(queue),
            None => client.subscribe_to_exchange(
                exchange.as_deref().unwrap_or(&config.broker.exchange),
                binding_key.as_deref().unwrap_or(&config.broker.binding_key),
            ),
        };
        let mut subscription = match subscribed {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!(error = %e, "subscribe failed; reconnecting");
                tokio::time::sleep(delay).await;
                continue;
            }
        };
        info!(destination = %subscription.destination, "watching");

        loop {
            tokio::select! {
                message = subscription.next() => match message {
                    Some(message) => println!("{message}"),
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received. Exiting gracefully.");
                    return client.disconnect().await;
                }
            }
        }
        info!("session ended; reconnecting");
        tokio::time::sleep(delay).await;
    }
}
