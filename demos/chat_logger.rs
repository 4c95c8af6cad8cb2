//! Chat logger
//!
//! Joins the channels listed in a TOML file and prints every chat message
//! until interrupted. Logs in anonymously unless `TMI_USERNAME` and
//! `TMI_TOKEN` are set.
//!
//! ```toml
//! channels = ["#rust", "ronni"]
//! max_reconnect_delay_ms = 30000
//! ```
//!
//! Run with: `cargo run --example chat_logger --features serde -- logger.toml`

use anyhow::Context;
use serde::Deserialize;
use tmi_client::{Client, ClientConfig, Credentials, Event};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default, Deserialize)]
struct LoggerConfig {
    #[serde(default)]
    channels: Vec<String>,
    #[serde(flatten)]
    client: ClientConfig,
}

impl LoggerConfig {
    fn load(path: &str) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "logger.toml".to_string());
    let mut config = LoggerConfig::load(&config_path)?;

    if let (Ok(username), Ok(token)) = (std::env::var("TMI_USERNAME"), std::env::var("TMI_TOKEN")) {
        config.client.credentials = Some(Credentials::new(username, token));
    }
    info!(channels = config.channels.len(), url = %config.client.url, "starting");

    let client = Client::new(config.client)?;
    let mut events = client.events();
    client.login();
    for channel in &config.channels {
        client.join_channel(channel);
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                client.destroy();
                break;
            }
            event = events.recv() => match event {
                Some(Event::Message(msg)) => {
                    println!("[{}] <{}> {}", msg.channel, msg.display_name(), msg.text);
                }
                Some(Event::ChannelJoin { channel }) => info!(%channel, "joined"),
                Some(Event::ChannelLeave { channel }) => info!(%channel, "left"),
                Some(Event::Warn(text)) => warn!("{}", text),
                Some(Event::Error(err)) => error!(error = %err, "client error"),
                Some(_) => {}
                None => break,
            },
        }
    }

    client.closed().await;
    Ok(())
}
