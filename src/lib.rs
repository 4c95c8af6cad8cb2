//! # tmi-client
//!
//! A persistent client for Twitch-style chat (TMI): IRC lines over a
//! WebSocket, with the connection kept alive for the life of the client.
//!
//! ## Features
//!
//! - Line parsing with IRCv3 tags, prefixes, verbs and parameters
//! - Channel membership tracking with automatic re-join after reconnects
//! - Independent outbound rate limiting for JOIN/PART and PRIVMSG
//! - Keepalive: PING answered immediately, stale connections recycled
//! - Exponential reconnect backoff with jitter
//! - Ordered, error-isolated event fan-out to observers
//! - A sans-IO [`state::ConnectionMachine`] and an optional Tokio driver
//!   ([`Client`]) with WebSocket and TCP transports

#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! ## Quick Start
//!
//! ### Parsing lines
//!
//! ```rust
//! use tmi_client::{Command, Verb};
//!
//! let raw = "@display-name=Bob :bob!bob@bob.tmi.twitch.tv PRIVMSG #rust :Hello!";
//! let cmd: Command = raw.parse().expect("valid line");
//!
//! assert_eq!(cmd.kind(), Verb::Privmsg);
//! assert_eq!(cmd.tag("display-name"), Some("Bob"));
//! assert_eq!(cmd.to_string(), raw);
//! ```
//!
//! ### Running a client
//!
//! ```no_run
//! use tmi_client::{Client, ClientConfig, Event};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new(ClientConfig::default())?;
//! let mut events = client.events();
//! client.login();
//! client.join_channel("#rust");
//!
//! while let Some(event) = events.recv().await {
//!     if let Event::Message(msg) = event {
//!         println!("[{}] {}: {}", msg.channel, msg.display_name(), msg.text);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod casemap;
pub mod chan;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod keepalive;
pub mod message;
pub mod prefix;
pub mod ratelimit;
pub mod registry;
pub mod state;
pub mod util;

#[cfg(feature = "tokio")]
#[cfg_attr(docsrs, doc(cfg(feature = "tokio")))]
pub mod client;
#[cfg(feature = "tokio")]
#[cfg_attr(docsrs, doc(cfg(feature = "tokio")))]
pub mod transport;

pub use self::backoff::Backoff;
pub use self::casemap::{irc_eq, irc_to_lower};
pub use self::chan::ChannelName;
pub use self::config::{ClientConfig, Credentials};
pub use self::dispatch::{EventDispatcher, Observer, ObserverError, ObserverId};
pub use self::error::{ClientError, ConfigError, ParseError, TransportError};
pub use self::event::{ChatMessage, Event};
pub use self::keepalive::KeepaliveMonitor;
pub use self::message::{Command, Tags, Verb};
pub use self::prefix::Prefix;
pub use self::ratelimit::{OutboundRequest, RateLimitPolicy, RateLimiter, RequestKind};
pub use self::registry::{ChannelRegistry, MembershipState};
pub use self::state::{Action, ConnectionMachine, ConnectionState};

#[cfg(feature = "tokio")]
pub use self::client::Client;
#[cfg(feature = "tokio")]
pub use self::dispatch::EventSender;
#[cfg(feature = "tokio")]
pub use self::transport::{Connector, TcpConnector, Transport, WebSocketConnector};
