//! Sans-IO connection state machine.
//!
//! The machine performs no I/O and reads no clock. The driver feeds it
//! transport events, inbound lines, application requests and the current
//! [`Instant`](std::time::Instant), and carries out the [`Action`]s it
//! returns, in order.
//!
//! # Example
//!
//! ```
//! use std::time::Instant;
//! use tmi_client::state::{Action, ConnectionMachine, ConnectionState};
//! use tmi_client::ClientConfig;
//!
//! let now = Instant::now();
//! let mut machine = ConnectionMachine::new(ClientConfig::default(), now);
//!
//! let actions = machine.login(now);
//! assert!(matches!(actions[0], Action::Open));
//!
//! // The transport is up: the handshake lines come back as `Send` actions.
//! let actions = machine.transport_opened(now);
//! assert_eq!(machine.state(), ConnectionState::Authenticating);
//! assert!(actions.iter().any(|a| matches!(a, Action::Send(cmd) if cmd.verb == "NICK")));
//!
//! let _ = machine.receive_line(":tmi.twitch.tv 001 justinfan1 :Welcome, GLHF!", now);
//! assert_eq!(machine.state(), ConnectionState::Connected);
//! ```

mod machine;

pub use self::machine::ConnectionMachine;

use std::fmt;

use crate::event::Event;
use crate::message::Command;

/// Lifecycle state of the connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionState {
    /// Initial state; nothing open.
    #[default]
    Disconnected,
    /// Transport open requested.
    Connecting,
    /// Transport open, handshake sent, awaiting the welcome.
    Authenticating,
    /// Welcome received; normal operation.
    Connected,
    /// Transport lost; waiting out the backoff.
    Reconnecting,
    /// Destroyed or fatally rejected. Terminal.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Authenticating => "authenticating",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Work the driver must carry out.
#[derive(Clone, Debug)]
pub enum Action {
    /// Open a transport to the configured URL.
    Open,
    /// Write one line to the current transport.
    Send(Command),
    /// Drop the current transport (or abandon a pending open).
    Close,
    /// Publish an event to observers.
    Emit(Event),
}
