//! Semantic events published to the application.

use std::fmt;
use std::sync::Arc;

use crate::chan::ChannelName;
use crate::error::ClientError;
use crate::message::Tags;

/// A chat message received in a channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    /// Channel the message was sent to.
    pub channel: ChannelName,
    /// Login of the sender.
    pub user: String,
    /// Message body.
    pub text: String,
    /// Tags carried by the line (badges, color, ids, ...).
    pub tags: Tags,
}

impl ChatMessage {
    /// Display name from the tags, falling back to the login.
    pub fn display_name(&self) -> &str {
        self.tags
            .get("display-name")
            .map(String::as_str)
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.user)
    }
}

/// Everything the client reports.
#[derive(Clone, Debug)]
pub enum Event {
    /// Diagnostic information.
    Debug(String),
    /// Something went wrong but the connection continues.
    Warn(String),
    /// A failure worth the application's attention.
    Error(Arc<ClientError>),
    /// The connection went away; `None` for a clean teardown.
    Disconnect(Option<Arc<ClientError>>),
    /// A chat message.
    Message(ChatMessage),
    /// This client joined a channel.
    ChannelJoin { channel: ChannelName },
    /// This client left a channel.
    ChannelLeave { channel: ChannelName },
    /// Another user joined a channel.
    UserJoin { user: String, channel: ChannelName },
    /// Another user left a channel.
    UserLeave { user: String, channel: ChannelName },
}

impl Event {
    /// Stable event name, as used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Event::Debug(_) => "debug",
            Event::Warn(_) => "warn",
            Event::Error(_) => "error",
            Event::Disconnect(_) => "disconnect",
            Event::Message(_) => "message",
            Event::ChannelJoin { .. } => "channel_join",
            Event::ChannelLeave { .. } => "channel_leave",
            Event::UserJoin { .. } => "user_join",
            Event::UserLeave { .. } => "user_leave",
        }
    }

    pub(crate) fn error(err: ClientError) -> Self {
        Event::Error(Arc::new(err))
    }

    pub(crate) fn disconnect(err: Option<ClientError>) -> Self {
        Event::Disconnect(err.map(Arc::new))
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Debug(info) | Event::Warn(info) => write!(f, "{}: {}", self.name(), info),
            Event::Error(err) => write!(f, "error: {}", err),
            Event::Disconnect(Some(err)) => write!(f, "disconnect: {}", err),
            Event::Disconnect(None) => f.write_str("disconnect"),
            Event::Message(msg) => write!(f, "[{}] <{}> {}", msg.channel, msg.user, msg.text),
            Event::ChannelJoin { channel } | Event::ChannelLeave { channel } => {
                write!(f, "{} {}", self.name(), channel)
            }
            Event::UserJoin { user, channel } | Event::UserLeave { user, channel } => {
                write!(f, "{} {} {}", self.name(), user, channel)
            }
        }
    }
}
