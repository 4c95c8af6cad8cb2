//! Error types for the chat client.
//!
//! Parsing failures, transport failures, configuration problems and the
//! client-level taxonomy that is surfaced through `error`/`disconnect`
//! events. None of these are ever returned from the application-facing
//! calls; they travel inside events.

use thiserror::Error;

use crate::ratelimit::RequestKind;

/// Convenience type alias for Results using [`ClientError`].
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Errors encountered when parsing a protocol line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The line was empty or carried no verb after tag/prefix stripping.
    #[error("malformed line at position {position} while {context}: {line:?}")]
    Malformed {
        /// The offending raw line.
        line: String,
        /// Byte offset where parsing gave up.
        position: usize,
        /// What the parser was looking for.
        context: &'static str,
    },
}

impl ParseError {
    pub(crate) fn malformed(line: &str, position: usize, context: &'static str) -> Self {
        ParseError::Malformed {
            line: line.to_string(),
            position,
            context,
        }
    }
}

/// Errors raised by a transport implementation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport could not be opened.
    #[error("connect failed: {0}")]
    Connect(String),

    /// WebSocket protocol failure.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// The remote end closed the transport.
    #[error("closed by peer (code {code}): {reason}")]
    Closed {
        /// Close code reported by the transport.
        code: u16,
        /// Close reason reported by the transport.
        reason: String,
    },

    /// An inbound frame exceeded the maximum line length.
    #[error("line too long: {0} bytes")]
    LineTooLong(usize),

    /// Illegal control character in an inbound line.
    #[error("illegal control character: {0:?}")]
    IllegalControlChar(char),
}

impl TransportError {
    /// Whether the error concerns one inbound line rather than the
    /// connection. The transport stays usable after such an error.
    pub fn is_line_error(&self) -> bool {
        matches!(
            self,
            TransportError::LineTooLong(_) | TransportError::IllegalControlChar(_)
        )
    }
}

/// Client-level error taxonomy.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// The service rejected our credentials. Terminal.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The transport failed or closed. Recovered by reconnecting.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// An outbound request is being held by the rate limiter.
    #[error("rate limit exceeded for {kind:?} requests")]
    RateLimitExceeded {
        /// Which limiter held the request.
        kind: RequestKind,
    },

    /// The server sent something the client did not expect.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The server sent an `ERROR` line before closing.
    #[error("server error: {0}")]
    Server(String),

    /// No inbound traffic within the stale threshold.
    #[error("connection stale: no traffic for {0:?}")]
    Stale(std::time::Duration),

    /// An inbound line could not be parsed.
    #[error("invalid line")]
    Parse(#[from] ParseError),
}

impl ClientError {
    /// Whether this error ends the client for good.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ClientError::Auth(_))
    }
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A rate limit capacity was zero.
    #[error("rate limit capacity for {0} must be non-zero")]
    ZeroCapacity(&'static str),

    /// A duration that must be positive was zero.
    #[error("{0} must be non-zero")]
    ZeroDuration(&'static str),

    /// The reconnect cap is smaller than the base delay.
    #[error("max reconnect delay ({max_ms} ms) is below the base delay ({base_ms} ms)")]
    BackoffInverted {
        /// Base delay in milliseconds.
        base_ms: u64,
        /// Cap in milliseconds.
        max_ms: u64,
    },
}
