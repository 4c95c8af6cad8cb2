//! Line-oriented transports.
//!
//! The client core only ever sees whole protocol lines. A [`Connector`]
//! opens a [`Transport`] for a URL; the transport moves lines in both
//! directions and reports closure. Two implementations ship with the
//! crate: [`WebSocketConnector`] for `ws://`/`wss://` endpoints and
//! [`TcpConnector`] for plain `host:port` sockets.

use async_trait::async_trait;

use crate::error::TransportError;

mod tcp;
mod websocket;

pub use self::tcp::{TcpConnector, TcpTransport};
pub use self::websocket::{WebSocketConnector, WebSocketTransport};

/// Opens transports.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport;

    /// Open a transport to `url`.
    async fn open(&self, url: &str) -> Result<Self::Transport, TransportError>;
}

/// A bidirectional stream of protocol lines.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Write one line. The line carries no CR/LF.
    async fn send(&mut self, line: &str) -> Result<(), TransportError>;

    /// Next inbound line, without CR/LF.
    ///
    /// `None` means the peer closed cleanly. A line-level error such as
    /// [`TransportError::LineTooLong`] leaves the transport usable.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    /// Close the transport. Errors while closing are not interesting to
    /// the caller beyond logging.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Validate one inbound line.
pub(crate) fn check_line(line: &str) -> Result<(), TransportError> {
    if line.len() > crate::util::MAX_LINE_LEN {
        return Err(TransportError::LineTooLong(line.len()));
    }
    if line.contains('\0') {
        return Err(TransportError::IllegalControlChar('\0'));
    }
    Ok(())
}
