use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, warn};

use super::{check_line, Connector, Transport};
use crate::error::TransportError;
use crate::util::MAX_LINE_LEN;

/// Opens plain TCP transports. The URL is `host:port`, optionally
/// prefixed with `irc://` or `tcp://`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

fn host_port(url: &str) -> &str {
    let url = url
        .strip_prefix("irc://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);
    url.trim_end_matches('/')
}

fn enable_keepalive(stream: &TcpStream) -> std::io::Result<()> {
    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(120))
        .with_interval(Duration::from_secs(30));
    SockRef::from(stream).set_tcp_keepalive(&keepalive)
}

#[async_trait]
impl Connector for TcpConnector {
    type Transport = TcpTransport;

    async fn open(&self, url: &str) -> Result<TcpTransport, TransportError> {
        let addr = host_port(url);
        debug!(%addr, "opening tcp connection");
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::Connect(format!("{}: {}", addr, e)))?;
        if let Err(e) = enable_keepalive(&stream) {
            warn!("failed to enable TCP keepalive: {}", e);
        }
        Ok(TcpTransport {
            framed: Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LEN + 2)),
        })
    }
}

/// CRLF-delimited lines over a TCP socket.
pub struct TcpTransport {
    framed: Framed<TcpStream, LinesCodec>,
}

impl From<LinesCodecError> for TransportError {
    fn from(err: LinesCodecError) -> Self {
        match err {
            LinesCodecError::MaxLineLengthExceeded => TransportError::LineTooLong(MAX_LINE_LEN + 1),
            LinesCodecError::Io(e) => TransportError::Io(e),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, line: &str) -> Result<(), TransportError> {
        // LinesCodec terminates with a bare LF; the protocol wants CRLF.
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        self.framed.send(format!("{}\r", line)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            let line = match self.framed.next().await? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            return Some(check_line(line).map(|()| line.to_string()));
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        SinkExt::<String>::close(&mut self.framed).await?;
        Ok(())
    }
}
