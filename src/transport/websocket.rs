use std::collections::VecDeque;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use super::{check_line, Connector, Transport};
use crate::error::TransportError;
use crate::util::split_lines;

type WsInner = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens WebSocket transports; TLS is negotiated for `wss://` URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    type Transport = WebSocketTransport;

    async fn open(&self, url: &str) -> Result<WebSocketTransport, TransportError> {
        debug!(%url, "opening websocket");
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(WebSocketTransport::new(stream))
    }
}

/// A WebSocket carrying protocol lines in text frames.
///
/// Outbound, each line is one text frame. Inbound, a frame may carry
/// several CRLF-separated lines; they are handed out one at a time.
pub struct WebSocketTransport {
    inner: WsInner,
    pending: VecDeque<String>,
}

impl WebSocketTransport {
    fn new(inner: WsInner) -> Self {
        Self {
            inner,
            pending: VecDeque::new(),
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, line: &str) -> Result<(), TransportError> {
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        self.inner
            .send(WsMessage::Text(line.to_string()))
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Some(check_line(&line).map(|()| line));
            }

            match self.inner.next().await? {
                Ok(WsMessage::Text(text)) => {
                    self.pending.extend(split_lines(&text).map(str::to_string));
                }
                Ok(WsMessage::Close(frame)) => {
                    return match frame {
                        Some(frame) => Some(Err(TransportError::Closed {
                            code: u16::from(frame.code),
                            reason: frame.reason.into_owned(),
                        })),
                        None => None,
                    };
                }
                Ok(WsMessage::Binary(_)) => {
                    warn!("ignoring binary websocket frame");
                }
                Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) | Ok(WsMessage::Frame(_)) => {}
                Err(e) => return Some(Err(TransportError::WebSocket(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.pending.clear();
        self.inner
            .close(None)
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))
    }
}
