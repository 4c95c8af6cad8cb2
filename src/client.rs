//! Tokio driver for [`ConnectionMachine`].
//!
//! [`Client`] is a cheap handle; all state lives in a background task that
//! owns the machine, the transport and the observers. Application calls
//! are queued to that task in order and never block or fail. Everything
//! the client has to say comes back as [`Event`]s.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::ClientConfig;
use crate::dispatch::{EventDispatcher, EventSender, Observer, ObserverId};
use crate::error::{ConfigError, TransportError};
use crate::event::Event;
use crate::state::{Action, ConnectionMachine, ConnectionState};
use crate::transport::{Connector, Transport, WebSocketConnector};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

enum Request {
    Login,
    Join(String),
    Leave(String),
    Send { channel: String, text: String },
    Subscribe(ObserverId, Box<dyn Observer>),
    Unsubscribe(ObserverId),
}

/// Handle to a running chat client.
///
/// Must be created inside a tokio runtime. Clones share the same
/// connection; the client is destroyed when [`destroy`](Self::destroy) is
/// called, the last handle is dropped, or the service rejects the login.
#[derive(Clone)]
pub struct Client {
    requests: mpsc::UnboundedSender<Request>,
    shutdown: CancellationToken,
    finished: CancellationToken,
    next_observer: Arc<AtomicU64>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("destroyed", &self.shutdown.is_cancelled())
            .finish()
    }
}

impl Client {
    /// Client using the WebSocket transport.
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        Self::with_connector(config, WebSocketConnector)
    }

    /// Client using a custom transport.
    pub fn with_connector<C: Connector>(
        config: ClientConfig,
        connector: C,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let (requests, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let finished = CancellationToken::new();

        let driver = Driver {
            url: config.url.clone(),
            machine: ConnectionMachine::new(config, now()),
            connector: Arc::new(connector),
            dispatcher: EventDispatcher::new(),
            transport: None,
            opening: None,
            requests: rx,
            shutdown: shutdown.clone(),
        };
        let done = finished.clone();
        tokio::spawn(async move {
            driver.run().await;
            done.cancel();
        });

        Ok(Self {
            requests,
            shutdown,
            finished,
            next_observer: Arc::new(AtomicU64::new(0)),
        })
    }

    fn request(&self, request: Request) {
        if self.requests.send(request).is_err() {
            trace!("request after client shut down");
        }
    }

    /// Start connecting.
    pub fn login(&self) {
        self.request(Request::Login);
    }

    /// Close the connection and stop. Idempotent; emits no events.
    pub fn destroy(&self) {
        self.shutdown.cancel();
    }

    /// Resolves once the background task has stopped.
    pub async fn closed(&self) {
        self.finished.cancelled().await;
    }

    /// Join a channel; the name is normalized.
    pub fn join_channel(&self, name: &str) {
        self.request(Request::Join(name.to_string()));
    }

    pub fn leave_channel(&self, name: &str) {
        self.request(Request::Leave(name.to_string()));
    }

    /// Send a chat message to a joined channel.
    pub fn send(&self, channel: &str, text: &str) {
        self.request(Request::Send {
            channel: channel.to_string(),
            text: text.to_string(),
        });
    }

    /// Register an observer. It sees every event emitted after the
    /// requests queued before this call.
    pub fn subscribe<O: Observer + 'static>(&self, observer: O) -> ObserverId {
        let id = ObserverId(self.next_observer.fetch_add(1, Ordering::Relaxed));
        self.request(Request::Subscribe(id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&self, id: ObserverId) {
        self.request(Request::Unsubscribe(id));
    }

    /// Receive events through a channel.
    pub fn events(&self) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribe(EventSender(tx));
        rx
    }
}

fn now() -> std::time::Instant {
    Instant::now().into_std()
}

enum Step<T> {
    Shutdown,
    Request(Option<Request>),
    Opened(Result<T, TransportError>),
    Line(Option<Result<String, TransportError>>),
    Tick,
}

struct Driver<C: Connector> {
    url: String,
    machine: ConnectionMachine,
    connector: Arc<C>,
    dispatcher: EventDispatcher,
    transport: Option<C::Transport>,
    opening: Option<BoxFuture<'static, Result<C::Transport, TransportError>>>,
    requests: mpsc::UnboundedReceiver<Request>,
    shutdown: CancellationToken,
}

async fn next_line<T: Transport>(
    transport: &mut Option<T>,
) -> Option<Result<String, TransportError>> {
    match transport {
        Some(transport) => transport.recv().await,
        None => std::future::pending().await,
    }
}

impl<C: Connector> Driver<C> {
    async fn run(mut self) {
        loop {
            let deadline = self.machine.next_wakeup(now()).map(Instant::from_std);
            let timer = async {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            let has_transport = self.transport.is_some();
            let opening = self.opening.as_mut();
            let has_opening = opening.is_some();
            let opened = async move {
                match opening {
                    Some(opening) => opening.await,
                    None => std::future::pending().await,
                }
            };

            let step = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => Step::Shutdown,
                request = self.requests.recv() => Step::Request(request),
                result = opened, if has_opening => Step::Opened(result),
                line = next_line(&mut self.transport), if has_transport => Step::Line(line),
                _ = timer => Step::Tick,
            };

            let at = now();
            let actions = match step {
                Step::Shutdown | Step::Request(None) => {
                    let actions = self.machine.destroy();
                    self.execute(actions).await;
                    break;
                }
                Step::Request(Some(request)) => self.handle_request(request, at),
                Step::Opened(result) => {
                    self.opening = None;
                    match result {
                        Ok(transport) => {
                            self.transport = Some(transport);
                            self.machine.transport_opened(at)
                        }
                        Err(e) => {
                            debug!(error = %e, "open failed");
                            self.machine.transport_closed(Some(e), at)
                        }
                    }
                }
                Step::Line(Some(Ok(line))) => self.machine.receive_line(&line, at),
                Step::Line(Some(Err(e))) if e.is_line_error() => {
                    vec![Action::Emit(Event::Warn(format!("dropped inbound line: {}", e)))]
                }
                Step::Line(result) => {
                    self.transport = None;
                    self.machine.transport_closed(result.and_then(Result::err), at)
                }
                Step::Tick => self.machine.tick(at),
            };
            self.execute(actions).await;

            if self.machine.state() == ConnectionState::Closed {
                break;
            }
        }
        debug!("client task finished");
    }

    fn handle_request(&mut self, request: Request, at: std::time::Instant) -> Vec<Action> {
        match request {
            Request::Login => self.machine.login(at),
            Request::Join(name) => self.machine.join_channel(&name, at),
            Request::Leave(name) => self.machine.leave_channel(&name, at),
            Request::Send { channel, text } => self.machine.send_message(&channel, &text, at),
            Request::Subscribe(id, observer) => {
                self.dispatcher.insert(id, observer);
                vec![]
            }
            Request::Unsubscribe(id) => {
                self.dispatcher.unsubscribe(id);
                vec![]
            }
        }
    }

    async fn execute(&mut self, actions: Vec<Action>) {
        let mut queue: VecDeque<Action> = actions.into();
        while let Some(action) = queue.pop_front() {
            match action {
                Action::Open => {
                    self.close_transport().await;
                    let connector = Arc::clone(&self.connector);
                    let url = self.url.clone();
                    let open: BoxFuture<'static, _> =
                        Box::pin(async move { connector.open(&url).await });
                    self.opening = Some(open);
                }
                Action::Send(cmd) => {
                    let Some(transport) = self.transport.as_mut() else {
                        trace!(line = %cmd, "no transport, dropping line");
                        continue;
                    };
                    let line = cmd.to_string();
                    trace!(%line, "outbound");
                    if let Err(e) = transport.send(&line).await {
                        warn!(error = %e, "send failed");
                        self.transport = None;
                        queue.extend(self.machine.transport_closed(Some(e), now()));
                    }
                }
                Action::Close => self.close_transport().await,
                Action::Emit(event) => self.dispatcher.dispatch(event),
            }
        }
    }

    async fn close_transport(&mut self) {
        self.opening = None;
        if let Some(mut transport) = self.transport.take() {
            match tokio::time::timeout(CLOSE_TIMEOUT, transport.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(error = %e, "error while closing transport"),
                Err(_) => debug!("timed out closing transport"),
            }
        }
    }
}
