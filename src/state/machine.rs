use std::time::Instant;

use rand::Rng;
use tracing::{debug, info, trace, warn};

use crate::backoff::Backoff;
use crate::casemap::irc_eq;
use crate::chan::ChannelName;
use crate::config::ClientConfig;
use crate::error::{ClientError, TransportError};
use crate::event::{ChatMessage, Event};
use crate::keepalive::KeepaliveMonitor;
use crate::message::{Command, Verb};
use crate::ratelimit::{OutboundLimiters, OutboundRequest, RequestKind};
use crate::registry::ChannelRegistry;
use crate::util::sanitize_chat_text;

use super::{Action, ConnectionState};

/// Notice texts with which the service rejects a login.
const AUTH_FAILURES: [&str; 4] = [
    "login authentication failed",
    "login unsuccessful",
    "improperly formatted auth",
    "invalid nick",
];

fn is_auth_failure(text: &str) -> bool {
    let text = text.to_ascii_lowercase();
    AUTH_FAILURES.iter().any(|needle| text.contains(needle))
}

fn anonymous_login() -> String {
    format!("justinfan{}", rand::thread_rng().gen_range(10_000..100_000))
}

/// Connection lifecycle, channel membership, keepalive and outbound
/// throttling for one client.
#[derive(Debug)]
pub struct ConnectionMachine {
    config: ClientConfig,
    state: ConnectionState,
    registry: ChannelRegistry,
    limiters: OutboundLimiters,
    keepalive: KeepaliveMonitor,
    backoff: Backoff,
    reconnect_attempt: u32,
    reconnect_at: Option<Instant>,
    nick: String,
}

impl ConnectionMachine {
    #[must_use]
    pub fn new(config: ClientConfig, now: Instant) -> Self {
        let nick = config
            .credentials
            .as_ref()
            .map_or_else(anonymous_login, |c| c.login());

        Self {
            registry: ChannelRegistry::new(),
            limiters: OutboundLimiters::new(config.membership_policy(), config.chat_policy()),
            keepalive: KeepaliveMonitor::new(config.stale_after(), config.keepalive_interval(), now),
            backoff: config.backoff(),
            state: ConnectionState::Disconnected,
            reconnect_attempt: 0,
            reconnect_at: None,
            nick,
            config,
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    #[must_use]
    pub fn reconnect_attempt(&self) -> u32 {
        self.reconnect_attempt
    }

    /// The nickname this client is known by.
    #[must_use]
    pub fn nick(&self) -> &str {
        &self.nick
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Number of requests held by the rate limiters.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.limiters.len()
    }

    /// Begin connecting.
    #[must_use]
    pub fn login(&mut self, now: Instant) -> Vec<Action> {
        match self.state {
            ConnectionState::Disconnected => {
                info!(url = %self.config.url, "connecting");
                self.begin_connecting(now)
            }
            ConnectionState::Closed => vec![],
            state => vec![Action::Emit(Event::Debug(format!(
                "login ignored while {}",
                state
            )))],
        }
    }

    /// The transport requested by [`Action::Open`] is ready.
    #[must_use]
    pub fn transport_opened(&mut self, now: Instant) -> Vec<Action> {
        if self.state != ConnectionState::Connecting {
            return vec![Action::Close];
        }

        self.state = ConnectionState::Authenticating;
        self.keepalive.reset(now);
        debug!(nick = %self.nick, "transport open, authenticating");

        let mut actions = vec![Action::Emit(Event::Debug(format!(
            "connected to {}, authenticating as {}",
            self.config.url, self.nick
        )))];
        if !self.config.capabilities.is_empty() {
            actions.push(Action::Send(Command::cap_req(&self.config.capabilities)));
        }
        if let Some(credentials) = &self.config.credentials {
            actions.push(Action::Send(Command::pass(&credentials.pass())));
        }
        actions.push(Action::Send(Command::nick(&self.nick)));
        actions
    }

    /// The transport closed, failed, or could not be opened.
    #[must_use]
    pub fn transport_closed(
        &mut self,
        error: Option<TransportError>,
        now: Instant,
    ) -> Vec<Action> {
        match self.state {
            ConnectionState::Connecting
            | ConnectionState::Authenticating
            | ConnectionState::Connected => {
                self.lose_connection(error.map(ClientError::Transport), now)
            }
            ConnectionState::Disconnected
            | ConnectionState::Reconnecting
            | ConnectionState::Closed => vec![],
        }
    }

    /// One inbound line.
    #[must_use]
    pub fn receive_line(&mut self, line: &str, now: Instant) -> Vec<Action> {
        if !matches!(
            self.state,
            ConnectionState::Authenticating | ConnectionState::Connected
        ) {
            return vec![];
        }
        self.keepalive.record_inbound(now);

        let cmd = match Command::parse(line) {
            Ok(cmd) => cmd,
            Err(e) => {
                debug!(error = %e, "skipping malformed line");
                return vec![Action::Emit(Event::Debug(format!(
                    "skipping malformed line: {}",
                    e
                )))];
            }
        };
        trace!(line = %cmd, "inbound");

        if let Some(pong) = KeepaliveMonitor::pong_for(&cmd) {
            return vec![Action::Send(pong)];
        }

        let mut actions = Vec::new();
        if self.state == ConnectionState::Authenticating {
            self.handle_handshake(cmd, now, &mut actions);
        } else {
            self.handle_connected(cmd, now, &mut actions);
        }
        actions
    }

    /// Timers: reconnect backoff, keepalive, pending-join expiry and rate
    /// limiter refills.
    #[must_use]
    pub fn tick(&mut self, now: Instant) -> Vec<Action> {
        match self.state {
            ConnectionState::Reconnecting => match self.reconnect_at {
                Some(at) if at <= now => {
                    self.reconnect_at = None;
                    info!(attempt = self.reconnect_attempt, "reconnecting");
                    self.begin_connecting(now)
                }
                _ => vec![],
            },
            ConnectionState::Connecting | ConnectionState::Authenticating => {
                if self.keepalive.check(now) {
                    self.go_stale(now)
                } else {
                    vec![]
                }
            }
            ConnectionState::Connected => {
                if self.keepalive.check(now) {
                    return self.go_stale(now);
                }
                let mut actions: Vec<Action> = self
                    .registry
                    .expire_pending(now, self.config.join_timeout())
                    .into_iter()
                    .map(|name| {
                        warn!(channel = %name, "join was not confirmed in time");
                        Action::Emit(Event::Warn(format!(
                            "join of {} was not confirmed in time",
                            name
                        )))
                    })
                    .collect();
                actions.extend(self.flush(now));
                actions
            }
            ConnectionState::Disconnected | ConnectionState::Closed => vec![],
        }
    }

    /// When [`tick`](Self::tick) next has work to do.
    #[must_use]
    pub fn next_wakeup(&mut self, now: Instant) -> Option<Instant> {
        match self.state {
            ConnectionState::Reconnecting => self.reconnect_at,
            ConnectionState::Connecting | ConnectionState::Authenticating => {
                Some(self.keepalive.next_check_at())
            }
            ConnectionState::Connected => [
                Some(self.keepalive.next_check_at()),
                self.limiters.next_ready_at(now),
                self.registry.next_expiry(self.config.join_timeout()),
            ]
            .into_iter()
            .flatten()
            .min(),
            ConnectionState::Disconnected | ConnectionState::Closed => None,
        }
    }

    /// Application request to join a channel.
    #[must_use]
    pub fn join_channel(&mut self, name: &str, now: Instant) -> Vec<Action> {
        let Some(channel) = ChannelName::parse(name) else {
            return vec![];
        };
        match self.state {
            ConnectionState::Closed => vec![],
            ConnectionState::Connected => {
                if !self.registry.request_join(&channel) {
                    return vec![];
                }
                self.limiters.enqueue(OutboundRequest::new(
                    RequestKind::Join,
                    Command::join(channel.as_str()),
                    now,
                ));
                let mut actions = vec![Action::Emit(Event::Debug(format!(
                    "Joining channel {}",
                    channel
                )))];
                actions.extend(self.flush(now));
                actions
            }
            _ => {
                self.registry.desire(&channel);
                vec![Action::Emit(Event::Debug(format!(
                    "Channel {} will be joined once connected",
                    channel
                )))]
            }
        }
    }

    /// Application request to leave a channel.
    #[must_use]
    pub fn leave_channel(&mut self, name: &str, now: Instant) -> Vec<Action> {
        let Some(channel) = ChannelName::parse(name) else {
            return vec![];
        };
        match self.state {
            ConnectionState::Closed => vec![],
            ConnectionState::Connected => {
                if !self.registry.request_leave(&channel) {
                    return vec![];
                }
                self.limiters.enqueue(OutboundRequest::new(
                    RequestKind::Part,
                    Command::part(channel.as_str()),
                    now,
                ));
                let mut actions = vec![Action::Emit(Event::Debug(format!(
                    "Leaving channel {}",
                    channel
                )))];
                actions.extend(self.flush(now));
                actions
            }
            _ => {
                self.registry.undesire(&channel);
                vec![]
            }
        }
    }

    /// Application request to send a chat message.
    #[must_use]
    pub fn send_message(&mut self, channel: &str, text: &str, now: Instant) -> Vec<Action> {
        let Some(channel) = ChannelName::parse(channel) else {
            return vec![];
        };
        if self.state == ConnectionState::Closed {
            return vec![];
        }
        if self.state != ConnectionState::Connected || !self.registry.is_joined(&channel) {
            return vec![Action::Emit(Event::Debug(format!(
                "not joined to {}, message dropped",
                channel
            )))];
        }

        let text = sanitize_chat_text(text);
        if text.is_empty() {
            return vec![];
        }
        self.limiters.enqueue(OutboundRequest::new(
            RequestKind::Privmsg,
            Command::privmsg(channel.as_str(), &text),
            now,
        ));
        self.flush(now)
    }

    /// Terminate. Idempotent; emits nothing.
    #[must_use]
    pub fn destroy(&mut self) -> Vec<Action> {
        if self.state == ConnectionState::Closed {
            return vec![];
        }
        info!("client destroyed");
        self.shut_down();
        vec![Action::Close]
    }

    fn begin_connecting(&mut self, now: Instant) -> Vec<Action> {
        self.state = ConnectionState::Connecting;
        self.keepalive.reset(now);
        vec![Action::Open]
    }

    fn shut_down(&mut self) {
        self.state = ConnectionState::Closed;
        self.reconnect_at = None;
        self.registry.reset();
        self.limiters.clear();
    }

    /// Send whatever the limiters allow right now.
    fn flush(&mut self, now: Instant) -> Vec<Action> {
        if self.state != ConnectionState::Connected {
            return vec![];
        }
        let ready = self.limiters.try_drain(now);
        let mut actions = Vec::with_capacity(ready.len());
        for request in ready {
            if request.kind == RequestKind::Join {
                if let Some(channel) = request.payload.arg(0).and_then(ChannelName::parse) {
                    self.registry.mark_sent(&channel, now);
                }
            }
            actions.push(Action::Send(request.payload));
        }
        actions
    }

    fn lose_connection(&mut self, error: Option<ClientError>, now: Instant) -> Vec<Action> {
        match &error {
            Some(e) => warn!(error = %e, state = %self.state, "connection lost"),
            None => info!(state = %self.state, "connection closed"),
        }

        let mut actions = vec![Action::Emit(Event::disconnect(error))];
        self.registry.reset();
        let dropped = self.limiters.clear();
        if dropped > 0 {
            actions.push(Action::Emit(Event::Debug(format!(
                "dropped {} queued requests",
                dropped
            ))));
        }

        if self.config.reconnect {
            let delay = self.backoff.delay(self.reconnect_attempt);
            self.reconnect_attempt = self.reconnect_attempt.saturating_add(1);
            self.reconnect_at = Some(now + delay);
            self.state = ConnectionState::Reconnecting;
            actions.push(Action::Emit(Event::Debug(format!(
                "reconnecting in {:?} (attempt {})",
                delay, self.reconnect_attempt
            ))));
        } else {
            self.state = ConnectionState::Disconnected;
        }
        actions
    }

    fn go_stale(&mut self, now: Instant) -> Vec<Action> {
        let stale_after = self.keepalive.stale_after();
        let mut actions = vec![
            Action::Emit(Event::Warn(format!(
                "no traffic for {:?}, dropping connection",
                stale_after
            ))),
            Action::Close,
        ];
        actions.extend(self.lose_connection(Some(ClientError::Stale(stale_after)), now));
        actions
    }

    fn fail(&mut self, error: ClientError) -> Vec<Action> {
        warn!(error = %error, "fatal error, closing");
        self.shut_down();
        vec![Action::Emit(Event::error(error)), Action::Close]
    }

    fn server_requested_reconnect(&mut self, now: Instant) -> Vec<Action> {
        info!("server requested reconnect");
        self.registry.reset();
        self.limiters.clear();
        let mut actions = vec![
            Action::Emit(Event::Debug("server requested reconnect".to_string())),
            Action::Emit(Event::disconnect(None)),
            Action::Close,
        ];
        actions.extend(self.begin_connecting(now));
        actions
    }

    fn server_error(&mut self, cmd: &Command, now: Instant) -> Vec<Action> {
        let reason = cmd.last_arg().unwrap_or("connection closed").to_string();
        let mut actions = vec![
            Action::Emit(Event::error(ClientError::Server(reason.clone()))),
            Action::Close,
        ];
        actions.extend(self.lose_connection(Some(ClientError::Server(reason)), now));
        actions
    }

    fn violation(what: String) -> Action {
        warn!(%what, "protocol violation");
        Action::Emit(Event::Warn(ClientError::ProtocolViolation(what).to_string()))
    }

    fn handle_handshake(&mut self, cmd: Command, now: Instant, actions: &mut Vec<Action>) {
        match cmd.kind() {
            Verb::Numeric(1) => {
                if let Some(nick) = cmd.arg(0) {
                    self.nick = nick.to_string();
                }
                self.state = ConnectionState::Connected;
                self.reconnect_attempt = 0;
                info!(nick = %self.nick, "authenticated");
                actions.push(Action::Emit(Event::Debug(format!(
                    "authenticated as {}",
                    self.nick
                ))));

                let desired: Vec<ChannelName> = self.registry.desired().cloned().collect();
                for channel in desired {
                    if self.registry.request_join(&channel) {
                        self.limiters.enqueue(OutboundRequest::new(
                            RequestKind::Join,
                            Command::join(channel.as_str()),
                            now,
                        ));
                    }
                }
                actions.extend(self.flush(now));
            }
            Verb::Notice => {
                let text = cmd.last_arg().unwrap_or_default();
                if is_auth_failure(text) {
                    actions.extend(self.fail(ClientError::Auth(text.to_string())));
                } else {
                    actions.push(Action::Emit(Event::Debug(format!("notice: {}", text))));
                }
            }
            Verb::Cap => {
                let caps = cmd.last_arg().unwrap_or_default();
                if cmd.params.iter().any(|p| p.eq_ignore_ascii_case("NAK")) {
                    actions.push(Action::Emit(Event::Warn(format!(
                        "capabilities rejected: {}",
                        caps
                    ))));
                } else {
                    actions.push(Action::Emit(Event::Debug(format!(
                        "capabilities acknowledged: {}",
                        caps
                    ))));
                }
            }
            Verb::Error => actions.extend(self.server_error(&cmd, now)),
            Verb::Reconnect => actions.extend(self.server_requested_reconnect(now)),
            _ => trace!(verb = %cmd.verb, "ignored during handshake"),
        }
    }

    fn handle_connected(&mut self, cmd: Command, now: Instant, actions: &mut Vec<Action>) {
        match cmd.kind() {
            Verb::Privmsg => {
                let channel = cmd.arg(0).and_then(ChannelName::parse);
                let (Some(channel), Some(user), Some(text)) =
                    (channel, cmd.source_nick(), cmd.trailing.as_deref())
                else {
                    actions.push(Self::violation(format!("incomplete PRIVMSG: {}", cmd)));
                    return;
                };
                actions.push(Action::Emit(Event::Message(ChatMessage {
                    channel,
                    user: user.to_string(),
                    text: text.to_string(),
                    tags: cmd.tags.clone(),
                })));
            }
            Verb::Join | Verb::Part => {
                let joining = cmd.kind() == Verb::Join;
                let channel = cmd.arg(0).and_then(ChannelName::parse);
                let (Some(channel), Some(user)) = (channel, cmd.source_nick()) else {
                    actions.push(Self::violation(format!("incomplete {}: {}", cmd.verb, cmd)));
                    return;
                };

                let event = if irc_eq(user, &self.nick) {
                    if joining {
                        self.registry.confirm_join(&channel)
                    } else {
                        self.registry.confirm_leave(&channel)
                    }
                } else {
                    let user = user.to_string();
                    Some(if joining {
                        Event::UserJoin { user, channel }
                    } else {
                        Event::UserLeave { user, channel }
                    })
                };
                actions.extend(event.map(Action::Emit));
            }
            Verb::Notice => {
                let text = cmd.last_arg().unwrap_or_default();
                if is_auth_failure(text) {
                    actions.extend(self.fail(ClientError::Auth(text.to_string())));
                } else {
                    let target = cmd.arg(0).unwrap_or("*");
                    actions.push(Action::Emit(Event::Debug(format!(
                        "notice in {}: {}",
                        target, text
                    ))));
                }
            }
            Verb::Reconnect => actions.extend(self.server_requested_reconnect(now)),
            Verb::Error => actions.extend(self.server_error(&cmd, now)),
            _ => trace!(verb = %cmd.verb, "unhandled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::Credentials;
    use crate::registry::MembershipState;

    fn config() -> ClientConfig {
        ClientConfig::with_credentials(Credentials::new("tester", "secret"))
    }

    fn sent(actions: &[Action]) -> Vec<String> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Send(cmd) => Some(cmd.to_string()),
                _ => None,
            })
            .collect()
    }

    fn events(actions: &[Action]) -> Vec<&Event> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Emit(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    fn connected(config: ClientConfig, now: Instant) -> ConnectionMachine {
        let mut m = ConnectionMachine::new(config, now);
        let _ = m.login(now);
        let _ = m.transport_opened(now);
        let _ = m.receive_line(":tmi.twitch.tv 001 tester :Welcome, GLHF!", now);
        assert_eq!(m.state(), ConnectionState::Connected);
        m
    }

    #[test]
    fn test_handshake_lines() {
        let now = Instant::now();
        let mut m = ConnectionMachine::new(config(), now);
        let actions = m.login(now);
        assert!(matches!(actions.as_slice(), [Action::Open]));
        assert_eq!(m.state(), ConnectionState::Connecting);

        let actions = m.transport_opened(now);
        assert_eq!(
            sent(&actions),
            vec![
                "CAP REQ :twitch.tv/tags twitch.tv/commands twitch.tv/membership",
                "PASS oauth:secret",
                "NICK tester",
            ]
        );
    }

    #[test]
    fn test_anonymous_login_skips_pass() {
        let now = Instant::now();
        let mut m = ConnectionMachine::new(ClientConfig::default(), now);
        assert!(m.nick().starts_with("justinfan"));
        let _ = m.login(now);
        let lines = sent(&m.transport_opened(now));
        assert!(lines.iter().all(|l| !l.starts_with("PASS")));
        assert_eq!(lines.last().unwrap(), &format!("NICK {}", m.nick()));
    }

    #[test]
    fn test_join_echo_from_self_emits_channel_join() {
        let now = Instant::now();
        let mut m = connected(config(), now);
        assert!(m.registry().is_empty());

        let actions = m.receive_line(":tester!tester@tester.tmi.twitch.tv JOIN #channel", now);
        let evs = events(&actions);
        assert_eq!(evs.len(), 1);
        assert!(matches!(evs[0], Event::ChannelJoin { channel } if channel.as_str() == "#channel"));
        let channel = ChannelName::parse("#channel").unwrap();
        assert_eq!(m.registry().state(&channel), MembershipState::Joined);
    }

    #[test]
    fn test_third_party_join_and_part() {
        let now = Instant::now();
        let mut m = connected(config(), now);

        let actions = m.receive_line(":viewer!viewer@viewer.tmi.twitch.tv JOIN #channel", now);
        assert!(matches!(events(&actions)[0], Event::UserJoin { user, .. } if user == "viewer"));

        let actions = m.receive_line(":viewer!viewer@viewer.tmi.twitch.tv PART #channel", now);
        assert!(matches!(events(&actions)[0], Event::UserLeave { user, .. } if user == "viewer"));
        assert!(m.registry().is_empty());
    }

    #[test]
    fn test_ping_answered_first_without_limiter() {
        let now = Instant::now();
        let cfg = ClientConfig {
            rate_limit_capacity: 1,
            ..config()
        };
        let mut m = connected(cfg, now);
        let _ = m.join_channel("#a", now);
        let _ = m.join_channel("#b", now);
        assert_eq!(m.queued(), 1);

        let actions = m.receive_line("PING :tmi.twitch.tv", now);
        assert_eq!(sent(&actions), vec!["PONG :tmi.twitch.tv"]);
        assert_eq!(actions.len(), 1);
        assert_eq!(m.queued(), 1);
    }

    #[test]
    fn test_join_is_idempotent_on_the_wire() {
        let now = Instant::now();
        let mut m = connected(config(), now);
        let first = m.join_channel("x", now);
        let second = m.join_channel("#X", now);
        assert_eq!(sent(&first), vec!["JOIN #x"]);
        assert!(sent(&second).is_empty());
        assert_eq!(m.queued(), 0);
    }

    #[test]
    fn test_invalid_names_are_noops() {
        let now = Instant::now();
        let mut m = connected(config(), now);
        assert!(m.join_channel("", now).is_empty());
        assert!(m.join_channel("   ", now).is_empty());
        assert!(m.leave_channel("", now).is_empty());
        assert!(m.send_message("", "hi", now).is_empty());
    }

    #[test]
    fn test_send_requires_joined_channel() {
        let now = Instant::now();
        let mut m = connected(config(), now);
        let actions = m.send_message("#a", "hello", now);
        assert!(sent(&actions).is_empty());

        let _ = m.join_channel("#a", now);
        let _ = m.receive_line(":tester!tester@tester.tmi.twitch.tv JOIN #a", now);
        let actions = m.send_message("#A", "hello", now);
        assert_eq!(sent(&actions), vec!["PRIVMSG #a :hello"]);
    }

    #[test]
    fn test_privmsg_becomes_message_event() {
        let now = Instant::now();
        let mut m = connected(config(), now);
        let actions = m.receive_line(
            "@display-name=Viewer :viewer!viewer@viewer.tmi.twitch.tv PRIVMSG #Chan :hi there",
            now,
        );
        match events(&actions)[0] {
            Event::Message(msg) => {
                assert_eq!(msg.channel.as_str(), "#chan");
                assert_eq!(msg.user, "viewer");
                assert_eq!(msg.text, "hi there");
                assert_eq!(msg.display_name(), "Viewer");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_incomplete_privmsg_is_a_warning() {
        let now = Instant::now();
        let mut m = connected(config(), now);
        let actions = m.receive_line(":viewer!v@v PRIVMSG", now);
        assert!(matches!(events(&actions)[0], Event::Warn(_)));
        assert_eq!(m.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_malformed_line_is_skipped() {
        let now = Instant::now();
        let mut m = connected(config(), now);
        let actions = m.receive_line(":tmi.twitch.tv", now);
        assert!(matches!(events(&actions)[0], Event::Debug(_)));
        assert_eq!(m.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_reconnect_resyncs_desired_channels_in_order() {
        let now = Instant::now();
        let mut m = connected(config(), now);
        for name in ["#b", "#a"] {
            let _ = m.join_channel(name, now);
            let _ = m.receive_line(&format!(":tester!tester@tester.tmi.twitch.tv JOIN {}", name), now);
        }

        let actions = m.transport_closed(
            Some(TransportError::Closed {
                code: 1006,
                reason: "abnormal".into(),
            }),
            now,
        );
        assert!(matches!(events(&actions)[0], Event::Disconnect(Some(_))));
        assert_eq!(m.state(), ConnectionState::Reconnecting);
        assert_eq!(m.reconnect_attempt(), 1);
        assert!(m.registry().is_empty());

        let wake = m.next_wakeup(now).unwrap();
        assert!(m.tick(wake - Duration::from_millis(1)).is_empty());
        let actions = m.tick(wake);
        assert!(matches!(actions.as_slice(), [Action::Open]));

        let _ = m.transport_opened(wake);
        let actions = m.receive_line(":tmi.twitch.tv 001 tester :Welcome, GLHF!", wake);
        assert_eq!(sent(&actions), vec!["JOIN #a", "JOIN #b"]);
        assert_eq!(m.reconnect_attempt(), 0);
    }

    #[test]
    fn test_failed_connects_grow_attempt_counter() {
        let now = Instant::now();
        let mut m = ConnectionMachine::new(config(), now);
        let _ = m.login(now);
        let mut at = now;
        for expected in 1..=4 {
            let _ = m.transport_closed(Some(TransportError::Connect("refused".into())), at);
            assert_eq!(m.reconnect_attempt(), expected);
            at = m.next_wakeup(at).unwrap();
            let _ = m.tick(at);
            assert_eq!(m.state(), ConnectionState::Connecting);
        }
    }

    #[test]
    fn test_no_reconnect_when_disabled() {
        let now = Instant::now();
        let cfg = ClientConfig {
            reconnect: false,
            ..config()
        };
        let mut m = connected(cfg, now);
        let _ = m.transport_closed(None, now);
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert!(m.next_wakeup(now).is_none());
    }

    #[test]
    fn test_auth_failure_is_terminal() {
        let now = Instant::now();
        let mut m = ConnectionMachine::new(config(), now);
        let _ = m.login(now);
        let _ = m.transport_opened(now);

        let actions = m.receive_line(":tmi.twitch.tv NOTICE * :Login authentication failed", now);
        assert!(matches!(events(&actions)[0], Event::Error(e) if e.is_fatal()));
        assert!(actions.iter().any(|a| matches!(a, Action::Close)));
        assert_eq!(m.state(), ConnectionState::Closed);
        assert!(m.transport_closed(None, now).is_empty());
        assert!(m.next_wakeup(now).is_none());
    }

    #[test]
    fn test_server_reconnect_skips_backoff() {
        let now = Instant::now();
        let mut m = connected(config(), now);
        let _ = m.join_channel("#a", now);
        let _ = m.receive_line(":tester!tester@tester.tmi.twitch.tv JOIN #a", now);

        let actions = m.receive_line(":tmi.twitch.tv RECONNECT", now);
        let kinds: Vec<_> = actions
            .iter()
            .map(|a| match a {
                Action::Open => "open",
                Action::Close => "close",
                Action::Send(_) => "send",
                Action::Emit(_) => "emit",
            })
            .collect();
        assert_eq!(kinds, vec!["emit", "emit", "close", "open"]);
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert_eq!(m.reconnect_attempt(), 0);
        assert_eq!(m.registry().desired().count(), 1);
    }

    #[test]
    fn test_server_error_forces_reconnect() {
        let now = Instant::now();
        let mut m = connected(config(), now);
        let actions = m.receive_line("ERROR :Closing link", now);
        assert!(matches!(events(&actions)[0], Event::Error(_)));
        assert_eq!(m.state(), ConnectionState::Reconnecting);
    }

    #[test]
    fn test_stale_connection_trips_once() {
        let now = Instant::now();
        let cfg = ClientConfig {
            reconnect: false,
            ..config()
        };
        let mut m = connected(cfg, now);

        let mut disconnects = 0;
        for step in 1..=40u32 {
            let actions = m.tick(now + Duration::from_secs(30) * step);
            disconnects += events(&actions)
                .iter()
                .filter(|e| matches!(e, Event::Disconnect(Some(_))))
                .count();
            if step < 10 {
                assert_eq!(m.state(), ConnectionState::Connected);
            }
        }
        assert_eq!(disconnects, 1);
        assert_eq!(m.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_rate_limited_joins_spill_over() {
        let now = Instant::now();
        let mut m = connected(config(), now);
        let mut wire = Vec::new();
        for n in 0..25 {
            wire.extend(sent(&m.join_channel(&format!("#c{:02}", n), now)));
        }
        assert_eq!(wire.len(), 20);
        assert_eq!(m.queued(), 5);

        let wake = m.next_wakeup(now).unwrap();
        assert_eq!(wake, now + Duration::from_secs(10));
        let later = sent(&m.tick(wake));
        assert_eq!(later.len(), 5);
        assert_eq!(later[0], "JOIN #c20");
    }

    #[test]
    fn test_held_joins_time_out_from_send() {
        let now = Instant::now();
        let mut m = connected(config(), now);
        for n in 0..25 {
            let _ = m.join_channel(&format!("#c{:02}", n), now);
        }
        for n in 0..20 {
            let _ = m.receive_line(
                &format!(":tester!tester@tester.tmi.twitch.tv JOIN #c{:02}", n),
                now,
            );
        }

        let wake = m.next_wakeup(now).unwrap();
        assert_eq!(wake, now + Duration::from_secs(10));
        let actions = m.tick(wake);
        assert!(events(&actions)
            .iter()
            .all(|e| !matches!(e, Event::Warn(_))));
        assert_eq!(
            sent(&actions),
            vec!["JOIN #c20", "JOIN #c21", "JOIN #c22", "JOIN #c23", "JOIN #c24"]
        );
        assert_eq!(m.registry().desired().count(), 25);

        let echoed = wake + Duration::from_secs(9);
        for n in 20..25 {
            let actions = m.receive_line(
                &format!(":tester!tester@tester.tmi.twitch.tv JOIN #c{:02}", n),
                echoed,
            );
            assert!(matches!(events(&actions)[0], Event::ChannelJoin { .. }));
        }
        let _ = m.tick(wake + Duration::from_secs(10));
        assert_eq!(m.registry().desired().count(), 25);
        let tail = ChannelName::parse("#c24").unwrap();
        assert_eq!(m.registry().state(&tail), MembershipState::Joined);
    }

    #[test]
    fn test_leave_while_join_pending_pairs_events() {
        let now = Instant::now();
        let mut m = connected(config(), now);
        let _ = m.join_channel("#a", now);
        let actions = m.leave_channel("#a", now);
        assert_eq!(sent(&actions), vec!["PART #a"]);

        let actions = m.receive_line(":tester!tester@tester.tmi.twitch.tv JOIN #a", now);
        assert!(matches!(events(&actions)[0], Event::ChannelJoin { .. }));
        let actions = m.receive_line(":tester!tester@tester.tmi.twitch.tv PART #a", now);
        assert!(matches!(events(&actions)[0], Event::ChannelLeave { .. }));
    }

    #[test]
    fn test_unconfirmed_join_expires() {
        let now = Instant::now();
        let mut m = connected(config(), now);
        let _ = m.join_channel("#silent", now);
        let wake = m.next_wakeup(now).unwrap();
        assert_eq!(wake, now + Duration::from_secs(10));

        let actions = m.tick(wake);
        assert!(matches!(events(&actions)[0], Event::Warn(_)));
        let channel = ChannelName::parse("#silent").unwrap();
        assert_eq!(m.registry().state(&channel), MembershipState::Left);
    }

    #[test]
    fn test_calls_before_connect_are_replayed() {
        let now = Instant::now();
        let mut m = ConnectionMachine::new(config(), now);
        let _ = m.join_channel("#early", now);
        let _ = m.login(now);
        let _ = m.transport_opened(now);
        let actions = m.receive_line(":tmi.twitch.tv 001 tester :Welcome, GLHF!", now);
        assert_eq!(sent(&actions), vec!["JOIN #early"]);
    }

    #[test]
    fn test_destroy_is_idempotent_and_silent() {
        let now = Instant::now();
        let mut m = connected(config(), now);
        assert!(matches!(m.destroy().as_slice(), [Action::Close]));
        assert!(m.destroy().is_empty());
        assert_eq!(m.state(), ConnectionState::Closed);
        assert!(m.receive_line("PING :tmi.twitch.tv", now).is_empty());
        assert!(m.join_channel("#a", now).is_empty());
        assert!(m.login(now).is_empty());
        assert!(m.tick(now + Duration::from_secs(3600)).is_empty());
    }
}
