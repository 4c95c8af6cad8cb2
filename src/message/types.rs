use std::str::FromStr;

use crate::error::ParseError;
use crate::prefix::Prefix;

use super::nom_parser::RawLine;
use super::tags::{parse_tag_block, Tags};
use super::verb::Verb;

/// One parsed protocol line.
///
/// ```
/// use tmi_client::Command;
///
/// let cmd: Command = "@color=#FF0000 :bob!bob@bob.tmi.twitch.tv PRIVMSG #chan :hi all"
///     .parse()
///     .unwrap();
/// assert_eq!(cmd.verb, "PRIVMSG");
/// assert_eq!(cmd.params, vec!["#chan"]);
/// assert_eq!(cmd.trailing.as_deref(), Some("hi all"));
/// assert_eq!(cmd.tag("color"), Some("#FF0000"));
/// assert_eq!(cmd.source_nick(), Some("bob"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Command {
    /// Message tags; empty when the line had no tag block.
    pub tags: Tags,
    /// Source of the line, if any.
    pub prefix: Option<Prefix>,
    /// Verb, case preserved.
    pub verb: String,
    /// Middle parameters.
    pub params: Vec<String>,
    /// Final free-text parameter.
    pub trailing: Option<String>,
}

impl Command {
    /// A command with only a verb.
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            ..Self::default()
        }
    }

    /// Parse one logical line.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let raw = RawLine::parse(line)?;
        Ok(Self {
            tags: raw.tags.map(parse_tag_block).unwrap_or_default(),
            prefix: raw.prefix.map(Prefix::new_from_str),
            verb: raw.verb.to_string(),
            params: raw.params.into_iter().map(str::to_string).collect(),
            trailing: raw.trailing.map(str::to_string),
        })
    }

    /// `JOIN <channel>`
    pub fn join(channel: &str) -> Self {
        Self::new("JOIN").with_param(channel)
    }

    /// `PART <channel>`
    pub fn part(channel: &str) -> Self {
        Self::new("PART").with_param(channel)
    }

    /// `PRIVMSG <channel> :<text>`
    pub fn privmsg(channel: &str, text: &str) -> Self {
        Self::new("PRIVMSG").with_param(channel).with_trailing(text)
    }

    /// Answer to a `PING`, echoing its token.
    pub fn pong(token: Option<&str>) -> Self {
        let pong = Self::new("PONG");
        match token {
            Some(token) => pong.with_trailing(token),
            None => pong,
        }
    }

    /// `PASS <password>`
    pub fn pass(password: &str) -> Self {
        Self::new("PASS").with_param(password)
    }

    /// `NICK <nickname>`
    pub fn nick(nickname: &str) -> Self {
        Self::new("NICK").with_param(nickname)
    }

    /// `CAP REQ :<caps>`
    pub fn cap_req(caps: &[String]) -> Self {
        Self::new("CAP").with_param("REQ").with_trailing(&caps.join(" "))
    }

    /// Append a middle parameter.
    #[must_use]
    pub fn with_param(mut self, param: &str) -> Self {
        self.params.push(param.to_string());
        self
    }

    /// Set the trailing parameter.
    #[must_use]
    pub fn with_trailing(mut self, trailing: &str) -> Self {
        self.trailing = Some(trailing.to_string());
        self
    }

    /// Add or replace a tag.
    #[must_use]
    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }

    /// Set the prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: Prefix) -> Self {
        self.prefix = Some(prefix);
        self
    }

    /// Classified verb.
    pub fn kind(&self) -> Verb {
        Verb::classify(&self.verb)
    }

    /// The `i`-th argument, counting params first and then trailing.
    pub fn arg(&self, i: usize) -> Option<&str> {
        self.params
            .get(i)
            .map(String::as_str)
            .or_else(|| (i == self.params.len()).then_some(self.trailing.as_deref()).flatten())
    }

    /// Last argument: trailing if present, otherwise the last middle param.
    pub fn last_arg(&self) -> Option<&str> {
        self.trailing
            .as_deref()
            .or_else(|| self.params.last().map(String::as_str))
    }

    /// Value of a tag.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Nickname of the sender, when the prefix names a user.
    pub fn source_nick(&self) -> Option<&str> {
        self.prefix.as_ref().and_then(Prefix::nick)
    }
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_twitch_privmsg() {
        let cmd = Command::parse(
            "@badge-info=;badges=broadcaster/1;display-name=Tester;emotes= :tester!tester@tester.tmi.twitch.tv PRIVMSG #tester :Kappa 123",
        )
        .unwrap();
        assert_eq!(cmd.kind(), Verb::Privmsg);
        assert_eq!(cmd.tag("display-name"), Some("Tester"));
        assert_eq!(cmd.tag("emotes"), Some(""));
        assert_eq!(cmd.source_nick(), Some("tester"));
        assert_eq!(cmd.arg(0), Some("#tester"));
        assert_eq!(cmd.arg(1), Some("Kappa 123"));
        assert_eq!(cmd.arg(2), None);
    }

    #[test]
    fn test_parse_without_tags_yields_empty_map() {
        let cmd: Command = "PING :tmi.twitch.tv".parse().unwrap();
        assert!(cmd.tags.is_empty());
        assert!(cmd.prefix.is_none());
        assert_eq!(cmd.last_arg(), Some("tmi.twitch.tv"));
    }

    #[test]
    fn test_server_prefix_has_no_nick() {
        let cmd: Command = ":tmi.twitch.tv 001 justinfan123 :Welcome, GLHF!".parse().unwrap();
        assert_eq!(cmd.kind(), Verb::Numeric(1));
        assert_eq!(cmd.source_nick(), None);
    }

    #[test]
    fn test_builders() {
        let cmd = Command::privmsg("#chan", "hello");
        assert_eq!(cmd.verb, "PRIVMSG");
        assert_eq!(cmd.params, vec!["#chan"]);
        assert_eq!(cmd.trailing.as_deref(), Some("hello"));

        let pong = Command::pong(Some("tmi.twitch.tv"));
        assert_eq!(pong.trailing.as_deref(), Some("tmi.twitch.tv"));
        assert!(Command::pong(None).trailing.is_none());

        let cap = Command::cap_req(&["twitch.tv/tags".into(), "twitch.tv/commands".into()]);
        assert_eq!(cap.params, vec!["REQ"]);
        assert_eq!(
            cap.trailing.as_deref(),
            Some("twitch.tv/tags twitch.tv/commands")
        );
    }

    #[test]
    fn test_arg_without_trailing() {
        let cmd = Command::join("#chan");
        assert_eq!(cmd.arg(0), Some("#chan"));
        assert_eq!(cmd.arg(1), None);
        assert_eq!(cmd.last_arg(), Some("#chan"));
    }
}
