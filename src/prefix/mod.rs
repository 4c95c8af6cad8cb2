//! Message prefix (source) types.

use std::fmt;

/// The source of a line: a server name or a `nick!user@host` identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Prefix {
    /// Server name, e.g. `tmi.twitch.tv`.
    ServerName(String),
    /// Nickname, username and hostname. User and host may be empty.
    Nickname(String, String, String),
}

impl Prefix {
    /// Split a raw prefix (without the leading `:`).
    ///
    /// A token with neither `!` nor `@` but with a dot is treated as a
    /// server name; everything else names a user.
    pub fn new_from_str(s: &str) -> Self {
        let (nick_user, host) = s.split_once('@').unwrap_or((s, ""));
        let (nick, user) = nick_user.split_once('!').unwrap_or((nick_user, ""));

        if user.is_empty() && host.is_empty() && nick.contains('.') {
            Prefix::ServerName(nick.to_string())
        } else {
            Prefix::Nickname(nick.to_string(), user.to_string(), host.to_string())
        }
    }

    /// Nickname, if this prefix names a user.
    pub fn nick(&self) -> Option<&str> {
        match self {
            Prefix::Nickname(nick, _, _) if !nick.is_empty() => Some(nick),
            _ => None,
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::ServerName(name) => f.write_str(name),
            Prefix::Nickname(nick, user, host) => {
                f.write_str(nick)?;
                if !user.is_empty() {
                    write!(f, "!{}", user)?;
                }
                if !host.is_empty() {
                    write!(f, "@{}", host)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_user_prefix() {
        let p = Prefix::new_from_str("tester!tester@tester.tmi.twitch.tv");
        assert_eq!(
            p,
            Prefix::Nickname(
                "tester".into(),
                "tester".into(),
                "tester.tmi.twitch.tv".into()
            )
        );
        assert_eq!(p.nick(), Some("tester"));
        assert_eq!(p.to_string(), "tester!tester@tester.tmi.twitch.tv");
    }

    #[test]
    fn test_server_prefix() {
        let p = Prefix::new_from_str("tmi.twitch.tv");
        assert_eq!(p, Prefix::ServerName("tmi.twitch.tv".into()));
        assert_eq!(p.nick(), None);
    }

    #[test]
    fn test_partial_prefixes() {
        assert_eq!(
            Prefix::new_from_str("nick@host"),
            Prefix::Nickname("nick".into(), String::new(), "host".into())
        );
        assert_eq!(Prefix::new_from_str("nick").nick(), Some("nick"));
        assert_eq!(Prefix::new_from_str("nick@host").to_string(), "nick@host");
    }
}
