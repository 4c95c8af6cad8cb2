//! Verb classification.

use std::fmt;

/// The verbs the client routes on. Anything else is [`Verb::Other`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    Privmsg,
    Join,
    Part,
    Ping,
    Pong,
    Notice,
    Reconnect,
    Error,
    Cap,
    /// Three-digit numeric reply.
    Numeric(u16),
    Other,
}

impl Verb {
    /// Classify a raw verb token, ignoring ASCII case.
    pub fn classify(verb: &str) -> Self {
        if verb.len() == 3 && verb.bytes().all(|b| b.is_ascii_digit()) {
            return verb.parse().map(Verb::Numeric).unwrap_or(Verb::Other);
        }

        const NAMED: [(&str, Verb); 9] = [
            ("PRIVMSG", Verb::Privmsg),
            ("JOIN", Verb::Join),
            ("PART", Verb::Part),
            ("PING", Verb::Ping),
            ("PONG", Verb::Pong),
            ("NOTICE", Verb::Notice),
            ("RECONNECT", Verb::Reconnect),
            ("ERROR", Verb::Error),
            ("CAP", Verb::Cap),
        ];
        NAMED
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(verb))
            .map(|(_, v)| *v)
            .unwrap_or(Verb::Other)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verb::Privmsg => f.write_str("PRIVMSG"),
            Verb::Join => f.write_str("JOIN"),
            Verb::Part => f.write_str("PART"),
            Verb::Ping => f.write_str("PING"),
            Verb::Pong => f.write_str("PONG"),
            Verb::Notice => f.write_str("NOTICE"),
            Verb::Reconnect => f.write_str("RECONNECT"),
            Verb::Error => f.write_str("ERROR"),
            Verb::Cap => f.write_str("CAP"),
            Verb::Numeric(n) => write!(f, "{:03}", n),
            Verb::Other => f.write_str("<other>"),
        }
    }
}
