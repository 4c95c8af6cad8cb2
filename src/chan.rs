//! Normalized channel names.

use std::borrow::Borrow;
use std::fmt;

use crate::casemap::irc_to_lower;

/// A channel name in canonical form: case-folded, with a leading `#`.
///
/// Two names that differ only by case normalize to the same value, which
/// is what lets the registry key on it.
///
/// ```
/// use tmi_client::ChannelName;
///
/// let a = ChannelName::parse("#Foo").unwrap();
/// let b = ChannelName::parse("foo").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.as_str(), "#foo");
/// assert!(ChannelName::parse("  ").is_none());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelName(String);

impl ChannelName {
    /// Normalize `raw`, or `None` if it cannot name a channel.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let bare = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if bare.is_empty() || bare.chars().any(is_forbidden) {
            return None;
        }
        Some(ChannelName(format!("#{}", irc_to_lower(bare))))
    }

    /// The canonical name, `#` included.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_forbidden(c: char) -> bool {
    matches!(c, ' ' | ',' | '\0' | '\x07' | '\r' | '\n' | '#')
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChannelName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ChannelName {
    fn borrow(&self) -> &str {
        &self.0
    }
}
