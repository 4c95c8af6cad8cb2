use std::fmt::{self, Write};

use super::tags::write_tag_block;
use super::types::Command;

/// Wire form without a line terminator. Re-parses to an equal [`Command`]
/// as long as no middle param contains a space or starts with `:`.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.tags.is_empty() {
            f.write_char('@')?;
            write_tag_block(f, &self.tags)?;
            f.write_char(' ')?;
        }
        if let Some(prefix) = &self.prefix {
            write!(f, ":{} ", prefix)?;
        }
        f.write_str(&self.verb)?;
        for param in &self.params {
            write!(f, " {}", param)?;
        }
        if let Some(trailing) = &self.trailing {
            write!(f, " :{}", trailing)?;
        }
        Ok(())
    }
}
