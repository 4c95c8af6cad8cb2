//! Line parsing and serialization.

mod nom_parser;
mod serialize;
pub mod tags;
mod types;
mod verb;

pub use self::nom_parser::RawLine;
pub use self::tags::Tags;
pub use self::types::Command;
pub use self::verb::Verb;

use crate::error::ParseError;

/// Parse one logical line into a [`Command`].
pub fn parse(line: &str) -> Result<Command, ParseError> {
    Command::parse(line)
}
