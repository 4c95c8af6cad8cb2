//! Fuzz target for line parsing.
//!
//! Parsing must never panic, and channel name normalization must be
//! idempotent.

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::str;

use tmi_client::{ChannelName, Command};

fuzz_target!(|data: &[u8]| {
    let Ok(input) = str::from_utf8(data) else {
        return;
    };
    if input.len() > 8191 {
        return;
    }

    if let Ok(cmd) = input.parse::<Command>() {
        let _ = cmd.kind();
        let _ = cmd.source_nick();
        let _ = cmd.to_string().parse::<Command>();
    }

    if let Some(name) = ChannelName::parse(input) {
        assert_eq!(ChannelName::parse(name.as_str()).as_ref(), Some(&name));
    }
});
