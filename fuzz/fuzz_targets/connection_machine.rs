//! Fuzz target feeding arbitrary inbound lines to a connected machine.
//!
//! No line may panic the machine or produce more than one PONG.

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::str;
use std::time::Instant;

use tmi_client::{Action, ClientConfig, ConnectionMachine};

fuzz_target!(|data: &[u8]| {
    let Ok(input) = str::from_utf8(data) else {
        return;
    };

    let now = Instant::now();
    let mut machine = ConnectionMachine::new(ClientConfig::default(), now);
    let _ = machine.login(now);
    let _ = machine.transport_opened(now);
    let _ = machine.receive_line(":tmi.twitch.tv 001 justinfan1 :Welcome, GLHF!", now);

    for line in input.split('\n') {
        let actions = machine.receive_line(line, now);
        let pongs = actions
            .iter()
            .filter(|a| matches!(a, Action::Send(cmd) if cmd.verb == "PONG"))
            .count();
        assert!(pongs <= 1);
    }
});
