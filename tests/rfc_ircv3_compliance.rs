//! RFC 1459 and IRCv3 compliance tests.
//!
//! This module tests specific edge cases and requirements from:
//! - RFC 1459: Internet Relay Chat Protocol (line format, case mapping)
//! - IRCv3 Message Tags: https://ircv3.net/specs/extensions/message-tags
//!
//! Run with: `cargo test --test rfc_ircv3_compliance`

use tmi_client::message::tags::{escape_tag_value, unescape_tag_value};
use tmi_client::{irc_eq, irc_to_lower, ChannelName, Command, Prefix, Verb};

// =============================================================================
// IRCv3 MESSAGE TAGS ESCAPING
// =============================================================================

mod tag_escaping {
    use super::*;

    #[test]
    fn test_unescape_combined() {
        let input = "a\\:b\\sc\\\\d\\re\\nf";
        let expected = "a;b c\\d\re\nf";
        assert_eq!(unescape_tag_value(input), expected);
    }

    #[test]
    fn test_unescape_unknown_escape() {
        // \x becomes x (backslash dropped)
        assert_eq!(unescape_tag_value("a\\xb"), "axb");
    }

    #[test]
    fn test_escape_roundtrip() {
        let test_values = vec![
            "simple",
            "with space",
            "with;semicolon",
            "with\\backslash",
            "with\nnewline",
            "with\rcarriage",
            "complex; \\ \n \r all",
        ];

        for original in test_values {
            let mut escaped = String::new();
            escape_tag_value(&mut escaped, original).unwrap();
            assert!(!escaped.contains(' ') && !escaped.contains(';'));
            let unescaped = unescape_tag_value(&escaped);
            assert_eq!(
                unescaped, original,
                "Roundtrip failed: '{}' -> '{}' -> '{}'",
                original, escaped, unescaped
            );
        }
    }
}

// =============================================================================
// IRCv3 TAG PARSING IN MESSAGES
// =============================================================================

mod tag_parsing {
    use super::*;

    #[test]
    fn test_tag_with_escaped_semicolon() {
        let cmd = Command::parse("@key=value\\:with\\:semicolons :nick PRIVMSG #ch :hi").unwrap();
        assert_eq!(cmd.tag("key"), Some("value;with;semicolons"));
    }

    #[test]
    fn test_system_msg_with_escaped_spaces() {
        let cmd = Command::parse(
            "@msg-id=sub;system-msg=bob\\ssubscribed\\sat\\sTier\\s1. :tmi.twitch.tv USERNOTICE #ch",
        )
        .unwrap();
        assert_eq!(cmd.tag("system-msg"), Some("bob subscribed at Tier 1."));
        assert_eq!(cmd.kind(), Verb::Other);
    }

    #[test]
    fn test_tag_without_value() {
        let cmd = Command::parse("@+typing :nick PRIVMSG #ch :hi").unwrap();
        assert_eq!(cmd.tag("+typing"), Some(""));
    }

    #[test]
    fn test_empty_value_matches_missing_value() {
        let a = Command::parse("@badge-info= PING").unwrap();
        let b = Command::parse("@badge-info PING").unwrap();
        assert_eq!(a.tags, b.tags);
    }

    #[test]
    fn test_multiple_tags_mixed() {
        let cmd =
            Command::parse("@a=1;b;c=hello\\sthere;+client/tag=x :nick PRIVMSG #ch :hi").unwrap();
        assert_eq!(cmd.tags.len(), 4);
        assert_eq!(cmd.tag("a"), Some("1"));
        assert_eq!(cmd.tag("b"), Some(""));
        assert_eq!(cmd.tag("c"), Some("hello there"));
        assert_eq!(cmd.tag("+client/tag"), Some("x"));
    }

    #[test]
    fn test_duplicate_key_keeps_last() {
        let cmd = Command::parse("@a=1;a=2 PING").unwrap();
        assert_eq!(cmd.tag("a"), Some("2"));
    }
}

// =============================================================================
// RFC 1459 MESSAGE FORMAT
// =============================================================================

mod message_format {
    use super::*;

    #[test]
    fn test_line_endings() {
        for raw in ["PING :x\r\n", "PING :x\n", "PING :x"] {
            let cmd = Command::parse(raw).unwrap();
            assert_eq!(cmd.trailing.as_deref(), Some("x"), "for {:?}", raw);
        }
    }

    #[test]
    fn test_empty_trailing_parameter() {
        let cmd = Command::parse(":nick PRIVMSG #ch :").unwrap();
        assert_eq!(cmd.trailing.as_deref(), Some(""));
    }

    #[test]
    fn test_trailing_preserves_leading_colon() {
        let cmd = Command::parse(":nick PRIVMSG #ch ::)").unwrap();
        assert_eq!(cmd.trailing.as_deref(), Some(":)"));
    }

    #[test]
    fn test_numeric_command() {
        let cmd = Command::parse(":tmi.twitch.tv 376 justinfan1 :>").unwrap();
        assert_eq!(cmd.kind(), Verb::Numeric(376));
        assert_eq!(cmd.arg(0), Some("justinfan1"));
    }

    #[test]
    fn test_verb_case_preserved_but_classified() {
        let cmd = Command::parse("privmsg #ch :hi").unwrap();
        assert_eq!(cmd.verb, "privmsg");
        assert_eq!(cmd.kind(), Verb::Privmsg);
    }

    #[test]
    fn test_missing_verb_is_malformed() {
        assert!(Command::parse(":tmi.twitch.tv").is_err());
        assert!(Command::parse("@a=b").is_err());
        assert!(Command::parse("@a=b :prefix").is_err());
        assert!(Command::parse("").is_err());
    }
}

// =============================================================================
// PREFIX PARSING
// =============================================================================

mod prefix_parsing {
    use super::*;

    #[test]
    fn test_full_user_prefix() {
        let cmd = Command::parse(":nick!user@host.example.com PRIVMSG #ch :hi").unwrap();
        assert_eq!(
            cmd.prefix,
            Some(Prefix::Nickname(
                "nick".into(),
                "user".into(),
                "host.example.com".into()
            ))
        );
    }

    #[test]
    fn test_nick_only_prefix() {
        let cmd = Command::parse(":nick PRIVMSG #ch :hi").unwrap();
        assert_eq!(cmd.source_nick(), Some("nick"));
    }

    #[test]
    fn test_server_prefix() {
        let cmd = Command::parse(":irc.example.com 001 nick :Welcome").unwrap();
        assert_eq!(cmd.prefix, Some(Prefix::ServerName("irc.example.com".into())));
        assert_eq!(cmd.source_nick(), None);
    }

    #[test]
    fn test_ipv6_host() {
        let cmd = Command::parse(":nick!user@2001:db8::1 PRIVMSG #ch :hi").unwrap();
        assert_eq!(cmd.source_nick(), Some("nick"));
    }
}

// =============================================================================
// CASE MAPPING AND CHANNEL NAMES
// =============================================================================

mod case_mapping {
    use super::*;

    #[test]
    fn test_rfc1459_brackets_fold() {
        assert_eq!(irc_to_lower("Nick[A]\\~"), "nick{a}|^");
        assert!(irc_eq("Foo[]", "foo{}"));
    }

    #[test]
    fn test_channel_names_fold_with_casemapping() {
        assert_eq!(
            ChannelName::parse("#Chan[1]"),
            ChannelName::parse("#chan{1}")
        );
    }

    #[test]
    fn test_channel_name_rejects_separators() {
        for bad in ["#a b", "#a,b", "#a\u{7}b", "##a", "#", ""] {
            assert!(ChannelName::parse(bad).is_none(), "{:?} accepted", bad);
        }
    }

    #[test]
    fn test_channel_name_utf8() {
        let name = ChannelName::parse("#Ünïcödé").unwrap();
        assert!(name.as_str().starts_with('#'));
        assert_eq!(ChannelName::parse(name.as_str()), Some(name));
    }
}
