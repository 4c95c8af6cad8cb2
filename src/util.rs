//! String helpers for outbound and inbound limits.

/// Longest inbound line a transport accepts.
pub const MAX_LINE_LEN: usize = 8191;

/// Longest chat message body the service accepts, in characters.
pub const MAX_CHAT_MESSAGE_CHARS: usize = 500;

/// Truncates a string to at most `max_chars` characters.
///
/// ```
/// use tmi_client::util::truncate_chars;
///
/// assert_eq!(truncate_chars("hello", 3), "hel");
/// assert_eq!(truncate_chars("👋🌍🚀", 2), "👋🌍");
/// ```
#[inline]
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Prepare chat text for a single PRIVMSG: line breaks become spaces and
/// the body is cut to [`MAX_CHAT_MESSAGE_CHARS`].
pub fn sanitize_chat_text(text: &str) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .filter(|&c| c != '\0')
        .collect();
    truncate_chars(&flat, MAX_CHAT_MESSAGE_CHARS).to_string()
}

/// Split a transport frame into logical lines, dropping CR/LF and blanks.
pub fn split_lines(frame: &str) -> impl Iterator<Item = &str> {
    frame
        .split('\n')
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.is_empty())
}
