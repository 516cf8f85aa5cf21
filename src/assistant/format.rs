//! Reply formatting for Telegram.
//!
//! The persona closes replies with `<sarcasm>...</sarcasm>` asides. These are
//! lifted out of the body and appended as an italic "💭" footnote. Everything
//! the model wrote is HTML-escaped so `<`, `>`, `&` cannot break parse mode.

use std::sync::LazyLock;

use regex::Regex;

static SARCASM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<sarcasm>(.*?)</sarcasm>").expect("sarcasm pattern is valid"));

/// Telegram's hard limit on message length.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Escape a string for Telegram HTML parse mode.
pub fn html_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            _ => result.push(c),
        }
    }
    result
}

/// Split a reply into its body and its sarcastic asides.
fn split_asides(text: &str) -> (String, Vec<String>) {
    let asides = SARCASM
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let body = SARCASM.replace_all(text, "").trim().to_string();
    (body, asides)
}

/// Render a reply as Telegram HTML.
pub fn format_reply(text: &str) -> String {
    let (body, asides) = split_asides(text);
    let mut out = html_escape(&body);
    for aside in asides {
        out.push_str(&format!("\n\n💭 <i>{}</i>", html_escape(&aside)));
    }
    truncate_chars(out.trim_start(), MAX_MESSAGE_CHARS)
}

/// Render a reply without markup, for when Telegram rejects the HTML.
pub fn plain_reply(text: &str) -> String {
    let (body, asides) = split_asides(text);
    let mut out = body;
    for aside in asides {
        out.push_str(&format!("\n\n💭 {}", aside));
    }
    truncate_chars(out.trim_start(), MAX_MESSAGE_CHARS)
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut truncated: String = s.chars().take(max_chars - 1).collect();
    truncated.push('…');
    truncated
}
