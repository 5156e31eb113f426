//! Post snippets and the relayed message layout.

/// Longest stored or relayed message body, in characters.
pub const MAX_SNIPPET_CHARS: usize = 200;

/// Longest quoted reply parent, in characters.
pub const MAX_QUOTE_CHARS: usize = 100;

/// Stand-in for messages with no text.
pub const EMPTY_BODY: &str = "(embed/attachment only)";

const ELLIPSIS: char = '…';

/// Cut `text` to at most `max` characters, ending in an ellipsis when cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push(ELLIPSIS);
    out
}

fn or_placeholder(text: &str) -> &str {
    if text.is_empty() {
        EMPTY_BODY
    } else {
        text
    }
}

/// Snippet for a message body.
pub fn body(content: &str) -> String {
    truncate(or_placeholder(content), MAX_SNIPPET_CHARS)
}

/// Quote line placed before a reply's snippet.
pub fn reply_prefix(parent_author: &str, parent_content: &str) -> String {
    format!(
        "> **↪️   {}:** {}\n\n",
        parent_author,
        truncate(or_placeholder(parent_content), MAX_QUOTE_CHARS)
    )
}

/// Link to a message in the source space.
pub fn jump_url(space_id: u64, channel_id: u64, message_id: u64) -> String {
    format!(
        "https://discord.com/channels/{}/{}/{}",
        space_id, channel_id, message_id
    )
}

/// Full relayed message body.
pub fn render(
    display_name: &str,
    space_name: &str,
    channel_name: &str,
    snippet: &str,
    jump: &str,
) -> String {
    format!(
        "{} ({} • #{}):\n{}\n{}",
        display_name, space_name, channel_name, snippet, jump
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_untouched() {
        assert_eq!(body("Patch notes are up"), "Patch notes are up");
        assert_eq!(body(&"a".repeat(200)), "a".repeat(200));
    }

    #[test]
    fn test_long_text_truncated() {
        let snippet = body(&"a".repeat(201));
        assert_eq!(snippet.chars().count(), 198);
        assert!(snippet.ends_with("aa…"));
        assert_eq!(snippet, format!("{}…", "a".repeat(197)));
    }

    #[test]
    fn test_truncation_counts_characters() {
        let text = "é".repeat(250);
        let snippet = body(&text);
        assert_eq!(snippet.chars().count(), 198);
    }

    #[test]
    fn test_empty_body_placeholder() {
        assert_eq!(body(""), EMPTY_BODY);
    }

    #[test]
    fn test_reply_prefix() {
        assert_eq!(
            reply_prefix("Wyrom", "Is the merchant back?"),
            "> **↪️   Wyrom:** Is the merchant back?\n\n"
        );
        let long = reply_prefix("Wyrom", &"b".repeat(150));
        assert!(long.contains(&format!("{}…", "b".repeat(97))));
        assert!(!long.contains(&"b".repeat(98)));
    }

    #[test]
    fn test_render_layout() {
        let jump = jump_url(1, 2, 3);
        assert_eq!(jump, "https://discord.com/channels/1/2/3");
        assert_eq!(
            render("Isten", "GemStone IV", "announcements", "Hello", &jump),
            "Isten (GemStone IV • #announcements):\nHello\nhttps://discord.com/channels/1/2/3"
        );
    }
}
