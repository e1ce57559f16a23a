//! Reply formatting and sending for the Telegram adapter.
//!
//! Telegram's message limit is 4096 characters, counted in UTF-16 code units.
//! Replies are sent once with MarkdownV2 and link previews disabled; a send
//! failure is logged and not retried.

use teloxide::prelude::*;
use teloxide::types::{LinkPreviewOptions, ParseMode};
use tracing::warn;

use relay_core::config::{TelegramConfig, TruncationMode};

use crate::error::TelegramError;
use crate::markdown::{escape_markdown_v2, sanitize};

/// Room reserved at the end of a truncated message for the ellipsis.
const ELLIPSIS_ROOM: usize = 6;
const ESCAPED_ELLIPSIS: &str = "\\.\\.\\.";

fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}

/// Longest prefix of `s` that fits in `units` UTF-16 code units.
fn utf16_prefix(s: &str, units: usize) -> &str {
    let mut used = 0;
    for (idx, ch) in s.char_indices() {
        used += ch.len_utf16();
        if used > units {
            return &s[..idx];
        }
    }
    s
}

/// Turns assistant content into a finished MarkdownV2 message:
/// sanitized body, fixed footer, length limit applied.
#[derive(Debug, Clone)]
pub struct ReplyFormatter {
    /// Already escaped.
    footer: String,
    max_len: usize,
    mode: TruncationMode,
}

impl ReplyFormatter {
    pub fn new(footer: &str, max_len: usize, mode: TruncationMode) -> Self {
        Self {
            footer: escape_markdown_v2(footer),
            max_len,
            mode,
        }
    }

    pub fn from_config(config: &TelegramConfig) -> Self {
        Self::new(&config.footer, config.max_message_len, config.truncation)
    }

    pub fn footer(&self) -> &str {
        &self.footer
    }

    pub fn format(&self, content: &str) -> String {
        let content = content.trim();
        let combined = format!("{}{}", sanitize(content), self.footer);
        if utf16_len(&combined) <= self.max_len {
            return combined;
        }

        match self.mode {
            TruncationMode::Blind => self.truncate_blind(&combined),
            TruncationMode::Safe => self.truncate_safe(content, &combined),
        }
    }

    /// Cut the finished message and append `...`. The cut can land inside an
    /// escape pair or a code block, and the trailing dots are unescaped, so
    /// Telegram may reject the result.
    fn truncate_blind(&self, combined: &str) -> String {
        let kept = utf16_prefix(combined, self.max_len.saturating_sub(ELLIPSIS_ROOM));
        format!("{kept}...")
    }

    /// Shorten the raw content until its sanitized form, an escaped ellipsis
    /// and the footer fit. Every candidate is sanitized as a whole, so no
    /// escape pair or fence is ever cut.
    fn truncate_safe(&self, content: &str, combined: &str) -> String {
        let footer_len = utf16_len(&self.footer);
        if footer_len + ELLIPSIS_ROOM >= self.max_len {
            return self.truncate_blind(combined);
        }
        let budget = self.max_len - footer_len - ELLIPSIS_ROOM;

        let boundaries: Vec<usize> = content
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(content.len()))
            .collect();
        let fits = |chars: usize| utf16_len(&sanitize(&content[..boundaries[chars]])) <= budget;
        // `\` is not reserved, so a raw trailing backslash would escape the
        // first dot of the ellipsis.
        let ends_in_backslash = |chars: usize| content[..boundaries[chars]].ends_with('\\');

        // Sanitized length is not strictly monotonic (a closing fence can
        // change the escaping of a whole block), so only accept probed fits.
        let (mut lo, mut hi) = (0, boundaries.len() - 1);
        while lo < hi {
            let mid = lo + (hi - lo + 1) / 2;
            if fits(mid) {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        while lo > 0 && (ends_in_backslash(lo) || !fits(lo)) {
            lo -= 1;
        }

        format!(
            "{}{ESCAPED_ELLIPSIS}{}",
            sanitize(&content[..boundaries[lo]]),
            self.footer
        )
    }
}

/// Send an already formatted MarkdownV2 message.
pub async fn send_markdown(bot: &Bot, chat_id: ChatId, text: &str) -> Result<(), TelegramError> {
    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::MarkdownV2)
        .link_preview_options(LinkPreviewOptions {
            is_disabled: true,
            url: None,
            prefer_small_media: false,
            prefer_large_media: false,
            show_above_text: false,
        })
        .await?;
    Ok(())
}

/// Send and log on failure. Nothing else is attempted for that message.
pub async fn send_reply(bot: &Bot, chat_id: ChatId, text: &str) {
    if let Err(e) = send_markdown(bot, chat_id, text).await {
        warn!(error = %e, chat_id = chat_id.0, len = text.len(), "Telegram: failed to send reply");
    }
}

#[cfg(test)]
mod tests {
    use relay_core::config::{DEFAULT_FOOTER, TELEGRAM_MAX_MESSAGE_LEN};

    use super::*;

    fn formatter(mode: TruncationMode) -> ReplyFormatter {
        ReplyFormatter::new(DEFAULT_FOOTER, TELEGRAM_MAX_MESSAGE_LEN, mode)
    }

    #[test]
    fn footer_is_escaped_once() {
        let f = ReplyFormatter::new("\n---\nThanks!", 4096, TruncationMode::Safe);
        assert_eq!(f.footer(), "\n\\-\\-\\-\nThanks\\!");
    }

    #[test]
    fn short_reply_gets_footer() {
        let f = formatter(TruncationMode::Safe);
        let out = f.format("Hi there!");
        assert!(out.starts_with("Hi there\\!"));
        assert!(out.ends_with(f.footer()));
        assert_eq!(out, format!("Hi there\\!{}", f.footer()));
    }

    #[test]
    fn content_is_trimmed_before_sanitizing() {
        let f = ReplyFormatter::new("", 4096, TruncationMode::Safe);
        assert_eq!(f.format("  \n hello \n"), "hello");
    }

    #[test]
    fn exact_limit_is_not_truncated() {
        let f = ReplyFormatter::new("", 100, TruncationMode::Blind);
        let body = "a".repeat(100);
        assert_eq!(f.format(&body), body);
    }

    #[test]
    fn blind_truncation_matches_source_behavior() {
        let f = ReplyFormatter::new("", 100, TruncationMode::Blind);
        let out = f.format(&"a".repeat(150));
        assert_eq!(out, format!("{}...", "a".repeat(94)));
        assert_eq!(utf16_len(&out), 97);
    }

    #[test]
    fn blind_truncation_can_split_escape_pair() {
        let f = ReplyFormatter::new("", 20, TruncationMode::Blind);
        // "a." escapes to "a\." so position 14 lands between '\' and '.'.
        let out = f.format(&"a.".repeat(20));
        assert!(out.trim_end_matches("...").ends_with('\\'));
    }

    #[test]
    fn safe_truncation_keeps_footer_and_limit() {
        let f = formatter(TruncationMode::Safe);
        let out = f.format(&"Hello. World! ".repeat(600));
        assert!(utf16_len(&out) <= TELEGRAM_MAX_MESSAGE_LEN);
        assert!(out.ends_with(&format!("{ESCAPED_ELLIPSIS}{}", f.footer())));
    }

    #[test]
    fn safe_truncation_never_splits_escape_pair() {
        let f = ReplyFormatter::new("", 20, TruncationMode::Safe);
        let out = f.format(&"a.".repeat(20));
        let body = out.strip_suffix(ESCAPED_ELLIPSIS).unwrap();
        assert!(!body.ends_with('\\'));
        assert_eq!(body, "a\\.a\\.a\\.a\\.a");
        assert!(utf16_len(&out) <= 20);
    }

    #[test]
    fn safe_truncation_drops_backslash_at_cut_point() {
        let f = ReplyFormatter::new("", 20, TruncationMode::Safe);
        // The longest fitting prefix ends with the raw backslash.
        let out = f.format("abcdefghijklm\\nopqrstuvwxyz");
        assert_eq!(out, "abcdefghijklm\\.\\.\\.");
        let body = out.strip_suffix(ESCAPED_ELLIPSIS).unwrap();
        assert!(!body.ends_with('\\'));
    }

    #[test]
    fn safe_truncation_inside_code_block_has_no_open_fence() {
        let mut content = String::from("Here:\n```rust\n");
        for i in 0..400 {
            content.push_str(&format!("let value_{i} = compute({i});\n"));
        }
        content.push_str("```\nThat's it.");

        let f = formatter(TruncationMode::Safe);
        let out = f.format(&content);
        assert!(utf16_len(&out) <= TELEGRAM_MAX_MESSAGE_LEN);
        // The unterminated block is escaped as prose, so no raw fence remains.
        assert!(!out.contains("```"));
    }

    #[test]
    fn limit_counts_utf16_units() {
        // Each emoji is two UTF-16 units.
        let f = ReplyFormatter::new("", 20, TruncationMode::Blind);
        let out = f.format(&"😊".repeat(20));
        assert_eq!(out, format!("{}...", "😊".repeat(7)));
    }

    #[test]
    fn oversized_footer_falls_back_to_blind() {
        let f = ReplyFormatter::new(&"f".repeat(50), 30, TruncationMode::Safe);
        let out = f.format("hello");
        assert_eq!(utf16_len(&out), 27);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn utf16_prefix_respects_char_boundaries() {
        assert_eq!(utf16_prefix("a😊b", 2), "a");
        assert_eq!(utf16_prefix("a😊b", 3), "a😊");
        assert_eq!(utf16_prefix("abc", 10), "abc");
    }
}
