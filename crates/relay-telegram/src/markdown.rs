//! MarkdownV2 sanitizing for model output.
//!
//! Model replies are free-form Markdown. Telegram's MarkdownV2 parser rejects
//! any message with an unescaped reserved character, so prose is escaped
//! wholesale. Fenced code blocks are kept as code blocks: the fences and the
//! language tag stay literal, only the body is escaped.

const FENCE: &str = "```";

/// Characters MarkdownV2 treats as formatting unless backslash-escaped.
pub const RESERVED: [char; 18] = [
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

pub fn is_reserved(ch: char) -> bool {
    RESERVED.contains(&ch)
}

/// Escape every reserved character with a backslash. Single pass.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    for ch in text.chars() {
        if is_reserved(ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    /// A complete fenced block, fences included.
    Code(&'a str),
}

/// Split into prose and fenced blocks, in order, without losing a byte.
///
/// A block runs from an opening fence to the nearest following fence. An
/// opening fence with no partner stays in the prose.
fn split_fences(input: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = input;

    while let Some(open) = rest.find(FENCE) {
        let after_open = open + FENCE.len();
        let Some(close) = rest[after_open..].find(FENCE) else {
            break;
        };
        let end = after_open + close + FENCE.len();
        if open > 0 {
            segments.push(Segment::Text(&rest[..open]));
        }
        segments.push(Segment::Code(&rest[open..end]));
        rest = &rest[end..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Text(rest));
    }
    segments
}

/// Split a leading language tag off trimmed block content.
///
/// The tag is a bare `[A-Za-z0-9_]+` word directly followed by a newline.
fn split_language(content: &str) -> (&str, &str) {
    let tag_len = content
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
        .count();
    if tag_len > 0 && content.as_bytes().get(tag_len) == Some(&b'\n') {
        (&content[..tag_len], &content[tag_len + 1..])
    } else {
        ("", content)
    }
}

fn format_code_block(block: &str) -> String {
    let inner = &block[FENCE.len()..block.len() - FENCE.len()];
    let (lang, body) = split_language(inner.trim());
    format!("{FENCE}{lang}\n{}\n{FENCE}", escape_markdown_v2(body))
}

/// Make arbitrary model output safe to send with `parse_mode=MarkdownV2`.
///
/// Never fails. Prose is escaped in place; each fenced block is normalized
/// to ```` ```lang\n<escaped body>\n``` ```` with its content trimmed.
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + raw.len() / 8);
    for segment in split_fences(raw) {
        match segment {
            Segment::Text(text) => out.push_str(&escape_markdown_v2(text)),
            Segment::Code(block) => out.push_str(&format_code_block(block)),
        }
    }
    out
}
