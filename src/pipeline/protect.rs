//! Placeholder protection: shield literal spans from the rewrite passes.
//!
//! [`protect`] swaps every span that must survive normalisation verbatim for
//! an opaque token `\u{E000}<n>\u{E001}` and returns a [`ProtectedText`]
//! holding the masked text plus the table of originals. The passes then run
//! over the masked text, and [`ProtectedText::restore`] swaps every token
//! back, wherever the passes moved it.
//!
//! Spans are protected in priority order:
//!
//! 1. **Fenced code blocks.** The opening fence run and the closing fence
//!    line stay visible so fence-spacing repair can still find them; the info
//!    string and body become one token.
//! 2. **Inline code spans.** Backtick delimiters stay visible. A single-word
//!    body with padding (`` ` foo ` ``) keeps its padding outside the token so
//!    the inline-code spacing pass can tighten it; any other body, padding
//!    included, becomes one token.
//! 3. **Raw URLs** (`http`, `https`, `ftp`, `mailto`).
//!
//! Tokens use Unicode private-use code points and digits only, so no pass
//! pattern (letters, markers, whitespace) can match inside one. Input that
//! already contains token-shaped text is not guarded against.

use once_cell::sync::Lazy;
use regex::Regex;

const TOKEN_OPEN: char = '\u{E000}';
const TOKEN_CLOSE: char = '\u{E001}';

static RE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new("\u{E000}([0-9]+)\u{E001}").unwrap());

static RE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        "(?:(?:https?|ftp)://|mailto:)[^\\s<>()\\[\\]\"`\u{E000}\u{E001}]+",
    )
    .unwrap()
});

/// Masked text plus the originals its tokens stand for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectedText {
    masked: String,
    spans: Vec<String>,
}

impl ProtectedText {
    /// The text with every protected span replaced by a token.
    pub fn masked(&self) -> &str {
        &self.masked
    }

    /// Number of spans that were protected.
    pub fn span_count(&self) -> usize {
        self.spans.len()
    }

    /// Replace every token in `text` with the span it stands for.
    ///
    /// Tokens with an index outside the table are left untouched.
    pub fn restore(&self, text: &str) -> String {
        if self.spans.is_empty() {
            return text.to_string();
        }
        RE_TOKEN
            .replace_all(text, |caps: &regex::Captures<'_>| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| self.spans.get(i))
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

/// Mask fenced code, inline code and URLs in `text`.
pub fn protect(text: &str) -> ProtectedText {
    let mut table = SpanTable::default();
    let masked = mask_fenced_blocks(text, &mut table);
    let masked = mask_inline_code(&masked, &mut table);
    let masked = mask_urls(&masked, &mut table);
    ProtectedText {
        masked,
        spans: table.spans,
    }
}

#[derive(Default)]
struct SpanTable {
    spans: Vec<String>,
}

impl SpanTable {
    fn token(&mut self, original: impl Into<String>) -> String {
        let index = self.spans.len();
        self.spans.push(original.into());
        format!("{TOKEN_OPEN}{index}{TOKEN_CLOSE}")
    }
}

// ── Fences ───────────────────────────────────────────────────────────────

/// An opening code fence: `prefix_len` covers indentation plus the fence run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Fence {
    pub(crate) marker: u8,
    pub(crate) run: usize,
    pub(crate) prefix_len: usize,
}

/// Recognise a line that opens (or could close) a fenced code block.
pub(crate) fn fence_marker(line: &str) -> Option<Fence> {
    let bytes = line.as_bytes();
    let indent = bytes.iter().take_while(|&&b| b == b' ').count();
    if indent > 3 {
        return None;
    }
    let marker = *bytes.get(indent)?;
    if marker != b'`' && marker != b'~' {
        return None;
    }
    let run = bytes[indent..].iter().take_while(|&&b| b == marker).count();
    if run < 3 {
        return None;
    }
    let prefix_len = indent + run;
    if marker == b'`' && line[prefix_len..].contains('`') {
        return None;
    }
    Some(Fence {
        marker,
        run,
        prefix_len,
    })
}

/// `true` if `line` closes the block opened by `open`.
pub(crate) fn closes_fence(line: &str, open: &Fence) -> bool {
    match fence_marker(line) {
        Some(f) => {
            f.marker == open.marker
                && f.run >= open.run
                && line[f.prefix_len..].trim().is_empty()
        }
        None => false,
    }
}

fn mask_fenced_blocks(text: &str, table: &mut SpanTable) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let Some(fence) = fence_marker(line) else {
            out.push(line.to_string());
            i += 1;
            continue;
        };

        // An unclosed fence runs to the end of the document.
        let close = (i + 1..lines.len()).find(|&j| closes_fence(lines[j], &fence));
        let end = close.unwrap_or(lines.len());

        let mut body = line[fence.prefix_len..].to_string();
        for inner in &lines[i + 1..end] {
            body.push('\n');
            body.push_str(inner);
        }
        out.push(format!("{}{}", &line[..fence.prefix_len], table.token(body)));

        match close {
            Some(j) => {
                out.push(lines[j].to_string());
                i = j + 1;
            }
            None => i = end,
        }
    }

    out.join("\n")
}

// ── Inline code ──────────────────────────────────────────────────────────

fn mask_inline_code(text: &str, table: &mut SpanTable) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'`' {
            i += 1;
            continue;
        }
        let run_start = i;
        while i < bytes.len() && bytes[i] == b'`' {
            i += 1;
        }
        let run = i - run_start;
        let line_end = text[i..].find('\n').map_or(text.len(), |o| i + o);

        // Unmatched runs are literal backticks.
        let Some(close_start) = find_closing_run(bytes, i, line_end, run) else {
            continue;
        };
        let close_end = close_start + run;

        out.push_str(&text[last..i]);
        out.push_str(&frame_code_body(&text[i..close_start], table));
        out.push_str(&text[close_start..close_end]);
        last = close_end;
        i = close_end;
    }

    out.push_str(&text[last..]);
    out
}

fn find_closing_run(bytes: &[u8], from: usize, to: usize, run: usize) -> Option<usize> {
    let mut j = from;
    while j < to {
        if bytes[j] != b'`' {
            j += 1;
            continue;
        }
        let start = j;
        while j < to && bytes[j] == b'`' {
            j += 1;
        }
        if j - start == run {
            return Some(start);
        }
    }
    None
}

fn frame_code_body(body: &str, table: &mut SpanTable) -> String {
    const PAD: [char; 2] = [' ', '\t'];
    let trimmed = body.trim_matches(PAD);
    let padded = trimmed.len() != body.len();

    if trimmed.is_empty() || !padded || trimmed.contains(char::is_whitespace) {
        return table.token(body);
    }

    let lead = &body[..body.len() - body.trim_start_matches(PAD).len()];
    let trail = &body[body.trim_end_matches(PAD).len()..];
    format!("{lead}{}{trail}", table.token(trimmed))
}

// ── URLs ─────────────────────────────────────────────────────────────────

fn mask_urls(text: &str, table: &mut SpanTable) -> String {
    RE_URL
        .replace_all(text, |caps: &regex::Captures<'_>| table.token(&caps[0]))
        .into_owned()
}
