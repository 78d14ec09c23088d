//! Normalisation: deterministic repair of common Markdown authoring defects.
//!
//! Hand-written and LLM-written Markdown both pick up the same handful of
//! slips: `** bold **` that renders as literal asterisks, headings glued to
//! the paragraph above, fences with no breathing room, words fused together
//! when whitespace was lost in a copy-paste. None of these change what the
//! author meant; all of them change what the renderer produces.
//!
//! This module applies 10 narrow rewrite passes. Each pass is a pure function
//! `&str → Rewrite` that reports a fix description only when it actually
//! changed the text, so the caller can show the author exactly what was
//! touched.
//!
//! ## Rule Order
//!
//! Order matters: emphasis is tightened before alert labels are bolded (so
//! the new `**Label:**` is never re-examined as padded emphasis), and heading
//! spacing runs before blank-line collapsing so the collapse sees the final
//! layout.
//!
//! All passes expect *protected* text (see [`super::protect`]); run on raw
//! text they would happily rewrite inside code spans and URLs.

use super::protect::{closes_fence, fence_marker, Fence};
use once_cell::sync::Lazy;
use regex::Regex;

/// Text produced by a pass plus the fixes it applied, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rewrite {
    pub text: String,
    pub fixes: Vec<String>,
}

impl Rewrite {
    /// The input passed through untouched.
    pub fn unchanged(input: &str) -> Self {
        Self {
            text: input.to_string(),
            fixes: Vec::new(),
        }
    }

    /// `output`, with `description` recorded only if it differs from `input`.
    fn compare(input: &str, output: String, description: &str) -> Self {
        let fixes = if output != input {
            vec![description.to_string()]
        } else {
            Vec::new()
        };
        Self {
            text: output,
            fixes,
        }
    }

    /// Chain `next` after `self`: keep its text, append its fixes, and drop
    /// descriptions that were already recorded.
    pub fn then(mut self, next: Rewrite) -> Self {
        self.text = next.text;
        for fix in next.fixes {
            if !self.fixes.contains(&fix) {
                self.fixes.push(fix);
            }
        }
        self
    }
}

/// A single normalisation pass.
pub type Pass = fn(&str) -> Rewrite;

/// The passes, in the order they must run.
pub const PASSES: [(&str, Pass); 10] = [
    ("escaped-emphasis", repair_escaped_emphasis),
    ("emphasis-spacing", tighten_emphasis),
    ("strikethrough-spacing", tighten_strikethrough),
    ("inline-code-spacing", tighten_inline_code),
    ("heading-spacing", ensure_heading_spacing),
    ("blank-lines", collapse_blank_lines),
    ("fence-spacing", ensure_fence_spacing),
    ("word-concatenation", split_concatenated_words),
    ("list-markers", normalise_list_markers),
    ("alert-labels", bold_alert_labels),
];

/// Run every pass over (protected) `input`.
pub fn normalize(input: &str) -> Rewrite {
    PASSES
        .iter()
        .fold(Rewrite::unchanged(input), |acc, (_, pass)| {
            let step = pass(&acc.text);
            acc.then(step)
        })
}

// ── Rule 1: Escaped emphasis ─────────────────────────────────────────────────
//
// `\*\*word\*\*` is almost always an exporter escaping markers it should have
// kept. Only spans escaped on *both* sides with non-space content are
// collapsed; a lone `\*` (e.g. `5 \* 3`) stays literal.

static RE_ESCAPED_BOLD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\\*\\\*([^*\s\\](?:[^*\n\\]*[^*\s\\])?)\\\*\\\*").unwrap()
});
static RE_ESCAPED_ITALIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\\*([^*\s\\](?:[^*\n\\]*[^*\s\\])?)\\\*").unwrap()
});

fn repair_escaped_emphasis(input: &str) -> Rewrite {
    let bold = RE_ESCAPED_BOLD.replace_all(input, "**${1}**").into_owned();
    let step = Rewrite::compare(input, bold, "Fixed escaped bold markers");
    let italic = RE_ESCAPED_ITALIC.replace_all(&step.text, "*${1}*").into_owned();
    let next = Rewrite::compare(&step.text, italic, "Fixed escaped italic markers");
    step.then(next)
}

// ── Rule 2: Emphasis spacing ─────────────────────────────────────────────────

static RE_BOLD_PADDED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*\*([ \t]*)([^*\s](?:[^*\n]*[^*\s])?)([ \t]*)\*\*").unwrap()
});
static RE_ITALIC_PADDED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*([ \t]*)([^*\s](?:[^*\n]*[^*\s])?)([ \t]*)\*").unwrap()
});

fn tighten_emphasis(input: &str) -> Rewrite {
    let bold = tighten_pairs(input, &RE_BOLD_PADDED, "**", false);
    let step = Rewrite::compare(input, bold, "Fixed spacing in bold markers");
    let italic = tighten_pairs(&step.text, &RE_ITALIC_PADDED, "*", true);
    let next = Rewrite::compare(&step.text, italic, "Fixed spacing in italic markers");
    step.then(next)
}

/// Strip whitespace just inside `marker … marker` pairs matched by `re`.
///
/// `re` must capture (leading pad, body, trailing pad). A match touching
/// another marker character on either side is part of a longer run
/// (`**` seen by the `*` pass, `~~~`, `` ``` ``) and is skipped. With
/// `guard_bullets`, a padded opener at the start of a line is a list bullet,
/// not emphasis.
fn tighten_pairs(input: &str, re: &Regex, marker: &str, guard_bullets: bool) -> String {
    let flank = marker.chars().next();
    let step = flank.map_or(1, char::len_utf8);
    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    let mut pos = 0;

    while let Some(caps) = re.captures_at(input, pos) {
        let (Some(whole), Some(lead), Some(body), Some(trail)) =
            (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
        else {
            break;
        };

        let before = input[..whole.start()].chars().next_back();
        let after = input[whole.end()..].chars().next();
        let line_start = input[..whole.start()].rfind('\n').map_or(0, |i| i + 1);
        let is_bullet = guard_bullets
            && !lead.as_str().is_empty()
            && input[line_start..whole.start()].trim().is_empty();

        if before == flank || after == flank || is_bullet {
            pos = whole.start() + step;
            continue;
        }
        if lead.as_str().is_empty() && trail.as_str().is_empty() {
            pos = whole.end();
            continue;
        }

        out.push_str(&input[last..whole.start()]);
        out.push_str(marker);
        out.push_str(body.as_str());
        out.push_str(marker);
        last = whole.end();
        pos = whole.end();
    }

    out.push_str(&input[last..]);
    out
}

// ── Rule 3: Strikethrough spacing ────────────────────────────────────────────

static RE_STRIKE_PADDED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"~~([ \t]*)([^~\s](?:[^~\n]*[^~\s])?)([ \t]*)~~").unwrap()
});

fn tighten_strikethrough(input: &str) -> Rewrite {
    let out = tighten_pairs(input, &RE_STRIKE_PADDED, "~~", false);
    Rewrite::compare(input, out, "Fixed spacing in strikethrough markers")
}

// ── Rule 4: Inline code spacing ──────────────────────────────────────────────
//
// Only single-word bodies are tightened; `` ` git commit -m ` `` keeps its
// padding because the spaces may be part of what the author wants shown.

static RE_CODE_PADDED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`([ \t]*)([^`\s]+)([ \t]*)`").unwrap());

fn tighten_inline_code(input: &str) -> Rewrite {
    let out = tighten_pairs(input, &RE_CODE_PADDED, "`", false);
    Rewrite::compare(input, out, "Fixed spacing in inline code")
}

// ── Rule 5: Heading spacing ──────────────────────────────────────────────────

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})(?:[ \t]|$)").unwrap());

/// Level (1–6) of an ATX heading line, or `None`.
pub(crate) fn heading_level(line: &str) -> Option<usize> {
    RE_HEADING.captures(line).map(|caps| caps[1].len())
}

fn ensure_heading_spacing(input: &str) -> Rewrite {
    // Exactly one blank line before each heading, unless nothing but blank
    // lines precede it. Only blank or whitespace-only lines are dropped.
    let mut out: Vec<&str> = Vec::with_capacity(input.len() / 32 + 8);
    let mut seen_content = false;
    for line in input.split('\n') {
        if seen_content && heading_level(line).is_some() {
            while out.last().is_some_and(|l| l.trim().is_empty()) {
                out.pop();
            }
            out.push("");
        }
        seen_content |= !line.trim().is_empty();
        out.push(line);
    }
    Rewrite::compare(input, out.join("\n"), "Added blank line before headings")
}

// ── Rule 6: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> Rewrite {
    let out = RE_BLANK_LINES.replace_all(input, "\n\n\n").into_owned();
    Rewrite::compare(input, out, "Collapsed excessive blank lines")
}

// ── Rule 7: Code fence spacing ───────────────────────────────────────────────

fn ensure_fence_spacing(input: &str) -> Rewrite {
    let lines: Vec<&str> = input.split('\n').collect();
    let mut out: Vec<&str> = Vec::with_capacity(lines.len() + 8);
    let mut open: Option<Fence> = None;

    for (i, &line) in lines.iter().enumerate() {
        match open {
            None => {
                if let Some(fence) = fence_marker(line) {
                    if out.last().is_some_and(|prev| !prev.trim().is_empty()) {
                        out.push("");
                    }
                    out.push(line);
                    open = Some(fence);
                    continue;
                }
            }
            Some(fence) => {
                if closes_fence(line, &fence) {
                    out.push(line);
                    open = None;
                    if lines.get(i + 1).is_some_and(|next| !next.trim().is_empty()) {
                        out.push("");
                    }
                    continue;
                }
            }
        }
        out.push(line);
    }

    Rewrite::compare(input, out.join("\n"), "Added blank lines around code blocks")
}

// ── Rule 8: Concatenated words ───────────────────────────────────────────────
//
// A lowercase letter directly followed by an uppercase one is read as a lost
// space ("endOf sentence"). This also splits camel-case product names used
// in prose (`JavaScript` → `Java Script`); code spans and URLs are protected,
// prose is not.

static RE_CASE_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z])([A-Z])").unwrap());

const KNOWN_CONCATENATIONS: [(&str, &str); 8] = [
    (r"\bandthe\b", "and the"),
    (r"\bofthe\b", "of the"),
    (r"\binthe\b", "in the"),
    (r"\btothe\b", "to the"),
    (r"\bforthe\b", "for the"),
    (r"\bonthe\b", "on the"),
    (r"\bwiththe\b", "with the"),
    (r"\bfromthe\b", "from the"),
];

static RE_KNOWN_CONCATENATIONS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    KNOWN_CONCATENATIONS
        .iter()
        .map(|(pattern, fixed)| (Regex::new(pattern).unwrap(), *fixed))
        .collect()
});

fn split_concatenated_words(input: &str) -> Rewrite {
    let split = RE_CASE_BOUNDARY.replace_all(input, "${1} ${2}").into_owned();
    let step = Rewrite::compare(input, split, "Split concatenated words");

    let phrases = RE_KNOWN_CONCATENATIONS
        .iter()
        .fold(step.text.clone(), |text, (re, fixed)| {
            re.replace_all(&text, *fixed).into_owned()
        });
    let next = Rewrite::compare(&step.text, phrases, "Fixed known concatenated phrases");
    step.then(next)
}

// ── Rule 9: List marker spacing ──────────────────────────────────────────────

static RE_LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([ \t]*)([-*+]|[0-9]+[.)])[ \t]{2,}").unwrap());

fn normalise_list_markers(input: &str) -> Rewrite {
    let out = RE_LIST_MARKER.replace_all(input, "${1}${2} ").into_owned();
    Rewrite::compare(input, out, "Normalized spacing after list markers")
}

// ── Rule 10: Alert labels ────────────────────────────────────────────────────

static RE_ALERT_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^(note|tip|important|warning|caution|danger):(?:[ \t]+|$)").unwrap()
});

fn bold_alert_labels(input: &str) -> Rewrite {
    let out = RE_ALERT_LABEL
        .replace_all(input, |caps: &regex::Captures<'_>| {
            if caps[0].ends_with(':') {
                format!("**{}:**", &caps[1])
            } else {
                format!("**{}:** ", &caps[1])
            }
        })
        .into_owned();
    Rewrite::compare(input, out, "Formatted alert labels in bold")
}

// ── Tests ────────────────────────────────────────────────────────────────────
