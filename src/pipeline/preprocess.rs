//! The full text-repair pipeline: protect → normalise → fix headings →
//! restore → check balance.

use super::balance::check_balance;
use super::headings::fix_heading_hierarchy;
use super::normalize::normalize;
use super::protect::protect;
use crate::output::{FixRecord, WarningRecord};
use tracing::debug;

/// Repaired Markdown plus what was changed and what still looks wrong.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preprocessed {
    pub markdown: String,
    pub fixes: Vec<FixRecord>,
    pub warnings: Vec<WarningRecord>,
}

impl Preprocessed {
    /// Text handed through without repair; balance warnings are still reported.
    pub fn passthrough(markdown: &str) -> Self {
        Self {
            markdown: markdown.to_string(),
            fixes: Vec::new(),
            warnings: check_balance(markdown),
        }
    }
}

/// Repair `markdown` without touching code or URLs.
///
/// CRLF input is repaired as LF and handed back with CRLF endings.
pub fn preprocess(markdown: &str) -> Preprocessed {
    let crlf = markdown.contains("\r\n");
    let lf_text;
    let markdown = if crlf {
        lf_text = markdown.replace("\r\n", "\n");
        lf_text.as_str()
    } else {
        markdown
    };

    let protected = protect(markdown);
    debug!(spans = protected.span_count(), "Protected literal spans");

    let normalized = normalize(protected.masked());
    let leveled = fix_heading_hierarchy(&normalized.text);
    let rewrite = normalized.then(leveled);
    let text = protected.restore(&rewrite.text);

    let fixes: Vec<FixRecord> = rewrite
        .fixes
        .iter()
        .map(|d| FixRecord::new(protected.restore(d)))
        .collect();
    for fix in &fixes {
        debug!("Fix: {fix}");
    }

    let warnings = check_balance(&text);
    for warning in &warnings {
        debug!("Warning: {warning}");
    }

    Preprocessed {
        markdown: if crlf { text.replace('\n', "\r\n") } else { text },
        fixes,
        warnings,
    }
}
