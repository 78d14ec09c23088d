//! Balance checking: warn about markers the normaliser could not pair up.
//!
//! Read-only. The checker never edits text and never blocks a conversion; it
//! only reports what will probably render as literal asterisks or backticks.
//! Code spans and fenced blocks are excluded by reusing the protector's
//! masking.

use super::protect::{fence_marker, protect};
use crate::output::WarningRecord;
use tracing::debug;

#[derive(Debug, Default, PartialEq, Eq)]
struct MarkerCounts {
    bold: usize,
    italic: usize,
    code: usize,
}

/// Inspect the final text and describe every unbalanced marker family.
pub fn check_balance(text: &str) -> Vec<WarningRecord> {
    let protected = protect(text);
    let masked = protected.masked();

    let counts = masked
        .split('\n')
        .filter(|line| fence_marker(line).is_none())
        .fold(MarkerCounts::default(), |mut acc, line| {
            count_line(line, &mut acc);
            acc
        });
    debug!(?counts, "Marker counts");

    let mut warnings = Vec::new();
    if counts.bold % 2 != 0 {
        warnings.push(WarningRecord::new(format!(
            "Unbalanced bold markers (**): found {} markers, expected an even count",
            counts.bold
        )));
    }
    if counts.italic % 2 != 0 {
        warnings.push(WarningRecord::new(format!(
            "Unbalanced italic markers (*): found {} markers, expected an even count",
            counts.italic
        )));
    }
    if counts.code % 2 != 0 {
        warnings.push(WarningRecord::new(format!(
            "Unbalanced inline code markers (`): found {} delimiters, expected an even count",
            counts.code
        )));
    }
    if masked.contains("\\*") || masked.contains("\\_") {
        warnings.push(WarningRecord::new(
            "Escaped emphasis markers (\\* or \\_) remain and will render literally",
        ));
    }
    warnings
}

fn count_line(line: &str, acc: &mut MarkerCounts) {
    if is_thematic_break(line) {
        return;
    }

    let bytes = line.as_bytes();
    let indent = bytes.iter().take_while(|&&b| b == b' ' || b == b'\t').count();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b != b'*' && b != b'`' {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i] == b {
            i += 1;
        }
        let run = i - start;

        if b == b'`' {
            acc.code += 1;
            continue;
        }
        // Escaped `\*` is literal text.
        if start > 0 && bytes[start - 1] == b'\\' {
            continue;
        }
        let is_bullet = start == indent
            && run == 1
            && matches!(bytes.get(i), Some(b' ' | b'\t') | None);
        if is_bullet {
            continue;
        }
        acc.bold += run / 2;
        acc.italic += run % 2;
    }
}

fn is_thematic_break(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.chars().filter(|&c| c == '*').count() >= 3
        && trimmed.chars().all(|c| c == '*' || c == ' ' || c == '\t')
}
