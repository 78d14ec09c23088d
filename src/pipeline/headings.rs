//! Heading hierarchy repair.
//!
//! A document that jumps from `#` straight to `###` renders fine but breaks
//! the PDF outline and every table of contents built from it. Each heading
//! deeper than one level below the previous *emitted* heading is demoted to
//! `previous + 1`. Headings may rise to any shallower level freely.
//!
//! Runs after the normaliser so demoted headings already have their blank
//! line, and on protected text so `#` lines inside fenced code are invisible.

use super::normalize::{heading_level, Rewrite};

#[derive(Default)]
struct HeadingScan {
    lines: Vec<String>,
    last_level: usize,
    fixes: Vec<String>,
}

/// Clamp every heading to at most one level below the previous heading.
pub fn fix_heading_hierarchy(input: &str) -> Rewrite {
    let scan = input
        .split('\n')
        .fold(HeadingScan::default(), |mut scan, line| {
            let Some(level) = heading_level(line) else {
                scan.lines.push(line.to_string());
                return scan;
            };

            let emitted = if scan.last_level > 0 && level > scan.last_level + 1 {
                scan.last_level + 1
            } else {
                level
            };

            if emitted != level {
                let title = line[level..].trim();
                scan.fixes.push(format!(
                    "Adjusted heading level from H{level} to H{emitted}: {title}"
                ));
                scan.lines
                    .push(format!("{}{}", "#".repeat(emitted), &line[level..]));
            } else {
                scan.lines.push(line.to_string());
            }
            scan.last_level = emitted;
            scan
        });

    Rewrite {
        text: scan.lines.join("\n"),
        fixes: scan.fixes,
    }
}
