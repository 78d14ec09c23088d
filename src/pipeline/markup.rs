//! Markdown → HTML body conversion.
//!
//! comrak with the GitHub-flavoured extensions authors expect (tables, task
//! lists, strikethrough, autolinks, footnotes, alerts). Raw HTML is passed
//! through: the input is the caller's own document, not untrusted web content.
//!
//! ` ```mermaid ` blocks come out of comrak as ordinary code blocks; they are
//! rewritten into `<div class="mermaid">` containers that the in-page diagram
//! script picks up.

use comrak::Options;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_DIAGRAM_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ ]{0,3}(?:```|~~~)[ \t]*mermaid\b").unwrap());

static RE_DIAGRAM_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<pre><code class="language-mermaid">(.*?)</code></pre>"#).unwrap()
});

/// `true` if the document contains at least one mermaid code fence.
pub fn has_diagram_blocks(markdown: &str) -> bool {
    RE_DIAGRAM_FENCE.is_match(markdown)
}

/// Render `markdown` to an HTML fragment with diagram containers in place.
pub fn to_html(markdown: &str) -> String {
    let html = comrak::markdown_to_html(markdown, &options());
    RE_DIAGRAM_BLOCK
        .replace_all(&html, r#"<div class="mermaid">${1}</div>"#)
        .into_owned()
}

fn options() -> Options<'static> {
    let mut options = Options::default();

    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.footnotes = true;
    ext.description_lists = true;
    ext.alerts = true;
    ext.front_matter_delimiter = Some("---".to_string());

    let render = &mut options.render;
    render.r#unsafe = true;
    render.tasklist_classes = true;

    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagram_detection() {
        assert!(has_diagram_blocks("intro\n\n```mermaid\ngraph TD;\n```"));
        assert!(has_diagram_blocks("~~~ mermaid\nx\n~~~"));
        assert!(!has_diagram_blocks("```rust\nlet mermaid = 1;\n```"));
        assert!(!has_diagram_blocks("talk about mermaid diagrams"));
    }

    #[test]
    fn test_mermaid_block_becomes_container() {
        let html = to_html("```mermaid\ngraph TD;\nA-->B;\n```\n");
        assert!(html.contains(r#"<div class="mermaid">"#), "{html}");
        assert!(html.contains("A--&gt;B;"), "{html}");
        assert!(!html.contains("language-mermaid"), "{html}");
    }

    #[test]
    fn test_other_code_blocks_untouched() {
        let html = to_html("```rust\nfn main() {}\n```\n");
        assert!(html.contains(r#"<code class="language-rust">"#), "{html}");
    }

    #[test]
    fn test_gfm_extensions_enabled() {
        let html = to_html("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~gone~~\n\n- [x] done\n");
        assert!(html.contains("<table>"), "{html}");
        assert!(html.contains("<del>gone</del>"), "{html}");
        assert!(html.contains("checkbox"), "{html}");
    }

    #[test]
    fn test_front_matter_stripped() {
        let html = to_html("---\ntitle: x\n---\n\n# Hello\n");
        assert!(!html.contains("title: x"), "{html}");
        assert!(html.contains("<h1>Hello</h1>"), "{html}");
    }
}
