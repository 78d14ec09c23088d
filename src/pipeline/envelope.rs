//! HTML envelope and print templates.
//!
//! The body HTML is wrapped in a standalone document whose `<head>` carries
//! one stylesheet, in order:
//!
//! 1. the base rules with the selected code theme,
//! 2. diagram styles (only when the document has diagrams),
//! 3. the user's custom CSS, after every built-in rule so it wins ties,
//! 4. first-page watermark overrides (only for `first-page` scope).
//!
//! When the document has diagrams, the diagram library and its init script
//! close the `<body>`. Inline scripts run as soon as the parser reaches them,
//! so every `.mermaid` container must already be in the DOM by then. The
//! script renders each container and marks failures with
//! `data-diagram-error`, so the orchestrator can tell "still working" apart
//! from "gave up".

use crate::config::{CodeTheme, RenderOptions, WatermarkScope};

/// Diagram library loaded into the page.
pub const MERMAID_CDN: &str = "https://cdn.jsdelivr.net/npm/mermaid@10/dist/mermaid.min.js";

/// Empty template used when header/footer printing is disabled.
const BLANK_TEMPLATE: &str = "<div></div>";

const BASE_CSS: &str = r#"
@page { size: auto; }
html { -webkit-print-color-adjust: exact; print-color-adjust: exact; }
body {
  font-family: -apple-system, "Segoe UI", Roboto, "Helvetica Neue", Arial, sans-serif;
  font-size: 11pt;
  line-height: 1.55;
  color: #1f2328;
  margin: 0;
}
h1, h2, h3, h4, h5, h6 { line-height: 1.25; margin: 1.4em 0 0.6em; page-break-after: avoid; }
h1 { font-size: 2em; border-bottom: 1px solid #d0d7de; padding-bottom: 0.3em; }
h2 { font-size: 1.5em; border-bottom: 1px solid #d0d7de; padding-bottom: 0.3em; }
h3 { font-size: 1.25em; }
p, ul, ol, blockquote, table, pre { margin: 0 0 1em; }
a { color: #0969da; text-decoration: none; }
blockquote { border-left: 4px solid #d0d7de; padding: 0 1em; color: #59636e; }
table { border-collapse: collapse; width: 100%; page-break-inside: avoid; }
th, td { border: 1px solid #d0d7de; padding: 6px 12px; }
th { background: #f6f8fa; }
img { max-width: 100%; }
pre { border-radius: 6px; padding: 12px 16px; overflow-x: auto; page-break-inside: avoid; white-space: pre-wrap; }
code { font-family: ui-monospace, SFMono-Regular, Menlo, Consolas, monospace; font-size: 0.9em; }
:not(pre) > code { border-radius: 4px; padding: 0.15em 0.35em; }
.watermark {
  position: fixed;
  top: 50%;
  left: 50%;
  transform: translate(-50%, -50%) rotate(-45deg);
  font-size: 96pt;
  font-weight: bold;
  color: rgba(0, 0, 0, 0.08);
  white-space: nowrap;
  pointer-events: none;
  z-index: 1000;
}
"#;

const CODE_LIGHT_CSS: &str = r#"
pre { background: #f6f8fa; color: #1f2328; }
:not(pre) > code { background: rgba(175, 184, 193, 0.2); }
"#;

const CODE_DARK_CSS: &str = r#"
pre { background: #0d1117; color: #e6edf3; }
:not(pre) > code { background: #161b22; color: #e6edf3; }
"#;

const DIAGRAM_CSS: &str = r#"
.mermaid { text-align: center; margin: 1em 0; page-break-inside: avoid; }
.mermaid svg { max-width: 100%; height: auto; }
.mermaid[data-diagram-error] { color: #cf222e; font-family: monospace; white-space: pre-wrap; text-align: left; }
"#;

// Fixed elements repeat on every printed page; absolute ones stay on the first.
const WATERMARK_FIRST_PAGE_CSS: &str = r#"
.watermark { position: absolute; top: 5.5in; }
"#;

const DIAGRAM_SCRIPT: &str = r#"
(async () => {
  const nodes = Array.from(document.querySelectorAll('.mermaid'));
  if (typeof mermaid === 'undefined') {
    nodes.forEach((n) => n.setAttribute('data-diagram-error', 'diagram library unavailable'));
    return;
  }
  mermaid.initialize({ startOnLoad: false, securityLevel: 'loose', theme: 'default' });
  for (const node of nodes) {
    try {
      await mermaid.run({ nodes: [node] });
    } catch (err) {
      node.setAttribute('data-diagram-error', String((err && err.message) || err));
    }
  }
})();
"#;

/// Expression evaluated in the page: `true` once every diagram container
/// holds an `<svg>` or carries an error marker.
pub const DIAGRAMS_SETTLED_JS: &str = "Array.from(document.querySelectorAll('.mermaid')).every((n) => n.querySelector('svg') !== null || n.hasAttribute('data-diagram-error'))";

/// Expression evaluated in the page: resolves once web fonts have loaded.
pub const FONTS_READY_JS: &str = "document.fonts.ready.then(() => true)";

/// Wrap `body_html` in a complete printable document.
pub fn build_document(body_html: &str, options: &RenderOptions, has_diagrams: bool) -> String {
    let mut styles = String::with_capacity(BASE_CSS.len() + 512);
    styles.push_str(BASE_CSS);
    styles.push_str(match options.code_theme {
        CodeTheme::Light => CODE_LIGHT_CSS,
        CodeTheme::Dark => CODE_DARK_CSS,
    });
    if has_diagrams {
        styles.push_str(DIAGRAM_CSS);
    }
    if let Some(css) = &options.custom_css {
        styles.push('\n');
        styles.push_str(css);
        styles.push('\n');
    }
    if options.watermark.is_some() && options.watermark_scope == WatermarkScope::FirstPage {
        styles.push_str(WATERMARK_FIRST_PAGE_CSS);
    }

    let scripts = if has_diagrams {
        format!("<script src=\"{MERMAID_CDN}\"></script>\n<script>{DIAGRAM_SCRIPT}</script>\n")
    } else {
        String::new()
    };

    let watermark = options
        .watermark
        .as_deref()
        .map(|text| {
            format!(
                "<div class=\"watermark\" aria-hidden=\"true\">{}</div>\n",
                htmlize::escape_text(text)
            )
        })
        .unwrap_or_default();

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>{styles}</style>\n</head>\n<body>\n{watermark}<main class=\"markdown-body\">\n{body_html}</main>\n{scripts}</body>\n</html>\n"
    )
}

/// Header and footer templates for the print call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTemplates {
    pub enabled: bool,
    pub header: String,
    pub footer: String,
}

/// Build the print templates. Disabled unless page numbers, header text or
/// footer text was requested.
pub fn page_templates(options: &RenderOptions) -> PageTemplates {
    if !options.wants_header_footer() {
        return PageTemplates {
            enabled: false,
            header: BLANK_TEMPLATE.to_string(),
            footer: BLANK_TEMPLATE.to_string(),
        };
    }

    const STYLE: &str = "font-size:9px;color:#666;width:100%;margin:0 0.5in;";

    let header = match &options.header_text {
        Some(text) => format!(
            "<div style=\"{STYLE}text-align:center;\">{}</div>",
            htmlize::escape_text(text.as_str())
        ),
        None => BLANK_TEMPLATE.to_string(),
    };

    let left = options
        .footer_text
        .as_deref()
        .map(|t| htmlize::escape_text(t).into_owned())
        .unwrap_or_default();
    let right = if options.show_page_numbers {
        "Page <span class=\"pageNumber\"></span> of <span class=\"totalPages\"></span>"
    } else {
        ""
    };
    let footer = format!(
        "<div style=\"{STYLE}display:flex;justify-content:space-between;\"><span>{left}</span><span>{right}</span></div>"
    );

    PageTemplates {
        enabled: true,
        header,
        footer,
    }
}
