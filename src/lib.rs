//! # edgequake-md2pdf
//!
//! Convert free-form Markdown into a paginated PDF, repairing common
//! authoring defects on the way.
//!
//! ## Why this crate?
//!
//! Markdown that comes out of chat assistants, wikis and copy-paste is almost
//! right: `** bold **` with stray spaces, headings glued to paragraphs, levels
//! that jump from H1 to H4, fences without breathing room. Renderers take it
//! literally and the PDF shows asterisks. This crate fixes those defects
//! with deterministic rules that never touch code or URLs, then prints
//! the result through headless Chrome so tables, web fonts and Mermaid
//! diagrams look the way they do in a browser.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Markdown
//!  │
//!  ├─ 1. Protect    mask code blocks, code spans, URLs
//!  ├─ 2. Normalise  10 ordered rewrite passes (emphasis, headings, fences, …)
//!  ├─ 3. Headings   clamp skipped heading levels
//!  ├─ 4. Balance    warn about unpaired markers (never blocks)
//!  ├─ 5. HTML       comrak + standalone document with print styles
//!  ├─ 6. Render     headless Chrome: load → fonts → diagrams → print
//!  └─ 7. Output     atomic PDF write + page count, fixes and warnings
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_md2pdf::{convert, ConvertRequest, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     // Output directory and Chrome binary from MD2PDF_OUTPUT_DIR / CHROME_PATH
//!     let config = ServiceConfig::from_env();
//!     let request = ConvertRequest::new("# Title\n### Skipped level\n\n**  loose bold  **");
//!     let result = convert(&request, &config).await;
//!     if result.success {
//!         println!("{:?} ({} pages)", result.artifact_path, result.page_count.unwrap_or(0));
//!     } else {
//!         eprintln!("failed: {}", result.error.unwrap_or_default());
//!     }
//! }
//! ```
//!
//! Text repair alone needs no browser:
//!
//! ```rust
//! use edgequake_md2pdf::preprocess;
//!
//! let out = preprocess("**  hello  **");
//! assert_eq!(out.markdown, "**hello**");
//! assert_eq!(out.fixes.len(), 1);
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2pdf` binary (clap + anyhow + serde_json + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-md2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    CodeTheme, Orientation, PaperFormat, RenderOptions, RenderOptionsBuilder, ServiceConfig,
    WatermarkScope,
};
pub use convert::{convert, convert_with, output_file_name, reserve_output_path, ConvertRequest};
pub use error::{Md2PdfError, RenderStage};
pub use output::{ConversionResult, FixRecord, WarningRecord};
pub use pipeline::browser::{ChromeEngine, PdfRequest, RenderEngine, RenderSession};
pub use pipeline::preprocess::{preprocess, Preprocessed};
pub use pipeline::render::{RenderTimeouts, Renderer, MAX_CONTENT_BYTES};
