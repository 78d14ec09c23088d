//! Error types for the edgequake-md2pdf library.
//!
//! Failures fall into four families:
//!
//! * **Validation**: the request cannot be rendered as given (empty content,
//!   content over the size bound, an unsupported option value). Raised before
//!   any browser session exists.
//! * **Hard render timeout**: the page did not settle within the deadline
//!   computed from the document size.
//! * **Render failure**: anything else that goes wrong inside the browser
//!   session, tagged with the [`RenderStage`] it happened in.
//! * **Output**: the artifact could not be written.
//!
//! A diagram that never finishes rendering is *not* an error: the
//! orchestrator logs it and exports whatever the page shows at that moment.
//!
//! None of these escape [`crate::convert::convert`] or
//! [`crate::pipeline::render::Renderer::render_to_file`]; both flatten them
//! into a [`crate::output::ConversionResult`] with `success = false`.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the edgequake-md2pdf library.
#[derive(Debug, Error)]
pub enum Md2PdfError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// Content is empty or whitespace only.
    #[error("Markdown content is empty")]
    EmptyContent,

    /// Content exceeds the fixed size bound.
    #[error("Content size {size} bytes exceeds the maximum of {limit} bytes")]
    ContentTooLarge { size: usize, limit: usize },

    /// A request field or builder value is malformed or unsupported.
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    // ── Render errors ─────────────────────────────────────────────────────
    /// The page did not finish loading within the computed deadline.
    #[error("Rendering timed out after {secs}s while loading content")]
    RenderTimeout { secs: u64 },

    /// Any other failure inside the browser session.
    #[error("Rendering failed during {stage}: {message}")]
    Render { stage: RenderStage, message: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The target path already exists; artifacts are never overwritten.
    #[error("Output file '{path}' already exists")]
    OutputExists { path: PathBuf },

    /// Could not create or write the PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Md2PdfError {
    /// Shorthand for a [`Md2PdfError::Render`] at `stage`.
    pub fn render(stage: RenderStage, message: impl fmt::Display) -> Self {
        Md2PdfError::Render {
            stage,
            message: message.to_string(),
        }
    }

    /// `true` for errors raised before a rendering session is created.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Md2PdfError::EmptyContent
                | Md2PdfError::ContentTooLarge { .. }
                | Md2PdfError::InvalidOption(_)
        )
    }
}

/// Step of the rendering session in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Launch,
    Load,
    Fonts,
    Diagrams,
    Export,
    Teardown,
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RenderStage::Launch => "browser launch",
            RenderStage::Load => "content load",
            RenderStage::Fonts => "font loading",
            RenderStage::Diagrams => "diagram rendering",
            RenderStage::Export => "PDF export",
            RenderStage::Teardown => "session teardown",
        };
        f.write_str(name)
    }
}
