//! Render orchestration: Markdown in, PDF file plus metadata out.
//!
//! ## Lifecycle
//!
//! ```text
//! validate ──▶ envelope ──▶ launch ──▶ load ──▶ fonts ──▶ diagrams? ──▶ export ──▶ write
//!   (size)      (HTML)      (engine)   (hard     (ready)   (soft          (print)    (atomic)
//!                                      deadline)           deadline)
//! ```
//!
//! Every step after `launch` runs inside one session, and the session is
//! closed on every path out, including failures and timeouts.
//!
//! The PDF is written through a uniquely named temp file in the target
//! directory and persisted without clobbering, so an existing artifact is
//! never replaced, even by a concurrent render aimed at the same path.
//!
//! ## Why two deadlines?
//!
//! Loading content that never settles means the page is unusable, so the
//! load deadline is a hard failure. Diagrams are different: a single broken
//! diagram should not cost the author the whole document. When the diagram
//! deadline expires the orchestrator logs a warning and exports whatever the
//! page shows.
//!
//! The load deadline scales with document size (see
//! [`RenderTimeouts::content_timeout`]): 30 s base, plus 10 ms per line capped
//! at 270 s, plus 30 s when diagrams are present, for a ceiling of 330 s.

use crate::config::RenderOptions;
use crate::error::Md2PdfError;
use crate::output::ConversionResult;
use crate::pipeline::browser::{ChromeEngine, PdfRequest, RenderEngine, RenderSession};
use crate::pipeline::{envelope, markup, pages};
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Largest accepted Markdown input, in bytes (10 MiB).
pub const MAX_CONTENT_BYTES: usize = 10 * 1024 * 1024;

/// Deadlines used by [`Renderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTimeouts {
    /// Fixed part of the load deadline.
    pub base: Duration,
    /// Added per line of Markdown.
    pub per_line: Duration,
    /// Cap on the per-line contribution.
    pub line_budget_cap: Duration,
    /// Added to the load deadline when the document has diagrams.
    pub diagram_allowance: Duration,
    /// Soft deadline for diagrams to settle after load.
    pub diagram_wait: Duration,
    /// Interval between diagram readiness checks.
    pub diagram_poll: Duration,
}

impl Default for RenderTimeouts {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(30),
            per_line: Duration::from_millis(10),
            line_budget_cap: Duration::from_secs(270),
            diagram_allowance: Duration::from_secs(30),
            diagram_wait: Duration::from_secs(30),
            diagram_poll: Duration::from_millis(250),
        }
    }
}

impl RenderTimeouts {
    /// Hard deadline for loading a document of `line_count` lines.
    pub fn content_timeout(&self, line_count: usize, has_diagrams: bool) -> Duration {
        let lines = u32::try_from(line_count).unwrap_or(u32::MAX);
        let scaled = self.per_line.saturating_mul(lines).min(self.line_budget_cap);
        let diagrams = if has_diagrams {
            self.diagram_allowance
        } else {
            Duration::ZERO
        };
        self.base + scaled + diagrams
    }
}

/// Reject content that must never reach a browser.
pub fn validate_content(markdown: &str) -> Result<(), Md2PdfError> {
    if markdown.trim().is_empty() {
        return Err(Md2PdfError::EmptyContent);
    }
    if markdown.len() > MAX_CONTENT_BYTES {
        return Err(Md2PdfError::ContentTooLarge {
            size: markdown.len(),
            limit: MAX_CONTENT_BYTES,
        });
    }
    Ok(())
}

/// Drives one [`RenderEngine`] session per conversion.
///
/// # Example
/// ```rust,no_run
/// use edgequake_md2pdf::{RenderOptions, Renderer};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() {
/// let renderer = Renderer::chrome();
/// let result = renderer
///     .render_to_file("# Hello", Path::new("hello.pdf"), &RenderOptions::default())
///     .await;
/// assert!(result.success, "{:?}", result.error);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Renderer<E = ChromeEngine> {
    engine: E,
    timeouts: RenderTimeouts,
}

impl Renderer<ChromeEngine> {
    /// A renderer backed by auto-detected headless Chrome.
    pub fn chrome() -> Self {
        Self::new(ChromeEngine::new())
    }
}

impl<E: RenderEngine> Renderer<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            timeouts: RenderTimeouts::default(),
        }
    }

    /// Replace the default deadlines.
    pub fn with_timeouts(mut self, timeouts: RenderTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn timeouts(&self) -> &RenderTimeouts {
        &self.timeouts
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Render `markdown` to a PDF at `output_path`.
    ///
    /// Fails with `OutputExists` rather than replace a file already at
    /// `output_path`. Never fails otherwise: errors are reported through
    /// `success`/`error` on the returned [`ConversionResult`].
    pub async fn render_to_file(
        &self,
        markdown: &str,
        output_path: &Path,
        options: &RenderOptions,
    ) -> ConversionResult {
        self.render(markdown, output_path, options, WriteMode::CreateNew)
            .await
    }

    /// Render into a path the caller reserved as an empty placeholder (see
    /// [`crate::convert::reserve_output_path`]). The placeholder is replaced
    /// on success and removed on failure.
    pub(crate) async fn render_to_reserved(
        &self,
        markdown: &str,
        output_path: &Path,
        options: &RenderOptions,
    ) -> ConversionResult {
        let result = self
            .render(markdown, output_path, options, WriteMode::ReplaceReservation)
            .await;
        if !result.success {
            if let Err(e) = tokio::fs::remove_file(output_path).await {
                debug!("Could not remove reservation {}: {e}", output_path.display());
            }
        }
        result
    }

    async fn render(
        &self,
        markdown: &str,
        output_path: &Path,
        options: &RenderOptions,
        mode: WriteMode,
    ) -> ConversionResult {
        let start = Instant::now();
        match self.try_render(markdown, output_path, options, mode, start).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Render failed: {e}");
                ConversionResult {
                    artifact_path: Some(output_path.to_path_buf()),
                    ..ConversionResult::failure(e, elapsed_ms(start))
                }
            }
        }
    }

    async fn try_render(
        &self,
        markdown: &str,
        output_path: &Path,
        options: &RenderOptions,
        mode: WriteMode,
        start: Instant,
    ) -> Result<ConversionResult, Md2PdfError> {
        validate_content(markdown)?;
        let margin = options.margin_inches()?;
        // Early exit only; the no-clobber persist enforces this at write time.
        if mode == WriteMode::CreateNew
            && tokio::fs::try_exists(output_path).await.unwrap_or(false)
        {
            return Err(Md2PdfError::OutputExists {
                path: output_path.to_path_buf(),
            });
        }

        let has_diagrams = markup::has_diagram_blocks(markdown);
        let line_count = markdown.lines().count();
        let deadline = self.timeouts.content_timeout(line_count, has_diagrams);
        let html = envelope::build_document(&markup::to_html(markdown), options, has_diagrams);
        let request = pdf_request(options, margin);

        info!(
            "Rendering {} bytes / {} lines (diagrams: {}, deadline: {:?})",
            markdown.len(),
            line_count,
            has_diagrams,
            deadline
        );

        let mut session = self.engine.launch().await?;
        let outcome = self
            .drive(session.as_mut(), &html, deadline, has_diagrams, &request)
            .await;
        if let Err(e) = session.close().await {
            warn!("Session teardown failed: {e}");
        }
        let pdf = outcome?;

        let pdf = write_artifact(output_path, pdf, mode).await?;
        let page_count = pages::count_pages(&pdf);
        info!(
            "Wrote {} ({} pages, {} bytes)",
            output_path.display(),
            page_count,
            pdf.len()
        );

        Ok(ConversionResult {
            success: true,
            artifact_path: Some(output_path.to_path_buf()),
            page_count: Some(page_count),
            content_size: Some(markdown.len()),
            line_count: Some(line_count),
            processing_time_ms: Some(elapsed_ms(start)),
            has_diagrams: Some(has_diagrams),
            ..ConversionResult::default()
        })
    }

    async fn drive(
        &self,
        session: &mut dyn RenderSession,
        html: &str,
        deadline: Duration,
        has_diagrams: bool,
        request: &PdfRequest,
    ) -> Result<Vec<u8>, Md2PdfError> {
        match tokio::time::timeout(deadline, session.load_html(html)).await {
            Ok(loaded) => loaded?,
            Err(_) => {
                return Err(Md2PdfError::RenderTimeout {
                    secs: deadline.as_secs(),
                })
            }
        }
        debug!("Content loaded");

        session.wait_for_fonts().await?;
        debug!("Fonts ready");

        if has_diagrams {
            self.wait_for_diagrams(session).await?;
        }

        session.export_pdf(request).await
    }

    /// Poll until every diagram settled or the soft deadline passes.
    async fn wait_for_diagrams(&self, session: &mut dyn RenderSession) -> Result<(), Md2PdfError> {
        let poll = self.timeouts.diagram_poll;
        let settled = tokio::time::timeout(self.timeouts.diagram_wait, async {
            loop {
                if session.diagrams_settled().await? {
                    return Ok::<(), Md2PdfError>(());
                }
                tokio::time::sleep(poll).await;
            }
        })
        .await;

        match settled {
            Ok(result) => {
                debug!("Diagrams settled");
                result
            }
            Err(_) => {
                warn!(
                    "Diagrams did not finish within {:?}; exporting current state",
                    self.timeouts.diagram_wait
                );
                Ok(())
            }
        }
    }
}

fn pdf_request(options: &RenderOptions, margin: f64) -> PdfRequest {
    let (paper_width, paper_height) = options.paper_format.dimensions_inches();
    let templates = envelope::page_templates(options);
    PdfRequest {
        paper_width,
        paper_height,
        landscape: options.orientation == crate::config::Orientation::Landscape,
        margin,
        print_background: true,
        display_header_footer: templates.enabled,
        header_template: templates.header,
        footer_template: templates.footer,
    }
}

/// How the final artifact may land at its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    /// The path must not exist.
    CreateNew,
    /// The path holds this conversion's own empty reservation.
    ReplaceReservation,
}

/// Write `bytes` to `path` via a temp file in the same directory, so readers
/// never see a half-written PDF. Returns the bytes for page counting.
async fn write_artifact(path: &Path, bytes: Vec<u8>, mode: WriteMode) -> Result<Vec<u8>, Md2PdfError> {
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || persist_artifact(&target, &bytes, mode).map(|()| bytes))
        .await
        .map_err(|e| Md2PdfError::Internal(format!("artifact write task failed: {e}")))?
}

fn persist_artifact(path: &Path, bytes: &[u8], mode: WriteMode) -> Result<(), Md2PdfError> {
    let write_err = |e: std::io::Error| Md2PdfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => parent,
        None => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_err)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".md2pdf-")
        .suffix(".pdf.tmp")
        .tempfile_in(parent)
        .map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;

    let persisted = match mode {
        WriteMode::CreateNew => tmp.persist_noclobber(path),
        WriteMode::ReplaceReservation => tmp.persist(path),
    };
    match persisted {
        Ok(_) => Ok(()),
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
            Err(Md2PdfError::OutputExists {
                path: path.to_path_buf(),
            })
        }
        Err(e) => Err(write_err(e.error)),
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
