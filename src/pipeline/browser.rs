//! Rendering engine seam and the headless Chrome implementation.
//!
//! The orchestrator only talks to [`RenderEngine`] / [`RenderSession`], so the
//! whole lifecycle (timeouts, teardown on every path, soft diagram deadline)
//! can be exercised in tests with a fake engine and no browser installed.
//!
//! [`ChromeEngine`] drives Chrome over the DevTools protocol via
//! `chromiumoxide`. Each session gets its own browser process and a
//! throwaway profile directory, so concurrent conversions share nothing.

use crate::config::ServiceConfig;
use crate::error::{Md2PdfError, RenderStage};
use crate::pipeline::envelope::{DIAGRAMS_SETTLED_JS, FONTS_READY_JS};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::PathBuf;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Everything the print call needs, in the units the engine expects.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfRequest {
    /// Portrait paper width in inches; `landscape` rotates the page.
    pub paper_width: f64,
    pub paper_height: f64,
    pub landscape: bool,
    /// Uniform margin in inches.
    pub margin: f64,
    pub print_background: bool,
    pub display_header_footer: bool,
    pub header_template: String,
    pub footer_template: String,
}

/// Starts rendering sessions.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Launch a browser and open one blank page.
    async fn launch(&self) -> Result<Box<dyn RenderSession>, Md2PdfError>;
}

/// One browser instance with one page, used for exactly one conversion.
#[async_trait]
pub trait RenderSession: Send {
    /// Replace the page content with `html`, returning once it has loaded.
    async fn load_html(&mut self, html: &str) -> Result<(), Md2PdfError>;

    /// Resolve once the page's web fonts are ready.
    async fn wait_for_fonts(&mut self) -> Result<(), Md2PdfError>;

    /// `true` when every diagram has either rendered or failed.
    async fn diagrams_settled(&mut self) -> Result<bool, Md2PdfError>;

    /// Print the page to PDF bytes.
    async fn export_pdf(&mut self, request: &PdfRequest) -> Result<Vec<u8>, Md2PdfError>;

    /// Release the browser and everything it owns.
    async fn close(self: Box<Self>) -> Result<(), Md2PdfError>;
}

// ── Chrome ───────────────────────────────────────────────────────────────────

/// Headless Chrome/Chromium over the DevTools protocol.
#[derive(Debug, Clone, Default)]
pub struct ChromeEngine {
    executable: Option<PathBuf>,
    no_sandbox: bool,
}

impl ChromeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine configured from `CHROME_PATH` / `MD2PDF_NO_SANDBOX` settings.
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            executable: config.chrome_executable.clone(),
            no_sandbox: config.no_sandbox,
        }
    }

    pub fn executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    pub fn no_sandbox(mut self, v: bool) -> Self {
        self.no_sandbox = v;
        self
    }
}

#[async_trait]
impl RenderEngine for ChromeEngine {
    async fn launch(&self) -> Result<Box<dyn RenderSession>, Md2PdfError> {
        let launch_err = |e: &dyn std::fmt::Display| Md2PdfError::render(RenderStage::Launch, e);

        let profile = tempfile::Builder::new()
            .prefix("md2pdf-chrome-")
            .tempdir()
            .map_err(|e| launch_err(&e))?;

        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile.path())
            .arg("--disable-gpu")
            .arg("--hide-scrollbars")
            .arg("--font-render-hinting=none");
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        if self.no_sandbox {
            builder = builder.no_sandbox();
        }
        let config = builder.build().map_err(|e| launch_err(&e))?;

        let (mut browser, mut handler) =
            Browser::launch(config).await.map_err(|e| launch_err(&e))?;
        debug!("Chrome launched");

        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP event error: {e}");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                events.abort();
                return Err(launch_err(&e));
            }
        };

        Ok(Box::new(ChromeSession {
            browser,
            page,
            events,
            _profile: profile,
        }))
    }
}

struct ChromeSession {
    browser: Browser,
    page: Page,
    events: JoinHandle<()>,
    // Removed on drop, after the browser has exited.
    _profile: TempDir,
}

async fn evaluate_bool(page: &Page, expression: &str, stage: RenderStage) -> Result<bool, Md2PdfError> {
    let params = EvaluateParams::builder()
        .expression(expression)
        .await_promise(true)
        .return_by_value(true)
        .build()
        .map_err(|e| Md2PdfError::render(stage, e))?;
    let result = page
        .evaluate_expression(params)
        .await
        .map_err(|e| Md2PdfError::render(stage, e))?;
    result
        .into_value::<bool>()
        .map_err(|e| Md2PdfError::render(stage, e))
}

#[async_trait]
impl RenderSession for ChromeSession {
    async fn load_html(&mut self, html: &str) -> Result<(), Md2PdfError> {
        self.page
            .set_content(html)
            .await
            .map_err(|e| Md2PdfError::render(RenderStage::Load, e))?;
        Ok(())
    }

    async fn wait_for_fonts(&mut self) -> Result<(), Md2PdfError> {
        evaluate_bool(&self.page, FONTS_READY_JS, RenderStage::Fonts).await?;
        Ok(())
    }

    async fn diagrams_settled(&mut self) -> Result<bool, Md2PdfError> {
        evaluate_bool(&self.page, DIAGRAMS_SETTLED_JS, RenderStage::Diagrams).await
    }

    async fn export_pdf(&mut self, request: &PdfRequest) -> Result<Vec<u8>, Md2PdfError> {
        let params = PrintToPdfParams::builder()
            .landscape(request.landscape)
            .print_background(request.print_background)
            .display_header_footer(request.display_header_footer)
            .header_template(request.header_template.clone())
            .footer_template(request.footer_template.clone())
            .paper_width(request.paper_width)
            .paper_height(request.paper_height)
            .margin_top(request.margin)
            .margin_bottom(request.margin)
            .margin_left(request.margin)
            .margin_right(request.margin)
            .build();
        self.page
            .pdf(params)
            .await
            .map_err(|e| Md2PdfError::render(RenderStage::Export, e))
    }

    async fn close(self: Box<Self>) -> Result<(), Md2PdfError> {
        let ChromeSession {
            mut browser,
            events,
            _profile,
            ..
        } = *self;

        let closed = browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| Md2PdfError::render(RenderStage::Teardown, e));
        if let Err(e) = browser.wait().await {
            warn!("Chrome did not exit cleanly: {e}");
        }
        events.abort();
        debug!("Chrome closed");
        closed
    }
}
