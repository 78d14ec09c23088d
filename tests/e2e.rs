//! End-to-end integration tests for edgequake-md2pdf.
//!
//! Most tests drive full conversions through a scripted fake
//! [`RenderEngine`], so the session lifecycle (validation gate, deadlines,
//! teardown on every path, artifact naming) is checked without a browser.
//!
//! The tests at the bottom launch a real headless Chrome. They are gated
//! behind the `E2E_ENABLED` environment variable so they do not run in CI
//! unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! In containers also set `MD2PDF_NO_SANDBOX=1` (and `CHROME_PATH` if Chrome
//! is not on the default search path).

use async_trait::async_trait;
use edgequake_md2pdf::pipeline::{envelope, markup};
use edgequake_md2pdf::{
    convert, convert_with, ChromeEngine, ConvertRequest, Md2PdfError, PdfRequest, RenderEngine,
    RenderOptions, RenderSession, RenderStage, RenderTimeouts, Renderer, ServiceConfig,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Fake engine ──────────────────────────────────────────────────────────────

const FAKE_PDF: &[u8] = b"%PDF-1.4\n1 0 obj <</Type /Pages /Count 2>>\n2 0 obj <</Type /Page>>\n3 0 obj <</Type /Page>>\n%%EOF\n";

#[derive(Debug, Clone, Copy, Default)]
enum Behaviour {
    #[default]
    Normal,
    LaunchFails,
    LoadHangs,
    SlowLoad,
    DiagramsNeverSettle,
    ExportFails,
}

#[derive(Default)]
struct Recorder {
    launches: AtomicUsize,
    closes: AtomicUsize,
    diagram_polls: AtomicUsize,
    html: Mutex<Option<String>>,
    request: Mutex<Option<PdfRequest>>,
}

#[derive(Clone, Default)]
struct FakeEngine {
    behaviour: Behaviour,
    recorder: Arc<Recorder>,
}

impl FakeEngine {
    fn new(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            recorder: Arc::default(),
        }
    }

    fn launches(&self) -> usize {
        self.recorder.launches.load(Ordering::SeqCst)
    }

    fn closes(&self) -> usize {
        self.recorder.closes.load(Ordering::SeqCst)
    }

    fn html(&self) -> String {
        self.recorder.html.lock().unwrap().clone().unwrap_or_default()
    }

    fn request(&self) -> Option<PdfRequest> {
        self.recorder.request.lock().unwrap().clone()
    }
}

#[async_trait]
impl RenderEngine for FakeEngine {
    async fn launch(&self) -> Result<Box<dyn RenderSession>, Md2PdfError> {
        self.recorder.launches.fetch_add(1, Ordering::SeqCst);
        if let Behaviour::LaunchFails = self.behaviour {
            return Err(Md2PdfError::render(RenderStage::Launch, "no chrome here"));
        }
        Ok(Box::new(FakeSession {
            behaviour: self.behaviour,
            recorder: Arc::clone(&self.recorder),
        }))
    }
}

struct FakeSession {
    behaviour: Behaviour,
    recorder: Arc<Recorder>,
}

#[async_trait]
impl RenderSession for FakeSession {
    async fn load_html(&mut self, html: &str) -> Result<(), Md2PdfError> {
        *self.recorder.html.lock().unwrap() = Some(html.to_string());
        match self.behaviour {
            Behaviour::LoadHangs => std::future::pending::<()>().await,
            Behaviour::SlowLoad => tokio::time::sleep(Duration::from_millis(50)).await,
            _ => {}
        }
        Ok(())
    }

    async fn wait_for_fonts(&mut self) -> Result<(), Md2PdfError> {
        Ok(())
    }

    async fn diagrams_settled(&mut self) -> Result<bool, Md2PdfError> {
        self.recorder.diagram_polls.fetch_add(1, Ordering::SeqCst);
        Ok(!matches!(self.behaviour, Behaviour::DiagramsNeverSettle))
    }

    async fn export_pdf(&mut self, request: &PdfRequest) -> Result<Vec<u8>, Md2PdfError> {
        *self.recorder.request.lock().unwrap() = Some(request.clone());
        if let Behaviour::ExportFails = self.behaviour {
            return Err(Md2PdfError::render(RenderStage::Export, "target crashed"));
        }
        Ok(FAKE_PDF.to_vec())
    }

    async fn close(self: Box<Self>) -> Result<(), Md2PdfError> {
        self.recorder.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── Test helpers ─────────────────────────────────────────────────────────────

fn config_for(dir: &Path) -> ServiceConfig {
    ServiceConfig {
        output_dir: dir.to_path_buf(),
        ..ServiceConfig::default()
    }
}

fn fast_timeouts() -> RenderTimeouts {
    RenderTimeouts {
        diagram_wait: Duration::from_millis(200),
        diagram_poll: Duration::from_millis(10),
        ..RenderTimeouts::default()
    }
}

const DIAGRAM_DOC: &str = "# Flow\n\n```mermaid\ngraph TD;\n  A-->B;\n```\n";

// ── Fake-engine conversions ──────────────────────────────────────────────────

#[tokio::test]
async fn test_successful_conversion_writes_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new(Behaviour::Normal);
    let renderer = Renderer::new(engine.clone());

    let mut request = ConvertRequest::new("# Title\n\n**  hello  **\n");
    request.output_filename = Some("greeting".into());
    let result = convert_with(&renderer, &request, &config_for(dir.path())).await;

    assert!(result.success, "{:?}", result.error);
    let path = result.artifact_path.clone().unwrap();
    assert_eq!(path, dir.path().join("greeting.pdf"));
    assert_eq!(std::fs::read(&path).unwrap(), FAKE_PDF);
    assert_eq!(result.page_count, Some(2));
    assert_eq!(result.has_diagrams, Some(false));
    assert_eq!(result.line_count, Some(3));
    assert!(result.processing_time_ms.is_some());
    assert_eq!(result.fixes.len(), 1);
    assert!(result.fixes[0].description.contains("spacing"));
    assert!(result.warnings.is_empty());

    assert!(engine.html().contains("<strong>hello</strong>"));
    assert_eq!(engine.launches(), 1);
    assert_eq!(engine.closes(), 1);
}

#[tokio::test]
async fn test_oversized_content_rejected_before_launch() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new(Behaviour::Normal);
    let renderer = Renderer::new(engine.clone());

    let request = ConvertRequest::new("a".repeat(11 * 1024 * 1024));
    let result = convert_with(&renderer, &request, &config_for(dir.path())).await;

    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("exceeds"));
    assert_eq!(engine.launches(), 0);
}

#[tokio::test]
async fn test_oversized_content_rejected_by_renderer_directly() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new(Behaviour::Normal);
    let renderer = Renderer::new(engine.clone());

    let big = "a".repeat(11 * 1024 * 1024);
    let result = renderer
        .render_to_file(&big, &dir.path().join("big.pdf"), &Default::default())
        .await;

    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("exceeds"));
    assert_eq!(engine.launches(), 0);
}

#[tokio::test]
async fn test_empty_content_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new(Behaviour::Normal);
    let renderer = Renderer::new(engine.clone());

    let result = convert_with(&renderer, &ConvertRequest::new("  \n\n"), &config_for(dir.path())).await;

    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("empty"));
    assert_eq!(engine.launches(), 0);
}

#[tokio::test]
async fn test_invalid_option_rejected_before_launch() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new(Behaviour::Normal);
    let renderer = Renderer::new(engine.clone());

    let mut request = ConvertRequest::new("# ok");
    request.paper_format = Some("B5".into());
    let result = convert_with(&renderer, &request, &config_for(dir.path())).await;

    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("B5"));
    assert_eq!(engine.launches(), 0);
}

#[tokio::test]
async fn test_diagrams_that_never_settle_still_export() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new(Behaviour::DiagramsNeverSettle);
    let renderer = Renderer::new(engine.clone()).with_timeouts(fast_timeouts());

    let result = convert_with(&renderer, &ConvertRequest::new(DIAGRAM_DOC), &config_for(dir.path())).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.has_diagrams, Some(true));
    assert!(result.artifact_path.unwrap().exists());
    assert!(engine.recorder.diagram_polls.load(Ordering::SeqCst) > 1);
    assert_eq!(engine.closes(), 1);

    let html = engine.html();
    assert!(html.contains(r#"<div class="mermaid">"#));
    assert!(html.contains("data-diagram-error"));
}

#[tokio::test]
async fn test_diagrams_settled_polls_once() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new(Behaviour::Normal);
    let renderer = Renderer::new(engine.clone()).with_timeouts(fast_timeouts());

    let result = convert_with(&renderer, &ConvertRequest::new(DIAGRAM_DOC), &config_for(dir.path())).await;

    assert!(result.success);
    assert_eq!(engine.recorder.diagram_polls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_no_diagram_poll_without_diagrams() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new(Behaviour::DiagramsNeverSettle);
    let renderer = Renderer::new(engine.clone()).with_timeouts(fast_timeouts());

    let result = convert_with(&renderer, &ConvertRequest::new("plain text"), &config_for(dir.path())).await;

    assert!(result.success);
    assert_eq!(engine.recorder.diagram_polls.load(Ordering::SeqCst), 0);
    assert!(!engine.html().contains("mermaid"));
}

#[tokio::test]
async fn test_load_timeout_is_hard_failure_and_tears_down() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new(Behaviour::LoadHangs);
    let timeouts = RenderTimeouts {
        base: Duration::from_millis(50),
        per_line: Duration::ZERO,
        ..RenderTimeouts::default()
    };
    let renderer = Renderer::new(engine.clone()).with_timeouts(timeouts);

    let result = convert_with(&renderer, &ConvertRequest::new("# Slow"), &config_for(dir.path())).await;

    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("timed out"));
    assert_eq!(engine.closes(), 1);
    assert!(!dir.path().join("output.pdf").exists());
}

#[tokio::test]
async fn test_export_failure_tears_down() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new(Behaviour::ExportFails);
    let renderer = Renderer::new(engine.clone());

    let result = convert_with(&renderer, &ConvertRequest::new("**  Doc  **"), &config_for(dir.path())).await;

    assert!(!result.success);
    let error = result.error.clone().unwrap();
    assert!(error.contains("PDF export"), "{error}");
    assert!(error.contains("target crashed"), "{error}");
    assert_eq!(engine.closes(), 1);
    // Fixes are still reported on failure.
    assert_eq!(result.fixes.len(), 1);
}

#[tokio::test]
async fn test_launch_failure_reports_stage() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new(Behaviour::LaunchFails);
    let renderer = Renderer::new(engine.clone());

    let result = convert_with(&renderer, &ConvertRequest::new("# Doc"), &config_for(dir.path())).await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("browser launch"));
    assert_eq!(engine.launches(), 1);
    assert_eq!(engine.closes(), 0);
}

#[tokio::test]
async fn test_existing_artifact_gets_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = Renderer::new(FakeEngine::new(Behaviour::Normal));
    let config = config_for(dir.path());

    let mut request = ConvertRequest::new("# Same");
    request.output_filename = Some("same.pdf".into());

    let first = convert_with(&renderer, &request, &config).await;
    let second = convert_with(&renderer, &request, &config).await;

    assert_eq!(first.artifact_path.unwrap(), dir.path().join("same.pdf"));
    assert_eq!(second.artifact_path.unwrap(), dir.path().join("same-1.pdf"));
}

#[tokio::test]
async fn test_simultaneous_same_name_requests_keep_both_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new(Behaviour::SlowLoad);
    let renderer = Renderer::new(engine.clone());
    let config = config_for(dir.path());

    let mut first = ConvertRequest::new("# First");
    first.output_filename = Some("same".into());
    let mut second = ConvertRequest::new("# Second");
    second.output_filename = Some("same".into());

    let (a, b) = tokio::join!(
        convert_with(&renderer, &first, &config),
        convert_with(&renderer, &second, &config)
    );

    assert!(a.success, "{:?}", a.error);
    assert!(b.success, "{:?}", b.error);
    let (path_a, path_b) = (a.artifact_path.unwrap(), b.artifact_path.unwrap());
    assert_ne!(path_a, path_b);

    let mut paths = vec![path_a.clone(), path_b.clone()];
    paths.sort();
    assert_eq!(
        paths,
        vec![dir.path().join("same-1.pdf"), dir.path().join("same.pdf")]
    );
    assert_eq!(std::fs::read(&path_a).unwrap(), FAKE_PDF);
    assert_eq!(std::fs::read(&path_b).unwrap(), FAKE_PDF);
    assert_eq!(engine.closes(), 2);
}

#[tokio::test]
async fn test_failed_conversion_releases_reserved_name() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path());
    let mut request = ConvertRequest::new("# Doc");
    request.output_filename = Some("report".into());

    let failing = Renderer::new(FakeEngine::new(Behaviour::ExportFails));
    let result = convert_with(&failing, &request, &config).await;
    assert!(!result.success);
    assert!(!dir.path().join("report.pdf").exists());

    let working = Renderer::new(FakeEngine::new(Behaviour::Normal));
    let result = convert_with(&working, &request, &config).await;
    assert_eq!(result.artifact_path.unwrap(), dir.path().join("report.pdf"));
}

#[tokio::test]
async fn test_render_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taken.pdf");
    std::fs::write(&path, b"keep me").unwrap();
    let engine = FakeEngine::new(Behaviour::Normal);
    let renderer = Renderer::new(engine.clone());

    let result = renderer
        .render_to_file("# New", &path, &Default::default())
        .await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("already exists"));
    assert_eq!(std::fs::read(&path).unwrap(), b"keep me");
    assert_eq!(engine.launches(), 0);
}

#[tokio::test]
async fn test_print_request_reflects_options() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new(Behaviour::Normal);
    let renderer = Renderer::new(engine.clone());

    let mut request = ConvertRequest::new("# Options");
    request.paper_format = Some("legal".into());
    request.paper_orientation = Some("Landscape".into());
    request.margin = Some("25.4mm".into());
    request.header_text = Some("Quarterly".into());
    request.watermark = Some("confidential material".into());
    request.code_theme = Some("dark".into());
    let result = convert_with(&renderer, &request, &config_for(dir.path())).await;
    assert!(result.success, "{:?}", result.error);

    let print = engine.request().unwrap();
    assert_eq!((print.paper_width, print.paper_height), (8.5, 14.0));
    assert!(print.landscape);
    assert!((print.margin - 1.0).abs() < 1e-9);
    assert!(print.print_background);
    assert!(print.display_header_footer);
    assert!(print.header_template.contains("Quarterly"));

    let html = engine.html();
    assert!(html.contains(">CONFIDENTIAL MA</div>"));
    assert!(html.contains("#0d1117"));
}

#[tokio::test]
async fn test_skip_preprocessing_renders_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new(Behaviour::Normal);
    let renderer = Renderer::new(engine.clone());

    let mut request = ConvertRequest::new("# A\n### B\n\n**foo");
    request.skip_preprocessing = true;
    let result = convert_with(&renderer, &request, &config_for(dir.path())).await;

    assert!(result.success);
    assert!(result.fixes.is_empty());
    assert_eq!(result.warnings.len(), 1);
    assert!(engine.html().contains("<h3>B</h3>"));
}

#[tokio::test]
async fn test_result_serialises_for_callers() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = Renderer::new(FakeEngine::new(Behaviour::Normal));

    let result = convert_with(&renderer, &ConvertRequest::new("# A\n### B"), &config_for(dir.path())).await;
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["success"], true);
    assert_eq!(json["pageCount"], 2);
    assert!(json["fixes"]
        .as_array()
        .unwrap()
        .iter()
        .any(|f| f["description"] == "Adjusted heading level from H3 to H2: B"));
}

#[tokio::test]
async fn test_concurrent_conversions_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new(Behaviour::Normal);
    let renderer = Arc::new(Renderer::new(engine.clone()));
    let config = Arc::new(config_for(dir.path()));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let renderer = Arc::clone(&renderer);
            let config = Arc::clone(&config);
            tokio::spawn(async move {
                let mut request = ConvertRequest::new(format!("# Doc {i}"));
                request.output_filename = Some(format!("doc-{i}"));
                convert_with(&renderer, &request, &config).await
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().success);
    }
    assert_eq!(engine.launches(), 4);
    assert_eq!(engine.closes(), 4);
}

// ── Real Chrome (E2E_ENABLED) ────────────────────────────────────────────────

macro_rules! e2e_skip_unless_enabled {
    () => {
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    };
}

#[tokio::test]
async fn test_chrome_renders_pdf() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let config = ServiceConfig {
        output_dir: dir.path().to_path_buf(),
        ..ServiceConfig::from_env()
    };

    let mut request = ConvertRequest::new(
        "# Report\n### Details\n\n**  Important  ** numbers:\n\n| a | b |\n|---|---|\n| 1 | 2 |\n",
    );
    request.paper_format = Some("A4".into());
    request.show_page_numbers = true;
    request.footer_text = Some("edgequake".into());

    let result = convert(&request, &config).await;

    assert!(result.success, "{:?}", result.error);
    let bytes = std::fs::read(result.artifact_path.unwrap()).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
    assert!(result.page_count.unwrap() >= 1);
    assert!(result
        .fixes
        .iter()
        .any(|f| f.description == "Adjusted heading level from H3 to H2: Details"));
}

#[tokio::test]
async fn test_chrome_renders_diagrams() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let config = ServiceConfig {
        output_dir: dir.path().to_path_buf(),
        ..ServiceConfig::from_env()
    };
    // A wait that would dominate the run if diagrams never settled.
    let renderer = Renderer::new(ChromeEngine::from_config(&config)).with_timeouts(RenderTimeouts {
        diagram_wait: Duration::from_secs(60),
        ..RenderTimeouts::default()
    });

    let result = convert_with(&renderer, &ConvertRequest::new(DIAGRAM_DOC), &config).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.has_diagrams, Some(true));
    let elapsed = result.processing_time_ms.unwrap();
    assert!(elapsed < 30_000, "diagram wait ran out ({elapsed}ms)");
}

#[tokio::test]
async fn test_chrome_diagram_containers_reach_terminal_state() {
    e2e_skip_unless_enabled!();
    let engine = ChromeEngine::from_config(&ServiceConfig::from_env());
    let html = envelope::build_document(&markup::to_html(DIAGRAM_DOC), &RenderOptions::default(), true);

    let mut session = engine.launch().await.unwrap();
    session.load_html(&html).await.unwrap();
    session.wait_for_fonts().await.unwrap();

    let mut settled = false;
    for _ in 0..100 {
        if session.diagrams_settled().await.unwrap() {
            settled = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    session.close().await.unwrap();

    // Offline the containers carry `data-diagram-error`; online they hold an `<svg>`.
    assert!(settled, "no .mermaid container rendered or failed within 10s");
}
