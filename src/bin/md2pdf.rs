//! CLI binary for edgequake-md2pdf.
//!
//! A thin shim over the library crate that maps CLI flags to a
//! `ConvertRequest` + `ServiceConfig` and prints the result.

use anyhow::{bail, Context, Result};
use clap::Parser;
use edgequake_md2pdf::{
    convert, output_file_name, preprocess, ConversionResult, ConvertRequest, Preprocessed,
    ServiceConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion (writes notes.pdf to the current directory)
  md2pdf notes.md

  # From stdin, into a specific directory and file name
  cat notes.md | md2pdf - -o build/ --name handout

  # A4 landscape, page numbers, footer, watermark on the first page only
  md2pdf report.md --paper a4 --orientation landscape --page-numbers \
      --footer "ACME Corp" --watermark draft --watermark-scope first-page

  # Dark code blocks and a custom stylesheet
  md2pdf slides.md --code-theme dark --css print.css

  # Show what would be repaired, without rendering
  md2pdf --preprocess-only notes.md

  # JSON result (for scripts)
  md2pdf --json notes.md > result.json

PAPER FORMATS:
  Letter (default), Legal, Tabloid, Ledger, A0, A1, A2, A3, A4, A5, A6

ENVIRONMENT VARIABLES:
  MD2PDF_OUTPUT_DIR   Directory PDFs are written to (default: current directory)
  MD2PDF_VERBOSE      Enable DEBUG-level logs
  MD2PDF_NO_SANDBOX   Launch Chrome with --no-sandbox (containers, CI)
  CHROME_PATH         Chrome/Chromium binary; auto-detected when unset

SETUP:
  A local Chrome or Chromium is required for rendering. Mermaid diagrams
  load their renderer from a CDN; offline, diagrams are left as source text.
"#;

/// Convert Markdown files to PDF through headless Chrome.
#[derive(Parser, Debug)]
#[command(
    name = "md2pdf",
    version,
    about = "Convert Markdown to PDF with automatic Markdown repair",
    long_about = "Convert Markdown to a paginated PDF. Common authoring defects (padded \
emphasis markers, skipped heading levels, cramped fences, glued words) are repaired first; \
code and URLs are never touched. Rendering uses headless Chrome, so tables, web fonts and \
Mermaid diagrams print as they display.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown file to convert; `-` or omitted reads stdin.
    input: Option<PathBuf>,

    /// Directory to write the PDF into.
    #[arg(short, long, env = "MD2PDF_OUTPUT_DIR")]
    output: Option<PathBuf>,

    /// Output file name (`.pdf` appended when missing). Default: input name.
    #[arg(short, long)]
    name: Option<String>,

    /// Paper format: Letter, Legal, Tabloid, Ledger, A0–A6.
    #[arg(long, env = "MD2PDF_PAPER")]
    paper: Option<String>,

    /// Page orientation: portrait or landscape.
    #[arg(long, env = "MD2PDF_ORIENTATION")]
    orientation: Option<String>,

    /// Uniform page margin as a CSS length (e.g. 2cm, 15mm, 1in).
    #[arg(long, env = "MD2PDF_MARGIN")]
    margin: Option<String>,

    /// Watermark text (max 15 characters, upper-cased).
    #[arg(long)]
    watermark: Option<String>,

    /// Watermark pages: all-pages or first-page.
    #[arg(long)]
    watermark_scope: Option<String>,

    /// Print "Page N of M" in the footer.
    #[arg(long)]
    page_numbers: bool,

    /// Text centred in the page header.
    #[arg(long)]
    header: Option<String>,

    /// Text on the left of the page footer.
    #[arg(long)]
    footer: Option<String>,

    /// Code block colours: light or dark.
    #[arg(long, env = "MD2PDF_CODE_THEME")]
    code_theme: Option<String>,

    /// Path to a CSS file appended after the built-in styles.
    #[arg(long)]
    css: Option<PathBuf>,

    /// Render the Markdown as-is, without repair passes.
    #[arg(long)]
    no_fix: bool,

    /// Print the repaired Markdown and the fix report; do not render.
    #[arg(long)]
    preprocess_only: bool,

    /// Chrome/Chromium executable.
    #[arg(long, env = "CHROME_PATH")]
    chrome: Option<PathBuf>,

    /// Launch Chrome without its sandbox.
    #[arg(long, env = "MD2PDF_NO_SANDBOX")]
    no_sandbox: bool,

    /// Output the structured result as JSON.
    #[arg(long, env = "MD2PDF_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "MD2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MD2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MD2PDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = service_config(&cli);

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner is the feedback while rendering; INFO logs would tear it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.preprocess_only;
    let filter = if config.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Read input ───────────────────────────────────────────────────────
    let input = cli.input.as_deref().filter(|p| *p != Path::new("-"));
    let markdown = match input {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read Markdown from stdin")?;
            buf
        }
    };

    // ── Preprocess-only mode ─────────────────────────────────────────────
    if cli.preprocess_only {
        let report = if cli.no_fix {
            Preprocessed::passthrough(&markdown)
        } else {
            preprocess(&markdown)
        };
        print_preprocessed(&report, cli.json)?;
        return Ok(());
    }

    // ── Build request ────────────────────────────────────────────────────
    let request = build_request(&cli, markdown, input).await?;

    // ── Run conversion ───────────────────────────────────────────────────
    let spinner = show_progress.then(|| {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Rendering");
        bar.set_message("launching Chrome…");
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    });

    let result = convert(&request, &config).await;

    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise result")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&result);
    }

    if !result.success {
        bail!(
            "Conversion failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

/// Environment settings, overridden by any flag given on the command line.
fn service_config(cli: &Cli) -> ServiceConfig {
    let mut config = ServiceConfig::from_env();
    if let Some(dir) = &cli.output {
        config.output_dir = dir.clone();
    }
    config.verbose |= cli.verbose;
    if let Some(chrome) = &cli.chrome {
        config.chrome_executable = Some(chrome.clone());
    }
    config.no_sandbox |= cli.no_sandbox;
    config
}

/// Map CLI args to a `ConvertRequest`.
async fn build_request(cli: &Cli, markdown: String, input: Option<&Path>) -> Result<ConvertRequest> {
    let custom_css = match &cli.css {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read stylesheet {}", path.display()))?,
        ),
        None => None,
    };

    // Default the artifact name to the input's stem.
    let output_filename = cli.name.clone().or_else(|| {
        input
            .and_then(|p| p.file_stem())
            .and_then(|s| s.to_str())
            .map(|s| output_file_name(Some(s)))
    });

    Ok(ConvertRequest {
        markdown,
        output_filename,
        paper_format: cli.paper.clone(),
        paper_orientation: cli.orientation.clone(),
        margin: cli.margin.clone(),
        watermark: cli.watermark.clone(),
        watermark_scope: cli.watermark_scope.clone(),
        show_page_numbers: cli.page_numbers,
        header_text: cli.header.clone(),
        footer_text: cli.footer.clone(),
        code_theme: cli.code_theme.clone(),
        custom_css,
        skip_preprocessing: cli.no_fix,
    })
}

fn print_preprocessed(report: &Preprocessed, json: bool) -> Result<()> {
    if json {
        let value = serde_json::json!({
            "markdown": report.markdown,
            "fixes": report.fixes,
            "warnings": report.warnings,
        });
        let text = serde_json::to_string_pretty(&value).context("Failed to serialise report")?;
        println!("{text}");
        return Ok(());
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(report.markdown.as_bytes())
        .context("Failed to write to stdout")?;
    if !report.markdown.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }

    for fix in &report.fixes {
        eprintln!("  {} {}", green("✓"), fix);
    }
    for warning in &report.warnings {
        eprintln!("  {} {}", yellow("⚠"), warning);
    }
    Ok(())
}

fn print_summary(result: &ConversionResult) {
    for fix in &result.fixes {
        eprintln!("  {} {}", green("✓"), dim(&fix.description));
    }
    for warning in &result.warnings {
        eprintln!("  {} {}", yellow("⚠"), warning);
    }

    if result.success {
        let path = result
            .artifact_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        eprintln!(
            "{}  {} pages  {}ms  →  {}",
            green("✔"),
            result.page_count.unwrap_or(0),
            result.processing_time_ms.unwrap_or(0),
            bold(&path),
        );
    } else {
        eprintln!(
            "{}  {}",
            red("✘"),
            red(result.error.as_deref().unwrap_or("unknown error"))
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_flag_reaches_service_config() {
        let cli = Cli::try_parse_from(["md2pdf", "-v", "notes.md"]).unwrap();
        assert!(service_config(&cli).verbose);
    }

    #[test]
    fn test_flags_override_environment_settings() {
        let cli = Cli::try_parse_from([
            "md2pdf",
            "--output",
            "/tmp/pdfs",
            "--chrome",
            "/opt/chrome/chrome",
            "--no-sandbox",
            "notes.md",
        ])
        .unwrap();
        let config = service_config(&cli);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/pdfs"));
        assert_eq!(
            config.chrome_executable,
            Some(PathBuf::from("/opt/chrome/chrome"))
        );
        assert!(config.no_sandbox);
    }
}
