//! Request-level conversion entry points.
//!
//! ## Why a request layer?
//!
//! [`Renderer`] only knows how to turn Markdown into a PDF at a given path.
//! Callers (the CLI, an HTTP front end, a job queue) speak in requests:
//! loosely typed option strings, a desired file name, a flag to skip repair.
//! This module validates those, repairs the text, reserves a collision-free
//! output path, and folds everything into one [`ConversionResult`].
//!
//! Nothing here returns `Err`: a failed conversion is a result with
//! `success = false`.

use crate::config::{
    CodeTheme, Orientation, PaperFormat, RenderOptions, ServiceConfig, WatermarkScope,
    DEFAULT_OUTPUT_FILENAME,
};
use crate::error::Md2PdfError;
use crate::output::ConversionResult;
use crate::pipeline::browser::{ChromeEngine, RenderEngine};
use crate::pipeline::preprocess::{preprocess, Preprocessed};
use crate::pipeline::render::{validate_content, Renderer};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, info};

/// One conversion request, as received from a caller.
///
/// Enumerated options arrive as strings and are parsed case-insensitively by
/// [`ConvertRequest::render_options`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConvertRequest {
    pub markdown: String,
    pub output_filename: Option<String>,
    pub paper_format: Option<String>,
    pub paper_orientation: Option<String>,
    pub margin: Option<String>,
    pub watermark: Option<String>,
    pub watermark_scope: Option<String>,
    pub show_page_numbers: bool,
    pub header_text: Option<String>,
    pub footer_text: Option<String>,
    pub code_theme: Option<String>,
    pub custom_css: Option<String>,
    pub skip_preprocessing: bool,
}

impl ConvertRequest {
    pub fn new(markdown: impl Into<String>) -> Self {
        Self {
            markdown: markdown.into(),
            ..Self::default()
        }
    }

    /// Parse and validate the render options carried by this request.
    pub fn render_options(&self) -> Result<RenderOptions, Md2PdfError> {
        let mut builder = RenderOptions::builder().show_page_numbers(self.show_page_numbers);

        if let Some(v) = &self.paper_format {
            builder = builder.paper_format(parse_option::<PaperFormat>(v)?);
        }
        if let Some(v) = &self.paper_orientation {
            builder = builder.orientation(parse_option::<Orientation>(v)?);
        }
        if let Some(v) = self.margin.as_deref().filter(|m| !m.trim().is_empty()) {
            builder = builder.margin(v.trim());
        }
        if let Some(v) = &self.watermark {
            builder = builder.watermark(v);
        }
        if let Some(v) = &self.watermark_scope {
            builder = builder.watermark_scope(parse_option::<WatermarkScope>(v)?);
        }
        if let Some(v) = &self.header_text {
            builder = builder.header_text(v.as_str());
        }
        if let Some(v) = &self.footer_text {
            builder = builder.footer_text(v.as_str());
        }
        if let Some(v) = &self.code_theme {
            builder = builder.code_theme(parse_option::<CodeTheme>(v)?);
        }
        if let Some(v) = &self.custom_css {
            builder = builder.custom_css(v.as_str());
        }

        builder.build()
    }
}

fn parse_option<T: FromStr<Err = String>>(value: &str) -> Result<T, Md2PdfError> {
    value.parse().map_err(Md2PdfError::InvalidOption)
}

/// Convert a request with headless Chrome configured from `config`.
///
/// # Example
/// ```rust,no_run
/// use edgequake_md2pdf::{convert, ConvertRequest, ServiceConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let config = ServiceConfig::from_env();
///     let mut request = ConvertRequest::new("# Report\n\n**  Draft  ** numbers.");
///     request.paper_format = Some("A4".into());
///     request.show_page_numbers = true;
///
///     let result = convert(&request, &config).await;
///     for fix in &result.fixes {
///         eprintln!("fixed: {fix}");
///     }
///     println!("{}", serde_json::to_string_pretty(&result).unwrap());
/// }
/// ```
pub async fn convert(request: &ConvertRequest, config: &ServiceConfig) -> ConversionResult {
    let renderer = Renderer::new(ChromeEngine::from_config(config));
    convert_with(&renderer, request, config).await
}

/// Convert a request with an explicit renderer (custom engine or deadlines).
pub async fn convert_with<E: RenderEngine>(
    renderer: &Renderer<E>,
    request: &ConvertRequest,
    config: &ServiceConfig,
) -> ConversionResult {
    let start = Instant::now();
    info!("Starting conversion ({} bytes)", request.markdown.len());

    let prepared = match prepare(request, config).await {
        Ok(p) => p,
        Err(e) => {
            info!("Request rejected: {e}");
            let elapsed = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
            return ConversionResult::failure(e, elapsed);
        }
    };

    let mut result = renderer
        .render_to_reserved(
            &prepared.text.markdown,
            &prepared.output_path,
            &prepared.options,
        )
        .await;
    result.fixes = prepared.text.fixes;
    result.warnings = prepared.text.warnings;
    result
}

struct Prepared {
    text: Preprocessed,
    options: RenderOptions,
    output_path: PathBuf,
}

async fn prepare(request: &ConvertRequest, config: &ServiceConfig) -> Result<Prepared, Md2PdfError> {
    validate_content(&request.markdown)?;
    let options = request.render_options()?;

    let text = if request.skip_preprocessing {
        Preprocessed::passthrough(&request.markdown)
    } else {
        preprocess(&request.markdown)
    };
    debug!(
        "{} fixes, {} warnings",
        text.fixes.len(),
        text.warnings.len()
    );

    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|e| Md2PdfError::OutputWriteFailed {
            path: config.output_dir.clone(),
            source: e,
        })?;
    let file_name = output_file_name(request.output_filename.as_deref());
    let output_path = reserve_output_path(&config.output_dir, &file_name).await?;
    debug!("Reserved {}", output_path.display());

    Ok(Prepared {
        text,
        options,
        output_path,
    })
}

/// Sanitise a requested file name: directory parts are dropped, blank names
/// fall back to `output.pdf`, and `.pdf` is appended when missing.
pub fn output_file_name(requested: Option<&str>) -> String {
    let name = requested
        .map(str::trim)
        .and_then(|n| Path::new(n).file_name())
        .and_then(|n| n.to_str())
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(DEFAULT_OUTPUT_FILENAME);

    if name.to_ascii_lowercase().ends_with(".pdf") {
        name.to_string()
    } else {
        format!("{name}.pdf")
    }
}

/// Claim the first free path in `dir` for `file_name`, trying `name.pdf`,
/// `name-1.pdf`, `name-2.pdf`, …
///
/// The claim is an empty file created with `create_new`, so two concurrent
/// callers asking for the same name always get different paths. The caller
/// owns the placeholder and must replace or remove it.
pub async fn reserve_output_path(dir: &Path, file_name: &str) -> Result<PathBuf, Md2PdfError> {
    for candidate in output_candidates(dir, file_name) {
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(Md2PdfError::OutputWriteFailed {
                    path: candidate,
                    source: e,
                })
            }
        }
    }
    Err(Md2PdfError::Internal(format!(
        "no free output name for '{file_name}'"
    )))
}

/// `dir/name.ext`, then `dir/name-1.ext`, `dir/name-2.ext`, …
fn output_candidates<'a>(dir: &'a Path, file_name: &'a str) -> impl Iterator<Item = PathBuf> + 'a {
    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    let ext = path.extension().and_then(|e| e.to_str());

    std::iter::once(dir.join(file_name)).chain((1..u32::MAX).map(move |n| match ext {
        Some(ext) => dir.join(format!("{stem}-{n}.{ext}")),
        None => dir.join(format!("{stem}-{n}")),
    }))
}
