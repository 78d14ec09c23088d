//! Configuration types for Markdown-to-PDF conversion.
//!
//! Two structs carry every knob:
//!
//! * [`RenderOptions`]: per-conversion settings (paper, margins, watermark,
//!   header/footer, theme, custom CSS). Built via [`RenderOptionsBuilder`],
//!   validated once in [`RenderOptionsBuilder::build`], then treated as
//!   immutable for the lifetime of one render.
//! * [`ServiceConfig`]: process-wide settings (output directory, verbosity,
//!   browser binary) resolved once at startup and passed down explicitly.

use crate::error::Md2PdfError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Maximum number of characters kept from a watermark.
pub const WATERMARK_MAX_CHARS: usize = 15;

/// Default uniform page margin.
pub const DEFAULT_MARGIN: &str = "2cm";

/// Default artifact file name when the request does not supply one.
pub const DEFAULT_OUTPUT_FILENAME: &str = "output.pdf";

/// Settings for a single render.
///
/// # Example
/// ```rust
/// use edgequake_md2pdf::{Orientation, PaperFormat, RenderOptions};
///
/// let options = RenderOptions::builder()
///     .paper_format(PaperFormat::A4)
///     .orientation(Orientation::Landscape)
///     .margin("15mm")
///     .show_page_numbers(true)
///     .build()
///     .unwrap();
/// assert_eq!(options.paper_format, PaperFormat::A4);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Paper size. Default: Letter.
    pub paper_format: PaperFormat,

    /// Page orientation. Default: portrait.
    pub orientation: Orientation,

    /// Uniform margin applied to all four sides, as a CSS length. Default: `2cm`.
    pub margin: String,

    /// Watermark text, already truncated to 15 characters and upper-cased.
    pub watermark: Option<String>,

    /// Whether the watermark repeats on every page or only the first.
    pub watermark_scope: WatermarkScope,

    /// Print a "Page N of M" counter in the footer.
    pub show_page_numbers: bool,

    /// Free text centred in the page header.
    pub header_text: Option<String>,

    /// Free text on the left of the page footer.
    pub footer_text: Option<String>,

    /// Colour scheme for code blocks.
    pub code_theme: CodeTheme,

    /// Raw user stylesheet, injected after all built-in styles. Not sanitised.
    pub custom_css: Option<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            paper_format: PaperFormat::default(),
            orientation: Orientation::default(),
            margin: DEFAULT_MARGIN.to_string(),
            watermark: None,
            watermark_scope: WatermarkScope::default(),
            show_page_numbers: false,
            header_text: None,
            footer_text: None,
            code_theme: CodeTheme::default(),
            custom_css: None,
        }
    }
}

impl RenderOptions {
    /// Create a new builder for `RenderOptions`.
    pub fn builder() -> RenderOptionsBuilder {
        RenderOptionsBuilder {
            options: Self::default(),
        }
    }

    /// The margin converted to inches, the unit the print API expects.
    pub fn margin_inches(&self) -> Result<f64, Md2PdfError> {
        css_length_to_inches(&self.margin)
    }

    /// Header/footer regions are only printed when something goes in them.
    pub fn wants_header_footer(&self) -> bool {
        self.show_page_numbers || self.header_text.is_some() || self.footer_text.is_some()
    }
}

/// Builder for [`RenderOptions`].
#[derive(Debug)]
pub struct RenderOptionsBuilder {
    options: RenderOptions,
}

impl RenderOptionsBuilder {
    pub fn paper_format(mut self, format: PaperFormat) -> Self {
        self.options.paper_format = format;
        self
    }

    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.options.orientation = orientation;
        self
    }

    pub fn margin(mut self, margin: impl Into<String>) -> Self {
        self.options.margin = margin.into();
        self
    }

    /// Set the watermark. Whitespace is trimmed, the text is cut to
    /// [`WATERMARK_MAX_CHARS`] characters and upper-cased; empty text clears it.
    pub fn watermark(mut self, text: impl AsRef<str>) -> Self {
        let text: String = text
            .as_ref()
            .trim()
            .chars()
            .take(WATERMARK_MAX_CHARS)
            .collect::<String>()
            .to_uppercase();
        self.options.watermark = if text.is_empty() { None } else { Some(text) };
        self
    }

    pub fn watermark_scope(mut self, scope: WatermarkScope) -> Self {
        self.options.watermark_scope = scope;
        self
    }

    pub fn show_page_numbers(mut self, v: bool) -> Self {
        self.options.show_page_numbers = v;
        self
    }

    pub fn header_text(mut self, text: impl Into<String>) -> Self {
        self.options.header_text = non_blank(text.into());
        self
    }

    pub fn footer_text(mut self, text: impl Into<String>) -> Self {
        self.options.footer_text = non_blank(text.into());
        self
    }

    pub fn code_theme(mut self, theme: CodeTheme) -> Self {
        self.options.code_theme = theme;
        self
    }

    pub fn custom_css(mut self, css: impl Into<String>) -> Self {
        self.options.custom_css = non_blank(css.into());
        self
    }

    /// Build the options, validating the margin.
    pub fn build(self) -> Result<RenderOptions, Md2PdfError> {
        let inches = self.options.margin_inches()?;
        if inches < 0.0 {
            return Err(Md2PdfError::InvalidOption(format!(
                "margin must not be negative, got '{}'",
                self.options.margin
            )));
        }
        Ok(self.options)
    }
}

fn non_blank(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Supported paper sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaperFormat {
    #[default]
    Letter,
    Legal,
    Tabloid,
    Ledger,
    A0,
    A1,
    A2,
    A3,
    A4,
    A5,
    A6,
}

impl PaperFormat {
    pub const ALL: [PaperFormat; 11] = [
        PaperFormat::Letter,
        PaperFormat::Legal,
        PaperFormat::Tabloid,
        PaperFormat::Ledger,
        PaperFormat::A0,
        PaperFormat::A1,
        PaperFormat::A2,
        PaperFormat::A3,
        PaperFormat::A4,
        PaperFormat::A5,
        PaperFormat::A6,
    ];

    /// Portrait `(width, height)` in inches.
    pub fn dimensions_inches(self) -> (f64, f64) {
        match self {
            PaperFormat::Letter => (8.5, 11.0),
            PaperFormat::Legal => (8.5, 14.0),
            PaperFormat::Tabloid => (11.0, 17.0),
            PaperFormat::Ledger => (17.0, 11.0),
            PaperFormat::A0 => (33.1, 46.8),
            PaperFormat::A1 => (23.4, 33.1),
            PaperFormat::A2 => (16.54, 23.4),
            PaperFormat::A3 => (11.7, 16.54),
            PaperFormat::A4 => (8.27, 11.7),
            PaperFormat::A5 => (5.83, 8.27),
            PaperFormat::A6 => (4.13, 5.83),
        }
    }
}

impl fmt::Display for PaperFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for PaperFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        PaperFormat::ALL
            .into_iter()
            .find(|f| f.to_string().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let names: Vec<String> = PaperFormat::ALL.iter().map(|f| f.to_string()).collect();
                format!(
                    "unsupported paper format '{wanted}' (expected one of: {})",
                    names.join(", ")
                )
            })
    }
}

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "portrait" => Ok(Orientation::Portrait),
            "landscape" => Ok(Orientation::Landscape),
            other => Err(format!(
                "unsupported orientation '{other}' (expected portrait or landscape)"
            )),
        }
    }
}

/// Pages that receive the watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkScope {
    #[default]
    AllPages,
    FirstPage,
}

impl FromStr for WatermarkScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all-pages" => Ok(WatermarkScope::AllPages),
            "first-page" => Ok(WatermarkScope::FirstPage),
            other => Err(format!(
                "unsupported watermark scope '{other}' (expected all-pages or first-page)"
            )),
        }
    }
}

/// Colour scheme for code blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeTheme {
    #[default]
    Light,
    Dark,
}

impl FromStr for CodeTheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(CodeTheme::Light),
            "dark" => Ok(CodeTheme::Dark),
            other => Err(format!(
                "unsupported code theme '{other}' (expected light or dark)"
            )),
        }
    }
}

// ── CSS lengths ──────────────────────────────────────────────────────────

/// Convert a CSS absolute length (`2cm`, `15mm`, `1in`, `72pt`, `6pc`,
/// `96px`, or a bare number meaning px) to inches.
pub fn css_length_to_inches(value: &str) -> Result<f64, Md2PdfError> {
    let v = value.trim().to_ascii_lowercase();
    let split = v
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(v.len());
    let (number, unit) = v.split_at(split);

    let amount: f64 = number.trim().parse().map_err(|_| {
        Md2PdfError::InvalidOption(format!("'{value}' is not a valid CSS length"))
    })?;
    if !amount.is_finite() {
        return Err(Md2PdfError::InvalidOption(format!(
            "'{value}' is not a valid CSS length"
        )));
    }

    let per_inch = match unit {
        "" | "px" => 96.0,
        "in" => 1.0,
        "cm" => 2.54,
        "mm" => 25.4,
        "pt" => 72.0,
        "pc" => 6.0,
        other => {
            return Err(Md2PdfError::InvalidOption(format!(
                "unsupported CSS length unit '{other}' in '{value}'"
            )))
        }
    };

    Ok(amount / per_inch)
}

// ── Process configuration ────────────────────────────────────────────────

/// Process-wide configuration, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Directory artifacts are written to.
    pub output_dir: PathBuf,

    /// Emit DEBUG-level logs.
    pub verbose: bool,

    /// Explicit Chrome/Chromium binary. `None` lets the engine auto-detect.
    pub chrome_executable: Option<PathBuf>,

    /// Launch the browser with `--no-sandbox` (needed in most containers).
    pub no_sandbox: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            output_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            verbose: false,
            chrome_executable: None,
            no_sandbox: false,
        }
    }
}

impl ServiceConfig {
    /// Resolve the configuration from the environment:
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `MD2PDF_OUTPUT_DIR` | `output_dir` |
    /// | `MD2PDF_VERBOSE` | `verbose` |
    /// | `CHROME_PATH` | `chrome_executable` |
    /// | `MD2PDF_NO_SANDBOX` | `no_sandbox` |
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = env_non_empty("MD2PDF_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        config.verbose = env_flag("MD2PDF_VERBOSE");
        config.chrome_executable = env_non_empty("CHROME_PATH").map(PathBuf::from);
        config.no_sandbox = env_flag("MD2PDF_NO_SANDBOX");
        config
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_flag(key: &str) -> bool {
    env_non_empty(key)
        .map(|v| parse_flag(&v))
        .unwrap_or(false)
}

fn parse_flag(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
