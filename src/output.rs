//! Result types returned to callers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A human-readable description of one automatic text correction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixRecord {
    pub description: String,
}

impl FixRecord {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

impl fmt::Display for FixRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// A detected but unresolved ambiguity in the final text. Advisory only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WarningRecord {
    pub description: String,
}

impl WarningRecord {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

impl fmt::Display for WarningRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// Terminal, caller-visible outcome of one conversion.
///
/// Always produced, never thrown: check `success` and `error`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub success: bool,

    /// Where the PDF was (or would have been) written.
    pub artifact_path: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,

    /// Byte size of the rendered Markdown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_size: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_count: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_diagrams: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Automatic corrections applied before rendering, in pass order.
    #[serde(default)]
    pub fixes: Vec<FixRecord>,

    /// Ambiguities left in the text.
    #[serde(default)]
    pub warnings: Vec<WarningRecord>,
}

impl ConversionResult {
    /// A failed result carrying `error` and the elapsed time.
    pub fn failure(error: impl fmt::Display, processing_time_ms: u64) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            processing_time_ms: Some(processing_time_ms),
            ..Self::default()
        }
    }
}
