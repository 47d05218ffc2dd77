//! Diagnostics and parse results.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::contract::ManifestData;
use crate::error::ParseError;

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// A fatal problem; the parse produced no manifest.
    Error,
    /// Input that was skipped but did not stop the parse.
    Warning,
}

impl Severity {
    /// Get the label for this severity level.
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

/// A problem found in the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Code, e.g. "W001" or "E006".
    pub code: String,
    pub message: String,
    #[serde(serialize_with = "serialize_path")]
    pub file: PathBuf,
    /// Line within the file, for Markdown documents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

fn serialize_path<S>(path: &Path, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&path.to_string_lossy())
}

impl Diagnostic {
    pub fn error(code: impl Into<String>, message: impl Into<String>, file: PathBuf) -> Self {
        Self {
            severity: Severity::Error,
            code: code.into(),
            message: message.into(),
            file,
            line: None,
            suggestion: None,
        }
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>, file: PathBuf) -> Self {
        Self {
            severity: Severity::Warning,
            code: code.into(),
            message: message.into(),
            file,
            line: None,
            suggestion: None,
        }
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Report a fatal parse error against the input root it came from.
    pub fn from_parse_error(err: &ParseError, root: &Path) -> Self {
        let (file, line) = match err {
            ParseError::UnexpectedDir { path }
            | ParseError::UnexpectedFile { path }
            | ParseError::CaseFileOutsideCase { path }
            | ParseError::MissingParent { path }
            | ParseError::Io { path, .. }
            | ParseError::Archetypes { path, .. } => (path.clone(), None),
            ParseError::CaseOutsideResource { location, .. }
            | ParseError::DuplicateCaseName { location, .. }
            | ParseError::SectionOutsideCase { location, .. }
            | ParseError::DuplicateSection { location, .. }
            | ParseError::IncompleteCase { location, .. }
            | ParseError::Line { location, .. } => (location.file.clone(), location.line),
            ParseError::Walk(e) => (
                e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf()),
                None,
            ),
        };

        let diagnostic = Self::error(err.code(), err.to_string(), file);
        match line {
            Some(line) => diagnostic.with_line(line),
            None => diagnostic,
        }
    }
}

/// Result of a successful parse.
#[derive(Debug, Default)]
pub struct ParseOutput {
    pub data: ManifestData,
    /// Non-fatal problems found along the way.
    pub diagnostics: Vec<Diagnostic>,
    /// Rendered HTML per Markdown document, keyed by path relative to the
    /// parsed root. Empty for the file-tree front end.
    pub pages: BTreeMap<PathBuf, String>,
}

impl ParseOutput {
    pub fn new(data: ManifestData) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }

    pub fn warnings(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    pub fn has_warnings(&self) -> bool {
        self.warnings() > 0
    }
}
