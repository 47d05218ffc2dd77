//! Error types for parsing and manifest construction.

use std::fmt;
use std::num::ParseIntError;
use std::path::{Path, PathBuf};

use crate::grammar::Method;

/// Where in the input a problem was found: a file, and for Markdown
/// documents the line within it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: PathBuf,
    pub line: Option<usize>,
}

impl Location {
    /// A whole file or directory.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            file: path.into(),
            line: None,
        }
    }

    /// A 1-based line inside a document.
    pub fn line(path: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            file: path.into(),
            line: Some(line),
        }
    }

    /// The file or directory this location points into.
    pub fn path(&self) -> &Path {
        &self.file
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{line}", self.file.display()),
            None => write!(f, "{}", self.file.display()),
        }
    }
}

/// The four case sections of the contract language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Given,
    When,
    Then,
    While,
}

impl Section {
    /// File name, and heading text without the colon.
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Given => "given",
            Section::When => "when",
            Section::Then => "then",
            Section::While => "while",
        }
    }

    /// Section named by an extensionless case file.
    pub fn from_file_name(name: &str) -> Option<Self> {
        match name {
            "given" => Some(Section::Given),
            "when" => Some(Section::When),
            "then" => Some(Section::Then),
            "while" => Some(Section::While),
            _ => None,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Violations of the line grammars shared by both front ends.
#[derive(Debug, thiserror::Error)]
pub enum LineError {
    #[error("unexpected header line: '{line}', expected format 'Header-Key: Value'")]
    HeaderLine { line: String },

    #[error("unexpected request line: '{line}', expected format '<HTTP method> <path>'")]
    RequestLine { line: String },

    #[error(
        "unexpected HTTP method: '{method}', expected one of: {}",
        Method::allowed()
    )]
    Method { method: String },

    #[error("unexpected path: '{path}', expected absolute path (starting with '/')")]
    Path { path: String },

    #[error(
        "unexpected response line: '{line}', expected format '<HTTP status code> <status text>'"
    )]
    ResponseLine { line: String },

    #[error("unexpected status code: '{code}', expected a number ({source})")]
    Code {
        code: String,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid state line: '{line}', expected format \"<state provider name>: '<state name>'\"")]
    StateLine { line: String },

    #[error("unexpected dependency line: '{line}', expected format \"<dependency id> '<case name>'\"")]
    LinkLine { line: String },

    #[error("invalid case name: \"{name}\", expected single-quoted name, e.g. 'name of the case'")]
    LinkLineCaseName { name: String },
}

/// Fatal errors that abort a parse. No partial manifest is returned.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error(
        "unexpected directory: '{}', expected a resource directory (starting with '- ') or a case directory formatted as 'case name'",
        .path.display()
    )]
    UnexpectedDir { path: PathBuf },

    #[error(
        "unexpected file without an extension: '{}', only 'given', 'when', 'then' or 'while' is allowed",
        .path.display()
    )]
    UnexpectedFile { path: PathBuf },

    #[error("case '{case}' ({location}) is outside a resource")]
    CaseOutsideResource { case: String, location: Location },

    #[error("case file '{}' was found outside a case folder", .path.display())]
    CaseFileOutsideCase { path: PathBuf },

    #[error("no parent resource found for '{}'", .path.display())]
    MissingParent { path: PathBuf },

    #[error("case with name '{name}' ({location}) already exists in '{first}'")]
    DuplicateCaseName {
        name: String,
        location: Location,
        first: Location,
    },

    #[error("'{section}' section ({location}) is outside a case")]
    SectionOutsideCase { section: Section, location: Location },

    #[error("case '{case}' has multiple '{section}' sections ({location})")]
    DuplicateSection {
        case: String,
        section: Section,
        location: Location,
    },

    #[error("case '{case}' ({location}) has no '{missing}' section")]
    IncompleteCase {
        case: String,
        missing: Section,
        location: Location,
    },

    #[error("{location}: {error}")]
    Line {
        location: Location,
        #[source]
        error: LineError,
    },

    #[error("failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("invalid archetypes file '{}': {source}", .path.display())]
    Archetypes {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ParseError {
    /// Short stable code for reporting, in the style of lint codes.
    pub fn code(&self) -> &'static str {
        match self {
            ParseError::UnexpectedDir { .. } => "E001",
            ParseError::UnexpectedFile { .. } => "E002",
            ParseError::CaseOutsideResource { .. } => "E003",
            ParseError::CaseFileOutsideCase { .. } => "E004",
            ParseError::MissingParent { .. } => "E005",
            ParseError::DuplicateCaseName { .. } => "E006",
            ParseError::SectionOutsideCase { .. } => "E007",
            ParseError::DuplicateSection { .. } => "E008",
            ParseError::IncompleteCase { .. } => "E009",
            ParseError::Line { .. } => "E010",
            ParseError::Io { .. } => "E011",
            ParseError::Walk(_) => "E012",
            ParseError::Archetypes { .. } => "E013",
        }
    }
}

/// Errors raised while building or projecting the manifest domain model.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("case with name '{name}' in '{pattern}' already exists in '{first}'")]
    DuplicateCaseName {
        name: String,
        pattern: String,
        first: String,
    },

    #[error("resource pattern '{pattern}' is not an absolute path")]
    RelativePattern { pattern: String },

    #[error("{method} action on '{pattern}' has no 'success-like' example")]
    NoSuccessExample { method: Method, pattern: String },
}
