//! Compiler for the pit contract language.
//!
//! A service contract is written either as a directory tree following a
//! naming grammar, or as Markdown documents. Both front ends compile into the
//! same [`ManifestData`], which [`Manifest`] validates and turns into the
//! views used to build mocks and conformance tests.
//!
//! # Example
//!
//! ```no_run
//! use pit_lang::{file_parser, Manifest, Parser};
//!
//! let output = file_parser("./contract").parse()?;
//! let manifest = Manifest::new(output.data)?;
//!
//! for (provider, states) in manifest.states() {
//!     println!("{provider}: {states:?}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod contract;
pub mod error;
pub mod grammar;
pub mod manifest;
pub mod parser;
pub mod pattern;
mod types;

use std::path::PathBuf;

pub use config::{ParseOptions, SourceFormat};
pub use contract::{Archetype, CaseData, Given, ManifestData, ResourceData, Then, When, While};
pub use error::{LineError, Location, ManifestError, ParseError, Section};
pub use grammar::{Headers, Method};
pub use manifest::{Action, Case, ExampleRequest, ExampleResponse, Manifest, Resource};
pub use parser::{parse_markdown, FileParser, MarkdownParser, Parser};
pub use types::{Diagnostic, ParseOutput, Severity};

/// A file-tree parser rooted at `dir`.
pub fn file_parser(dir: impl Into<PathBuf>) -> FileParser {
    FileParser::new(dir)
}

/// A Markdown parser rooted at `dir`.
pub fn markdown_parser(dir: impl Into<PathBuf>) -> MarkdownParser {
    MarkdownParser::new(dir)
}

/// The front end selected by `options.format`, rooted at `dir`.
pub fn parser_for(dir: impl Into<PathBuf>, options: &ParseOptions) -> Box<dyn Parser> {
    match options.format {
        SourceFormat::Files => Box::new(FileParser::with_options(dir, options.clone())),
        SourceFormat::Markdown => Box::new(MarkdownParser::with_options(dir, options.clone())),
    }
}
