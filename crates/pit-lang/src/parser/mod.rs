//! Front ends that compile contract sources into [`ManifestData`].
//!
//! - `file`: directory tree following the naming grammar
//! - `markdown`: Markdown documents, extracted block by block
//!
//! Both return a [`ParseOutput`]; any fatal error aborts the parse and no
//! partial manifest is returned.

mod file;
mod markdown;

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

use walkdir::DirEntry;

use crate::contract::{Archetype, CaseData, Given, ManifestData, Then, When, While};
use crate::error::{Location, ParseError, Section};
use crate::types::ParseOutput;

pub use file::FileParser;
pub use markdown::{parse_markdown, MarkdownParser};

/// A contract front end.
pub trait Parser {
    /// Run one complete parse. Every call starts from fresh state.
    fn parse(&mut self) -> Result<ParseOutput, ParseError>;
}

/// A case whose sections are still being collected.
#[derive(Debug)]
pub(crate) struct CaseBuilder {
    pub name: String,
    pub location: Location,
    pub given: BTreeMap<String, Given>,
    pub whiles: Vec<While>,
    pub when: Option<When>,
    pub then: Option<Then>,
}

impl CaseBuilder {
    pub fn new(name: impl Into<String>, location: Location) -> Self {
        Self {
            name: name.into(),
            location,
            given: BTreeMap::new(),
            whiles: Vec::new(),
            when: None,
            then: None,
        }
    }

    /// Complete the case. A case without both a request and a response never
    /// reaches the manifest.
    pub fn finish(self) -> Result<CaseData, ParseError> {
        let (when, then) = match (self.when, self.then) {
            (Some(when), Some(then)) => (when, then),
            (when, _) => {
                return Err(ParseError::IncompleteCase {
                    case: self.name,
                    missing: if when.is_none() {
                        Section::When
                    } else {
                        Section::Then
                    },
                    location: self.location,
                })
            }
        };

        Ok(CaseData {
            name: self.name,
            given: self.given,
            whiles: self.whiles,
            when,
            then,
        })
    }
}

/// Load the optional archetypes sidecar from `root`. A missing file yields
/// no archetypes.
pub(crate) fn load_archetypes(root: &Path, file_name: &str) -> Result<Vec<Archetype>, ParseError> {
    let path = root.join(file_name);

    let contents = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(ParseError::Io { path, source }),
    };

    let archetypes: Vec<Archetype> =
        serde_json::from_str(&contents).map_err(|source| ParseError::Archetypes {
            path: path.clone(),
            source,
        })?;

    tracing::debug!("Loaded {} archetype(s) from {}", archetypes.len(), path.display());
    Ok(archetypes)
}

/// Hidden entries (dot files, VCS directories) below the root are skipped.
pub(crate) fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

/// Fresh manifest data for a parse of `root`.
pub(crate) fn empty_manifest(
    name: String,
    root: &Path,
    archetypes_file: &str,
) -> Result<ManifestData, ParseError> {
    Ok(ManifestData {
        name,
        resources: Vec::new(),
        archetypes: load_archetypes(root, archetypes_file)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{parse_then, parse_when};

    #[test]
    fn test_case_builder_requires_when_and_then() {
        let mut builder = CaseBuilder::new("list users", Location::file("/tmp/'list users'"));
        builder.when = Some(parse_when("GET /users").unwrap());

        let err = builder.finish().unwrap_err();
        assert!(matches!(
            err,
            ParseError::IncompleteCase { missing: Section::Then, .. }
        ));

        let mut builder = CaseBuilder::new("list users", Location::file("/tmp/'list users'"));
        builder.when = Some(parse_when("GET /users").unwrap());
        builder.then = Some(parse_then("200 OK").unwrap());
        let case = builder.finish().unwrap();
        assert_eq!(case.name, "list users");
        assert_eq!(case.then.status_code, 200);
    }

    #[test]
    fn test_load_archetypes_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_archetypes(dir.path(), "archetypes.json").unwrap().is_empty());
    }

    #[test]
    fn test_load_archetypes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("archetypes.json"),
            r#"[{"name": "id", "pattern": "\\d+"}, {"name": "email"}]"#,
        )
        .unwrap();
        let archetypes = load_archetypes(dir.path(), "archetypes.json").unwrap();
        assert_eq!(archetypes.len(), 2);
        assert_eq!(archetypes[1].0["name"], "email");
    }

    #[test]
    fn test_load_archetypes_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("archetypes.json"), "{not json").unwrap();
        assert!(matches!(
            load_archetypes(dir.path(), "archetypes.json").unwrap_err(),
            ParseError::Archetypes { .. }
        ));
    }
}
