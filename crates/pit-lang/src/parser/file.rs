//! File-tree front end.
//!
//! Directory names carry the structure: `- <segment>` opens a resource,
//! `'<name>'` opens a case. Inside a case, the extensionless files `given`,
//! `when`, `then` and `while` hold the sections. Nesting is reconstructed
//! from a stable pre-order walk, so siblings are visited sorted by name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use super::{empty_manifest, is_hidden, CaseBuilder, Parser};
use crate::config::ParseOptions;
use crate::contract::{ManifestData, ResourceData};
use crate::error::{Location, ParseError, Section};
use crate::grammar::{case_name, parse_given, parse_then, parse_when, parse_while};
use crate::pattern::{resource_segment, NodeId, PatternTree};
use crate::types::ParseOutput;

/// Parser for a contract laid out as a directory tree.
#[derive(Debug, Clone)]
pub struct FileParser {
    dir: PathBuf,
    options: ParseOptions,
}

impl FileParser {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_options(dir, ParseOptions::default())
    }

    pub fn with_options(dir: impl Into<PathBuf>, options: ParseOptions) -> Self {
        Self {
            dir: dir.into(),
            options,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Parser for FileParser {
    fn parse(&mut self) -> Result<ParseOutput, ParseError> {
        let data = empty_manifest(
            self.options.manifest_name(&self.dir),
            &self.dir,
            &self.options.archetypes_file,
        )?;
        let mut walk = Walk::new(&self.dir, data);

        let entries = WalkDir::new(&self.dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e));

        for entry in entries {
            walk.visit(&entry?)?;
        }

        let data = walk.finish()?;
        info!(
            "Parsed {} resource(s) with {} case(s) from {}",
            data.resources.len(),
            data.cases().count(),
            self.dir.display()
        );
        Ok(ParseOutput::new(data))
    }
}

/// The case currently being filled.
struct OpenCase {
    dir: PathBuf,
    resource: usize,
    builder: CaseBuilder,
}

/// State of one traversal. Created per parse and consumed by `finish`.
struct Walk<'a> {
    root: &'a Path,
    data: ManifestData,
    tree: PatternTree,
    /// Resource directories (relative to the root) to their tree node and
    /// index in `data.resources`.
    nodes: HashMap<PathBuf, (NodeId, usize)>,
    /// Case names seen so far, with the directory that declared them.
    cases: HashMap<String, PathBuf>,
    /// Enclosing resource directories, innermost last.
    resources: Vec<(PathBuf, usize)>,
    case: Option<OpenCase>,
}

impl<'a> Walk<'a> {
    fn new(root: &'a Path, data: ManifestData) -> Self {
        Self {
            root,
            data,
            tree: PatternTree::new(),
            nodes: HashMap::new(),
            cases: HashMap::new(),
            resources: Vec::new(),
            case: None,
        }
    }

    fn visit(&mut self, entry: &DirEntry) -> Result<(), ParseError> {
        let path = entry.path();
        self.leave_scopes(path)?;

        if entry.depth() == 0 {
            return self.enter_root(entry);
        }

        let rel = path.strip_prefix(self.root).unwrap_or(path).to_path_buf();
        let name = entry.file_name().to_string_lossy();

        if entry.file_type().is_dir() {
            if let Some(segment) = resource_segment(&name) {
                self.enter_resource(rel, path, &segment)
            } else if let Some(cname) = case_name(&name) {
                self.enter_case(cname, path)
            } else {
                Err(ParseError::UnexpectedDir {
                    path: path.to_path_buf(),
                })
            }
        } else {
            self.visit_file(path, &name)
        }
    }

    fn enter_root(&mut self, entry: &DirEntry) -> Result<(), ParseError> {
        if !entry.file_type().is_dir() {
            return Err(ParseError::Io {
                path: entry.path().to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "contract root is not a directory",
                ),
            });
        }

        let index = self.data.resources.len();
        self.data.resources.push(ResourceData::new("/"));
        self.nodes.insert(PathBuf::new(), (self.tree.root(), index));
        self.resources.push((entry.path().to_path_buf(), index));
        Ok(())
    }

    fn enter_resource(&mut self, rel: PathBuf, path: &Path, segment: &str) -> Result<(), ParseError> {
        let parent_rel = rel.parent().map(Path::to_path_buf).unwrap_or_default();
        let (parent, _) = *self
            .nodes
            .get(&parent_rel)
            .ok_or_else(|| ParseError::MissingParent {
                path: path.to_path_buf(),
            })?;

        let node = self.tree.append(parent, segment);
        let pattern = self.tree.pattern(node).to_string();
        debug!("Resource {} ({})", pattern, path.display());

        let index = self.data.resources.len();
        self.data.resources.push(ResourceData::new(pattern));
        self.nodes.insert(rel, (node, index));
        self.resources.push((path.to_path_buf(), index));
        Ok(())
    }

    fn enter_case(&mut self, name: &str, path: &Path) -> Result<(), ParseError> {
        let Some(&(_, resource)) = self.resources.last() else {
            return Err(ParseError::CaseOutsideResource {
                case: name.to_string(),
                location: Location::file(path),
            });
        };

        if let Some(first) = self.cases.get(name) {
            return Err(ParseError::DuplicateCaseName {
                name: name.to_string(),
                location: Location::file(path),
                first: Location::file(first),
            });
        }

        // A case nested in a case replaces it.
        self.close_case()?;

        debug!("Case '{}' ({})", name, path.display());
        self.cases.insert(name.to_string(), path.to_path_buf());
        self.case = Some(OpenCase {
            dir: path.to_path_buf(),
            resource,
            builder: CaseBuilder::new(name, Location::file(path)),
        });
        Ok(())
    }

    fn visit_file(&mut self, path: &Path, name: &str) -> Result<(), ParseError> {
        if path.extension().is_some() {
            debug!("Skipping data file {}", path.display());
            return Ok(());
        }

        let Some(section) = Section::from_file_name(name) else {
            return Err(ParseError::UnexpectedFile {
                path: path.to_path_buf(),
            });
        };

        let Some(open) = self.case.as_mut() else {
            return Err(ParseError::CaseFileOutsideCase {
                path: path.to_path_buf(),
            });
        };

        let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let line_error = |error| ParseError::Line {
            location: Location::file(path),
            error,
        };

        let builder = &mut open.builder;
        match section {
            Section::Given => builder.given = parse_given(&text).map_err(line_error)?,
            Section::When => builder.when = Some(parse_when(&text).map_err(line_error)?),
            Section::Then => builder.then = Some(parse_then(&text).map_err(line_error)?),
            Section::While => builder.whiles = parse_while(&text).map_err(line_error)?,
        }
        Ok(())
    }

    /// Close the open case and resources that do not contain `path`.
    fn leave_scopes(&mut self, path: &Path) -> Result<(), ParseError> {
        if self
            .case
            .as_ref()
            .is_some_and(|open| !path.starts_with(&open.dir))
        {
            self.close_case()?;
        }

        while self
            .resources
            .last()
            .is_some_and(|(dir, _)| !path.starts_with(dir))
        {
            self.resources.pop();
        }
        Ok(())
    }

    fn close_case(&mut self) -> Result<(), ParseError> {
        if let Some(open) = self.case.take() {
            let case = open.builder.finish()?;
            self.data.resources[open.resource].cases.push(case);
        }
        Ok(())
    }

    fn finish(mut self) -> Result<ManifestData, ParseError> {
        self.close_case()?;

        // The root resource only appears when it holds cases of its own.
        if self
            .data
            .resources
            .first()
            .is_some_and(|r| r.pattern == "/" && r.cases.is_empty())
        {
            self.data.resources.remove(0);
        }

        Ok(self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_case_files_are_attached_to_their_case() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "- users/'list users'/when", "GET /users");
        write(dir.path(), "- users/'list users'/then", "200 OK\n\n[]");
        write(dir.path(), "- users/'list users'/given", "mongodb: 'some users'");
        write(dir.path(), "- users/'list users'/while", "auth 'authorized'");

        let output = FileParser::new(dir.path()).parse().unwrap();
        let case = &output.data.resources[0].cases[0];
        assert_eq!(case.given["mongodb"].name, "some users");
        assert_eq!(case.whiles[0].id, "auth");
        assert_eq!(case.whiles[0].case, "authorized");
        assert!(output.diagnostics.is_empty());
        assert!(output.pages.is_empty());
    }

    #[test]
    fn test_keyword_file_in_resource_after_case_is_outside_case() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "- users/'list users'/when", "GET /users");
        write(dir.path(), "- users/'list users'/then", "200 OK");
        write(dir.path(), "- users/when", "GET /users");

        let err = FileParser::new(dir.path()).parse().unwrap_err();
        assert!(matches!(err, ParseError::CaseFileOutsideCase { .. }), "{err}");
    }

    #[test]
    fn test_resource_inside_case_has_no_parent() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "- users/'list users'/- nested/x.json", "{}");

        let err = FileParser::new(dir.path()).parse().unwrap_err();
        assert!(matches!(err, ParseError::MissingParent { .. }), "{err}");
    }

    #[test]
    fn test_hidden_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".git/HEAD", "ref: refs/heads/main");
        write(dir.path(), "- users/.DS_Store", "");
        write(dir.path(), "- users/'list users'/when", "GET /users");
        write(dir.path(), "- users/'list users'/then", "200 OK");

        let output = FileParser::new(dir.path()).parse().unwrap();
        assert_eq!(output.data.resources.len(), 1);
    }

    #[test]
    fn test_root_must_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "when", "GET /");

        let err = FileParser::new(dir.path().join("when")).parse().unwrap_err();
        assert!(matches!(err, ParseError::Io { .. }), "{err}");
    }

    #[test]
    fn test_reparse_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "- users/'list users'/when", "GET /users");
        write(dir.path(), "- users/'list users'/then", "200 OK");

        let mut parser = FileParser::new(dir.path());
        let first = parser.parse().unwrap();
        let second = parser.parse().unwrap();
        assert_eq!(first.data, second.data);
    }
}
