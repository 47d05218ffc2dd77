//! Markdown front end.
//!
//! Contracts written as prose. Each `*.md` document below the root is parsed
//! with comrak and its blocks are visited in document order:
//!
//! ```markdown
//! # /users/(id)
//!
//! ## 'get user'
//!
//! > mongodb has: 'a user'
//!
//! ### when:
//! ```
//!
//! H1 headings holding an absolute path open resources, H2 headings holding a
//! quoted name open cases, and `when:`/`then:` H3 headings arm the next code
//! block. Block quotes hold the given/while prose.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use comrak::nodes::{AstNode, NodeValue};
use comrak::{format_html, parse_document, Arena, Options};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{empty_manifest, is_hidden, CaseBuilder, Parser};
use crate::config::ParseOptions;
use crate::contract::{ManifestData, ResourceData};
use crate::error::{Location, ParseError, Section};
use crate::grammar::{case_name, parse_given_prose, parse_then, parse_when};
use crate::pattern::{translate_placeholders, PatternTree};
use crate::types::{Diagnostic, ParseOutput};

/// Parser for a directory of Markdown contract documents.
#[derive(Debug, Clone)]
pub struct MarkdownParser {
    dir: PathBuf,
    options: ParseOptions,
}

impl MarkdownParser {
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

impl Parser for MarkdownParser {
    fn parse(&mut self) -> Result<ParseOutput, ParseError> {
        if !self.dir.is_dir() {
            return Err(ParseError::Io {
                path: self.dir.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "contract root is not a directory",
                ),
            });
        }

        let data = empty_manifest(
            self.options.manifest_name(&self.dir),
            &self.dir,
            &self.options.archetypes_file,
        )?;
        let options = comrak_options();
        let mut extractor = CaseExtractor::new(data);
        let mut pages = BTreeMap::new();

        let entries = WalkDir::new(&self.dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e));

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension() != Some(OsStr::new("md")) {
                continue;
            }

            let source = read(path)?;
            let html = extractor.document(path, &source, &options)?;
            let rel = path.strip_prefix(&self.dir).unwrap_or(path);
            pages.insert(rel.to_path_buf(), html);
        }

        let output = extractor.finish(pages);
        info!(
            "Parsed {} resource(s) with {} case(s) from {} document(s) in {} ({} warning(s))",
            output.data.resources.len(),
            output.data.cases().count(),
            output.pages.len(),
            self.dir.display(),
            output.warnings()
        );
        Ok(output)
    }
}

/// Parse a single Markdown document held in memory. `file` names the
/// document in locations and keys its rendered page; its stem names the
/// manifest.
pub fn parse_markdown(file: impl AsRef<Path>, source: &str) -> Result<ParseOutput, ParseError> {
    let file = file.as_ref();
    let name = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut extractor = CaseExtractor::new(ManifestData {
        name,
        ..Default::default()
    });
    let html = extractor.document(file, source, &comrak_options())?;

    let mut pages = BTreeMap::new();
    pages.insert(file.to_path_buf(), html);
    Ok(extractor.finish(pages))
}

fn comrak_options() -> Options<'static> {
    let mut options = Options::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.autolink = true;
    options
}

fn read(path: &Path) -> Result<String, ParseError> {
    std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Text content of a node: text and inline code, with line breaks kept.
fn plain_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut text = String::new();
    for child in node.descendants() {
        match &child.data.borrow().value {
            NodeValue::Text(t) => text.push_str(t),
            NodeValue::Code(code) => text.push_str(&code.literal),
            NodeValue::SoftBreak | NodeValue::LineBreak => text.push('\n'),
            _ => {}
        }
    }
    text
}

// ============================================================================
// Block visitor
// ============================================================================

struct OpenCase {
    builder: CaseBuilder,
    resource: usize,
    /// Section the next code block fills.
    armed: Option<Section>,
}

/// Stateful visitor turning document blocks into contract data.
///
/// Resources and case names are shared across all documents of a parse;
/// the cursors (open resource, open case, retained paragraph) reset at each
/// document boundary.
struct CaseExtractor {
    data: ManifestData,
    tree: PatternTree,
    /// Resource pattern to its index in `data.resources`.
    patterns: HashMap<String, usize>,
    seen: HashMap<String, Location>,
    diagnostics: Vec<Diagnostic>,

    file: PathBuf,
    resource: Option<usize>,
    case: Option<OpenCase>,
    paragraph: Option<(String, usize)>,
    /// Paragraphs of the block quote being visited.
    quote: Option<Vec<(String, usize)>>,
}

impl CaseExtractor {
    fn new(data: ManifestData) -> Self {
        Self {
            data,
            tree: PatternTree::new(),
            patterns: HashMap::new(),
            seen: HashMap::new(),
            diagnostics: Vec::new(),
            file: PathBuf::new(),
            resource: None,
            case: None,
            paragraph: None,
            quote: None,
        }
    }

    /// Extract one document and return its rendered HTML.
    fn document(&mut self, file: &Path, source: &str, options: &Options) -> Result<String, ParseError> {
        debug!("Document {}", file.display());
        self.file = file.to_path_buf();
        self.resource = None;
        self.case = None;
        self.paragraph = None;
        self.quote = None;

        let arena = Arena::new();
        let root = parse_document(&arena, source, options);
        self.visit(root)?;
        self.close_case()?;

        let mut html = Vec::new();
        format_html(root, options, &mut html).map_err(|source| ParseError::Io {
            path: file.to_path_buf(),
            source,
        })?;
        Ok(String::from_utf8_lossy(&html).into_owned())
    }

    fn finish(self, pages: BTreeMap<PathBuf, String>) -> ParseOutput {
        ParseOutput {
            data: self.data,
            diagnostics: self.diagnostics,
            pages,
        }
    }

    fn visit<'a>(&mut self, node: &'a AstNode<'a>) -> Result<(), ParseError> {
        let ast = node.data.borrow();
        let line = ast.sourcepos.start.line;

        match &ast.value {
            NodeValue::Heading(heading) => self.heading(heading.level, plain_text(node).trim(), line),
            NodeValue::Paragraph => {
                let paragraph = (plain_text(node), line);
                match self.quote.as_mut() {
                    Some(quote) => quote.push(paragraph),
                    None => self.paragraph = Some(paragraph),
                }
                Ok(())
            }
            NodeValue::CodeBlock(block) => self.code_block(&block.literal, line),
            NodeValue::BlockQuote => {
                // Nested quotes feed the outermost one.
                let outermost = self.quote.is_none();
                if outermost {
                    self.quote = Some(Vec::new());
                }
                for child in node.children() {
                    self.visit(child)?;
                }
                if outermost {
                    let mut paragraphs = self.quote.take().unwrap_or_default();
                    if paragraphs.is_empty() {
                        paragraphs.extend(self.paragraph.take());
                    }
                    self.block_quote(paragraphs);
                }
                Ok(())
            }
            _ => {
                for child in node.children() {
                    self.visit(child)?;
                }
                Ok(())
            }
        }
    }

    fn location(&self, line: usize) -> Location {
        Location::line(&self.file, line)
    }

    fn heading(&mut self, level: u8, text: &str, line: usize) -> Result<(), ParseError> {
        match level {
            1 => {
                self.close_case()?;
                self.resource = None;
                if text.starts_with('/') {
                    self.open_resource(text, line);
                }
                Ok(())
            }
            2 => {
                self.close_case()?;
                match case_name(text) {
                    Some(name) => self.open_case(name, line),
                    None => Ok(()),
                }
            }
            3 => {
                let section = match text {
                    "when:" => Section::When,
                    "then:" => Section::Then,
                    _ => return Ok(()),
                };
                self.arm(section, line)
            }
            _ => Ok(()),
        }
    }

    fn open_resource(&mut self, text: &str, line: usize) {
        let Some(translated) = translate_placeholders(text) else {
            warn!(
                "{}:{}: ignoring resource heading '{}' with an invalid placeholder",
                self.file.display(),
                line,
                text
            );
            self.diagnostics.push(
                Diagnostic::warning(
                    "W003",
                    format!("Resource heading '{text}' has an invalid placeholder and opens no resource"),
                    self.file.clone(),
                )
                .with_line(line)
                .with_suggestion("Placeholder names are letters, digits and '_', as in '(user_id)'"),
            );
            return;
        };

        let root = self.tree.root();
        let node = self.tree.append(root, &translated);
        let pattern = self.tree.pattern(node).to_string();

        let index = match self.patterns.get(&pattern) {
            Some(&index) => index,
            None => {
                let index = self.data.resources.len();
                self.data.resources.push(ResourceData::new(pattern.clone()));
                self.patterns.insert(pattern.clone(), index);
                index
            }
        };

        debug!("Resource {} ({})", pattern, self.file.display());
        self.resource = Some(index);
    }

    fn open_case(&mut self, name: &str, line: usize) -> Result<(), ParseError> {
        let location = self.location(line);

        let Some(resource) = self.resource else {
            return Err(ParseError::CaseOutsideResource {
                case: name.to_string(),
                location,
            });
        };

        if let Some(first) = self.seen.get(name) {
            return Err(ParseError::DuplicateCaseName {
                name: name.to_string(),
                location,
                first: first.clone(),
            });
        }

        debug!("Case '{}' ({})", name, location);
        self.seen.insert(name.to_string(), location.clone());
        self.paragraph = None;
        self.case = Some(OpenCase {
            builder: CaseBuilder::new(name, location),
            resource,
            armed: None,
        });
        Ok(())
    }

    fn arm(&mut self, section: Section, line: usize) -> Result<(), ParseError> {
        let location = self.location(line);

        let Some(open) = self.case.as_mut() else {
            return Err(ParseError::SectionOutsideCase { section, location });
        };

        let captured = match section {
            Section::When => open.builder.when.is_some(),
            _ => open.builder.then.is_some(),
        };
        if captured || open.armed == Some(section) {
            return Err(ParseError::DuplicateSection {
                case: open.builder.name.clone(),
                section,
                location,
            });
        }

        open.armed = Some(section);
        Ok(())
    }

    fn code_block(&mut self, literal: &str, line: usize) -> Result<(), ParseError> {
        let location = self.location(line);

        let Some(open) = self.case.as_mut() else {
            return Ok(());
        };
        let Some(section) = open.armed.take() else {
            debug!("Skipping unarmed code block at {}", location);
            return Ok(());
        };

        let line_error = |error| ParseError::Line { location, error };
        match section {
            Section::When => open.builder.when = Some(parse_when(literal).map_err(line_error)?),
            _ => open.builder.then = Some(parse_then(literal).map_err(line_error)?),
        }
        Ok(())
    }

    /// Interpret quoted paragraphs as given/while prose, once per case.
    fn block_quote(&mut self, paragraphs: Vec<(String, usize)>) {
        let Some(open) = self.case.as_mut() else {
            return;
        };
        if !open.builder.given.is_empty() || !open.builder.whiles.is_empty() {
            return;
        }

        let case = open.builder.name.clone();
        let mut rejected = Vec::new();
        let mut redeclared = Vec::new();

        for (text, line) in paragraphs {
            let prose = parse_given_prose(&text);
            for (provider, given) in prose.given {
                if open.builder.given.insert(provider.clone(), given).is_some() {
                    redeclared.push((line, provider));
                }
            }
            open.builder.whiles.extend(prose.whiles);
            rejected.extend(prose.rejected.into_iter().map(|(offset, text)| (line + offset, text)));
            redeclared.extend(prose.redeclared.into_iter().map(|(offset, p)| (line + offset, p)));
        }
        redeclared.sort_by_key(|(line, _)| *line);

        for (line, rejected) in rejected {
            warn!(
                "{}:{}: ignoring line '{}' in case '{}'",
                self.file.display(),
                line,
                rejected,
                case
            );
            self.diagnostics.push(
                Diagnostic::warning(
                    "W001",
                    format!("Unrecognized line '{rejected}' in case '{case}'"),
                    self.file.clone(),
                )
                .with_line(line)
                .with_suggestion(
                    "Write \"<provider> has: '<state>'\" or \"<dependency> responds: '<case name>'\"",
                ),
            );
        }

        for (line, provider) in redeclared {
            warn!(
                "{}:{}: '{}' declared twice in case '{}'",
                self.file.display(),
                line,
                provider,
                case
            );
            self.diagnostics.push(
                Diagnostic::warning(
                    "W002",
                    format!("State provider '{provider}' is declared more than once in case '{case}', the last state is used"),
                    self.file.clone(),
                )
                .with_line(line),
            );
        }
    }

    fn close_case(&mut self) -> Result<(), ParseError> {
        if let Some(open) = self.case.take() {
            let case = open.builder.finish()?;
            self.data.resources[open.resource].cases.push(case);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Method;

    const USER_MD: &str = r#"# Users

Some introduction that is not a resource.

# /users/(id)

## 'get user'

Preconditions:

> mongodb has: 'a user'
> github.com/dockpit/ex-auth responds: 'authorized'

### when:

```
GET /users/21
Accept: application/json
```

### then:

```
200 OK
Content-Type: application/json

{"id": "21"}
```
"#;

    #[test]
    fn test_extracts_case() {
        let output = parse_markdown("users.md", USER_MD).unwrap();
        assert_eq!(output.data.name, "users");
        assert_eq!(output.data.resources.len(), 1);

        let resource = &output.data.resources[0];
        assert_eq!(resource.pattern, "/users/:id");

        let case = &resource.cases[0];
        assert_eq!(case.name, "get user");
        assert_eq!(case.given["mongodb"].name, "a user");
        assert_eq!(case.whiles[0].id, "github.com/dockpit/ex-auth");
        assert_eq!(case.whiles[0].case, "authorized");
        assert_eq!(case.when.method, Method::Get);
        assert_eq!(case.when.path, "/users/21");
        assert_eq!(case.then.status_code, 200);
        assert_eq!(case.then.body, r#"{"id": "21"}"#);
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_renders_page() {
        let output = parse_markdown("users.md", USER_MD).unwrap();
        let html = &output.pages[Path::new("users.md")];
        assert!(html.contains("<h1>/users/(id)</h1>"));
        assert!(html.contains("<blockquote>"));
    }

    #[test]
    fn test_rejected_prose_lines_are_warnings() {
        let md = "# /users\n\n## 'list users'\n\n> mongodb has: 'users'\n> alohas: 'x'\n\n### when:\n\n```\nGET /users\n```\n\n### then:\n\n```\n200 OK\n```\n";
        let output = parse_markdown("users.md", md).unwrap();

        let case = &output.data.resources[0].cases[0];
        assert_eq!(case.given.len(), 1);

        assert_eq!(output.diagnostics.len(), 1);
        let diagnostic = &output.diagnostics[0];
        assert_eq!(diagnostic.code, "W001");
        assert_eq!(diagnostic.line, Some(6));
        assert!(diagnostic.message.contains("alohas: 'x'"));
    }

    #[test]
    fn test_every_quoted_paragraph_is_read() {
        let md = "# /users\n\n## 'list users'\n\n> mongodb has: 'users'\n>\n> github.com/dockpit/ex-auth responds: 'authorized'\n\n### when:\n\n```\nGET /users\n```\n\n### then:\n\n```\n200 OK\n```\n";
        let output = parse_markdown("users.md", md).unwrap();

        let case = &output.data.resources[0].cases[0];
        assert_eq!(case.given["mongodb"].name, "users");
        assert_eq!(case.whiles.len(), 1);
        assert_eq!(case.whiles[0].case, "authorized");
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_provider_repeated_across_paragraphs() {
        let md = "# /users\n\n## 'a'\n\n> mongodb has: 'one'\n>\n> mongodb has: 'two'\n\n### when:\n\n```\nGET /users\n```\n\n### then:\n\n```\n200 OK\n```\n";
        let output = parse_markdown("users.md", md).unwrap();

        let case = &output.data.resources[0].cases[0];
        assert_eq!(case.given["mongodb"].name, "two");
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].code, "W002");
        assert_eq!(output.diagnostics[0].line, Some(7));
    }

    #[test]
    fn test_invalid_placeholder_heading() {
        let md = "# /users/(user-id)\n\n## 'get user'\n";
        let err = parse_markdown("users.md", md).unwrap_err();
        assert!(matches!(err, ParseError::CaseOutsideResource { .. }));

        let md = "# /users/()\n\n# /users\n\n## 'a'\n\n### when:\n\n```\nGET /users\n```\n\n### then:\n\n```\n200 OK\n```\n";
        let output = parse_markdown("users.md", md).unwrap();
        assert_eq!(output.data.resources.len(), 1);
        assert_eq!(output.data.resources[0].pattern, "/users");

        assert_eq!(output.diagnostics.len(), 1);
        let diagnostic = &output.diagnostics[0];
        assert_eq!(diagnostic.code, "W003");
        assert_eq!(diagnostic.line, Some(1));
    }

    #[test]
    fn test_case_outside_resource() {
        let err = parse_markdown("x.md", "# Intro\n\n## 'lonely'\n").unwrap_err();
        match err {
            ParseError::CaseOutsideResource { case, location } => {
                assert_eq!(case, "lonely");
                assert_eq!(location.line, Some(3));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_section_outside_case() {
        let err = parse_markdown("x.md", "# /users\n\n### when:\n").unwrap_err();
        assert!(matches!(
            err,
            ParseError::SectionOutsideCase { section: Section::When, .. }
        ));
    }

    #[test]
    fn test_duplicate_section() {
        let md = "# /users\n\n## 'a'\n\n### when:\n\n```\nGET /users\n```\n\n### when:\n";
        let err = parse_markdown("x.md", md).unwrap_err();
        assert!(matches!(
            err,
            ParseError::DuplicateSection { section: Section::When, .. }
        ));
    }

    #[test]
    fn test_incomplete_case() {
        let md = "# /users\n\n## 'a'\n\n### when:\n\n```\nGET /users\n```\n";
        let err = parse_markdown("x.md", md).unwrap_err();
        assert!(matches!(
            err,
            ParseError::IncompleteCase { missing: Section::Then, .. }
        ));
    }

    #[test]
    fn test_grammar_error_carries_line() {
        let md = "# /users\n\n## 'a'\n\n### then:\n\n```\nabc OK\n```\n";
        let err = parse_markdown("x.md", md).unwrap_err();
        match err {
            ParseError::Line { location, .. } => assert_eq!(location.line, Some(7)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unarmed_code_block_is_ignored() {
        let md = "# /users\n\n## 'a'\n\n```\nnot a request\n```\n\n### when:\n\n```\nGET /users\n```\n\n### then:\n\n```\n204 No Content\n```\n";
        let output = parse_markdown("x.md", md).unwrap();
        assert_eq!(output.data.resources[0].cases[0].then.status_code, 204);
    }
}
