//! Resource pattern tree.
//!
//! Both front ends build resource patterns one path segment at a time. A
//! segment is joined onto its parent's pattern with path-join semantics and
//! any parenthesized variable, e.g. `(id)`, is folded into the canonical
//! colon placeholder `:id`.

use once_cell::sync::Lazy;
use regex::Regex;

/// Directory marker for a resource segment: `- <segment>`.
static RESOURCE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^- (.*)$").unwrap());

/// A parenthesized variable inside a raw segment. Names share the
/// character class of [`PLACEHOLDER`].
static VARIABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([A-Za-z0-9_]+)\)").unwrap());

/// A canonical placeholder inside a pattern.
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r":[A-Za-z0-9_]+").unwrap());

/// Identifier of a node inside a [`PatternTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct PatternNode {
    pattern: String,
    children: Vec<NodeId>,
}

/// Append-only tree of resource patterns.
///
/// Nodes are never re-parented or removed; a parse builds the tree in a
/// single pass.
#[derive(Debug, Clone)]
pub struct PatternTree {
    nodes: Vec<PatternNode>,
}

impl Default for PatternTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternTree {
    /// A tree holding only the root node, pattern `/`.
    pub fn new() -> Self {
        Self {
            nodes: vec![PatternNode {
                pattern: "/".to_string(),
                children: Vec::new(),
            }],
        }
    }

    /// The root node, pattern `/`.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Append a child under `parent` whose pattern is the parent's pattern
    /// joined with `segment`. A child with the same pattern is reused.
    pub fn append(&mut self, parent: NodeId, segment: &str) -> NodeId {
        let pattern = join(&self.nodes[parent.0].pattern, segment);
        if let Some(&existing) = self
            .children(parent)
            .iter()
            .find(|&&c| self.pattern(c) == pattern)
        {
            return existing;
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(PatternNode {
            pattern,
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Full pattern of a node.
    pub fn pattern(&self, id: NodeId) -> &str {
        &self.nodes[id.0].pattern
    }

    /// Direct children of a node, in append order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }
}

/// Join `segment` onto `base` and normalize the result.
///
/// The result is always absolute, has no duplicate or trailing slashes
/// (other than the root itself), and has `.`/`..` components resolved.
pub fn join(base: &str, segment: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in base.split('/').chain(segment.split('/')) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Rewrite every `(name)` variable in `raw` to the canonical `:name` form.
///
/// Names are `[A-Za-z0-9_]+`. Any other parenthesized text, `()` included,
/// yields `None`.
pub fn translate_placeholders(raw: &str) -> Option<String> {
    let translated = VARIABLE.replace_all(raw, ":$1");
    if translated.contains(['(', ')']) {
        return None;
    }
    Some(translated.into_owned())
}

/// Recognize a resource directory marker and return its translated segment.
///
/// `- notes` yields `notes`, `- note-(id)` yields `note-:id`. Anything
/// that is not a resource marker, or has an invalid variable, yields `None`.
pub fn resource_segment(basename: &str) -> Option<String> {
    let caps = RESOURCE_MARKER.captures(basename)?;
    let raw = caps.get(1)?.as_str();
    if raw.trim().is_empty() {
        return None;
    }
    translate_placeholders(raw)
}

/// Build an anchored regular expression matching request paths for a
/// canonical pattern. Each placeholder matches one non-empty run of
/// characters within a single path segment.
pub fn pattern_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut last = 0;
    for m in PLACEHOLDER.find_iter(pattern) {
        out.push_str(&regex::escape(&pattern[last..m.start()]));
        out.push_str("[^/]+");
        last = m.end();
    }
    out.push_str(&regex::escape(&pattern[last..]));
    out.push('$');
    out
}
