//! Page AST snapshots and example extraction
//!
//! Pages arrive as JSON AST documents produced by the docs build. Only a
//! handful of node shapes matter here:
//! - `code` nodes, which are the code examples themselves
//! - `literalinclude` and `io-code-block` directives, which are counted
//!   per language
//! - the `meta` directive, which carries page keywords

use super::{language, page_id_from_source, page_url, IncomingExample, IncomingPage};
use crate::error::AuditError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A node of the page AST
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AstNode {
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub argument: Vec<AstNode>,
    #[serde(default)]
    pub options: Option<Map<String, Value>>,
    #[serde(default)]
    pub children: Vec<AstNode>,
}

impl AstNode {
    fn is_named(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }

    fn option_str(&self, key: &str) -> Option<&str> {
        self.options.as_ref()?.get(key)?.as_str()
    }

    /// First argument's text, which directives use for file paths
    fn first_argument(&self) -> Option<&str> {
        self.argument.first()?.value.as_deref()
    }

    /// Canonical language of this node's own `lang`
    fn language(&self) -> &'static str {
        language::normalize(self.lang.as_deref().unwrap_or(""))
    }
}

/// One page of a project snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub page_id: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub ast: AstNode,
}

/// The docs build streams pages as `{"type": "page", "data": {...}}`;
/// bare page documents are accepted too.
#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotDocument {
    Wrapped { data: PageSnapshot },
    Bare(PageSnapshot),
}

impl PageSnapshot {
    /// Parse a snapshot from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let document: SnapshotDocument =
            serde_json::from_str(json).context("Failed to parse page snapshot")?;

        Ok(match document {
            SnapshotDocument::Wrapped { data } => data,
            SnapshotDocument::Bare(page) => page,
        })
    }
}

/// Depth-first search for nodes matching a predicate, including nodes
/// nested inside other matches
fn find_nodes<'a>(nodes: &'a [AstNode], pred: &dyn Fn(&AstNode) -> bool) -> Vec<&'a AstNode> {
    let mut found = Vec::new();
    for node in nodes {
        if pred(node) {
            found.push(node);
        }
        found.extend(find_nodes(&node.children, pred));
    }
    found
}

/// Language of a literalinclude: its own option, then the included file's
/// extension, then a nested code node
fn literal_include_language(node: &AstNode) -> &'static str {
    let mut lang = language::normalize(
        node.option_str("language")
            .or(node.lang.as_deref())
            .unwrap_or(""),
    );

    if lang == language::UNDEFINED {
        lang = language::from_path(node.first_argument().unwrap_or(""));
    }

    if lang == language::UNDEFINED {
        if let Some(child) = node
            .children
            .iter()
            .find(|c| c.node_type == "code" && c.lang.is_some())
        {
            lang = child.language();
        }
    }

    lang
}

/// Language of an io-code-block, taken from its input only
fn io_code_block_language(node: &AstNode) -> &'static str {
    let inputs = find_nodes(std::slice::from_ref(node), &|n| n.is_named("input"));
    let Some(input) = inputs.first() else {
        return language::UNDEFINED;
    };

    let mut lang = language::normalize(input.option_str("language").unwrap_or(""));

    if lang == language::UNDEFINED {
        if let Some(code) = find_nodes(&input.children, &|n| n.node_type == "code").first() {
            lang = code.language();
        }
    }

    if lang == language::UNDEFINED {
        lang = language::from_path(input.first_argument().unwrap_or(""));
    }

    lang
}

/// Keywords from the first `meta` directive
fn meta_keywords(nodes: &[AstNode]) -> Vec<String> {
    find_nodes(nodes, &|n| n.is_named("meta"))
        .first()
        .and_then(|meta| meta.option_str("keywords"))
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Extract the incoming page model from a snapshot
pub fn extract_page(snapshot: &PageSnapshot, site_url: &str) -> Result<IncomingPage, AuditError> {
    let id = page_id_from_source(&snapshot.page_id)?;
    let url = page_url(site_url, &id);
    let nodes = &snapshot.ast.children;

    let examples = find_nodes(nodes, &|n| n.node_type == "code")
        .into_iter()
        .map(|node| IncomingExample {
            code: node.value.clone().unwrap_or_default(),
            lang: node.lang.clone().unwrap_or_default(),
            category: node
                .category
                .clone()
                .or_else(|| node.option_str("category").map(String::from)),
        })
        .collect();

    let literal_includes = find_nodes(nodes, &|n| n.is_named("literalinclude"))
        .into_iter()
        .map(|node| literal_include_language(node).to_string())
        .collect();

    let io_code_blocks = find_nodes(nodes, &|n| n.is_named("io-code-block"))
        .into_iter()
        .map(|node| io_code_block_language(node).to_string())
        .collect();

    Ok(IncomingPage {
        id,
        url,
        examples,
        literal_includes,
        io_code_blocks,
        keywords: meta_keywords(nodes),
        deleted: snapshot.deleted,
    })
}
