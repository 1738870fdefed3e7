//! Deterministic categorization rules
//!
//! Cheap string checks that settle most examples without a model call:
//! - prefix rules on the start of the example
//! - substring rules on its first characters
//! - an aggregation-stage pattern that separates syntax from usage

use super::Category;
use crate::extract::language;
use regex::Regex;
use std::sync::LazyLock;

/// Broad language grouping used to pick rules and prompts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageFamily {
    Shell,
    JsonLike,
    /// Driver languages other than JavaScript
    CompiledDriver,
    JavaScript,
    Text,
    Undefined,
}

impl LanguageFamily {
    /// Family of a canonical language name
    pub fn of(lang: &str) -> Self {
        match language::normalize(lang) {
            language::BASH | language::SHELL => Self::Shell,
            language::JSON | language::XML | language::YAML => Self::JsonLike,
            language::JAVASCRIPT => Self::JavaScript,
            language::TEXT => Self::Text,
            language::UNDEFINED => Self::Undefined,
            _ => Self::CompiledDriver,
        }
    }

    /// Whether CLI-style syntax prefixes apply
    fn accepts_cli_syntax(self) -> bool {
        matches!(self, Self::Shell | Self::Text | Self::Undefined)
    }
}

const SYNTAX_PREFIXES: &[&str] = &["atlas ", "mongosh "];

const USAGE_PREFIXES: &[&str] = &[
    "import ",
    "from ",
    "namespace ",
    "package ",
    "using ",
    "mongodb://",
    "mongodb+srv://",
    "curl ",
];

const THIRD_PARTY_COMMAND_PREFIXES: &[&str] = &[
    "mkdir ",
    "cd ",
    "touch ",
    "docker ",
    "docker-compose ",
    "brew ",
    "yum ",
    "apt-",
    "npm ",
    "pip ",
    "go run ",
    "node ",
    "dotnet ",
    "export ",
    "sudo ",
    "cp ",
    "tar ",
    "jq ",
    "vi ",
    "cmake ",
    "syft ",
    "choco ",
];

/// How far into an example the substring rules look
const CONTAINS_WINDOW: usize = 50;

const USAGE_MARKERS: &[&str] = &[".aggregate", "mongodb://", "mongodb+srv://"];
const RETURN_OBJECT_MARKERS: &[&str] = &["warning", "deprecated", "_id"];
const THIRD_PARTY_COMMAND_MARKERS: &[&str] = &["cmake "];

/// `$stage:` followed, possibly across lines, by a `<placeholder>`
static AGGREGATION_STAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\$[a-zA-Z]{2,}: ?(.*?<.+?>)?").expect("aggregation stage pattern is valid")
});

fn has_prefix(code: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| code.starts_with(p))
}

fn match_prefix(code: &str, family: LanguageFamily) -> Option<Category> {
    if family.accepts_cli_syntax() && has_prefix(code, SYNTAX_PREFIXES) {
        return Some(Category::SyntaxExample);
    }
    if has_prefix(code, THIRD_PARTY_COMMAND_PREFIXES) {
        return Some(Category::NonMongoCommand);
    }
    if has_prefix(code, USAGE_PREFIXES) {
        return Some(Category::UsageExample);
    }
    None
}

fn match_contains(code: &str) -> Option<Category> {
    let head: String = code.chars().take(CONTAINS_WINDOW).collect();
    let contains_any = |markers: &[&str]| markers.iter().any(|m| head.contains(m));

    if contains_any(USAGE_MARKERS) {
        return Some(Category::UsageExample);
    }
    if contains_any(RETURN_OBJECT_MARKERS) {
        return Some(Category::ExampleReturnObject);
    }
    if contains_any(THIRD_PARTY_COMMAND_MARKERS) {
        return Some(Category::NonMongoCommand);
    }

    let captures = AGGREGATION_STAGE.captures(code)?;
    match captures.get(1) {
        Some(placeholder) if !placeholder.as_str().is_empty() => Some(Category::SyntaxExample),
        _ => Some(Category::UsageExample),
    }
}

/// Try the deterministic rules; `None` means a model has to decide
pub fn match_rules(code: &str, family: LanguageFamily) -> Option<Category> {
    match_prefix(code, family).or_else(|| match_contains(code))
}
