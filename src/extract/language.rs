//! Canonical language names and file extensions for code examples
//!
//! Page sources spell languages inconsistently (`js`, `golang`, `console`,
//! an empty string...). Everything stored is normalized to one of
//! [`CANONICAL_LANGUAGES`], with anything unrecognized mapped to
//! [`UNDEFINED`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

pub const BASH: &str = "bash";
pub const C: &str = "c";
pub const CPP: &str = "cpp";
pub const CSHARP: &str = "csharp";
pub const GO: &str = "go";
pub const JAVA: &str = "java";
pub const JAVASCRIPT: &str = "javascript";
pub const JSON: &str = "json";
pub const KOTLIN: &str = "kotlin";
pub const PHP: &str = "php";
pub const PYTHON: &str = "python";
pub const RUBY: &str = "ruby";
pub const RUST: &str = "rust";
pub const SCALA: &str = "scala";
pub const SHELL: &str = "shell";
pub const SWIFT: &str = "swift";
pub const TEXT: &str = "text";
pub const TYPESCRIPT: &str = "typescript";
pub const UNDEFINED: &str = "undefined";
pub const XML: &str = "xml";
pub const YAML: &str = "yaml";

/// Every language a stored example can carry
pub const CANONICAL_LANGUAGES: [&str; 21] = [
    BASH, C, CPP, CSHARP, GO, JAVA, JAVASCRIPT, JSON, KOTLIN, PHP, PYTHON, RUBY, RUST, SCALA,
    SHELL, SWIFT, TEXT, TYPESCRIPT, UNDEFINED, XML, YAML,
];

/// Alias spellings seen in page sources
static ALIASES: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("", UNDEFINED),
        ("none", UNDEFINED),
        ("console", SHELL),
        ("sh", SHELL),
        ("cs", CSHARP),
        ("golang", GO),
        ("http", TEXT),
        ("ini", TEXT),
        ("js", JAVASCRIPT),
    ])
});

static EXTENSIONS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        (BASH, ".sh"),
        (C, ".c"),
        (CPP, ".cpp"),
        (CSHARP, ".cs"),
        (GO, ".go"),
        (JAVA, ".java"),
        (JAVASCRIPT, ".js"),
        (JSON, ".json"),
        (KOTLIN, ".kt"),
        (PHP, ".php"),
        (PYTHON, ".py"),
        (RUBY, ".rb"),
        (RUST, ".rs"),
        (SCALA, ".scala"),
        (SHELL, ".sh"),
        (SWIFT, ".swift"),
        (TEXT, ".txt"),
        (TYPESCRIPT, ".ts"),
        (UNDEFINED, ".txt"),
        (XML, ".xml"),
        (YAML, ".yaml"),
    ])
});

/// Normalize a raw language string to its canonical name
pub fn normalize(raw: &str) -> &'static str {
    let raw = raw.trim().to_ascii_lowercase();

    // Some sources leak directive options into the language, e.g. "json\n :copyable: false"
    let head = raw.split_whitespace().next().unwrap_or("");

    if let Some(canonical) = CANONICAL_LANGUAGES.iter().find(|lang| **lang == head) {
        return canonical;
    }

    ALIASES.get(head).copied().unwrap_or(UNDEFINED)
}

/// File extension used when an example of this language is written to disk
pub fn file_extension(language: &str) -> &'static str {
    EXTENSIONS
        .get(normalize(language))
        .copied()
        .unwrap_or(".txt")
}

/// Guess a language from a file path's extension
///
/// `.sh` maps to shell rather than bash, and `.txt` to text.
pub fn from_path(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    match ext {
        "c" => C,
        "cpp" => CPP,
        "cs" => CSHARP,
        "go" => GO,
        "java" => JAVA,
        "js" => JAVASCRIPT,
        "json" => JSON,
        "kt" => KOTLIN,
        "php" => PHP,
        "py" => PYTHON,
        "rb" => RUBY,
        "rs" => RUST,
        "scala" => SCALA,
        "sh" => SHELL,
        "swift" => SWIFT,
        "txt" => TEXT,
        "ts" => TYPESCRIPT,
        "xml" => XML,
        "yaml" => YAML,
        _ => UNDEFINED,
    }
}
