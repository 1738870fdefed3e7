//! Loading page snapshots from disk

use super::ast::PageSnapshot;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Every `*.json` file under `dir`, skipping hidden entries, in path order
pub fn snapshot_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("Snapshot directory {:?} does not exist", dir);
    }

    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || !e.file_name().to_str().unwrap_or("").starts_with('.')
        })
    {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|e| e.to_str()) == Some("json")
        {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// Parse every snapshot under `dir`
pub fn load_snapshots(dir: &Path) -> Result<Vec<PageSnapshot>> {
    let files = snapshot_files(dir)?;
    tracing::debug!("Found {} snapshot files in {:?}", files.len(), dir);

    files
        .iter()
        .map(|path| {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {:?}", path))?;
            PageSnapshot::from_json(&json).with_context(|| format!("Invalid snapshot {:?}", path))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, page_id: &str) {
        let json = serde_json::json!({
            "page_id": page_id,
            "ast": { "type": "root", "children": [] }
        });
        std::fs::write(dir.join(name), json.to_string()).unwrap();
    }

    #[test]
    fn test_load_snapshots_sorted() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("nested")).unwrap();
        write(temp.path(), "b.json", "docs/u/master/b");
        write(temp.path(), "a.json", "docs/u/master/a");
        write(&temp.path().join("nested"), "c.json", "docs/u/master/nested/c");
        std::fs::write(temp.path().join("notes.txt"), "ignored").unwrap();
        std::fs::create_dir(temp.path().join(".cache")).unwrap();
        write(&temp.path().join(".cache"), "d.json", "docs/u/master/d");

        let snapshots = load_snapshots(temp.path()).unwrap();
        let ids: Vec<_> = snapshots.iter().map(|s| s.page_id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["docs/u/master/a", "docs/u/master/b", "docs/u/master/nested/c"]
        );
    }

    #[test]
    fn test_missing_directory() {
        let temp = TempDir::new().unwrap();
        assert!(load_snapshots(&temp.path().join("nope")).is_err());
    }

    #[test]
    fn test_invalid_snapshot_names_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("bad.json"), "{not json").unwrap();
        let err = load_snapshots(temp.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("bad.json"));
    }
}
