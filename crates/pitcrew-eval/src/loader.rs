//! Fixture discovery and loading

use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::model::EvalSet;

/// Load one evaluation set from a JSON file
pub fn load_file(path: &Path) -> Result<EvalSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read eval file {}", path.display()))?;
    let set: EvalSet = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse eval file {}", path.display()))?;
    debug!(
        "Loaded eval set '{}' with {} case(s) from {}",
        set.eval_set_id,
        set.eval_cases.len(),
        path.display()
    );
    Ok(set)
}

/// Resolve a path into concrete fixture files.
///
/// A file path is returned as-is; a directory is scanned for `*.test.json`
/// files, sorted by name.
pub fn discover(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(anyhow!("Eval path not found: {}", path.display()));
    }

    let pattern = path.join("*.test.json");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| anyhow!("Eval path is not valid UTF-8: {}", path.display()))?;

    let mut files: Vec<PathBuf> = glob::glob(pattern)
        .context("Invalid eval glob pattern")?
        .filter_map(|entry| entry.ok())
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(anyhow!(
            "No *.test.json fixtures found under {}",
            path.display()
        ));
    }
    Ok(files)
}

/// Load every evaluation set under a file or directory
pub fn load_all(path: &Path) -> Result<Vec<EvalSet>> {
    discover(path)?.iter().map(|f| load_file(f)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "eval_set_id": "smoke",
        "name": "Smoke",
        "eval_cases": [{"eval_id": "c1", "conversation": [{"user_content": "hi"}]}]
    }"#;

    #[test]
    fn test_load_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("smoke.test.json");
        std::fs::write(&path, FIXTURE).unwrap();

        let set = load_file(&path).unwrap();
        assert_eq!(set.eval_set_id, "smoke");
    }

    #[test]
    fn test_load_file_rejects_bad_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.test.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_file(&path).is_err());
    }

    #[test]
    fn test_discover_directory_sorted() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.test.json"), FIXTURE).unwrap();
        std::fs::write(dir.path().join("a.test.json"), FIXTURE).unwrap();
        std::fs::write(dir.path().join("ignored.json"), FIXTURE).unwrap();

        let files = discover(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.test.json"));
        assert!(files[1].ends_with("b.test.json"));
    }

    #[test]
    fn test_discover_empty_directory_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(discover(dir.path()).is_err());
    }

    #[test]
    fn test_discover_missing_path_is_an_error() {
        assert!(discover(Path::new("/definitely/not/here")).is_err());
    }
}
