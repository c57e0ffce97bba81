//! Discovery of corpora and model artifacts on disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::Result;

pub const DATASET_EXTENSIONS: &[&str] = &["txt"];
pub const MODEL_EXTENSIONS: &[&str] = &["json", "bin"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// Regular files in `dir` whose extension is in `extensions`, sorted by name.
/// A missing directory is treated as empty.
pub fn list_files(dir: &Path, extensions: &[&str]) -> Result<Vec<CatalogEntry>> {
    if !dir.is_dir() {
        tracing::debug!(dir = %dir.display(), "catalog directory missing");
        return Ok(Vec::new());
    }
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let meta = entry.metadata()?;
        if !meta.is_file() { continue; }
        let matches = path.extension().and_then(|e| e.to_str())
            .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false);
        if !matches { continue; }
        entries.push(CatalogEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path,
            size: meta.len(),
            modified: meta.modified().ok(),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    tracing::debug!(dir = %dir.display(), count = entries.len(), "listed catalog");
    Ok(entries)
}

pub fn list_models(dir: &Path) -> Result<Vec<CatalogEntry>> {
    list_files(dir, MODEL_EXTENSIONS)
}

pub fn list_datasets(dir: &Path) -> Result<Vec<CatalogEntry>> {
    list_files(dir, DATASET_EXTENSIONS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_models(&dir.path().join("Models")).unwrap().is_empty());
    }

    #[test]
    fn test_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.json"), b"{}").unwrap();
        fs::write(dir.path().join("a.BIN"), b"12345").unwrap();
        fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        fs::create_dir(dir.path().join("sub.json")).unwrap();

        let models = list_models(dir.path()).unwrap();
        let names: Vec<&str> = models.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.BIN", "b.json"]);
        assert_eq!(models[0].size, 5);

        let datasets = list_datasets(dir.path()).unwrap();
        assert_eq!(datasets.len(), 1);
        assert_eq!(datasets[0].name, "notes.txt");
    }
}
