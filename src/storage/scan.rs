//! Expanding upload arguments into a file list

use crate::error::{Result, SecLoadError};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

/// Files to upload: plain files as given, directories walked recursively in
/// name order. Hidden entries inside directories are skipped unless
/// `include_hidden` is set.
pub fn collect_files(paths: &[PathBuf], include_hidden: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if !path.exists() {
            return Err(SecLoadError::NotFound(path.clone()));
        }
        if path.is_file() {
            files.push(path.clone());
            continue;
        }
        files.extend(walk(path, include_hidden)?);
    }
    Ok(files)
}

fn walk(root: &Path, include_hidden: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || include_hidden || !is_hidden(e));

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            match e.into_io_error() {
                Some(source) => SecLoadError::io(path, source),
                None => SecLoadError::config(format!("filesystem loop at {}", path.display())),
            }
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    tracing::debug!(root = %root.display(), files = files.len(), "expanded directory");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_files() {
        let dir = tempfile::tempdir().unwrap();
        let scans = dir.path().join("scans");
        std::fs::create_dir_all(scans.join("nested")).unwrap();
        std::fs::write(scans.join("b.png"), b"b").unwrap();
        std::fs::write(scans.join("a.png"), b"a").unwrap();
        std::fs::write(scans.join(".DS_Store"), b"x").unwrap();
        std::fs::write(scans.join("nested/c.pdf"), b"c").unwrap();
        let single = dir.path().join("report.pdf");
        std::fs::write(&single, b"r").unwrap();

        let files = collect_files(&[single.clone(), scans.clone()], false).unwrap();
        assert_eq!(
            files,
            vec![single, scans.join("a.png"), scans.join("b.png"), scans.join("nested/c.pdf")]
        );

        let with_hidden = collect_files(&[scans.clone()], true).unwrap();
        assert_eq!(with_hidden.len(), 4);
    }

    #[test]
    fn test_missing_path() {
        let err = collect_files(&[PathBuf::from("/no/such/upload")], false).unwrap_err();
        assert!(matches!(err, SecLoadError::NotFound(_)));
    }
}
