//! Finding RDF documents under a directory for bulk loading

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use crate::parser::RdfFormat;

/// Excludes on top of `.gitignore`/`.ignore` files
pub struct SourceFilter {
    inner: Gitignore,
}

impl SourceFilter {
    pub fn new(root: &Path, extra_excludes: &[String]) -> Self {
        let mut builder = GitignoreBuilder::new(root);

        // Store directories and their database files
        let defaults = [".git/", ".tristore/", "target/", "*.db", "*.db-wal", "*.db-shm"];
        for pattern in defaults.iter().copied().chain(extra_excludes.iter().map(String::as_str)) {
            if let Err(e) = builder.add_line(None, pattern) {
                tracing::warn!("Ignoring invalid exclude pattern {:?}: {}", pattern, e);
            }
        }

        let inner = builder.build().unwrap_or_else(|e| {
            tracing::warn!("Failed to build exclude set: {}", e);
            Gitignore::empty()
        });
        Self { inner }
    }

    pub fn is_excluded(&self, path: &Path, is_dir: bool) -> bool {
        self.inner.matched_path_or_any_parents(path, is_dir).is_ignore()
    }
}

/// RDF documents below `root` whose format is recognised by extension, sorted by path
pub fn discover_rdf_files(root: &Path, extra_excludes: &[String]) -> Vec<(PathBuf, RdfFormat)> {
    let filter = SourceFilter::new(root, extra_excludes);
    let mut files = Vec::new();

    for entry in WalkBuilder::new(root).hidden(false).build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        if filter.is_excluded(path, false) {
            tracing::debug!("Excluded {}", path.display());
            continue;
        }
        if let Some(format) = RdfFormat::from_path(path) {
            files.push((path.to_path_buf(), format));
        }
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovers_rdf_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("data/nested")).unwrap();
        std::fs::create_dir_all(root.join(".tristore/store")).unwrap();
        std::fs::write(root.join("data/beet.nt"), "").unwrap();
        std::fs::write(root.join("data/nested/graph.nq"), "").unwrap();
        std::fs::write(root.join("data/notes.txt"), "").unwrap();
        std::fs::write(root.join("data/skip.nt"), "").unwrap();
        std::fs::write(root.join(".tristore/store/dump.nt"), "").unwrap();

        let files = discover_rdf_files(root, &["skip.nt".to_string()]);
        let names: Vec<(String, RdfFormat)> = files
            .iter()
            .map(|(p, f)| (p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"), *f))
            .collect();

        assert_eq!(
            names,
            vec![
                ("data/beet.nt".to_string(), RdfFormat::NTriples),
                ("data/nested/graph.nq".to_string(), RdfFormat::NQuads),
            ]
        );
    }
}
