/// Recursive snapshot scanner.
///
/// Walks a directory with `jwalk`'s rayon-backed parallel traversal and
/// assembles the flat entry stream into a nested [`PathElement`] tree whose
/// children are already in mirror order. The result is the desired state
/// handed to [`crate::Mirror::sync`].
///
/// Entries that cannot be read or stat'ed are skipped with a warning, so a
/// snapshot of a partially unreadable tree prunes the unreadable parts from
/// the mirror.
use crate::error::WatchError;
use crate::model::PathElement;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Instant, UNIX_EPOCH};
use tracing::{debug, warn};

/// A walked entry waiting to be attached to its parent.
struct WalkedEntry {
    path: PathBuf,
    depth: usize,
    element: PathElement,
}

/// Describe the file or directory tree at `root`.
///
/// Fails only if `root` itself cannot be stat'ed.
pub fn scan_tree(root: &Path, follow_links: bool) -> Result<PathElement, WatchError> {
    let start = Instant::now();
    let meta = std::fs::symlink_metadata(root).map_err(|e| WatchError::from_io(root, e))?;
    if !meta.is_dir() {
        let modified = meta.modified().unwrap_or(UNIX_EPOCH);
        return Ok(PathElement::file(root, modified));
    }

    let mut error_count: u64 = 0;
    let mut walked: Vec<WalkedEntry> = Vec::new();

    let walker = jwalk::WalkDir::new(root)
        .skip_hidden(false)
        .follow_links(follow_links)
        .parallelism(jwalk::Parallelism::RayonNewPool(num_cpus::get()));

    for entry_result in walker {
        let entry = match entry_result {
            Ok(e) => e,
            Err(err) => {
                error_count += 1;
                warn!("Scan: skipping unreadable entry: {err}");
                continue;
            }
        };

        // The root itself is assembled last.
        if entry.depth == 0 {
            continue;
        }

        let path = entry.path();
        let element = if entry.file_type().is_dir() {
            PathElement::directory(path.clone(), Vec::new())
        } else {
            // Stat files outside the walker: this is the expensive syscall.
            match std::fs::symlink_metadata(&path).and_then(|m| m.modified()) {
                Ok(modified) => PathElement::file(path.clone(), modified),
                Err(err) => {
                    error_count += 1;
                    warn!("Scan: cannot stat {}: {err}", path.display());
                    continue;
                }
            }
        };
        walked.push(WalkedEntry {
            path,
            depth: entry.depth,
            element,
        });
    }

    // Deepest first: every directory's children are complete before the
    // directory itself is attached to its parent.
    walked.sort_by(|a, b| b.depth.cmp(&a.depth));
    let mut pending: HashMap<PathBuf, Vec<PathElement>> = HashMap::new();
    for WalkedEntry { path, mut element, .. } in walked {
        if element.is_directory {
            element.children = pending.remove(&path).unwrap_or_default();
        }
        if let Some(parent) = path.parent() {
            pending.entry(parent.to_path_buf()).or_default().push(element);
        }
    }

    let mut snapshot = PathElement::directory(root, pending.remove(root).unwrap_or_default());
    snapshot.sort_mirror_order();

    debug!(
        "Scanned {} in {:?}: {} entries, {} errors",
        root.display(),
        start.elapsed(),
        snapshot.count(),
        error_count
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scan_builds_nested_sorted_snapshot() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("b/inner")).unwrap();
        fs::create_dir(root.join("A")).unwrap();
        fs::write(root.join("z.txt"), b"z").unwrap();
        fs::write(root.join("b/inner/deep.txt"), b"d").unwrap();
        fs::write(root.join("C.txt"), b"c").unwrap();

        let snapshot = scan_tree(root, false).unwrap();

        let names: Vec<String> = snapshot.children.iter().map(PathElement::name).collect();
        assert_eq!(names, ["A", "b", "C.txt", "z.txt"]);
        let b = &snapshot.children[1];
        assert_eq!(b.children.len(), 1);
        assert_eq!(b.children[0].children[0].path, root.join("b/inner/deep.txt"));
        assert!(!b.children[0].children[0].is_directory);
        assert_eq!(snapshot.count(), 7);
    }

    #[test]
    fn test_scan_of_file_is_single_element() {
        let tmp = tempfile::TempDir::new().unwrap();
        let file = tmp.path().join("only.txt");
        fs::write(&file, b"x").unwrap();

        let snapshot = scan_tree(&file, false).unwrap();
        assert!(!snapshot.is_directory);
        assert!(snapshot.children.is_empty());
    }

    #[test]
    fn test_scan_of_missing_path_fails() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = scan_tree(&tmp.path().join("nope"), false).unwrap_err();
        assert!(matches!(err, WatchError::NotFound(_)));
    }
}
