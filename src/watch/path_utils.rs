// src/watch/path_utils.rs

use std::path::Path;

/// `path` relative to `root` with forward slashes, as bindings expect.
///
/// Falls back to comparing canonical paths when the event path uses a
/// different absolute prefix for the same directory (symlinked temp dirs on
/// macOS). Returns `None` for paths outside `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let to_string = |rel: &Path| rel.to_string_lossy().replace('\\', "/");

    if let Ok(rel) = path.strip_prefix(root) {
        return Some(to_string(rel));
    }

    let root_canon = root.canonicalize().ok()?;
    let path_canon = path.canonicalize().ok()?;
    path_canon.strip_prefix(&root_canon).ok().map(to_string)
}
