// src/pipeline/sources.rs

//! Source enumeration: glob patterns → concrete files.
//!
//! Patterns are relative to the project root and use `/` separators. Like
//! gulp, each include pattern has a static *base* (the directory part before
//! the first wildcard); a matched file's output path is its path below that
//! base, so `src/html/**/*.html` maps `src/html/pages/a.html` to
//! `pages/a.html`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};

use crate::fs::FileSystem;

/// Compile a single glob where `*` does not cross directory boundaries.
pub fn compile_glob(pattern: &str) -> Result<Glob> {
    GlobBuilder::new(normalize_pattern(pattern))
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid glob pattern: {pattern}"))
}

/// Build a GlobSet from simple string patterns.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(compile_glob(pat)?);
    }
    Ok(builder.build()?)
}

/// Strip a leading `./` so patterns line up with root-relative paths.
pub fn normalize_pattern(pattern: &str) -> &str {
    pattern.strip_prefix("./").unwrap_or(pattern)
}

/// Static directory prefix of a glob (`src/html/**/*.html` → `src/html`).
pub fn glob_base(pattern: &str) -> String {
    let pattern = normalize_pattern(pattern);
    let is_magic = |part: &str| part.contains(['*', '?', '[', '{']);

    let parts: Vec<&str> = pattern.split('/').collect();
    let mut base: Vec<&str> = Vec::new();
    for (idx, part) in parts.iter().enumerate() {
        // The last component is a file name (or pattern), never part of the base.
        if is_magic(part) || idx == parts.len() - 1 {
            break;
        }
        base.push(part);
    }
    base.join("/")
}

/// A source file selected by a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path relative to the static base of the matching pattern.
    pub relative: PathBuf,
}

#[derive(Debug, Clone)]
struct IncludePattern {
    base: String,
    matcher: GlobMatcher,
}

/// Compiled include/exclude globs of one task.
#[derive(Debug, Clone)]
pub struct SourceSet {
    includes: Vec<IncludePattern>,
    exclude: Option<GlobSet>,
}

impl SourceSet {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let includes = include
            .iter()
            .map(|p| {
                Ok(IncludePattern {
                    base: glob_base(p),
                    matcher: compile_glob(p)?.compile_matcher(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let exclude = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude)?)
        };

        Ok(Self { includes, exclude })
    }

    /// Whether a root-relative path (forward slashes) is selected.
    pub fn matches(&self, rel_path: &str) -> bool {
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        self.includes.iter().any(|inc| inc.matcher.is_match(rel_path))
    }

    /// Collect all files under `root` selected by this set, sorted by path.
    ///
    /// A file matched by several patterns is kept once, relative to the
    /// first matching pattern's base.
    pub fn collect(&self, fs: &dyn FileSystem, root: &Path) -> Result<Vec<SourceFile>> {
        let mut found: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();

        for inc in &self.includes {
            let base_dir = if inc.base.is_empty() {
                root.to_path_buf()
            } else {
                root.join(&inc.base)
            };
            if !fs.is_dir(&base_dir) {
                continue;
            }

            for path in walk_files(fs, &base_dir)? {
                if found.contains_key(&path) {
                    continue;
                }
                let Some(rel_str) = relative_to(root, &path) else {
                    continue;
                };
                if !inc.matcher.is_match(&rel_str) {
                    continue;
                }
                if let Some(exclude) = &self.exclude {
                    if exclude.is_match(&rel_str) {
                        continue;
                    }
                }
                if let Ok(relative) = path.strip_prefix(&base_dir) {
                    let relative = relative.to_path_buf();
                    found.insert(path, relative);
                }
            }
        }

        Ok(found
            .into_iter()
            .map(|(path, relative)| SourceFile { path, relative })
            .collect())
    }
}

/// Recursively list every file below `dir`.
pub fn walk_files(fs: &dyn FileSystem, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Files below `base` whose base-relative path matches `pattern`, sorted.
pub fn expand_glob(fs: &dyn FileSystem, base: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let matcher = compile_glob(pattern)?.compile_matcher();
    let static_base = glob_base(pattern);
    let search_root = if static_base.is_empty() {
        base.to_path_buf()
    } else {
        base.join(static_base)
    };
    if !fs.is_dir(&search_root) {
        return Ok(Vec::new());
    }

    Ok(walk_files(fs, &search_root)?
        .into_iter()
        .filter(|path| {
            relative_to(base, path)
                .map(|rel| matcher.is_match(&rel))
                .unwrap_or(false)
        })
        .collect())
}

/// `path` relative to `root` as a forward-slash string.
pub fn relative_to(root: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(root)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
}

/// Lexically resolve `.` and `..` components (no filesystem access).
pub fn clean_path(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
