// src/pipeline/fingerprint.rs

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blake3::Hasher;

use crate::fs::FileSystem;
use crate::pipeline::record::Dependency;
use crate::pipeline::sources::{compile_glob, expand_glob, relative_to};

/// Hashes of dependency files, keyed by absolute path, as stages read them.
pub type Observed = BTreeMap<PathBuf, String>;

const MISSING: &str = "missing";
const UNSEEN: &str = "unseen";

/// Compute the hash of a single file.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let bytes = fs
        .read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    Ok(hash_bytes(&bytes))
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Hash of `path` right now, or a marker when it cannot be read.
pub fn file_hash_or_missing(fs: &dyn FileSystem, path: &Path) -> String {
    compute_file_hash(fs, path).unwrap_or_else(|_| MISSING.to_string())
}

/// Compute aggregate hash from a list of hashes.
///
/// `hashes` must already be in a stable order.
pub fn compute_aggregate_hash(hashes: &[String]) -> String {
    let mut hasher = Hasher::new();
    for h in hashes {
        hasher.update(h.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Fingerprint of a source file together with the current state of
/// everything it depends on.
///
/// Missing dependency files hash to a marker rather than failing, so a
/// deleted partial simply changes the fingerprint. Glob dependencies are
/// re-expanded, which makes a newly added match change the fingerprint too.
pub fn fingerprint(
    fs: &dyn FileSystem,
    source_contents: &[u8],
    dependencies: &[Dependency],
) -> Result<String> {
    let mut hashes = vec![hash_bytes(source_contents)];
    for dep in sorted(dependencies) {
        match dep {
            Dependency::File(path) => hashes.push(file_hash_or_missing(fs, path)),
            Dependency::Glob { base, pattern } => {
                hashes.push(format!("glob:{pattern}"));
                let matches: BTreeSet<PathBuf> = expand_glob(fs, base, pattern)?.into_iter().collect();
                for path in matches {
                    hashes.push(path.to_string_lossy().into_owned());
                    hashes.push(file_hash_or_missing(fs, &path));
                }
            }
        }
    }

    Ok(compute_aggregate_hash(&hashes))
}

/// Fingerprint of the inputs an output was actually built from.
///
/// Dependency files use the hash recorded in `observed` when the stage read
/// them, so an edit landing while the task is still running leaves the
/// snapshot behind the file and the next [`fingerprint`] differs. A glob
/// match nobody observed appeared mid-run and gets a marker; an observed
/// match that has since disappeared keeps its entry. File dependencies that
/// were never observed fall back to their current hash.
pub fn snapshot_fingerprint(
    fs: &dyn FileSystem,
    source_contents: &[u8],
    dependencies: &[Dependency],
    observed: &Observed,
) -> Result<String> {
    let mut hashes = vec![hash_bytes(source_contents)];
    for dep in sorted(dependencies) {
        match dep {
            Dependency::File(path) => hashes.push(
                observed
                    .get(path)
                    .cloned()
                    .unwrap_or_else(|| file_hash_or_missing(fs, path)),
            ),
            Dependency::Glob { base, pattern } => {
                hashes.push(format!("glob:{pattern}"));
                let matcher = compile_glob(pattern)?.compile_matcher();
                let mut matches: BTreeSet<PathBuf> =
                    expand_glob(fs, base, pattern)?.into_iter().collect();
                matches.extend(
                    observed
                        .keys()
                        .filter(|path| {
                            relative_to(base, path).is_some_and(|rel| matcher.is_match(&rel))
                        })
                        .cloned(),
                );
                for path in matches {
                    hashes.push(path.to_string_lossy().into_owned());
                    hashes.push(
                        observed
                            .get(&path)
                            .cloned()
                            .unwrap_or_else(|| UNSEEN.to_string()),
                    );
                }
            }
        }
    }

    Ok(compute_aggregate_hash(&hashes))
}

fn sorted(dependencies: &[Dependency]) -> Vec<&Dependency> {
    let mut deps: Vec<&Dependency> = dependencies.iter().collect();
    deps.sort();
    deps.dedup();
    deps
}
