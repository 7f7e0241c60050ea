// src/pipeline/stages/include.rs

//! HTML include expansion.
//!
//! Replaces `@@include('partial.html')` (or `@@include("partial.html", {...})`
//! with a JSON context) by the partial's contents, recursively. Context values
//! are substituted for `@@key` inside the included text.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use serde_json::{Map, Value};

use crate::pipeline::record::{Dependency, FileRecord};
use crate::pipeline::sources::clean_path;
use crate::pipeline::stage::{Stage, StageContext, StageFuture};

const MAX_INCLUDE_DEPTH: usize = 32;

/// Where include paths are resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncludeBase {
    /// Relative to the file containing the directive (`@file`).
    File,
    /// Relative to the project root (`@root`).
    Root,
    /// Relative to a fixed directory below the project root.
    Dir(PathBuf),
}

impl IncludeBase {
    pub fn parse(value: &str) -> Self {
        match value {
            "@file" => IncludeBase::File,
            "@root" => IncludeBase::Root,
            dir => IncludeBase::Dir(PathBuf::from(dir)),
        }
    }
}

#[derive(Debug)]
pub struct IncludeStage {
    prefix: String,
    base: IncludeBase,
    directive: Regex,
}

impl IncludeStage {
    pub fn new(prefix: &str, base: IncludeBase) -> Result<Self> {
        let pattern = format!(
            r#"{}include\(\s*(?:"([^"]*)"|'([^']*)')\s*(?:,\s*(\{{[^()]*?\}}))?\s*\)"#,
            regex::escape(prefix)
        );
        let directive = Regex::new(&pattern).context("compiling include directive regex")?;
        Ok(Self {
            prefix: prefix.to_string(),
            base,
            directive,
        })
    }

    fn resolve(&self, ctx: &StageContext, current: &Path, target: &str) -> PathBuf {
        let joined = match &self.base {
            IncludeBase::File => current
                .parent()
                .map(|dir| dir.join(target))
                .unwrap_or_else(|| PathBuf::from(target)),
            IncludeBase::Root => ctx.root.join(target),
            IncludeBase::Dir(dir) => ctx.root.join(dir).join(target),
        };
        clean_path(&joined)
    }

    /// Expand every directive in `text`, which was read from `current`.
    ///
    /// `stack` holds the chain of files currently being expanded.
    fn expand(
        &self,
        ctx: &StageContext,
        text: &str,
        current: &Path,
        stack: &mut Vec<PathBuf>,
        deps: &mut Vec<(PathBuf, Vec<u8>)>,
    ) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;

        for caps in self.directive.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            out.push_str(&text[last..whole.start()]);
            last = whole.end();

            let target = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            let path = self.resolve(ctx, current, target);

            if stack.contains(&path) {
                bail!(
                    "circular include of {} from {}",
                    path.display(),
                    current.display()
                );
            }
            if stack.len() >= MAX_INCLUDE_DEPTH {
                bail!("include depth exceeds {MAX_INCLUDE_DEPTH} at {}", path.display());
            }

            let mut included = ctx
                .fs
                .read_to_string(&path)
                .with_context(|| format!("including '{target}' from {}", current.display()))?;
            if !deps.iter().any(|(seen, _)| *seen == path) {
                deps.push((path.clone(), included.clone().into_bytes()));
            }

            if let Some(json) = caps.get(3) {
                let context: Map<String, Value> = serde_json::from_str(json.as_str())
                    .map_err(|e| anyhow!("invalid include context for '{target}': {e}"))?;
                included = self.substitute(included, &context);
            }

            stack.push(path.clone());
            let expanded = self.expand(ctx, &included, &path, stack, deps)?;
            stack.pop();
            out.push_str(&expanded);
        }

        out.push_str(&text[last..]);
        Ok(out)
    }

    fn substitute(&self, mut text: String, context: &Map<String, Value>) -> String {
        // Longest keys first so `@@titleLong` is not clobbered by `@@title`.
        let mut keys: Vec<&String> = context.keys().collect();
        keys.sort_by_key(|k| std::cmp::Reverse(k.len()));

        for key in keys {
            let value = match &context[key.as_str()] {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            text = text.replace(&format!("{}{}", self.prefix, key), &value);
        }
        text
    }
}

impl Stage for IncludeStage {
    fn name(&self) -> &str {
        "include"
    }

    fn apply<'a>(&'a self, ctx: &'a StageContext, mut record: FileRecord) -> StageFuture<'a> {
        Box::pin(async move {
            let source = record.source().to_path_buf();
            let mut stack = vec![source.clone()];
            let mut deps = Vec::new();

            let expanded = self.expand(ctx, record.text()?, &source, &mut stack, &mut deps)?;
            record.set_text(expanded);
            for (dep, bytes) in deps {
                record.observe(dep.clone(), &bytes);
                record.add_dependency(Dependency::File(dep));
            }
            Ok(record)
        })
    }
}
