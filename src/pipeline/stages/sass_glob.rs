// src/pipeline/stages/sass_glob.rs

//! Expands glob imports in stylesheets.
//!
//! `@import "components/*.scss";` becomes one `@import` per matching file,
//! sorted by path. The pattern is resolved against the importing file's
//! directory and recorded as a glob dependency, so adding a new partial
//! invalidates the importing stylesheet.

use anyhow::{Context, Result};
use regex::Regex;

use crate::pipeline::record::{Dependency, FileRecord};
use crate::pipeline::sources::{expand_glob, relative_to};
use crate::pipeline::stage::{Stage, StageContext, StageFuture};

#[derive(Debug)]
pub struct SassGlobStage {
    import: Regex,
}

impl SassGlobStage {
    pub fn new() -> Result<Self> {
        let import = Regex::new(r#"@import\s*(?:"([^"]*[*?][^"]*)"|'([^']*[*?][^']*)')\s*;?"#)
            .context("compiling glob import regex")?;
        Ok(Self { import })
    }
}

impl Stage for SassGlobStage {
    fn name(&self) -> &str {
        "sass_glob"
    }

    fn apply<'a>(&'a self, ctx: &'a StageContext, mut record: FileRecord) -> StageFuture<'a> {
        Box::pin(async move {
            let dir = record
                .source()
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| ctx.root.clone());

            let text = record.text()?.to_string();
            let mut out = String::with_capacity(text.len());
            let mut last = 0;
            let mut deps = Vec::new();

            for caps in self.import.captures_iter(&text) {
                let Some(whole) = caps.get(0) else {
                    continue;
                };
                let Some(pattern) = caps.get(1).or_else(|| caps.get(2)) else {
                    continue;
                };
                let pattern = pattern.as_str();

                out.push_str(&text[last..whole.start()]);
                last = whole.end();

                let matches = expand_glob(ctx.fs.as_ref(), &dir, pattern)
                    .with_context(|| format!("expanding glob import '{pattern}'"))?;
                for path in &matches {
                    record.observe_file(ctx.fs.as_ref(), path);
                }
                let imports: Vec<String> = matches
                    .iter()
                    .filter(|path| **path != record.source())
                    .filter_map(|path| relative_to(&dir, path))
                    .map(|rel| format!("@import \"{rel}\";"))
                    .collect();
                out.push_str(&imports.join("\n"));

                deps.push(Dependency::Glob {
                    base: dir.clone(),
                    pattern: pattern.to_string(),
                });
            }
            out.push_str(&text[last..]);

            record.set_text(out);
            for dep in deps {
                record.add_dependency(dep);
            }
            Ok(record)
        })
    }
}
