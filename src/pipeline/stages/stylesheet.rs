// src/pipeline/stages/stylesheet.rs

//! Stylesheet compilation.
//!
//! Without a command the stage flattens local `@import` chains using Sass
//! partial resolution and strips `//` line comments, which is enough for
//! sources written in plain CSS syntax. With a command (e.g.
//! `sass --stdin --load-path={dir}`) the contents are piped through it.
//! Either way the output is renamed to `.css`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use regex::Regex;

use crate::pipeline::record::{Dependency, FileRecord, SourceMap};
use crate::pipeline::sources::{clean_path, relative_to};
use crate::pipeline::stage::{Stage, StageContext, StageFuture};
use crate::pipeline::stages::command::run_filter;

const MAX_IMPORT_DEPTH: usize = 32;

#[derive(Debug)]
pub struct StylesheetStage {
    command: Option<String>,
    import: Regex,
}

impl StylesheetStage {
    pub fn new(command: Option<String>) -> Result<Self> {
        let import = Regex::new(r#"@import\s*(?:"([^"]+)"|'([^']+)')\s*;"#)
            .context("compiling stylesheet import regex")?;
        Ok(Self { command, import })
    }

    fn inline(
        &self,
        ctx: &StageContext,
        text: &str,
        current: &Path,
        stack: &mut Vec<PathBuf>,
        record: &mut FileRecord,
    ) -> Result<String> {
        let dir = current.parent().unwrap_or(ctx.root.as_path()).to_path_buf();
        let mut out = String::with_capacity(text.len());
        let mut last = 0;

        for caps in self.import.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let Some(target) = caps.get(1).or_else(|| caps.get(2)) else {
                continue;
            };
            let target = target.as_str();
            if is_external_import(target) {
                continue;
            }

            out.push_str(&text[last..whole.start()]);
            last = whole.end();

            let Some(path) = resolve_partial(ctx, &dir, target) else {
                bail!(
                    "cannot resolve import '{target}' from {}",
                    current.display()
                );
            };
            if stack.contains(&path) {
                bail!("circular import of {} from {}", path.display(), current.display());
            }
            if stack.len() >= MAX_IMPORT_DEPTH {
                bail!("import depth exceeds {MAX_IMPORT_DEPTH} at {}", path.display());
            }

            let imported = ctx.fs.read_to_string(&path)?;
            record.observe(path.clone(), imported.as_bytes());
            record.add_dependency(Dependency::File(path.clone()));
            push_source(ctx, record, &path, &imported);

            stack.push(path.clone());
            let expanded = self.inline(ctx, &imported, &path, stack, record)?;
            stack.pop();
            out.push_str(&strip_line_comments(&expanded));
        }

        out.push_str(&text[last..]);
        Ok(out)
    }
}

impl Stage for StylesheetStage {
    fn name(&self) -> &str {
        "stylesheet"
    }

    fn output_path(&self, relative: &Path) -> PathBuf {
        relative.with_extension("css")
    }

    fn apply<'a>(&'a self, ctx: &'a StageContext, mut record: FileRecord) -> StageFuture<'a> {
        Box::pin(async move {
            let source = record.source().to_path_buf();
            let text = record.text()?.to_string();
            push_source(ctx, &mut record, &source, &text);

            let css = match &self.command {
                Some(cmd) => {
                    let dir = source.parent().unwrap_or(ctx.root.as_path());
                    let line = cmd.replace("{dir}", &dir.to_string_lossy());
                    let out = run_filter(&line, &ctx.root, Some(text.as_bytes())).await?;
                    String::from_utf8(out).context("compiler produced non UTF-8 output")?
                }
                None => {
                    let mut stack = vec![source.clone()];
                    let inlined = self.inline(ctx, &text, &source, &mut stack, &mut record)?;
                    strip_line_comments(&inlined)
                }
            };

            record.set_text(css);
            record.set_extension("css");
            Ok(record)
        })
    }
}

fn push_source(ctx: &StageContext, record: &mut FileRecord, path: &Path, content: &str) {
    let name = relative_to(&ctx.root, path).unwrap_or_else(|| path.to_string_lossy().into_owned());
    record
        .source_map
        .get_or_insert_with(SourceMap::default)
        .push(name, content.to_string());
}

fn is_external_import(target: &str) -> bool {
    target.starts_with("http://")
        || target.starts_with("https://")
        || target.starts_with("//")
        || target.starts_with("url(")
        || target.ends_with(".css")
}

/// Sass partial lookup: `x`, `x.scss`, `_x.scss`, `x/_index.scss`.
fn resolve_partial(ctx: &StageContext, dir: &Path, target: &str) -> Option<PathBuf> {
    let base = clean_path(&dir.join(target));
    let file_name = base.file_name()?.to_string_lossy().into_owned();
    let parent = base.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut candidates = vec![base.clone()];
    if base.extension().is_none() {
        candidates.push(parent.join(format!("{file_name}.scss")));
        candidates.push(parent.join(format!("_{file_name}.scss")));
        candidates.push(base.join("_index.scss"));
    } else {
        candidates.push(parent.join(format!("_{file_name}")));
    }

    candidates.into_iter().find(|c| ctx.fs.is_file(c))
}

/// Remove `//` comments outside of strings and `url(...)` values.
pub fn strip_line_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (idx, line) in text.split('\n').enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        out.push_str(strip_comment(line));
    }
    out
}

fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut quote: Option<u8> = None;
    let mut paren_depth = 0usize;

    for (i, &b) in bytes.iter().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'(' => paren_depth += 1,
                b')' => paren_depth = paren_depth.saturating_sub(1),
                b'/' if paren_depth == 0 && bytes.get(i + 1) == Some(&b'/') => {
                    return line[..i].trim_end();
                }
                _ => {}
            },
        }
    }
    line
}
