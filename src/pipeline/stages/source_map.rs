// src/pipeline/stages/source_map.rs

//! Writes a `<file>.map` companion next to the output.
//!
//! The map lists every source a previous stage recorded (the stylesheet
//! itself plus its imports) with their original contents. No segment
//! mappings are emitted.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::pipeline::record::{Companion, FileRecord, SourceMap};
use crate::pipeline::sources::relative_to;
use crate::pipeline::stage::{Stage, StageContext, StageFuture};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MapFile<'a> {
    version: u8,
    file: String,
    sources: &'a [String],
    sources_content: &'a [String],
    names: [&'a str; 0],
    mappings: &'a str,
}

#[derive(Debug, Clone, Default)]
pub struct SourceMapStage;

impl SourceMapStage {
    pub fn new() -> Self {
        Self
    }
}

fn render(record: &FileRecord, map: &SourceMap) -> Result<(PathBuf, Vec<u8>, String)> {
    let file = record
        .relative
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let map_name = format!("{file}.map");

    let json = serde_json::to_vec(&MapFile {
        version: 3,
        file,
        sources: &map.sources,
        sources_content: &map.sources_content,
        names: [],
        mappings: "",
    })
    .context("serialising source map")?;

    Ok((record.relative.with_file_name(&map_name), json, map_name))
}

impl Stage for SourceMapStage {
    fn name(&self) -> &str {
        "source_map"
    }

    fn apply<'a>(&'a self, ctx: &'a StageContext, mut record: FileRecord) -> StageFuture<'a> {
        Box::pin(async move {
            let map = record.source_map.clone().unwrap_or_else(|| {
                let mut map = SourceMap::default();
                let source = record.source();
                let name = relative_to(&ctx.root, source)
                    .unwrap_or_else(|| source.to_string_lossy().into_owned());
                map.push(name, String::from_utf8_lossy(&record.contents).into_owned());
                map
            });

            let (relative, contents, map_name) = render(&record, &map)?;
            let mut text = String::from_utf8_lossy(&record.contents).into_owned();
            if !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&format!("/*# sourceMappingURL={map_name} */\n"));

            record.set_text(text);
            record.companions.push(Companion { relative, contents });
            Ok(record)
        })
    }
}
