// src/pipeline/stages/rename.rs

use std::path::{Path, PathBuf};

use crate::pipeline::record::FileRecord;
use crate::pipeline::stage::{Stage, StageContext, StageFuture};

/// Changes the extension and/or appends a suffix to the file stem
/// (`app.js` with suffix `.min` becomes `app.min.js`).
#[derive(Debug, Clone, Default)]
pub struct RenameStage {
    extname: Option<String>,
    suffix: Option<String>,
}

impl RenameStage {
    pub fn new(extname: Option<String>, suffix: Option<String>) -> Self {
        Self { extname, suffix }
    }

    fn rename(&self, relative: &Path) -> PathBuf {
        let stem = relative
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = match &self.extname {
            Some(ext) => Some(ext.trim_start_matches('.').to_string()),
            None => relative
                .extension()
                .map(|e| e.to_string_lossy().into_owned()),
        };

        let mut name = stem;
        if let Some(suffix) = &self.suffix {
            name.push_str(suffix);
        }
        if let Some(ext) = ext.filter(|e| !e.is_empty()) {
            name.push('.');
            name.push_str(&ext);
        }
        relative.with_file_name(name)
    }
}

impl Stage for RenameStage {
    fn name(&self) -> &str {
        "rename"
    }

    fn output_path(&self, relative: &Path) -> PathBuf {
        self.rename(relative)
    }

    fn apply<'a>(&'a self, _ctx: &'a StageContext, mut record: FileRecord) -> StageFuture<'a> {
        Box::pin(async move {
            record.relative = self.rename(&record.relative);
            Ok(record)
        })
    }
}
