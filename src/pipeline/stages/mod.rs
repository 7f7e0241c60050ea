// src/pipeline/stages/mod.rs

//! Built-in stages and their construction from config.

use std::sync::Arc;

use anyhow::Result;

use crate::config::StageConfig;
use crate::pipeline::stage::Stage;

pub mod command;
pub mod include;
pub mod rename;
pub mod sass_glob;
pub mod source_map;
pub mod stylesheet;

pub use command::CommandStage;
pub use include::{IncludeBase, IncludeStage};
pub use rename::RenameStage;
pub use sass_glob::SassGlobStage;
pub use source_map::SourceMapStage;
pub use stylesheet::StylesheetStage;

/// Instantiate the stage described by `cfg`.
pub fn build_stage(cfg: &StageConfig) -> Result<Arc<dyn Stage>> {
    let stage: Arc<dyn Stage> = match cfg {
        StageConfig::Include { prefix, basepath } => {
            Arc::new(IncludeStage::new(prefix, IncludeBase::parse(basepath))?)
        }
        StageConfig::SassGlob => Arc::new(SassGlobStage::new()?),
        StageConfig::Stylesheet { command } => Arc::new(StylesheetStage::new(command.clone())?),
        StageConfig::SourceMap => Arc::new(SourceMapStage::new()),
        StageConfig::Command { cmd, extname } => {
            Arc::new(CommandStage::new(cmd.clone(), extname.clone()))
        }
        StageConfig::Rename { extname, suffix } => {
            Arc::new(RenameStage::new(extname.clone(), suffix.clone()))
        }
    };
    Ok(stage)
}

/// Instantiate every stage of a task, in order.
pub fn build_stages(cfgs: &[StageConfig]) -> Result<Vec<Arc<dyn Stage>>> {
    cfgs.iter().map(build_stage).collect()
}
