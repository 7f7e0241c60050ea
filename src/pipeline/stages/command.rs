// src/pipeline/stages/command.rs

//! External tool stage (bundlers, optimizers, real Sass compilers).

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result, anyhow};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::alert::shell_command;
use crate::pipeline::record::FileRecord;
use crate::pipeline::stage::{Stage, StageContext, StageFuture};

/// Run `line` through the shell as a filter.
///
/// `stdin` is written to the child's standard input (or it gets none). The
/// child's stdout is returned; a non-zero exit status is an error carrying
/// its stderr.
pub(crate) async fn run_filter(line: &str, cwd: &Path, stdin: Option<&[u8]>) -> Result<Vec<u8>> {
    let mut cmd = shell_command(line);
    cmd.current_dir(cwd)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning command '{line}'"))?;

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        // stdin must be fed while wait_with_output drains stdout.
        let input = input.to_vec();
        tokio::spawn(async move {
            if let Err(e) = pipe.write_all(&input).await {
                debug!(error = %e, "child closed stdin early");
            }
        });
    }

    let output = child
        .wait_with_output()
        .await
        .with_context(|| format!("waiting for command '{line}'"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let code = output.status.code().unwrap_or(-1);
        return Err(anyhow!(
            "command '{line}' exited with code {code}: {}",
            stderr.trim()
        ));
    }

    Ok(output.stdout)
}

/// Pipes a file through an external command.
///
/// If the command line contains `{input}`, it is replaced with the absolute
/// source path and the tool reads the file itself. Otherwise the current
/// contents are written to its stdin. Stdout becomes the new contents.
#[derive(Debug, Clone)]
pub struct CommandStage {
    cmd: String,
    extname: Option<String>,
}

impl CommandStage {
    pub fn new(cmd: impl Into<String>, extname: Option<String>) -> Self {
        Self {
            cmd: cmd.into(),
            extname,
        }
    }
}

impl Stage for CommandStage {
    fn name(&self) -> &str {
        "command"
    }

    fn output_path(&self, relative: &Path) -> PathBuf {
        let mut out = relative.to_path_buf();
        if let Some(ext) = &self.extname {
            out.set_extension(ext.trim_start_matches('.'));
        }
        out
    }

    fn apply<'a>(&'a self, ctx: &'a StageContext, mut record: FileRecord) -> StageFuture<'a> {
        Box::pin(async move {
            let source = record.source().to_string_lossy().into_owned();
            let (line, stdin) = if self.cmd.contains("{input}") {
                (self.cmd.replace("{input}", &source), None)
            } else {
                (self.cmd.clone(), Some(record.contents.as_slice()))
            };

            info!(cmd = %line, source = %source, "running command stage");
            let stdout = run_filter(&line, &ctx.root, stdin).await?;

            record.contents = stdout;
            if let Some(ext) = &self.extname {
                record.set_extension(ext);
            }
            Ok(record)
        })
    }
}
