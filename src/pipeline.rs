//! End-to-end export: plan → render → assemble → compress → place.
//!
//! [`run_pipeline`] is the only entry point. It owns one private working
//! directory per run (a [`tempfile::TempDir`]), so every intermediate file
//! disappears on every exit path: success, error, or cancellation.
//!
//! ```text
//! carto-dds-XXXXXX/
//! ├── mip0.png … mipN.png          # rendered levels
//! ├── temp_uncompressed.dds        # texassemble output
//! └── compressed/
//!     └── temp_uncompressed.dds    # texconv output, moved to the destination
//! ```
//!
//! Progress is reported through [`PipelineEvent`]s on an optional channel.
//! The step counter runs over `levels + 2`: one step per rendered level plus
//! one each for assembly and compression.

use crate::error::PipelineError;
use crate::finalize::finalize_output;
use crate::orchestrate::{self, CancelToken, RenderOutcome};
use crate::plan::plan_levels;
use crate::render::Renderer;
use crate::tools::{self, ToolPaths, ToolRunner, UNCOMPRESSED_NAME};
use crate::types::{LayerId, RenderRequest, TextureFormat};
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use tracing::{info, warn};

/// Progress notifications for a run.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Started {
        levels: usize,
        width: u32,
        height: u32,
        format: TextureFormat,
    },
    LevelRendered {
        index: u32,
        width: u32,
        height: u32,
        visible_layers: Vec<LayerId>,
    },
    /// `step` out of `total` steps done.
    Progress { step: u32, total: u32 },
    Assembling { levels: usize },
    Compressing { format: TextureFormat },
    Finished { path: PathBuf },
    Cancelled { completed: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Completed(PathBuf),
    Cancelled,
}

/// Caller-controlled knobs for a run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub cancel: CancelToken,
    pub events: Option<Sender<PipelineEvent>>,
    /// Parent of the working directory. System temp dir when `None`.
    pub temp_root: Option<PathBuf>,
}

impl RunOptions {
    fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.events {
            tx.send(event).ok();
        }
    }
}

/// Run a complete export.
///
/// Configuration problems (invalid request, missing tools, nothing to
/// render) are reported before any work starts. Cancellation is observed
/// between levels and returns `Ok(PipelineOutcome::Cancelled)`.
pub fn run_pipeline<R, T>(
    request: &RenderRequest,
    tools: &ToolPaths,
    renderer: &R,
    runner: &T,
    options: &RunOptions,
) -> Result<PipelineOutcome, PipelineError>
where
    R: Renderer + ?Sized,
    T: ToolRunner + ?Sized,
{
    request.validate()?;
    tools.validate()?;

    let levels = plan_levels(
        request.base_width,
        request.base_height,
        request.levels,
        request.min_dimension,
    );
    if levels.is_empty() {
        return Err(PipelineError::Configuration(format!(
            "no mip level of {}x{} reaches the minimum dimension {}",
            request.base_width, request.base_height, request.min_dimension
        )));
    }
    let total = levels.len() as u32 + 2;

    info!(
        levels = levels.len(),
        width = request.base_width,
        height = request.base_height,
        format = request.format.tool_name(),
        "starting export"
    );
    options.emit(PipelineEvent::Started {
        levels: levels.len(),
        width: request.base_width,
        height: request.base_height,
        format: request.format,
    });

    let mut builder = tempfile::Builder::new();
    builder.prefix("carto-dds-");
    let work = match &options.temp_root {
        Some(root) => builder.tempdir_in(root),
        None => builder.tempdir(),
    }
    .map_err(|e| PipelineError::fs("Failed to create working directory", e))?;

    let rendered = match orchestrate::render_levels(
        request,
        levels,
        renderer,
        work.path(),
        &options.cancel,
        options.events.as_ref(),
    )? {
        RenderOutcome::Rendered(levels) => levels,
        RenderOutcome::Cancelled { completed } => {
            options.emit(PipelineEvent::Cancelled { completed });
            return Ok(PipelineOutcome::Cancelled);
        }
    };
    if options.cancel.is_cancelled() {
        options.emit(PipelineEvent::Cancelled {
            completed: rendered.len(),
        });
        return Ok(PipelineOutcome::Cancelled);
    }

    let artifacts = orchestrate::artifact_paths(&rendered);
    let uncompressed = work.path().join(UNCOMPRESSED_NAME);
    options.emit(PipelineEvent::Assembling {
        levels: artifacts.len(),
    });
    tools::assemble(runner, &tools.assembler, &artifacts, &uncompressed)?;
    options.emit(PipelineEvent::Progress {
        step: total - 2,
        total,
    });

    let compressed_dir = work.path().join("compressed");
    fs::create_dir(&compressed_dir)
        .map_err(|e| PipelineError::fs("Failed to create compression directory", e))?;
    options.emit(PipelineEvent::Compressing {
        format: request.format,
    });
    let compressed = tools::compress(
        runner,
        &tools.compressor,
        request.format,
        &uncompressed,
        &compressed_dir,
    )?;
    options.emit(PipelineEvent::Progress {
        step: total - 1,
        total,
    });

    finalize_output(&compressed, &request.destination)?;
    options.emit(PipelineEvent::Progress { step: total, total });

    if let Err(e) = work.close() {
        warn!(error = %e, "could not remove working directory");
    }

    info!(path = %request.destination.display(), "export finished");
    options.emit(PipelineEvent::Finished {
        path: request.destination.clone(),
    });
    Ok(PipelineOutcome::Completed(request.destination.clone()))
}
