//! Render orchestration: one image per planned mip level.
//!
//! Levels are rendered strictly in increasing index order, each one a
//! blocking [`Renderer::render`] call followed by a lossless PNG save to the
//! run's working directory:
//!
//! ```text
//! work_dir/
//! ├── mip0.png      # base size
//! ├── mip1.png      # half
//! └── mip2.png      # quarter
//! ```
//!
//! The cancel token is checked before every level, never mid-render. A
//! cancelled run stops immediately with whatever artifacts were written so
//! far; the caller owns the directory and discards them.

use crate::error::PipelineError;
use crate::pipeline::PipelineEvent;
use crate::render::{RenderParams, Renderer};
use crate::types::{MipLevel, RenderRequest};
use crate::visibility;
use image::{ImageError, ImageFormat};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use tracing::{debug, info, warn};

/// Shared cancellation flag.
///
/// Cloning shares the flag, so a Ctrl-C handler and the pipeline can hold
/// the same token.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Every planned level, in increasing index order, with artifacts set.
    Rendered(Vec<MipLevel>),
    /// Stopped at a level boundary after `completed` levels.
    Cancelled { completed: usize },
}

/// File name of the rendered image for a level.
pub fn artifact_name(index: u32) -> String {
    format!("mip{index}.png")
}

/// Render every level in `levels` into `work_dir`.
///
/// Progress is reported as `index / (levels.len() + 2)`; the two extra steps
/// belong to assembly and compression.
pub fn render_levels<R: Renderer + ?Sized>(
    request: &RenderRequest,
    levels: Vec<MipLevel>,
    renderer: &R,
    work_dir: &Path,
    cancel: &CancelToken,
    events: Option<&Sender<PipelineEvent>>,
) -> Result<RenderOutcome, PipelineError> {
    let total = levels.len() as u32 + 2;

    let stale = visibility::stale_rule_layers(&request.hide_rules, &request.layers);
    if !stale.is_empty() {
        warn!(?stale, "hide rules name layers that are not being rendered");
    }

    let mut rendered = Vec::with_capacity(levels.len());
    for mut level in levels {
        if cancel.is_cancelled() {
            info!(completed = rendered.len(), "render cancelled");
            return Ok(RenderOutcome::Cancelled {
                completed: rendered.len(),
            });
        }

        level.visible_layers =
            visibility::resolve(&request.hide_rules, &request.layers, level.index);
        debug!(
            level = level.index,
            width = level.width,
            height = level.height,
            layers = level.visible_layers.len(),
            "rendering level"
        );

        let params = RenderParams {
            layers: level.visible_layers.clone(),
            crs: request.crs.clone(),
            extent: request.extent,
            width: level.width,
            height: level.height,
            background: request.background,
        };
        let image = renderer
            .render(&params)
            .map_err(|source| PipelineError::Render {
                level: level.index,
                source,
            })?;

        let path = work_dir.join(artifact_name(level.index));
        save_png(&image, &path)?;
        level.artifact = Some(path);

        if let Some(tx) = events {
            tx.send(PipelineEvent::LevelRendered {
                index: level.index,
                width: level.width,
                height: level.height,
                visible_layers: level.visible_layers.clone(),
            })
            .ok();
            tx.send(PipelineEvent::Progress {
                step: level.index,
                total,
            })
            .ok();
        }
        rendered.push(level);
    }

    info!(levels = rendered.len(), "all levels rendered");
    Ok(RenderOutcome::Rendered(rendered))
}

fn save_png(image: &image::RgbaImage, path: &Path) -> Result<(), PipelineError> {
    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| {
            let source = match e {
                ImageError::IoError(io) => io,
                other => std::io::Error::other(other),
            };
            PipelineError::fs(format!("Failed to write {}", path.display()), source)
        })
}

/// Artifact paths of rendered levels, in level order.
pub fn artifact_paths(levels: &[MipLevel]) -> Vec<PathBuf> {
    levels.iter().filter_map(|l| l.artifact.clone()).collect()
}
