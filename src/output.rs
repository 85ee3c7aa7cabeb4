//! CLI output formatting.
//!
//! Every format function returns `Vec<String>` and does no I/O, so the exact
//! text can be tested. `print_*` wrappers write to stdout; pipeline events
//! are printed by a thread in `main.rs` as they arrive.
//!
//! # Output Format
//!
//! ## Export
//!
//! ```text
//! Exporting 1024x1024 as BC7_UNORM, 3 levels
//!     Level 0  1024x1024
//!         Layers: labels, roads, water
//!     Level 1  512x512
//!         Layers: roads, water
//!     Level 2  256x256
//!         Layers: water
//! Assembling 3 levels
//! Compressing to BC7_UNORM
//! Saved maps/world.dds
//! ```
//!
//! ## Plan
//!
//! ```text
//! Mipmap: Fixed 2 levels (3 images)
//! Level 0  1024x1024
//!     Layers: labels, roads, water
//! ...
//! Output: maps/world.dds
//! ```
//!
//! ## Layers
//!
//! ```text
//! 001 Place names (labels)
//!     Source: rasters/labels.png
//!     Extent: 0,0,1000,1000
//! ```

use crate::error::PipelineError;
use crate::pipeline::PipelineEvent;
use crate::render::Project;
use crate::types::{LayerId, LevelPolicy, MipLevel};
use serde::Serialize;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn level_header(index: u32, width: u32, height: u32) -> String {
    format!("Level {}  {}x{}", index, width, height)
}

fn layer_list(layers: &[LayerId]) -> String {
    if layers.is_empty() {
        return "(none)".to_string();
    }
    layers
        .iter()
        .map(LayerId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// One-line description of how many levels a policy produced.
///
/// ```text
/// Mipmap: Auto (13 levels)
/// Mipmap: None (base image only)
/// Mipmap: Fixed 4 levels (5 images)
/// ```
pub fn format_level_policy(policy: LevelPolicy, planned: usize) -> String {
    match policy {
        LevelPolicy::Auto => format!("Mipmap: Auto ({} levels)", planned),
        LevelPolicy::Fixed(1) => "Mipmap: None (base image only)".to_string(),
        LevelPolicy::Fixed(n) => {
            let mut line = format!("Mipmap: Fixed {} levels ({} images)", n - 1, n);
            if planned < n as usize {
                line.push_str(&format!(", {} fit the minimum dimension", planned));
            }
            line
        }
    }
}

// ============================================================================
// Export events
// ============================================================================

/// Format a single pipeline event as display lines.
pub fn format_event(event: &PipelineEvent) -> Vec<String> {
    match event {
        PipelineEvent::Started {
            levels,
            width,
            height,
            format,
        } => vec![format!(
            "Exporting {}x{} as {}, {} levels",
            width,
            height,
            format.tool_name(),
            levels
        )],
        PipelineEvent::LevelRendered {
            index,
            width,
            height,
            visible_layers,
        } => vec![
            format!("{}{}", indent(1), level_header(*index, *width, *height)),
            format!("{}Layers: {}", indent(2), layer_list(visible_layers)),
        ],
        // Level lines already show progress.
        PipelineEvent::Progress { .. } => Vec::new(),
        PipelineEvent::Assembling { levels } => vec![format!("Assembling {} levels", levels)],
        PipelineEvent::Compressing { format } => {
            vec![format!("Compressing to {}", format.tool_name())]
        }
        PipelineEvent::Finished { path } => vec![format!("Saved {}", path.display())],
        PipelineEvent::Cancelled { completed } => vec![format!(
            "Cancelled after {} level{}; nothing was written",
            completed,
            if *completed == 1 { "" } else { "s" }
        )],
    }
}

/// Percentage for a progress event, rounded down.
pub fn progress_percent(step: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (u64::from(step) * 100 / u64::from(total)) as u32
}

// ============================================================================
// Plan
// ============================================================================

/// Format the level plan with per-level visible layers.
pub fn format_plan(
    policy: LevelPolicy,
    levels: &[MipLevel],
    destination: &Path,
) -> Vec<String> {
    let mut lines = vec![format_level_policy(policy, levels.len())];
    for level in levels {
        lines.push(level_header(level.index, level.width, level.height));
        lines.push(format!(
            "{}Layers: {}",
            indent(1),
            layer_list(&level.visible_layers)
        ));
    }
    lines.push(format!("Output: {}", destination.display()));
    lines
}

pub fn print_plan(policy: LevelPolicy, levels: &[MipLevel], destination: &Path) {
    for line in format_plan(policy, levels, destination) {
        println!("{}", line);
    }
}

/// Machine-readable plan entry for `plan --json`.
#[derive(Debug, Serialize)]
pub struct PlanEntry<'a> {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub layers: &'a [LayerId],
}

pub fn plan_json(levels: &[MipLevel]) -> serde_json::Result<String> {
    let entries: Vec<PlanEntry<'_>> = levels
        .iter()
        .map(|l| PlanEntry {
            index: l.index,
            width: l.width,
            height: l.height,
            layers: &l.visible_layers,
        })
        .collect();
    serde_json::to_string_pretty(&entries)
}

// ============================================================================
// Layers
// ============================================================================

/// Format the candidate layers of a project, top-most first.
///
/// Information-first: display name leads, the id is shown in parentheses
/// when it differs.
pub fn format_layers(project: &Project, candidates: &[LayerId]) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, id) in candidates.iter().enumerate() {
        let Some(def) = project.layer(id) else {
            continue;
        };
        let name = def.display_name();
        if name == id.as_str() {
            lines.push(format!("{} {}", format_index(i + 1), name));
        } else {
            lines.push(format!("{} {} ({})", format_index(i + 1), name, id));
        }
        lines.push(format!("{}Source: {}", indent(1), def.source.display()));
        lines.push(format!("{}Extent: {}", indent(1), def.extent));
    }
    if lines.is_empty() {
        lines.push("No layers".to_string());
    }
    lines
}

pub fn print_layers(project: &Project, candidates: &[LayerId]) {
    for line in format_layers(project, candidates) {
        println!("{}", line);
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Format a pipeline error with everything the user needs to diagnose it,
/// including captured tool output.
pub fn format_error(err: &PipelineError) -> Vec<String> {
    let mut lines = vec![format!("Error: {}", err)];
    match err {
        PipelineError::ToolInvocation { stdout, stderr, .. } => {
            push_block(&mut lines, "stdout", stdout);
            push_block(&mut lines, "stderr", stderr);
        }
        PipelineError::ArtifactNotFound { detail, .. } => {
            for line in detail.lines() {
                lines.push(format!("{}{}", indent(1), line));
            }
        }
        _ => {}
    }
    lines
}

fn push_block(lines: &mut Vec<String>, label: &str, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    lines.push(format!("{}{}:", indent(1), label));
    for line in text.lines() {
        lines.push(format!("{}{}", indent(2), line));
    }
}
