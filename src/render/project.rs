//! Project document loading.
//!
//! A project is a TOML file describing the map: its coordinate reference
//! system, background color, the layers it contains and which of them are
//! checked in the interactive canvas.
//!
//! ```toml
//! crs = "EPSG:3857"
//! background = "#ffffff"
//! extent = [0.0, 0.0, 1000.0, 1000.0]   # optional default render extent
//!
//! [canvas]
//! layers = ["labels", "water"]           # checked layers, top-most first
//!
//! [[layers]]
//! id = "water"
//! name = "Water bodies"
//! source = "rasters/water.png"           # relative to the project file
//! extent = [0.0, 0.0, 1000.0, 1000.0]
//! ```
//!
//! Layers are listed top-most first, the same order the canvas uses.
//! Unknown keys are rejected.

use crate::types::{Color, Extent, LayerId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Project validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Project {
    #[serde(default = "default_crs")]
    pub crs: String,
    #[serde(default)]
    pub background: Color,
    #[serde(default)]
    pub extent: Option<Extent>,
    #[serde(default)]
    pub canvas: CanvasState,
    #[serde(default)]
    pub layers: Vec<LayerDef>,
}

fn default_crs() -> String {
    "EPSG:3857".to_string()
}

/// What the interactive map view currently shows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CanvasState {
    /// Checked layers, top-most first.
    pub layers: Vec<LayerId>,
}

/// A single georeferenced raster layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayerDef {
    pub id: LayerId,
    /// Display name. Falls back to the id.
    #[serde(default)]
    pub name: Option<String>,
    /// Raster file. Resolved against the project file's directory on load.
    pub source: PathBuf,
    /// Area the raster covers, in project coordinates.
    pub extent: Extent,
}

impl LayerDef {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}

impl Project {
    /// Load and validate a project file. Relative layer sources are made
    /// absolute against the file's parent directory.
    pub fn load(path: &Path) -> Result<Project, ProjectError> {
        let content = fs::read_to_string(path).map_err(|source| ProjectError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut project = Project::parse(&content)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for layer in &mut project.layers {
            if layer.source.is_relative() {
                layer.source = base.join(&layer.source);
            }
        }
        Ok(project)
    }

    /// Parse and validate project TOML. Layer sources are left as written.
    pub fn parse(content: &str) -> Result<Project, ProjectError> {
        let project: Project = toml::from_str(content)?;
        project.validate()?;
        Ok(project)
    }

    pub fn validate(&self) -> Result<(), ProjectError> {
        let mut seen = HashSet::new();
        for layer in &self.layers {
            if !seen.insert(&layer.id) {
                return Err(ProjectError::Validation(format!(
                    "duplicate layer id '{}'",
                    layer.id
                )));
            }
            if layer.extent.is_null() {
                return Err(ProjectError::Validation(format!(
                    "layer '{}' has an empty or invalid extent",
                    layer.id
                )));
            }
        }
        if self.crs.trim().is_empty() {
            return Err(ProjectError::Validation("crs must not be empty".into()));
        }
        Ok(())
    }

    pub fn layer(&self, id: &LayerId) -> Option<&LayerDef> {
        self.layers.iter().find(|l| &l.id == id)
    }

    /// Union of every layer's extent, or `None` for an empty project.
    pub fn full_extent(&self) -> Option<Extent> {
        self.layers
            .iter()
            .map(|l| l.extent)
            .reduce(|acc, e| acc.union(&e))
    }
}
