//! Map rendering: the renderer seam and the built-in raster compositor.
//!
//! | Piece | Role |
//! |---|---|
//! | [`Renderer`] | synchronous "render these layers at this size" contract |
//! | [`CompositorRenderer`] | composites georeferenced rasters from a [`Project`] |
//! | [`LayerSource`] | where the candidate layer list comes from |
//! | [`Project`] | TOML project document: CRS, background, layers, canvas |
//!
//! The pipeline only ever talks to [`Renderer`]. Any engine can sit behind
//! it as long as a call blocks until the image is complete.

pub mod backend;
pub mod compositor;
mod geometry;
pub mod layers;
pub mod project;

pub use backend::{RenderError, RenderParams, Renderer};
pub use compositor::CompositorRenderer;
pub use layers::{InteractiveCanvasSource, LayerSource, LayerSourceKind, ProjectDocumentSource};
pub use project::{LayerDef, Project, ProjectError};
