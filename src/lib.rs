//! # carto-dds
//!
//! Turns a map project into a single mip-mapped, block-compressed DDS
//! texture. The same geographic extent is rendered at a descending sequence
//! of pixel sizes, chosen layers are hidden once the render gets small
//! enough, and the image sequence is handed to DirectXTex's `texassemble`
//! and `texconv` to build and compress the container.
//!
//! # Architecture: Five-Step Pipeline
//!
//! ```text
//! 1. Plan       base size + level policy  →  [(index, w, h)]
//! 2. Render     one image per level       →  work/mip{i}.png
//! 3. Assemble   texassemble from-mips     →  work/temp_uncompressed.dds
//! 4. Compress   texconv -f <FORMAT>       →  work/compressed/*.dds
//! 5. Place      create dirs, replace      →  <folder>/<filename>.dds
//! ```
//!
//! Steps run strictly in order on the calling thread. Each run owns one
//! private working directory that is removed however the run ends, so a
//! failed or cancelled export leaves nothing behind and never touches an
//! existing destination file.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`plan`] | Mip level count and per-level dimensions |
//! | [`visibility`] | Cumulative hide rules → visible layers per level |
//! | [`orchestrate`] | Renders every level, cancellation, progress |
//! | [`tools`] | texassemble / texconv invocation and output validation |
//! | [`finalize`] | Destination naming and atomic placement |
//! | [`pipeline`] | The whole run: validation, working directory, events |
//! | [`render`] | `Renderer` trait, raster compositor, project documents |
//! | [`config`] | `config.toml` loading, validation, merging, tool-path persistence |
//! | [`types`] | Shared types: extents, layer ids, formats, level policy, requests |
//! | [`error`] | `PipelineError` taxonomy |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## External Tools Over In-Process Encoding
//!
//! Block compression is delegated to DirectXTex. Its encoders are the
//! reference the consuming engines are tested against, and the tools accept
//! the plain PNG sequence this crate already writes for inspection.
//!
//! ## Trust But Verify Tool Output
//!
//! A tool run counts as successful only when it exits 0 *and* the expected
//! file exists. Exit codes alone are not reliable for texassemble.
//!
//! ## Renderer Behind a Trait
//!
//! The pipeline only needs "render these layers at this size".
//! [`render::Renderer`] keeps that seam narrow: the bundled
//! [`render::CompositorRenderer`] composites georeferenced rasters, and
//! tests swap in a recording mock.

pub mod config;
pub mod error;
pub mod finalize;
pub mod orchestrate;
pub mod output;
pub mod pipeline;
pub mod plan;
pub mod render;
pub mod tools;
pub mod types;
pub mod visibility;
