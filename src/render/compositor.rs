//! Raster compositor, the built-in [`Renderer`].
//!
//! Every project layer is a georeferenced raster. A render call:
//!
//! 1. fills the output with the background color,
//! 2. for each requested layer, crops the part of its raster that overlaps
//!    the requested extent and resamples it (Lanczos3) onto the matching
//!    output pixels,
//! 3. alpha-blends the prepared layers bottom-most first.
//!
//! Decoded rasters are cached, so rendering the same project at twelve mip
//! sizes decodes each file once. Step 2 runs on the rayon pool when
//! `parallel` is enabled; blending is always sequential to keep stacking
//! order deterministic.

use super::backend::{RenderError, RenderParams, Renderer};
use super::geometry::{source_window, target_window};
use super::project::{LayerDef, Project};
use crate::types::LayerId;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// A layer resampled to its place in the output image.
struct PlacedLayer {
    image: RgbaImage,
    x: u32,
    y: u32,
}

pub struct CompositorRenderer {
    project: Project,
    parallel: bool,
    rasters: Mutex<HashMap<LayerId, Arc<RgbaImage>>>,
}

impl CompositorRenderer {
    pub fn new(project: Project) -> Self {
        Self {
            project,
            parallel: false,
            rasters: Mutex::new(HashMap::new()),
        }
    }

    /// Prepare layers concurrently on the global rayon pool.
    pub fn parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Decoded raster for a layer, loading it on first use.
    fn raster(&self, def: &LayerDef) -> Result<Arc<RgbaImage>, RenderError> {
        if let Some(cached) = self
            .rasters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&def.id)
        {
            return Ok(Arc::clone(cached));
        }

        debug!(layer = %def.id, path = %def.source.display(), "decoding layer raster");
        let decoded = image::open(&def.source)
            .map_err(|e| RenderError::Decode {
                path: def.source.clone(),
                message: e.to_string(),
            })?
            .to_rgba8();
        let decoded = Arc::new(decoded);

        self.rasters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(def.id.clone(), Arc::clone(&decoded));
        Ok(decoded)
    }

    /// Crop and resample one layer. `None` when it does not reach the output.
    fn prepare(
        &self,
        def: &LayerDef,
        params: &RenderParams,
    ) -> Result<Option<PlacedLayer>, RenderError> {
        let Some(overlap) = def.extent.intersection(&params.extent) else {
            return Ok(None);
        };
        let Some(target) = target_window(&params.extent, &overlap, params.width, params.height)
        else {
            return Ok(None);
        };

        let raster = self.raster(def)?;
        let (raster_w, raster_h) = raster.dimensions();
        let Some(source) = source_window(&def.extent, &overlap, raster_w, raster_h) else {
            return Ok(None);
        };

        let cropped =
            imageops::crop_imm(&*raster, source.x, source.y, source.width, source.height).to_image();
        let image = if cropped.dimensions() == (target.width, target.height) {
            cropped
        } else {
            imageops::resize(&cropped, target.width, target.height, FilterType::Lanczos3)
        };

        Ok(Some(PlacedLayer {
            image,
            x: target.x,
            y: target.y,
        }))
    }
}

impl Renderer for CompositorRenderer {
    fn render(&self, params: &RenderParams) -> Result<RgbaImage, RenderError> {
        if params.width == 0 || params.height == 0 {
            return Err(RenderError::InvalidSize {
                width: params.width,
                height: params.height,
            });
        }

        let defs: Vec<&LayerDef> = params
            .layers
            .iter()
            .map(|id| {
                self.project
                    .layer(id)
                    .ok_or_else(|| RenderError::UnknownLayer(id.clone()))
            })
            .collect::<Result<_, _>>()?;

        let placed: Vec<Option<PlacedLayer>> = if self.parallel {
            defs.par_iter()
                .map(|def| self.prepare(def, params))
                .collect::<Result<_, _>>()?
        } else {
            defs.iter()
                .map(|def| self.prepare(def, params))
                .collect::<Result<_, _>>()?
        };

        let mut canvas =
            RgbaImage::from_pixel(params.width, params.height, image::Rgba(params.background.0));
        // Layers are listed top-most first; paint from the bottom up.
        for layer in placed.into_iter().rev().flatten() {
            imageops::overlay(&mut canvas, &layer.image, i64::from(layer.x), i64::from(layer.y));
        }
        Ok(canvas)
    }
}
