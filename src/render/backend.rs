//! Renderer trait and shared types.
//!
//! A [`Renderer`] takes a fully resolved [`RenderParams`] (which layers, which
//! CRS, which extent, what pixel size, what background) and returns one RGBA
//! image. The call is synchronous: start, wait, return. Whatever parallelism
//! the engine uses internally is its own business.

use crate::types::{Color, Extent, LayerId};
use image::RgbaImage;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode layer raster {path}: {message}")]
    Decode { path: PathBuf, message: String },
    #[error("Layer not found in project: {0}")]
    UnknownLayer(LayerId),
    #[error("Invalid output size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("Rendering failed: {0}")]
    Failed(String),
}

/// Everything a renderer needs for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderParams {
    /// Layers to draw, top-most first.
    pub layers: Vec<LayerId>,
    pub crs: String,
    pub extent: Extent,
    pub width: u32,
    pub height: u32,
    pub background: Color,
}

/// Synchronous map renderer.
pub trait Renderer: Sync {
    /// Render `params` into a single image of exactly `width` x `height`.
    fn render(&self, params: &RenderParams) -> Result<RgbaImage, RenderError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Renderer that records every call and returns a solid image.
    ///
    /// `fail_at` makes the n-th call (0-based) fail. `on_render` runs after
    /// each successful call, which lets tests trip a cancel token mid-run.
    #[derive(Default)]
    pub struct MockRenderer {
        pub calls: Mutex<Vec<RenderParams>>,
        pub fail_at: Option<usize>,
        pub on_render: Option<Box<dyn Fn(usize) + Send + Sync>>,
    }

    impl MockRenderer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_at(call: usize) -> Self {
            Self {
                fail_at: Some(call),
                ..Self::default()
            }
        }

        pub fn with_hook(hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
            Self {
                on_render: Some(Box::new(hook)),
                ..Self::default()
            }
        }

        pub fn get_calls(&self) -> Vec<RenderParams> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Renderer for MockRenderer {
        fn render(&self, params: &RenderParams) -> Result<RgbaImage, RenderError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(params.clone());
                calls.len() - 1
            };
            if self.fail_at == Some(call) {
                return Err(RenderError::Failed(format!("mock failure on call {call}")));
            }
            if let Some(hook) = &self.on_render {
                hook(call);
            }
            Ok(RgbaImage::from_pixel(
                params.width,
                params.height,
                image::Rgba(params.background.0),
            ))
        }
    }

    fn params(width: u32, height: u32) -> RenderParams {
        RenderParams {
            layers: vec![LayerId::from("a")],
            crs: "EPSG:4326".to_string(),
            extent: Extent::new(0.0, 0.0, 1.0, 1.0),
            width,
            height,
            background: Color([10, 20, 30, 255]),
        }
    }

    #[test]
    fn mock_records_calls() {
        let renderer = MockRenderer::new();
        let img = renderer.render(&params(8, 4)).unwrap();
        assert_eq!(img.dimensions(), (8, 4));
        assert_eq!(img.get_pixel(0, 0).0, [10, 20, 30, 255]);

        let calls = renderer.get_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].crs, "EPSG:4326");
    }

    #[test]
    fn mock_fails_on_requested_call() {
        let renderer = MockRenderer::failing_at(1);
        assert!(renderer.render(&params(2, 2)).is_ok());
        assert!(matches!(
            renderer.render(&params(1, 1)),
            Err(RenderError::Failed(_))
        ));
    }
}
