//! Where the candidate layer list comes from.
//!
//! Two sources, chosen explicitly by the caller:
//!
//! - [`InteractiveCanvasSource`]: the layers checked in the project's canvas,
//!   in canvas order. What the user is looking at.
//! - [`ProjectDocumentSource`]: every layer in the project document, in
//!   document order. Useful for headless runs where no canvas state exists.

use super::project::{Project, ProjectError};
use crate::types::LayerId;
use std::str::FromStr;

/// Produces the ordered candidate layer ids for a run (top-most first).
pub trait LayerSource {
    fn layer_ids(&self) -> Vec<LayerId>;
}

/// Layers checked in the interactive canvas.
///
/// Canvas entries that no longer exist in the project are dropped.
pub struct InteractiveCanvasSource<'a> {
    project: &'a Project,
}

impl<'a> InteractiveCanvasSource<'a> {
    pub fn new(project: &'a Project) -> Self {
        Self { project }
    }
}

impl LayerSource for InteractiveCanvasSource<'_> {
    fn layer_ids(&self) -> Vec<LayerId> {
        self.project
            .canvas
            .layers
            .iter()
            .filter(|id| self.project.layer(id).is_some())
            .cloned()
            .collect()
    }
}

/// Every layer in the project document.
pub struct ProjectDocumentSource<'a> {
    project: &'a Project,
}

impl<'a> ProjectDocumentSource<'a> {
    pub fn new(project: &'a Project) -> Self {
        Self { project }
    }
}

impl LayerSource for ProjectDocumentSource<'_> {
    fn layer_ids(&self) -> Vec<LayerId> {
        self.project.layers.iter().map(|l| l.id.clone()).collect()
    }
}

/// Command-line selector for a [`LayerSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerSourceKind {
    #[default]
    Canvas,
    Project,
}

impl LayerSourceKind {
    pub fn source<'a>(self, project: &'a Project) -> Box<dyn LayerSource + 'a> {
        match self {
            LayerSourceKind::Canvas => Box::new(InteractiveCanvasSource::new(project)),
            LayerSourceKind::Project => Box::new(ProjectDocumentSource::new(project)),
        }
    }

    /// Candidate layers for an export.
    ///
    /// A project with layers but nothing checked in its canvas would export
    /// background only, so that is rejected instead of rendered.
    pub fn candidates(self, project: &Project) -> Result<Vec<LayerId>, ProjectError> {
        let ids = self.source(project).layer_ids();
        if ids.is_empty() && self == LayerSourceKind::Canvas && !project.layers.is_empty() {
            return Err(ProjectError::Validation(format!(
                "the canvas has no checked layers but the project defines {}; \
                 pass --layers project to export every layer",
                project.layers.len()
            )));
        }
        Ok(ids)
    }
}

impl FromStr for LayerSourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "canvas" => Ok(LayerSourceKind::Canvas),
            "project" => Ok(LayerSourceKind::Project),
            other => Err(format!(
                "unknown layer source '{other}': expected canvas or project"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> Project {
        Project::parse(
            r#"
[canvas]
layers = ["roads", "removed", "water"]

[[layers]]
id = "water"
source = "water.png"
extent = [0.0, 0.0, 1.0, 1.0]

[[layers]]
id = "roads"
source = "roads.png"
extent = [0.0, 0.0, 1.0, 1.0]

[[layers]]
id = "hillshade"
source = "hillshade.png"
extent = [0.0, 0.0, 1.0, 1.0]
"#,
        )
        .unwrap()
    }

    fn names(ids: &[LayerId]) -> Vec<&str> {
        ids.iter().map(LayerId::as_str).collect()
    }

    #[test]
    fn canvas_source_keeps_canvas_order_and_drops_missing() {
        let p = project();
        let ids = InteractiveCanvasSource::new(&p).layer_ids();
        assert_eq!(names(&ids), vec!["roads", "water"]);
    }

    #[test]
    fn project_source_lists_every_layer() {
        let p = project();
        let ids = ProjectDocumentSource::new(&p).layer_ids();
        assert_eq!(names(&ids), vec!["water", "roads", "hillshade"]);
    }

    #[test]
    fn kind_selects_source() {
        let p = project();
        assert_eq!(LayerSourceKind::Project.source(&p).layer_ids().len(), 3);
        assert_eq!(LayerSourceKind::Canvas.source(&p).layer_ids().len(), 2);
    }

    #[test]
    fn candidates_reject_empty_canvas_when_project_has_layers() {
        let p = Project::parse(
            r#"
[[layers]]
id = "a"
source = "a.png"
extent = [0.0, 0.0, 1.0, 1.0]
"#,
        )
        .unwrap();
        let err = LayerSourceKind::Canvas.candidates(&p).unwrap_err();
        assert!(matches!(err, ProjectError::Validation(msg) if msg.contains("--layers project")));
        assert_eq!(names(&LayerSourceKind::Project.candidates(&p).unwrap()), vec!["a"]);
    }

    #[test]
    fn candidates_reject_canvas_with_only_stale_entries() {
        let p = Project::parse(
            r#"
[canvas]
layers = ["gone"]

[[layers]]
id = "a"
source = "a.png"
extent = [0.0, 0.0, 1.0, 1.0]
"#,
        )
        .unwrap();
        assert!(LayerSourceKind::Canvas.candidates(&p).is_err());
    }

    #[test]
    fn candidates_allow_empty_project() {
        let p = Project::parse("").unwrap();
        assert!(LayerSourceKind::Canvas.candidates(&p).unwrap().is_empty());
    }

    #[test]
    fn candidates_match_source_otherwise() {
        let p = project();
        assert_eq!(names(&LayerSourceKind::Canvas.candidates(&p).unwrap()), vec!["roads", "water"]);
    }

    #[test]
    fn kind_parses() {
        assert_eq!("canvas".parse::<LayerSourceKind>(), Ok(LayerSourceKind::Canvas));
        assert_eq!("project".parse::<LayerSourceKind>(), Ok(LayerSourceKind::Project));
        assert!("gui".parse::<LayerSourceKind>().is_err());
    }
}
