//! Pipeline-level error taxonomy.
//!
//! Every failure of an export run ends up as one [`PipelineError`]. The
//! variants map to what the user has to fix:
//!
//! | Variant | Typical cause |
//! |---|---|
//! | `Configuration` | bad tool path, null extent, zero sizes |
//! | `Render` | renderer failed on a level, unknown layer |
//! | `ToolInvocation` | texassemble/texconv exited non-zero |
//! | `ArtifactNotFound` | a tool exited 0 but its output file is missing |
//! | `Filesystem` | temp dir, PNG save, or final move failed |
//!
//! Cancellation is not an error; see [`crate::pipeline::PipelineOutcome`].

use crate::render::RenderError;
use crate::types::RequestError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Rendering mip level {level} failed: {source}")]
    Render {
        level: u32,
        #[source]
        source: RenderError,
    },

    #[error("{tool} failed ({})", exit_label(.code))]
    ToolInvocation {
        tool: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Expected output not found: {path}")]
    ArtifactNotFound { path: PathBuf, detail: String },

    #[error("{context}: {source}")]
    Filesystem {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

impl PipelineError {
    /// Wrap an I/O error with a short description of what was being done.
    pub fn fs(context: impl Into<String>, source: std::io::Error) -> Self {
        PipelineError::Filesystem {
            context: context.into(),
            source,
        }
    }
}

impl From<RequestError> for PipelineError {
    fn from(err: RequestError) -> Self {
        PipelineError::Configuration(err.to_string())
    }
}
