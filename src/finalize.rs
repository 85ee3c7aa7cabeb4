//! Moving the compressed texture to its final location.
//!
//! The destination is `<folder>/<filename>.dds`. Placing it:
//!
//! 1. creates the destination directory and any missing ancestors,
//! 2. removes a previous file at the destination (a failure here is only
//!    logged; the move below decides the outcome),
//! 3. renames the file into place, falling back to copy + remove when the
//!    work directory lives on another filesystem.

use crate::error::PipelineError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Used when the configured filename is blank or only an extension.
pub const DEFAULT_FILENAME: &str = "output_map";

/// Final `.dds` path for `filename` in `folder`.
///
/// A trailing `.dds` (any case) is stripped before the extension is added
/// back, so `"world.DDS"` and `"world"` give the same result.
pub fn resolve_destination(folder: &Path, filename: &str) -> PathBuf {
    let mut name = filename.trim();
    if name.len() >= 4 && name.is_char_boundary(name.len() - 4) {
        let (stem, ext) = name.split_at(name.len() - 4);
        if ext.eq_ignore_ascii_case(".dds") {
            name = stem.trim_end();
        }
    }
    if name.is_empty() {
        name = DEFAULT_FILENAME;
    }
    folder.join(format!("{name}.dds"))
}

/// Move `source` to `destination`, replacing whatever is there.
pub fn finalize_output(source: &Path, destination: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            PipelineError::fs(format!("Failed to create {}", parent.display()), e)
        })?;
    }

    if destination.exists() {
        if let Err(e) = fs::remove_file(destination) {
            warn!(path = %destination.display(), error = %e, "could not remove existing output");
        }
    }

    move_file(source, destination).map_err(|e| {
        PipelineError::fs(
            format!(
                "Failed to move {} to {}",
                source.display(),
                destination.display()
            ),
            e,
        )
    })?;
    debug!(path = %destination.display(), "output placed");
    Ok(())
}

fn move_file(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!("rename crosses filesystems, copying instead");
            fs::copy(source, destination)?;
            fs::remove_file(source)
        }
        Err(e) => Err(e),
    }
}
