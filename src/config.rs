//! Export configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! the base layer; the user's file only needs the keys it wants to change.
//!
//! ## Config File Location
//!
//! `config.toml` lives in the config directory (`--config-dir`, default the
//! current directory):
//!
//! ```text
//! my-map/
//! ├── config.toml      # export settings (this module)
//! ├── project.toml     # map project (see render::project)
//! └── rasters/
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [tools]
//! texassemble = ""          # Path to texassemble(.exe)
//! texconv = ""              # Path to texconv(.exe)
//!
//! [texture]
//! size = 4096               # Square base size, one of the presets
//! # width = 1920            # Custom base width (overrides size)
//! # height = 1080          # Custom base height (overrides size)
//! format = "bc7"            # bc7 | bc1 | bc3 | rgba8
//! levels = "auto"           # "auto", "none", or a total level count
//! min_dimension = 1         # Stop once a level side drops below this
//!
//! [output]
//! folder = "."
//! filename = "my_map"       # ".dds" is appended
//! # temp_dir = "/scratch"   # Parent of the per-run working directory
//!
//! [render]
//! parallel = false          # Prepare layers concurrently
//! # max_threads = 4         # Omit for auto = CPU cores
//!
//! [[hide]]
//! level = 1                 # Hidden at this level and every smaller one
//! layers = ["labels"]
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::finalize::resolve_destination;
use crate::tools::ToolPaths;
use crate::types::{HideRule, LevelPolicy, TextureFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Base sizes offered for square textures.
pub const SIZE_PRESETS: [u32; 8] = [32768, 16384, 8192, 4096, 2048, 1024, 512, 256];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Export configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    /// Locations of the external texture tools.
    pub tools: ToolsConfig,
    /// Base size, format and mip levels.
    pub texture: TextureConfig,
    /// Where the final `.dds` goes.
    pub output: OutputConfig,
    /// Compositor settings.
    pub render: RenderConfig,
    /// Per-level layer hiding.
    pub hide: Vec<HideRule>,
}

impl ExportConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let texture = &self.texture;
        let custom = texture.width.is_some() || texture.height.is_some();
        if !custom && !SIZE_PRESETS.contains(&texture.size) {
            return Err(ConfigError::Validation(format!(
                "texture.size must be one of {SIZE_PRESETS:?}, got {}",
                texture.size
            )));
        }
        if texture.width == Some(0) || texture.height == Some(0) {
            return Err(ConfigError::Validation(
                "texture.width and texture.height must be at least 1".into(),
            ));
        }
        if texture.min_dimension == 0 {
            return Err(ConfigError::Validation(
                "texture.min_dimension must be at least 1".into(),
            ));
        }
        if self.render.max_threads == Some(0) {
            return Err(ConfigError::Validation(
                "render.max_threads must be at least 1".into(),
            ));
        }
        if let Some(rule) = self.hide.iter().find(|r| r.layers.is_empty()) {
            return Err(ConfigError::Validation(format!(
                "hide rule at level {} lists no layers",
                rule.threshold
            )));
        }
        Ok(())
    }

    /// Final `.dds` path from `[output]`.
    pub fn destination(&self) -> PathBuf {
        resolve_destination(&self.output.folder, &self.output.filename)
    }
}

/// External tool locations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    pub texassemble: String,
    pub texconv: String,
}

impl ToolsConfig {
    pub fn resolve(&self) -> ToolPaths {
        ToolPaths {
            assembler: PathBuf::from(normalize_tool_path(&self.texassemble)),
            compressor: PathBuf::from(normalize_tool_path(&self.texconv)),
        }
    }
}

/// Clean up a pasted tool path: surrounding whitespace and one layer of
/// matching quotes are removed.
pub fn normalize_tool_path(raw: &str) -> String {
    let trimmed = raw.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| {
            trimmed
                .strip_prefix(*q)
                .and_then(|rest| rest.strip_suffix(*q))
        })
        .unwrap_or(trimmed);
    unquoted.trim().to_string()
}

/// Base size, format and mip level settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TextureConfig {
    /// Square base size, used for any axis without a custom value.
    pub size: u32,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: TextureFormat,
    pub levels: LevelPolicy,
    /// Levels whose width or height would drop below this are not produced.
    pub min_dimension: u32,
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            size: 4096,
            width: None,
            height: None,
            format: TextureFormat::default(),
            levels: LevelPolicy::default(),
            min_dimension: 1,
        }
    }
}

impl TextureConfig {
    /// `(width, height)` of level 0.
    pub fn base_size(&self) -> (u32, u32) {
        (
            self.width.unwrap_or(self.size),
            self.height.unwrap_or(self.size),
        )
    }
}

/// Output location settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub folder: PathBuf,
    pub filename: String,
    /// Parent of the per-run working directory. System temp dir when unset.
    pub temp_dir: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("."),
            filename: "my_map".to_string(),
            temp_dir: None,
        }
    }
}

/// Compositor settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Prepare the layers of one level concurrently.
    pub parallel: bool,
    /// Maximum rayon worker threads. When absent, all CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_threads: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &RenderConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_threads.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

const CONFIG_FILE: &str = "config.toml";

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ExportConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely, so a user
///   `[[hide]]` list replaces the default one instead of extending it.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the directory has no `config.toml`.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ExportConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ExportConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
pub fn load_config(dir: &Path) -> Result<ExportConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Write the `[tools]` section into `dir/config.toml`, keeping every other
/// key the file already has. Creates the file if needed.
pub fn save_tool_paths(dir: &Path, tools: &ToolsConfig) -> Result<PathBuf, ConfigError> {
    let mut doc = load_raw_config(dir)?.unwrap_or_else(|| toml::Value::Table(toml::Table::new()));
    let toml::Value::Table(table) = &mut doc else {
        return Err(ConfigError::Validation(format!(
            "{CONFIG_FILE} must be a table"
        )));
    };
    table.insert("tools".to_string(), toml::Value::try_from(tools)?);

    fs::create_dir_all(dir)?;
    let path = dir.join(CONFIG_FILE);
    fs::write(&path, toml::to_string_pretty(&doc)?)?;
    Ok(path)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# carto-dds configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.

# ---------------------------------------------------------------------------
# External tools (DirectXTex)
# ---------------------------------------------------------------------------
# Download from https://github.com/microsoft/DirectXTex/releases
# Quotes pasted around a path are ignored.
[tools]
texassemble = ""
texconv = ""

# ---------------------------------------------------------------------------
# Texture
# ---------------------------------------------------------------------------
[texture]
# Square base size in pixels.
# One of: 32768, 16384, 8192, 4096, 2048, 1024, 512, 256
size = 4096

# Custom base size. Each one overrides `size` for its axis.
# width = 1920
# height = 1080

# Compression format:
#   bc7   - BC7, high quality, recommended for maps
#   bc1   - BC1 / DXT1, highest compression, no alpha
#   bc3   - BC3 / DXT5, medium compression with alpha
#   rgba8 - R8G8B8A8, uncompressed
format = "bc7"

# Number of images in the mip chain, base image included:
#   "auto" - halve until the larger side reaches 1px
#   "none" - base image only
#   N      - exactly N images (fewer if min_dimension is reached first)
levels = "auto"

# A level is dropped as soon as its width or height falls below this.
min_dimension = 1

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
folder = "."
# ".dds" is appended; a trailing ".dds" is stripped first.
filename = "my_map"
# Parent directory for the per-run working directory.
# Omit to use the system temp directory.
# temp_dir = "/tmp"

# ---------------------------------------------------------------------------
# Rendering
# ---------------------------------------------------------------------------
[render]
# Prepare the layers of a level concurrently.
parallel = false
# Maximum worker threads. Omit for auto (= number of CPU cores).
# Values larger than the core count are clamped down.
# max_threads = 4

# ---------------------------------------------------------------------------
# Layer hiding
# ---------------------------------------------------------------------------
# Layers listed under a rule are hidden at that level and every smaller
# level after it. Level 1 is half the base size, level 2 a quarter, ...
#
# [[hide]]
# level = 1
# layers = ["labels"]
#
# [[hide]]
# level = 3
# layers = ["roads", "poi"]
"##
}
