//! Shared types used across the export pipeline.
//!
//! Everything here is plain data: geographic extents, layer identifiers,
//! colors, texture formats, level policies and hide rules. The request that
//! drives a single export ([`RenderRequest`]) and the per-level record that
//! flows between stages ([`MipLevel`]) live here too.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid extent '{0}': expected xmin,ymin,xmax,ymax")]
    Extent(String),
    #[error("invalid color '{0}': expected #rrggbb or #rrggbbaa")]
    Color(String),
    #[error("unknown texture format '{0}': expected one of bc7, bc1, bc3, rgba8")]
    Format(String),
    #[error("invalid level count '{0}': expected \"auto\", \"none\" or a number >= 1")]
    Levels(String),
    #[error("invalid hide rule '{0}': expected LEVEL=layer[,layer...]")]
    HideRule(String),
}

// ============================================================================
// Geometry
// ============================================================================

/// Rectangular region in project coordinates.
///
/// Serialized as `[xmin, ymin, xmax, ymax]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Extent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Extent {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// An extent that covers nothing. Used as the "unset" value.
    pub fn null() -> Self {
        Self::new(f64::NAN, f64::NAN, f64::NAN, f64::NAN)
    }

    /// True when the extent cannot be used as a viewport: any bound is
    /// non-finite, or it has zero or negative width or height.
    pub fn is_null(&self) -> bool {
        let finite = [self.xmin, self.ymin, self.xmax, self.ymax]
            .iter()
            .all(|v| v.is_finite());
        !finite || self.xmax <= self.xmin || self.ymax <= self.ymin
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Overlapping region of two extents, or `None` if they only touch or
    /// are disjoint.
    pub fn intersection(&self, other: &Extent) -> Option<Extent> {
        let overlap = Extent::new(
            self.xmin.max(other.xmin),
            self.ymin.max(other.ymin),
            self.xmax.min(other.xmax),
            self.ymax.min(other.ymax),
        );
        (!overlap.is_null()).then_some(overlap)
    }

    /// Smallest extent containing both.
    pub fn union(&self, other: &Extent) -> Extent {
        Extent::new(
            self.xmin.min(other.xmin),
            self.ymin.min(other.ymin),
            self.xmax.max(other.xmax),
            self.ymax.max(other.ymax),
        )
    }
}

impl From<[f64; 4]> for Extent {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Extent> for [f64; 4] {
    fn from(e: Extent) -> Self {
        [e.xmin, e.ymin, e.xmax, e.ymax]
    }
}

impl FromStr for Extent {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values: Vec<f64> = s
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| ParseError::Extent(s.to_string()))?;
        match values.as_slice() {
            [xmin, ymin, xmax, ymax] => Ok(Extent::new(*xmin, *ymin, *xmax, *ymax)),
            _ => Err(ParseError::Extent(s.to_string())),
        }
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.xmin, self.ymin, self.xmax, self.ymax)
    }
}

// ============================================================================
// Layers and colors
// ============================================================================

/// Opaque identifier of a map layer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(String);

impl LayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 8-bit RGBA color. Serialized as a `#rrggbbaa` hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const WHITE: Color = Color([255, 255, 255, 255]);
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl FromStr for Color {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseError::Color(s.to_string());
        let hex = s.strip_prefix('#').ok_or_else(err)?;
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(err());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
        let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
        Ok(Color([channel(0)?, channel(2)?, channel(4)?, alpha]))
    }
}

impl TryFrom<String> for Color {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}")
    }
}

// ============================================================================
// Texture format and level policy
// ============================================================================

/// Final encoding of the DDS container, as understood by `texconv -f`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextureFormat {
    /// BC7: high quality, recommended for maps.
    #[default]
    #[serde(rename = "bc7")]
    Bc7Unorm,
    /// BC1 / DXT1: highest compression, no alpha.
    #[serde(rename = "bc1")]
    Bc1Unorm,
    /// BC3 / DXT5: medium compression with alpha.
    #[serde(rename = "bc3")]
    Bc3Unorm,
    /// Uncompressed 32-bit RGBA.
    #[serde(rename = "rgba8")]
    R8g8b8a8Unorm,
}

impl TextureFormat {
    pub const ALL: [TextureFormat; 4] = [
        TextureFormat::Bc7Unorm,
        TextureFormat::Bc1Unorm,
        TextureFormat::Bc3Unorm,
        TextureFormat::R8g8b8a8Unorm,
    ];

    /// Identifier passed to the compressor tool.
    pub fn tool_name(self) -> &'static str {
        match self {
            TextureFormat::Bc7Unorm => "BC7_UNORM",
            TextureFormat::Bc1Unorm => "BC1_UNORM",
            TextureFormat::Bc3Unorm => "BC3_UNORM",
            TextureFormat::R8g8b8a8Unorm => "R8G8B8A8_UNORM",
        }
    }

    /// Short name used in config files and on the command line.
    pub fn config_name(self) -> &'static str {
        match self {
            TextureFormat::Bc7Unorm => "bc7",
            TextureFormat::Bc1Unorm => "bc1",
            TextureFormat::Bc3Unorm => "bc3",
            TextureFormat::R8g8b8a8Unorm => "rgba8",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TextureFormat::Bc7Unorm => "BC7 (high quality, recommended for maps)",
            TextureFormat::Bc1Unorm => "BC1 / DXT1 (high compression, no alpha)",
            TextureFormat::Bc3Unorm => "BC3 / DXT5 (medium compression, alpha)",
            TextureFormat::R8g8b8a8Unorm => "R8G8B8A8 (uncompressed, best quality)",
        }
    }
}

impl FromStr for TextureFormat {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        TextureFormat::ALL
            .into_iter()
            .find(|f| {
                f.config_name().eq_ignore_ascii_case(wanted)
                    || f.tool_name().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| ParseError::Format(s.to_string()))
    }
}

impl fmt::Display for TextureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tool_name())
    }
}

/// How many mip levels to produce (base image included).
///
/// In config files: `"auto"`, `"none"` (base image only) or a total count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "LevelPolicyRepr", into = "LevelPolicyRepr")]
pub enum LevelPolicy {
    /// Enough levels to shrink the larger base dimension down to 1px.
    #[default]
    Auto,
    /// Exactly this many levels. `Fixed(1)` is the base image alone.
    Fixed(u32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum LevelPolicyRepr {
    Count(u32),
    Name(String),
}

impl TryFrom<LevelPolicyRepr> for LevelPolicy {
    type Error = ParseError;

    fn try_from(repr: LevelPolicyRepr) -> Result<Self, Self::Error> {
        match repr {
            LevelPolicyRepr::Count(0) => Err(ParseError::Levels("0".to_string())),
            LevelPolicyRepr::Count(n) => Ok(LevelPolicy::Fixed(n)),
            LevelPolicyRepr::Name(name) => name.parse(),
        }
    }
}

impl From<LevelPolicy> for LevelPolicyRepr {
    fn from(policy: LevelPolicy) -> Self {
        match policy {
            LevelPolicy::Auto => LevelPolicyRepr::Name("auto".to_string()),
            LevelPolicy::Fixed(n) => LevelPolicyRepr::Count(n),
        }
    }
}

impl FromStr for LevelPolicy {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(LevelPolicy::Auto),
            "none" => Ok(LevelPolicy::Fixed(1)),
            other => match other.parse::<u32>() {
                Ok(n) if n >= 1 => Ok(LevelPolicy::Fixed(n)),
                _ => Err(ParseError::Levels(s.to_string())),
            },
        }
    }
}

impl fmt::Display for LevelPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelPolicy::Auto => f.write_str("auto"),
            LevelPolicy::Fixed(1) => f.write_str("none"),
            LevelPolicy::Fixed(n) => write!(f, "{n}"),
        }
    }
}

// ============================================================================
// Hide rules
// ============================================================================

/// Layers hidden from `threshold` onward.
///
/// A rule at threshold 2 hides its layers at level 2 and at every smaller
/// level after it. In config files the threshold is spelled `level`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HideRule {
    #[serde(rename = "level")]
    pub threshold: u32,
    pub layers: BTreeSet<LayerId>,
}

impl HideRule {
    pub fn new<I, S>(threshold: u32, layers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            threshold,
            layers: layers.into_iter().map(|s| LayerId::new(s)).collect(),
        }
    }
}

/// Parses the command-line form `LEVEL=id[,id...]`.
impl FromStr for HideRule {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseError::HideRule(s.to_string());
        let (level, ids) = s.split_once('=').ok_or_else(err)?;
        let threshold = level.trim().parse::<u32>().map_err(|_| err())?;
        let layers: BTreeSet<LayerId> = ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(LayerId::from)
            .collect();
        if layers.is_empty() {
            return Err(err());
        }
        Ok(HideRule { threshold, layers })
    }
}

// ============================================================================
// Request and per-level record
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("render extent is not set")]
    NullExtent,
    #[error("base size must be at least 1x1, got {0}x{1}")]
    ZeroSize(u32, u32),
    #[error("fixed level count must be at least 1")]
    ZeroLevelCount,
    #[error("minimum level dimension must be at least 1")]
    ZeroMinDimension,
    #[error("destination path is empty")]
    EmptyDestination,
}

/// Everything one export run needs to know.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub extent: Extent,
    pub base_width: u32,
    pub base_height: u32,
    pub levels: LevelPolicy,
    /// A level is dropped as soon as either dimension falls below this.
    pub min_dimension: u32,
    pub format: TextureFormat,
    pub hide_rules: Vec<HideRule>,
    /// Every candidate layer, top-most first. Render order follows this list.
    pub layers: Vec<LayerId>,
    /// Destination coordinate reference system handed to the renderer.
    pub crs: String,
    pub background: Color,
    /// Final `.dds` path.
    pub destination: PathBuf,
}

impl RenderRequest {
    /// Check the preconditions the planner and renderer rely on.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.extent.is_null() {
            return Err(RequestError::NullExtent);
        }
        if self.base_width == 0 || self.base_height == 0 {
            return Err(RequestError::ZeroSize(self.base_width, self.base_height));
        }
        if self.levels == LevelPolicy::Fixed(0) {
            return Err(RequestError::ZeroLevelCount);
        }
        if self.min_dimension == 0 {
            return Err(RequestError::ZeroMinDimension);
        }
        if self.destination.as_os_str().is_empty() {
            return Err(RequestError::EmptyDestination);
        }
        Ok(())
    }
}

/// One level of the mip pyramid.
///
/// Created by the planner with only its size; the orchestrator fills in the
/// visible layers and the rendered artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MipLevel {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub visible_layers: Vec<LayerId>,
    pub artifact: Option<PathBuf>,
}

impl MipLevel {
    pub fn new(index: u32, width: u32, height: u32) -> Self {
        Self {
            index,
            width,
            height,
            visible_layers: Vec::new(),
            artifact: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Extent
    // =========================================================================

    #[test]
    fn extent_parses_comma_separated() {
        let e: Extent = "0, 10.5,100,200".parse().unwrap();
        assert_eq!(e, Extent::new(0.0, 10.5, 100.0, 200.0));
        assert_eq!(e.width(), 100.0);
        assert_eq!(e.height(), 189.5);
    }

    #[test]
    fn extent_rejects_wrong_arity() {
        assert!("1,2,3".parse::<Extent>().is_err());
        assert!("a,b,c,d".parse::<Extent>().is_err());
    }

    #[test]
    fn null_extent_detection() {
        assert!(Extent::null().is_null());
        assert!(Extent::new(0.0, 0.0, 0.0, 10.0).is_null());
        assert!(Extent::new(5.0, 0.0, 1.0, 10.0).is_null());
        assert!(!Extent::new(0.0, 0.0, 1.0, 1.0).is_null());
    }

    #[test]
    fn extent_intersection_and_union() {
        let a = Extent::new(0.0, 0.0, 10.0, 10.0);
        let b = Extent::new(5.0, 5.0, 20.0, 20.0);
        assert_eq!(a.intersection(&b), Some(Extent::new(5.0, 5.0, 10.0, 10.0)));
        assert_eq!(a.union(&b), Extent::new(0.0, 0.0, 20.0, 20.0));

        let touching = Extent::new(10.0, 0.0, 20.0, 10.0);
        assert_eq!(a.intersection(&touching), None);
    }

    #[test]
    fn extent_serializes_as_array() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            extent: Extent,
        }
        let w: Wrapper = toml::from_str("extent = [1.0, 2.0, 3.0, 4.0]").unwrap();
        assert_eq!(w.extent, Extent::new(1.0, 2.0, 3.0, 4.0));
    }

    // =========================================================================
    // Color
    // =========================================================================

    #[test]
    fn color_parses_rgb_and_rgba() {
        assert_eq!("#ff8000".parse::<Color>().unwrap(), Color([255, 128, 0, 255]));
        assert_eq!("#00000080".parse::<Color>().unwrap(), Color([0, 0, 0, 128]));
    }

    #[test]
    fn color_rejects_garbage() {
        assert!("ff8000".parse::<Color>().is_err());
        assert!("#ff80".parse::<Color>().is_err());
        assert!("#gg0000".parse::<Color>().is_err());
    }

    #[test]
    fn color_display_is_rgba_hex() {
        assert_eq!(Color([1, 2, 3, 255]).to_string(), "#010203ff");
    }

    // =========================================================================
    // TextureFormat
    // =========================================================================

    #[test]
    fn format_tool_names_match_texconv() {
        let names: Vec<&str> = TextureFormat::ALL.iter().map(|f| f.tool_name()).collect();
        assert_eq!(
            names,
            vec!["BC7_UNORM", "BC1_UNORM", "BC3_UNORM", "R8G8B8A8_UNORM"]
        );
    }

    #[test]
    fn format_parses_short_and_tool_names() {
        assert_eq!("bc1".parse::<TextureFormat>().unwrap(), TextureFormat::Bc1Unorm);
        assert_eq!(
            "R8G8B8A8_UNORM".parse::<TextureFormat>().unwrap(),
            TextureFormat::R8g8b8a8Unorm
        );
        assert!("bc6h".parse::<TextureFormat>().is_err());
    }

    #[test]
    fn format_default_is_bc7() {
        assert_eq!(TextureFormat::default(), TextureFormat::Bc7Unorm);
    }

    // =========================================================================
    // LevelPolicy
    // =========================================================================

    #[test]
    fn level_policy_parses_keywords_and_counts() {
        assert_eq!("auto".parse::<LevelPolicy>().unwrap(), LevelPolicy::Auto);
        assert_eq!("none".parse::<LevelPolicy>().unwrap(), LevelPolicy::Fixed(1));
        assert_eq!("5".parse::<LevelPolicy>().unwrap(), LevelPolicy::Fixed(5));
        assert!("0".parse::<LevelPolicy>().is_err());
        assert!("lots".parse::<LevelPolicy>().is_err());
    }

    #[test]
    fn level_policy_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            levels: LevelPolicy,
        }
        let w: Wrapper = toml::from_str(r#"levels = "auto""#).unwrap();
        assert_eq!(w.levels, LevelPolicy::Auto);
        let w: Wrapper = toml::from_str("levels = 3").unwrap();
        assert_eq!(w.levels, LevelPolicy::Fixed(3));
        let w: Wrapper = toml::from_str(r#"levels = "none""#).unwrap();
        assert_eq!(w.levels, LevelPolicy::Fixed(1));
        assert!(toml::from_str::<Wrapper>("levels = 0").is_err());
    }

    // =========================================================================
    // HideRule
    // =========================================================================

    #[test]
    fn hide_rule_parses_cli_form() {
        let rule: HideRule = "2=labels, roads".parse().unwrap();
        assert_eq!(rule.threshold, 2);
        assert_eq!(rule, HideRule::new(2, ["labels", "roads"]));
    }

    #[test]
    fn hide_rule_rejects_missing_layers() {
        assert!("2=".parse::<HideRule>().is_err());
        assert!("labels".parse::<HideRule>().is_err());
        assert!("x=labels".parse::<HideRule>().is_err());
    }

    // =========================================================================
    // RenderRequest validation
    // =========================================================================

    fn request() -> RenderRequest {
        RenderRequest {
            extent: Extent::new(0.0, 0.0, 1.0, 1.0),
            base_width: 256,
            base_height: 256,
            levels: LevelPolicy::Auto,
            min_dimension: 1,
            format: TextureFormat::Bc7Unorm,
            hide_rules: vec![],
            layers: vec![LayerId::from("a")],
            crs: "EPSG:3857".to_string(),
            background: Color::WHITE,
            destination: PathBuf::from("out/map.dds"),
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn request_rejects_null_extent() {
        let mut r = request();
        r.extent = Extent::null();
        assert_eq!(r.validate(), Err(RequestError::NullExtent));
    }

    #[test]
    fn request_rejects_bad_numbers() {
        let mut r = request();
        r.base_height = 0;
        assert_eq!(r.validate(), Err(RequestError::ZeroSize(256, 0)));

        let mut r = request();
        r.levels = LevelPolicy::Fixed(0);
        assert_eq!(r.validate(), Err(RequestError::ZeroLevelCount));

        let mut r = request();
        r.min_dimension = 0;
        assert_eq!(r.validate(), Err(RequestError::ZeroMinDimension));
    }
}
