//! Dataset configuration, optionally read from a TOML file.

use crate::types::{DatasetResult, RayDatasetError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name patterns of a scene directory.
///
/// Files are matched as `<prefix><anything>.<ext>` and sorted by full path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePatterns {
    pub image_prefix: String,
    pub depth_prefix: String,
    pub warp_prefix: String,
    /// Accepted image extensions, lowercase, without the dot.
    pub image_extensions: Vec<String>,
    pub array_extension: String,
}

impl Default for FilePatterns {
    fn default() -> Self {
        Self {
            image_prefix: "img_".to_string(),
            depth_prefix: "depth_".to_string(),
            warp_prefix: "warp_".to_string(),
            image_extensions: vec!["png".to_string()],
            array_extension: "npy".to_string(),
        }
    }
}

/// Channel order of stored colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorOrder {
    #[default]
    Rgb,
    /// Blue, green, red; matches exports decoded with OpenCV.
    Bgr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Distance used for the sample point of rays that miss the body.
    pub far: f32,
    /// Require depth and warp file counts to equal the image count.
    /// When false, surplus depth/warp files are ignored with a warning.
    pub strict_counts: bool,
    /// Load frames on the rayon thread pool.
    pub parallel_load: bool,
    /// Scale colors to [0, 1] instead of keeping the 0..=255 range.
    pub normalize_color: bool,
    pub color_order: ColorOrder,
    pub patterns: FilePatterns,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            far: 6.0,
            strict_counts: true,
            parallel_load: true,
            normalize_color: false,
            color_order: ColorOrder::Rgb,
            patterns: FilePatterns::default(),
        }
    }
}

impl DatasetConfig {
    pub fn with_far(mut self, far: f32) -> Self {
        self.far = far;
        self
    }

    pub fn from_toml_str(raw: &str) -> DatasetResult<Self> {
        let cfg: DatasetConfig =
            toml::from_str(raw).map_err(|e| RayDatasetError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_path(path: &Path) -> DatasetResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| RayDatasetError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> DatasetResult<()> {
        if !self.far.is_finite() || self.far <= 0.0 {
            return Err(RayDatasetError::Config(format!(
                "far must be positive and finite, got {}",
                self.far
            )));
        }
        if self.patterns.image_extensions.is_empty() {
            return Err(RayDatasetError::Config(
                "patterns.image_extensions is empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = DatasetConfig::from_toml_str(
            r#"
            far = 5.0
            parallel_load = false

            [patterns]
            image_extensions = ["png", "jpg"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.far, 5.0);
        assert!(!cfg.parallel_load);
        assert!(cfg.strict_counts);
        assert_eq!(cfg.color_order, ColorOrder::Rgb);
        assert_eq!(cfg.patterns.image_prefix, "img_");
        assert_eq!(cfg.patterns.image_extensions, vec!["png", "jpg"]);
    }

    #[test]
    fn defaults_round_trip_through_toml() {
        let cfg = DatasetConfig::default();
        let raw = toml::to_string(&cfg).unwrap();
        assert_eq!(DatasetConfig::from_toml_str(&raw).unwrap(), cfg);
    }

    #[test]
    fn color_order_parses_lowercase() {
        let cfg = DatasetConfig::from_toml_str(r#"color_order = "bgr""#).unwrap();
        assert_eq!(cfg.color_order, ColorOrder::Bgr);
        assert!(DatasetConfig::from_toml_str(r#"color_order = "hsv""#).is_err());
    }

    #[test]
    fn non_positive_far_rejected() {
        assert!(matches!(
            DatasetConfig::from_toml_str("far = 0.0"),
            Err(RayDatasetError::Config(_))
        ));
    }
}
