//! Core types, error definitions, and data structures for ray_dataset.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, RayDatasetError>;

/// Depth value the exporter writes for pixels whose ray misses the body.
pub const NO_HIT_DEPTH: f32 = 0.0;

#[derive(Debug, Error)]
pub enum RayDatasetError {
    #[error("count mismatch: {what} (expected {expected}, found {found})")]
    CountMismatch {
        what: String,
        expected: usize,
        found: usize,
    },
    #[error("index {index} out of range for dataset of {len} rays")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json parse error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("npy read error at {path}: {source}")]
    Npy {
        path: PathBuf,
        #[source]
        source: ndarray_npy::ReadNpyError,
    },
    #[error("npz read error at {path}: {source}")]
    Npz {
        path: PathBuf,
        #[source]
        source: ndarray_npy::ReadNpzError,
    },
    #[error("manifest has no {map} entry for {key}")]
    MissingEntry { map: &'static str, key: String },
    #[error("shape error at {path}: {msg}")]
    Shape { path: PathBuf, msg: String },
    #[error("invalid manifest: {0}")]
    Manifest(#[from] data_contracts::ValidationError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("{0}")]
    Other(String),
}

impl From<data_contracts::ManifestError> for RayDatasetError {
    fn from(err: data_contracts::ManifestError) -> Self {
        match err {
            data_contracts::ManifestError::Io { path, source } => RayDatasetError::Io { path, source },
            data_contracts::ManifestError::Json { path, source } => {
                RayDatasetError::Json { path, source }
            }
            data_contracts::ManifestError::Validation { source, .. } => {
                RayDatasetError::Manifest(source)
            }
        }
    }
}

/// Origin, direction and color of one camera ray.
///
/// `direction` is not normalized; its length depends on the pixel's
/// distance from the principal point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RayTriple {
    pub origin: [f32; 3],
    pub direction: [f32; 3],
    /// In the configured channel order, RGB unless `DatasetConfig::color_order` says otherwise.
    pub color: [f32; 3],
}

/// A single training sample produced by `SmplRayDataset::get`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaySample {
    /// Point on the ray at the recorded depth, or at `far` when the ray missed the body.
    pub sample_point: [f32; 3],
    pub translation: [f32; 3],
    pub direction: [f32; 3],
    /// Goal pose of the image this ray came from.
    pub human_pose: Vec<f32>,
    /// Displacement from goal space to canonical space for `sample_point`.
    pub warp: [f32; 3],
    pub rgb: [f32; 3],
}

/// One image of a scene and its companion arrays, matched by sorted position.
#[derive(Debug, Clone)]
pub struct FrameIndex {
    /// File name of the image, used as the manifest key.
    pub key: String,
    pub image_path: PathBuf,
    pub depth_path: PathBuf,
    pub warp_path: PathBuf,
}

/// Sorted file listing of a scene directory.
#[derive(Debug, Clone, Default)]
pub struct SceneFiles {
    pub images: Vec<PathBuf>,
    pub depths: Vec<PathBuf>,
    pub warps: Vec<PathBuf>,
}

/// Figures reported once a dataset has finished loading.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadSummary {
    pub images: usize,
    pub height: u32,
    pub width: u32,
    pub focal: f32,
    pub rays: usize,
    pub pose_dim: usize,
    /// Rays whose depth equals [`NO_HIT_DEPTH`].
    pub no_hit_rays: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneSummary {
    pub image_dir: PathBuf,
    pub images: usize,
    pub depth_maps: usize,
    pub warp_maps: usize,
    pub transforms: usize,
    pub poses: usize,
    /// Images without an `image_transform_map` entry.
    pub missing_transforms: Vec<String>,
    /// Images without an `image_pose_map` entry.
    pub missing_poses: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationOutcome {
    Pass,
    Warn,
    Fail,
}

impl ValidationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationOutcome::Pass => "pass",
            ValidationOutcome::Warn => "warn",
            ValidationOutcome::Fail => "fail",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub outcome: ValidationOutcome,
    pub reasons: Vec<String>,
    pub summary: SceneSummary,
}
