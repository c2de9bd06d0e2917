use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Camera-to-world transform as exported by the render pipeline.
///
/// Exporters disagree on layout: some write the matrix as 16 row-major
/// floats, others as a nested 4x4 list. Both deserialize to the same value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CameraTransform {
    Nested([[f64; 4]; 4]),
    Flat([f64; 16]),
}

impl CameraTransform {
    pub fn rows(&self) -> [[f64; 4]; 4] {
        match self {
            CameraTransform::Nested(m) => *m,
            CameraTransform::Flat(v) => {
                let mut m = [[0.0; 4]; 4];
                for (i, value) in v.iter().enumerate() {
                    m[i / 4][i % 4] = *value;
                }
                m
            }
        }
    }

    /// Upper-left 3x3 block.
    pub fn rotation(&self) -> [[f64; 3]; 3] {
        let m = self.rows();
        [
            [m[0][0], m[0][1], m[0][2]],
            [m[1][0], m[1][1], m[1][2]],
            [m[2][0], m[2][1], m[2][2]],
        ]
    }

    /// Camera center in world space.
    pub fn translation(&self) -> [f64; 3] {
        let m = self.rows();
        [m[0][3], m[1][3], m[2][3]]
    }

    pub fn is_finite(&self) -> bool {
        self.rows().iter().flatten().all(|v| v.is_finite())
    }
}

/// Scene manifest: field of view, per-image camera and body pose, and the
/// subject's shape/expression parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneManifest {
    pub camera_angle_x: f64,
    pub image_transform_map: BTreeMap<String, CameraTransform>,
    pub image_pose_map: BTreeMap<String, Vec<f32>>,
    pub expression: Vec<f32>,
    pub betas: Vec<f32>,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("camera_angle_x must be finite and inside (0, pi), got {0}")]
    InvalidFieldOfView(f64),
    #[error("transform for {0} contains non-finite values")]
    NonFiniteTransform(String),
    #[error("pose for {image} has {found} values, expected {expected}")]
    PoseLength {
        image: String,
        expected: usize,
        found: usize,
    },
    #[error("pose for {0} contains non-finite values")]
    NonFinitePose(String),
    #[error("{0} contains non-finite values")]
    NonFiniteShape(&'static str),
}

#[derive(Debug, Error)]
pub enum ManifestError {
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
    #[error("manifest {path} failed validation: {source}")]
    Validation {
        path: PathBuf,
        #[source]
        source: ValidationError,
    },
}

impl SceneManifest {
    /// Read and parse a manifest file. Does not validate; see [`SceneManifest::validate`].
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let raw = fs::read(path).map_err(|e| ManifestError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_slice(&raw).map_err(|e| ManifestError::Json {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Read, parse and validate in one step.
    pub fn load_validated(path: &Path) -> Result<Self, ManifestError> {
        let manifest = Self::load(path)?;
        manifest
            .validate()
            .map_err(|e| ManifestError::Validation {
                path: path.to_path_buf(),
                source: e,
            })?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let fov = self.camera_angle_x;
        if !fov.is_finite() || fov <= 0.0 || fov >= std::f64::consts::PI {
            return Err(ValidationError::InvalidFieldOfView(fov));
        }
        for (image, transform) in &self.image_transform_map {
            if !transform.is_finite() {
                return Err(ValidationError::NonFiniteTransform(image.clone()));
            }
        }
        let expected = self.pose_dim();
        for (image, pose) in &self.image_pose_map {
            if pose.len() != expected {
                return Err(ValidationError::PoseLength {
                    image: image.clone(),
                    expected,
                    found: pose.len(),
                });
            }
            if pose.iter().any(|v| !v.is_finite()) {
                return Err(ValidationError::NonFinitePose(image.clone()));
            }
        }
        if self.betas.iter().any(|v| !v.is_finite()) {
            return Err(ValidationError::NonFiniteShape("betas"));
        }
        if self.expression.iter().any(|v| !v.is_finite()) {
            return Err(ValidationError::NonFiniteShape("expression"));
        }
        Ok(())
    }

    /// Length of the pose vectors (taken from the first entry), 0 when no poses exist.
    pub fn pose_dim(&self) -> usize {
        self.image_pose_map
            .values()
            .next()
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn transform_for(&self, image: &str) -> Option<&CameraTransform> {
        self.image_transform_map.get(image)
    }

    pub fn pose_for(&self, image: &str) -> Option<&[f32]> {
        self.image_pose_map.get(image).map(Vec::as_slice)
    }
}
