//! Per-ray training data for pose-conditioned human NeRF models.
//!
//! This crate provides utilities for:
//! - Indexing scene directories of rendered images, depth maps and warp fields
//! - Generating one camera ray per pixel from the scene manifest
//! - Serving per-ray samples with the body pose of their image
//! - Canonical body vertices from SMPL-X shape parameters
//! - Burn-compatible dataset access and batching

// Module declarations
pub mod aug;
pub mod body_model;
pub mod capture;
pub mod config;
pub mod dataset;
pub mod rays;
pub mod types;
pub mod validation;

#[cfg(feature = "burn-runtime")]
pub mod batch;

// Re-export public API
pub use aug::{
    IdentityTransform, SampleTransform, TransformChain, TransformPipeline,
    TransformPipelineBuilder,
};
pub use body_model::{BodyModel, FixedVertices, SmplxShapeModel};
pub use capture::{list_scene_files, pair_frames};
pub use config::{ColorOrder, DatasetConfig, FilePatterns};
pub use dataset::{sample_distance, SmplRayDataset, SmplRayDatasetBuilder};
pub use rays::{focal_from_fov, PinholeRays, RayGenerator};
pub use types::*;
pub use validation::{summarize_scene, validate_scene, validate_summary};

pub use data_contracts::{CameraTransform, SceneManifest};

#[cfg(feature = "burn-runtime")]
pub use batch::{RayBatch, RayBatcher};
