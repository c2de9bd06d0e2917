//! Shared data contracts for scene manifests.

pub mod manifest;

pub use manifest::{CameraTransform, ManifestError, SceneManifest, ValidationError};
