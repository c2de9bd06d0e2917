//! The ray dataset: eager loading of a scene directory and per-ray sample access.

use crate::aug::{IdentityTransform, SampleTransform};
use crate::body_model::BodyModel;
use crate::capture::{image_dimensions, list_scene_files, load_array_with_len, load_rgb, pair_frames};
use crate::config::{ColorOrder, DatasetConfig};
use crate::rays::{focal_from_fov, normalize, PinholeRays, RayGenerator};
use crate::types::{
    DatasetResult, FrameIndex, LoadSummary, RayDatasetError, RaySample, RayTriple, NO_HIT_DEPTH,
};
use data_contracts::{CameraTransform, SceneManifest};
use ndarray::{Array1, Array2, Array3, ArrayView1, Axis};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Floats per ray row: origin, direction, color.
const RAY_ROW: usize = 9;

/// Distance along the unit ray direction at which the sample point is placed.
///
/// A depth of [`NO_HIT_DEPTH`] means the ray never hit the body, so the point
/// goes to the far bound instead.
pub fn sample_distance(depth: f32, far: f32) -> f32 {
    if depth == NO_HIT_DEPTH {
        far
    } else {
        depth
    }
}

struct FramePlan<'a> {
    frame: &'a FrameIndex,
    transform: &'a CameraTransform,
}

pub struct SmplRayDatasetBuilder {
    image_dir: PathBuf,
    manifest_path: PathBuf,
    config: DatasetConfig,
    transform: Arc<dyn SampleTransform>,
    body_model: Option<Arc<dyn BodyModel>>,
    ray_generator: Arc<dyn RayGenerator>,
}

impl SmplRayDatasetBuilder {
    pub fn new(image_dir: impl Into<PathBuf>, manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            image_dir: image_dir.into(),
            manifest_path: manifest_path.into(),
            config: DatasetConfig::default(),
            transform: Arc::new(IdentityTransform),
            body_model: None,
            ray_generator: Arc::new(PinholeRays),
        }
    }
    pub fn config(mut self, config: DatasetConfig) -> Self {
        self.config = config;
        self
    }
    pub fn transform(mut self, transform: impl SampleTransform + 'static) -> Self {
        self.transform = Arc::new(transform);
        self
    }
    pub fn body_model(mut self, model: impl BodyModel + 'static) -> Self {
        self.body_model = Some(Arc::new(model));
        self
    }
    pub fn ray_generator(mut self, generator: impl RayGenerator + 'static) -> Self {
        self.ray_generator = Arc::new(generator);
        self
    }

    pub fn build(self) -> DatasetResult<SmplRayDataset> {
        self.config.validate()?;
        let body_model = self.body_model.clone().ok_or_else(|| {
            RayDatasetError::Config("no body model set for canonical vertices".to_string())
        })?;
        let started = Instant::now();
        info!("Loading rays from {}", self.image_dir.display());

        let manifest = SceneManifest::load(&self.manifest_path)?;
        manifest.validate()?;

        let files = list_scene_files(&self.image_dir, &self.config.patterns)?;
        let transforms = manifest.image_transform_map.len();
        if files.images.len() != transforms {
            return Err(RayDatasetError::CountMismatch {
                what: "images vs image_transform_map entries".to_string(),
                expected: transforms,
                found: files.images.len(),
            });
        }
        if files.images.is_empty() {
            return Err(RayDatasetError::Other(format!(
                "no images found in {}",
                self.image_dir.display()
            )));
        }
        let frames = pair_frames(&files, self.config.strict_counts)?;

        let plans = frames
            .iter()
            .map(|frame| {
                let transform = manifest.transform_for(&frame.key).ok_or_else(|| {
                    RayDatasetError::MissingEntry {
                        map: "image_transform_map",
                        key: frame.key.clone(),
                    }
                })?;
                Ok(FramePlan { frame, transform })
            })
            .collect::<DatasetResult<Vec<_>>>()?;

        let pose_dim = manifest.pose_dim();
        let mut poses = Array2::<f32>::zeros((frames.len(), pose_dim));
        for (i, frame) in frames.iter().enumerate() {
            let pose = manifest
                .pose_for(&frame.key)
                .ok_or_else(|| RayDatasetError::MissingEntry {
                    map: "image_pose_map",
                    key: frame.key.clone(),
                })?;
            poses.row_mut(i).assign(&ArrayView1::from(pose));
        }

        let (width, height) = image_dimensions(&frames[0].image_path)?;
        if width == 0 || height == 0 {
            return Err(RayDatasetError::Shape {
                path: frames[0].image_path.clone(),
                msg: "image has zero size".to_string(),
            });
        }
        let focal = focal_from_fov(width, manifest.camera_angle_x);
        let pixels = width as usize * height as usize;
        let rows = frames.len() * pixels;

        let mut rays_buf = vec![0.0f32; rows * RAY_ROW];
        let mut depth_buf = vec![0.0f32; rows];
        let mut warp_buf = vec![0.0f32; rows * 3];

        let loader = FrameLoader {
            width,
            height,
            focal,
            color_scale: if self.config.normalize_color {
                1.0 / 255.0
            } else {
                1.0
            },
            channels: match self.config.color_order {
                ColorOrder::Rgb => [0, 1, 2],
                ColorOrder::Bgr => [2, 1, 0],
            },
            generator: self.ray_generator.as_ref(),
        };
        // Each frame owns a disjoint row range, so parallel and sequential
        // loading produce identical buffers.
        if self.config.parallel_load {
            rays_buf
                .par_chunks_mut(pixels * RAY_ROW)
                .zip(depth_buf.par_chunks_mut(pixels))
                .zip(warp_buf.par_chunks_mut(pixels * 3))
                .zip(plans.par_iter())
                .try_for_each(|(((rays, depth), warp), plan)| loader.fill(plan, rays, depth, warp))?;
        } else {
            rays_buf
                .chunks_mut(pixels * RAY_ROW)
                .zip(depth_buf.chunks_mut(pixels))
                .zip(warp_buf.chunks_mut(pixels * 3))
                .zip(plans.iter())
                .try_for_each(|(((rays, depth), warp), plan)| loader.fill(plan, rays, depth, warp))?;
        }

        let rays = Array3::from_shape_vec((rows, 3, 3), rays_buf)
            .map_err(|e| RayDatasetError::Other(e.to_string()))?;
        let depth = Array1::from_vec(depth_buf);
        let warp = Array2::from_shape_vec((rows, 3), warp_buf)
            .map_err(|e| RayDatasetError::Other(e.to_string()))?;

        let canonical_vertices = body_model.canonical_vertices(&manifest.betas, &manifest.expression)?;

        let summary = LoadSummary {
            images: frames.len(),
            height,
            width,
            focal: focal as f32,
            rays: rows,
            pose_dim,
            no_hit_rays: depth.iter().filter(|d| **d == NO_HIT_DEPTH).count(),
        };
        info!(
            "Finished loading {} rays from {} images ({}x{}, focal {:.2}, {} without body hit) in {:.2}s",
            summary.rays,
            summary.images,
            width,
            height,
            summary.focal,
            summary.no_hit_rays,
            started.elapsed().as_secs_f32()
        );

        Ok(SmplRayDataset {
            rays,
            depth,
            warp,
            poses,
            canonical_vertices,
            frame_keys: frames.into_iter().map(|f| f.key).collect(),
            betas: manifest.betas,
            expression: manifest.expression,
            far: self.config.far,
            transform: self.transform,
            summary,
        })
    }
}

struct FrameLoader<'a> {
    width: u32,
    height: u32,
    focal: f64,
    color_scale: f32,
    /// Source channel for each stored color slot.
    channels: [usize; 3],
    generator: &'a dyn RayGenerator,
}

impl FrameLoader<'_> {
    fn fill(
        &self,
        plan: &FramePlan<'_>,
        rays: &mut [f32],
        depth: &mut [f32],
        warp: &mut [f32],
    ) -> DatasetResult<()> {
        let frame = plan.frame;
        let pixels = depth.len();
        let img = load_rgb(&frame.image_path)?;
        if img.dimensions() != (self.width, self.height) {
            return Err(RayDatasetError::Shape {
                path: frame.image_path.clone(),
                msg: format!(
                    "image is {}x{}, expected {}x{} like the first image",
                    img.width(),
                    img.height(),
                    self.width,
                    self.height
                ),
            });
        }
        let (origins, directions) =
            self.generator
                .generate(self.height, self.width, self.focal, plan.transform);
        if origins.len() != pixels || directions.len() != pixels {
            return Err(RayDatasetError::Shape {
                path: frame.image_path.clone(),
                msg: format!(
                    "ray generator returned {} origins and {} directions for {pixels} pixels",
                    origins.len(),
                    directions.len()
                ),
            });
        }
        depth.copy_from_slice(&load_array_with_len(&frame.depth_path, pixels)?);
        warp.copy_from_slice(&load_array_with_len(&frame.warp_path, pixels * 3)?);

        let colors = img.as_raw().chunks_exact(3);
        for (((row, origin), direction), color) in rays
            .chunks_exact_mut(RAY_ROW)
            .zip(&origins)
            .zip(&directions)
            .zip(colors)
        {
            row[0..3].copy_from_slice(origin);
            row[3..6].copy_from_slice(direction);
            for (dst, &c) in row[6..9].iter_mut().zip(&self.channels) {
                *dst = color[c] as f32 * self.color_scale;
            }
        }
        debug!("loaded frame {}", frame.key);
        Ok(())
    }
}

/// Every pixel of every image as one training ray, paired with its depth,
/// warp vector and body pose.
///
/// Rows are ordered by sorted image, then row-major pixel. All arrays are
/// fixed at construction.
pub struct SmplRayDataset {
    /// `N x 3 x 3`: origin, direction, color.
    rays: Array3<f32>,
    depth: Array1<f32>,
    warp: Array2<f32>,
    /// One pose per image; rows resolve to their image by `row / (H * W)`.
    poses: Array2<f32>,
    canonical_vertices: Array2<f32>,
    frame_keys: Vec<String>,
    betas: Vec<f32>,
    expression: Vec<f32>,
    far: f32,
    transform: Arc<dyn SampleTransform>,
    summary: LoadSummary,
}

impl std::fmt::Debug for SmplRayDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmplRayDataset")
            .field("rays", &self.summary.rays)
            .field("images", &self.summary.images)
            .field("height", &self.summary.height)
            .field("width", &self.summary.width)
            .field("pose_dim", &self.summary.pose_dim)
            .field("far", &self.far)
            .finish()
    }
}

impl SmplRayDataset {
    pub fn builder(
        image_dir: impl Into<PathBuf>,
        manifest_path: impl Into<PathBuf>,
    ) -> SmplRayDatasetBuilder {
        SmplRayDatasetBuilder::new(image_dir, manifest_path)
    }

    /// Load with the default pinhole ray generator.
    pub fn load(
        image_dir: &Path,
        manifest_path: &Path,
        config: DatasetConfig,
        transform: impl SampleTransform + 'static,
        body_model: impl BodyModel + 'static,
    ) -> DatasetResult<Self> {
        SmplRayDatasetBuilder::new(image_dir, manifest_path)
            .config(config)
            .transform(transform)
            .body_model(body_model)
            .build()
    }

    pub fn len(&self) -> usize {
        self.depth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depth.is_empty()
    }

    pub fn get(&self, index: usize) -> DatasetResult<RaySample> {
        let len = self.len();
        if index >= len {
            return Err(RayDatasetError::IndexOutOfRange { index, len });
        }
        let row = self.rays.index_axis(Axis(0), index);
        let origin = [row[[0, 0]], row[[0, 1]], row[[0, 2]]];
        let direction = [row[[1, 0]], row[[1, 1]], row[[1, 2]]];
        let color = [row[[2, 0]], row[[2, 1]], row[[2, 2]]];

        let unit = normalize(direction);
        let distance = sample_distance(self.depth[index], self.far);
        let sample_point = [
            origin[0] + unit[0] * distance,
            origin[1] + unit[1] * distance,
            origin[2] + unit[2] * distance,
        ];

        let transformed = self.transform.apply(RayTriple {
            origin,
            direction,
            color,
        });
        let warp = self.warp.row(index);
        Ok(RaySample {
            sample_point,
            translation: transformed.origin,
            direction: transformed.direction,
            human_pose: self.pose_row(index).to_vec(),
            warp: [warp[0], warp[1], warp[2]],
            rgb: transformed.color,
        })
    }

    fn pixels_per_image(&self) -> usize {
        self.summary.height as usize * self.summary.width as usize
    }

    fn pose_row(&self, row: usize) -> ArrayView1<'_, f32> {
        self.poses.row(row / self.pixels_per_image())
    }

    /// Pose vector governing ray `row`.
    pub fn human_pose(&self, row: usize) -> Option<ArrayView1<'_, f32>> {
        (row < self.len()).then(|| self.pose_row(row))
    }

    /// Materialize the `N x pose_dim` per-ray pose array.
    pub fn human_poses(&self) -> Array2<f32> {
        let mut out = Array2::<f32>::zeros((self.len(), self.summary.pose_dim));
        let pixels = self.pixels_per_image();
        for (image, mut block) in out.axis_chunks_iter_mut(Axis(0), pixels).enumerate() {
            block.assign(&self.poses.row(image));
        }
        out
    }

    /// One pose per image, `images x pose_dim`.
    pub fn pose_table(&self) -> &Array2<f32> {
        &self.poses
    }

    pub fn rays(&self) -> &Array3<f32> {
        &self.rays
    }

    pub fn depth(&self) -> &Array1<f32> {
        &self.depth
    }

    pub fn warp(&self) -> &Array2<f32> {
        &self.warp
    }

    pub fn canonical_vertices(&self) -> &Array2<f32> {
        &self.canonical_vertices
    }

    /// Image file names in row order.
    pub fn frame_keys(&self) -> &[String] {
        &self.frame_keys
    }

    pub fn betas(&self) -> &[f32] {
        &self.betas
    }

    pub fn expression(&self) -> &[f32] {
        &self.expression
    }

    /// `(height, width)` shared by every image.
    pub fn image_size(&self) -> (u32, u32) {
        (self.summary.height, self.summary.width)
    }

    pub fn focal(&self) -> f32 {
        self.summary.focal
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn summary(&self) -> &LoadSummary {
        &self.summary
    }
}

#[cfg(feature = "burn-runtime")]
impl burn::data::dataset::Dataset<RaySample> for SmplRayDataset {
    fn get(&self, index: usize) -> Option<RaySample> {
        SmplRayDataset::get(self, index).ok()
    }

    fn len(&self) -> usize {
        SmplRayDataset::len(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_depth_uses_far_bound() {
        assert_eq!(sample_distance(NO_HIT_DEPTH, 5.0), 5.0);
        assert_eq!(sample_distance(2.5, 5.0), 2.5);
    }

    #[test]
    fn build_requires_body_model() {
        let tmp = tempfile::tempdir().unwrap();
        let err = SmplRayDatasetBuilder::new(tmp.path(), tmp.path().join("transforms.json"))
            .build()
            .unwrap_err();
        assert!(matches!(err, RayDatasetError::Config(_)));
    }
}
