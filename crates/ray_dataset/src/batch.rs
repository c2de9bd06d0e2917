//! Collating ray samples into burn tensors.

use crate::types::RaySample;
use burn::data::dataloader::batcher::Batcher;
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};

/// A batch of rays; every tensor has `batch` rows.
#[derive(Clone, Debug)]
pub struct RayBatch<B: Backend> {
    /// `[batch, 3]`
    pub sample_points: Tensor<B, 2>,
    /// `[batch, 3]`
    pub translations: Tensor<B, 2>,
    /// `[batch, 3]`
    pub directions: Tensor<B, 2>,
    /// `[batch, pose_dim]`
    pub human_poses: Tensor<B, 2>,
    /// `[batch, 3]`
    pub warps: Tensor<B, 2>,
    /// `[batch, 3]`
    pub rgb: Tensor<B, 2>,
}

#[derive(Clone, Debug, Default)]
pub struct RayBatcher;

impl RayBatcher {
    pub fn new() -> Self {
        Self
    }
}

fn vec3_tensor<B: Backend>(
    items: &[RaySample],
    field: impl Fn(&RaySample) -> [f32; 3],
    device: &B::Device,
) -> Tensor<B, 2> {
    let data: Vec<f32> = items.iter().flat_map(&field).collect();
    Tensor::<B, 2>::from_data(TensorData::new(data, [items.len(), 3]), device)
}

impl<B: Backend> Batcher<B, RaySample, RayBatch<B>> for RayBatcher {
    fn batch(&self, items: Vec<RaySample>, device: &B::Device) -> RayBatch<B> {
        let batch = items.len();
        let pose_dim = items.first().map_or(0, |s| s.human_pose.len());
        let poses: Vec<f32> = items
            .iter()
            .flat_map(|s| s.human_pose.iter().copied())
            .collect();

        RayBatch {
            sample_points: vec3_tensor(&items, |s| s.sample_point, device),
            translations: vec3_tensor(&items, |s| s.translation, device),
            directions: vec3_tensor(&items, |s| s.direction, device),
            human_poses: Tensor::<B, 2>::from_data(
                TensorData::new(poses, [batch, pose_dim]),
                device,
            ),
            warps: vec3_tensor(&items, |s| s.warp, device),
            rgb: vec3_tensor(&items, |s| s.rgb, device),
        }
    }
}
