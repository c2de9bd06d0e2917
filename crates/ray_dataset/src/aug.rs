//! Per-sample transforms applied to (origin, direction, color) at access time.

use crate::types::RayTriple;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Maps a ray triple to a possibly augmented triple of the same shape.
///
/// Called from `SmplRayDataset::get`, possibly from several threads at once.
pub trait SampleTransform: Send + Sync {
    fn apply(&self, ray: RayTriple) -> RayTriple;
}

impl<F> SampleTransform for F
where
    F: Fn(RayTriple) -> RayTriple + Send + Sync,
{
    fn apply(&self, ray: RayTriple) -> RayTriple {
        self(ray)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

impl SampleTransform for IdentityTransform {
    fn apply(&self, ray: RayTriple) -> RayTriple {
        ray
    }
}

/// Applies transforms in order.
#[derive(Clone, Default)]
pub struct TransformChain {
    steps: Vec<Arc<dyn SampleTransform>>,
}

impl TransformChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, step: impl SampleTransform + 'static) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl SampleTransform for TransformChain {
    fn apply(&self, ray: RayTriple) -> RayTriple {
        self.steps.iter().fold(ray, |acc, step| step.apply(acc))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformPipeline {
    /// Multiplier applied to colors before noise, e.g. `1/255`.
    pub color_scale: f32,
    /// Probability of offsetting the ray origin.
    pub origin_jitter_prob: f32,
    /// Max absolute per-axis origin offset.
    pub origin_jitter_strength: f32,
    /// Probability of adding uniform noise to the color.
    pub color_noise_prob: f32,
    /// Max absolute per-channel color noise, in scaled color units.
    pub color_noise_strength: f32,
    /// When set, the random draws for a ray depend only on the seed and the ray.
    pub seed: Option<u64>,
}

impl Default for TransformPipeline {
    fn default() -> Self {
        Self {
            color_scale: 1.0,
            origin_jitter_prob: 0.0,
            origin_jitter_strength: 0.0,
            color_noise_prob: 0.0,
            color_noise_strength: 0.0,
            seed: None,
        }
    }
}

impl TransformPipeline {
    pub fn describe(&self) -> String {
        format!(
            "color_scale={:.4} origin_jitter_p={:.2} strength={:.3} color_noise_p={:.2} strength={:.3} seed={}",
            self.color_scale,
            self.origin_jitter_prob,
            self.origin_jitter_strength,
            self.color_noise_prob,
            self.color_noise_strength,
            self.seed
                .map(|s| s.to_string())
                .unwrap_or_else(|| "none".to_string())
        )
    }
}

fn ray_hash(ray: &RayTriple) -> u64 {
    ray.origin
        .iter()
        .chain(&ray.direction)
        .fold(0xcbf2_9ce4_8422_2325u64, |h, v| {
            (h ^ v.to_bits() as u64).wrapping_mul(0x0100_0000_01b3)
        })
}

impl SampleTransform for TransformPipeline {
    fn apply(&self, ray: RayTriple) -> RayTriple {
        let mut rng_local;
        let mut seeded_rng;
        let rng: &mut dyn rand::RngCore = if let Some(seed) = self.seed {
            seeded_rng = rand::rngs::StdRng::seed_from_u64(seed ^ ray_hash(&ray));
            &mut seeded_rng
        } else {
            rng_local = rand::rng();
            &mut rng_local
        };

        let mut out = ray;
        for c in out.color.iter_mut() {
            *c *= self.color_scale;
        }
        maybe_jitter_origin(
            &mut out.origin,
            self.origin_jitter_prob,
            self.origin_jitter_strength,
            rng,
        );
        maybe_color_noise(
            &mut out.color,
            self.color_noise_prob,
            self.color_noise_strength,
            rng,
        );
        out
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransformPipelineBuilder {
    inner: TransformPipeline,
}

impl TransformPipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn color_scale(mut self, scale: f32) -> Self {
        self.inner.color_scale = scale;
        self
    }
    pub fn origin_jitter(mut self, prob: f32, strength: f32) -> Self {
        self.inner.origin_jitter_prob = prob;
        self.inner.origin_jitter_strength = strength;
        self
    }
    pub fn color_noise(mut self, prob: f32, strength: f32) -> Self {
        self.inner.color_noise_prob = prob;
        self.inner.color_noise_strength = strength;
        self
    }
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.inner.seed = seed;
        self
    }
    pub fn build(self) -> TransformPipeline {
        self.inner
    }
}

pub(crate) fn maybe_jitter_origin(
    origin: &mut [f32; 3],
    prob: f32,
    strength: f32,
    rng: &mut dyn rand::RngCore,
) {
    if prob <= 0.0 || strength <= 0.0 {
        return;
    }
    if rng.random_range(0.0..1.0) >= prob {
        return;
    }
    for v in origin.iter_mut() {
        *v += rng.random_range(-strength..strength);
    }
}

pub(crate) fn maybe_color_noise(
    color: &mut [f32; 3],
    prob: f32,
    strength: f32,
    rng: &mut dyn rand::RngCore,
) {
    if prob <= 0.0 || strength <= 0.0 {
        return;
    }
    if rng.random_range(0.0..1.0) >= prob {
        return;
    }
    for v in color.iter_mut() {
        *v += rng.random_range(-strength..strength);
    }
}
