//! Pinhole ray generation.

use data_contracts::CameraTransform;

/// Focal length in pixels for a horizontal field of view (radians) and image width.
pub fn focal_from_fov(width: u32, camera_angle_x: f64) -> f64 {
    0.5 * width as f64 / (0.5 * camera_angle_x).tan()
}

/// Produces one world-space ray per pixel, row-major (`y * width + x`).
pub trait RayGenerator: Send + Sync {
    fn generate(
        &self,
        height: u32,
        width: u32,
        focal: f64,
        camera_to_world: &CameraTransform,
    ) -> (Vec<[f32; 3]>, Vec<[f32; 3]>);
}

/// Pinhole camera in the Blender/NeRF convention: looking down -z, y up,
/// principal point at the image center. Directions are not normalized.
#[derive(Debug, Clone, Copy, Default)]
pub struct PinholeRays;

impl RayGenerator for PinholeRays {
    fn generate(
        &self,
        height: u32,
        width: u32,
        focal: f64,
        camera_to_world: &CameraTransform,
    ) -> (Vec<[f32; 3]>, Vec<[f32; 3]>) {
        let r = camera_to_world.rotation();
        let t = camera_to_world.translation();
        let origin = [t[0] as f32, t[1] as f32, t[2] as f32];
        let pixels = height as usize * width as usize;
        let half_w = 0.5 * width as f64;
        let half_h = 0.5 * height as f64;

        let origins = vec![origin; pixels];
        let mut directions = Vec::with_capacity(pixels);
        for y in 0..height {
            for x in 0..width {
                let d = [
                    (x as f64 - half_w) / focal,
                    -(y as f64 - half_h) / focal,
                    -1.0,
                ];
                directions.push([
                    (r[0][0] * d[0] + r[0][1] * d[1] + r[0][2] * d[2]) as f32,
                    (r[1][0] * d[0] + r[1][1] * d[1] + r[1][2] * d[2]) as f32,
                    (r[2][0] * d[0] + r[2][1] * d[1] + r[2][2] * d[2]) as f32,
                ]);
            }
        }
        (origins, directions)
    }
}

pub(crate) fn normalize(v: [f32; 3]) -> [f32; 3] {
    let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    [v[0] / norm, v[1] / norm, v[2] / norm]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> CameraTransform {
        CameraTransform::Nested([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    #[test]
    fn focal_for_ninety_degrees_is_half_width() {
        let focal = focal_from_fov(200, std::f64::consts::FRAC_PI_2);
        assert!((focal - 100.0).abs() < 1e-9);
    }

    #[test]
    fn center_pixel_looks_down_negative_z() {
        let (origins, dirs) = PinholeRays.generate(4, 4, 2.0, &identity());
        assert_eq!(origins.len(), 16);
        // Pixel (x=2, y=2) sits on the principal point.
        assert_eq!(dirs[2 * 4 + 2], [0.0, 0.0, -1.0]);
        // Top-left pixel points left and up.
        assert_eq!(dirs[0], [-1.0, 1.0, -1.0]);
    }

    #[test]
    fn camera_pose_rotates_and_translates() {
        // 180 degrees about y, camera placed at z = 4 looking toward the origin.
        let c2w = CameraTransform::Flat([
            -1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, -1.0, 4.0, //
            0.0, 0.0, 0.0, 1.0,
        ]);
        let (origins, dirs) = PinholeRays.generate(2, 2, 1.0, &c2w);
        assert!(origins.iter().all(|o| *o == [0.0, 0.0, 4.0]));
        assert_eq!(dirs[3], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn normalize_gives_unit_length() {
        let n = normalize([3.0, 0.0, 4.0]);
        assert!((n[0] - 0.6).abs() < 1e-6);
        assert!((n[2] - 0.8).abs() < 1e-6);
    }
}
