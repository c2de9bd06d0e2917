//! Indexing scene directories and loading per-frame files.

use crate::config::FilePatterns;
use crate::types::{DatasetResult, FrameIndex, RayDatasetError, SceneFiles};
use ndarray::ArrayD;
use ndarray_npy::{read_npy, ReadNpyError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

fn matches_pattern(path: &Path, prefix: &str, extensions: &[&str]) -> bool {
    let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
        return false;
    };
    if !name.starts_with(prefix) {
        return false;
    }
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .is_some_and(|ext| extensions.iter().any(|e| *e == ext))
}

/// List the image, depth and warp files of a scene directory, each set sorted independently.
pub fn list_scene_files(dir: &Path, patterns: &FilePatterns) -> DatasetResult<SceneFiles> {
    let entries = fs::read_dir(dir).map_err(|e| RayDatasetError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let image_exts: Vec<&str> = patterns
        .image_extensions
        .iter()
        .map(String::as_str)
        .collect();
    let array_ext = [patterns.array_extension.as_str()];

    let mut files = SceneFiles::default();
    for entry in entries {
        let entry = entry.map_err(|e| RayDatasetError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if matches_pattern(&path, &patterns.image_prefix, &image_exts) {
            files.images.push(path);
        } else if matches_pattern(&path, &patterns.depth_prefix, &array_ext) {
            files.depths.push(path);
        } else if matches_pattern(&path, &patterns.warp_prefix, &array_ext) {
            files.warps.push(path);
        }
    }
    files.images.sort();
    files.depths.sort();
    files.warps.sort();
    Ok(files)
}

fn check_companion_count(
    what: &str,
    images: usize,
    files: &[PathBuf],
    strict: bool,
) -> DatasetResult<()> {
    let found = files.len();
    if found == images {
        return Ok(());
    }
    if strict || found < images {
        return Err(RayDatasetError::CountMismatch {
            what: format!("{what} files vs images"),
            expected: images,
            found,
        });
    }
    warn!(
        "{} {what} files for {} images; ignoring {}",
        found,
        images,
        paths_display(&files[images..])
    );
    Ok(())
}

/// Pair every image with the depth and warp file at the same sorted position.
pub fn pair_frames(files: &SceneFiles, strict: bool) -> DatasetResult<Vec<FrameIndex>> {
    let images = files.images.len();
    check_companion_count("depth", images, &files.depths, strict)?;
    check_companion_count("warp", images, &files.warps, strict)?;

    files
        .images
        .iter()
        .zip(&files.depths)
        .zip(&files.warps)
        .map(|((image, depth), warp)| {
            Ok(FrameIndex {
                key: file_key(image)?,
                image_path: image.clone(),
                depth_path: depth.clone(),
                warp_path: warp.clone(),
            })
        })
        .collect()
}

/// Manifest key of a file: its file name.
pub fn file_key(path: &Path) -> DatasetResult<String> {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| RayDatasetError::Other(format!("non UTF-8 file name {}", path.display())))
}

pub fn image_dimensions(path: &Path) -> DatasetResult<(u32, u32)> {
    image::image_dimensions(path).map_err(|e| RayDatasetError::Image {
        path: path.to_path_buf(),
        source: e,
    })
}

pub fn load_rgb(path: &Path) -> DatasetResult<image::RgbImage> {
    let img = image::open(path).map_err(|e| RayDatasetError::Image {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(img.to_rgb8())
}

/// Load a `.npy` array as f32. Float64 arrays are narrowed.
pub fn load_array(path: &Path) -> DatasetResult<ArrayD<f32>> {
    let npy_err = |source| RayDatasetError::Npy {
        path: path.to_path_buf(),
        source,
    };
    match read_npy::<_, ArrayD<f32>>(path) {
        Ok(arr) => Ok(arr),
        Err(ReadNpyError::WrongDescriptor(_)) => {
            let wide: ArrayD<f64> = read_npy(path).map_err(npy_err)?;
            Ok(wide.mapv(|v| v as f32))
        }
        Err(e) => Err(npy_err(e)),
    }
}

/// Load a `.npy` array and check that it holds exactly `expected` elements.
pub(crate) fn load_array_with_len(path: &Path, expected: usize) -> DatasetResult<Vec<f32>> {
    let arr = load_array(path)?;
    if arr.len() != expected {
        return Err(RayDatasetError::Shape {
            path: path.to_path_buf(),
            msg: format!(
                "expected {expected} values, found {} (shape {:?})",
                arr.len(),
                arr.shape()
            ),
        });
    }
    // Standard-layout iteration order is row-major regardless of memory order.
    Ok(arr.iter().copied().collect())
}

pub(crate) fn paths_display(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .filter_map(|p| p.file_name().and_then(|s| s.to_str()))
        .collect::<Vec<_>>()
        .join(", ")
}
