//! Scene consistency checks run without decoding any image or array.

use crate::capture::{file_key, list_scene_files};
use crate::config::{DatasetConfig, FilePatterns};
use crate::types::{DatasetResult, SceneSummary, ValidationOutcome, ValidationReport};
use data_contracts::SceneManifest;
use std::path::Path;

fn fail(outcome: &mut ValidationOutcome, reasons: &mut Vec<String>, reason: String) {
    *outcome = ValidationOutcome::Fail;
    reasons.push(reason);
}

fn warn(outcome: &mut ValidationOutcome, reasons: &mut Vec<String>, reason: String) {
    if *outcome == ValidationOutcome::Pass {
        *outcome = ValidationOutcome::Warn;
    }
    reasons.push(reason);
}

fn check_companions(
    label: &str,
    images: usize,
    found: usize,
    strict: bool,
    outcome: &mut ValidationOutcome,
    reasons: &mut Vec<String>,
) {
    if found < images || (strict && found != images) {
        fail(
            outcome,
            reasons,
            format!("{label}: {found} files for {images} images"),
        );
    } else if found > images {
        warn(
            outcome,
            reasons,
            format!("{label}: {} surplus files ignored", found - images),
        );
    }
}

/// Count the files of a scene and cross-check image names against the manifest.
pub fn summarize_scene(
    image_dir: &Path,
    manifest: &SceneManifest,
    patterns: &FilePatterns,
) -> DatasetResult<SceneSummary> {
    let files = list_scene_files(image_dir, patterns)?;
    let mut summary = SceneSummary {
        image_dir: image_dir.to_path_buf(),
        images: files.images.len(),
        depth_maps: files.depths.len(),
        warp_maps: files.warps.len(),
        transforms: manifest.image_transform_map.len(),
        poses: manifest.image_pose_map.len(),
        ..Default::default()
    };
    for image in &files.images {
        let key = file_key(image)?;
        if manifest.transform_for(&key).is_none() {
            summary.missing_transforms.push(key.clone());
        }
        if manifest.pose_for(&key).is_none() {
            summary.missing_poses.push(key);
        }
    }
    Ok(summary)
}

pub fn validate_summary(summary: SceneSummary, strict: bool) -> ValidationReport {
    let mut outcome = ValidationOutcome::Pass;
    let mut reasons = Vec::new();
    let images = summary.images;

    if images == 0 {
        fail(
            &mut outcome,
            &mut reasons,
            format!("no images in {}", summary.image_dir.display()),
        );
    }
    if summary.transforms != images {
        fail(
            &mut outcome,
            &mut reasons,
            format!(
                "transforms: {} entries for {images} images",
                summary.transforms
            ),
        );
    }
    if !summary.missing_transforms.is_empty() {
        fail(
            &mut outcome,
            &mut reasons,
            format!(
                "missing transforms: {}",
                summary.missing_transforms.join(", ")
            ),
        );
    }
    if !summary.missing_poses.is_empty() {
        fail(
            &mut outcome,
            &mut reasons,
            format!("missing poses: {}", summary.missing_poses.join(", ")),
        );
    }
    if summary.poses > images {
        warn(
            &mut outcome,
            &mut reasons,
            format!("poses: {} entries for {images} images", summary.poses),
        );
    }
    check_companions(
        "depth maps",
        images,
        summary.depth_maps,
        strict,
        &mut outcome,
        &mut reasons,
    );
    check_companions(
        "warp maps",
        images,
        summary.warp_maps,
        strict,
        &mut outcome,
        &mut reasons,
    );

    ValidationReport {
        outcome,
        reasons,
        summary,
    }
}

/// Load the manifest, summarize the scene and validate it with the config's strictness.
pub fn validate_scene(
    image_dir: &Path,
    manifest_path: &Path,
    config: &DatasetConfig,
) -> DatasetResult<ValidationReport> {
    let manifest = SceneManifest::load_validated(manifest_path)?;
    let summary = summarize_scene(image_dir, &manifest, &config.patterns)?;
    Ok(validate_summary(summary, config.strict_counts))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balanced(n: usize) -> SceneSummary {
        SceneSummary {
            image_dir: "scene".into(),
            images: n,
            depth_maps: n,
            warp_maps: n,
            transforms: n,
            poses: n,
            ..Default::default()
        }
    }

    #[test]
    fn balanced_scene_passes() {
        let report = validate_summary(balanced(3), true);
        assert_eq!(report.outcome, ValidationOutcome::Pass);
        assert!(report.reasons.is_empty());
    }

    #[test]
    fn surplus_depth_warns_only_when_lenient() {
        let mut summary = balanced(2);
        summary.depth_maps = 3;
        assert_eq!(
            validate_summary(summary.clone(), false).outcome,
            ValidationOutcome::Warn
        );
        assert_eq!(
            validate_summary(summary, true).outcome,
            ValidationOutcome::Fail
        );
    }

    #[test]
    fn missing_entries_fail() {
        let mut summary = balanced(2);
        summary.missing_poses.push("img_001.png".to_string());
        let report = validate_summary(summary, false);
        assert_eq!(report.outcome, ValidationOutcome::Fail);
        assert!(report.reasons[0].contains("img_001.png"));
    }

    #[test]
    fn empty_scene_fails() {
        let report = validate_summary(balanced(0), true);
        assert_eq!(report.outcome, ValidationOutcome::Fail);
        assert_eq!(report.outcome.as_str(), "fail");
    }
}
