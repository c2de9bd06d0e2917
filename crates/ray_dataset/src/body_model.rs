//! Canonical body vertices from shape and expression parameters.

use crate::types::{DatasetResult, RayDatasetError};
use ndarray::{s, Array, Array2, Array3, Axis, Dimension, OwnedRepr};
use ndarray_npy::{NpzReader, ReadNpyError, ReadNpzError};
use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// SMPL-X stores 300 shape components followed by 100 expression components in `shapedirs`.
pub const SMPLX_SHAPE_COMPONENTS: usize = 300;

/// Evaluates the body surface in canonical (rest) pose.
pub trait BodyModel: Send + Sync {
    /// Returns a `V x 3` vertex array.
    fn canonical_vertices(&self, betas: &[f32], expression: &[f32]) -> DatasetResult<Array2<f32>>;
}

impl<M: BodyModel + ?Sized> BodyModel for Box<M> {
    fn canonical_vertices(&self, betas: &[f32], expression: &[f32]) -> DatasetResult<Array2<f32>> {
        (**self).canonical_vertices(betas, expression)
    }
}

/// Vertices computed elsewhere; shape parameters are ignored.
#[derive(Debug, Clone)]
pub struct FixedVertices(pub Array2<f32>);

impl BodyModel for FixedVertices {
    fn canonical_vertices(&self, _betas: &[f32], _expression: &[f32]) -> DatasetResult<Array2<f32>> {
        Ok(self.0.clone())
    }
}

/// Shape and expression blend shapes of an SMPL-family model.
///
/// In rest pose the skinning transforms are identities, so the canonical
/// surface is the template plus the linear blend shapes.
#[derive(Debug, Clone)]
pub struct SmplxShapeModel {
    v_template: Array2<f32>,
    shape_dirs: Array3<f32>,
    expression_dirs: Option<Array3<f32>>,
}

impl SmplxShapeModel {
    pub fn new(
        v_template: Array2<f32>,
        shape_dirs: Array3<f32>,
        expression_dirs: Option<Array3<f32>>,
    ) -> DatasetResult<Self> {
        let verts = v_template.nrows();
        if v_template.ncols() != 3 {
            return Err(RayDatasetError::Other(format!(
                "v_template must be V x 3, got {:?}",
                v_template.shape()
            )));
        }
        let dirs_ok = |d: &Array3<f32>| d.shape()[0] == verts && d.shape()[1] == 3;
        if !dirs_ok(&shape_dirs) || !expression_dirs.as_ref().map_or(true, dirs_ok) {
            return Err(RayDatasetError::Other(format!(
                "blend shapes must be {verts} x 3 x K"
            )));
        }
        Ok(Self {
            v_template,
            shape_dirs,
            expression_dirs,
        })
    }

    pub fn from_npz(path: &Path) -> DatasetResult<Self> {
        let file = File::open(path).map_err(|e| RayDatasetError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut npz = NpzReader::new(file).map_err(|e| RayDatasetError::Npz {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_npz_reader(&mut npz, path.to_path_buf())
    }

    fn from_npz_reader<R: Read + Seek>(
        npz: &mut NpzReader<R>,
        path: PathBuf,
    ) -> DatasetResult<Self> {
        let names = npz.names().map_err(|source| RayDatasetError::Npz {
            path: path.clone(),
            source,
        })?;
        let v_template: Array2<f32> = read_npz_f32(npz, "v_template", &path)?;
        let full_dirs: Array3<f32> = read_npz_f32(npz, "shapedirs", &path)?;
        let (shape_dirs, expression_dirs) = if names.iter().any(|n| n == "expressiondirs") {
            let expr: Array3<f32> = read_npz_f32(npz, "expressiondirs", &path)?;
            (full_dirs, Some(expr))
        } else {
            let comps = full_dirs.len_of(Axis(2));
            if comps > SMPLX_SHAPE_COMPONENTS {
                let shape = full_dirs
                    .slice(s![.., .., ..SMPLX_SHAPE_COMPONENTS])
                    .to_owned();
                let expr = full_dirs
                    .slice(s![.., .., SMPLX_SHAPE_COMPONENTS..])
                    .to_owned();
                (shape, Some(expr))
            } else {
                (full_dirs, None)
            }
        };
        if expression_dirs.is_none() {
            warn!("no expression blend shapes in {}", path.display());
        }
        debug!(
            "body model {}: {} vertices, {} shape comps",
            path.display(),
            v_template.nrows(),
            shape_dirs.len_of(Axis(2))
        );
        Self::new(v_template, shape_dirs, expression_dirs)
    }

    pub fn num_vertices(&self) -> usize {
        self.v_template.nrows()
    }
}

/// Read an npz entry as f32. Float64 entries, as written by numpy, are narrowed.
fn read_npz_f32<R: Read + Seek, D: Dimension>(
    npz: &mut NpzReader<R>,
    name: &str,
    path: &Path,
) -> DatasetResult<Array<f32, D>> {
    let npz_err = |source| RayDatasetError::Npz {
        path: path.to_path_buf(),
        source,
    };
    match npz.by_name::<OwnedRepr<f32>, D>(name) {
        Ok(arr) => Ok(arr),
        Err(ReadNpzError::Npy(ReadNpyError::WrongDescriptor(_))) => {
            let wide = npz.by_name::<OwnedRepr<f64>, D>(name).map_err(npz_err)?;
            Ok(wide.mapv(|v| v as f32))
        }
        Err(e) => Err(npz_err(e)),
    }
}

fn add_blend(verts: &mut Array2<f32>, dirs: &Array3<f32>, coeffs: &[f32]) {
    let used = coeffs.len().min(dirs.len_of(Axis(2)));
    for (k, &c) in coeffs.iter().take(used).enumerate() {
        if c == 0.0 {
            continue;
        }
        verts.scaled_add(c, &dirs.index_axis(Axis(2), k));
    }
}

impl BodyModel for SmplxShapeModel {
    fn canonical_vertices(&self, betas: &[f32], expression: &[f32]) -> DatasetResult<Array2<f32>> {
        let mut verts = self.v_template.clone();
        add_blend(&mut verts, &self.shape_dirs, betas);
        if let Some(expr_dirs) = &self.expression_dirs {
            add_blend(&mut verts, expr_dirs, expression);
        }
        Ok(verts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use ndarray_npy::NpzWriter;

    fn two_vertex_model() -> (Array2<f32>, Array3<f32>) {
        let template = array![[0.0f32, 0.0, 0.0], [1.0, 1.0, 1.0]];
        let mut dirs = Array3::<f32>::zeros((2, 3, 2));
        dirs[[0, 0, 0]] = 1.0; // beta 0 moves vertex 0 along x
        dirs[[1, 2, 1]] = 2.0; // beta 1 moves vertex 1 along z
        (template, dirs)
    }

    #[test]
    fn blend_shapes_are_linear() {
        let (template, dirs) = two_vertex_model();
        let model = SmplxShapeModel::new(template, dirs, None).unwrap();
        let verts = model.canonical_vertices(&[0.5, 1.0], &[3.0]).unwrap();
        assert_eq!(verts, array![[0.5f32, 0.0, 0.0], [1.0, 1.0, 3.0]]);
    }

    #[test]
    fn extra_betas_are_ignored() {
        let (template, dirs) = two_vertex_model();
        let model = SmplxShapeModel::new(template.clone(), dirs, None).unwrap();
        let verts = model.canonical_vertices(&[0.0, 0.0, 9.0], &[]).unwrap();
        assert_eq!(verts, template);
    }

    #[test]
    fn loads_from_npz_with_expression_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("model.npz");
        let (template, dirs) = two_vertex_model();
        let mut expr = Array3::<f32>::zeros((2, 3, 1));
        expr[[0, 1, 0]] = 1.0;
        {
            let mut npz = NpzWriter::new(File::create(&path).unwrap());
            npz.add_array("v_template", &template).unwrap();
            npz.add_array("shapedirs", &dirs).unwrap();
            npz.add_array("expressiondirs", &expr).unwrap();
            npz.finish().unwrap();
        }
        let model = SmplxShapeModel::from_npz(&path).unwrap();
        assert_eq!(model.num_vertices(), 2);
        let verts = model.canonical_vertices(&[], &[2.0]).unwrap();
        assert_eq!(verts[[0, 1]], 2.0);
    }

    #[test]
    fn loads_float64_npz_and_splits_smplx_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("SMPLX_NEUTRAL.npz");
        let template = Array2::<f64>::from_elem((2, 3), 0.5);
        let mut dirs = Array3::<f64>::zeros((2, 3, SMPLX_SHAPE_COMPONENTS + 100));
        dirs[[0, 0, 0]] = 1.0;
        dirs[[1, 2, SMPLX_SHAPE_COMPONENTS]] = 2.0;
        {
            let mut npz = NpzWriter::new(File::create(&path).unwrap());
            npz.add_array("v_template", &template).unwrap();
            npz.add_array("shapedirs", &dirs).unwrap();
            npz.finish().unwrap();
        }
        let model = SmplxShapeModel::from_npz(&path).unwrap();
        let verts = model.canonical_vertices(&[2.0], &[1.0]).unwrap();
        assert_eq!(verts[[0, 0]], 2.5);
        assert_eq!(verts[[1, 2]], 2.5);
        assert_eq!(verts[[1, 0]], 0.5);
    }

    #[test]
    fn unreadable_expression_dirs_are_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("model.npz");
        let (template, dirs) = two_vertex_model();
        // Wrong rank: present but not a V x 3 x K array.
        let expr = Array2::<f32>::zeros((2, 3));
        {
            let mut npz = NpzWriter::new(File::create(&path).unwrap());
            npz.add_array("v_template", &template).unwrap();
            npz.add_array("shapedirs", &dirs).unwrap();
            npz.add_array("expressiondirs", &expr).unwrap();
            npz.finish().unwrap();
        }
        assert!(matches!(
            SmplxShapeModel::from_npz(&path),
            Err(RayDatasetError::Npz { .. })
        ));
    }

    #[test]
    fn mismatched_blend_shapes_rejected() {
        let template = Array2::<f32>::zeros((3, 3));
        let dirs = Array3::<f32>::zeros((2, 3, 1));
        assert!(SmplxShapeModel::new(template, dirs, None).is_err());
    }
}
