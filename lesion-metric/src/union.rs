//! Voxel-wise union of two masks, e.g. to merge annotations from two raters.

use burn::tensor::{backend::Backend, Tensor};

use crate::{error::LesionMetricResult, volume::ensure_same_shape};

/// Returns a `{0, 1}` mask set wherever either input is nonzero.
///
/// # Errors
///
/// Returns [`LesionMetricError::ShapeMismatch`](crate::LesionMetricError::ShapeMismatch)
/// when the shapes differ.
pub fn mask_union<B: Backend, const D: usize>(
    a: Tensor<B, D>,
    b: Tensor<B, D>,
) -> LesionMetricResult<Tensor<B, D>> {
    ensure_same_shape(&a.dims(), &b.dims())?;

    let a = a.abs().greater_elem(0.0).float();
    let b = b.abs().greater_elem(0.0).float();
    Ok((a + b).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{tests::volume, LesionMetricError};

    #[test]
    fn mask_union_sets_voxels_present_in_either_mask() {
        let a = volume(&[1.0, 0.0, 0.0, 2.0], [2, 2]);
        let b = volume(&[0.0, 0.5, 0.0, 1.0], [2, 2]);

        let union = mask_union(a, b).unwrap();
        let values: Vec<f32> = union.to_data().iter::<f32>().collect();
        assert_eq!(values, vec![1.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn mask_union_shape_mismatch_fails() {
        let a = volume(&[1.0; 4], [4]);
        let b = volume(&[1.0; 3], [3]);
        let err = mask_union(a, b).unwrap_err();
        assert!(matches!(err, LesionMetricError::ShapeMismatch { .. }));
    }
}
