//! Volume shape handling and host-side binary masks.
//!
//! Elementary metrics stay on the backend and only read back one reduced
//! value per sample. Region labeling needs random access to voxels, so masks
//! are copied to host memory once per call as [`BinaryVolume`]s.

use burn::tensor::{backend::Backend, Int, Tensor};

use crate::error::{LesionMetricError, LesionMetricResult};

/// Fails fast when truth and prediction shapes differ.
pub fn ensure_same_shape(truth: &[usize], prediction: &[usize]) -> LesionMetricResult<()> {
    if truth == prediction {
        Ok(())
    } else {
        Err(LesionMetricError::ShapeMismatch {
            truth: truth.to_vec(),
            prediction: prediction.to_vec(),
        })
    }
}

/// How a tensor splits into independently scored samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SampleLayout {
    /// Number of samples (1 when not batchwise).
    pub samples: usize,
    /// Shape of one sample.
    pub sample_shape: Vec<usize>,
    /// Number of voxels in one sample.
    pub voxels: usize,
}

impl SampleLayout {
    pub fn new(dims: &[usize], batchwise: bool) -> Self {
        let (samples, sample_shape) = match dims.split_first() {
            Some((&batch, rest)) if batchwise => (batch, rest.to_vec()),
            _ => (1, dims.to_vec()),
        };
        let voxels = sample_shape.iter().product();
        Self {
            samples,
            sample_shape,
            voxels,
        }
    }

    /// True when there is nothing to put on the backend.
    pub fn is_empty(&self) -> bool {
        self.samples == 0 || self.voxels == 0
    }

    /// Reshapes a volume to `[samples, voxels]`.
    pub fn flatten<B: Backend, const D: usize>(&self, tensor: Tensor<B, D>) -> Tensor<B, 2> {
        tensor.reshape([self.samples, self.voxels])
    }
}

/// Reads a float tensor back to the host as `f64`.
pub(crate) fn float_values<B: Backend, const D: usize>(
    tensor: Tensor<B, D>,
) -> LesionMetricResult<Vec<f64>> {
    tensor
        .into_data()
        .convert::<f64>()
        .into_vec::<f64>()
        .map_err(|err| LesionMetricError::TensorData {
            reason: format!("{err:?}"),
        })
}

/// Reads an integer tensor back to the host as `i64`.
pub(crate) fn int_values<B: Backend, const D: usize>(
    tensor: Tensor<B, D, Int>,
) -> LesionMetricResult<Vec<i64>> {
    if tensor.shape().num_elements() == 0 {
        return Ok(Vec::new());
    }
    tensor
        .into_data()
        .convert::<i64>()
        .into_vec::<i64>()
        .map_err(|err| LesionMetricError::TensorData {
            reason: format!("{err:?}"),
        })
}

/// A foreground mask in host memory, row-major, nonzero voxels set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryVolume {
    shape: Vec<usize>,
    mask: Vec<bool>,
}

impl BinaryVolume {
    /// Creates a volume from a shape and its row-major mask.
    ///
    /// # Errors
    ///
    /// Returns [`LesionMetricError::InvalidShape`] when the mask length does not
    /// match the number of voxels the shape implies.
    pub fn new(shape: Vec<usize>, mask: Vec<bool>) -> LesionMetricResult<Self> {
        let expected: usize = shape.iter().product();
        if expected != mask.len() {
            return Err(LesionMetricError::InvalidShape {
                shape,
                expected,
                actual: mask.len(),
            });
        }
        Ok(Self { shape, mask })
    }

    /// Copies a tensor to the host, treating every nonzero voxel as foreground.
    pub fn from_tensor<B: Backend, const D: usize>(
        tensor: Tensor<B, D>,
    ) -> LesionMetricResult<Self> {
        let mut samples = Self::samples(tensor, false)?;
        Ok(samples.remove(0))
    }

    /// Copies a tensor to the host and splits it into per-sample volumes.
    ///
    /// With `batchwise` the leading axis indexes samples, otherwise the whole
    /// tensor is a single sample.
    pub fn samples<B: Backend, const D: usize>(
        tensor: Tensor<B, D>,
        batchwise: bool,
    ) -> LesionMetricResult<Vec<Self>> {
        let layout = SampleLayout::new(&tensor.dims(), batchwise);
        let foreground = int_values(tensor.abs().greater_elem(0.0).int())?;

        Ok((0..layout.samples)
            .map(|sample| {
                let start = sample * layout.voxels;
                let mask = foreground
                    .get(start..start + layout.voxels)
                    .map(|values| values.iter().map(|&value| value != 0).collect())
                    .unwrap_or_default();
                Self {
                    shape: layout.sample_shape.clone(),
                    mask,
                }
            })
            .collect())
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// Number of voxels, foreground or not.
    pub fn len(&self) -> usize {
        self.mask.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mask.is_empty()
    }

    /// Number of foreground voxels.
    pub fn foreground_count(&self) -> usize {
        self.mask.iter().filter(|&&voxel| voxel).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::volume;

    #[test]
    fn ensure_same_shape_mismatch_returns_error() {
        let err = ensure_same_shape(&[2, 3], &[3, 2]).unwrap_err();
        assert!(matches!(
            err,
            LesionMetricError::ShapeMismatch { ref truth, ref prediction }
                if truth == &[2, 3] && prediction == &[3, 2]
        ));
    }

    #[test]
    fn sample_layout_batchwise_splits_leading_axis() {
        let layout = SampleLayout::new(&[4, 1, 5, 5], true);
        assert_eq!(layout.samples, 4);
        assert_eq!(layout.sample_shape, vec![1, 5, 5]);
        assert_eq!(layout.voxels, 25);

        let layout = SampleLayout::new(&[4, 1, 5, 5], false);
        assert_eq!(layout.samples, 1);
        assert_eq!(layout.voxels, 100);
    }

    #[test]
    fn binary_volume_new_rejects_wrong_length() {
        let err = BinaryVolume::new(vec![2, 2], vec![true; 3]).unwrap_err();
        assert!(matches!(
            err,
            LesionMetricError::InvalidShape {
                expected: 4,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn binary_volume_from_tensor_marks_nonzero_voxels() {
        let tensor = volume(&[0.0, 0.3, -1.0, 2.0], [2, 2]);
        let binary = BinaryVolume::from_tensor(tensor).unwrap();

        assert_eq!(binary.shape(), &[2, 2]);
        assert_eq!(binary.mask(), &[false, true, true, true]);
        assert_eq!(binary.foreground_count(), 3);
    }

    #[test]
    fn binary_volume_samples_preserve_batch_order() {
        let tensor = volume(&[1.0, 0.0, 0.0, 0.0, 1.0, 1.0], [3, 2]);
        let samples = BinaryVolume::samples(tensor, true).unwrap();

        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].mask(), &[true, false]);
        assert_eq!(samples[1].mask(), &[false, false]);
        assert_eq!(samples[2].mask(), &[true, true]);
        assert!(samples.iter().all(|sample| sample.shape() == [2]));
    }
}
