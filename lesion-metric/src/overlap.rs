//! Voxel-overlap metrics: Dice coefficient and volume difference.

use burn::tensor::{backend::Backend, Tensor};

use crate::{
    error::LesionMetricResult,
    value::MetricValue,
    volume::{ensure_same_shape, float_values, SampleLayout},
};

/// Computes the Sørensen–Dice coefficient `2|A∩B| / (|A| + |B|)`.
///
/// Both volumes are clipped to `[0, 1]` so values above 1 cannot inflate the
/// score; the caller's tensors are not modified. When both volumes of a sample
/// are empty the score is `1.0`.
///
/// With `batchwise` the first axis indexes samples and one coefficient is
/// returned per sample, e.g. a `[4, 1, 20, 20, 20]` input yields 4 values.
///
/// # Errors
///
/// Returns [`LesionMetricError::ShapeMismatch`](crate::LesionMetricError::ShapeMismatch)
/// when the shapes differ.
pub fn dice_coefficient<B: Backend, const D: usize>(
    truth: Tensor<B, D>,
    prediction: Tensor<B, D>,
    batchwise: bool,
) -> LesionMetricResult<MetricValue<f64>> {
    ensure_same_shape(&truth.dims(), &prediction.dims())?;
    let layout = SampleLayout::new(&truth.dims(), batchwise);
    let scores = dice_samples(truth, prediction, &layout)?;
    Ok(MetricValue::from_samples(scores, batchwise))
}

pub(crate) fn dice_samples<B: Backend, const D: usize>(
    truth: Tensor<B, D>,
    prediction: Tensor<B, D>,
    layout: &SampleLayout,
) -> LesionMetricResult<Vec<f64>> {
    if layout.is_empty() {
        return Ok(vec![1.0; layout.samples]);
    }

    let truth = layout.flatten(truth).clamp(0.0, 1.0);
    let prediction = layout.flatten(prediction).clamp(0.0, 1.0);

    let intersections = float_values((prediction.clone() * truth.clone()).sum_dim(1))?;
    let denominators = float_values(prediction.sum_dim(1) + truth.sum_dim(1))?;

    Ok(intersections
        .into_iter()
        .zip(denominators)
        .map(|(intersection, denominator)| {
            if denominator == 0.0 {
                1.0
            } else {
                2.0 * intersection / denominator
            }
        })
        .collect())
}

/// Computes `|sum(prediction) - sum(truth)|` over raw voxel values.
///
/// # Errors
///
/// Returns [`LesionMetricError::ShapeMismatch`](crate::LesionMetricError::ShapeMismatch)
/// when the shapes differ.
pub fn volume_difference<B: Backend, const D: usize>(
    truth: Tensor<B, D>,
    prediction: Tensor<B, D>,
    batchwise: bool,
) -> LesionMetricResult<MetricValue<f64>> {
    ensure_same_shape(&truth.dims(), &prediction.dims())?;
    let layout = SampleLayout::new(&truth.dims(), batchwise);
    let differences = volume_difference_samples(truth, prediction, &layout)?;
    Ok(MetricValue::from_samples(differences, batchwise))
}

pub(crate) fn volume_difference_samples<B: Backend, const D: usize>(
    truth: Tensor<B, D>,
    prediction: Tensor<B, D>,
    layout: &SampleLayout,
) -> LesionMetricResult<Vec<f64>> {
    if layout.is_empty() {
        return Ok(vec![0.0; layout.samples]);
    }

    let truth_volumes = float_values(layout.flatten(truth).sum_dim(1))?;
    let predicted_volumes = float_values(layout.flatten(prediction).sum_dim(1))?;

    Ok(predicted_volumes
        .into_iter()
        .zip(truth_volumes)
        .map(|(predicted, truth)| (predicted - truth).abs())
        .collect())
}
