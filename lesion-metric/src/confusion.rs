//! Confusion-matrix metrics over rounded binary volumes.
//!
//! Voxels are rounded to the nearest integer and clamped to `{0, 1}` before
//! counting. Ratios with a zero denominator score `0.0`.

use burn::tensor::{backend::Backend, Tensor};
use serde::Serialize;

use crate::{
    error::LesionMetricResult,
    value::MetricValue,
    volume::{ensure_same_shape, int_values, SampleLayout},
};

/// Voxel counts of one truth/prediction comparison, label 1 positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ConfusionCounts {
    pub true_positives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
    pub true_negatives: u64,
}

impl ConfusionCounts {
    pub const fn total(&self) -> u64 {
        self.true_positives + self.false_positives + self.false_negatives + self.true_negatives
    }

    /// `tp / (tp + fp)`.
    pub fn precision(&self) -> f64 {
        ratio(
            self.true_positives,
            self.true_positives + self.false_positives,
        )
    }

    /// `tp / (tp + fn)`, the recall of label 1.
    pub fn sensitivity(&self) -> f64 {
        ratio(
            self.true_positives,
            self.true_positives + self.false_negatives,
        )
    }

    /// `tn / (tn + fp)`, the recall of label 0.
    pub fn specificity(&self) -> f64 {
        ratio(
            self.true_negatives,
            self.true_negatives + self.false_positives,
        )
    }

    /// `(tp + tn) / total`.
    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positives + self.true_negatives, self.total())
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Counts true/false positives and negatives per sample.
///
/// # Errors
///
/// Returns [`LesionMetricError::ShapeMismatch`](crate::LesionMetricError::ShapeMismatch)
/// when the shapes differ.
pub fn confusion_counts<B: Backend, const D: usize>(
    truth: Tensor<B, D>,
    prediction: Tensor<B, D>,
    batchwise: bool,
) -> LesionMetricResult<MetricValue<ConfusionCounts>> {
    ensure_same_shape(&truth.dims(), &prediction.dims())?;
    let layout = SampleLayout::new(&truth.dims(), batchwise);
    let counts = confusion_samples(truth, prediction, &layout)?;
    Ok(MetricValue::from_samples(counts, batchwise))
}

pub(crate) fn confusion_samples<B: Backend, const D: usize>(
    truth: Tensor<B, D>,
    prediction: Tensor<B, D>,
    layout: &SampleLayout,
) -> LesionMetricResult<Vec<ConfusionCounts>> {
    if layout.is_empty() {
        return Ok(vec![ConfusionCounts::default(); layout.samples]);
    }

    let truth = layout.flatten(truth).round().clamp(0.0, 1.0);
    let prediction = layout.flatten(prediction).round().clamp(0.0, 1.0);

    let true_positives = int_values((truth.clone() * prediction.clone()).int().sum_dim(1))?;
    let predicted_positives = int_values(prediction.int().sum_dim(1))?;
    let actual_positives = int_values(truth.int().sum_dim(1))?;

    let voxels = layout.voxels as u64;
    Ok(true_positives
        .into_iter()
        .zip(predicted_positives)
        .zip(actual_positives)
        .map(|((tp, predicted), actual)| {
            let true_positives = count(tp);
            let false_positives = count(predicted).saturating_sub(true_positives);
            let false_negatives = count(actual).saturating_sub(true_positives);
            ConfusionCounts {
                true_positives,
                false_positives,
                false_negatives,
                true_negatives: voxels
                    .saturating_sub(true_positives + false_positives + false_negatives),
            }
        })
        .collect())
}

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

fn ratio_samples<B: Backend, const D: usize>(
    truth: Tensor<B, D>,
    prediction: Tensor<B, D>,
    batchwise: bool,
    score: fn(&ConfusionCounts) -> f64,
) -> LesionMetricResult<MetricValue<f64>> {
    ensure_same_shape(&truth.dims(), &prediction.dims())?;
    let layout = SampleLayout::new(&truth.dims(), batchwise);
    let scores = confusion_samples(truth, prediction, &layout)?
        .iter()
        .map(score)
        .collect();
    Ok(MetricValue::from_samples(scores, batchwise))
}

/// Precision of the prediction, `tp / (tp + fp)`; `0.0` when nothing is predicted.
///
/// # Errors
///
/// Returns [`LesionMetricError::ShapeMismatch`](crate::LesionMetricError::ShapeMismatch)
/// when the shapes differ.
pub fn precision<B: Backend, const D: usize>(
    truth: Tensor<B, D>,
    prediction: Tensor<B, D>,
    batchwise: bool,
) -> LesionMetricResult<MetricValue<f64>> {
    ratio_samples(truth, prediction, batchwise, ConfusionCounts::precision)
}

/// Sensitivity (recall) of the prediction, `tp / (tp + fn)`; `0.0` when the
/// truth has no foreground.
///
/// # Errors
///
/// Returns [`LesionMetricError::ShapeMismatch`](crate::LesionMetricError::ShapeMismatch)
/// when the shapes differ.
pub fn sensitivity<B: Backend, const D: usize>(
    truth: Tensor<B, D>,
    prediction: Tensor<B, D>,
    batchwise: bool,
) -> LesionMetricResult<MetricValue<f64>> {
    ratio_samples(truth, prediction, batchwise, ConfusionCounts::sensitivity)
}

/// Specificity of the prediction, `tn / (tn + fp)`; `0.0` when the truth has
/// no background.
///
/// # Errors
///
/// Returns [`LesionMetricError::ShapeMismatch`](crate::LesionMetricError::ShapeMismatch)
/// when the shapes differ.
pub fn specificity<B: Backend, const D: usize>(
    truth: Tensor<B, D>,
    prediction: Tensor<B, D>,
    batchwise: bool,
) -> LesionMetricResult<MetricValue<f64>> {
    ratio_samples(truth, prediction, batchwise, ConfusionCounts::specificity)
}

/// Accuracy of the prediction, `(tp + tn) / voxels`.
///
/// # Errors
///
/// Returns [`LesionMetricError::ShapeMismatch`](crate::LesionMetricError::ShapeMismatch)
/// when the shapes differ.
pub fn accuracy<B: Backend, const D: usize>(
    truth: Tensor<B, D>,
    prediction: Tensor<B, D>,
    batchwise: bool,
) -> LesionMetricResult<MetricValue<f64>> {
    ratio_samples(truth, prediction, batchwise, ConfusionCounts::accuracy)
}
