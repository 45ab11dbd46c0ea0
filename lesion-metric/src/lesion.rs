//! Lesion-level agreement: region counts and weighted lesion assignment.
//!
//! Predicted and true volumes are split into connected regions. A bipartite
//! graph between predicted and true lesions is weighted by precision, and the
//! maximum-weight assignment measures how many true lesions were found and how
//! well the matched predictions sit inside them.

use burn::tensor::{backend::Backend, Tensor};
use serde::Serialize;

use crate::{
    assignment::{linear_sum_assignment, CostMatrix},
    error::LesionMetricResult,
    labeling::{label_regions, Connectivity, LabeledVolume},
    value::MetricValue,
    volume::{ensure_same_shape, BinaryVolume},
};

/// Absolute difference between the number of predicted and true regions.
///
/// Only counts are compared: two volumes with the same number of regions
/// score 0 even if the regions do not overlap at all.
///
/// # Errors
///
/// Returns [`LesionMetricError::ShapeMismatch`](crate::LesionMetricError::ShapeMismatch)
/// when the shapes differ.
pub fn simple_lesion_count_difference<B: Backend, const D: usize>(
    truth: Tensor<B, D>,
    prediction: Tensor<B, D>,
    batchwise: bool,
    connectivity: Connectivity,
) -> LesionMetricResult<MetricValue<usize>> {
    ensure_same_shape(&truth.dims(), &prediction.dims())?;
    let truth = BinaryVolume::samples(truth, batchwise)?;
    let prediction = BinaryVolume::samples(prediction, batchwise)?;

    let differences = truth
        .iter()
        .zip(&prediction)
        .map(|(truth, prediction)| {
            let true_regions = label_regions(truth, connectivity).num_regions();
            let predicted_regions = label_regions(prediction, connectivity).num_regions();
            predicted_regions.abs_diff(true_regions)
        })
        .collect();

    Ok(MetricValue::from_samples(differences, batchwise))
}

/// Lesion count by weighted assignment.
///
/// For each sample, the precision of every predicted region against every
/// true region forms a cost matrix; the maximum-weight one-to-one assignment
/// is summed and divided by the number of true regions. Values near 1 mean the
/// right number of lesions was found and they overlap the truth; lower values
/// mean missed lesions, surplus lesions, or poor overlap.
///
/// A sample without true regions scores `1.0` when nothing was predicted
/// either and `0.0` otherwise.
///
/// # Errors
///
/// Returns [`LesionMetricError::ShapeMismatch`](crate::LesionMetricError::ShapeMismatch)
/// when the shapes differ.
pub fn lesion_count_by_weighted_assignment<B: Backend, const D: usize>(
    truth: Tensor<B, D>,
    prediction: Tensor<B, D>,
    batchwise: bool,
    connectivity: Connectivity,
) -> LesionMetricResult<MetricValue<f64>> {
    ensure_same_shape(&truth.dims(), &prediction.dims())?;
    let truth = BinaryVolume::samples(truth, batchwise)?;
    let prediction = BinaryVolume::samples(prediction, batchwise)?;

    let scores = truth
        .iter()
        .zip(&prediction)
        .map(|(truth, prediction)| {
            match_lesions(truth, prediction, connectivity).map(|matching| matching.score())
        })
        .collect::<LesionMetricResult<Vec<_>>>()?;

    Ok(MetricValue::from_samples(scores, batchwise))
}

/// One assigned pair of overlapping lesions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LesionMatch {
    /// Region id in the labeled prediction.
    pub predicted: u32,
    /// Region id in the labeled truth.
    pub truth: u32,
    /// Fraction of the predicted region lying inside the true region.
    pub weight: f64,
}

/// Outcome of matching the lesions of one sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LesionMatching {
    pub predicted_regions: usize,
    pub true_regions: usize,
    /// Precision of predicted region `i + 1` against true region `j + 1`.
    pub cost: CostMatrix,
    /// Assigned pairs with positive weight, ordered by predicted id.
    pub matches: Vec<LesionMatch>,
}

impl LesionMatching {
    /// Matched weight normalized by the number of true regions.
    pub fn score(&self) -> f64 {
        if self.true_regions == 0 {
            return if self.predicted_regions == 0 { 1.0 } else { 0.0 };
        }
        let total: f64 = self.matches.iter().map(|m| m.weight).sum();
        total / self.true_regions as f64
    }

    /// Predicted region ids without an overlapping partner.
    pub fn unmatched_predicted(&self) -> Vec<u32> {
        unmatched(self.predicted_regions, self.matches.iter().map(|m| m.predicted))
    }

    /// True region ids without an overlapping partner.
    pub fn unmatched_truth(&self) -> Vec<u32> {
        unmatched(self.true_regions, self.matches.iter().map(|m| m.truth))
    }
}

fn unmatched(regions: usize, matched: impl Iterator<Item = u32>) -> Vec<u32> {
    let mut seen = vec![false; regions];
    for id in matched {
        if let Some(slot) = (id as usize).checked_sub(1).and_then(|i| seen.get_mut(i)) {
            *slot = true;
        }
    }
    seen.iter()
        .enumerate()
        .filter_map(|(index, &hit)| (!hit).then_some(index as u32 + 1))
        .collect()
}

/// Labels both volumes and solves the weighted lesion assignment.
///
/// # Errors
///
/// Returns [`LesionMetricError::ShapeMismatch`](crate::LesionMetricError::ShapeMismatch)
/// when the shapes differ.
pub fn match_lesions(
    truth: &BinaryVolume,
    prediction: &BinaryVolume,
    connectivity: Connectivity,
) -> LesionMetricResult<LesionMatching> {
    ensure_same_shape(truth.shape(), prediction.shape())?;

    let truth_labels = label_regions(truth, connectivity);
    let predicted_labels = label_regions(prediction, connectivity);
    let cost = precision_cost_matrix(&truth_labels, &predicted_labels)?;

    let matches = linear_sum_assignment(&cost, true)?
        .into_iter()
        .filter_map(|(row, col)| {
            let weight = cost.at(row, col);
            (weight > 0.0).then(|| LesionMatch {
                predicted: row as u32 + 1,
                truth: col as u32 + 1,
                weight,
            })
        })
        .collect();

    let matching = LesionMatching {
        predicted_regions: predicted_labels.num_regions(),
        true_regions: truth_labels.num_regions(),
        cost,
        matches,
    };

    tracing::debug!(
        predicted = matching.predicted_regions,
        truth = matching.true_regions,
        matched = matching.matches.len(),
        score = matching.score(),
        "weighted lesion assignment"
    );

    Ok(matching)
}

/// Builds the `predicted x truth` precision matrix.
///
/// Entry `(i, j)` is `|P_i ∩ T_j| / |P_i|`: the precision of predicted region
/// `i + 1` when true region `j + 1` is taken as the only positive class.
///
/// # Errors
///
/// Returns [`LesionMetricError::ShapeMismatch`](crate::LesionMetricError::ShapeMismatch)
/// when the labeled volumes differ in shape.
pub fn precision_cost_matrix(
    truth: &LabeledVolume,
    prediction: &LabeledVolume,
) -> LesionMetricResult<CostMatrix> {
    ensure_same_shape(truth.shape(), prediction.shape())?;

    let mut cost = CostMatrix::zeros(prediction.num_regions(), truth.num_regions());
    if cost.is_empty() {
        return Ok(cost);
    }

    for (&predicted, &actual) in prediction.labels().iter().zip(truth.labels()) {
        if predicted == 0 || actual == 0 {
            continue;
        }
        cost.add(predicted as usize - 1, actual as usize - 1, 1.0);
    }

    for (row, &size) in prediction.region_sizes().iter().enumerate() {
        cost.divide_row(row, size as f64);
    }

    Ok(cost)
}
