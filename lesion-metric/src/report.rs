//! Full per-sample reports and running aggregation.
//!
//! [`evaluate`] computes every metric for each sample in one pass, labeling
//! each volume only once. [`ReportAggregator`] accumulates reports across
//! calls, e.g. over an evaluation set processed in batches.

use burn::tensor::{backend::Backend, Tensor};
use serde::{Deserialize, Serialize};

use crate::{
    config::ScoringConfig,
    confusion::confusion_samples,
    error::LesionMetricResult,
    input::ScoringInput,
    labeling::label_regions,
    lesion::match_lesions,
    overlap::{dice_samples, volume_difference_samples},
    volume::{ensure_same_shape, BinaryVolume, SampleLayout},
};

/// Names one of the per-sample scores of a [`LesionReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LesionScore {
    Dice,
    VolumeDifference,
    LesionCountDifference,
    WeightedAssignment,
    Precision,
    Sensitivity,
    Specificity,
    Accuracy,
}

impl LesionScore {
    pub const ALL: [Self; 8] = [
        Self::Dice,
        Self::VolumeDifference,
        Self::LesionCountDifference,
        Self::WeightedAssignment,
        Self::Precision,
        Self::Sensitivity,
        Self::Specificity,
        Self::Accuracy,
    ];

    /// Display name used in logs and training dashboards.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dice => "Dice",
            Self::VolumeDifference => "Volume Difference",
            Self::LesionCountDifference => "Lesion Count Difference",
            Self::WeightedAssignment => "Lesion Count by Weighted Assignment",
            Self::Precision => "Precision",
            Self::Sensitivity => "Sensitivity",
            Self::Specificity => "Specificity",
            Self::Accuracy => "Accuracy",
        }
    }
}

/// Every metric for one sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LesionReport {
    pub dice: f64,
    pub volume_difference: f64,
    pub lesion_count_difference: usize,
    pub weighted_assignment: f64,
    pub precision: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    pub accuracy: f64,
    /// Number of connected regions in the truth.
    pub true_lesions: usize,
    /// Number of connected regions in the prediction.
    pub predicted_lesions: usize,
}

impl LesionReport {
    /// Value of `score` as a float.
    pub fn get(&self, score: LesionScore) -> f64 {
        match score {
            LesionScore::Dice => self.dice,
            LesionScore::VolumeDifference => self.volume_difference,
            LesionScore::LesionCountDifference => self.lesion_count_difference as f64,
            LesionScore::WeightedAssignment => self.weighted_assignment,
            LesionScore::Precision => self.precision,
            LesionScore::Sensitivity => self.sensitivity,
            LesionScore::Specificity => self.specificity,
            LesionScore::Accuracy => self.accuracy,
        }
    }
}

/// Computes a [`LesionReport`] per sample.
///
/// Returns one report when `config.batchwise` is false, otherwise one per
/// entry of the leading axis, in input order. The first failing sample fails
/// the whole call.
///
/// # Errors
///
/// Returns [`LesionMetricError::ShapeMismatch`](crate::LesionMetricError::ShapeMismatch)
/// when the shapes differ.
pub fn evaluate<B: Backend, const D: usize>(
    truth: Tensor<B, D>,
    prediction: Tensor<B, D>,
    config: &ScoringConfig,
) -> LesionMetricResult<Vec<LesionReport>> {
    ensure_same_shape(&truth.dims(), &prediction.dims())?;
    let layout = SampleLayout::new(&truth.dims(), config.batchwise);

    let dice = dice_samples(truth.clone(), prediction.clone(), &layout)?;
    let volume_differences =
        volume_difference_samples(truth.clone(), prediction.clone(), &layout)?;
    let confusion = confusion_samples(truth.clone(), prediction.clone(), &layout)?;
    let truth_masks = BinaryVolume::samples(truth, config.batchwise)?;
    let predicted_masks = BinaryVolume::samples(prediction, config.batchwise)?;

    let mut reports = Vec::with_capacity(layout.samples);
    for (sample, (truth_mask, predicted_mask)) in
        truth_masks.iter().zip(&predicted_masks).enumerate()
    {
        let matching = match_lesions(truth_mask, predicted_mask, config.connectivity)?;
        let counts = confusion[sample];

        reports.push(LesionReport {
            dice: dice[sample],
            volume_difference: volume_differences[sample],
            lesion_count_difference: matching.predicted_regions.abs_diff(matching.true_regions),
            weighted_assignment: matching.score(),
            precision: counts.precision(),
            sensitivity: counts.sensitivity(),
            specificity: counts.specificity(),
            accuracy: counts.accuracy(),
            true_lesions: matching.true_regions,
            predicted_lesions: matching.predicted_regions,
        });
    }

    tracing::debug!(
        samples = reports.len(),
        batchwise = config.batchwise,
        "evaluated lesion reports"
    );

    Ok(reports)
}

/// Number of connected lesions in each sample of a volume.
///
/// # Errors
///
/// Returns [`LesionMetricError::TensorData`](crate::LesionMetricError::TensorData)
/// when the volume cannot be read back from the backend.
pub fn lesion_counts<B: Backend, const D: usize>(
    volume: Tensor<B, D>,
    config: &ScoringConfig,
) -> LesionMetricResult<Vec<usize>> {
    Ok(BinaryVolume::samples(volume, config.batchwise)?
        .iter()
        .map(|sample| label_regions(sample, config.connectivity).num_regions())
        .collect())
}

/// Running mean of [`LesionReport`]s across calls.
#[derive(Debug, Clone)]
pub struct ReportAggregator {
    config: ScoringConfig,
    sums: [f64; LesionScore::ALL.len()],
    count: usize,
}

impl ReportAggregator {
    /// Creates an aggregator scoring batches of samples with `config`.
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            config,
            sums: [0.0; LesionScore::ALL.len()],
            count: 0,
        }
    }

    /// Scores a batch and folds its reports into the running sums.
    ///
    /// # Errors
    ///
    /// Propagates any scoring error; the aggregator is left unchanged.
    pub fn update<B: Backend, const D: usize>(
        &mut self,
        input: &ScoringInput<B, D>,
    ) -> LesionMetricResult<Vec<LesionReport>> {
        let reports = evaluate(
            input.targets.clone(),
            input.predictions.clone(),
            &self.config,
        )?;
        for report in &reports {
            self.add(report);
        }
        Ok(reports)
    }

    /// Folds a single report into the running sums.
    pub fn add(&mut self, report: &LesionReport) {
        for (sum, score) in self.sums.iter_mut().zip(LesionScore::ALL) {
            *sum += report.get(score);
        }
        self.count += 1;
    }

    /// Number of samples aggregated so far.
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Mean of `score` over all samples, `None` before the first sample.
    pub fn mean(&self, score: LesionScore) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        let index = LesionScore::ALL.iter().position(|&s| s == score)?;
        Some(self.sums[index] / self.count as f64)
    }

    /// Means of every score, in [`LesionScore::ALL`] order.
    pub fn means(&self) -> Vec<(LesionScore, f64)> {
        LesionScore::ALL
            .into_iter()
            .filter_map(|score| self.mean(score).map(|mean| (score, mean)))
            .collect()
    }

    pub fn reset(&mut self) {
        self.sums = [0.0; LesionScore::ALL.len()];
        self.count = 0;
    }
}
