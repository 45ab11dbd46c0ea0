//! Lesion scores as Burn training metrics.
//!
//! Each [`LesionScoreMetric`] tracks one [`LesionScore`] averaged over the
//! samples of every batch, so it can be registered on a `LearnerBuilder`
//! next to the loss.

use core::marker::PhantomData;

use burn::{
    prelude::*,
    tensor::backend::Backend,
    train::metric::{
        state::{FormatOptions, NumericMetricState},
        Metric, MetricEntry, MetricMetadata, Numeric,
    },
};

use crate::{
    config::ScoringConfig,
    error::LesionMetricResult,
    input::ScoringInput,
    labeling::Connectivity,
    report::{evaluate, LesionScore},
};

/// Configuration for a [`LesionScoreMetric`].
#[derive(Config, Debug)]
pub struct LesionScoreMetricConfig {
    /// Score reported by the metric.
    pub score: LesionScore,
    #[config(default = "Connectivity::Face")]
    pub connectivity: Connectivity,
}

impl LesionScoreMetricConfig {
    pub fn init<B: Backend, const D: usize>(&self) -> LesionScoreMetric<B, D> {
        LesionScoreMetric {
            state: NumericMetricState::default(),
            score: self.score,
            scoring: ScoringConfig::new()
                .with_batchwise(true)
                .with_connectivity(self.connectivity),
            _b: PhantomData,
        }
    }
}

/// Running mean of one lesion score over training batches.
///
/// The leading axis of the input is the batch axis.
pub struct LesionScoreMetric<B: Backend, const D: usize> {
    state: NumericMetricState,
    score: LesionScore,
    scoring: ScoringConfig,
    _b: PhantomData<B>,
}

impl<B: Backend, const D: usize> LesionScoreMetric<B, D> {
    pub fn new(score: LesionScore) -> Self {
        LesionScoreMetricConfig::new(score).init()
    }

    /// Mean of the tracked score over the samples of one batch.
    fn batch_mean(&self, item: &ScoringInput<B, D>) -> LesionMetricResult<f64> {
        let reports = evaluate(
            item.targets.clone(),
            item.predictions.clone(),
            &self.scoring,
        )?;
        if reports.is_empty() {
            return Ok(0.0);
        }
        let total: f64 = reports.iter().map(|report| report.get(self.score)).sum();
        Ok(total / reports.len() as f64)
    }
}

impl<B: Backend, const D: usize> Metric for LesionScoreMetric<B, D> {
    type Input = ScoringInput<B, D>;

    fn name(&self) -> String {
        self.score.name().to_owned()
    }

    fn update(&mut self, item: &Self::Input, _metadata: &MetricMetadata) -> MetricEntry {
        let batch_size = item.predictions.dims()[0];

        match self.batch_mean(item) {
            Ok(value) => self.state.update(
                value,
                batch_size,
                FormatOptions::new(self.name()).precision(5),
            ),
            Err(err) => {
                tracing::error!(metric = %self.name(), error = %err, "failed to score batch");
                let current = self.state.value();
                MetricEntry::new(
                    self.name(),
                    format!("{current} (skipped batch)"),
                    current.to_string(),
                )
            }
        }
    }

    fn clear(&mut self) {
        self.state.reset();
    }
}

impl<B: Backend, const D: usize> Numeric for LesionScoreMetric<B, D> {
    fn value(&self) -> f64 {
        self.state.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{volume, TestBackend};
    use burn::data::dataloader::Progress;

    fn metadata() -> MetricMetadata {
        MetricMetadata {
            progress: Progress::new(1, 1),
            epoch: 0,
            epoch_total: 1,
            iteration: 0,
            lr: None,
        }
    }

    fn two_sample_batch() -> ScoringInput<TestBackend, 3> {
        #[rustfmt::skip]
        let truth = volume(&[
            1.0, 0.0, 1.0,
            1.0, 0.0, 1.0,
        ], [2, 1, 3]);
        #[rustfmt::skip]
        let prediction = volume(&[
            1.0, 0.0, 0.0,
            1.0, 0.0, 1.0,
        ], [2, 1, 3]);
        ScoringInput::new(prediction, truth)
    }

    #[test]
    fn metric_name_follows_score() {
        let metric = LesionScoreMetric::<TestBackend, 3>::new(LesionScore::WeightedAssignment);
        assert_eq!(metric.name(), "Lesion Count by Weighted Assignment");
    }

    #[test]
    fn batch_mean_averages_samples() {
        let metric = LesionScoreMetricConfig::new(LesionScore::WeightedAssignment)
            .init::<TestBackend, 3>();
        assert_eq!(metric.batch_mean(&two_sample_batch()).unwrap(), 0.75);
    }

    #[test]
    fn update_records_batch_value_and_clear_resets() {
        let mut metric = LesionScoreMetric::<TestBackend, 3>::new(LesionScore::WeightedAssignment);
        assert!(metric.value().is_nan());

        metric.update(&two_sample_batch(), &metadata());
        assert_eq!(metric.value(), 0.75);

        metric.clear();
        assert!(metric.value().is_nan());
    }

    #[test]
    fn update_with_unscorable_batch_keeps_value() {
        let mut metric = LesionScoreMetric::<TestBackend, 3>::new(LesionScore::WeightedAssignment);
        metric.update(&two_sample_batch(), &metadata());

        let mismatched = ScoringInput::new(
            volume(&[1.0; 6], [2, 1, 3]),
            volume(&[1.0; 6], [2, 3, 1]),
        );
        metric.update(&mismatched, &metadata());
        assert_eq!(metric.value(), 0.75);
    }

    #[test]
    fn batch_mean_propagates_shape_mismatch() {
        let metric = LesionScoreMetric::<TestBackend, 2>::new(LesionScore::Dice);
        let input = ScoringInput::new(volume(&[1.0; 4], [2, 2]), volume(&[1.0; 4], [4, 1]));
        assert!(metric.batch_mean(&input).is_err());
    }
}
