//! Input structures for lesion metrics.

use burn::{prelude::*, tensor::backend::Backend};
use derive_new::new;

/// Truth/prediction pair fed to the training metrics and the
/// [`ReportAggregator`](crate::ReportAggregator).
#[derive(new, Debug, Clone)]
pub struct ScoringInput<B: Backend, const D: usize> {
    /// Predictions with shape `[batch_size, ...]`.
    pub predictions: Tensor<B, D>,
    /// Ground truth with the same shape as `predictions`.
    pub targets: Tensor<B, D>,
}
