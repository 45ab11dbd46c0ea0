//! # Lesion Metrics
//!
//! Agreement metrics between a ground-truth lesion mask and a predicted mask,
//! implemented on Burn tensors.
//!
//! Masks may have any rank. Every metric takes a `batchwise` flag: when set,
//! the leading axis indexes independent samples and the metric returns one
//! value per sample; otherwise the whole tensor is scored as one sample.
//!
//! ## Metrics
//!
//! - Voxel overlap: [`dice_coefficient`], [`volume_difference`]
//! - Confusion ratios on rounded masks: [`precision`], [`sensitivity`],
//!   [`specificity`], [`accuracy`]
//! - Lesion level: [`simple_lesion_count_difference`] and
//!   [`lesion_count_by_weighted_assignment`], built on [`label_regions`] and
//!   [`linear_sum_assignment`]
//!
//! [`evaluate`] computes all of them at once and [`ReportAggregator`] keeps a
//! running mean across batches. With the `train` feature each score is also
//! available as a Burn training metric (`LesionScoreMetric`).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use burn::prelude::*;
//! use lesion_metric::{evaluate, ScoringConfig};
//!
//! # fn example<B: burn::tensor::backend::Backend>() -> lesion_metric::LesionMetricResult<()> {
//! let truth = Tensor::<B, 4>::zeros([2, 32, 32, 32], &Default::default());
//! let prediction = Tensor::<B, 4>::zeros([2, 32, 32, 32], &Default::default());
//!
//! let reports = evaluate(truth, prediction, &ScoringConfig::new().with_batchwise(true))?;
//! for report in &reports {
//!     println!("dice={} assignment={}", report.dice, report.weighted_assignment);
//! }
//! # Ok(())
//! # }
//! ```

pub mod assignment;
pub mod config;
pub mod confusion;
pub mod error;
pub mod input;
pub mod labeling;
pub mod lesion;
#[cfg(feature = "train")]
pub mod metric;
pub mod overlap;
pub mod report;
pub mod union;
pub mod value;
pub mod volume;

pub use assignment::{linear_sum_assignment, CostMatrix};
pub use config::ScoringConfig;
pub use confusion::{accuracy, confusion_counts, precision, sensitivity, specificity, ConfusionCounts};
pub use error::{LesionMetricError, LesionMetricResult};
pub use input::ScoringInput;
pub use labeling::{count_regions, label_regions, Connectivity, LabeledVolume};
pub use lesion::{
    lesion_count_by_weighted_assignment, match_lesions, precision_cost_matrix,
    simple_lesion_count_difference, LesionMatch, LesionMatching,
};
#[cfg(feature = "train")]
pub use metric::{LesionScoreMetric, LesionScoreMetricConfig};
pub use overlap::{dice_coefficient, volume_difference};
pub use report::{evaluate, lesion_counts, LesionReport, LesionScore, ReportAggregator};
pub use union::mask_union;
pub use value::MetricValue;
pub use volume::{ensure_same_shape, BinaryVolume};
