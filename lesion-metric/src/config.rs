//! Scoring configuration.

use burn::prelude::*;

use crate::labeling::Connectivity;

/// Configuration shared by the report, aggregator, and training metrics.
///
/// Serializes to JSON through Burn's [`Config`] trait, so a run can be
/// reproduced from a saved file:
///
/// ```rust,ignore
/// use burn::config::Config;
/// use lesion_metric::{Connectivity, ScoringConfig};
///
/// let config = ScoringConfig::new()
///     .with_batchwise(true)
///     .with_connectivity(Connectivity::Full);
/// config.save("scoring.json")?;
/// let restored = ScoringConfig::load("scoring.json")?;
/// ```
#[derive(Config, Debug)]
pub struct ScoringConfig {
    /// Treat the first axis as a batch of independent samples.
    #[config(default = false)]
    pub batchwise: bool,
    /// Neighbourhood used when labeling lesions.
    #[config(default = "Connectivity::Face")]
    pub connectivity: Connectivity,
}
