//! Scalar-or-batch metric results.

use serde::Serialize;

/// Result of a metric call.
///
/// Non-batchwise calls produce [`MetricValue::Single`]; batchwise calls
/// produce one entry per sample in [`MetricValue::Batch`], in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue<T> {
    /// Score of a whole (unbatched) volume.
    Single(T),
    /// Per-sample scores along the leading batch axis.
    Batch(Vec<T>),
}

impl<T> MetricValue<T> {
    /// Wraps per-sample results according to the requested mode.
    ///
    /// An unbatched call always yields exactly one sample.
    pub(crate) fn from_samples(mut samples: Vec<T>, batchwise: bool) -> Self {
        if !batchwise && samples.len() == 1 {
            if let Some(value) = samples.pop() {
                return Self::Single(value);
            }
        }
        Self::Batch(samples)
    }

    /// The single score, or `None` for batch results.
    pub const fn single(&self) -> Option<&T> {
        match self {
            Self::Single(value) => Some(value),
            Self::Batch(_) => None,
        }
    }

    /// All scores as a slice, one element for single results.
    pub fn as_slice(&self) -> &[T] {
        match self {
            Self::Single(value) => core::slice::from_ref(value),
            Self::Batch(values) => values,
        }
    }

    /// Consumes the value into a vector of per-sample scores.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Single(value) => vec![value],
            Self::Batch(values) => values,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    pub const fn is_batch(&self) -> bool {
        matches!(self, Self::Batch(_))
    }
}
