use thiserror::Error;

/// The error type for lesion scoring operations.
///
/// Degenerate inputs (empty masks, zero denominators, volumes without true
/// lesions) are not errors: every metric resolves them to a documented value.
/// The variants below cover inputs that cannot be scored at all.
#[derive(Error, Debug)]
pub enum LesionMetricError {
    /// Truth and prediction volumes do not share the same shape.
    #[error("Shape mismatch: truth has shape {truth:?}, prediction has shape {prediction:?}")]
    ShapeMismatch {
        /// Shape of the ground-truth volume.
        truth: Vec<usize>,
        /// Shape of the predicted volume.
        prediction: Vec<usize>,
    },

    /// A shape and the number of values supplied for it disagree.
    #[error("Invalid volume shape: shape {shape:?} needs {expected} values, got {actual}")]
    InvalidShape {
        /// The declared shape.
        shape: Vec<usize>,
        /// Number of values the shape implies.
        expected: usize,
        /// Number of values actually provided.
        actual: usize,
    },

    /// Reading tensor values back from the backend failed.
    #[error("Tensor data extraction failed: {reason}")]
    TensorData {
        /// Description of the conversion failure.
        reason: String,
    },

    /// The assignment solver was given a cost matrix it cannot solve.
    #[error("Invalid cost matrix: {reason}")]
    InvalidCostMatrix {
        /// Why the matrix was rejected.
        reason: String,
    },
}

/// A specialized `Result` type for lesion scoring operations.
pub type LesionMetricResult<T> = Result<T, LesionMetricError>;
