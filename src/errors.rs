use thiserror::Error;

use crate::purpose::Purpose;

/// A result type for GP regression operations
pub type Result<T> = std::result::Result<T, GpError>;

/// An error when evaluating or learning a [`GpRegression`](crate::GpRegression) model
#[derive(Error, Debug)]
pub enum GpError {
    /// When a covariance matrix expected to be positive definite is not
    #[error("covariance matrix is not positive definite: {0}")]
    NotPositiveDefinite(String),
    /// When no data has been bound under the requested purpose
    #[error("no data bound under purpose '{0}'")]
    MissingData(Purpose),
    /// When observation, mean and covariance dimensions disagree
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
    /// When a linear algebra computation fails
    #[error(transparent)]
    LinalgError(#[from] ndarray_linalg::error::LinalgError),
}
