//! Joint draws from the Gaussian-process prior.

use ndarray::{Array, Array1};
use ndarray_linalg::cholesky::*;
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::Normal;
use ndarray_rand::RandomExt;

use crate::cov_models::CovModel;
use crate::errors::{GpError, Result};
use crate::mean_models::MeanModel;
use crate::purpose::Purpose;

/// Samples outcomes from the prior `Normal(m, K)`, with the mean and
/// covariance evaluated under the [`Sample`](Purpose::Sample) purpose.
///
/// A draw is `m + L u` where `L` is the Cholesky factor of `K` and `u`
/// a standard-normal vector.
pub struct GpSampler<'a, M: MeanModel, C: CovModel> {
    mean: &'a M,
    cov: &'a C,
}

impl<'a, M: MeanModel, C: CovModel> GpSampler<'a, M, C> {
    /// A sampler over the given mean and covariance functions.
    pub fn new(mean: &'a M, cov: &'a C) -> Self {
        GpSampler { mean, cov }
    }

    /// Draw one joint sample using the given random generator.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Result<Array1<f64>> {
        let m = self.mean.value(Purpose::Sample)?;
        let k = self.cov.value(Purpose::Sample)?;
        let l = k
            .cholesky(UPLO::Lower)
            .map_err(|e| GpError::NotPositiveDefinite(e.to_string()))?;

        let normal = Normal::new(0., 1.).unwrap();
        let u: Array1<f64> = Array::random_using(m.len(), normal, rng);
        Ok(m + l.dot(&u))
    }
}
