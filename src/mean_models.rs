//! A module for mean functions modeling the trend term of the GP model.
//!
//! In the quantitative-genetics setting the trend is a phenotype
//! intercept, so the only model implemented here is a constant offset;
//! covariate effects enter through the covariance side.

use ndarray::Array1;

use crate::errors::{GpError, Result};
use crate::purpose::{Purpose, PurposeMap};
use crate::variables::VariableSet;

/// A trait for mean functions used in GP regression.
///
/// Implementations own their hyperparameters. The maximizers driving
/// [`GpRegression::learn`](crate::GpRegression::learn) mutate that state
/// in place through `set_free`.
pub trait MeanModel {
    /// Mean vector over the data bound under `purpose`.
    fn value(&self, purpose: Purpose) -> Result<Array1<f64>>;

    /// One derivative vector per free hyperparameter, in declared order.
    fn gradient(&self, purpose: Purpose) -> Result<Vec<Array1<f64>>>;

    /// Hyperparameters owned by this function.
    fn variables(&self) -> VariableSet;

    /// Overwrite the free hyperparameters, in declared order.
    fn set_free(&mut self, values: &[f64]);
}

/// A constant mean: every bound sample gets the same offset.
#[derive(Clone, Debug, Default)]
pub struct OffsetMean {
    offset: f64,
    fixed: bool,
    sizes: PurposeMap<usize>,
}

impl OffsetMean {
    /// An offset mean starting at the given value.
    pub fn new(offset: f64) -> Self {
        OffsetMean {
            offset,
            fixed: false,
            sizes: PurposeMap::default(),
        }
    }

    /// Current offset.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Set the offset.
    pub fn set_offset(&mut self, offset: f64) {
        self.offset = offset;
    }

    /// Mark the offset as fixed: it is neither optimized nor differentiated.
    pub fn fix_offset(&mut self) {
        self.fixed = true;
    }

    /// Mark the offset as free again.
    pub fn free_offset(&mut self) {
        self.fixed = false;
    }

    /// Bind the number of samples evaluated under `purpose`.
    pub fn set_data(&mut self, nsamples: usize, purpose: Purpose) {
        self.sizes.set(purpose, nsamples);
    }

    /// Clear the binding for `purpose`.
    pub fn unset_data(&mut self, purpose: Purpose) {
        self.sizes.unset(purpose);
    }

    fn size(&self, purpose: Purpose) -> Result<usize> {
        self.sizes
            .get(purpose)
            .copied()
            .ok_or(GpError::MissingData(purpose))
    }
}

impl MeanModel for OffsetMean {
    fn value(&self, purpose: Purpose) -> Result<Array1<f64>> {
        Ok(Array1::from_elem(self.size(purpose)?, self.offset))
    }

    fn gradient(&self, purpose: Purpose) -> Result<Vec<Array1<f64>>> {
        if self.fixed {
            return Ok(vec![]);
        }
        Ok(vec![Array1::ones(self.size(purpose)?)])
    }

    fn variables(&self) -> VariableSet {
        let mut vars = VariableSet::new();
        vars.push("offset", self.offset, self.fixed);
        vars
    }

    fn set_free(&mut self, values: &[f64]) {
        if !self.fixed {
            self.offset = values[0];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_offset_value_and_gradient() {
        let mut mean = OffsetMean::new(1.5);
        mean.set_data(3, Purpose::Learn);

        assert_abs_diff_eq!(mean.value(Purpose::Learn).unwrap(), array![1.5, 1.5, 1.5]);
        let grad = mean.gradient(Purpose::Learn).unwrap();
        assert_eq!(grad.len(), 1);
        assert_abs_diff_eq!(grad[0], array![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_fixed_offset_has_no_gradient() {
        let mut mean = OffsetMean::new(0.5);
        mean.fix_offset();
        mean.set_data(4, Purpose::Learn);

        assert!(mean.gradient(Purpose::Learn).unwrap().is_empty());
        assert_eq!(mean.variables().select_free().len(), 0);

        // a fixed offset ignores write-backs
        mean.set_free(&[]);
        assert_abs_diff_eq!(mean.offset(), 0.5);
    }

    #[test]
    fn test_set_free_updates_offset() {
        let mut mean = OffsetMean::new(0.0);
        mean.set_free(&[-2.5]);
        assert_abs_diff_eq!(mean.offset(), -2.5);
    }

    #[test]
    fn test_missing_purpose_is_an_error() {
        let mean = OffsetMean::new(0.0);
        assert!(matches!(
            mean.value(Purpose::Predict),
            Err(GpError::MissingData(Purpose::Predict))
        ));
    }

    #[test]
    fn test_unset_data_clears_the_binding() {
        let mut mean = OffsetMean::new(0.0);
        mean.set_data(10, Purpose::Learn);
        mean.unset_data(Purpose::Learn);
        assert!(mean.value(Purpose::Learn).is_err());
    }
}
