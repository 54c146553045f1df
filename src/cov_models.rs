//! A module for covariance functions modeling the correlated term of the
//! GP model.
//!
//! The following covariance models are implemented:
//! * linear, over a pair of marker matrices,
//! * identity ("eye"), over item identities,
//! * given, over a fixed base matrix such as a kinship matrix,
//! * sum, composing any two of the above.
//!
//! Every scaled model exposes its free variable as the log of the scale,
//! so the maximizers work on an unconstrained axis and the derivative of
//! the covariance with respect to the variable equals the covariance
//! itself.

use ndarray::{Array2, ArrayBase, Data, Ix2};

use crate::errors::{GpError, Result};
use crate::purpose::{Purpose, PurposeMap};
use crate::variables::{merge_variables, VariableSet};

/// A trait for covariance functions used in GP regression.
///
/// Implementations own their hyperparameters. The maximizers driving
/// [`GpRegression::learn`](crate::GpRegression::learn) mutate that state
/// in place through `set_free`.
pub trait CovModel {
    /// Covariance matrix over the data bound under `purpose`.
    fn value(&self, purpose: Purpose) -> Result<Array2<f64>>;

    /// One derivative matrix per free hyperparameter, in declared order.
    fn gradient(&self, purpose: Purpose) -> Result<Vec<Array2<f64>>>;

    /// Hyperparameters owned by this function.
    fn variables(&self) -> VariableSet;

    /// Overwrite the free hyperparameters, in declared order.
    fn set_free(&mut self, values: &[f64]);
}

macro_rules! declare_scaled_cov_impls {
    ($model:ident) => {
        impl $model {
            /// Current scale factor.
            pub fn scale(&self) -> f64 {
                self.logscale.exp()
            }

            /// Set the scale factor; the argument must be positive.
            pub fn set_scale(&mut self, scale: f64) {
                assert!(scale > 0.0, "covariance scale must be positive");
                self.logscale = scale.ln();
            }

            /// Mark the scale as fixed: it is neither optimized nor
            /// differentiated.
            pub fn fix_scale(&mut self) {
                self.fixed = true;
            }

            /// Mark the scale as free again.
            pub fn free_scale(&mut self) {
                self.fixed = false;
            }

            fn scale_variables(&self) -> VariableSet {
                let mut vars = VariableSet::new();
                vars.push("logscale", self.logscale, self.fixed);
                vars
            }

            fn set_free_logscale(&mut self, values: &[f64]) {
                if !self.fixed {
                    self.logscale = values[0];
                }
            }
        }
    };
}

declare_scaled_cov_impls!(LinearCov);
declare_scaled_cov_impls!(EyeCov);
declare_scaled_cov_impls!(GivenCov);

/// Linear covariance over marker matrices: `K = scale * X0 X1'`.
///
/// The Gram product is computed once at binding time; the scale is
/// applied at evaluation, so optimizer steps never touch the bound data.
#[derive(Clone, Debug)]
pub struct LinearCov {
    logscale: f64,
    fixed: bool,
    gram: PurposeMap<Array2<f64>>,
}

impl Default for LinearCov {
    fn default() -> Self {
        LinearCov {
            logscale: 0.0,
            fixed: false,
            gram: PurposeMap::default(),
        }
    }
}

impl LinearCov {
    /// A linear covariance with unit scale.
    pub fn new() -> Self {
        LinearCov::default()
    }

    /// Bind a pair of marker matrices under `purpose`.
    ///
    /// For the square purposes both arguments are the same matrix; for
    /// the cross purpose they are the training and prediction markers.
    pub fn set_data(
        &mut self,
        x0: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        x1: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        purpose: Purpose,
    ) {
        self.gram.set(purpose, x0.dot(&x1.t()));
    }

    /// Clear the binding for `purpose`.
    pub fn unset_data(&mut self, purpose: Purpose) {
        self.gram.unset(purpose);
    }
}

impl CovModel for LinearCov {
    fn value(&self, purpose: Purpose) -> Result<Array2<f64>> {
        let gram = self
            .gram
            .get(purpose)
            .ok_or(GpError::MissingData(purpose))?;
        Ok(gram * self.scale())
    }

    fn gradient(&self, purpose: Purpose) -> Result<Vec<Array2<f64>>> {
        if self.fixed {
            return Ok(vec![]);
        }
        // d K / d logscale = K
        Ok(vec![self.value(purpose)?])
    }

    fn variables(&self) -> VariableSet {
        self.scale_variables()
    }

    fn set_free(&mut self, values: &[f64]) {
        self.set_free_logscale(values);
    }
}

/// Identity covariance over item identities:
/// `K[i, j] = scale * [id0(i) == id1(j)]`.
///
/// Models homoscedastic noise shared by nothing but the item itself;
/// cross-purpose blocks over disjoint item sets are zero.
#[derive(Clone, Debug)]
pub struct EyeCov {
    logscale: f64,
    fixed: bool,
    items: PurposeMap<(Vec<usize>, Vec<usize>)>,
}

impl Default for EyeCov {
    fn default() -> Self {
        EyeCov {
            logscale: 0.0,
            fixed: false,
            items: PurposeMap::default(),
        }
    }
}

impl EyeCov {
    /// An identity covariance with unit scale.
    pub fn new() -> Self {
        EyeCov::default()
    }

    /// Bind a pair of item-id lists under `purpose`.
    pub fn set_data(&mut self, items0: &[usize], items1: &[usize], purpose: Purpose) {
        self.items.set(purpose, (items0.to_vec(), items1.to_vec()));
    }

    /// Clear the binding for `purpose`.
    pub fn unset_data(&mut self, purpose: Purpose) {
        self.items.unset(purpose);
    }
}

impl CovModel for EyeCov {
    fn value(&self, purpose: Purpose) -> Result<Array2<f64>> {
        let (items0, items1) = self
            .items
            .get(purpose)
            .ok_or(GpError::MissingData(purpose))?;
        let scale = self.scale();
        Ok(Array2::from_shape_fn(
            (items0.len(), items1.len()),
            |(i, j)| {
                if items0[i] == items1[j] {
                    scale
                } else {
                    0.0
                }
            },
        ))
    }

    fn gradient(&self, purpose: Purpose) -> Result<Vec<Array2<f64>>> {
        if self.fixed {
            return Ok(vec![]);
        }
        Ok(vec![self.value(purpose)?])
    }

    fn variables(&self) -> VariableSet {
        self.scale_variables()
    }

    fn set_free(&mut self, values: &[f64]) {
        self.set_free_logscale(values);
    }
}

/// A fixed base matrix, typically a kinship matrix, behind a learnable
/// scale: `K = scale * K0`.
#[derive(Clone, Debug)]
pub struct GivenCov {
    logscale: f64,
    fixed: bool,
    base: PurposeMap<Array2<f64>>,
}

impl Default for GivenCov {
    fn default() -> Self {
        GivenCov {
            logscale: 0.0,
            fixed: false,
            base: PurposeMap::default(),
        }
    }
}

impl GivenCov {
    /// A given covariance with unit scale.
    pub fn new() -> Self {
        GivenCov::default()
    }

    /// Bind a base matrix under `purpose`.
    pub fn set_data(&mut self, k0: &ArrayBase<impl Data<Elem = f64>, Ix2>, purpose: Purpose) {
        self.base.set(purpose, k0.to_owned());
    }

    /// Clear the binding for `purpose`.
    pub fn unset_data(&mut self, purpose: Purpose) {
        self.base.unset(purpose);
    }
}

impl CovModel for GivenCov {
    fn value(&self, purpose: Purpose) -> Result<Array2<f64>> {
        let base = self
            .base
            .get(purpose)
            .ok_or(GpError::MissingData(purpose))?;
        Ok(base * self.scale())
    }

    fn gradient(&self, purpose: Purpose) -> Result<Vec<Array2<f64>>> {
        if self.fixed {
            return Ok(vec![]);
        }
        Ok(vec![self.value(purpose)?])
    }

    fn variables(&self) -> VariableSet {
        self.scale_variables()
    }

    fn set_free(&mut self, values: &[f64]) {
        self.set_free_logscale(values);
    }
}

/// Sum of two covariance functions.
///
/// Values add, gradient sequences concatenate (left block first) and
/// variables merge under the `left`/`right` qualifiers. Data is bound on
/// the children directly.
#[derive(Clone, Debug)]
pub struct SumCov<L: CovModel, R: CovModel> {
    left: L,
    right: R,
}

impl<L: CovModel, R: CovModel> SumCov<L, R> {
    /// Compose two covariance functions.
    pub fn new(left: L, right: R) -> Self {
        SumCov { left, right }
    }

    /// Left child.
    pub fn left(&self) -> &L {
        &self.left
    }

    /// Left child, mutable, for binding data or adjusting its variables.
    pub fn left_mut(&mut self) -> &mut L {
        &mut self.left
    }

    /// Right child.
    pub fn right(&self) -> &R {
        &self.right
    }

    /// Right child, mutable, for binding data or adjusting its variables.
    pub fn right_mut(&mut self) -> &mut R {
        &mut self.right
    }
}

impl<L: CovModel, R: CovModel> CovModel for SumCov<L, R> {
    fn value(&self, purpose: Purpose) -> Result<Array2<f64>> {
        let left = self.left.value(purpose)?;
        let right = self.right.value(purpose)?;
        if left.dim() != right.dim() {
            return Err(GpError::DimensionMismatch(format!(
                "sum covariance children disagree under '{purpose}': {:?} vs {:?}",
                left.dim(),
                right.dim()
            )));
        }
        Ok(left + right)
    }

    fn gradient(&self, purpose: Purpose) -> Result<Vec<Array2<f64>>> {
        let mut grads = self.left.gradient(purpose)?;
        grads.extend(self.right.gradient(purpose)?);
        Ok(grads)
    }

    fn variables(&self) -> VariableSet {
        merge_variables(&[
            ("left", &self.left.variables()),
            ("right", &self.right.variables()),
        ])
    }

    fn set_free(&mut self, values: &[f64]) {
        let nleft = self.left.variables().select_free().len();
        self.left.set_free(&values[..nleft]);
        self.right.set_free(&values[nleft..]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_linear_value() {
        let x = array![[1.0, 0.0], [0.0, 2.0]];
        let mut cov = LinearCov::new();
        cov.set_data(&x, &x, Purpose::Learn);
        cov.set_scale(2.0);

        let expected = array![[2.0, 0.0], [0.0, 8.0]];
        assert_abs_diff_eq!(cov.value(Purpose::Learn).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_linear_cross_value_is_rectangular() {
        let x0 = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let x1 = array![[1.0, 1.0]];
        let mut cov = LinearCov::new();
        cov.set_data(&x0, &x1, Purpose::LearnPredict);

        let expected = array![[3.0], [7.0], [11.0]];
        assert_abs_diff_eq!(cov.value(Purpose::LearnPredict).unwrap(), expected);
    }

    #[test]
    fn test_logscale_gradient_equals_value() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let mut cov = LinearCov::new();
        cov.set_data(&x, &x, Purpose::Learn);
        cov.set_scale(0.5);

        let grad = cov.gradient(Purpose::Learn).unwrap();
        assert_eq!(grad.len(), 1);
        assert_abs_diff_eq!(grad[0], cov.value(Purpose::Learn).unwrap());

        cov.fix_scale();
        assert!(cov.gradient(Purpose::Learn).unwrap().is_empty());
    }

    #[test]
    fn test_eye_over_shared_and_disjoint_items() {
        let mut cov = EyeCov::new();
        cov.set_scale(0.5);
        cov.set_data(&[0, 1, 2], &[0, 1, 2], Purpose::Learn);
        cov.set_data(&[0, 1, 2], &[3, 4], Purpose::LearnPredict);

        let expected = array![[0.5, 0.0, 0.0], [0.0, 0.5, 0.0], [0.0, 0.0, 0.5]];
        assert_abs_diff_eq!(cov.value(Purpose::Learn).unwrap(), expected, epsilon = 1e-12);

        // disjoint items share no noise
        let cross = cov.value(Purpose::LearnPredict).unwrap();
        assert_eq!(cross.dim(), (3, 2));
        assert_abs_diff_eq!(cross, Array2::zeros((3, 2)));
    }

    #[test]
    fn test_given_scales_the_base_matrix() {
        let k0 = array![[2.0, 1.0], [1.0, 2.0]];
        let mut cov = GivenCov::new();
        cov.set_data(&k0, Purpose::Learn);
        cov.set_scale(3.0);

        assert_abs_diff_eq!(cov.value(Purpose::Learn).unwrap(), &k0 * 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sum_adds_values_and_concatenates_gradients() {
        let x = array![[1.0], [2.0]];
        let mut left = LinearCov::new();
        left.set_data(&x, &x, Purpose::Learn);
        let mut right = EyeCov::new();
        right.set_data(&[0, 1], &[0, 1], Purpose::Learn);
        right.set_scale(0.5);

        let cov = SumCov::new(left, right);
        let expected = array![[1.5, 2.0], [2.0, 4.5]];
        assert_abs_diff_eq!(cov.value(Purpose::Learn).unwrap(), expected, epsilon = 1e-12);

        let grads = cov.gradient(Purpose::Learn).unwrap();
        assert_eq!(grads.len(), 2);
        assert_abs_diff_eq!(grads[0], cov.left().value(Purpose::Learn).unwrap());
        assert_abs_diff_eq!(grads[1], cov.right().value(Purpose::Learn).unwrap());
    }

    #[test]
    fn test_sum_variables_and_set_free() {
        let left = LinearCov::new();
        let right = EyeCov::new();
        let mut cov = SumCov::new(left, right);

        let names: Vec<String> = cov.variables().iter().map(|v| v.name.clone()).collect();
        assert_eq!(names, ["left.logscale", "right.logscale"]);

        cov.set_free(&[2.0_f64.ln(), 3.0_f64.ln()]);
        assert_abs_diff_eq!(cov.left().scale(), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cov.right().scale(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sum_set_free_skips_fixed_children() {
        let mut left = LinearCov::new();
        left.fix_scale();
        let right = EyeCov::new();
        let mut cov = SumCov::new(left, right);

        cov.set_free(&[5.0_f64.ln()]);
        assert_abs_diff_eq!(cov.left().scale(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cov.right().scale(), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_unbound_purpose_is_an_error() {
        let cov = LinearCov::new();
        assert!(matches!(
            cov.value(Purpose::Learn),
            Err(GpError::MissingData(Purpose::Learn))
        ));
    }
}
