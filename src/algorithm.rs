//! Exact Gaussian-process regression: log marginal likelihood, analytic
//! hyperparameter gradient, maximum-likelihood learning and
//! posterior-mean prediction.

use std::f64::consts::PI;
use std::time::Instant;

use log::debug;
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix2};
use ndarray_linalg::cholesky::*;
use ndarray_linalg::triangular::*;

use crate::cov_models::CovModel;
use crate::errors::{GpError, Result};
use crate::mean_models::MeanModel;
use crate::optimization::{maximize_array, maximize_scalar, Objective};
use crate::purpose::Purpose;
use crate::variables::{merge_variables, VariableSet};

/// Exact GP regression over an observation vector `y` with polymorphic
/// mean and covariance functions.
///
/// The observed outcome is modeled as a multivariate Gaussian
///
/// `y ~ Normal(m, K)`
///
/// where `m` and `K` are the mean and covariance functions evaluated over
/// the data bound under the [`Learn`](Purpose::Learn) purpose. The log
/// marginal likelihood and its gradient with respect to every free
/// hyperparameter are available in closed form; [`learn`](Self::learn)
/// drives a maximizer over them and [`predict`](Self::predict) computes
/// the posterior mean at the samples bound under the
/// [`Predict`](Purpose::Predict) purpose.
///
/// The core holds no fitted state of its own: hyperparameters live inside
/// the mean and covariance objects and `learn` mutates them in place, so
/// a single instance can be re-learned after rebinding data or adjusting
/// variables through [`mean_mut`](Self::mean_mut) /
/// [`cov_mut`](Self::cov_mut). One instance is meant for one thread;
/// parallel scans over many candidate models should build one instance
/// per worker.
#[derive(Clone, Debug)]
pub struct GpRegression<M: MeanModel, C: CovModel> {
    y: Array1<f64>,
    mean: M,
    cov: C,
}

impl<M: MeanModel, C: CovModel> GpRegression<M, C> {
    /// Build a regression over `y` with the given mean and covariance
    /// functions, validating their learn-purpose dimensions against `y`.
    pub fn new(y: Array1<f64>, mean: M, cov: C) -> Result<Self> {
        let n = y.len();
        let m = mean.value(Purpose::Learn)?;
        let k = cov.value(Purpose::Learn)?;
        if m.len() != n {
            return Err(GpError::DimensionMismatch(format!(
                "learn-purpose mean length {} does not match {} observations",
                m.len(),
                n
            )));
        }
        if k.dim() != (n, n) {
            return Err(GpError::DimensionMismatch(format!(
                "learn-purpose covariance shape {:?} does not match {} observations",
                k.dim(),
                n
            )));
        }
        Ok(GpRegression { y, mean, cov })
    }

    /// Observation vector.
    pub fn y(&self) -> &Array1<f64> {
        &self.y
    }

    /// Mean function.
    pub fn mean(&self) -> &M {
        &self.mean
    }

    /// Mean function, mutable, for rebinding data or adjusting variables.
    pub fn mean_mut(&mut self) -> &mut M {
        &mut self.mean
    }

    /// Covariance function.
    pub fn cov(&self) -> &C {
        &self.cov
    }

    /// Covariance function, mutable, for rebinding data or adjusting
    /// variables.
    pub fn cov_mut(&mut self) -> &mut C {
        &mut self.cov
    }

    /// Log marginal likelihood of `y` under the current hyperparameters:
    ///
    /// `-1/2 (log|K| + (y - m)' K^-1 (y - m) + n log(2 pi))`
    ///
    /// The covariance is factored by Cholesky; a factorization failure
    /// means `K` is not positive definite and is a fatal modeling error,
    /// never a silently wrong likelihood.
    pub fn lml(&self) -> Result<f64> {
        let (l, kiym, ym) = self.factorize_learn()?;
        let logdet = 2.0 * l.diag().mapv(f64::ln).sum();
        let n = self.y.len() as f64;
        Ok(-0.5 * (logdet + ym.dot(&kiym) + n * (2.0 * PI).ln()))
    }

    /// Gradient of [`lml`](Self::lml) with respect to every free
    /// hyperparameter: the mean-parameter block followed by the
    /// covariance-parameter block, in [`variables`](Self::variables)
    /// order.
    ///
    /// Mean entry i is `dm_i . Kiym`; covariance entry j is
    /// `1/2 (Kiym' dK_j Kiym - tr(K^-1 dK_j))` with the trace taken from
    /// the diagonal of `solve(K, dK_j)`, never from an explicit inverse.
    pub fn lml_gradient(&self) -> Result<Array1<f64>> {
        let (l, kiym, _) = self.factorize_learn()?;

        let mut grad = Vec::new();
        for dm in self.mean.gradient(Purpose::Learn)? {
            grad.push(dm.dot(&kiym));
        }
        for dk in self.cov.gradient(Purpose::Learn)? {
            let w = chol_solve(&l, &dk)?;
            let trace = w.diag().sum();
            let quad = kiym.dot(&dk.dot(&kiym));
            grad.push(0.5 * (quad - trace));
        }
        Ok(Array1::from_vec(grad))
    }

    /// The free hyperparameters of both models merged into one flat set:
    /// the mean's variables under the `mean` qualifier first, then the
    /// covariance's under `cov`, each in its owner's declared order.
    pub fn variables(&self) -> VariableSet {
        let mean_free = self.mean.variables().select_free();
        let cov_free = self.cov.variables().select_free();
        merge_variables(&[("mean", &mean_free), ("cov", &cov_free)])
    }

    /// Maximize the log marginal likelihood over the free
    /// hyperparameters, mutating the mean and covariance objects in
    /// place.
    ///
    /// Dispatch is on the number of free variables: zero is a no-op, one
    /// goes to the bracketing scalar maximizer, two or more go to the
    /// gradient-based multivariate maximizer. Optimizer non-convergence
    /// is not an error; the models keep whatever state the maximizer
    /// left.
    pub fn learn(&mut self) -> Result<()> {
        let nfree = self.variables().len();
        if nfree == 0 {
            return Ok(());
        }

        let initial = self.lml()?;
        debug!("learn: {nfree} free variable(s), initial lml = {initial:.6}");
        let now = Instant::now();
        if nfree == 1 {
            maximize_scalar(self);
        } else {
            maximize_array(self);
        }
        debug!("learn: done in {:?}", now.elapsed());
        Ok(())
    }

    /// Posterior mean at the samples bound under the predict purpose:
    ///
    /// `m_predict + K_learn_predict' Kiym`
    ///
    /// The cross covariance is requested under the
    /// [`LearnPredict`](Purpose::LearnPredict) purpose and must have been
    /// bound by the caller; nothing is mutated, so consecutive calls
    /// return identical results.
    pub fn predict(&self) -> Result<Array1<f64>> {
        let m_p = self.mean.value(Purpose::Predict)?;
        let k_lp = self.cov.value(Purpose::LearnPredict)?;
        if k_lp.nrows() != self.y.len() || k_lp.ncols() != m_p.len() {
            return Err(GpError::DimensionMismatch(format!(
                "cross covariance shape {:?} does not match {} learn and {} predict samples",
                k_lp.dim(),
                self.y.len(),
                m_p.len()
            )));
        }
        let (_, kiym, _) = self.factorize_learn()?;
        Ok(m_p + k_lp.t().dot(&kiym))
    }

    /// Factor the learn-purpose covariance and solve `K Kiym = y - m`,
    /// the one linear solve shared by likelihood, gradient and
    /// prediction.
    fn factorize_learn(&self) -> Result<(Array2<f64>, Array1<f64>, Array1<f64>)> {
        let m = self.mean.value(Purpose::Learn)?;
        let k = self.cov.value(Purpose::Learn)?;
        if m.len() != self.y.len() || k.dim() != (self.y.len(), self.y.len()) {
            return Err(GpError::DimensionMismatch(format!(
                "learn-purpose mean length {} / covariance shape {:?} against {} observations",
                m.len(),
                k.dim(),
                self.y.len()
            )));
        }

        let l = k
            .cholesky(UPLO::Lower)
            .map_err(|e| GpError::NotPositiveDefinite(e.to_string()))?;
        let ym = &self.y - &m;
        let ym_col = ym.view().insert_axis(Axis(1));
        let kiym = chol_solve(&l, &ym_col)?.remove_axis(Axis(1));
        Ok((l, kiym, ym))
    }
}

/// Solve `K x = b` given the lower Cholesky factor of `K`, by two
/// triangular solves.
fn chol_solve(
    l: &Array2<f64>,
    b: &ArrayBase<impl Data<Elem = f64>, Ix2>,
) -> Result<Array2<f64>> {
    let w = l.solve_triangular(UPLO::Lower, Diag::NonUnit, &b.to_owned())?;
    Ok(l.t().solve_triangular(UPLO::Upper, Diag::NonUnit, &w)?)
}

impl<M: MeanModel, C: CovModel> Objective for GpRegression<M, C> {
    fn value(&self) -> Result<f64> {
        self.lml()
    }

    fn gradient(&self) -> Result<Array1<f64>> {
        self.lml_gradient()
    }

    fn free_values(&self) -> Vec<f64> {
        self.variables().values()
    }

    fn set_free(&mut self, values: &[f64]) {
        let nmean = self.mean.variables().select_free().len();
        self.mean.set_free(&values[..nmean]);
        self.cov.set_free(&values[nmean..]);
    }
}
