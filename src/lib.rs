//! This library implements exact [Gaussian process](https://en.wikipedia.org/wiki/Gaussian_process)
//! regression for quantitative-genetics workloads such as narrow-sense
//! heritability estimation and QTL association scans: closed-form log
//! marginal likelihood, its analytic gradient with respect to mean and
//! covariance hyperparameters, maximum-likelihood hyperparameter learning
//! and posterior-mean prediction.
//!
//! Mean and covariance functions are polymorphic objects bound to data
//! under named [purposes](Purpose) (sample, learn, predict,
//! learn_predict); rebinding one purpose never invalidates another.
//! Hyperparameters live inside the model objects and are mutated in place
//! by [`GpRegression::learn`], which runs a bracketing Brent search for a
//! single free variable and a BFGS optimizer with Wolfe line search for
//! two or more.
//!
//! The typical genetics setup builds a
//! [`LinearCov`](cov_models::LinearCov) over a marker matrix, optionally
//! summed with an [`EyeCov`](cov_models::EyeCov) noise term or a
//! [`GivenCov`](cov_models::GivenCov) kinship matrix, puts an
//! [`OffsetMean`](mean_models::OffsetMean) intercept on the phenotype and
//! learns the scales that maximize the likelihood of the observations.
//!
//! # Example
//!
//! ```no_run
//! use gpreg::cov_models::LinearCov;
//! use gpreg::mean_models::OffsetMean;
//! use gpreg::{GpRegression, Purpose};
//! use ndarray::{Array1, Array2};
//!
//! let markers = Array2::<f64>::eye(50);
//! let phenotype = Array1::linspace(-1.0, 1.0, 50);
//!
//! let mut mean = OffsetMean::new(0.0);
//! mean.set_data(50, Purpose::Learn);
//! let mut cov = LinearCov::new();
//! cov.set_data(&markers, &markers, Purpose::Learn);
//!
//! let mut gp = GpRegression::new(phenotype, mean, cov).expect("consistent dimensions");
//! gp.learn().expect("learnable model");
//! println!("lml = {}", gp.lml().expect("positive definite covariance"));
//! ```
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

mod algorithm;
pub mod cov_models;
mod errors;
pub mod mean_models;
mod optimization;
mod purpose;
mod sampler;
mod variables;

pub use algorithm::*;
pub use errors::*;
pub use optimization::{maximize_array, maximize_scalar, Objective};
pub use purpose::Purpose;
pub use sampler::GpSampler;
pub use variables::{merge_variables, Variable, VariableSet};
