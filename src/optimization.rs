//! Scalar and multivariate maximizers driving hyperparameter learning.
//!
//! Both entry points operate on ambient mutable state: the objective has
//! no parameter-vector argument, proposed points are written into the
//! owning models through [`Objective::set_free`] and the models are left
//! in the optimized state on return.

use std::cell::RefCell;

use log::{debug, warn};
use ndarray::Array1;
use wolfe_bfgs::{Bfgs, BfgsSolution};

use crate::errors::Result;

/// Objective value substituted when an evaluation fails or is not finite,
/// large enough to push any line search away from the offending region.
const PENALTY: f64 = 1e10;

/// Relative tolerance of the scalar maximizer.
const SCALAR_TOL: f64 = 1e-8;
/// Iteration budget of the scalar maximizer.
const SCALAR_MAX_ITER: usize = 100;
/// Expansion budget of the downhill bracketing stage.
const BRACKET_MAX_EXPAND: usize = 60;
/// Convergence tolerance of the multivariate maximizer.
const ARRAY_TOL: f64 = 1e-6;
/// Iteration budget of the multivariate maximizer.
const ARRAY_MAX_ITER: usize = 200;

/// An objective over ambient mutable hyperparameter state.
///
/// `set_free` writes a proposed point into the owning models; `value` and
/// `gradient` evaluate at whatever point was last written. Maximizers may
/// call these in any order, any number of times.
pub trait Objective {
    /// Objective value at the current state.
    fn value(&self) -> Result<f64>;

    /// Objective gradient at the current state, one entry per free
    /// variable in `free_values` order.
    fn gradient(&self) -> Result<Array1<f64>>;

    /// Current free-variable values.
    fn free_values(&self) -> Vec<f64>;

    /// Overwrite the free variables, in `free_values` order.
    fn set_free(&mut self, values: &[f64]);
}

/// Negated objective at `x`, with failed or non-finite evaluations mapped
/// to the penalty value.
fn eval_neg<O: Objective>(obj: &mut O, x: f64) -> f64 {
    obj.set_free(&[x]);
    match obj.value() {
        Ok(v) if v.is_finite() => -v,
        _ => PENALTY,
    }
}

/// Maximize a single free variable with a bracketing line search followed
/// by Brent's method (golden section with parabolic interpolation).
///
/// Only `value` is queried. Infeasible proposals evaluate to a penalty,
/// which keeps the bracket inside the feasible region.
pub fn maximize_scalar<O: Objective>(obj: &mut O) {
    let x0 = obj.free_values()[0];
    let (a, b) = bracket(obj, x0);
    let xbest = brent(obj, a, b);
    obj.set_free(&[xbest]);
}

/// Expand a window downhill from `x0` until the middle point is no worse
/// than both ends, bracketing a minimum of the negated objective.
fn bracket<O: Objective>(obj: &mut O, x0: f64) -> (f64, f64) {
    let mut step = 1.0;
    let mut m = x0;
    let mut a = x0 - step;
    let mut b = x0 + step;
    let mut fa = eval_neg(obj, a);
    let mut fm = eval_neg(obj, m);
    let mut fb = eval_neg(obj, b);

    for _ in 0..BRACKET_MAX_EXPAND {
        if fa >= fm && fb >= fm {
            break;
        }
        step *= 2.0;
        if fb < fm {
            a = m;
            fa = fm;
            m = b;
            fm = fb;
            b = m + step;
            fb = eval_neg(obj, b);
        } else {
            b = m;
            fb = fm;
            m = a;
            fm = fa;
            a = m - step;
            fa = eval_neg(obj, a);
        }
    }
    (a, b)
}

/// Brent minimization of the negated objective over `[a, b]`.
fn brent<O: Objective>(obj: &mut O, a: f64, b: f64) -> f64 {
    let golden = 0.381_966_011_250_105; // (3 - sqrt(5)) / 2

    let (mut a, mut b) = (a.min(b), a.max(b));
    let mut x = a + golden * (b - a);
    let mut w = x;
    let mut v = x;
    let mut fx = eval_neg(obj, x);
    let mut fw = fx;
    let mut fv = fx;

    let mut d: f64 = 0.0;
    let mut e: f64 = 0.0;

    for _ in 0..SCALAR_MAX_ITER {
        let mid = 0.5 * (a + b);
        let tol1 = SCALAR_TOL * x.abs() + 1e-10;
        let tol2 = 2.0 * tol1;

        if (x - mid).abs() <= tol2 - 0.5 * (b - a) {
            break;
        }

        // Try a parabolic step through x, w, v; fall back to golden
        // section when it is out of bounds or shrinking too slowly.
        let mut use_golden = true;
        if e.abs() > tol1 {
            let r = (x - w) * (fx - fv);
            let q = (x - v) * (fx - fw);
            let p = (x - v) * q - (x - w) * r;
            let q = 2.0 * (q - r);
            let (p, q) = if q > 0.0 { (-p, q) } else { (p, -q) };

            let e_old = e;
            e = d;

            if p.abs() < (0.5 * q * e_old).abs() && p > q * (a - x) && p < q * (b - x) {
                d = p / q;
                let u = x + d;
                if u - a < tol2 || b - u < tol2 {
                    d = if x < mid { tol1 } else { -tol1 };
                }
                use_golden = false;
            }
        }
        if use_golden {
            e = if x < mid { b - x } else { a - x };
            d = golden * e;
        }

        let u = if d.abs() >= tol1 {
            x + d
        } else if d > 0.0 {
            x + tol1
        } else {
            x - tol1
        };
        let fu = eval_neg(obj, u);

        if fu <= fx {
            if u < x {
                b = x;
            } else {
                a = x;
            }
            v = w;
            fv = fw;
            w = x;
            fw = fx;
            x = u;
            fx = fu;
        } else {
            if u < x {
                a = u;
            } else {
                b = u;
            }
            if fu <= fw || w == x {
                v = w;
                fv = fw;
                w = u;
                fw = fu;
            } else if fu <= fv || v == x || v == w {
                v = u;
                fv = fu;
            }
        }
    }
    x
}

/// Maximize two or more free variables jointly with a BFGS optimizer
/// using Wolfe line search, querying both value and gradient.
///
/// A failed run is not an error: the models keep the last state the
/// optimizer evaluated and a warning is logged.
pub fn maximize_array<O: Objective>(obj: &mut O) {
    let x0 = Array1::from_vec(obj.free_values());
    let n = x0.len();

    let cell = RefCell::new(obj);
    let outcome = {
        let cost_and_grad = |x: &Array1<f64>| -> (f64, Array1<f64>) {
            let mut obj = cell.borrow_mut();
            obj.set_free(&x.to_vec());
            match obj.value().and_then(|v| obj.gradient().map(|g| (v, g))) {
                Ok((v, g)) if v.is_finite() => (-v, g.mapv(|gi| -gi)),
                _ => (PENALTY, Array1::zeros(n)),
            }
        };
        Bfgs::new(x0, cost_and_grad)
            .with_tolerance(ARRAY_TOL)
            .with_max_iterations(ARRAY_MAX_ITER)
            .run()
    };
    let obj = cell.into_inner();

    match outcome {
        Ok(BfgsSolution {
            final_point,
            final_value,
            iterations,
            ..
        }) => {
            debug!("bfgs converged in {iterations} iterations at value {final_value:.6}");
            obj.set_free(&final_point.to_vec());
        }
        Err(e) => warn!("bfgs did not converge, keeping last evaluated state: {e:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Concave toy objective -sum(c_i (x_i - t_i)^2) over ambient state.
    struct Paraboloid {
        x: Vec<f64>,
        targets: Vec<f64>,
        weights: Vec<f64>,
    }

    impl Objective for Paraboloid {
        fn value(&self) -> Result<f64> {
            let v = self
                .x
                .iter()
                .zip(&self.targets)
                .zip(&self.weights)
                .map(|((x, t), c)| -c * (x - t) * (x - t))
                .sum();
            Ok(v)
        }

        fn gradient(&self) -> Result<Array1<f64>> {
            let g = self
                .x
                .iter()
                .zip(&self.targets)
                .zip(&self.weights)
                .map(|((x, t), c)| -2.0 * c * (x - t))
                .collect();
            Ok(Array1::from_vec(g))
        }

        fn free_values(&self) -> Vec<f64> {
            self.x.clone()
        }

        fn set_free(&mut self, values: &[f64]) {
            self.x.copy_from_slice(values);
        }
    }

    #[test]
    fn test_maximize_scalar_finds_the_peak() {
        let mut obj = Paraboloid {
            x: vec![-5.0],
            targets: vec![2.0],
            weights: vec![1.0],
        };
        maximize_scalar(&mut obj);
        assert_abs_diff_eq!(obj.x[0], 2.0, epsilon = 1e-4);
    }

    #[test]
    fn test_maximize_scalar_from_the_peak_stays_put() {
        let mut obj = Paraboloid {
            x: vec![2.0],
            targets: vec![2.0],
            weights: vec![3.0],
        };
        maximize_scalar(&mut obj);
        assert_abs_diff_eq!(obj.x[0], 2.0, epsilon = 1e-4);
    }

    #[test]
    fn test_maximize_array_finds_the_peak() {
        let mut obj = Paraboloid {
            x: vec![0.0, 0.0],
            targets: vec![1.0, -3.0],
            weights: vec![1.0, 2.0],
        };
        maximize_array(&mut obj);
        assert_abs_diff_eq!(obj.x[0], 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(obj.x[1], -3.0, epsilon = 1e-4);
    }
}
