//! # Quadratic Solver
//!
//! $$
//! \min_{\mathbf{w}} \ \mathbf{w}^\top \Sigma \mathbf{w}
//! \quad \text{s.t.} \quad \mathbf{1}^\top\mathbf{w}=1, \ \mu^\top\mathbf{w}=r^\*
//! $$
//!
//! Minimum-variance solves behind the frontier. Without inequality
//! constraints the Lagrange conditions reduce to two linear solves against
//! the covariance; with bounds active an iteration-capped active-set loop
//! pins violating weights at their bounds and re-solves the reduced system.

use nalgebra::Cholesky;
use nalgebra::DMatrix;
use nalgebra::DVector;
use tracing::debug;

use crate::config::FrontierConfig;
use crate::error::FrontierError;
use crate::error::FrontierResult;
use crate::moments::MomentEstimate;

const BOUND_TOL: f64 = 1e-9;

/// Linear constraint set applied to portfolio weights. The unit-budget
/// constraint `sum(w) = 1` is always active.
#[derive(Clone, Debug)]
pub struct ConstraintSet {
  /// Per-asset lower bounds; `None` allows unbounded shorting.
  pub lower: Option<Vec<f64>>,
  /// Per-asset upper bounds; `None` leaves weights uncapped.
  pub upper: Option<Vec<f64>>,
}

impl ConstraintSet {
  /// Budget-only constraints: weights sum to 1, shorting allowed.
  pub fn unbounded() -> Self {
    Self {
      lower: None,
      upper: None,
    }
  }

  /// Long-only constraints: non-negative weights summing to 1.
  pub fn long_only(n_assets: usize) -> Self {
    Self {
      lower: Some(vec![0.0; n_assets]),
      upper: None,
    }
  }

  /// Constraint set implied by a [`FrontierConfig`].
  pub fn from_config(config: &FrontierConfig, n_assets: usize) -> Self {
    let lower = match (&config.lower_bounds, config.allow_short) {
      (Some(bounds), true) => Some(bounds.clone()),
      (Some(bounds), false) => Some(bounds.iter().map(|b| b.max(0.0)).collect()),
      (None, false) => Some(vec![0.0; n_assets]),
      (None, true) => None,
    };

    Self {
      lower,
      upper: config.upper_bounds.clone(),
    }
  }

  /// Whether any inequality constraint is active.
  pub fn has_inequalities(&self) -> bool {
    self.lower.is_some() || self.upper.is_some()
  }

  fn lo(&self, i: usize) -> f64 {
    self
      .lower
      .as_ref()
      .and_then(|bounds| bounds.get(i).copied())
      .unwrap_or(f64::NEG_INFINITY)
  }

  fn hi(&self, i: usize) -> f64 {
    self
      .upper
      .as_ref()
      .and_then(|bounds| bounds.get(i).copied())
      .unwrap_or(f64::INFINITY)
  }
}

/// Minimum-variance weights hitting `target` expected return, or `None` when
/// no feasible weight vector exists under the constraints.
pub fn min_variance_at_target(
  moments: &MomentEstimate,
  constraints: &ConstraintSet,
  target: f64,
  max_iterations: usize,
) -> FrontierResult<Option<DVector<f64>>> {
  constrained_solve(moments, constraints, Some(target), max_iterations)
}

/// Global minimum-variance portfolio under the constraint set.
pub fn global_minimum_variance(
  moments: &MomentEstimate,
  constraints: &ConstraintSet,
  max_iterations: usize,
) -> FrontierResult<DVector<f64>> {
  constrained_solve(moments, constraints, None, max_iterations)?.ok_or_else(|| {
    FrontierError::InvariantViolation {
      stage: "solver",
      detail: "constraint set admits no portfolio with unit budget".to_string(),
    }
  })
}

/// Maximum attainable expected return under the constraint set.
///
/// With shorting allowed the frontier grid is pinned at the best single
/// asset; with bounds the budget is filled greedily from the highest mean
/// down.
pub fn max_attainable_return(moments: &MomentEstimate, constraints: &ConstraintSet) -> f64 {
  let n = moments.n_assets();
  let best = (0..n).map(|i| moments.mean[i]).fold(f64::NEG_INFINITY, f64::max);

  let Some(lower) = &constraints.lower else {
    return best;
  };

  let mut order: Vec<usize> = (0..n).collect();
  order.sort_by(|&a, &b| {
    moments.mean[b]
      .partial_cmp(&moments.mean[a])
      .unwrap_or(std::cmp::Ordering::Equal)
  });

  let mut weights = lower.clone();
  let mut remaining = 1.0 - weights.iter().sum::<f64>();
  for &i in &order {
    if remaining <= 0.0 {
      break;
    }
    let room = (constraints.hi(i) - weights[i]).min(remaining);
    if room > 0.0 {
      weights[i] += room;
      remaining -= room;
    }
  }

  (0..n).map(|i| weights[i] * moments.mean[i]).sum()
}

/// Expected portfolio return `mu' w`.
pub fn portfolio_return(mean: &DVector<f64>, weights: &DVector<f64>) -> f64 {
  mean.dot(weights)
}

/// Portfolio volatility `sqrt(w' Sigma w)`.
pub fn portfolio_volatility(cov: &DMatrix<f64>, weights: &DVector<f64>) -> f64 {
  let sigma_w = cov * weights;
  weights.dot(&sigma_w).max(0.0).sqrt()
}

fn returns_close(achieved: f64, target: f64) -> bool {
  (achieved - target).abs() <= 1e-9 * target.abs().max(1.0)
}

fn constrained_solve(
  moments: &MomentEstimate,
  constraints: &ConstraintSet,
  target: Option<f64>,
  max_iterations: usize,
) -> FrontierResult<Option<DVector<f64>>> {
  let n = moments.n_assets();

  if !constraints.has_inequalities() {
    let free: Vec<usize> = (0..n).collect();
    return solve_equality(&moments.cov, &moments.mean, &free, 1.0, target);
  }

  let mut pinned: Vec<Option<f64>> = vec![None; n];
  for _ in 0..max_iterations {
    let free: Vec<usize> = (0..n).filter(|&i| pinned[i].is_none()).collect();
    let pinned_budget: f64 = pinned.iter().flatten().sum();
    let pinned_return: f64 = pinned
      .iter()
      .enumerate()
      .filter_map(|(i, w)| w.map(|w| w * moments.mean[i]))
      .sum();
    let budget = 1.0 - pinned_budget;

    if free.is_empty() {
      let mut feasible = (pinned_budget - 1.0).abs() <= 1e-9;
      if let Some(target) = target {
        feasible = feasible && returns_close(pinned_return, target);
      }
      return Ok(feasible.then(|| assemble_weights(n, &pinned, &[], &DVector::zeros(0))));
    }

    if free.len() == 1 {
      let i = free[0];
      let mut feasible =
        budget >= constraints.lo(i) - BOUND_TOL && budget <= constraints.hi(i) + BOUND_TOL;
      if let Some(target) = target {
        feasible = feasible && returns_close(pinned_return + moments.mean[i] * budget, target);
      }
      let solved = DVector::from_element(1, budget);
      return Ok(feasible.then(|| assemble_weights(n, &pinned, &free, &solved)));
    }

    let residual_target = target.map(|t| t - pinned_return);
    let Some(solved) = solve_equality(&moments.cov, &moments.mean, &free, budget, residual_target)?
    else {
      return Ok(None);
    };

    let mut worst: Option<(usize, f64, f64)> = None;
    for (k, &i) in free.iter().enumerate() {
      let w = solved[k];
      let lo = constraints.lo(i);
      let hi = constraints.hi(i);
      let candidate = if w < lo - BOUND_TOL {
        Some((i, lo, lo - w))
      } else if w > hi + BOUND_TOL {
        Some((i, hi, w - hi))
      } else {
        None
      };
      if let Some((_, _, violation)) = candidate {
        if worst.map_or(true, |(_, _, current)| violation > current) {
          worst = candidate;
        }
      }
    }

    match worst {
      None => return Ok(Some(assemble_weights(n, &pinned, &free, &solved))),
      Some((i, bound, violation)) => {
        debug!(asset = i, bound, violation, "pinning weight at bound");
        pinned[i] = Some(bound);
      }
    }
  }

  Err(FrontierError::SolverDidNotConverge { max_iterations })
}

/// Equality-constrained solve on an index subset via the Lagrange conditions.
/// Returns `None` when the target is unreachable on the subset.
fn solve_equality(
  cov: &DMatrix<f64>,
  mean: &DVector<f64>,
  idx: &[usize],
  budget: f64,
  target: Option<f64>,
) -> FrontierResult<Option<DVector<f64>>> {
  let k = idx.len();
  let sigma = DMatrix::from_fn(k, k, |r, c| cov[(idx[r], idx[c])]);
  let chol = Cholesky::new(sigma).ok_or_else(|| FrontierError::IllConditionedCovariance {
    detail: "covariance failed Cholesky factorization during solve".to_string(),
  })?;

  let ones = DVector::from_element(k, 1.0);
  let x1 = chol.solve(&ones);
  let a: f64 = x1.sum();

  let Some(target) = target else {
    if a.abs() < 1e-14 {
      return Err(FrontierError::IllConditionedCovariance {
        detail: "1' Sigma^-1 1 vanished in minimum-variance solve".to_string(),
      });
    }
    return Ok(Some(x1 * (budget / a)));
  };

  let mu = DVector::from_fn(k, |r, _| mean[idx[r]]);
  let x2 = chol.solve(&mu);
  let b: f64 = x2.sum();
  let c: f64 = mu.dot(&x2);
  let d = a * c - b * b;

  if d.abs() <= 1e-12 * (a * c).abs().max(1e-300) {
    // mean collinear with ones on this subset: only the minimum-variance
    // return is reachable
    if a.abs() < 1e-14 {
      return Ok(None);
    }
    let weights = x1 * (budget / a);
    let achieved = mu.dot(&weights);
    if returns_close(achieved, target) {
      return Ok(Some(weights));
    }
    return Ok(None);
  }

  let g = (c * budget - b * target) / d;
  let h = (a * target - b * budget) / d;
  Ok(Some(x1 * g + x2 * h))
}

fn assemble_weights(
  n: usize,
  pinned: &[Option<f64>],
  free: &[usize],
  solved: &DVector<f64>,
) -> DVector<f64> {
  let mut weights = DVector::zeros(n);
  for (i, w) in pinned.iter().enumerate() {
    if let Some(w) = w {
      weights[i] = *w;
    }
  }
  for (k, &i) in free.iter().enumerate() {
    weights[i] = solved[k];
  }
  weights
}
