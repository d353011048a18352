//! # Frontier Solver
//!
//! $$
//! \sigma_p(r^\*) = \min_{\mathbf{w}}
//! \sqrt{\mathbf{w}^\top \Sigma \mathbf{w}}
//! \quad \text{s.t.} \quad \mu^\top\mathbf{w}=r^\*, \ \mathbf{1}^\top\mathbf{w}=1
//! $$
//!
//! Sweeps a grid of target returns across the feasible range and solves the
//! minimum-variance problem at each one. Targets with no feasible weights are
//! recorded as skipped, never fabricated. Point solves are independent and
//! run on the rayon pool; results do not depend on execution order.

use nalgebra::DVector;
use rayon::prelude::*;
use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::config::FrontierConfig;
use crate::error::FrontierResult;
use crate::moments::MomentEstimate;
use crate::solver::ConstraintSet;
use crate::solver::global_minimum_variance;
use crate::solver::min_variance_at_target;
use crate::solver::portfolio_return;
use crate::solver::portfolio_volatility;

/// Single point on the efficient frontier.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FrontierPoint {
  /// Target return the solve was constrained to.
  pub target_return: f64,
  /// Realized expected return of the solved weights.
  pub expected_return: f64,
  /// Portfolio volatility.
  pub volatility: f64,
  /// Sharpe ratio against the configured risk-free rate.
  pub sharpe: f64,
  /// Weights in asset input order.
  pub weights: Vec<f64>,
}

/// Ordered efficient frontier with observable omissions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EfficientFrontier {
  /// Points sorted strictly ascending by target return.
  pub points: Vec<FrontierPoint>,
  /// Requested targets that had no feasible weight vector.
  pub skipped_targets: Vec<f64>,
}

impl EfficientFrontier {
  pub fn len(&self) -> usize {
    self.points.len()
  }

  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }

  /// Index of the maximum-Sharpe point.
  pub fn max_sharpe_index(&self) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, point) in self.points.iter().enumerate() {
      if best.map_or(true, |b| point.sharpe > self.points[b].sharpe) {
        best = Some(i);
      }
    }
    best
  }
}

pub(crate) fn build_point(
  moments: &MomentEstimate,
  weights: &DVector<f64>,
  target: f64,
  risk_free: f64,
) -> FrontierPoint {
  let expected_return = portfolio_return(&moments.mean, weights);
  let volatility = portfolio_volatility(&moments.cov, weights);
  let sharpe = if volatility > 1e-15 {
    (expected_return - risk_free) / volatility
  } else {
    0.0
  };

  FrontierPoint {
    target_return: target,
    expected_return,
    volatility,
    sharpe,
    weights: weights.iter().copied().collect(),
  }
}

/// Solve the efficient frontier over `[min_target, max_target]`.
pub fn solve_frontier(
  moments: &MomentEstimate,
  constraints: &ConstraintSet,
  config: &FrontierConfig,
  min_target: f64,
  max_target: f64,
) -> FrontierResult<EfficientFrontier> {
  let span = max_target - min_target;
  if moments.n_assets() == 1 || span <= 1e-12 * max_target.abs().max(1.0) {
    let weights = global_minimum_variance(moments, constraints, config.max_iterations)?;
    let point = build_point(moments, &weights, min_target, config.risk_free_rate);
    return Ok(EfficientFrontier {
      points: vec![point],
      skipped_targets: Vec::new(),
    });
  }

  let count = config.frontier_points;
  let step = span / (count - 1) as f64;
  let targets: Vec<f64> = (0..count).map(|i| min_target + step * i as f64).collect();

  let solved: Vec<FrontierResult<Option<DVector<f64>>>> = targets
    .par_iter()
    .map(|&target| min_variance_at_target(moments, constraints, target, config.max_iterations))
    .collect();

  let mut points = Vec::with_capacity(count);
  let mut skipped_targets = Vec::new();
  for (target, outcome) in targets.iter().zip(solved) {
    match outcome? {
      Some(weights) => {
        points.push(build_point(moments, &weights, *target, config.risk_free_rate))
      }
      None => {
        warn!(
          target_return = *target,
          "no feasible weights for target return, omitting frontier point"
        );
        skipped_targets.push(*target);
      }
    }
  }

  for pair in points.windows(2) {
    let decrease = pair[0].volatility - pair[1].volatility;
    if decrease > 1e-8 {
      debug_assert!(
        false,
        "frontier volatility decreased from {} to {}",
        pair[0].volatility, pair[1].volatility
      );
      warn!(
        prev = pair[0].volatility,
        next = pair[1].volatility,
        "frontier volatility is not non-decreasing"
      );
    }
  }

  Ok(EfficientFrontier {
    points,
    skipped_targets,
  })
}
