//! # Tangency Selector
//!
//! $$
//! \mathbf{w}^\* = \arg\max_{\mathbf{w}} \frac{\mu^\top\mathbf{w} - r_f}{\sqrt{\mathbf{w}^\top\Sigma\mathbf{w}}}
//! $$
//!
//! Maximum-Sharpe portfolio selection. Without inequality constraints the
//! solution follows from one linear solve against `Sigma` with the excess
//! returns; with bounds active the frontier is scanned and optionally
//! refined by interpolating between the best sampled point and its better
//! neighbor.

use nalgebra::Cholesky;
use nalgebra::DVector;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::config::FrontierConfig;
use crate::error::FrontierError;
use crate::error::FrontierResult;
use crate::frontier::EfficientFrontier;
use crate::frontier::FrontierPoint;
use crate::frontier::build_point;
use crate::moments::MomentEstimate;
use crate::solver::ConstraintSet;

/// Maximum-Sharpe portfolio at a given risk-free rate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TangencyPortfolio {
  /// Frontier point realizing the maximum Sharpe ratio.
  pub point: FrontierPoint,
  /// Realized Sharpe ratio.
  pub sharpe: f64,
}

/// Select the tangency portfolio for the supplied moments and frontier.
pub fn select_tangency(
  moments: &MomentEstimate,
  constraints: &ConstraintSet,
  frontier: &EfficientFrontier,
  config: &FrontierConfig,
) -> FrontierResult<TangencyPortfolio> {
  let risk_free = config.risk_free_rate;

  if !constraints.has_inequalities() {
    return closed_form(moments, risk_free);
  }

  if frontier
    .points
    .iter()
    .all(|point| point.expected_return <= risk_free)
  {
    return Err(FrontierError::NoTangencyPortfolio {
      risk_free_rate: risk_free,
    });
  }

  let best = frontier
    .max_sharpe_index()
    .ok_or(FrontierError::NoTangencyPortfolio {
      risk_free_rate: risk_free,
    })?;

  let mut point = frontier.points[best].clone();
  if config.tangency_interpolation && frontier.points.len() >= 2 {
    if let Some(refined) = interpolate(moments, frontier, best, risk_free) {
      if refined.sharpe > point.sharpe {
        debug!(
          sampled = point.sharpe,
          refined = refined.sharpe,
          "interpolation improved the tangency point"
        );
        point = refined;
      }
    }
  }

  let sharpe = point.sharpe;
  Ok(TangencyPortfolio { point, sharpe })
}

fn closed_form(moments: &MomentEstimate, risk_free: f64) -> FrontierResult<TangencyPortfolio> {
  let n = moments.n_assets();
  let best_mean = (0..n)
    .map(|i| moments.mean[i])
    .fold(f64::NEG_INFINITY, f64::max);
  if best_mean <= risk_free {
    return Err(FrontierError::NoTangencyPortfolio {
      risk_free_rate: risk_free,
    });
  }

  let chol =
    Cholesky::new(moments.cov.clone()).ok_or_else(|| FrontierError::IllConditionedCovariance {
      detail: "covariance failed Cholesky factorization in tangency solve".to_string(),
    })?;

  let excess = DVector::from_fn(n, |i, _| moments.mean[i] - risk_free);
  let solved = chol.solve(&excess);
  let normalizer: f64 = solved.sum();
  if normalizer <= 1e-12 {
    return Err(FrontierError::NoTangencyPortfolio {
      risk_free_rate: risk_free,
    });
  }

  let weights = solved / normalizer;
  let target = moments.mean.dot(&weights);
  let point = build_point(moments, &weights, target, risk_free);
  let sharpe = point.sharpe;

  Ok(TangencyPortfolio { point, sharpe })
}

/// Parabolic-vertex refinement between the best sampled point and its
/// better neighbor. The refined weights are a convex combination of the two
/// sampled weight vectors, so every active bound stays satisfied.
fn interpolate(
  moments: &MomentEstimate,
  frontier: &EfficientFrontier,
  best: usize,
  risk_free: f64,
) -> Option<FrontierPoint> {
  let points = &frontier.points;
  let left = best.checked_sub(1);
  let right = (best + 1 < points.len()).then_some(best + 1);

  let neighbor = match (left, right) {
    (Some(l), Some(r)) => {
      if points[l].sharpe >= points[r].sharpe {
        l
      } else {
        r
      }
    }
    (Some(l), None) => l,
    (None, Some(r)) => r,
    (None, None) => return None,
  };

  let t_best = points[best].target_return;
  let t_next = points[neighbor].target_return;
  if (t_next - t_best).abs() < 1e-15 {
    return None;
  }

  let alpha = match (left, right) {
    (Some(l), Some(r)) => {
      parabola_vertex(
        points[l].target_return,
        points[l].sharpe,
        t_best,
        points[best].sharpe,
        points[r].target_return,
        points[r].sharpe,
      )
      .map(|vertex| {
        let span = t_next - t_best;
        ((vertex - t_best) / span).clamp(0.0, 1.0)
      })
      .unwrap_or(0.5)
    }
    _ => 0.5,
  };

  let n = moments.n_assets();
  let wa = &points[best].weights;
  let wb = &points[neighbor].weights;
  let weights = DVector::from_fn(n, |i, _| (1.0 - alpha) * wa[i] + alpha * wb[i]);
  let target = (1.0 - alpha) * t_best + alpha * t_next;

  Some(build_point(moments, &weights, target, risk_free))
}

fn parabola_vertex(x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64) -> Option<f64> {
  let denom = (x1 - x2) * (x1 - x3) * (x2 - x3);
  if denom.abs() < 1e-30 {
    return None;
  }

  let a = (x3 * (y2 - y1) + x2 * (y1 - y3) + x1 * (y3 - y2)) / denom;
  let b = (x3 * x3 * (y1 - y2) + x2 * x2 * (y3 - y1) + x1 * x1 * (y2 - y3)) / denom;
  if a >= -1e-30 {
    return None;
  }

  Some(-b / (2.0 * a))
}
