//! # Result Assembler
//!
//! $$
//! \left|\textstyle\sum_i w_i - 1\right| \le 10^{-6}
//! $$
//!
//! Packages the frontier, the tangency portfolio and the moment estimate
//! into one immutable result. Performs structural validation only; a
//! failure here indicates a solver regression, not bad market data.

use serde::Deserialize;
use serde::Serialize;

use crate::error::FrontierError;
use crate::error::FrontierResult;
use crate::frontier::EfficientFrontier;
use crate::frontier::FrontierPoint;
use crate::moments::MomentEstimate;
use crate::tangency::TangencyPortfolio;

const WEIGHT_SUM_TOL: f64 = 1e-6;

/// Immutable result of one optimization invocation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OptimizationResult {
  /// Tickers in weight-vector order.
  pub tickers: Vec<String>,
  /// Moment estimate every solve consumed.
  pub moments: MomentEstimate,
  /// Efficient frontier with observable omissions.
  pub frontier: EfficientFrontier,
  /// Maximum-Sharpe portfolio at the configured risk-free rate.
  pub tangency: TangencyPortfolio,
  /// Global minimum-variance portfolio.
  pub min_variance: FrontierPoint,
}

/// Assemble an [`OptimizationResult`], rejecting weight vectors that do not
/// sum to one within tolerance.
pub fn assemble(
  tickers: Vec<String>,
  moments: MomentEstimate,
  frontier: EfficientFrontier,
  tangency: TangencyPortfolio,
  min_variance: FrontierPoint,
) -> FrontierResult<OptimizationResult> {
  for (i, point) in frontier.points.iter().enumerate() {
    check_weight_sum(&format!("frontier point {i}"), &point.weights)?;
  }
  check_weight_sum("tangency portfolio", &tangency.point.weights)?;
  check_weight_sum("minimum-variance portfolio", &min_variance.weights)?;

  Ok(OptimizationResult {
    tickers,
    moments,
    frontier,
    tangency,
    min_variance,
  })
}

fn check_weight_sum(label: &str, weights: &[f64]) -> FrontierResult<()> {
  let sum: f64 = weights.iter().sum();
  if (sum - 1.0).abs() > WEIGHT_SUM_TOL {
    return Err(FrontierError::InvariantViolation {
      stage: "result assembler",
      detail: format!("{label} weights sum to {sum:.9}, expected 1"),
    });
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use nalgebra::DMatrix;
  use nalgebra::DVector;

  use super::*;

  fn point(weights: Vec<f64>) -> FrontierPoint {
    FrontierPoint {
      target_return: 0.08,
      expected_return: 0.08,
      volatility: 0.15,
      sharpe: 0.4,
      weights,
    }
  }

  fn moments() -> MomentEstimate {
    MomentEstimate {
      mean: DVector::from_vec(vec![0.08, 0.06]),
      cov: DMatrix::from_row_slice(2, 2, &[0.04, 0.0, 0.0, 0.01]),
      periods: 32,
    }
  }

  fn frontier_of(points: Vec<FrontierPoint>) -> EfficientFrontier {
    EfficientFrontier {
      points,
      skipped_targets: Vec::new(),
    }
  }

  #[test]
  fn valid_weights_assemble() {
    let tangency = TangencyPortfolio {
      point: point(vec![0.6, 0.4]),
      sharpe: 0.4,
    };

    let result = assemble(
      vec!["AAA".into(), "BBB".into()],
      moments(),
      frontier_of(vec![point(vec![0.5, 0.5]), point(vec![0.7, 0.3])]),
      tangency,
      point(vec![0.4, 0.6]),
    )
    .unwrap();

    assert_eq!(result.tickers, vec!["AAA", "BBB"]);
    assert_eq!(result.frontier.len(), 2);
  }

  #[test]
  fn broken_weight_sum_is_rejected() {
    let tangency = TangencyPortfolio {
      point: point(vec![0.6, 0.4]),
      sharpe: 0.4,
    };

    let err = assemble(
      vec!["AAA".into(), "BBB".into()],
      moments(),
      frontier_of(vec![point(vec![0.5, 0.4])]),
      tangency,
      point(vec![0.4, 0.6]),
    )
    .unwrap_err();

    assert!(matches!(
      err,
      FrontierError::InvariantViolation {
        stage: "result assembler",
        ..
      }
    ));
  }

  #[test]
  fn tolerance_admits_numerical_slack() {
    let tangency = TangencyPortfolio {
      point: point(vec![0.6, 0.4 + 5e-7]),
      sharpe: 0.4,
    };

    assert!(assemble(
      vec!["AAA".into(), "BBB".into()],
      moments(),
      frontier_of(vec![point(vec![0.5, 0.5])]),
      tangency,
      point(vec![0.4, 0.6]),
    )
    .is_ok());
  }
}
