//! # Frontier Engine
//!
//! $$
//! (\text{prices}, \text{config}) \mapsto
//! (\mathcal{F}, \mathbf{w}_{\text{tan}}, \hat\mu, \hat\Sigma)
//! $$
//!
//! Orchestration of one optimization invocation: return series, moments,
//! frontier, tangency, assembly. Pure and self-contained; inputs are never
//! mutated and nothing is cached across invocations.

use tracing::debug;

use crate::config::FrontierConfig;
use crate::data::PriceSeries;
use crate::data::build_return_matrix;
use crate::error::FrontierError;
use crate::error::FrontierResult;
use crate::frontier::build_point;
use crate::frontier::solve_frontier;
use crate::moments::estimate_moments;
use crate::report::OptimizationResult;
use crate::report::assemble;
use crate::solver::ConstraintSet;
use crate::solver::global_minimum_variance;
use crate::solver::max_attainable_return;
use crate::solver::portfolio_return;
use crate::tangency::select_tangency;

/// Single entry-point engine holding a validated configuration.
#[derive(Clone, Debug)]
pub struct FrontierEngine {
  config: FrontierConfig,
}

impl FrontierEngine {
  /// Construct a new engine with explicit configuration.
  pub fn new(config: FrontierConfig) -> Self {
    Self { config }
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &FrontierConfig {
    &self.config
  }

  /// Run one optimization over the supplied price histories.
  pub fn compute(&self, series: &[PriceSeries]) -> FrontierResult<OptimizationResult> {
    compute_efficient_frontier(series, &self.config)
  }
}

/// Compute the efficient frontier and tangency portfolio for the supplied
/// price histories.
pub fn compute_efficient_frontier(
  series: &[PriceSeries],
  config: &FrontierConfig,
) -> FrontierResult<OptimizationResult> {
  validate_config(config, series.len())?;

  let returns = build_return_matrix(series, config)?;
  debug!(
    periods = returns.n_periods(),
    assets = returns.n_assets(),
    "aligned return matrix built"
  );

  let moments = estimate_moments(&returns, config)?;
  let constraints = ConstraintSet::from_config(config, moments.n_assets());

  let gmv_weights = global_minimum_variance(&moments, &constraints, config.max_iterations)?;
  let min_target = portfolio_return(&moments.mean, &gmv_weights);
  let max_target = max_attainable_return(&moments, &constraints);
  let min_variance = build_point(&moments, &gmv_weights, min_target, config.risk_free_rate);
  debug!(min_target, max_target, "feasible return range");

  let frontier = solve_frontier(&moments, &constraints, config, min_target, max_target)?;
  let tangency = select_tangency(&moments, &constraints, &frontier, config)?;

  assemble(returns.tickers.clone(), moments, frontier, tangency, min_variance)
}

fn validate_config(config: &FrontierConfig, n_assets: usize) -> FrontierResult<()> {
  if config.frontier_points < 2 {
    return Err(FrontierError::InvariantViolation {
      stage: "configuration",
      detail: format!("frontier_points {} is below 2", config.frontier_points),
    });
  }

  if let Some(delta) = config.shrinkage {
    if !(0.0..=1.0).contains(&delta) {
      return Err(FrontierError::InvariantViolation {
        stage: "configuration",
        detail: format!("shrinkage weight {delta} outside [0, 1]"),
      });
    }
  }

  for (label, bounds) in [
    ("lower_bounds", &config.lower_bounds),
    ("upper_bounds", &config.upper_bounds),
  ] {
    if let Some(bounds) = bounds {
      if bounds.len() != n_assets {
        return Err(FrontierError::InvariantViolation {
          stage: "configuration",
          detail: format!(
            "{label} has {} entries for {n_assets} assets",
            bounds.len()
          ),
        });
      }
    }
  }

  if let (Some(lower), Some(upper)) = (&config.lower_bounds, &config.upper_bounds) {
    for (i, (lo, hi)) in lower.iter().zip(upper.iter()).enumerate() {
      if lo > hi {
        return Err(FrontierError::InvariantViolation {
          stage: "configuration",
          detail: format!("bounds for asset {i} are inverted: {lo} > {hi}"),
        });
      }
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;
  use chrono::Duration;
  use chrono::NaiveDate;

  use super::*;
  use crate::data::Asset;
  use crate::data::PricePoint;

  const RETURNS_A: [f64; 12] = [
    0.01, -0.005, 0.02, 0.0, -0.01, 0.015, 0.005, -0.002, 0.01, -0.008, 0.012, 0.003,
  ];
  const RETURNS_B: [f64; 12] = [
    -0.002, 0.01, -0.004, 0.008, 0.002, -0.006, 0.01, 0.004, -0.005, 0.009, -0.001, 0.006,
  ];

  fn series_from_returns(ticker: &str, returns: &[f64]) -> PriceSeries {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let mut price = 100.0;
    let mut points = vec![PricePoint { date: start, price }];
    for (k, r) in returns.iter().enumerate() {
      price *= 1.0 + r;
      points.push(PricePoint {
        date: start + Duration::days(k as i64 + 1),
        price,
      });
    }
    PriceSeries::new(Asset::new(ticker), points)
  }

  fn two_asset_series() -> Vec<PriceSeries> {
    vec![
      series_from_returns("AAA", &RETURNS_A),
      series_from_returns("BBB", &RETURNS_B),
    ]
  }

  #[test]
  fn end_to_end_long_only_satisfies_the_portfolio_invariants() {
    let result =
      compute_efficient_frontier(&two_asset_series(), &FrontierConfig::default()).unwrap();

    assert_eq!(result.tickers, vec!["AAA", "BBB"]);
    assert!(result.frontier.skipped_targets.is_empty());
    assert!(result.frontier.len() >= 2);

    for point in &result.frontier.points {
      let sum: f64 = point.weights.iter().sum();
      assert_relative_eq!(sum, 1.0, epsilon = 1e-6);
      for &w in &point.weights {
        assert!(w >= -1e-9);
      }
    }
    for pair in result.frontier.points.windows(2) {
      assert!(pair[1].target_return > pair[0].target_return);
      assert!(pair[1].volatility >= pair[0].volatility - 1e-9);
    }

    // the tangency scan never loses to a sampled frontier point
    for point in &result.frontier.points {
      assert!(result.tangency.sharpe >= point.sharpe - 1e-12);
    }
    assert!(result.min_variance.volatility <= result.frontier.points[0].volatility + 1e-9);
  }

  #[test]
  fn rerunning_identical_inputs_is_bit_for_bit_deterministic() {
    let series = two_asset_series();
    let config = FrontierConfig::default();

    let first = compute_efficient_frontier(&series, &config).unwrap();
    let second = compute_efficient_frontier(&series, &config).unwrap();

    assert_eq!(
      first.tangency.point.weights,
      second.tangency.point.weights
    );
    assert_eq!(first.frontier.len(), second.frontier.len());
    for (a, b) in first
      .frontier
      .points
      .iter()
      .zip(second.frontier.points.iter())
    {
      assert_eq!(a.weights, b.weights);
      assert_eq!(a.volatility, b.volatility);
    }
  }

  #[test]
  fn shorting_widens_nothing_but_stays_assembled() {
    let config = FrontierConfig {
      allow_short: true,
      ..FrontierConfig::default()
    };

    let result = compute_efficient_frontier(&two_asset_series(), &config).unwrap();

    for point in &result.frontier.points {
      let sum: f64 = point.weights.iter().sum();
      assert_relative_eq!(sum, 1.0, epsilon = 1e-6);
    }
    let sum: f64 = result.tangency.point.weights.iter().sum();
    assert_relative_eq!(sum, 1.0, epsilon = 1e-6);
  }

  #[test]
  fn single_asset_collapses_to_itself() {
    let series = vec![series_from_returns("AAA", &RETURNS_A)];

    let result = compute_efficient_frontier(&series, &FrontierConfig::default()).unwrap();

    assert_eq!(result.frontier.len(), 1);
    assert_eq!(result.frontier.points[0].weights, vec![1.0]);
    assert_eq!(result.tangency.point.weights, vec![1.0]);
  }

  #[test]
  fn single_asset_below_the_risk_free_rate_has_no_tangency() {
    let series = vec![series_from_returns("AAA", &RETURNS_A)];
    let config = FrontierConfig {
      risk_free_rate: 1000.0,
      ..FrontierConfig::default()
    };

    let err = compute_efficient_frontier(&series, &config).unwrap_err();
    assert!(matches!(err, FrontierError::NoTangencyPortfolio { .. }));
  }

  #[test]
  fn too_short_histories_fail_with_insufficient_data() {
    let series = vec![
      series_from_returns("AAA", &RETURNS_A[..2]),
      series_from_returns("BBB", &RETURNS_B[..2]),
    ];

    let err = compute_efficient_frontier(&series, &FrontierConfig::default()).unwrap_err();
    assert!(matches!(err, FrontierError::InsufficientData { .. }));
  }

  #[test]
  fn invalid_prices_fail_before_optimization() {
    let mut series = two_asset_series();
    series[1].points[3].price = -4.0;

    let err = compute_efficient_frontier(&series, &FrontierConfig::default()).unwrap_err();
    assert!(matches!(err, FrontierError::InvalidPrice { ref ticker, .. } if ticker == "BBB"));
  }

  #[test]
  fn config_validation_rejects_degenerate_requests() {
    let series = two_asset_series();

    let too_few_points = FrontierConfig {
      frontier_points: 1,
      ..FrontierConfig::default()
    };
    assert!(matches!(
      compute_efficient_frontier(&series, &too_few_points).unwrap_err(),
      FrontierError::InvariantViolation { .. }
    ));

    let mismatched_bounds = FrontierConfig {
      lower_bounds: Some(vec![0.0]),
      ..FrontierConfig::default()
    };
    assert!(matches!(
      compute_efficient_frontier(&series, &mismatched_bounds).unwrap_err(),
      FrontierError::InvariantViolation { .. }
    ));

    let inverted_bounds = FrontierConfig {
      lower_bounds: Some(vec![0.5, 0.5]),
      upper_bounds: Some(vec![0.4, 1.0]),
      ..FrontierConfig::default()
    };
    assert!(matches!(
      compute_efficient_frontier(&series, &inverted_bounds).unwrap_err(),
      FrontierError::InvariantViolation { .. }
    ));
  }

  #[test]
  fn engine_wrapper_matches_the_free_function() {
    let engine = FrontierEngine::new(FrontierConfig::default());
    let series = two_asset_series();

    let from_engine = engine.compute(&series).unwrap();
    let from_function =
      compute_efficient_frontier(&series, engine.config()).unwrap();

    assert_eq!(
      from_engine.tangency.point.weights,
      from_function.tangency.point.weights
    );
  }
}
