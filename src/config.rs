//! # Configuration
//!
//! $$
//! r_t = \frac{p_t - p_{t-1}}{p_{t-1}} \quad \text{or} \quad r_t = \ln\frac{p_t}{p_{t-1}}
//! $$
//!
//! Runtime configuration for a single optimization invocation. Every choice
//! that changes the numbers (return definition, periodicity, mean estimator,
//! fill policy, regularization) is explicit here, never inferred.

use serde::Deserialize;
use serde::Serialize;

/// Period-over-period return definition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnKind {
  /// `(p_t - p_{t-1}) / p_{t-1}`
  #[default]
  Simple,
  /// `ln(p_t / p_{t-1})`
  Log,
}

impl ReturnKind {
  /// Parse a string into a [`ReturnKind`].
  pub fn from_str(s: &str) -> Self {
    match s.to_lowercase().as_str() {
      "log" | "logarithmic" => Self::Log,
      _ => Self::Simple,
    }
  }
}

/// Sampling periodicity of the return series.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
  #[default]
  Daily,
  Weekly,
  Monthly,
}

impl Period {
  /// Parse a string into a [`Period`].
  pub fn from_str(s: &str) -> Self {
    match s.to_lowercase().as_str() {
      "weekly" | "week" | "w" => Self::Weekly,
      "monthly" | "month" | "m" => Self::Monthly,
      _ => Self::Daily,
    }
  }

  /// Periods per year used for annualization.
  pub fn periods_per_year(&self) -> f64 {
    match self {
      Self::Daily => 252.0,
      Self::Weekly => 52.0,
      Self::Monthly => 12.0,
    }
  }
}

/// Expected-return estimator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeanKind {
  /// Sample mean over the period dimension.
  #[default]
  Arithmetic,
  /// Compound growth mean `(prod(1 + r_t))^{1/T} - 1`.
  Geometric,
}

impl MeanKind {
  /// Parse a string into a [`MeanKind`].
  pub fn from_str(s: &str) -> Self {
    match s.to_lowercase().as_str() {
      "geometric" | "geo" | "g" => Self::Geometric,
      _ => Self::Arithmetic,
    }
  }
}

/// Handling of timestamps missing for a subset of assets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillPolicy {
  /// Keep only periods at which every asset has an observation.
  #[default]
  DropMissing,
  /// Carry each asset's last observation forward over gaps.
  ForwardFill,
}

impl FillPolicy {
  /// Parse a string into a [`FillPolicy`].
  pub fn from_str(s: &str) -> Self {
    match s.to_lowercase().as_str() {
      "ffill" | "forward" | "forward-fill" | "forwardfill" => Self::ForwardFill,
      _ => Self::DropMissing,
    }
  }
}

/// Configuration of one optimization invocation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FrontierConfig {
  /// Return definition applied period over period.
  pub return_kind: ReturnKind,
  /// Sampling periodicity for resampling and annualization.
  pub period: Period,
  /// Expected-return estimator.
  pub mean_kind: MeanKind,
  /// Alignment policy for missing observations.
  pub fill_policy: FillPolicy,
  /// Allow negative weights when no explicit lower bounds are supplied.
  pub allow_short: bool,
  /// Per-asset lower weight bounds.
  pub lower_bounds: Option<Vec<f64>>,
  /// Per-asset upper weight bounds.
  pub upper_bounds: Option<Vec<f64>>,
  /// Number of frontier sample points, at least 2.
  pub frontier_points: usize,
  /// Risk-free rate on the same basis as the estimated returns.
  pub risk_free_rate: f64,
  /// Scale moments to an annual basis (variance scales linearly).
  pub annualize: bool,
  /// Minimum aligned return periods; defaults to assets + 1 when unset.
  pub min_periods: Option<usize>,
  /// Covariance condition-number threshold beyond which estimation fails.
  pub covariance_condition_threshold: f64,
  /// Opt-in ridge shrinkage weight toward the covariance diagonal, in [0, 1].
  pub shrinkage: Option<f64>,
  /// Refine the scanned tangency point by interpolating between neighbors.
  pub tangency_interpolation: bool,
  /// Iteration budget for the bounded active-set solve.
  pub max_iterations: usize,
}

impl Default for FrontierConfig {
  fn default() -> Self {
    Self {
      return_kind: ReturnKind::Simple,
      period: Period::Daily,
      mean_kind: MeanKind::Arithmetic,
      fill_policy: FillPolicy::DropMissing,
      allow_short: false,
      lower_bounds: None,
      upper_bounds: None,
      frontier_points: 25,
      risk_free_rate: 0.0,
      annualize: true,
      min_periods: None,
      covariance_condition_threshold: 1e12,
      shrinkage: None,
      tangency_interpolation: true,
      max_iterations: 128,
    }
  }
}
