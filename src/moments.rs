//! # Moment Estimator
//!
//! $$
//! \hat\mu_j = \frac{1}{T}\sum_t R_{tj}, \qquad
//! \hat\Sigma_{ij} = \frac{1}{T-1}\sum_t (R_{ti}-\hat\mu_i)(R_{tj}-\hat\mu_j)
//! $$
//!
//! Expected-return vector and sample covariance from the aligned return
//! matrix, with positive-semi-definiteness and conditioning validation.
//! Regularization is explicit opt-in shrinkage, never a silent fallback.

use nalgebra::DMatrix;
use nalgebra::DVector;
use serde::Deserialize;
use serde::Serialize;

use crate::config::FrontierConfig;
use crate::config::MeanKind;
use crate::config::ReturnKind;
use crate::data::ReturnMatrix;
use crate::error::FrontierError;
use crate::error::FrontierResult;

/// Estimated first and second moments of the aligned returns.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MomentEstimate {
  /// Expected return per asset.
  pub mean: DVector<f64>,
  /// Covariance matrix, symmetric and positive definite after validation.
  pub cov: DMatrix<f64>,
  /// Number of aligned periods behind the estimate.
  pub periods: usize,
}

impl MomentEstimate {
  pub fn n_assets(&self) -> usize {
    self.mean.len()
  }

  /// Correlation matrix derived from the covariance.
  pub fn correlation(&self) -> DMatrix<f64> {
    let n = self.n_assets();
    let mut corr = DMatrix::identity(n, n);

    for i in 0..n {
      for j in 0..n {
        if i == j {
          continue;
        }
        let denom = (self.cov[(i, i)].max(0.0) * self.cov[(j, j)].max(0.0)).sqrt();
        corr[(i, j)] = if denom > 1e-15 {
          (self.cov[(i, j)] / denom).clamp(-1.0, 1.0)
        } else {
          0.0
        };
      }
    }

    corr
  }
}

/// Estimate [`MomentEstimate`] from an aligned return matrix.
pub fn estimate_moments(
  returns: &ReturnMatrix,
  config: &FrontierConfig,
) -> FrontierResult<MomentEstimate> {
  let t = returns.n_periods();
  let n = returns.n_assets();

  if t <= n {
    return Err(FrontierError::IllConditionedCovariance {
      detail: format!("{t} periods cannot identify a covariance over {n} assets"),
    });
  }

  let mut center = vec![0.0; n];
  for j in 0..n {
    let mut acc = 0.0;
    for k in 0..t {
      acc += returns.returns[[k, j]];
    }
    center[j] = acc / t as f64;
  }

  let mut mean = DVector::zeros(n);
  for j in 0..n {
    mean[j] = match config.mean_kind {
      MeanKind::Arithmetic => center[j],
      MeanKind::Geometric => geometric_mean(returns, config.return_kind, j)?,
    };
  }

  let mut cov = DMatrix::zeros(n, n);
  for i in 0..n {
    for j in i..n {
      let mut acc = 0.0;
      for k in 0..t {
        acc += (returns.returns[[k, i]] - center[i]) * (returns.returns[[k, j]] - center[j]);
      }
      let value = acc / (t - 1) as f64;
      cov[(i, j)] = value;
      cov[(j, i)] = value;
    }
  }

  if let Some(delta) = config.shrinkage {
    if !(0.0..=1.0).contains(&delta) {
      return Err(FrontierError::InvariantViolation {
        stage: "moment estimator",
        detail: format!("shrinkage weight {delta} outside [0, 1]"),
      });
    }
    for i in 0..n {
      for j in 0..n {
        if i != j {
          cov[(i, j)] *= 1.0 - delta;
        }
      }
    }
  }

  if config.annualize {
    let periods_per_year = config.period.periods_per_year();
    mean *= periods_per_year;
    cov *= periods_per_year;
  }

  validate_covariance(&cov, config.covariance_condition_threshold)?;

  Ok(MomentEstimate {
    mean,
    cov,
    periods: t,
  })
}

fn geometric_mean(returns: &ReturnMatrix, kind: ReturnKind, j: usize) -> FrontierResult<f64> {
  let t = returns.n_periods();
  let mut growth = 1.0;

  for k in 0..t {
    let r = returns.returns[[k, j]];
    let g = match kind {
      ReturnKind::Simple => 1.0 + r,
      ReturnKind::Log => r.exp(),
    };
    if g <= 0.0 {
      return Err(FrontierError::InvariantViolation {
        stage: "moment estimator",
        detail: format!("growth factor {g} for asset column {j} is not positive"),
      });
    }
    growth *= g;
  }

  Ok(growth.powf(1.0 / t as f64) - 1.0)
}

/// Validate symmetry side-effects of estimation: eigenvalues must be
/// non-negative and the condition number below the configured threshold.
pub(crate) fn validate_covariance(
  cov: &DMatrix<f64>,
  condition_threshold: f64,
) -> FrontierResult<()> {
  let eigen = cov.clone().symmetric_eigen();

  let mut lo = f64::INFINITY;
  let mut hi = f64::NEG_INFINITY;
  for &value in eigen.eigenvalues.iter() {
    lo = lo.min(value);
    hi = hi.max(value);
  }

  let scale = hi.abs().max(1e-300);
  if lo < -1e-10 * scale {
    return Err(FrontierError::IllConditionedCovariance {
      detail: format!("negative eigenvalue {lo:.6e}"),
    });
  }
  if lo <= 1e-14 * scale {
    return Err(FrontierError::IllConditionedCovariance {
      detail: format!("singular within tolerance, smallest eigenvalue {lo:.6e}"),
    });
  }
  let condition = hi / lo;
  if condition > condition_threshold {
    return Err(FrontierError::IllConditionedCovariance {
      detail: format!("condition number {condition:.3e} exceeds threshold {condition_threshold:.3e}"),
    });
  }

  Ok(())
}
