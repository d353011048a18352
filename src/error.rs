//! # Errors
//!
//! $$
//! \kappa(\Sigma)=\frac{\lambda_{\max}(\Sigma)}{\lambda_{\min}(\Sigma)}
//! $$
//!
//! Failure taxonomy of the optimization engine. Every failure is raised at the
//! point of detection with the stage and offending input; no stage downgrades
//! a failure to a default value or returns a partial result.

use chrono::NaiveDate;
use thiserror::Error;

/// Crate-wide result alias.
pub type FrontierResult<T> = Result<T, FrontierError>;

/// Failures surfaced by the optimization engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrontierError {
  /// A non-positive or non-finite price was observed before return computation.
  #[error("invalid price {price} for {ticker} at {date}")]
  InvalidPrice {
    ticker: String,
    date: NaiveDate,
    price: f64,
  },

  /// Too few aligned periods remain after resampling and alignment.
  #[error("insufficient aligned history: {available} periods available, {required} required")]
  InsufficientData { available: usize, required: usize },

  /// The covariance estimate is singular or numerically near-singular.
  #[error("ill-conditioned covariance: {detail}")]
  IllConditionedCovariance { detail: String },

  /// The bounded active-set solve exhausted its iteration budget.
  #[error("solver did not converge within {max_iterations} iterations")]
  SolverDidNotConverge { max_iterations: usize },

  /// The risk-free rate is not exceeded by any frontier return.
  #[error("no tangency portfolio exists for risk-free rate {risk_free_rate}")]
  NoTangencyPortfolio { risk_free_rate: f64 },

  /// Defensive post-condition check failed; indicates a solver regression.
  #[error("invariant violation in {stage}: {detail}")]
  InvariantViolation { stage: &'static str, detail: String },
}
