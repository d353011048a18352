//! # frontier-rs
//!
//! $$
//! \min_{\mathbf{w}} \ \mathbf{w}^\top \Sigma \mathbf{w}
//! \quad \text{s.t.} \quad \mu^\top\mathbf{w} = r^\*, \ \mathbf{1}^\top\mathbf{w} = 1
//! $$
//!
//! Markowitz mean-variance optimization: aligned return series, moment
//! estimation, the efficient frontier and the tangency portfolio. The engine
//! is a pure function from price histories and configuration to an immutable
//! result; data fetching, persistence and presentation live elsewhere.

pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod frontier;
pub mod moments;
pub mod report;
pub mod solver;
pub mod tangency;

pub use config::FillPolicy;
pub use config::FrontierConfig;
pub use config::MeanKind;
pub use config::Period;
pub use config::ReturnKind;
pub use data::Asset;
pub use data::PricePoint;
pub use data::PriceSeries;
pub use data::ReturnMatrix;
pub use data::build_return_matrix;
pub use engine::FrontierEngine;
pub use engine::compute_efficient_frontier;
pub use error::FrontierError;
pub use error::FrontierResult;
pub use frontier::EfficientFrontier;
pub use frontier::FrontierPoint;
pub use frontier::solve_frontier;
pub use moments::MomentEstimate;
pub use moments::estimate_moments;
pub use report::OptimizationResult;
pub use report::assemble;
pub use solver::ConstraintSet;
pub use solver::global_minimum_variance;
pub use solver::max_attainable_return;
pub use solver::min_variance_at_target;
pub use solver::portfolio_return;
pub use solver::portfolio_volatility;
pub use tangency::TangencyPortfolio;
pub use tangency::select_tangency;
