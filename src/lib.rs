//! # rotation-rs
//!
//! $$
//! \mathbf{w}_{t+1} = \operatorname{Blend}\big(\operatorname{Scale}(\operatorname{Solve}(\Sigma_{\text{sel}})), \mathbf{w}_t\big)
//! $$
//!
//! Tactical rotation engine: cross-sectional momentum ranking with a
//! breadth-based defense trigger, risk-parity weight solving with an
//! inverse-volatility fallback, volatility-target scaling and
//! turnover/cost-constrained blending against the previous allocation.

pub mod blend;
pub mod config;
pub mod cov;
pub mod engine;
pub mod momentum;
pub mod scaler;
pub mod solver;
pub mod types;
pub mod universe;

pub use blend::BLEND_EPSILON;
pub use blend::BlendOutcome;
pub use blend::blend_constraints;
pub use blend::estimated_cost;
pub use blend::turnover;
pub use config::DEFAULT_COST_RATE;
pub use config::RotationConfig;
pub use config::SolverMethod;
pub use cov::CovarianceMatrix;
pub use cov::TRADING_DAYS;
pub use cov::align_return_series;
pub use cov::sample_covariance;
pub use cov::simple_returns_series;
pub use engine::RotationEngine;
pub use momentum::AssetMomentum;
pub use momentum::MomentumReport;
pub use momentum::SignalBand;
pub use momentum::momentum_score;
pub use momentum::rank_universe;
pub use scaler::VOL_EPSILON;
pub use scaler::portfolio_volatility;
pub use scaler::scale_weights;
pub use solver::MAX_SOLVER_ITERS;
pub use solver::PARITY_TOLERANCE;
pub use solver::inverse_vol_weights;
pub use solver::risk_contributions;
pub use solver::solve_weights;
pub use types::BlendConstraint;
pub use types::BlendStep;
pub use types::RotationResult;
pub use types::ScaleDiagnostics;
pub use types::SolvedWeights;
pub use types::SolverStatus;
pub use types::WeightVector;
pub use universe::Asset;
pub use universe::AssetClass;
pub use universe::AssetUniverse;
pub use universe::PriceHistory;
