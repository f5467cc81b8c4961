//! # Rotation Types
//!
//! $$
//! \mathbf{w}: \mathcal{A} \to [0, \infty)
//! $$
//!
//! Shared weight-map alias, status enums and result containers for the
//! rotation pipeline.

use std::collections::BTreeMap;

/// Portfolio weights keyed by asset ticker, zero for absent entries.
pub type WeightVector = BTreeMap<String, f64>;

/// Which weighting strategy produced the solver output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverStatus {
  /// Configured primary method converged and passed validation.
  Primary,
  /// Inverse-volatility fallback produced the weights.
  Fallback,
  /// No asset carried a positive finite volatility estimate.
  Empty,
}

/// Constraint that forced a blend step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendConstraint {
  /// Monthly turnover ceiling.
  Turnover,
  /// Monthly transaction-cost budget.
  Cost,
}

/// Audit record of a single applied blend.
#[derive(Clone, Debug)]
pub struct BlendStep {
  /// Constraint that forced the blend.
  pub constraint: BlendConstraint,
  /// Interpolation ratio toward the candidate, in [0, 1].
  pub ratio: f64,
  /// Turnover measured after the blend was applied.
  pub turnover_after: f64,
  /// Estimated cost measured after the blend was applied.
  pub cost_after: f64,
}

/// Diagnostics from the volatility-target scaling stage.
#[derive(Clone, Copy, Debug)]
pub struct ScaleDiagnostics {
  /// Annualized portfolio volatility estimated from the covariance input.
  pub realized_vol: f64,
  /// Uniform factor applied to the weights.
  pub factor: f64,
  /// Scaling was skipped because the volatility estimate was unusable.
  pub degenerate: bool,
}

/// Output of the weight-solving stage.
#[derive(Clone, Debug)]
pub struct SolvedWeights {
  /// Weights over the selected subset, non-negative, summing to 1.
  pub weights: WeightVector,
  /// Which strategy produced the weights.
  pub status: SolverStatus,
  /// Fraction of portfolio variance contributed per asset.
  pub risk_contributions: BTreeMap<String, f64>,
}

pub(crate) fn empty_solved() -> SolvedWeights {
  SolvedWeights {
    weights: WeightVector::new(),
    status: SolverStatus::Empty,
    risk_contributions: BTreeMap::new(),
  }
}

/// Output record of one full rotation cycle.
#[derive(Clone, Debug)]
pub struct RotationResult {
  /// Final weights, zero-padded across the universe.
  pub weights: WeightVector,
  /// Turnover realized against the previous weights.
  pub turnover: f64,
  /// Estimated transaction cost of the rebalance.
  pub estimated_cost: f64,
  /// Safe-haven override was applied this cycle.
  pub defense_mode: bool,
  /// Strategy that produced the raw weights, `None` when the solver was skipped.
  pub solver_status: Option<SolverStatus>,
  /// Volatility scaling diagnostics, `None` when scaling was skipped.
  pub scale: Option<ScaleDiagnostics>,
  /// Blend iterations applied to satisfy the turnover and cost budgets.
  pub blend_steps: Vec<BlendStep>,
  /// Assets excluded from ranking for lack of history.
  pub skipped: Vec<String>,
  /// Percentile ranks of the scored universe.
  pub ranks: BTreeMap<String, f64>,
}
