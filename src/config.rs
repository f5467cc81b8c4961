//! # Rotation Configuration
//!
//! $$
//! \theta = (\ell, s, q_{top}, q_{bot}, \tau, \sigma^{*}, L, T_{max}, C_{max})
//! $$
//!
//! Immutable per-cycle configuration with fail-fast validation.

use std::collections::BTreeMap;

use anyhow::Result;
use anyhow::bail;

use crate::types::WeightVector;
use crate::universe::AssetClass;

/// Cost rate applied when an asset class has no configured rate.
pub const DEFAULT_COST_RATE: f64 = 0.0005;

/// Primary weighting method used before any fallback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SolverMethod {
  /// Equalized marginal risk contributions via Nelder-Mead.
  #[default]
  RiskParity,
  /// Hierarchical risk parity via seriation and recursive bisection.
  Hrp,
}

impl SolverMethod {
  /// Parse a solver method from string.
  pub fn from_str(s: &str) -> Self {
    match s.to_lowercase().as_str() {
      "hrp" | "hierarchical" => Self::Hrp,
      _ => Self::RiskParity,
    }
  }
}

/// Immutable configuration for one rotation cycle.
#[derive(Clone, Debug)]
pub struct RotationConfig {
  /// Momentum lookback window in trading days.
  pub lookback_window: usize,
  /// Trailing window purged from the momentum signal, in trading days.
  pub skip_window: usize,
  /// Percentile rank at or above which an asset is in the top band.
  pub top_cut: f64,
  /// Percentile rank at or below which an asset is excluded.
  pub bottom_cut: f64,
  /// Defense triggers when the top-band trend-pass fraction is below this.
  pub defense_threshold: f64,
  /// Primary weighting method.
  pub solver: SolverMethod,
  /// Annualized portfolio volatility target.
  pub target_volatility: f64,
  /// Upper bound on the volatility scale factor.
  pub max_leverage: f64,
  /// Monthly turnover ceiling.
  pub max_monthly_turnover: f64,
  /// Monthly transaction-cost budget as a fraction of portfolio value.
  pub max_monthly_cost: f64,
  /// Cost rate per asset class, as a fraction of traded value.
  pub cost_rates: BTreeMap<AssetClass, f64>,
  /// Safe-haven allocation applied in defense mode.
  pub safe_haven: Vec<(String, f64)>,
}

impl Default for RotationConfig {
  fn default() -> Self {
    let mut cost_rates = BTreeMap::new();
    cost_rates.insert(AssetClass::Etf, 0.0005);
    cost_rates.insert(AssetClass::Equity, 0.001);
    cost_rates.insert(AssetClass::Crypto, 0.002);

    Self {
      lookback_window: 252,
      skip_window: 21,
      top_cut: 0.7,
      bottom_cut: 0.3,
      defense_threshold: 0.5,
      solver: SolverMethod::RiskParity,
      target_volatility: 0.15,
      max_leverage: 1.5,
      max_monthly_turnover: 0.4,
      max_monthly_cost: 0.002,
      cost_rates,
      safe_haven: vec![("GLD".to_string(), 0.5), ("TLT".to_string(), 0.5)],
    }
  }
}

impl RotationConfig {
  /// Validate the configuration, failing fast on malformed fields.
  pub fn validate(&self) -> Result<()> {
    if self.lookback_window == 0 {
      bail!("lookback_window must be positive");
    }
    if self.skip_window >= self.lookback_window {
      bail!("skip_window must be smaller than lookback_window");
    }
    if !(0.0..=1.0).contains(&self.top_cut) || !(0.0..=1.0).contains(&self.bottom_cut) {
      bail!("percentile cut points must lie in [0, 1]");
    }
    if self.bottom_cut >= self.top_cut {
      bail!("bottom_cut must be below top_cut");
    }
    if !(0.0..=1.0).contains(&self.defense_threshold) {
      bail!("defense_threshold must lie in [0, 1]");
    }
    if !self.target_volatility.is_finite() || self.target_volatility <= 0.0 {
      bail!("target_volatility must be positive and finite");
    }
    if !self.max_leverage.is_finite() || self.max_leverage <= 0.0 {
      bail!("max_leverage must be positive and finite");
    }
    if !self.max_monthly_turnover.is_finite() || self.max_monthly_turnover <= 0.0 {
      bail!("max_monthly_turnover must be positive and finite");
    }
    if !self.max_monthly_cost.is_finite() || self.max_monthly_cost <= 0.0 {
      bail!("max_monthly_cost must be positive and finite");
    }
    for (&class, &rate) in &self.cost_rates {
      if !rate.is_finite() || rate < 0.0 {
        bail!("cost rate for {class:?} must be non-negative and finite");
      }
    }

    let mut safe_sum = 0.0;
    for (i, (ticker, weight)) in self.safe_haven.iter().enumerate() {
      if ticker.is_empty() {
        bail!("safe-haven ticker must not be empty");
      }
      if self.safe_haven[..i].iter().any(|(t, _)| t == ticker) {
        bail!("duplicate safe-haven ticker: {ticker}");
      }
      if !weight.is_finite() || *weight <= 0.0 {
        bail!("safe-haven weight for {ticker} must be positive and finite");
      }
      safe_sum += weight;
    }
    if safe_sum > 1.0 + 1e-9 {
      bail!("safe-haven weights must sum to at most 1, got {safe_sum}");
    }

    Ok(())
  }

  /// Cost rate for an asset class, falling back to [`DEFAULT_COST_RATE`].
  pub fn cost_rate(&self, class: AssetClass) -> f64 {
    self
      .cost_rates
      .get(&class)
      .copied()
      .unwrap_or(DEFAULT_COST_RATE)
  }

  /// Safe-haven allocation as a weight map.
  pub fn safe_haven_weights(&self) -> WeightVector {
    self
      .safe_haven
      .iter()
      .map(|(ticker, weight)| (ticker.clone(), *weight))
      .collect()
  }
}
