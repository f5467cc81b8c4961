//! # Rotation Engine
//!
//! $$
//! \mathbf{w}_{t+1} = \operatorname{Blend}\big(\operatorname{Scale}(\operatorname{Solve}(\Sigma_{\text{sel}})), \mathbf{w}_t\big)
//! $$
//!
//! High-level orchestration of one rotation cycle: rank, select, solve,
//! scale, cap and blend.

use std::collections::BTreeMap;

use anyhow::Result;
use anyhow::bail;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::blend::blend_constraints;
use crate::config::RotationConfig;
use crate::cov::CovarianceMatrix;
use crate::momentum::MomentumReport;
use crate::momentum::rank_universe;
use crate::scaler::scale_weights;
use crate::solver::solve_weights;
use crate::types::RotationResult;
use crate::types::SolverStatus;
use crate::types::WeightVector;
use crate::universe::AssetUniverse;
use crate::universe::PriceHistory;

/// Single entry-point engine for rotation cycles.
///
/// Holds an immutable configuration only, so one engine can serve
/// concurrent `rotate` calls for different dates or portfolios.
#[derive(Clone, Debug)]
pub struct RotationEngine {
  config: RotationConfig,
}

impl RotationEngine {
  /// Construct a new engine with explicit configuration.
  pub fn new(config: RotationConfig) -> Self {
    Self { config }
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &RotationConfig {
    &self.config
  }

  /// Rank the universe without running the weighting stages.
  pub fn rank(
    &self,
    prices: &BTreeMap<String, PriceHistory>,
    trend: &BTreeMap<String, bool>,
    universe: &AssetUniverse,
  ) -> MomentumReport {
    rank_universe(prices, trend, universe, &self.config)
  }

  /// Run one full rotation cycle against the previous weights.
  ///
  /// Business conditions such as short histories, solver failure or an
  /// empty selection take fallback paths and never raise; errors are
  /// reserved for malformed configuration and identifier mismatches.
  pub fn rotate(
    &self,
    prices: &BTreeMap<String, PriceHistory>,
    cov: &CovarianceMatrix,
    trend: &BTreeMap<String, bool>,
    previous: &WeightVector,
    universe: &AssetUniverse,
  ) -> Result<RotationResult> {
    self.config.validate()?;
    validate_previous_weights(previous, universe)?;
    validate_safe_haven_cover(&self.config, universe)?;

    let report = rank_universe(prices, trend, universe, &self.config);
    let ranks = report.ranks();
    let MomentumReport {
      skipped,
      defense,
      eligible,
      ..
    } = report;

    let (candidate, defense_mode, solver_status, scale) = if defense {
      info!("defense trigger active, rotating into the safe-haven book");
      (self.config.safe_haven_weights(), true, None, None)
    } else {
      let selected = cov.select(&eligible)?;
      let solved = solve_weights(&selected, &self.config);

      if solved.status == SolverStatus::Empty {
        warn!("weight solving produced an empty book, rotating into the safe-haven book");
        (
          self.config.safe_haven_weights(),
          true,
          Some(SolverStatus::Empty),
          None,
        )
      } else {
        let (scaled, diag) = scale_weights(&solved.weights, &selected, &self.config);
        let capped = apply_weight_caps(scaled, universe);
        (capped, false, Some(solved.status), Some(diag))
      }
    };

    let outcome = blend_constraints(previous, &candidate, universe, &self.config);
    let mut weights = outcome.weights;
    pad_universe(&mut weights, universe);

    Ok(RotationResult {
      weights,
      turnover: outcome.turnover,
      estimated_cost: outcome.estimated_cost,
      defense_mode,
      solver_status,
      scale,
      blend_steps: outcome.steps,
      skipped,
      ranks,
    })
  }
}

fn validate_previous_weights(previous: &WeightVector, universe: &AssetUniverse) -> Result<()> {
  for (ticker, &weight) in previous {
    if !universe.contains(ticker) {
      bail!("previous weights reference {ticker}, which is not in the universe");
    }
    if !weight.is_finite() || weight < 0.0 {
      bail!("previous weight for {ticker} must be finite and non-negative, got {weight}");
    }
  }
  Ok(())
}

fn validate_safe_haven_cover(config: &RotationConfig, universe: &AssetUniverse) -> Result<()> {
  for (ticker, _) in &config.safe_haven {
    if !universe.contains(ticker) {
      bail!("safe-haven asset {ticker} is not in the universe");
    }
  }
  Ok(())
}

/// Clip each weight at its per-asset maximum, leaving the excess as cash.
fn apply_weight_caps(weights: WeightVector, universe: &AssetUniverse) -> WeightVector {
  weights
    .into_iter()
    .map(|(ticker, weight)| {
      let cap = universe.get(&ticker).and_then(|a| a.max_weight);
      match cap {
        Some(cap) if weight > cap => {
          debug!("clipping {ticker} from {weight:.4} to its cap {cap:.4}");
          (ticker, cap)
        }
        _ => (ticker, weight),
      }
    })
    .collect()
}

fn pad_universe(weights: &mut WeightVector, universe: &AssetUniverse) {
  for asset in universe.assets() {
    weights.entry(asset.ticker.clone()).or_insert(0.0);
  }
}
