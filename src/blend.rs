//! # Turnover & Cost Blender
//!
//! $$
//! \mathbf{w}' = \mathbf{w}_{\text{prev}} + r \, (\mathbf{w}_{\text{cand}} - \mathbf{w}_{\text{prev}})
//! $$
//!
//! Pulls candidate weights back toward the previous allocation until the
//! one-way turnover and estimated transaction-cost budgets hold.

use std::collections::BTreeSet;

use tracing::debug;

use crate::config::RotationConfig;
use crate::types::BlendConstraint;
use crate::types::BlendStep;
use crate::types::WeightVector;
use crate::universe::AssetUniverse;

/// Slack added to both budgets before a blend is considered necessary.
pub const BLEND_EPSILON: f64 = 1e-9;

/// Blend passes before the result is accepted as-is.
const MAX_BLEND_PASSES: usize = 2;

/// Blended weights together with the budgets measured on them.
#[derive(Clone, Debug)]
pub struct BlendOutcome {
  /// Weights after all applied blends.
  pub weights: WeightVector,
  /// One-way turnover of the blended weights against the previous ones.
  pub turnover: f64,
  /// Estimated transaction cost of moving to the blended weights.
  pub estimated_cost: f64,
  /// Audit trail of the applied blends, empty when nothing bound.
  pub steps: Vec<BlendStep>,
}

fn key_union<'a>(a: &'a WeightVector, b: &'a WeightVector) -> BTreeSet<&'a str> {
  a.keys()
    .map(String::as_str)
    .chain(b.keys().map(String::as_str))
    .collect()
}

/// One-way turnover $\frac{1}{2} \sum_i |w_i' - w_i|$ over the key union.
pub fn turnover(previous: &WeightVector, candidate: &WeightVector) -> f64 {
  let gross: f64 = key_union(previous, candidate)
    .into_iter()
    .map(|key| {
      let prev = previous.get(key).copied().unwrap_or(0.0);
      let cand = candidate.get(key).copied().unwrap_or(0.0);
      (cand - prev).abs()
    })
    .sum();

  gross / 2.0
}

/// Estimated rebalance cost, each traded notional charged at its class rate.
pub fn estimated_cost(
  previous: &WeightVector,
  candidate: &WeightVector,
  universe: &AssetUniverse,
  config: &RotationConfig,
) -> f64 {
  key_union(previous, candidate)
    .into_iter()
    .map(|key| {
      let prev = previous.get(key).copied().unwrap_or(0.0);
      let cand = candidate.get(key).copied().unwrap_or(0.0);
      let class = universe.get(key).map(|a| a.class).unwrap_or_default();
      (cand - prev).abs() * config.cost_rate(class)
    })
    .sum()
}

fn blend_toward(previous: &WeightVector, candidate: &WeightVector, ratio: f64) -> WeightVector {
  key_union(previous, candidate)
    .into_iter()
    .map(|key| {
      let prev = previous.get(key).copied().unwrap_or(0.0);
      let cand = candidate.get(key).copied().unwrap_or(0.0);
      (key.to_string(), prev + ratio * (cand - prev))
    })
    .collect()
}

/// Blend the candidate toward the previous weights until both budgets hold.
///
/// Each pass checks turnover first and cost second, scaling the move by the
/// exceeded budget's ratio. Both measures are linear in the move, so a
/// candidate within budgets comes back untouched with no recorded steps.
pub fn blend_constraints(
  previous: &WeightVector,
  candidate: &WeightVector,
  universe: &AssetUniverse,
  config: &RotationConfig,
) -> BlendOutcome {
  let mut current = candidate.clone();
  let mut steps = Vec::new();

  for _ in 0..MAX_BLEND_PASSES {
    let measured_turnover = turnover(previous, &current);
    let measured_cost = estimated_cost(previous, &current, universe, config);
    if measured_turnover <= config.max_monthly_turnover + BLEND_EPSILON
      && measured_cost <= config.max_monthly_cost + BLEND_EPSILON
    {
      break;
    }

    if measured_turnover > config.max_monthly_turnover + BLEND_EPSILON {
      let ratio = (config.max_monthly_turnover / measured_turnover).clamp(0.0, 1.0);
      current = blend_toward(previous, &current, ratio);
      let step = BlendStep {
        constraint: BlendConstraint::Turnover,
        ratio,
        turnover_after: turnover(previous, &current),
        cost_after: estimated_cost(previous, &current, universe, config),
      };
      debug!(
        "turnover {measured_turnover:.4} over budget {:.4}, blended by {ratio:.4}",
        config.max_monthly_turnover
      );
      steps.push(step);
    }

    let measured_cost = estimated_cost(previous, &current, universe, config);
    if measured_cost > config.max_monthly_cost + BLEND_EPSILON {
      let ratio = (config.max_monthly_cost / measured_cost).clamp(0.0, 1.0);
      current = blend_toward(previous, &current, ratio);
      let step = BlendStep {
        constraint: BlendConstraint::Cost,
        ratio,
        turnover_after: turnover(previous, &current),
        cost_after: estimated_cost(previous, &current, universe, config),
      };
      debug!(
        "cost {measured_cost:.6} over budget {:.6}, blended by {ratio:.4}",
        config.max_monthly_cost
      );
      steps.push(step);
    }
  }

  BlendOutcome {
    turnover: turnover(previous, &current),
    estimated_cost: estimated_cost(previous, &current, universe, config),
    weights: current,
    steps,
  }
}
