//! # Volatility Target Scaler
//!
//! $$
//! f = \mathrm{clamp}\Big( \frac{\sigma_{\text{target}}}{\sigma_{\text{realized}}}, 0, L_{\max} \Big)
//! $$
//!
//! Scales solved weights toward an annualized volatility target under a
//! hard leverage cap.

use tracing::warn;

use crate::config::RotationConfig;
use crate::cov::CovarianceMatrix;
use crate::types::ScaleDiagnostics;
use crate::types::WeightVector;

/// Realized volatility below this is treated as degenerate.
pub const VOL_EPSILON: f64 = 1e-12;

/// Annualized portfolio volatility $\sqrt{\mathbf{w}^\top \Sigma \mathbf{w}}$.
///
/// Weights on assets the matrix does not cover contribute nothing.
pub fn portfolio_volatility(weights: &WeightVector, cov: &CovarianceMatrix) -> f64 {
  let w: Vec<f64> = cov
    .tickers()
    .iter()
    .map(|t| weights.get(t).copied().unwrap_or(0.0))
    .collect();

  let mut var = 0.0;
  for (i, wi) in w.iter().enumerate() {
    for (j, wj) in w.iter().enumerate() {
      var += wi * wj * cov.entry(i, j);
    }
  }

  var.max(0.0).sqrt()
}

/// Scale weights by the target-to-realized volatility ratio.
///
/// A degenerate realized volatility leaves the weights untouched and is
/// flagged in the diagnostics rather than producing infinite leverage.
pub fn scale_weights(
  weights: &WeightVector,
  cov: &CovarianceMatrix,
  config: &RotationConfig,
) -> (WeightVector, ScaleDiagnostics) {
  let realized = portfolio_volatility(weights, cov);

  if !realized.is_finite() || realized <= VOL_EPSILON {
    warn!("degenerate realized volatility {realized}, skipping scaling");
    return (
      weights.clone(),
      ScaleDiagnostics {
        realized_vol: realized,
        factor: 1.0,
        degenerate: true,
      },
    );
  }

  let factor = (config.target_volatility / realized).clamp(0.0, config.max_leverage);
  let scaled = weights.iter().map(|(t, w)| (t.clone(), w * factor)).collect();

  (
    scaled,
    ScaleDiagnostics {
      realized_vol: realized,
      factor,
      degenerate: false,
    },
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  fn diagonal_matrix(tickers: &[&str], variances: &[f64]) -> CovarianceMatrix {
    let n = tickers.len();
    let rows = (0..n)
      .map(|i| (0..n).map(|j| if i == j { variances[i] } else { 0.0 }).collect())
      .collect();
    CovarianceMatrix::new(tickers.iter().map(|t| t.to_string()).collect(), rows).unwrap()
  }

  fn half_half() -> WeightVector {
    WeightVector::from([("A".to_string(), 0.5), ("B".to_string(), 0.5)])
  }

  #[test]
  fn scaling_reaches_the_target_when_unclamped() {
    let cov = diagonal_matrix(&["A", "B"], &[0.04, 0.04]);
    let config = RotationConfig::default();

    let (scaled, diag) = scale_weights(&half_half(), &cov, &config);
    assert!(!diag.degenerate);
    assert!((portfolio_volatility(&scaled, &cov) - config.target_volatility).abs() < 1e-12);
  }

  #[test]
  fn book_already_at_target_is_untouched() {
    let cov = diagonal_matrix(&["A", "B"], &[0.04, 0.04]);
    let weights = half_half();
    let config = RotationConfig {
      target_volatility: portfolio_volatility(&weights, &cov),
      ..RotationConfig::default()
    };

    let (scaled, diag) = scale_weights(&weights, &cov, &config);
    assert!((diag.factor - 1.0).abs() < f64::EPSILON);
    assert_eq!(scaled, weights);
  }

  #[test]
  fn leverage_cap_binds_for_low_volatility() {
    // sigma 2% per asset, far below the 15% target
    let cov = diagonal_matrix(&["A", "B"], &[0.0004, 0.0004]);
    let config = RotationConfig::default();

    let (scaled, diag) = scale_weights(&half_half(), &cov, &config);
    assert!((diag.factor - config.max_leverage).abs() < 1e-12);

    let sum: f64 = scaled.values().sum();
    assert!((sum - config.max_leverage).abs() < 1e-12);
  }

  #[test]
  fn unit_factor_leaves_weights_bitwise_identical() {
    // realized vol above the target never happens here, so the clamp at a
    // leverage cap of one pins the factor to exactly 1.0
    let cov = diagonal_matrix(&["A", "B"], &[0.01, 0.01]);
    let config = RotationConfig {
      max_leverage: 1.0,
      ..RotationConfig::default()
    };

    let weights = half_half();
    let (scaled, diag) = scale_weights(&weights, &cov, &config);
    assert!((diag.factor - 1.0).abs() < f64::EPSILON);
    for (ticker, w) in &weights {
      assert_eq!(scaled[ticker], *w);
    }
  }

  #[test]
  fn zero_volatility_is_flagged_degenerate() {
    let cov = diagonal_matrix(&["A", "B"], &[0.0, 0.0]);
    let config = RotationConfig::default();

    let weights = half_half();
    let (scaled, diag) = scale_weights(&weights, &cov, &config);
    assert!(diag.degenerate);
    assert!((diag.factor - 1.0).abs() < f64::EPSILON);
    assert_eq!(scaled, weights);
  }
}
