//! # Momentum Ranker
//!
//! $$
//! m_i = \Big( \frac{P_{t-s}}{P_{t-\ell}} - 1 \Big) - \Big( \frac{P_t}{P_{t-s}} - 1 \Big)
//! $$
//!
//! Cross-sectional momentum scores, percentile ranks, signal bands and the
//! breadth-based defense trigger.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use rayon::iter::IntoParallelRefIterator;
use rayon::iter::ParallelIterator;
use tracing::warn;

use crate::config::RotationConfig;
use crate::universe::AssetUniverse;
use crate::universe::PriceHistory;

/// Per-asset signal classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalBand {
  /// Top band with a passing trend filter.
  Long,
  /// Middle band, neither selected nor excluded.
  Hold,
  /// Bottom band, or top band failing the trend filter.
  Avoid,
}

/// Momentum score, rank and band for one asset.
#[derive(Clone, Debug)]
pub struct AssetMomentum {
  /// Asset ticker.
  pub ticker: String,
  /// Cross-sectional momentum score.
  pub score: f64,
  /// Percentile rank in [0, 1] over the scored subset.
  pub rank: f64,
  /// Signal band derived from rank and trend filter.
  pub band: SignalBand,
  /// Externally supplied trend outcome, absent entries count as false.
  pub trend_pass: bool,
}

/// Ranked universe snapshot for one rebalance date.
#[derive(Clone, Debug)]
pub struct MomentumReport {
  /// Scored assets in universe order.
  pub momenta: Vec<AssetMomentum>,
  /// Assets excluded for insufficient history.
  pub skipped: Vec<String>,
  /// Breadth-based defense trigger.
  pub defense: bool,
  /// Top-band assets passing the trend filter, in universe order.
  pub eligible: Vec<String>,
}

impl MomentumReport {
  /// Percentile ranks keyed by ticker.
  pub fn ranks(&self) -> BTreeMap<String, f64> {
    self
      .momenta
      .iter()
      .map(|m| (m.ticker.clone(), m.rank))
      .collect()
  }

  /// Momentum scores keyed by ticker.
  pub fn scores(&self) -> BTreeMap<String, f64> {
    self
      .momenta
      .iter()
      .map(|m| (m.ticker.clone(), m.score))
      .collect()
  }
}

/// Cross-sectional momentum score over a close series.
///
/// Simple return from `t - lookback` to `t - skip`, with the most recent
/// skip-window return subtracted to purge short-horizon reversal.
///
/// # Panics
/// Panics when the series is shorter than `lookback + skip` observations.
pub fn momentum_score(closes: &[f64], lookback: usize, skip: usize) -> f64 {
  assert!(
    closes.len() >= lookback + skip,
    "need at least lookback + skip observations"
  );

  let last = closes.len() - 1;
  let p_now = closes[last];
  let p_skip = closes[last - skip];
  let p_lookback = closes[last - lookback];

  (p_skip / p_lookback - 1.0) - (p_now / p_skip - 1.0)
}

/// Score and rank the universe for one rebalance date.
///
/// Assets without enough history are skipped, not ranked. Scoring fans out
/// across assets and is re-collected in universe order before ranking.
pub fn rank_universe(
  prices: &BTreeMap<String, PriceHistory>,
  trend: &BTreeMap<String, bool>,
  universe: &AssetUniverse,
  config: &RotationConfig,
) -> MomentumReport {
  let min_len = config.lookback_window + config.skip_window;

  let scored: Vec<Option<f64>> = universe
    .assets()
    .par_iter()
    .map(|asset| {
      let history = match prices.get(&asset.ticker) {
        Some(h) => h,
        None => {
          warn!("no price history for {}, skipping", asset.ticker);
          return None;
        }
      };
      if history.len() < min_len {
        warn!(
          "{} has {} observations, need {min_len}, skipping",
          asset.ticker,
          history.len()
        );
        return None;
      }

      Some(momentum_score(
        history.closes(),
        config.lookback_window,
        config.skip_window,
      ))
    })
    .collect();

  let mut skipped = Vec::new();
  let mut scores: Vec<(String, f64)> = Vec::with_capacity(scored.len());
  for (asset, entry) in universe.assets().iter().zip(scored) {
    match entry {
      Some(score) => scores.push((asset.ticker.clone(), score)),
      None => skipped.push(asset.ticker.clone()),
    }
  }

  // Ordinal percentile ranks; the stable ascending sort keeps universe
  // insertion order for equal scores.
  let n = scores.len();
  let mut order: Vec<usize> = (0..n).collect();
  order.sort_by_key(|&i| OrderedFloat(scores[i].1));
  let mut ranks = vec![0.0; n];
  for (pos, &i) in order.iter().enumerate() {
    ranks[i] = (pos + 1) as f64 / n as f64;
  }

  let mut momenta = Vec::with_capacity(n);
  let mut top_count = 0usize;
  let mut top_pass = 0usize;
  let mut eligible = Vec::new();

  for (i, (ticker, score)) in scores.iter().enumerate() {
    let rank = ranks[i];
    let trend_pass = trend.get(ticker).copied().unwrap_or(false);
    let band = if rank >= config.top_cut {
      top_count += 1;
      if trend_pass {
        top_pass += 1;
        eligible.push(ticker.clone());
        SignalBand::Long
      } else {
        SignalBand::Avoid
      }
    } else if rank <= config.bottom_cut {
      SignalBand::Avoid
    } else {
      SignalBand::Hold
    };

    momenta.push(AssetMomentum {
      ticker: ticker.clone(),
      score: *score,
      rank,
      band,
      trend_pass,
    });
  }

  let defense = if top_count == 0 {
    true
  } else {
    (top_pass as f64 / top_count as f64) < config.defense_threshold
  };
  if defense {
    warn!("defense trigger: {top_pass} of {top_count} top-band assets pass the trend filter");
  }

  MomentumReport {
    momenta,
    skipped,
    defense,
    eligible,
  }
}
