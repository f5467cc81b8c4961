//! # Asset Universe
//!
//! $$
//! \mathcal{A} = \{a_1, \dots, a_n\}
//! $$
//!
//! Ordered asset universe with class tags, per-asset weight caps and
//! chronological close-price histories.

use anyhow::Result;
use anyhow::bail;
use chrono::NaiveDate;
use impl_new_derive::ImplNew;

/// Asset class used for transaction-cost lookup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum AssetClass {
  /// Exchange-traded fund.
  #[default]
  Etf,
  /// Single-name equity.
  Equity,
  /// Crypto asset.
  Crypto,
}

impl AssetClass {
  /// Parse an asset class from string.
  pub fn from_str(s: &str) -> Self {
    match s.to_lowercase().as_str() {
      "equity" | "stock" => Self::Equity,
      "crypto" | "coin" => Self::Crypto,
      _ => Self::Etf,
    }
  }
}

/// Universe member with class tag and optional weight cap.
#[derive(ImplNew, Clone, Debug)]
pub struct Asset {
  /// Asset ticker, unique within its universe.
  pub ticker: String,
  /// Class used for cost-rate lookup.
  pub class: AssetClass,
  /// Optional per-asset maximum weight in (0, 1].
  pub max_weight: Option<f64>,
}

/// Ordered set of unique assets.
#[derive(Clone, Debug)]
pub struct AssetUniverse {
  assets: Vec<Asset>,
}

impl AssetUniverse {
  /// Build a universe from an ordered asset list.
  pub fn new(assets: Vec<Asset>) -> Result<Self> {
    for (i, asset) in assets.iter().enumerate() {
      if asset.ticker.is_empty() {
        bail!("asset ticker must not be empty");
      }
      if assets[..i].iter().any(|a| a.ticker == asset.ticker) {
        bail!("duplicate asset ticker: {}", asset.ticker);
      }
      if let Some(cap) = asset.max_weight {
        if !cap.is_finite() || cap <= 0.0 || cap > 1.0 {
          bail!("max weight for {} must be in (0, 1]", asset.ticker);
        }
      }
    }

    Ok(Self { assets })
  }

  /// Number of assets.
  pub fn len(&self) -> usize {
    self.assets.len()
  }

  /// Whether the universe has no members.
  pub fn is_empty(&self) -> bool {
    self.assets.is_empty()
  }

  /// Assets in insertion order.
  pub fn assets(&self) -> &[Asset] {
    &self.assets
  }

  /// Look up an asset by ticker.
  pub fn get(&self, ticker: &str) -> Option<&Asset> {
    self.assets.iter().find(|a| a.ticker == ticker)
  }

  /// Whether the ticker belongs to the universe.
  pub fn contains(&self, ticker: &str) -> bool {
    self.get(ticker).is_some()
  }

  /// Tickers in insertion order.
  pub fn tickers(&self) -> Vec<&str> {
    self.assets.iter().map(|a| a.ticker.as_str()).collect()
  }
}

/// Chronological close-price series for one asset.
#[derive(Clone, Debug, Default)]
pub struct PriceHistory {
  dates: Vec<NaiveDate>,
  closes: Vec<f64>,
}

impl PriceHistory {
  /// Empty history.
  pub fn new() -> Self {
    Self::default()
  }

  /// Build a history from parallel date and close vectors.
  pub fn from_series(dates: Vec<NaiveDate>, closes: Vec<f64>) -> Result<Self> {
    if dates.len() != closes.len() {
      bail!("dates and closes must have the same length");
    }

    let mut history = Self::new();
    for (date, close) in dates.into_iter().zip(closes) {
      history.push(date, close)?;
    }
    Ok(history)
  }

  /// Append one observation, keeping dates strictly increasing.
  pub fn push(&mut self, date: NaiveDate, close: f64) -> Result<()> {
    if !close.is_finite() || close <= 0.0 {
      bail!("close must be positive and finite, got {close}");
    }
    if let Some(last) = self.dates.last() {
      if date <= *last {
        bail!("dates must be strictly increasing, got {date} after {last}");
      }
    }

    self.dates.push(date);
    self.closes.push(close);
    Ok(())
  }

  /// Number of observations.
  pub fn len(&self) -> usize {
    self.closes.len()
  }

  /// Whether no observation was recorded.
  pub fn is_empty(&self) -> bool {
    self.closes.is_empty()
  }

  /// Close series in chronological order.
  pub fn closes(&self) -> &[f64] {
    &self.closes
  }

  /// Date series in chronological order.
  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }
}

#[cfg(test)]
mod tests {
  use chrono::Days;

  use super::*;

  fn day(offset: u64) -> NaiveDate {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    start + Days::new(offset)
  }

  #[test]
  fn universe_rejects_duplicate_tickers() {
    let assets = vec![
      Asset::new("SPY".to_string(), AssetClass::Etf, None),
      Asset::new("SPY".to_string(), AssetClass::Etf, None),
    ];
    assert!(AssetUniverse::new(assets).is_err());
  }

  #[test]
  fn universe_rejects_invalid_weight_cap() {
    let assets = vec![Asset::new("SPY".to_string(), AssetClass::Etf, Some(1.5))];
    assert!(AssetUniverse::new(assets).is_err());

    let assets = vec![Asset::new("SPY".to_string(), AssetClass::Etf, Some(0.0))];
    assert!(AssetUniverse::new(assets).is_err());
  }

  #[test]
  fn universe_preserves_insertion_order() {
    let assets = vec![
      Asset::new("QQQ".to_string(), AssetClass::Etf, None),
      Asset::new("BTC-USD".to_string(), AssetClass::Crypto, Some(0.2)),
      Asset::new("SPY".to_string(), AssetClass::Etf, None),
    ];
    let universe = AssetUniverse::new(assets).unwrap();

    assert_eq!(universe.tickers(), vec!["QQQ", "BTC-USD", "SPY"]);
    assert_eq!(universe.get("BTC-USD").unwrap().class, AssetClass::Crypto);
  }

  #[test]
  fn price_history_rejects_non_increasing_dates() {
    let mut history = PriceHistory::new();
    history.push(day(1), 100.0).unwrap();
    assert!(history.push(day(1), 101.0).is_err());
    assert!(history.push(day(0), 101.0).is_err());
    assert!(history.push(day(2), 101.0).is_ok());

    // rejected pushes leave no residue
    assert_eq!(history.dates(), &[day(1), day(2)]);
    assert_eq!(history.closes(), &[100.0, 101.0]);
  }

  #[test]
  fn price_history_rejects_non_positive_close() {
    let mut history = PriceHistory::new();
    assert!(history.push(day(0), 0.0).is_err());
    assert!(history.push(day(0), -1.0).is_err());
    assert!(history.push(day(0), f64::NAN).is_err());
  }

  #[test]
  fn price_history_from_series_checks_lengths() {
    let dates = vec![day(0), day(1)];
    assert!(PriceHistory::from_series(dates, vec![100.0]).is_err());
  }

  #[test]
  fn asset_class_from_str() {
    assert_eq!(AssetClass::from_str("crypto"), AssetClass::Crypto);
    assert_eq!(AssetClass::from_str("stock"), AssetClass::Equity);
    assert_eq!(AssetClass::from_str("anything"), AssetClass::Etf);
  }
}
