//! # Covariance
//!
//! $$
//! \Sigma_{ij} = \widehat{\operatorname{Cov}}(r_i, r_j) \cdot 252
//! $$
//!
//! Validated covariance wrapper with a definiteness probe, plus estimation
//! helpers for callers that build the matrix from return series.

use anyhow::Result;
use anyhow::bail;
use nalgebra::DMatrix;

/// Trading days per year used to annualize return statistics.
pub const TRADING_DAYS: f64 = 252.0;

const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Relative floor on Cholesky pivots before a matrix counts as definite.
const PIVOT_TOLERANCE: f64 = 1e-6;

/// Symmetric, finite covariance matrix over a named asset subset.
#[derive(Clone, Debug)]
pub struct CovarianceMatrix {
  tickers: Vec<String>,
  matrix: Vec<Vec<f64>>,
}

impl CovarianceMatrix {
  /// Validate and wrap a covariance matrix.
  pub fn new(tickers: Vec<String>, matrix: Vec<Vec<f64>>) -> Result<Self> {
    let n = tickers.len();
    if matrix.len() != n {
      bail!(
        "covariance must have one row per ticker, got {} rows for {n} tickers",
        matrix.len()
      );
    }
    for (i, ticker) in tickers.iter().enumerate() {
      if ticker.is_empty() {
        bail!("covariance ticker must not be empty");
      }
      if tickers[..i].iter().any(|t| t == ticker) {
        bail!("duplicate covariance ticker: {ticker}");
      }
    }
    for (i, row) in matrix.iter().enumerate() {
      if row.len() != n {
        bail!("covariance row {i} has length {}, expected {n}", row.len());
      }
      for (j, &value) in row.iter().enumerate() {
        if !value.is_finite() {
          bail!("covariance entry ({i}, {j}) is not finite");
        }
      }
    }
    for i in 0..n {
      for j in (i + 1)..n {
        if (matrix[i][j] - matrix[j][i]).abs() > SYMMETRY_TOLERANCE {
          bail!("covariance is not symmetric at ({i}, {j})");
        }
      }
    }

    Ok(Self { tickers, matrix })
  }

  /// Estimate an annualized covariance matrix from per-asset simple returns.
  pub fn from_returns(tickers: Vec<String>, returns: &[Vec<f64>]) -> Result<Self> {
    if returns.len() != tickers.len() {
      bail!("need one return series per ticker");
    }
    let aligned = align_return_series(returns);
    let n_obs = aligned.first().map(|r| r.len()).unwrap_or(0);
    if n_obs < 2 {
      bail!("need at least 2 aligned observations to estimate covariance");
    }

    Self::new(tickers, sample_covariance(&aligned))
  }

  /// Number of assets covered.
  pub fn len(&self) -> usize {
    self.tickers.len()
  }

  /// Whether the matrix covers no assets.
  pub fn is_empty(&self) -> bool {
    self.tickers.is_empty()
  }

  /// Tickers in matrix order.
  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  /// Matrix rows in ticker order.
  pub fn rows(&self) -> &[Vec<f64>] {
    &self.matrix
  }

  /// Covariance entry by index, zero when out of range.
  pub fn entry(&self, i: usize, j: usize) -> f64 {
    self
      .matrix
      .get(i)
      .and_then(|row| row.get(j))
      .copied()
      .unwrap_or(0.0)
  }

  /// Position of a ticker in matrix order.
  pub fn position(&self, ticker: &str) -> Option<usize> {
    self.tickers.iter().position(|t| t == ticker)
  }

  /// Diagonal variance for a ticker.
  pub fn variance(&self, ticker: &str) -> Option<f64> {
    self.position(ticker).map(|i| self.entry(i, i))
  }

  /// Restrict the matrix to a ticker subset, keeping the requested order.
  pub fn select(&self, tickers: &[String]) -> Result<Self> {
    let mut indices = Vec::with_capacity(tickers.len());
    for ticker in tickers {
      match self.position(ticker) {
        Some(i) => indices.push(i),
        None => bail!("covariance does not cover asset {ticker}"),
      }
    }

    let matrix = indices
      .iter()
      .map(|&i| indices.iter().map(|&j| self.matrix[i][j]).collect())
      .collect();
    Self::new(tickers.to_vec(), matrix)
  }

  /// Probe positive definiteness via Cholesky decomposition.
  ///
  /// Roundoff can leave an exactly singular matrix with a tiny positive
  /// final pivot, so the factor's diagonal is also checked against a
  /// tolerance relative to the largest input variance.
  pub fn is_positive_definite(&self) -> bool {
    let n = self.len();
    if n == 0 {
      return false;
    }

    let flat: Vec<f64> = self
      .matrix
      .iter()
      .flat_map(|row| row.iter().copied())
      .collect();
    match DMatrix::from_row_slice(n, n, &flat).cholesky() {
      Some(chol) => {
        let max_diag = (0..n).map(|i| self.matrix[i][i]).fold(0.0_f64, f64::max);
        let floor = PIVOT_TOLERANCE * max_diag.max(0.0).sqrt();
        let l = chol.l();
        (0..n).all(|i| l[(i, i)] > floor)
      }
      None => false,
    }
  }
}

fn sample_mean(xs: &[f64]) -> f64 {
  if xs.is_empty() {
    0.0
  } else {
    xs.iter().sum::<f64>() / xs.len() as f64
  }
}

/// Convert close prices to simple-return series.
pub fn simple_returns_series(closes: &[f64]) -> Vec<f64> {
  let mut out = Vec::with_capacity(closes.len().saturating_sub(1));
  for i in 1..closes.len() {
    if closes[i - 1] > 0.0 {
      out.push(closes[i] / closes[i - 1] - 1.0);
    }
  }
  out
}

/// Align multiple return series to common tail length.
pub fn align_return_series(all_returns: &[Vec<f64>]) -> Vec<Vec<f64>> {
  let min_len = all_returns.iter().map(|r| r.len()).min().unwrap_or(0);
  all_returns
    .iter()
    .map(|r| r[r.len().saturating_sub(min_len)..].to_vec())
    .collect()
}

/// Annualized sample covariance of aligned return series.
pub fn sample_covariance(aligned: &[Vec<f64>]) -> Vec<Vec<f64>> {
  let n = aligned.len();
  let n_obs = aligned.first().map(|r| r.len()).unwrap_or(0);
  let mut cov = vec![vec![0.0; n]; n];
  if n_obs < 2 {
    return cov;
  }

  let means: Vec<f64> = aligned.iter().map(|r| sample_mean(r)).collect();
  for i in 0..n {
    for j in i..n {
      let mut acc = 0.0;
      for t in 0..n_obs {
        acc += (aligned[i][t] - means[i]) * (aligned[j][t] - means[j]);
      }
      let value = acc / (n_obs - 1) as f64 * TRADING_DAYS;
      cov[i][j] = value;
      cov[j][i] = value;
    }
  }

  cov
}

pub(crate) fn corr_from_cov(cov: &[Vec<f64>]) -> Vec<Vec<f64>> {
  let n = cov.len();
  let mut corr = vec![vec![0.0; n]; n];

  for i in 0..n {
    let si = cov[i][i].max(0.0).sqrt();
    for j in 0..n {
      let sj = cov[j][j].max(0.0).sqrt();
      let denom = si * sj;
      corr[i][j] = if i == j {
        1.0
      } else if denom > 1e-15 {
        (cov[i][j] / denom).clamp(-1.0, 1.0)
      } else {
        0.0
      };
    }
  }

  corr
}

#[cfg(test)]
mod tests {
  use rand::SeedableRng;
  use rand::rngs::StdRng;
  use rand_distr::Distribution;
  use rand_distr::StandardNormal;

  use super::*;

  fn tickers(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
  }

  #[test]
  fn rejects_asymmetric_matrix() {
    let matrix = vec![vec![0.04, 0.01], vec![0.02, 0.09]];
    assert!(CovarianceMatrix::new(tickers(&["A", "B"]), matrix).is_err());
  }

  #[test]
  fn rejects_non_finite_entries() {
    let matrix = vec![vec![0.04, f64::NAN], vec![f64::NAN, 0.09]];
    assert!(CovarianceMatrix::new(tickers(&["A", "B"]), matrix).is_err());
  }

  #[test]
  fn rejects_dimension_mismatch() {
    let matrix = vec![vec![0.04, 0.01]];
    assert!(CovarianceMatrix::new(tickers(&["A", "B"]), matrix).is_err());

    let matrix = vec![vec![0.04], vec![0.01, 0.09]];
    assert!(CovarianceMatrix::new(tickers(&["A", "B"]), matrix).is_err());
  }

  #[test]
  fn definiteness_probe_detects_singular_matrix() {
    let singular = CovarianceMatrix::new(
      tickers(&["A", "B"]),
      vec![vec![0.04, 0.04], vec![0.04, 0.04]],
    )
    .unwrap();
    assert!(!singular.is_positive_definite());

    // a healthy third asset must not mask the rank-deficient block
    let block_singular = CovarianceMatrix::new(
      tickers(&["A", "B", "C"]),
      vec![
        vec![0.04, 0.04, 0.00],
        vec![0.04, 0.04, 0.00],
        vec![0.00, 0.00, 0.0225],
      ],
    )
    .unwrap();
    assert!(!block_singular.is_positive_definite());

    let healthy = CovarianceMatrix::new(
      tickers(&["A", "B"]),
      vec![vec![0.04, 0.01], vec![0.01, 0.09]],
    )
    .unwrap();
    assert!(healthy.is_positive_definite());
  }

  #[test]
  fn select_restricts_in_requested_order() {
    let cov = CovarianceMatrix::new(
      tickers(&["A", "B", "C"]),
      vec![
        vec![0.04, 0.01, 0.00],
        vec![0.01, 0.09, 0.02],
        vec![0.00, 0.02, 0.16],
      ],
    )
    .unwrap();

    let sub = cov.select(&tickers(&["C", "A"])).unwrap();
    assert_eq!(sub.tickers(), &["C".to_string(), "A".to_string()]);
    assert!((sub.entry(0, 0) - 0.16).abs() < 1e-12);
    assert!((sub.entry(1, 1) - 0.04).abs() < 1e-12);
    assert!(sub.entry(0, 1).abs() < 1e-12);

    assert!(cov.select(&tickers(&["A", "Z"])).is_err());
  }

  #[test]
  fn variance_looks_up_the_diagonal_by_ticker() {
    let cov = CovarianceMatrix::new(
      tickers(&["A", "B"]),
      vec![vec![0.04, 0.01], vec![0.01, 0.09]],
    )
    .unwrap();

    assert_eq!(cov.variance("B"), Some(0.09));
    assert_eq!(cov.variance("Z"), None);
  }

  #[test]
  fn sample_covariance_annualizes() {
    let aligned = vec![vec![0.01, -0.01], vec![0.01, -0.01]];
    let cov = sample_covariance(&aligned);

    // sample variance of [0.01, -0.01] is 2e-4, times 252
    assert!((cov[0][0] - 0.0504).abs() < 1e-12);
    assert!((cov[0][1] - 0.0504).abs() < 1e-12);
  }

  #[test]
  fn simple_returns_from_closes() {
    let returns = simple_returns_series(&[100.0, 110.0, 99.0]);
    assert_eq!(returns.len(), 2);
    assert!((returns[0] - 0.1).abs() < 1e-12);
    assert!((returns[1] + 0.1).abs() < 1e-12);
  }

  #[test]
  fn from_returns_requires_observations() {
    assert!(CovarianceMatrix::from_returns(tickers(&["A"]), &[vec![0.01]]).is_err());
    assert!(CovarianceMatrix::from_returns(tickers(&["A"]), &[vec![0.01, 0.02]]).is_ok());
  }

  #[test]
  fn noisy_return_panel_estimates_a_positive_definite_matrix() {
    let mut rng = StdRng::seed_from_u64(42);
    let normal = StandardNormal;
    let returns: Vec<Vec<f64>> = (1..=3)
      .map(|scale| {
        (0..120)
          .map(|_| {
            let z: f64 = normal.sample(&mut rng);
            0.01 * scale as f64 * z
          })
          .collect()
      })
      .collect();

    let cov = CovarianceMatrix::from_returns(tickers(&["A", "B", "C"]), &returns).unwrap();
    assert!(cov.is_positive_definite());
    for i in 0..3 {
      assert!(cov.entry(i, i) > 0.0);
    }
  }
}
