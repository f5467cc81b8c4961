//! # Weight Solver
//!
//! $$
//! \min_{\mathbf{w}} \sum_i \Big( \frac{w_i (\Sigma \mathbf{w})_i}{\mathbf{w}^\top \Sigma \mathbf{w}} - \frac{1}{n} \Big)^2
//! $$
//!
//! Risk-parity and hierarchical risk-parity weighting with an
//! inverse-volatility fallback on numerical failure.

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::solver::neldermead::NelderMead;
use tracing::warn;

use crate::config::RotationConfig;
use crate::config::SolverMethod;
use crate::cov::CovarianceMatrix;
use crate::cov::corr_from_cov;
use crate::types::SolvedWeights;
use crate::types::SolverStatus;
use crate::types::WeightVector;
use crate::types::empty_solved;

/// Iteration budget for the risk-parity search.
pub const MAX_SOLVER_ITERS: u64 = 10_000;

/// Accepted relative deviation of risk contributions from parity.
pub const PARITY_TOLERANCE: f64 = 0.01;

fn dot(a: &[f64], b: &[f64]) -> f64 {
  a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn mat_vec_mul(mat: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
  mat
    .iter()
    .map(|row| row.iter().zip(v.iter()).map(|(a, b)| a * b).sum())
    .collect()
}

fn softmax(x: &[f64]) -> Vec<f64> {
  let n = x.len();
  if n == 0 {
    return Vec::new();
  }

  let shift = x.iter().fold(f64::NEG_INFINITY, |m, &v| m.max(v));
  let mut out: Vec<f64> = x.iter().map(|&v| (v - shift).exp()).collect();
  let total: f64 = out.iter().sum();
  if total < 1e-15 {
    return vec![1.0 / n as f64; n];
  }
  for w in &mut out {
    *w /= total;
  }
  out
}

/// Fraction of portfolio variance contributed by each asset.
pub fn risk_contributions(w: &[f64], cov: &[Vec<f64>]) -> Vec<f64> {
  let sigma_w = mat_vec_mul(cov, w);
  let port_var = dot(w, &sigma_w);
  if port_var <= 1e-30 {
    return vec![0.0; w.len()];
  }

  w.iter()
    .zip(sigma_w.iter())
    .map(|(wi, si)| wi * si / port_var)
    .collect()
}

/// Closed-form inverse-volatility weights over the covariance diagonal.
///
/// Assets with zero or non-finite volatility are excluded and the remainder
/// renormalized; the map is empty when no asset has a usable estimate.
pub fn inverse_vol_weights(cov: &CovarianceMatrix) -> WeightVector {
  let n = cov.len();
  let inv_vols: Vec<f64> = (0..n)
    .map(|i| {
      let sigma = cov.entry(i, i).max(0.0).sqrt();
      if sigma.is_finite() && sigma > 1e-15 {
        1.0 / sigma
      } else {
        0.0
      }
    })
    .collect();

  let total: f64 = inv_vols.iter().sum();
  if total <= 1e-15 {
    return WeightVector::new();
  }

  cov
    .tickers()
    .iter()
    .zip(inv_vols.iter())
    .filter(|(_, &iv)| iv > 0.0)
    .map(|(ticker, &iv)| (ticker.clone(), iv / total))
    .collect()
}

/// Solve risk-aware weights over the covariance subset.
///
/// The configured primary method runs only against a positive definite
/// matrix and its output is validated, not trusted; any failure falls back
/// to inverse-volatility weighting.
pub fn solve_weights(cov: &CovarianceMatrix, config: &RotationConfig) -> SolvedWeights {
  let n = cov.len();
  if n == 0 {
    return empty_solved();
  }

  if n == 1 {
    let ticker = cov.tickers()[0].clone();
    return SolvedWeights {
      weights: WeightVector::from([(ticker.clone(), 1.0)]),
      status: SolverStatus::Primary,
      risk_contributions: [(ticker, 1.0)].into(),
    };
  }

  if !cov.is_positive_definite() {
    warn!("covariance is not positive definite, falling back to inverse-volatility weighting");
    return fallback(cov);
  }

  let raw = match config.solver {
    SolverMethod::RiskParity => risk_parity_weights(cov.rows()),
    SolverMethod::Hrp => hrp_weights(cov.rows()),
  };

  let rc = risk_contributions(&raw, cov.rows());
  let accepted = weights_structurally_valid(&raw)
    && match config.solver {
      SolverMethod::RiskParity => parity_converged(&rc),
      SolverMethod::Hrp => true,
    };

  if !accepted {
    warn!(
      "{:?} produced an invalid or non-converged solution, falling back to inverse-volatility weighting",
      config.solver
    );
    return fallback(cov);
  }

  let tickers = cov.tickers();
  SolvedWeights {
    weights: tickers.iter().cloned().zip(raw).collect(),
    status: SolverStatus::Primary,
    risk_contributions: tickers.iter().cloned().zip(rc).collect(),
  }
}

fn fallback(cov: &CovarianceMatrix) -> SolvedWeights {
  let weights = inverse_vol_weights(cov);
  if weights.is_empty() {
    warn!("no asset has a usable volatility estimate, returning empty weights");
    return empty_solved();
  }

  let w: Vec<f64> = cov
    .tickers()
    .iter()
    .map(|t| weights.get(t).copied().unwrap_or(0.0))
    .collect();
  let rc = risk_contributions(&w, cov.rows());

  SolvedWeights {
    weights,
    status: SolverStatus::Fallback,
    risk_contributions: cov.tickers().iter().cloned().zip(rc).collect(),
  }
}

fn weights_structurally_valid(w: &[f64]) -> bool {
  if w.is_empty() {
    return false;
  }

  let sum: f64 = w.iter().sum();
  w.iter().all(|&x| x.is_finite() && (0.0..=1.0).contains(&x)) && (sum - 1.0).abs() <= 1e-6
}

fn parity_converged(rc: &[f64]) -> bool {
  let target = 1.0 / rc.len() as f64;
  rc.iter().all(|&c| ((c - target) / target).abs() <= PARITY_TOLERANCE)
}

fn risk_parity_weights(cov: &[Vec<f64>]) -> Vec<f64> {
  let n = cov.len();

  struct ParityCost {
    cov: Vec<Vec<f64>>,
    n: usize,
  }

  impl CostFunction for ParityCost {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
      let w = softmax(x);
      let sigma_w = mat_vec_mul(&self.cov, &w);
      let port_var = dot(&w, &sigma_w);
      if port_var < 1e-30 {
        return Ok(1e10);
      }

      let target = 1.0 / self.n as f64;
      let mut err = 0.0;
      for i in 0..self.n {
        let rc_i = w[i] * sigma_w[i] / port_var;
        err += (rc_i - target).powi(2);
      }
      Ok(err)
    }
  }

  let cost = ParityCost {
    cov: cov.to_vec(),
    n,
  };

  let x0 = vec![0.0; n];
  let mut simplex = Vec::with_capacity(n + 1);
  simplex.push(x0.clone());
  for i in 0..n {
    let mut point = x0.clone();
    point[i] = 1.0;
    simplex.push(point);
  }

  match NelderMead::new(simplex).with_sd_tolerance(1e-10) {
    Ok(solver) => {
      match Executor::new(cost, solver)
        .configure(|state| state.max_iters(MAX_SOLVER_ITERS))
        .run()
      {
        Ok(res) => softmax(&res.state.best_param.unwrap_or(x0)),
        Err(_) => vec![1.0 / n as f64; n],
      }
    }
    Err(_) => vec![1.0 / n as f64; n],
  }
}

fn hrp_weights(cov: &[Vec<f64>]) -> Vec<f64> {
  let n = cov.len();
  if n == 1 {
    return vec![1.0];
  }

  let corr = corr_from_cov(cov);
  let dist: Vec<Vec<f64>> = (0..n)
    .map(|i| {
      (0..n)
        .map(|j| ((1.0 - corr[i][j]).max(0.0) / 2.0).sqrt())
        .collect()
    })
    .collect();

  let order = hrp_seriation(&dist);
  let mut weights = hrp_bisect(cov, &order);

  let total: f64 = weights.iter().sum();
  if total > 1e-15 {
    for w in &mut weights {
      *w /= total;
    }
  }
  weights
}

/// Single-linkage agglomeration returning a quasi-diagonal leaf order.
///
/// Clusters carry their member lists; merging concatenates them, so the
/// surviving cluster's members are the seriation.
fn hrp_seriation(dist: &[Vec<f64>]) -> Vec<usize> {
  let n = dist.len();
  let mut clusters: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
  let mut d = dist.to_vec();

  while clusters.len() > 1 {
    let mut best = f64::INFINITY;
    let (mut a, mut b) = (0, 1);
    for i in 0..clusters.len() {
      for j in (i + 1)..clusters.len() {
        if d[i][j] < best {
          best = d[i][j];
          a = i;
          b = j;
        }
      }
    }

    // fold b's single-linkage distances into a, then drop b entirely
    for k in 0..clusters.len() {
      if k != a && k != b {
        let linked = d[a][k].min(d[b][k]);
        d[a][k] = linked;
        d[k][a] = linked;
      }
    }
    let absorbed = clusters.remove(b);
    clusters[a].extend(absorbed);
    d.remove(b);
    for row in &mut d {
      row.remove(b);
    }
  }

  clusters.into_iter().next().unwrap_or_default()
}

/// Top-down recursive bisection over the seriated order.
fn hrp_bisect(cov: &[Vec<f64>], order: &[usize]) -> Vec<f64> {
  let mut weights = vec![1.0; cov.len()];
  let mut stack: Vec<&[usize]> = vec![order];

  while let Some(cluster) = stack.pop() {
    if cluster.len() <= 1 {
      continue;
    }

    let (left, right) = cluster.split_at(cluster.len() / 2);
    let var_left = inverse_variance_cluster_var(cov, left);
    let var_right = inverse_variance_cluster_var(cov, right);
    let total = var_left + var_right;
    let split = if total > 1e-30 {
      1.0 - var_left / total
    } else {
      0.5
    };

    for &i in left {
      weights[i] *= split;
    }
    for &i in right {
      weights[i] *= 1.0 - split;
    }
    stack.push(left);
    stack.push(right);
  }

  weights
}

fn inverse_variance_cluster_var(cov: &[Vec<f64>], members: &[usize]) -> f64 {
  match members {
    [] => return 0.0,
    [only] => return cov[*only][*only],
    _ => {}
  }

  let inv_vars: Vec<f64> = members
    .iter()
    .map(|&i| {
      let v = cov[i][i];
      if v > 1e-15 { 1.0 / v } else { 0.0 }
    })
    .collect();
  let total: f64 = inv_vars.iter().sum();
  if total < 1e-15 {
    return 1.0;
  }

  let mut var = 0.0;
  for (a, &i) in members.iter().enumerate() {
    for (b, &j) in members.iter().enumerate() {
      var += (inv_vars[a] / total) * (inv_vars[b] / total) * cov[i][j];
    }
  }
  var
}
