use std::collections::BTreeMap;
use std::hint::black_box;
use std::time::Duration;

use chrono::Days;
use chrono::NaiveDate;
use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;
use rotation_rs::Asset;
use rotation_rs::AssetClass;
use rotation_rs::AssetUniverse;
use rotation_rs::CovarianceMatrix;
use rotation_rs::PriceHistory;
use rotation_rs::RotationConfig;
use rotation_rs::RotationEngine;
use rotation_rs::WeightVector;

struct RotationInputs {
  universe: AssetUniverse,
  prices: BTreeMap<String, PriceHistory>,
  trend: BTreeMap<String, bool>,
  cov: CovarianceMatrix,
  previous: WeightVector,
  config: RotationConfig,
}

fn build_inputs(n: usize) -> RotationInputs {
  let tickers: Vec<String> = (0..n).map(|i| format!("A{i}")).collect();
  let universe = AssetUniverse::new(
    tickers
      .iter()
      .map(|t| Asset::new(t.clone(), AssetClass::Etf, None))
      .collect(),
  )
  .expect("synthetic universe is valid");

  let base = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
  let len = 80;
  let mut prices = BTreeMap::new();
  for (i, ticker) in tickers.iter().enumerate() {
    let growth = 0.0002 * (i + 1) as f64;
    let mut history = PriceHistory::new();
    let mut price = 100.0;
    for offset in 0..len {
      history
        .push(base + Days::new(offset as u64), price)
        .expect("synthetic history is valid");
      price *= 1.0 + growth;
    }
    prices.insert(ticker.clone(), history);
  }

  let trend = tickers.iter().map(|t| (t.clone(), true)).collect();

  let rho = 0.3f64;
  let matrix = (0..n)
    .map(|i| {
      (0..n)
        .map(|j| {
          let sigma_i = 0.15 + 0.01 * (i % 5) as f64;
          let sigma_j = 0.15 + 0.01 * (j % 5) as f64;
          rho.powi((i as i32 - j as i32).abs()) * sigma_i * sigma_j
        })
        .collect()
    })
    .collect();
  let cov = CovarianceMatrix::new(tickers.clone(), matrix).expect("synthetic covariance is valid");

  let previous = tickers
    .iter()
    .map(|t| (t.clone(), 1.0 / n as f64))
    .collect();

  let config = RotationConfig {
    lookback_window: 63,
    skip_window: 5,
    safe_haven: vec![(tickers[0].clone(), 0.5), (tickers[1].clone(), 0.5)],
    ..RotationConfig::default()
  };

  RotationInputs {
    universe,
    prices,
    trend,
    cov,
    previous,
    config,
  }
}

fn bench_rotation(c: &mut Criterion) {
  let mut group = c.benchmark_group("Rotation");
  group.measurement_time(Duration::from_secs(3));
  group.warm_up_time(Duration::from_millis(500));

  for &n in &[8usize, 32usize] {
    let inputs = build_inputs(n);
    let engine = RotationEngine::new(inputs.config.clone());

    group.bench_with_input(BenchmarkId::new("rank", n), &n, |b, _| {
      b.iter(|| {
        black_box(engine.rank(&inputs.prices, &inputs.trend, &inputs.universe));
      });
    });

    group.bench_with_input(BenchmarkId::new("rotate", n), &n, |b, _| {
      b.iter(|| {
        let result = engine
          .rotate(
            &inputs.prices,
            &inputs.cov,
            &inputs.trend,
            &inputs.previous,
            &inputs.universe,
          )
          .expect("rotation succeeds on synthetic inputs");
        black_box(result.turnover)
      });
    });
  }

  group.finish();
}

criterion_group!(benches, bench_rotation);
criterion_main!(benches);
