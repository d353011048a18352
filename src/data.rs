//! # Return Series Builder
//!
//! $$
//! R \in \mathbb{R}^{T \times N}, \quad R_{tj} = \frac{p_{tj}-p_{t-1,j}}{p_{t-1,j}}
//! $$
//!
//! Converts dated price observations into an aligned period-over-period return
//! matrix. Alignment is an inner join on period keys; a row survives only if
//! every asset observed that period, unless forward filling is configured.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use chrono::Datelike;
use chrono::NaiveDate;
use impl_new_derive::ImplNew;
use ndarray::Array2;
use serde::Deserialize;
use serde::Serialize;

use crate::config::FillPolicy;
use crate::config::FrontierConfig;
use crate::config::Period;
use crate::config::ReturnKind;
use crate::error::FrontierError;
use crate::error::FrontierResult;

/// Tradable asset referenced by a computation, keyed by ticker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
  /// Ticker symbol, unique within a run.
  pub ticker: String,
  /// Optional display name.
  pub name: Option<String>,
}

impl Asset {
  /// Asset identified by ticker alone.
  pub fn new(ticker: impl Into<String>) -> Self {
    Self {
      ticker: ticker.into(),
      name: None,
    }
  }

  /// Asset with a display name.
  pub fn named(ticker: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      ticker: ticker.into(),
      name: Some(name.into()),
    }
  }
}

/// Single dated close-price observation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
  pub date: NaiveDate,
  pub price: f64,
}

/// Price history of one asset.
#[derive(ImplNew, Clone, Debug, Serialize, Deserialize)]
pub struct PriceSeries {
  pub asset: Asset,
  pub points: Vec<PricePoint>,
}

/// Aligned return matrix: rows = periods in chronological order, columns =
/// assets in input order. No cell is missing.
#[derive(Clone, Debug)]
pub struct ReturnMatrix {
  pub returns: Array2<f64>,
  /// Tickers in column order.
  pub tickers: Vec<String>,
  /// Period end date of each return row.
  pub dates: Vec<NaiveDate>,
}

impl ReturnMatrix {
  pub fn n_periods(&self) -> usize {
    self.returns.nrows()
  }

  pub fn n_assets(&self) -> usize {
    self.returns.ncols()
  }
}

type PeriodKey = (i32, u32);

fn period_key(date: NaiveDate, period: Period) -> PeriodKey {
  match period {
    Period::Daily => (date.year(), date.ordinal()),
    Period::Weekly => {
      let week = date.iso_week();
      (week.year(), week.week())
    }
    Period::Monthly => (date.year(), date.month()),
  }
}

/// Build the aligned [`ReturnMatrix`] for the supplied price histories.
///
/// Each series is resampled to the configured period (last observation per
/// bucket), the buckets are aligned across assets, and returns are computed
/// with the configured [`ReturnKind`].
pub fn build_return_matrix(
  series: &[PriceSeries],
  config: &FrontierConfig,
) -> FrontierResult<ReturnMatrix> {
  let n_assets = series.len();
  if n_assets == 0 {
    return Err(FrontierError::InsufficientData {
      available: 0,
      required: 1,
    });
  }

  for (i, left) in series.iter().enumerate() {
    for right in series.iter().skip(i + 1) {
      if left.asset.ticker == right.asset.ticker {
        return Err(FrontierError::InvariantViolation {
          stage: "return series builder",
          detail: format!("duplicate ticker {}", left.asset.ticker),
        });
      }
    }
  }

  let mut sampled: Vec<BTreeMap<PeriodKey, (NaiveDate, f64)>> = Vec::with_capacity(n_assets);
  for s in series {
    for point in &s.points {
      if !point.price.is_finite() || point.price <= 0.0 {
        return Err(FrontierError::InvalidPrice {
          ticker: s.asset.ticker.clone(),
          date: point.date,
          price: point.price,
        });
      }
    }

    let mut points = s.points.clone();
    points.sort_by_key(|p| p.date);

    let mut buckets = BTreeMap::new();
    for p in &points {
      buckets.insert(period_key(p.date, config.period), (p.date, p.price));
    }
    sampled.push(buckets);
  }

  let keys = aligned_keys(&sampled, config.fill_policy);

  let mut dates: Vec<NaiveDate> = Vec::with_capacity(keys.len());
  let mut grid: Vec<Vec<f64>> = Vec::with_capacity(keys.len());
  for key in &keys {
    let row_date = sampled
      .iter()
      .filter_map(|buckets| buckets.get(key))
      .map(|(date, _)| *date)
      .max();
    let Some(row_date) = row_date else { continue };

    let mut row = Vec::with_capacity(n_assets);
    for buckets in &sampled {
      let Some((_, (_, price))) = buckets.range(..=*key).next_back() else {
        break;
      };
      row.push(*price);
    }
    if row.len() == n_assets {
      dates.push(row_date);
      grid.push(row);
    }
  }

  let n_rows = grid.len();
  let available = n_rows.saturating_sub(1);
  let required = config.min_periods.unwrap_or(n_assets + 1).max(1);
  if available < required {
    return Err(FrontierError::InsufficientData {
      available,
      required,
    });
  }

  let mut returns = Array2::zeros((available, n_assets));
  for t in 1..n_rows {
    for j in 0..n_assets {
      let prev = grid[t - 1][j];
      let curr = grid[t][j];
      returns[[t - 1, j]] = match config.return_kind {
        ReturnKind::Simple => (curr - prev) / prev,
        ReturnKind::Log => (curr / prev).ln(),
      };
    }
  }

  Ok(ReturnMatrix {
    returns,
    tickers: series.iter().map(|s| s.asset.ticker.clone()).collect(),
    dates: dates[1..].to_vec(),
  })
}

fn aligned_keys(
  sampled: &[BTreeMap<PeriodKey, (NaiveDate, f64)>],
  fill_policy: FillPolicy,
) -> Vec<PeriodKey> {
  match fill_policy {
    FillPolicy::DropMissing => {
      let Some(first) = sampled.first() else {
        return Vec::new();
      };
      first
        .keys()
        .copied()
        .filter(|key| sampled.iter().all(|buckets| buckets.contains_key(key)))
        .collect()
    }
    FillPolicy::ForwardFill => {
      // union of keys, starting once every asset has its first observation
      let start = sampled
        .iter()
        .map(|buckets| buckets.keys().next().copied())
        .collect::<Option<Vec<_>>>()
        .and_then(|firsts| firsts.into_iter().max());
      let Some(start) = start else {
        return Vec::new();
      };

      let mut keys = BTreeSet::new();
      for buckets in sampled {
        keys.extend(buckets.keys().copied());
      }
      keys.into_iter().filter(|key| *key >= start).collect()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
  }

  fn series(ticker: &str, points: &[(u32, f64)]) -> PriceSeries {
    PriceSeries::new(
      Asset::new(ticker),
      points
        .iter()
        .map(|&(d, price)| PricePoint {
          date: day(d),
          price,
        })
        .collect(),
    )
  }

  fn config_with(min_periods: usize) -> FrontierConfig {
    FrontierConfig {
      min_periods: Some(min_periods),
      ..FrontierConfig::default()
    }
  }

  #[test]
  fn inner_join_drops_periods_missing_for_any_asset() {
    let a = series(
      "AAA",
      &[(1, 100.0), (2, 110.0), (3, 105.0), (4, 115.5), (5, 110.0)],
    );
    let b = series("BBB", &[(1, 50.0), (2, 51.0), (4, 49.0), (5, 50.5)]);

    let matrix = build_return_matrix(&[a, b], &config_with(1)).unwrap();

    // Jan 3 is missing for BBB, so the aligned grid is Jan 1, 2, 4, 5.
    assert_eq!(matrix.n_periods(), 3);
    assert_eq!(matrix.n_assets(), 2);
    assert_eq!(matrix.dates, vec![day(2), day(4), day(5)]);
    assert!((matrix.returns[[0, 0]] - 0.10).abs() < 1e-12);
    assert!((matrix.returns[[1, 0]] - 0.05).abs() < 1e-12);
    assert!((matrix.returns[[1, 1]] - (49.0 / 51.0 - 1.0)).abs() < 1e-12);
  }

  #[test]
  fn forward_fill_keeps_the_union_of_periods() {
    let a = series("AAA", &[(1, 100.0), (2, 110.0), (3, 105.0), (4, 115.5)]);
    let b = series("BBB", &[(1, 50.0), (2, 51.0), (4, 49.0)]);

    let config = FrontierConfig {
      fill_policy: FillPolicy::ForwardFill,
      ..config_with(1)
    };
    let matrix = build_return_matrix(&[a, b], &config).unwrap();

    assert_eq!(matrix.n_periods(), 3);
    // BBB's Jan 3 price is carried from Jan 2, so its Jan 3 return is zero.
    assert!(matrix.returns[[1, 1]].abs() < 1e-12);
    assert!((matrix.returns[[2, 1]] - (49.0 / 51.0 - 1.0)).abs() < 1e-12);
  }

  #[test]
  fn log_returns_follow_configuration() {
    let a = series("AAA", &[(1, 100.0), (2, 110.0)]);

    let config = FrontierConfig {
      return_kind: ReturnKind::Log,
      ..config_with(1)
    };
    let matrix = build_return_matrix(&[a], &config).unwrap();

    assert!((matrix.returns[[0, 0]] - (1.1f64).ln()).abs() < 1e-12);
  }

  #[test]
  fn weekly_resampling_keeps_the_last_observation_per_week() {
    // 2024-01-01 is a Monday; two full ISO weeks.
    let a = series(
      "AAA",
      &[(1, 100.0), (3, 101.0), (5, 104.0), (8, 103.0), (12, 109.2)],
    );

    let config = FrontierConfig {
      period: Period::Weekly,
      ..config_with(1)
    };
    let matrix = build_return_matrix(&[a], &config).unwrap();

    assert_eq!(matrix.n_periods(), 1);
    assert!((matrix.returns[[0, 0]] - (109.2 / 104.0 - 1.0)).abs() < 1e-12);
    assert_eq!(matrix.dates, vec![day(12)]);
  }

  #[test]
  fn non_positive_price_fails_before_any_return() {
    let a = series("AAA", &[(1, 100.0), (2, 0.0), (3, 105.0)]);

    let err = build_return_matrix(&[a], &config_with(1)).unwrap_err();
    assert!(matches!(err, FrontierError::InvalidPrice { ref ticker, .. } if ticker == "AAA"));
  }

  #[test]
  fn too_few_aligned_periods_fail() {
    let a = series("AAA", &[(1, 100.0), (2, 101.0), (3, 99.0)]);
    let b = series("BBB", &[(1, 50.0), (2, 50.5), (3, 49.5)]);

    // two aligned returns, three required by default for two assets
    let err = build_return_matrix(&[a, b], &FrontierConfig::default()).unwrap_err();
    assert_eq!(
      err,
      FrontierError::InsufficientData {
        available: 2,
        required: 3,
      }
    );
  }

  #[test]
  fn duplicate_tickers_are_rejected() {
    let a = series("AAA", &[(1, 100.0), (2, 101.0)]);
    let b = series("AAA", &[(1, 50.0), (2, 50.5)]);

    let err = build_return_matrix(&[a, b], &config_with(1)).unwrap_err();
    assert!(matches!(err, FrontierError::InvariantViolation { .. }));
  }

  #[test]
  fn unsorted_input_is_ordered_by_date() {
    let a = series("AAA", &[(3, 105.0), (1, 100.0), (2, 110.0)]);

    let matrix = build_return_matrix(&[a], &config_with(1)).unwrap();

    assert!((matrix.returns[[0, 0]] - 0.10).abs() < 1e-12);
    assert!((matrix.returns[[1, 0]] - (105.0 / 110.0 - 1.0)).abs() < 1e-12);
  }
}
