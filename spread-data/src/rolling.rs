//! Rolling Bollinger bands over a derived series.
//!
//! Bands use a simple moving average and the population standard deviation (divisor = period)
//! over a trailing window. The first `period - 1` entries of every band are `None`.

use crate::model::DerivedPoint;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// Default Bollinger lookback.
pub const DEFAULT_PERIOD: NonZeroUsize = match NonZeroUsize::new(20) {
    Some(period) => period,
    None => unreachable!(),
};

/// Default band width in standard deviations.
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Bollinger band parameters.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct BollingerConfig {
    pub period: NonZeroUsize,
    pub multiplier: f64,
}

impl Default for BollingerConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

impl BollingerConfig {
    /// Construct a config, returning `None` if `period` is zero.
    pub fn new(period: usize, multiplier: f64) -> Option<Self> {
        NonZeroUsize::new(period).map(|period| Self { period, multiplier })
    }

    pub fn bands(&self, series: &[DerivedPoint]) -> RollingBands {
        rolling_bands(series, self.period, self.multiplier)
    }
}

/// Upper, middle and lower bands, each index-aligned 1:1 with the input series.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct RollingBands {
    pub upper: Vec<DerivedPoint>,
    pub middle: Vec<DerivedPoint>,
    pub lower: Vec<DerivedPoint>,
}

impl RollingBands {
    pub fn len(&self) -> usize {
        self.middle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middle.is_empty()
    }
}

/// Compute Bollinger bands over `series`.
///
/// A point whose `y` is `None` contributes nothing to any window it falls in: a window that
/// contains one produces `None` for all three bands.
pub fn rolling_bands(
    series: &[DerivedPoint],
    window: NonZeroUsize,
    multiplier: f64,
) -> RollingBands {
    let window = window.get();
    let mut bands = RollingBands {
        upper: Vec::with_capacity(series.len()),
        middle: Vec::with_capacity(series.len()),
        lower: Vec::with_capacity(series.len()),
    };

    for (index, point) in series.iter().enumerate() {
        let stats = (index + 1 >= window)
            .then(|| window_stats(&series[index + 1 - window..=index]))
            .flatten();

        match stats {
            Some((mean, std)) => {
                bands.upper.push(DerivedPoint::new(point.x, mean + multiplier * std));
                bands.middle.push(DerivedPoint::new(point.x, mean));
                bands.lower.push(DerivedPoint::new(point.x, mean - multiplier * std));
            }
            None => {
                bands.upper.push(DerivedPoint::empty(point.x));
                bands.middle.push(DerivedPoint::empty(point.x));
                bands.lower.push(DerivedPoint::empty(point.x));
            }
        }
    }

    bands
}

/// Mean & population standard deviation of a full window.
fn window_stats(window: &[DerivedPoint]) -> Option<(f64, f64)> {
    let values = window
        .iter()
        .map(|point| point.y)
        .collect::<Option<Vec<f64>>>()?;

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / n;

    Some((mean, variance.sqrt()))
}
