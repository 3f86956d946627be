use crate::{
    model::{DerivedPoint, TimestampMs},
    rolling::RollingBands,
    transform::SpreadMode,
};
use serde::{Deserialize, Serialize};

/// Everything needed to draw one spread chart.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct ChartSnapshot {
    pub title: String,
    pub mode: SpreadMode,
    pub spread: Vec<DerivedPoint>,
    pub bands: Option<RollingBands>,
}

impl ChartSnapshot {
    pub fn is_empty(&self) -> bool {
        self.spread.is_empty()
    }

    /// Sub-snapshot of the points with `start_ms <= x <= end_ms`, bands sliced to match.
    ///
    /// Bands are still the ones computed over the full series, so the first visible points are
    /// not in a fresh warm-up region.
    pub fn between(&self, start_ms: TimestampMs, end_ms: TimestampMs) -> ChartSnapshot {
        let from = self.spread.partition_point(|point| point.x < start_ms);
        let to = self.spread.partition_point(|point| point.x <= end_ms).max(from);

        let slice = |points: &[DerivedPoint]| points.get(from..to).unwrap_or_default().to_vec();

        ChartSnapshot {
            title: self.title.clone(),
            mode: self.mode,
            spread: slice(&self.spread),
            bands: self.bands.as_ref().map(|bands| RollingBands {
                upper: slice(&bands.upper),
                middle: slice(&bands.middle),
                lower: slice(&bands.lower),
            }),
        }
    }

    /// Inclusive `[first, last]` timestamps of the spread series.
    pub fn x_bounds(&self) -> Option<(TimestampMs, TimestampMs)> {
        Some((self.spread.first()?.x, self.spread.last()?.x))
    }

    /// Min & max of every finite value drawn, bands included.
    pub fn y_bounds(&self) -> Option<(f64, f64)> {
        let band_values = self
            .bands
            .iter()
            .flat_map(|bands| bands.upper.iter().chain(bands.lower.iter()));

        self.spread
            .iter()
            .chain(band_values)
            .filter_map(|point| point.y)
            .filter(|y| y.is_finite())
            .fold(None, |bounds, y| match bounds {
                None => Some((y, y)),
                Some((min, max)) => Some((f64::min(min, y), f64::max(max, y))),
            })
    }
}

/// Rendering surface for a spread view.
///
/// The data layer only ever hands over complete snapshots, so an implementation replaces
/// whatever it is currently showing.
pub trait ChartAdapter {
    /// Replace the chart contents with `snapshot`.
    fn render(&mut self, snapshot: &ChartSnapshot);

    /// Clear the chart and show `message` in its place.
    fn clear(&mut self, message: &str);
}
