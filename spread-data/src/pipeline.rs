use crate::{
    align::align,
    chart::ChartSnapshot,
    model::{DerivedPoint, OhlcBar},
    rolling::{BollingerConfig, RollingBands},
    transform::{SpreadMode, transform},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lookback used when pagination is disabled.
pub const DEFAULT_FIXED_LOOKBACK: Duration = Duration::from_secs(24 * 60 * 60);

/// Consecutive empty backward pages tolerated before history is considered exhausted.
pub const DEFAULT_MAX_EMPTY_PAGES: u32 = 3;

/// Parameters of one spread view: which transform, whether bands are drawn, and how the time
/// window is sized.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct SpreadConfig {
    pub mode: SpreadMode,
    pub bollinger: Option<BollingerConfig>,
    /// Page backwards in `interval x 1000` chunks. When `false` a single `fixed_lookback`
    /// window is loaded and `load_older` is a no-op.
    pub paginate: bool,
    pub fixed_lookback: Duration,
    pub max_empty_pages: u32,
}

impl Default for SpreadConfig {
    fn default() -> Self {
        Self {
            mode: SpreadMode::default(),
            bollinger: Some(BollingerConfig::default()),
            paginate: true,
            fixed_lookback: DEFAULT_FIXED_LOOKBACK,
            max_empty_pages: DEFAULT_MAX_EMPTY_PAGES,
        }
    }
}

impl SpreadConfig {
    pub fn with_mode(mut self, mode: SpreadMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_bollinger(mut self, bollinger: Option<BollingerConfig>) -> Self {
        self.bollinger = bollinger;
        self
    }

    pub fn with_paginate(mut self, paginate: bool) -> Self {
        self.paginate = paginate;
        self
    }

    pub fn with_fixed_lookback(mut self, lookback: Duration) -> Self {
        self.fixed_lookback = lookback;
        self
    }

    pub fn with_max_empty_pages(mut self, max_empty_pages: u32) -> Self {
        self.max_empty_pages = max_empty_pages;
        self
    }
}

/// Align -> transform -> (optional) bands, parameterised by [`SpreadConfig`].
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct SpreadPipeline {
    config: SpreadConfig,
}

impl SpreadPipeline {
    pub fn new(config: SpreadConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SpreadConfig {
        &self.config
    }

    /// Derive the spread series of two bar sequences.
    pub fn derive(&self, left: &[OhlcBar], right: &[OhlcBar]) -> Vec<DerivedPoint> {
        transform(&align(left, right), self.config.mode)
    }

    /// Bands over `series`, recomputed in full, or `None` if bands are disabled.
    pub fn bands(&self, series: &[DerivedPoint]) -> Option<RollingBands> {
        self.config.bollinger.map(|config| config.bands(series))
    }

    /// Everything a chart needs to draw `series`.
    pub fn snapshot(&self, title: impl Into<String>, series: Vec<DerivedPoint>) -> ChartSnapshot {
        let bands = self.bands(&series);
        ChartSnapshot {
            title: title.into(),
            mode: self.config.mode,
            spread: series,
            bands,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_end_to_end_difference() {
        let left = vec![OhlcBar::flat(1000, 100.0), OhlcBar::flat(2000, 110.0)];
        let right = vec![OhlcBar::flat(1000, 95.0), OhlcBar::flat(2000, 100.0)];

        let pipeline = SpreadPipeline::new(SpreadConfig::default().with_mode(SpreadMode::Difference));

        assert_eq!(
            pipeline.derive(&left, &right),
            vec![DerivedPoint::new(1000, 5.0), DerivedPoint::new(2000, 10.0)]
        );
    }

    #[test]
    fn test_pipeline_log_ratio_excludes_non_positive() {
        let left = vec![OhlcBar::flat(1000, 100.0), OhlcBar::flat(2000, 110.0)];
        let right = vec![OhlcBar::flat(1000, 0.0), OhlcBar::flat(2000, 110.0)];

        let pipeline = SpreadPipeline::new(SpreadConfig::default().with_mode(SpreadMode::LogRatio));

        assert_eq!(pipeline.derive(&left, &right), vec![DerivedPoint::new(2000, 0.0)]);
    }

    #[test]
    fn test_pipeline_snapshot_bands_optional() {
        let series = vec![DerivedPoint::new(1, 1.0), DerivedPoint::new(2, 2.0)];

        let with_bands = SpreadPipeline::new(
            SpreadConfig::default().with_bollinger(BollingerConfig::new(2, 1.0)),
        )
        .snapshot("A vs B", series.clone());
        let without_bands =
            SpreadPipeline::new(SpreadConfig::default().with_bollinger(None)).snapshot("A vs B", series);

        let bands = with_bands.bands.unwrap();
        assert_eq!(bands.len(), 2);
        assert_eq!(bands.middle[1].y, Some(1.5));
        assert!(without_bands.bands.is_none());
        assert_eq!(without_bands.title, "A vs B");
    }
}
