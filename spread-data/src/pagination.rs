//! Backward-extending spread window.
//!
//! A [`PaginationController`] owns the loaded spread series for one instrument pair. It fetches
//! an initial page ending "now", then extends the series backwards one page at a time when the
//! chart viewport reaches the left edge of what has been loaded.
//!
//! Every fetch is tagged with the generation that issued it. [`PaginationController::initialize`]
//! starts a new generation, so responses belonging to an older one are discarded on arrival.

use crate::{
    chart::ChartSnapshot,
    error::DataError,
    model::{DerivedPoint, OhlcBar, TimestampMs},
    pipeline::{SpreadConfig, SpreadPipeline},
    timeframe::Timeframe,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use smol_str::SmolStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Source of OHLC bars in `[start_ms, end_ms)`.
#[async_trait]
pub trait KlineSource: Send + Sync {
    async fn fetch_klines(
        &self,
        symbol: &str,
        timeframe: &Timeframe,
        start_ms: TimestampMs,
        end_ms: TimestampMs,
    ) -> Result<Vec<OhlcBar>, DataError>;
}

#[async_trait]
impl<T> KlineSource for Arc<T>
where
    T: KlineSource + ?Sized,
{
    async fn fetch_klines(
        &self,
        symbol: &str,
        timeframe: &Timeframe,
        start_ms: TimestampMs,
        end_ms: TimestampMs,
    ) -> Result<Vec<OhlcBar>, DataError> {
        T::fetch_klines(self, symbol, timeframe, start_ms, end_ms).await
    }
}

/// Instrument pair & timeframe a spread view is built from.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct SpreadPair {
    pub left: SmolStr,
    pub right: SmolStr,
    pub timeframe: Timeframe,
}

impl SpreadPair {
    pub fn new(left: impl Into<SmolStr>, right: impl Into<SmolStr>, timeframe: Timeframe) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
            timeframe,
        }
    }

    pub fn title(&self) -> String {
        format!("{} vs {} ({})", self.left, self.right, self.timeframe)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub enum PaginationStatus {
    #[default]
    Idle,
    Loading,
    /// Last fetch failed. Cleared by [`PaginationController::dismiss_error`] or a later
    /// successful fetch.
    Error(DataError),
}

#[derive(Debug, Default)]
struct PaginationState {
    pair: Option<SpreadPair>,
    /// Config the loaded series was initialised with
    config: SpreadConfig,
    window_start: Option<TimestampMs>,
    window_end: Option<TimestampMs>,
    loaded: Vec<DerivedPoint>,
    status: PaginationStatus,
    generation: u64,
    in_flight: Option<u64>,
    empty_pages: u32,
    exhausted: bool,
}

impl PaginationState {
    fn is_busy(&self) -> bool {
        self.in_flight == Some(self.generation)
    }
}

struct PageRequest {
    generation: u64,
    pair: SpreadPair,
    pipeline: SpreadPipeline,
    start_ms: TimestampMs,
    end_ms: TimestampMs,
}

/// Sole owner & writer of the loaded spread series for one view.
pub struct PaginationController<Source> {
    source: Source,
    pipeline: Mutex<SpreadPipeline>,
    state: Mutex<PaginationState>,
}

impl<Source> std::fmt::Debug for PaginationController<Source> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginationController")
            .field("pipeline", &*self.pipeline.lock())
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl<Source> PaginationController<Source>
where
    Source: KlineSource,
{
    pub fn new(source: Source, config: SpreadConfig) -> Self {
        Self {
            source,
            pipeline: Mutex::new(SpreadPipeline::new(config)),
            state: Mutex::new(PaginationState::default()),
        }
    }

    pub fn config(&self) -> SpreadConfig {
        *self.pipeline.lock().config()
    }

    /// Replace the pipeline parameters. A changed `mode`, `paginate` or lookback only takes
    /// effect on the next [`initialize`](Self::initialize), so every page of a series shares one
    /// transform. Band parameters apply to the next snapshot.
    pub fn set_config(&self, config: SpreadConfig) {
        *self.pipeline.lock() = SpreadPipeline::new(config);
    }

    /// Fetch a fresh window ending now, replacing any prior state.
    pub async fn initialize(&self, pair: SpreadPair) -> Result<Vec<DerivedPoint>, DataError> {
        self.initialize_at(pair, Utc::now().timestamp_millis()).await
    }

    /// Fetch a fresh window ending at `end_ms`, replacing any prior state.
    pub async fn initialize_at(
        &self,
        pair: SpreadPair,
        end_ms: TimestampMs,
    ) -> Result<Vec<DerivedPoint>, DataError> {
        let config = self.config();
        let span = if config.paginate {
            pair.timeframe.page_span_ms()
        } else {
            config.fixed_lookback.as_millis() as i64
        };

        let request = {
            let mut state = self.state.lock();
            let generation = state.generation + 1;
            *state = PaginationState {
                pair: Some(pair.clone()),
                config,
                status: PaginationStatus::Loading,
                generation,
                in_flight: Some(generation),
                ..PaginationState::default()
            };

            PageRequest {
                generation,
                pair,
                pipeline: SpreadPipeline::new(config),
                start_ms: end_ms - span,
                end_ms,
            }
        };

        info!(
            generation = request.generation,
            left = %request.pair.left,
            right = %request.pair.right,
            timeframe = %request.pair.timeframe,
            start_ms = request.start_ms,
            end_ms = request.end_ms,
            "initialising spread window"
        );

        let result = self.fetch_page(&request).await;

        let mut state = self.state.lock();
        if state.generation != request.generation {
            debug!(
                generation = request.generation,
                current = state.generation,
                "discarding stale initial page"
            );
            return Ok(state.loaded.clone());
        }

        state.in_flight = None;
        match result {
            Ok(points) => {
                state.window_start = Some(points.first().map_or(request.start_ms, |point| point.x));
                state.window_end = Some(request.end_ms);
                state.loaded = points;
                state.status = PaginationStatus::Idle;
                Ok(state.loaded.clone())
            }
            Err(error) => {
                warn!(generation = request.generation, %error, "failed to initialise spread window");
                state.status = PaginationStatus::Error(error.clone());
                Err(error)
            }
        }
    }

    /// Fetch the page immediately older than the loaded series and prepend it.
    ///
    /// Returns the unchanged series without fetching if a load is in flight, nothing has been
    /// loaded yet, history is exhausted, or pagination is disabled.
    pub async fn load_older(&self) -> Result<Vec<DerivedPoint>, DataError> {
        let (config, request) = {
            let mut state = self.state.lock();
            let config = state.config;
            let window_start = match state.window_start {
                Some(window_start) if config.paginate && !state.exhausted && !state.is_busy() => {
                    window_start
                }
                _ => {
                    debug!(
                        generation = state.generation,
                        busy = state.is_busy(),
                        exhausted = state.exhausted,
                        "load older rejected"
                    );
                    return Ok(state.loaded.clone());
                }
            };
            let Some(pair) = state.pair.clone() else {
                return Ok(state.loaded.clone());
            };

            state.in_flight = Some(state.generation);
            state.status = PaginationStatus::Loading;

            let request = PageRequest {
                generation: state.generation,
                pipeline: SpreadPipeline::new(config),
                start_ms: window_start - pair.timeframe.page_span_ms(),
                end_ms: window_start,
                pair,
            };
            (config, request)
        };

        debug!(
            generation = request.generation,
            start_ms = request.start_ms,
            end_ms = request.end_ms,
            "load older accepted"
        );

        let result = self.fetch_page(&request).await;

        let mut state = self.state.lock();
        if state.generation != request.generation {
            debug!(
                generation = request.generation,
                current = state.generation,
                "discarding stale older page"
            );
            return Ok(state.loaded.clone());
        }

        state.in_flight = None;
        let points = match result {
            Ok(points) => points,
            Err(error) => {
                warn!(generation = request.generation, %error, "failed to load older page");
                state.status = PaginationStatus::Error(error.clone());
                return Err(error);
            }
        };
        state.status = PaginationStatus::Idle;

        // Anything at or after the first loaded point is already rendered
        let first_loaded = state.loaded.first().map(|point| point.x);
        let older = points
            .into_iter()
            .filter(|point| first_loaded.is_none_or(|first| point.x < first))
            .collect::<Vec<_>>();

        match older.first() {
            None => {
                state.empty_pages += 1;
                debug!(
                    generation = request.generation,
                    empty_pages = state.empty_pages,
                    window_start = ?state.window_start,
                    "older page is empty"
                );
                if state.empty_pages >= config.max_empty_pages {
                    info!(
                        generation = request.generation,
                        empty_pages = state.empty_pages,
                        "spread history exhausted"
                    );
                    state.exhausted = true;
                }
            }
            Some(oldest) => {
                state.empty_pages = 0;
                state.window_start = state.window_start.map(|start| start.min(oldest.x));
                state.loaded.splice(0..0, older);
            }
        }

        Ok(state.loaded.clone())
    }

    /// Check if a chart whose leftmost visible timestamp is `min_visible_ms` should trigger
    /// [`load_older`](Self::load_older).
    pub fn should_load_older(&self, min_visible_ms: TimestampMs) -> bool {
        let state = self.state.lock();
        state.config.paginate
            && !state.exhausted
            && !state.is_busy()
            && state
                .window_start
                .is_some_and(|window_start| min_visible_ms <= window_start)
    }

    /// Return from the error state to idle, keeping the loaded series.
    pub fn dismiss_error(&self) {
        let mut state = self.state.lock();
        if matches!(state.status, PaginationStatus::Error(_)) {
            state.status = PaginationStatus::Idle;
        }
    }

    pub fn status(&self) -> PaginationStatus {
        self.state.lock().status.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().is_busy()
    }

    pub fn is_exhausted(&self) -> bool {
        self.state.lock().exhausted
    }

    pub fn pair(&self) -> Option<SpreadPair> {
        self.state.lock().pair.clone()
    }

    /// `(window_start, window_end)` of the loaded range.
    pub fn window(&self) -> (Option<TimestampMs>, Option<TimestampMs>) {
        let state = self.state.lock();
        (state.window_start, state.window_end)
    }

    pub fn series(&self) -> Vec<DerivedPoint> {
        self.state.lock().loaded.clone()
    }

    /// Snapshot of the loaded series with bands recomputed over all of it.
    pub fn chart_snapshot(&self) -> ChartSnapshot {
        let (title, mode, series) = {
            let state = self.state.lock();
            let title = state.pair.as_ref().map(SpreadPair::title).unwrap_or_default();
            (title, state.config.mode, state.loaded.clone())
        };
        SpreadPipeline::new(self.config().with_mode(mode)).snapshot(title, series)
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<DerivedPoint>, DataError> {
        let PageRequest {
            pair,
            start_ms,
            end_ms,
            ..
        } = request;

        let (left, right) = futures::try_join!(
            self.source
                .fetch_klines(&pair.left, &pair.timeframe, *start_ms, *end_ms),
            self.source
                .fetch_klines(&pair.right, &pair.timeframe, *start_ms, *end_ms),
        )?;

        Ok(request.pipeline.derive(&left, &right))
    }
}
