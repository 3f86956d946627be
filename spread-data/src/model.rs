use serde::{Deserialize, Deserializer, Serialize};

/// Epoch milliseconds.
pub type TimestampMs = i64;

/// OHLC bar for one interval of one instrument, as returned by `/v1/market/kline`.
///
/// Prices are decoded leniently: JSON numbers, numeric strings and `null` are all accepted,
/// with anything non-numeric decoded as `NaN` so the [`align`](crate::align::align) stage can
/// exclude the bar rather than fail the whole page.
///
/// Example:
/// ```json
/// {
///   "symbol": "BTC-USDT-SWAP",
///   "timeframe": "1h",
///   "timestamp": 1700000000000,
///   "openPrice": 37000.1,
///   "highPrice": "37100.5",
///   "lowPrice": 36950.0,
///   "closePrice": 37050.2,
///   "volume": 1234.5
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct OhlcBar {
    pub timestamp: TimestampMs,
    #[serde(rename = "openPrice", deserialize_with = "de_lenient_f64", default = "nan")]
    pub open: f64,
    #[serde(rename = "highPrice", deserialize_with = "de_lenient_f64", default = "nan")]
    pub high: f64,
    #[serde(rename = "lowPrice", deserialize_with = "de_lenient_f64", default = "nan")]
    pub low: f64,
    #[serde(rename = "closePrice", deserialize_with = "de_lenient_f64", default = "nan")]
    pub close: f64,
}

impl OhlcBar {
    pub fn new(timestamp: TimestampMs, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
        }
    }

    /// Bar where every price equals `close`, handy for line-only series.
    pub fn flat(timestamp: TimestampMs, close: f64) -> Self {
        Self::new(timestamp, close, close, close, close)
    }

    /// Check if the close price is usable for spread computation.
    pub fn has_numeric_close(&self) -> bool {
        self.close.is_finite()
    }
}

/// Pair of bars from two instruments sharing the same timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignedPoint {
    pub timestamp: TimestampMs,
    pub left: OhlcBar,
    pub right: OhlcBar,
}

/// Point of a derived series. `y` is only `None` inside a rolling-statistics warm-up region.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct DerivedPoint {
    pub x: TimestampMs,
    pub y: Option<f64>,
}

impl DerivedPoint {
    pub fn new(x: TimestampMs, y: f64) -> Self {
        Self { x, y: Some(y) }
    }

    pub fn empty(x: TimestampMs) -> Self {
        Self { x, y: None }
    }
}

fn nan() -> f64 {
    f64::NAN
}

/// Deserialize an `f64` from a JSON number, a numeric string, or `null` (yielding `NaN`).
pub(crate) fn de_lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(number) => number.as_f64().unwrap_or(f64::NAN),
        serde_json::Value::String(text) => text.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    })
}
