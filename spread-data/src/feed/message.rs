use crate::{
    depth::DepthSnapshot,
    model::{TimestampMs, de_lenient_f64},
};
use serde::{Deserialize, Deserializer, Serialize};
use smol_str::SmolStr;

/// Message pushed by the `/ws/market` feed.
///
/// Example:
/// ```json
/// {"type": "realtime", "symbol": "BTC-USDT", "price": "43210.5", "timestamp": 1700000000000}
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedMessage {
    Realtime(RealtimeTick),
    Depth(DepthSnapshot),
}

impl FeedMessage {
    pub fn symbol(&self) -> &str {
        match self {
            FeedMessage::Realtime(tick) => &tick.symbol,
            FeedMessage::Depth(snapshot) => &snapshot.symbol,
        }
    }

    /// Parse a text frame, returning `None` for anything that is not a market message.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Last traded price of one instrument.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RealtimeTick {
    pub symbol: SmolStr,
    #[serde(default, deserialize_with = "de_optional_price")]
    pub price: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<TimestampMs>,
}

fn de_optional_price<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let price = de_lenient_f64(deserializer)?;
    Ok(price.is_finite().then_some(price))
}
