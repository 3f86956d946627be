//! Order-book depth snapshots from `/v1/market/depth` and the `depth` feed message.

use crate::model::TimestampMs;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use smol_str::SmolStr;
use std::str::FromStr;

/// Price/quantity level in an order book.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DepthLevel {
    pub price: Decimal,
    pub amount: Decimal,
}

impl Serialize for DepthLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        [self.price.to_string(), self.amount.to_string()].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DepthLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Exchanges send ["price", "size", ...] with optional trailing fields
        let raw: Vec<serde_json::Value> = Deserialize::deserialize(deserializer)?;
        if raw.len() < 2 {
            return Err(serde::de::Error::custom(
                "expected at least [price, size] in depth level",
            ));
        }

        Ok(DepthLevel {
            price: de_decimal(&raw[0]).map_err(serde::de::Error::custom)?,
            amount: de_decimal(&raw[1]).map_err(serde::de::Error::custom)?,
        })
    }
}

fn de_decimal(value: &serde_json::Value) -> Result<Decimal, String> {
    match value {
        serde_json::Value::String(text) => Decimal::from_str(text.trim()).map_err(|e| e.to_string()),
        serde_json::Value::Number(number) => {
            Decimal::from_str(&number.to_string()).map_err(|e| e.to_string())
        }
        other => Err(format!("expected decimal, found {other}")),
    }
}

/// Order-book snapshot for one symbol.
///
/// The REST endpoint embeds `bids`/`asks` as JSON-encoded strings, whereas the WebSocket
/// broadcast inlines them as arrays. Both decode to the same levels.
///
/// Example:
/// ```json
/// {
///   "symbol": "BTC-USDT-SWAP",
///   "bids": "[[\"41006.7\",\"0.3\",\"0\",\"2\"]]",
///   "asks": "[[\"41006.8\",\"0.6\",\"0\",\"1\"]]",
///   "timestamp": 1629966436396
/// }
/// ```
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct DepthSnapshot {
    #[serde(default)]
    pub symbol: SmolStr,
    #[serde(deserialize_with = "de_levels", default)]
    pub bids: Vec<DepthLevel>,
    #[serde(deserialize_with = "de_levels", default)]
    pub asks: Vec<DepthLevel>,
    #[serde(default)]
    pub timestamp: Option<TimestampMs>,
}

impl DepthSnapshot {
    /// Highest bid.
    pub fn best_bid(&self) -> Option<&DepthLevel> {
        self.bids.iter().max_by_key(|level| level.price)
    }

    /// Lowest ask.
    pub fn best_ask(&self) -> Option<&DepthLevel> {
        self.asks.iter().min_by_key(|level| level.price)
    }

    /// Calculate the bid-ask spread.
    pub fn bid_ask_spread(&self) -> Option<Decimal> {
        Some(self.best_ask()?.price - self.best_bid()?.price)
    }

    /// Calculate the mid price.
    pub fn mid_price(&self) -> Option<Decimal> {
        Some((self.best_ask()?.price + self.best_bid()?.price) / Decimal::TWO)
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

/// Deserialize levels from an inline array, a JSON-encoded string, or `null`.
pub(crate) fn de_levels<'de, D>(deserializer: D) -> Result<Vec<DepthLevel>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::String(encoded) if encoded.trim().is_empty() => Ok(Vec::new()),
        serde_json::Value::String(encoded) => {
            serde_json::from_str(&encoded).map_err(serde::de::Error::custom)
        }
        inline => serde_json::from_value(inline).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_depth_level_deserialise() {
        struct TestCase {
            input: &'static str,
            expected: Option<DepthLevel>,
        }

        let tests = vec![
            TestCase {
                // TC0: okx style level
                input: r#"["41006.8", "0.60038921", "0", "1"]"#,
                expected: Some(DepthLevel {
                    price: dec!(41006.8),
                    amount: dec!(0.60038921),
                }),
            },
            TestCase {
                // TC1: binance style level
                input: r#"["100.5", "2"]"#,
                expected: Some(DepthLevel {
                    price: dec!(100.5),
                    amount: dec!(2),
                }),
            },
            TestCase {
                // TC2: numeric level
                input: r#"[100.25, 3]"#,
                expected: Some(DepthLevel {
                    price: dec!(100.25),
                    amount: dec!(3),
                }),
            },
            TestCase {
                // TC3: too short
                input: r#"["100.5"]"#,
                expected: None,
            },
            TestCase {
                // TC4: non-numeric price
                input: r#"["abc", "1"]"#,
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = serde_json::from_str::<DepthLevel>(test.input).ok();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_depth_snapshot_string_encoded_levels() {
        let input = r#"{
            "symbol": "BTC-USDT-SWAP",
            "bids": "[[\"41006.7\",\"0.3\",\"0\",\"2\"],[\"41006.1\",\"1.0\",\"0\",\"1\"]]",
            "asks": "[[\"41006.8\",\"0.6\",\"0\",\"1\"]]",
            "timestamp": 1629966436396
        }"#;

        let snapshot = serde_json::from_str::<DepthSnapshot>(input).unwrap();

        assert_eq!(snapshot.symbol, "BTC-USDT-SWAP");
        assert_eq!(snapshot.bids.len(), 2);
        assert_eq!(snapshot.asks.len(), 1);
        assert_eq!(snapshot.best_bid().unwrap().price, dec!(41006.7));
        assert_eq!(snapshot.best_ask().unwrap().price, dec!(41006.8));
        assert_eq!(snapshot.bid_ask_spread(), Some(dec!(0.1)));
        assert_eq!(snapshot.mid_price(), Some(dec!(41006.75)));
    }

    #[test]
    fn test_depth_snapshot_inline_levels() {
        let input = r#"{
            "symbol": "ETHUSDT",
            "bids": [["2000.1", "4"]],
            "asks": [],
            "timestamp": 1
        }"#;

        let snapshot = serde_json::from_str::<DepthSnapshot>(input).unwrap();

        assert_eq!(snapshot.bids.len(), 1);
        assert!(snapshot.asks.is_empty());
        assert_eq!(snapshot.best_ask(), None);
        assert_eq!(snapshot.bid_ask_spread(), None);
    }

    #[test]
    fn test_depth_snapshot_serialises_levels_as_arrays() {
        let snapshot = DepthSnapshot {
            symbol: SmolStr::new("X"),
            bids: vec![DepthLevel {
                price: dec!(1.5),
                amount: dec!(2),
            }],
            asks: vec![],
            timestamp: None,
        };

        let encoded = serde_json::to_string(&snapshot).unwrap();
        let decoded = serde_json::from_str::<DepthSnapshot>(&encoded).unwrap();

        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn test_depth_snapshot_missing_levels() {
        let snapshot = serde_json::from_str::<DepthSnapshot>(r#"{"symbol":"X","bids":null}"#)
            .unwrap();
        assert!(snapshot.is_empty());
    }
}
