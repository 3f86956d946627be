use derive_more::Display;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smol_str::SmolStr;
use std::{convert::Infallible, str::FromStr, time::Duration};

/// Number of bars covered by one pagination page.
pub const BARS_PER_PAGE: i64 = 1000;

/// Interval used for any timeframe the backend labels in a way we do not recognise.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Kline timeframe, as passed to `/v1/market/kline?timeframe=`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Display)]
pub enum Timeframe {
    #[display("1m")]
    M1,
    #[display("5m")]
    M5,
    #[display("15m")]
    M15,
    #[display("1h")]
    H1,
    #[display("4h")]
    H4,
    #[display("12h")]
    H12,
    #[display("1d")]
    D1,
    /// Label forwarded to the backend verbatim, sized with [`DEFAULT_INTERVAL`].
    #[display("{_0}")]
    Other(SmolStr),
}

impl Timeframe {
    pub const ALL: [Timeframe; 7] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::H12,
        Timeframe::D1,
    ];

    /// Duration of one bar.
    pub fn interval(&self) -> Duration {
        match self {
            Timeframe::M1 => Duration::from_secs(60),
            Timeframe::M5 => Duration::from_secs(300),
            Timeframe::M15 => Duration::from_secs(900),
            Timeframe::H1 => Duration::from_secs(3_600),
            Timeframe::H4 => Duration::from_secs(14_400),
            Timeframe::H12 => Duration::from_secs(43_200),
            Timeframe::D1 => Duration::from_secs(86_400),
            Timeframe::Other(_) => DEFAULT_INTERVAL,
        }
    }

    pub fn interval_ms(&self) -> i64 {
        self.interval().as_millis() as i64
    }

    /// Width of one pagination page in milliseconds: [`BARS_PER_PAGE`] bars.
    pub fn page_span_ms(&self) -> i64 {
        self.interval_ms() * BARS_PER_PAGE
    }

    /// Next timeframe in [`Timeframe::ALL`], wrapping around. `Other` maps to `1m`.
    pub fn next(&self) -> Timeframe {
        let position = Self::ALL.iter().position(|timeframe| timeframe == self);
        match position {
            Some(index) => Self::ALL[(index + 1) % Self::ALL.len()].clone(),
            None => Timeframe::M1,
        }
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Timeframe::H1
    }
}

impl FromStr for Timeframe {
    type Err = Infallible;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Ok(match input.trim() {
            "1m" => Timeframe::M1,
            "5m" => Timeframe::M5,
            "15m" => Timeframe::M15,
            "1h" => Timeframe::H1,
            "4h" => Timeframe::H4,
            "12h" => Timeframe::H12,
            "1d" => Timeframe::D1,
            other => Timeframe::Other(SmolStr::new(other)),
        })
    }
}

impl From<&str> for Timeframe {
    fn from(input: &str) -> Self {
        match input.parse() {
            Ok(timeframe) => timeframe,
            Err(never) => match never {},
        }
    }
}

impl Serialize for Timeframe {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timeframe {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let label = String::deserialize(deserializer)?;
        Ok(Timeframe::from(label.as_str()))
    }
}
