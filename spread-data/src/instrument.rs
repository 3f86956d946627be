use derive_more::Display;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Instrument family requested from `/v5/public/instruments?instType=`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, Display, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstType {
    #[default]
    #[display("SPOT")]
    Spot,
    #[display("SWAP")]
    Swap,
}

/// Tradable instrument from the catalog.
///
/// Only `instId` is guaranteed; everything else is display metadata.
///
/// Example:
/// ```json
/// {
///   "instId": "BTC-USDT-SWAP",
///   "instType": "SWAP",
///   "baseCcy": "BTC",
///   "quoteCcy": "USDT",
///   "state": "live",
///   "exchange": "okx"
/// }
/// ```
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    #[serde(rename = "instId")]
    pub id: SmolStr,
    #[serde(default)]
    pub inst_type: Option<InstType>,
    #[serde(default)]
    pub base_ccy: Option<SmolStr>,
    #[serde(default)]
    pub quote_ccy: Option<SmolStr>,
    #[serde(default)]
    pub settle_ccy: Option<SmolStr>,
    #[serde(default)]
    pub state: Option<SmolStr>,
    #[serde(default)]
    pub exchange: Option<SmolStr>,
}

impl Instrument {
    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self {
            id: id.into(),
            inst_type: None,
            base_ccy: None,
            quote_ccy: None,
            settle_ccy: None,
            state: None,
            exchange: None,
        }
    }
}

/// Instruments available to one view session, with the search behaviour of the selector inputs.
#[derive(Debug, Clone, Default)]
pub struct InstrumentCatalog {
    instruments: Vec<Instrument>,
}

impl InstrumentCatalog {
    /// Build a catalog, dropping later entries that repeat an earlier `instId`.
    pub fn new(instruments: impl IntoIterator<Item = Instrument>) -> Self {
        let mut seen = fnv::FnvHashSet::default();
        let instruments = instruments
            .into_iter()
            .filter(|instrument| seen.insert(instrument.id.clone()))
            .collect();

        Self { instruments }
    }

    pub fn all(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Instrument> {
        self.instruments.iter().find(|instrument| instrument.id == id)
    }

    /// Case-insensitive substring match on `instId`. An empty query matches everything.
    pub fn search(&self, query: &str) -> Vec<&Instrument> {
        let query = query.trim().to_lowercase();
        self.instruments
            .iter()
            .filter(|instrument| instrument.id.to_lowercase().contains(&query))
            .collect()
    }

    /// Case-insensitive prefix match on `instId`. An empty query matches everything.
    pub fn by_prefix(&self, query: &str) -> Vec<&Instrument> {
        let query = query.trim().to_lowercase();
        self.instruments
            .iter()
            .filter(|instrument| instrument.id.to_lowercase().starts_with(&query))
            .collect()
    }
}

impl FromIterator<Instrument> for InstrumentCatalog {
    fn from_iter<T: IntoIterator<Item = Instrument>>(iter: T) -> Self {
        Self::new(iter)
    }
}
