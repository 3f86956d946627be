use super::{Auth, RestClient};
use crate::{
    error::DataError,
    instrument::{InstType, Instrument, InstrumentCatalog},
    timeframe::Timeframe,
};
use derive_more::Display;
use reqwest::Method;
use serde::{Deserialize, Serialize, de::IgnoredAny};
use smol_str::SmolStr;
use tracing::info;

/// Kind of market data a subscription covers.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[display("realtime")]
    Realtime,
    #[display("ohlc")]
    Ohlc,
    #[display("depth")]
    Depth,
}

/// Active subscription from `/v1/subscription/user`.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    pub symbol: SmolStr,
    pub data_type: DataType,
    #[serde(default)]
    pub inst_type: Option<InstType>,
    #[serde(default)]
    pub timeframe: Option<Timeframe>,
    #[serde(default)]
    pub exchange: Option<SmolStr>,
}

/// Parameters of a new subscription.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SubscriptionRequest {
    pub symbol: SmolStr,
    pub data_type: DataType,
    pub inst_type: InstType,
    /// Only sent for [`DataType::Ohlc`].
    pub timeframe: Option<Timeframe>,
    pub exchange: Option<SmolStr>,
}

impl SubscriptionRequest {
    pub fn new(symbol: impl Into<SmolStr>, data_type: DataType, inst_type: InstType) -> Self {
        Self {
            symbol: symbol.into(),
            data_type,
            inst_type,
            timeframe: None,
            exchange: None,
        }
    }

    pub fn with_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = Some(timeframe);
        self
    }

    pub fn with_exchange(mut self, exchange: impl Into<SmolStr>) -> Self {
        self.exchange = Some(exchange.into());
        self
    }

    fn query(&self, username: &str) -> Result<Vec<(&'static str, String)>, DataError> {
        let mut query = vec![
            ("username", username.to_string()),
            ("symbol", self.symbol.to_string()),
            ("dataType", self.data_type.to_string()),
            ("instType", self.inst_type.to_string()),
        ];

        if self.data_type == DataType::Ohlc {
            let timeframe = self.timeframe.as_ref().ok_or_else(|| {
                DataError::InvalidInput("ohlc subscriptions require a timeframe".to_string())
            })?;
            query.push(("timeframe", timeframe.to_string()));
        }

        if let Some(exchange) = &self.exchange {
            query.push(("exchange", exchange.to_string()));
        }

        Ok(query)
    }
}

#[derive(Debug, Clone)]
pub struct SubscriptionGateway {
    client: RestClient,
}

impl SubscriptionGateway {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    fn username(&self) -> Result<String, DataError> {
        self.client
            .session()
            .username()
            .ok_or(DataError::NotAuthenticated)
    }

    /// Subscriptions of the logged-in user.
    pub async fn list(&self) -> Result<Vec<Subscription>, DataError> {
        let username = self.username()?;
        Ok(self
            .client
            .get::<Option<Vec<Subscription>>>(
                "/v1/subscription/user",
                &[("username", username.as_str())],
                Auth::Bearer,
            )
            .await?
            .unwrap_or_default())
    }

    pub async fn subscribe(&self, request: &SubscriptionRequest) -> Result<(), DataError> {
        let username = self.username()?;
        let query = request.query(&username)?;
        let query = query
            .iter()
            .map(|(key, value)| (*key, value.as_str()))
            .collect::<Vec<_>>();

        self.client
            .request::<IgnoredAny>(
                Method::POST,
                "/v1/subscription/subscribe",
                &query,
                None,
                Auth::Bearer,
            )
            .await?;

        info!(
            symbol = %request.symbol,
            data_type = %request.data_type,
            timeframe = ?request.timeframe,
            "subscribed"
        );
        Ok(())
    }

    pub async fn unsubscribe(&self, symbol: &str, data_type: DataType) -> Result<(), DataError> {
        let username = self.username()?;
        let data_type_label = data_type.to_string();

        self.client
            .request::<IgnoredAny>(
                Method::POST,
                "/v1/subscription/unsubscribe",
                &[
                    ("username", username.as_str()),
                    ("symbol", symbol),
                    ("dataType", data_type_label.as_str()),
                ],
                None,
                Auth::Bearer,
            )
            .await?;

        info!(symbol, %data_type, "unsubscribed");
        Ok(())
    }

    pub async fn is_subscribed(&self, symbol: &str, data_type: DataType) -> Result<bool, DataError> {
        Ok(self
            .list()
            .await?
            .iter()
            .any(|subscription| subscription.symbol == symbol && subscription.data_type == data_type))
    }

    /// Instruments the user holds at least one subscription for, used to pick spread pairs.
    pub async fn subscribed_catalog(&self) -> Result<InstrumentCatalog, DataError> {
        Ok(subscribed_catalog(&self.list().await?))
    }
}

/// One instrument per distinct subscribed symbol, in first-seen order.
pub fn subscribed_catalog(subscriptions: &[Subscription]) -> InstrumentCatalog {
    subscriptions
        .iter()
        .map(|subscription| Instrument {
            inst_type: subscription.inst_type,
            exchange: subscription.exchange.clone(),
            ..Instrument::new(subscription.symbol.clone())
        })
        .collect()
}
