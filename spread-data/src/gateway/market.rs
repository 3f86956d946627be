use super::{Auth, RestClient};
use crate::{
    depth::DepthSnapshot,
    error::DataError,
    instrument::{InstType, Instrument, InstrumentCatalog},
    model::{OhlcBar, TimestampMs},
    pagination::KlineSource,
    timeframe::Timeframe,
};
use async_trait::async_trait;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct MarketGateway {
    client: RestClient,
}

impl MarketGateway {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    /// Tradable instruments of one family. Public endpoint.
    pub async fn instruments(&self, inst_type: InstType) -> Result<InstrumentCatalog, DataError> {
        let inst_type = inst_type.to_string();
        let instruments = self
            .client
            .get::<Option<Vec<Instrument>>>(
                "/v5/public/instruments",
                &[("instType", inst_type.as_str())],
                Auth::Public,
            )
            .await?
            .unwrap_or_default();

        debug!(inst_type = %inst_type, count = instruments.len(), "fetched instruments");
        Ok(InstrumentCatalog::new(instruments))
    }

    /// OHLC bars of `symbol` in `[start_ms, end_ms)`.
    pub async fn klines(
        &self,
        symbol: &str,
        timeframe: &Timeframe,
        start_ms: TimestampMs,
        end_ms: TimestampMs,
    ) -> Result<Vec<OhlcBar>, DataError> {
        let timeframe_label = timeframe.to_string();
        let start = start_ms.to_string();
        let end = end_ms.to_string();

        let bars = self
            .client
            .get::<Option<Vec<OhlcBar>>>(
                "/v1/market/kline",
                &[
                    ("symbol", symbol),
                    ("timeframe", timeframe_label.as_str()),
                    ("startTime", start.as_str()),
                    ("endTime", end.as_str()),
                ],
                Auth::Bearer,
            )
            .await?
            .unwrap_or_default();

        debug!(symbol, %timeframe, start_ms, end_ms, count = bars.len(), "fetched klines");
        Ok(bars)
    }

    /// Latest order-book snapshot of `symbol`.
    pub async fn depth(&self, symbol: &str) -> Result<DepthSnapshot, DataError> {
        let mut snapshot = self
            .client
            .get::<DepthSnapshot>("/v1/market/depth", &[("symbol", symbol)], Auth::Bearer)
            .await?;

        if snapshot.symbol.is_empty() {
            snapshot.symbol = symbol.into();
        }
        Ok(snapshot)
    }
}

#[async_trait]
impl KlineSource for MarketGateway {
    async fn fetch_klines(
        &self,
        symbol: &str,
        timeframe: &Timeframe,
        start_ms: TimestampMs,
        end_ms: TimestampMs,
    ) -> Result<Vec<OhlcBar>, DataError> {
        self.klines(symbol, timeframe, start_ms, end_ms).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gateway::mock::{MockResponse, MockServer, serve_once},
        session::Session,
    };
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    async fn connect(response: MockResponse) -> (MarketGateway, MockServer) {
        let server = serve_once(response).await;
        let session = Arc::new(Session::default());
        session.login("jwt", "alice").unwrap();
        let client = RestClient::new(&server.config(), session).unwrap();
        (MarketGateway::new(client), server)
    }

    #[tokio::test]
    async fn test_instruments_public_request() {
        let (gateway, server) = connect(MockResponse::new(
            200,
            r#"[{"instId":"BTC-USDT"},{"instId":"ETH-USDT"},{"instId":"BTC-USDT"}]"#,
        ))
        .await;

        let catalog = gateway.instruments(InstType::Spot).await.unwrap();
        assert_eq!(catalog.len(), 2);

        let request = server.request().await;
        assert!(request.starts_with("GET /api/v5/public/instruments?instType=SPOT "));
        assert!(!request.to_lowercase().contains("authorization"));
    }

    #[tokio::test]
    async fn test_klines_request_and_lenient_decoding() {
        let (gateway, server) = connect(MockResponse::new(
            200,
            r#"{"code":200,"message":"Success","data":[
                {"timestamp":1000,"openPrice":1,"highPrice":2,"lowPrice":0.5,"closePrice":"1.5","volume":10},
                {"timestamp":2000,"openPrice":1,"highPrice":2,"lowPrice":0.5,"closePrice":null}
            ]}"#,
        ))
        .await;

        let bars = gateway
            .fetch_klines("BTC-USDT", &Timeframe::H1, 0, 3_600_000)
            .await
            .unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 1.5);
        assert!(!bars[1].has_numeric_close());

        let request = server.request().await;
        assert!(request.starts_with(
            "GET /api/v1/market/kline?symbol=BTC-USDT&timeframe=1h&startTime=0&endTime=3600000 "
        ));
        assert!(request.to_lowercase().contains("authorization: bearer jwt"));
    }

    #[tokio::test]
    async fn test_klines_null_data_is_empty() {
        let (gateway, _server) =
            connect(MockResponse::new(200, r#"{"code":200,"message":"Success","data":null}"#))
                .await;

        let bars = gateway.klines("X", &Timeframe::M1, 0, 1).await.unwrap();
        assert!(bars.is_empty());
    }

    #[tokio::test]
    async fn test_depth_fills_missing_symbol() {
        let (gateway, _server) = connect(MockResponse::new(
            200,
            r#"{"bids":"[[\"10.5\",\"1\"]]","asks":"[[\"10.7\",\"2\"]]","timestamp":5}"#,
        ))
        .await;

        let snapshot = gateway.depth("BTC-USDT").await.unwrap();

        assert_eq!(snapshot.symbol, "BTC-USDT");
        assert_eq!(snapshot.mid_price(), Some(dec!(10.6)));
    }
}
