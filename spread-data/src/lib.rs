#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments, type_alias_bounds)]

//! # Spread-Data
//! Pairwise spread analytics over OHLC market data fetched from a market-data backend.
//!
//! Two instruments' bars are joined on timestamp ([`align`](align::align)), reduced to one
//! spread value per point ([`transform`](transform::transform)), and optionally wrapped in
//! rolling Bollinger bands ([`rolling_bands`](rolling::rolling_bands)). A
//! [`PaginationController`](pagination::PaginationController) keeps the resulting series for
//! one view and extends it backwards one page at a time as the chart scrolls left.
//!
//! The backend is reached through thin REST [`gateway`]s sharing one
//! [`Session`](session::Session), plus a single auto-reconnecting WebSocket [`feed`].
//!
//! ## Example
//! ```rust,no_run
//! use spread_data::{
//!     config::ClientConfig,
//!     gateway::{RestClient, auth::AuthGateway, market::MarketGateway},
//!     pagination::{PaginationController, SpreadPair},
//!     pipeline::SpreadConfig,
//!     session::Session,
//!     timeframe::Timeframe,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), spread_data::error::DataError> {
//!     let config = ClientConfig::from_env();
//!     let client = RestClient::new(&config, Arc::new(Session::default()))?;
//!
//!     AuthGateway::new(client.clone()).login("alice", "secret").await?;
//!
//!     let controller =
//!         PaginationController::new(MarketGateway::new(client), SpreadConfig::default());
//!     let series = controller
//!         .initialize(SpreadPair::new("BTC-USDT-SWAP", "ETH-USDT-SWAP", Timeframe::H1))
//!         .await?;
//!     println!("{} spread points", series.len());
//!
//!     let older = controller.load_older().await?;
//!     println!("{} spread points after paging back", older.len());
//!     Ok(())
//! }
//! ```

/// Timestamp inner-join of two OHLC series.
pub mod align;

/// Chart snapshot & rendering surface consumed by front-ends.
pub mod chart;

/// Connection settings.
pub mod config;

/// Order-book depth snapshots.
pub mod depth;

/// All [`Error`](std::error::Error)s generated in Spread-Data.
pub mod error;

/// WebSocket market feed.
pub mod feed;

/// REST gateways to the backend.
pub mod gateway;

/// Instrument catalog & search.
pub mod instrument;

/// Core data model.
pub mod model;

/// Backward-extending spread window.
pub mod pagination;

/// Align -> transform -> bands pipeline, parameterised per view.
pub mod pipeline;

/// Rolling Bollinger bands.
pub mod rolling;

/// Authenticated session & persistence.
pub mod session;

/// Kline timeframes & page sizing.
pub mod timeframe;

/// Spread transforms.
pub mod transform;

pub use error::DataError;
pub use model::{AlignedPoint, DerivedPoint, OhlcBar, TimestampMs};
pub use pagination::{KlineSource, PaginationController, PaginationStatus, SpreadPair};
pub use pipeline::{SpreadConfig, SpreadPipeline};
pub use transform::SpreadMode;
