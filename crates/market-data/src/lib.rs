//! Market data for the credit-spread engine.
//!
//! Provides the broker gateway client, a Yahoo spot fallback, and the
//! paper-mode premium model, combined into a single
//! [`theta_core::MarketDataSource`] by [`build_source`].

pub mod client;
pub mod market_data;
pub mod options_chain;
pub mod paper;
pub mod source;
pub mod types;

pub use client::GatewayClient;
pub use market_data::{FallbackSpotFeed, SpotFeed, YahooSpotFeed};
pub use options_chain::PremiumFeed;
pub use paper::{ModelPremiumFeed, PremiumModel};
pub use source::{build_source, CompositeSource};
pub use types::OptionQuote;
