pub mod config;
pub mod config_loader;
pub mod contract;
pub mod error;
pub mod events;
pub mod traits;

pub use config::{
    AppConfig, GatewayConfig, MarketDataConfig, NotifyConfig, PremiumModelConfig,
    PremiumSourceKind, PremiumTier, RuntimeConfig, SpotSourceKind, StateConfig, StrategyConfig,
    TelegramConfig, YahooConfig,
};
pub use config_loader::{profile_path, ConfigLoader};
pub use contract::{OptionRight, OptionsContract};
pub use error::{ConfigError, FetchError};
pub use events::{format_amount, format_signed, AlertCategory, AlertEvent};
pub use traits::{MarketDataSource, NotificationSink};
