use std::path::PathBuf;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub strategy: StrategyConfig,
    pub state: StateConfig,
    pub market_data: MarketDataConfig,
    pub notify: NotifyConfig,
    pub runtime: RuntimeConfig,
}

impl AppConfig {
    /// Checks every section that has invariants of its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.strategy.validate()?;
        self.market_data.validate()?;
        if self.runtime.call_timeout_secs == 0 {
            return Err(ConfigError::invalid("runtime.call_timeout_secs must be positive"));
        }
        if self.runtime.poll_interval_secs == 0 {
            return Err(ConfigError::invalid("runtime.poll_interval_secs must be positive"));
        }
        Ok(())
    }
}

/// Parameters of one credit-spread strategy instance.
///
/// Loaded once per invocation and never mutated afterwards. A snapshot is
/// written next to every daily record so old records stay interpretable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Label used in alerts (e.g. "ThetaT").
    pub name: String,
    pub underlying: String,
    pub lot_size: u32,
    pub lots: u32,
    /// Distance of the short strike below spot, in percent of spot.
    pub otm_pct: Decimal,
    /// Width between short and long strike. Also the strike step.
    pub spread_width: Decimal,
    /// Minimum net credit as a fraction of `spread_width`.
    pub min_credit_ratio: Decimal,
    pub entry_start: NaiveTime,
    pub entry_end: NaiveTime,
    pub exit_time: NaiveTime,
    pub paper_capital: Decimal,
    /// IANA zone the clock times above are expressed in.
    pub timezone: String,
    pub trade_weekdays: Vec<Weekday>,
    /// Close early once cost-to-close reaches this multiple of the entry credit.
    pub stop_loss_multiplier: Option<Decimal>,
    /// Consecutive failed exit quotes tolerated before escalating.
    pub max_exit_attempts: u32,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            name: "ThetaT".to_string(),
            underlying: "NIFTY".to_string(),
            lot_size: 75,
            lots: 2,
            otm_pct: dec!(1.0),
            spread_width: dec!(50),
            min_credit_ratio: dec!(0.15),
            entry_start: clock(11, 0),
            entry_end: clock(14, 0),
            exit_time: clock(15, 25),
            paper_capital: dec!(500000),
            timezone: "Asia/Kolkata".to_string(),
            trade_weekdays: vec![Weekday::Tue],
            stop_loss_multiplier: None,
            max_exit_attempts: 3,
        }
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.underlying.trim().is_empty() {
            return Err(ConfigError::invalid("strategy.underlying must not be empty"));
        }
        if self.lot_size == 0 || self.lots == 0 {
            return Err(ConfigError::invalid(
                "strategy.lot_size and strategy.lots must be positive",
            ));
        }
        if self.lots.checked_mul(self.lot_size).is_none() {
            return Err(ConfigError::invalid(format!(
                "strategy.lots x strategy.lot_size overflows ({} x {})",
                self.lots, self.lot_size
            )));
        }
        if self.spread_width <= Decimal::ZERO {
            return Err(ConfigError::invalid("strategy.spread_width must be positive"));
        }
        if self.otm_pct <= Decimal::ZERO || self.otm_pct >= Decimal::ONE_HUNDRED {
            return Err(ConfigError::invalid("strategy.otm_pct must be in (0, 100)"));
        }
        if self.min_credit_ratio <= Decimal::ZERO || self.min_credit_ratio >= Decimal::ONE {
            return Err(ConfigError::invalid(
                "strategy.min_credit_ratio must be in (0, 1)",
            ));
        }
        if !(self.entry_start < self.entry_end && self.entry_end < self.exit_time) {
            return Err(ConfigError::invalid(format!(
                "strategy times must satisfy entry_start < entry_end < exit_time (got {} / {} / {})",
                self.entry_start, self.entry_end, self.exit_time
            )));
        }
        if self.paper_capital <= Decimal::ZERO {
            return Err(ConfigError::invalid("strategy.paper_capital must be positive"));
        }
        if self.trade_weekdays.is_empty() {
            return Err(ConfigError::invalid("strategy.trade_weekdays must not be empty"));
        }
        if let Some(multiplier) = self.stop_loss_multiplier {
            if multiplier <= Decimal::ONE {
                return Err(ConfigError::invalid(
                    "strategy.stop_loss_multiplier must be greater than 1",
                ));
            }
        }
        if self.max_exit_attempts == 0 {
            return Err(ConfigError::invalid("strategy.max_exit_attempts must be at least 1"));
        }
        self.tz()?;
        Ok(())
    }

    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| ConfigError::invalid(format!("strategy.timezone: {e}")))
    }

    /// Units traded: lots × lot size. [`validate`](Self::validate) rejects
    /// sizes that do not fit.
    pub fn quantity(&self) -> u32 {
        self.lots.saturating_mul(self.lot_size)
    }

    /// Strikes are listed on the same increment as the spread width.
    pub fn strike_step(&self) -> Decimal {
        self.spread_width
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        self.trade_weekdays.contains(&date.weekday())
    }

    /// Converts a wall-clock instant into the strategy's local time.
    pub fn local(&self, now: DateTime<Utc>) -> Result<DateTime<Tz>, ConfigError> {
        Ok(now.with_timezone(&self.tz()?))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Root directory; records land in `<dir>/<underlying>/<date>.json`.
    pub dir: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("state"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpotSourceKind {
    Gateway,
    Yahoo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PremiumSourceKind {
    /// Paper mode: premiums estimated from spot distance and time left.
    Model,
    /// Quotes from the broker gateway.
    Gateway,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDataConfig {
    /// Spot sources in priority order; the first positive price wins.
    pub spot_sources: Vec<SpotSourceKind>,
    pub premium_source: PremiumSourceKind,
    pub yahoo: YahooConfig,
    pub gateway: Option<GatewayConfig>,
    pub model: PremiumModelConfig,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            spot_sources: vec![SpotSourceKind::Yahoo],
            premium_source: PremiumSourceKind::Model,
            yahoo: YahooConfig::default(),
            gateway: None,
            model: PremiumModelConfig::default(),
        }
    }
}

impl MarketDataConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.spot_sources.is_empty() {
            return Err(ConfigError::invalid("market_data.spot_sources must not be empty"));
        }
        let needs_gateway = self.premium_source == PremiumSourceKind::Gateway
            || self.spot_sources.contains(&SpotSourceKind::Gateway);
        if needs_gateway && self.gateway.is_none() {
            return Err(ConfigError::invalid(
                "market_data.gateway must be configured when a gateway source is selected",
            ));
        }
        self.model.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YahooConfig {
    pub base_url: String,
    /// Chart symbol of the underlying index (e.g. `^NSEI`).
    pub symbol: String,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            symbol: "^NSEI".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// One band of the paper premium model: below `max_distance_pct` OTM the
/// premium is `base_pct` percent of spot (before time decay).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PremiumTier {
    pub max_distance_pct: Decimal,
    pub base_pct: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PremiumModelConfig {
    /// Bands sorted by ascending `max_distance_pct`.
    pub tiers: Vec<PremiumTier>,
    /// Premium percentage beyond the last band.
    pub tail_pct: Decimal,
    /// Lowest premium the model will quote.
    pub floor: Decimal,
    /// Session close used to compute hours to expiry.
    pub session_close: NaiveTime,
    /// Hours to close at which time decay starts to bite.
    pub full_value_hours: Decimal,
}

impl Default for PremiumModelConfig {
    fn default() -> Self {
        let tier = |max_distance_pct, base_pct| PremiumTier {
            max_distance_pct,
            base_pct,
        };
        Self {
            tiers: vec![
                tier(dec!(0.2), dec!(0.45)),
                tier(dec!(0.4), dec!(0.35)),
                tier(dec!(0.6), dec!(0.25)),
                tier(dec!(0.8), dec!(0.18)),
                tier(dec!(1.0), dec!(0.12)),
                tier(dec!(1.2), dec!(0.08)),
                tier(dec!(1.5), dec!(0.05)),
                tier(dec!(2.0), dec!(0.03)),
            ],
            tail_pct: dec!(0.015),
            floor: dec!(3),
            session_close: clock(15, 30),
            full_value_hours: dec!(5.5),
        }
    }
}

impl PremiumModelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ascending = self
            .tiers
            .windows(2)
            .all(|pair| pair[0].max_distance_pct < pair[1].max_distance_pct);
        if !ascending {
            return Err(ConfigError::invalid(
                "market_data.model.tiers must be sorted by ascending max_distance_pct",
            ));
        }
        if self.floor < Decimal::ZERO || self.full_value_hours <= Decimal::ZERO {
            return Err(ConfigError::invalid(
                "market_data.model.floor must be >= 0 and full_value_hours > 0",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Alerts go to the log only when this is absent.
    pub telegram: Option<TelegramConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    #[serde(default = "default_telegram_api")]
    pub api_url: String,
}

fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Upper bound for every external call made during one invocation.
    pub call_timeout_secs: u64,
    /// Interval between invocations in `watch` mode.
    pub poll_interval_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: 10,
            poll_interval_secs: 300,
        }
    }
}

fn clock(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}
