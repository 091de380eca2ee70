//! `check-config`: show the merged configuration with secrets masked.

use anyhow::Result;
use theta_core::AppConfig;

const MASK: &str = "********";

/// # Errors
/// Returns an error if the configuration cannot be serialized.
pub fn run_check_config(config: &AppConfig) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&redacted(config))?);
    tracing::info!(
        strategy = %config.strategy.name,
        underlying = %config.strategy.underlying,
        "Configuration is valid"
    );
    Ok(())
}

fn redacted(config: &AppConfig) -> AppConfig {
    let mut config = config.clone();
    if let Some(telegram) = config.notify.telegram.as_mut() {
        telegram.bot_token = MASK.to_string();
    }
    if let Some(key) = config
        .market_data
        .gateway
        .as_mut()
        .and_then(|gateway| gateway.api_key.as_mut())
    {
        *key = MASK.to_string();
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use theta_core::{GatewayConfig, TelegramConfig};

    #[test]
    fn secrets_are_masked() {
        let mut config = AppConfig::default();
        config.notify.telegram = Some(TelegramConfig {
            bot_token: "123:secret".to_string(),
            chat_id: "42".to_string(),
            api_url: "https://api.telegram.org".to_string(),
        });
        config.market_data.gateway = Some(GatewayConfig {
            base_url: "http://127.0.0.1:8700".to_string(),
            api_key: Some("key".to_string()),
        });

        let shown = redacted(&config);
        let telegram = shown.notify.telegram.unwrap();
        assert_eq!(telegram.bot_token, MASK);
        assert_eq!(telegram.chat_id, "42");
        assert_eq!(shown.market_data.gateway.unwrap().api_key.as_deref(), Some(MASK));
        // Input config keeps its secrets.
        assert_eq!(config.notify.telegram.unwrap().bot_token, "123:secret");
    }
}
