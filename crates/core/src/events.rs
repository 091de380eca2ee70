use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertCategory {
    Entry,
    Exit,
    Skipped,
    Error,
    Reminder,
}

impl std::fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entry => write!(f, "ENTRY"),
            Self::Exit => write!(f, "EXIT"),
            Self::Skipped => write!(f, "SKIPPED"),
            Self::Error => write!(f, "ERROR"),
            Self::Reminder => write!(f, "REMINDER"),
        }
    }
}

/// A notification about the strategy's day.
///
/// Built after state has been committed; sinks only ever read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub category: AlertCategory,
    pub strategy: String,
    pub underlying: String,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub short_strike: Option<Decimal>,
    pub long_strike: Option<Decimal>,
    pub credit: Option<Decimal>,
    pub pnl: Option<Decimal>,
    pub message: String,
    /// Extra labelled lines, rendered in order.
    pub details: Vec<(String, String)>,
}

impl AlertEvent {
    pub fn new(
        category: AlertCategory,
        strategy: &str,
        underlying: &str,
        date: NaiveDate,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            strategy: strategy.to_string(),
            underlying: underlying.to_string(),
            date,
            created_at: Utc::now(),
            short_strike: None,
            long_strike: None,
            credit: None,
            pnl: None,
            message: message.into(),
            details: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_strikes(mut self, short_strike: Decimal, long_strike: Decimal) -> Self {
        self.short_strike = Some(short_strike);
        self.long_strike = Some(long_strike);
        self
    }

    #[must_use]
    pub fn with_credit(mut self, credit: Decimal) -> Self {
        self.credit = Some(credit);
        self
    }

    #[must_use]
    pub fn with_pnl(mut self, pnl: Decimal) -> Self {
        self.pnl = Some(pnl);
        self
    }

    #[must_use]
    pub fn with_detail(mut self, label: &str, value: impl Into<String>) -> Self {
        self.details.push((label.to_string(), value.into()));
        self
    }

    /// Plain-text message suitable for chat delivery.
    pub fn render(&self) -> String {
        let icon = match self.category {
            AlertCategory::Entry => "🟡",
            AlertCategory::Exit if self.pnl.is_some_and(|p| p < Decimal::ZERO) => "❌",
            AlertCategory::Exit => "✅",
            AlertCategory::Skipped => "⏭️",
            AlertCategory::Error => "🚨",
            AlertCategory::Reminder => "⚡",
        };

        let mut lines = vec![
            format!(
                "{icon} {} PAPER {} | {} {}",
                self.strategy, self.category, self.underlying, self.date
            ),
            self.message.clone(),
        ];
        if let (Some(short), Some(long)) = (self.short_strike, self.long_strike) {
            lines.push(format!("Short: {short} | Long: {long}"));
        }
        if let Some(credit) = self.credit {
            lines.push(format!("Credit: {}", format_amount(credit, 2)));
        }
        if let Some(pnl) = self.pnl {
            lines.push(format!("P&L: {}", format_signed(pnl, 0)));
        }
        for (label, value) in &self.details {
            lines.push(format!("{label}: {value}"));
        }
        lines.join("\n")
    }
}

/// Formats with thousands separators and a fixed number of decimals.
pub fn format_amount(value: Decimal, decimals: u32) -> String {
    let rounded = value
        .abs()
        .round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    let formatted = format!("{:.*}", decimals as usize, rounded);

    let (int_part, dec_part) = match formatted.split_once('.') {
        Some((int_part, dec_part)) => (int_part.to_string(), Some(dec_part.to_string())),
        None => (formatted, None),
    };

    let int_with_commas: String = int_part
        .chars()
        .rev()
        .enumerate()
        .flat_map(|(i, c)| if i > 0 && i % 3 == 0 { vec![',', c] } else { vec![c] })
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    let sign = if value < Decimal::ZERO && !rounded.is_zero() { "-" } else { "" };
    match dec_part {
        Some(d) => format!("{sign}{int_with_commas}.{d}"),
        None => format!("{sign}{int_with_commas}"),
    }
}

/// Like [`format_amount`] but always carries a sign.
pub fn format_signed(value: Decimal, decimals: u32) -> String {
    let body = format_amount(value, decimals);
    if body.starts_with('-') {
        body
    } else {
        format!("+{body}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()
    }

    #[test]
    fn amounts_get_thousands_separators() {
        assert_eq!(format_amount(dec!(1234567.891), 2), "1,234,567.89");
        assert_eq!(format_amount(dec!(999), 0), "999");
        assert_eq!(format_amount(dec!(-3000), 0), "-3,000");
        assert_eq!(format_signed(dec!(3000), 0), "+3,000");
        assert_eq!(format_signed(dec!(-12.5), 1), "-12.5");
    }

    #[test]
    fn exit_render_includes_pnl_and_strikes() {
        let event = AlertEvent::new(AlertCategory::Exit, "ThetaT", "NIFTY", date(), "EOD exit")
            .with_strikes(dec!(19800), dec!(19750))
            .with_pnl(dec!(3000))
            .with_detail("Reason", "end_of_day");

        let text = event.render();
        assert!(text.starts_with("✅ ThetaT PAPER EXIT | NIFTY 2026-10-20"));
        assert!(text.contains("Short: 19800 | Long: 19750"));
        assert!(text.contains("P&L: +3,000"));
        assert!(text.contains("Reason: end_of_day"));
    }

    #[test]
    fn losing_exit_uses_loss_icon() {
        let event = AlertEvent::new(AlertCategory::Exit, "ThetaT", "NIFTY", date(), "stop")
            .with_pnl(dec!(-500));
        assert!(event.render().starts_with("❌"));
    }

    #[test]
    fn category_serializes_upper_case() {
        let json = serde_json::to_string(&AlertCategory::Skipped).unwrap();
        assert_eq!(json, "\"SKIPPED\"");
    }
}
