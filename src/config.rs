use std::str::FromStr;

use tracing::warn;

use crate::domain::{Currency, Money, Rail, SettlementWindow};

pub const DEFAULT_MIN_WITHDRAWAL_CENTS: i64 = 5_000; // 50.00

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub currency: Currency,
    pub min_withdrawal_cents: i64,
    pub instant_window: SettlementWindow,
    pub manual_window: SettlementWindow,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            currency: Currency::Mxn,
            min_withdrawal_cents: DEFAULT_MIN_WITHDRAWAL_CENTS,
            instant_window: SettlementWindow::INSTANT,
            manual_window: SettlementWindow::MANUAL,
        }
    }
}

impl EngineConfig {
    /// Reads `WALLET_CURRENCY` and `WALLET_MIN_WITHDRAWAL_CENTS`. Missing or
    /// malformed values keep the defaults. The minimum can only be raised.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let min_withdrawal_cents =
            env_or("WALLET_MIN_WITHDRAWAL_CENTS", defaults.min_withdrawal_cents);
        if min_withdrawal_cents < DEFAULT_MIN_WITHDRAWAL_CENTS {
            warn!(
                configured = min_withdrawal_cents,
                floor = DEFAULT_MIN_WITHDRAWAL_CENTS,
                "minimum withdrawal below floor, using floor"
            );
        }
        Self {
            currency: env_or("WALLET_CURRENCY", defaults.currency),
            min_withdrawal_cents: min_withdrawal_cents.max(DEFAULT_MIN_WITHDRAWAL_CENTS),
            ..defaults
        }
    }

    /// Never below `DEFAULT_MIN_WITHDRAWAL_CENTS`.
    pub fn min_withdrawal(&self) -> Money {
        Money::new(
            self.min_withdrawal_cents.max(DEFAULT_MIN_WITHDRAWAL_CENTS),
            self.currency,
        )
    }

    pub fn window_for(&self, rail: Rail) -> SettlementWindow {
        match rail {
            Rail::Instant => self.instant_window,
            Rail::Manual => self.manual_window,
        }
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + core::fmt::Debug,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, ?default, "malformed setting, using default");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_deployment() {
        let config = EngineConfig::default();
        assert_eq!(config.min_withdrawal(), Money::new(5_000, Currency::Mxn));
        assert_eq!(config.window_for(Rail::Instant), SettlementWindow::new(1, 2));
        assert_eq!(config.window_for(Rail::Manual), SettlementWindow::new(3, 5));
    }

    #[test]
    fn minimum_withdrawal_cannot_drop_below_floor() {
        for cents in [0, -100, 4_999] {
            let config = EngineConfig {
                min_withdrawal_cents: cents,
                ..EngineConfig::default()
            };
            assert_eq!(config.min_withdrawal(), Money::new(5_000, Currency::Mxn));
        }

        let config = EngineConfig {
            min_withdrawal_cents: 10_000,
            ..EngineConfig::default()
        };
        assert_eq!(config.min_withdrawal(), Money::new(10_000, Currency::Mxn));
    }

    #[test]
    fn environment_cannot_lower_the_minimum() {
        // SAFETY: no other test in this crate touches this variable
        unsafe { std::env::set_var("WALLET_MIN_WITHDRAWAL_CENTS", "100") };
        let lowered = EngineConfig::from_env();
        unsafe { std::env::set_var("WALLET_MIN_WITHDRAWAL_CENTS", "7500") };
        let raised = EngineConfig::from_env();
        unsafe { std::env::remove_var("WALLET_MIN_WITHDRAWAL_CENTS") };

        assert_eq!(lowered.min_withdrawal_cents, DEFAULT_MIN_WITHDRAWAL_CENTS);
        assert_eq!(raised.min_withdrawal_cents, 7_500);
    }
}
