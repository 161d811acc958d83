//! Config fingerprinting: deterministic identity of an engine configuration.
//!
//! Two processes running the same configuration report the same fingerprint,
//! which is what a parity comparison checks before it looks at any trades.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engine::EngineConfig;

/// BLAKE3 hex digest of the canonical JSON form of an [`EngineConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigFingerprint(pub String);

impl ConfigFingerprint {
    pub fn of(config: &EngineConfig) -> Self {
        use serde_json::json;

        // Canonical serialization (sorted keys, timeframes in minutes)
        let canonical = json!({
            "confirmation": {
                "fast_period": config.confirmation.fast_period,
                "slow_period": config.confirmation.slow_period,
                "timeframe_minutes": config.confirmation.timeframe.minutes(),
            },
            "entry": {
                "fast_period": config.entry.fast_period,
                "slow_period": config.entry.slow_period,
                "timeframe_minutes": config.entry.timeframe.minutes(),
            },
            "max_hold_bars": config.max_hold_bars,
            "quantity": config.quantity,
            "stop_loss_pct": config.stop_loss_pct,
            "symbol": config.symbol,
            "take_profit_pct": config.take_profit_pct,
        });
        let hash_bytes = blake3::hash(canonical.to_string().as_bytes());
        Self(hash_bytes.to_hex().to_string())
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for ConfigFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_hex() {
        let a = ConfigFingerprint::of(&EngineConfig::default());
        let b = ConfigFingerprint::of(&EngineConfig::default());
        assert_eq!(a, b);
        assert_eq!(a.0.len(), 64);
        assert!(a.0.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a.short().len(), 12);
    }

    #[test]
    fn symbol_changes_fingerprint() {
        let mut config = EngineConfig::default();
        let before = ConfigFingerprint::of(&config);
        config.symbol = "ETHUSDT".into();
        assert_ne!(before, ConfigFingerprint::of(&config));
    }

    #[test]
    fn timeframe_changes_fingerprint() {
        let mut config = EngineConfig::default();
        let before = ConfigFingerprint::of(&config);
        config.confirmation.timeframe = crate::domain::Timeframe::H1;
        assert_ne!(before, ConfigFingerprint::of(&config));
    }
}
