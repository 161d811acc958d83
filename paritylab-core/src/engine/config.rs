//! Engine configuration: read once at construction, immutable afterwards.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::domain::Timeframe;
use crate::fingerprint::ConfigFingerprint;
use crate::position_management::ExitRules;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{which} {line} period must be >= 1")]
    InvalidPeriod {
        which: &'static str,
        line: &'static str,
    },

    #[error("{which} fast period ({fast}) must be shorter than slow period ({slow})")]
    FastNotFasterThanSlow {
        which: &'static str,
        fast: usize,
        slow: usize,
    },

    #[error("{field} must be a fraction in (0, 1), got {value}")]
    InvalidFraction { field: &'static str, value: f64 },

    #[error("quantity must be finite and positive, got {0}")]
    InvalidQuantity(f64),

    #[error("confirmation timeframe {confirmation} must be a whole multiple (> 1) of entry timeframe {entry}")]
    IncompatibleTimeframes {
        entry: Timeframe,
        confirmation: Timeframe,
    },

    #[error("invalid value '{value}' for {key}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// EMA periods for one timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmaParams {
    pub timeframe: Timeframe,
    pub fast_period: usize,
    pub slow_period: usize,
}

impl EmaParams {
    fn validate(&self, which: &'static str) -> Result<(), ConfigError> {
        if self.fast_period == 0 {
            return Err(ConfigError::InvalidPeriod { which, line: "fast" });
        }
        if self.slow_period == 0 {
            return Err(ConfigError::InvalidPeriod { which, line: "slow" });
        }
        if self.fast_period >= self.slow_period {
            return Err(ConfigError::FastNotFasterThanSlow {
                which,
                fast: self.fast_period,
                slow: self.slow_period,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub symbol: String,
    /// Fixed size of every position.
    pub quantity: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub max_hold_bars: usize,
    pub entry: EmaParams,
    pub confirmation: EmaParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            quantity: 0.001,
            stop_loss_pct: 0.02,
            take_profit_pct: 0.04,
            max_hold_bars: 96,
            entry: EmaParams {
                timeframe: Timeframe::M5,
                fast_period: 8,
                slow_period: 21,
            },
            confirmation: EmaParams {
                timeframe: Timeframe::M15,
                fast_period: 50,
                slow_period: 200,
            },
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Apply overrides from an environment-style lookup, then re-validate.
    ///
    /// Keys: `SYMBOL`, `TRADE_QUANTITY`, `TIMEFRAME_ENTRY`, `TIMEFRAME_CONFIRMATION`,
    /// `EMA_FAST_ENTRY`, `EMA_SLOW_ENTRY`, `EMA_FAST_CONFIRMATION`,
    /// `EMA_SLOW_CONFIRMATION`, `POSITION_TIMEOUT_BARS`, `STOP_LOSS_PCT`,
    /// `TAKE_PROFIT_PCT`.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(
            key: &'static str,
            lookup: &dyn Fn(&str) -> Option<String>,
        ) -> Result<Option<T>, ConfigError> {
            match lookup(key) {
                None => Ok(None),
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map(Some)
                    .map_err(|_| ConfigError::InvalidEnv { key, value: raw }),
            }
        }

        let lookup: &dyn Fn(&str) -> Option<String> = &lookup;
        if let Some(symbol) = lookup("SYMBOL") {
            self.symbol = symbol.trim().to_string();
        }
        if let Some(v) = parsed("TRADE_QUANTITY", lookup)? {
            self.quantity = v;
        }
        if let Some(v) = parsed("TIMEFRAME_ENTRY", lookup)? {
            self.entry.timeframe = v;
        }
        if let Some(v) = parsed("TIMEFRAME_CONFIRMATION", lookup)? {
            self.confirmation.timeframe = v;
        }
        if let Some(v) = parsed("EMA_FAST_ENTRY", lookup)? {
            self.entry.fast_period = v;
        }
        if let Some(v) = parsed("EMA_SLOW_ENTRY", lookup)? {
            self.entry.slow_period = v;
        }
        if let Some(v) = parsed("EMA_FAST_CONFIRMATION", lookup)? {
            self.confirmation.fast_period = v;
        }
        if let Some(v) = parsed("EMA_SLOW_CONFIRMATION", lookup)? {
            self.confirmation.slow_period = v;
        }
        if let Some(v) = parsed("POSITION_TIMEOUT_BARS", lookup)? {
            self.max_hold_bars = v;
        }
        if let Some(v) = parsed("STOP_LOSS_PCT", lookup)? {
            self.stop_loss_pct = v;
        }
        if let Some(v) = parsed("TAKE_PROFIT_PCT", lookup)? {
            self.take_profit_pct = v;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.entry.validate("entry")?;
        self.confirmation.validate("confirmation")?;
        for (field, value) in [
            ("stop_loss_pct", self.stop_loss_pct),
            ("take_profit_pct", self.take_profit_pct),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(ConfigError::InvalidFraction { field, value });
            }
        }
        if !(self.quantity.is_finite() && self.quantity > 0.0) {
            return Err(ConfigError::InvalidQuantity(self.quantity));
        }
        match self.confirmation.timeframe.ratio_to(self.entry.timeframe) {
            Some(ratio) if ratio > 1 => Ok(()),
            _ => Err(ConfigError::IncompatibleTimeframes {
                entry: self.entry.timeframe,
                confirmation: self.confirmation.timeframe,
            }),
        }
    }

    pub fn exit_rules(&self) -> ExitRules {
        ExitRules {
            stop_loss_pct: self.stop_loss_pct,
            take_profit_pct: self.take_profit_pct,
            max_hold_bars: self.max_hold_bars,
        }
    }

    /// Entry bars per confirmation bar.
    pub fn bars_per_confirmation(&self) -> u32 {
        self.confirmation
            .timeframe
            .ratio_to(self.entry.timeframe)
            .unwrap_or(1)
    }

    pub fn fingerprint(&self) -> ConfigFingerprint {
        ConfigFingerprint::of(self)
    }
}
