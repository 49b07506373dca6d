//! Pool configuration
//!
//! Window lengths, incentive rates and collaborator requirements. Loaded from
//! TOML with environment overrides, and validated once before an engine is
//! built: an engine never runs with a config that failed [`EngineConfig::validate`].

use crate::pool::metric::SamplingPlan;
use crate::pool::types::{AccountId, CycleId, UnixSecs};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Hard ceiling on `bounty_bps + fee_bps`.
pub const MAX_INCENTIVE_BPS: u16 = 500;

// =============================================================================
// ENGINE CONFIG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds from round start during which stakes may be added or retracted.
    #[serde(default = "default_staking_window_secs")]
    pub staking_window_secs: u64,

    /// Seconds of measurement after staking closes.
    #[serde(default = "default_prediction_window_secs")]
    pub prediction_window_secs: u64,

    /// Sampling step; must divide the prediction window into at least 2 steps.
    #[serde(default = "default_sampling_step_secs")]
    pub sampling_step_secs: u64,

    /// Mandatory wait after the window ends before settlement is allowed.
    #[serde(default = "default_finality_delay_secs")]
    pub finality_delay_secs: u64,

    /// Once this long past finality, settlement voids the round instead.
    #[serde(default = "default_resolve_deadline_secs")]
    pub resolve_deadline_secs: u64,

    /// Keeper bounty paid to the settling caller.
    #[serde(default = "default_bounty_bps")]
    pub bounty_bps: u16,

    /// Protocol fee; only charged when `fee_recipient` is set.
    #[serde(default = "default_fee_bps")]
    pub fee_bps: u16,

    #[serde(default)]
    pub fee_recipient: Option<String>,

    /// Account holding staked value on the ledger.
    #[serde(default = "default_custody_account")]
    pub custody_account: String,

    /// Observations the metric source must retain.
    #[serde(default = "default_min_history_depth")]
    pub min_history_depth: u32,

    /// Default lookback for the claimable-rounds scan.
    #[serde(default = "default_claim_lookback_cycles")]
    pub claim_lookback_cycles: u64,
}

fn default_staking_window_secs() -> u64 {
    300
}
fn default_prediction_window_secs() -> u64 {
    900
}
fn default_sampling_step_secs() -> u64 {
    60
}
fn default_finality_delay_secs() -> u64 {
    30
}
fn default_resolve_deadline_secs() -> u64 {
    3_600
}
fn default_bounty_bps() -> u16 {
    10
}
fn default_fee_bps() -> u16 {
    20
}
fn default_custody_account() -> String {
    "pool-custody".to_string()
}
fn default_min_history_depth() -> u32 {
    64
}
fn default_claim_lookback_cycles() -> u64 {
    96
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            staking_window_secs: default_staking_window_secs(),
            prediction_window_secs: default_prediction_window_secs(),
            sampling_step_secs: default_sampling_step_secs(),
            finality_delay_secs: default_finality_delay_secs(),
            resolve_deadline_secs: default_resolve_deadline_secs(),
            bounty_bps: default_bounty_bps(),
            fee_bps: default_fee_bps(),
            fee_recipient: None,
            custody_account: default_custody_account(),
            min_history_depth: default_min_history_depth(),
            claim_lookback_cycles: default_claim_lookback_cycles(),
        }
    }
}

impl EngineConfig {
    /// Load from TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// Load from `VOLDUEL_CONFIG` (or `volduel.toml`), then apply `VOLDUEL_*`
    /// environment overrides.
    pub fn from_env() -> Self {
        let path = std::env::var("VOLDUEL_CONFIG").unwrap_or_else(|_| "volduel.toml".to_string());

        let mut config = Self::load(&path).unwrap_or_else(|e| {
            tracing::debug!("Using default engine config ({}): {}", path, e);
            Self::default()
        });
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        fn parsed<T: std::str::FromStr>(var: &str) -> Option<T> {
            std::env::var(var).ok().and_then(|v| v.trim().parse().ok())
        }

        if let Some(v) = parsed("VOLDUEL_STAKING_WINDOW_SECS") {
            self.staking_window_secs = v;
        }
        if let Some(v) = parsed("VOLDUEL_PREDICTION_WINDOW_SECS") {
            self.prediction_window_secs = v;
        }
        if let Some(v) = parsed("VOLDUEL_SAMPLING_STEP_SECS") {
            self.sampling_step_secs = v;
        }
        if let Some(v) = parsed("VOLDUEL_FINALITY_DELAY_SECS") {
            self.finality_delay_secs = v;
        }
        if let Some(v) = parsed("VOLDUEL_RESOLVE_DEADLINE_SECS") {
            self.resolve_deadline_secs = v;
        }
        if let Some(v) = parsed("VOLDUEL_BOUNTY_BPS") {
            self.bounty_bps = v;
        }
        if let Some(v) = parsed("VOLDUEL_FEE_BPS") {
            self.fee_bps = v;
        }
        if let Ok(v) = std::env::var("VOLDUEL_FEE_RECIPIENT") {
            let v = v.trim();
            self.fee_recipient = (!v.is_empty()).then(|| v.to_string());
        }
        if let Some(v) = parsed("VOLDUEL_MIN_HISTORY_DEPTH") {
            self.min_history_depth = v;
        }
    }

    /// Save to TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn cycle_duration_secs(&self) -> u64 {
        self.staking_window_secs + self.prediction_window_secs
    }

    /// Ordinal of the cycle containing `now`.
    pub fn cycle_at(&self, now: UnixSecs) -> CycleId {
        now / self.cycle_duration_secs().max(1)
    }

    pub fn sampling_plan(&self) -> Option<SamplingPlan> {
        SamplingPlan::new(self.prediction_window_secs, self.sampling_step_secs)
    }

    pub fn custody(&self) -> AccountId {
        AccountId::new(&self.custody_account)
    }

    pub fn fee_recipient(&self) -> Option<AccountId> {
        self.fee_recipient
            .as_deref()
            .map(AccountId::new)
            .filter(|a| !a.is_empty())
    }

    /// Collect every violation rather than stopping at the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut violations = Vec::new();

        for (field, value) in [
            ("staking_window_secs", self.staking_window_secs),
            ("prediction_window_secs", self.prediction_window_secs),
            ("sampling_step_secs", self.sampling_step_secs),
        ] {
            if value == 0 {
                violations.push(ConfigViolation::new(
                    field,
                    "Must be greater than zero",
                    "Set a positive number of seconds",
                ));
            }
        }

        let plan = self.sampling_plan();
        if self.sampling_step_secs > 0 && plan.is_none() {
            violations.push(ConfigViolation::new(
                "sampling_step_secs",
                format!(
                    "Step {}s does not split the {}s prediction window into at least 2 equal steps",
                    self.sampling_step_secs, self.prediction_window_secs
                ),
                "Choose a step that divides prediction_window_secs at least twice",
            ));
        }

        let incentives = u32::from(self.bounty_bps) + u32::from(self.fee_bps);
        if incentives > u32::from(MAX_INCENTIVE_BPS) {
            violations.push(ConfigViolation::new(
                "bounty_bps + fee_bps",
                format!("Incentives total {} bps", incentives),
                format!("Keep the sum at or below {} bps", MAX_INCENTIVE_BPS),
            ));
        }

        if let Some(plan) = plan {
            let needed = plan.points() as u64;
            if u64::from(self.min_history_depth) < needed {
                violations.push(ConfigViolation::new(
                    "min_history_depth",
                    format!(
                        "History depth {} cannot cover {} sampling points",
                        self.min_history_depth, needed
                    ),
                    format!("Set min_history_depth to at least {}", needed),
                ));
            }
        }

        let custody = self.custody();
        if custody.is_empty() {
            violations.push(ConfigViolation::new(
                "custody_account",
                "Custody account is empty",
                "Name the ledger account that holds staked value",
            ));
        } else if self.fee_recipient().as_ref() == Some(&custody) {
            violations.push(ConfigViolation::new(
                "fee_recipient",
                "Fee recipient is the custody account",
                "Send fees to a separate account or leave fee_recipient unset",
            ));
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(violations))
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigViolation {
    pub field: String,
    pub description: String,
    pub suggestion: String,
}

impl ConfigViolation {
    pub(crate) fn new(
        field: impl Into<String>,
        description: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            description: description.into(),
            suggestion: suggestion.into(),
        }
    }
}

impl fmt::Display for ConfigViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (suggestion: {})",
            self.field, self.description, self.suggestion
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Invalid(Vec<ConfigViolation>),
    Io { path: String, message: String },
    Parse { message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(violations) => {
                write!(f, "Invalid engine config ({} violations)", violations.len())?;
                for v in violations {
                    write!(f, "\n  - {}", v)?;
                }
                Ok(())
            }
            Self::Io { path, message } => write!(f, "Cannot read config {}: {}", path, message),
            Self::Parse { message } => write!(f, "Cannot parse config: {}", message),
        }
    }
}

impl std::error::Error for ConfigError {}
