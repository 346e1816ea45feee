use std::fs;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core_types::{AccountId, Amount};
use crate::simulation::SimulationConfig;
use crate::transfer::engine::DEFAULT_LOCK_POLL_INTERVAL;
use crate::transfer::{BackoffKind, BackoffPolicy, EngineConfig};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// Per-transfer events (target `TRANSFER`); off keeps logs to phase summaries
    pub enable_tracing: bool,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Accounts opened before every simulation phase
    #[serde(default = "default_accounts")]
    pub accounts: Vec<AccountSeed>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AccountSeed {
    pub id: AccountId,
    pub owner: String,
    pub balance: Amount,
}

fn default_accounts() -> Vec<AccountSeed> {
    [
        (1, "Alice", 10_000),
        (2, "Bob", 5_000),
        (3, "Charlie", 8_000),
        (4, "David", 3_000),
    ]
    .into_iter()
    .map(|(id, owner, balance)| AccountSeed {
        id,
        owner: owner.to_string(),
        balance,
    })
    .collect()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EngineSettings {
    pub lock_poll_interval_ms: u64,
    pub backoff: BackoffSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            lock_poll_interval_ms: DEFAULT_LOCK_POLL_INTERVAL.as_millis() as u64,
            backoff: BackoffSettings::default(),
        }
    }
}

/// Try-lock retry budget. `max_retries: ~` retries until the deadline (or forever).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct BackoffSettings {
    pub kind: BackoffKind,
    pub initial_delay_us: u64,
    pub max_delay_us: u64,
    pub max_retries: Option<u32>,
    pub deadline_ms: Option<u64>,
    pub jitter: bool,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        let policy = BackoffPolicy::default();
        Self {
            kind: policy.kind,
            initial_delay_us: policy.initial_delay.as_micros() as u64,
            max_delay_us: policy.max_delay.as_micros() as u64,
            max_retries: policy.max_retries,
            deadline_ms: policy.deadline.map(|d| d.as_millis() as u64),
            jitter: policy.jitter,
        }
    }
}

impl BackoffSettings {
    pub fn to_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            kind: self.kind,
            initial_delay: Duration::from_micros(self.initial_delay_us),
            max_delay: Duration::from_micros(self.max_delay_us.max(self.initial_delay_us)),
            max_retries: self.max_retries,
            deadline: self.deadline_ms.map(Duration::from_millis),
            jitter: self.jitter,
        }
    }
}

impl EngineSettings {
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            backoff: self.backoff.to_policy(),
            lock_poll_interval: Duration::from_millis(self.lock_poll_interval_ms.max(1)),
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", config_path))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::StrategyMix;

    const MINIMAL: &str = r#"
log_level: info
log_dir: ./logs
log_file: ledger.log
use_json: false
rotation: daily
enable_tracing: false
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AppConfig::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.accounts.len(), 4);
        assert_eq!(config.accounts[0].owner, "Alice");
        assert_eq!(config.engine, EngineSettings::default());
        assert_eq!(config.engine.to_engine_config(), EngineConfig::default());
    }

    #[test]
    fn test_full_config() {
        let yaml = format!(
            "{MINIMAL}{}",
            r#"
engine:
  lock_poll_interval_ms: 5
  backoff:
    kind: fixed
    initial_delay_us: 10000
    max_delay_us: 10000
    max_retries: ~
    deadline_ms: 2000
    jitter: false
simulation:
  workers: 8
  transfers_per_worker: 50
  min_amount: 10
  max_amount: 109
  strategy: try_lock
  seed: 7
  queue_capacity: 16
accounts:
  - { id: 10, owner: Erin, balance: 100 }
"#
        );
        let config = AppConfig::from_yaml(&yaml).unwrap();

        let engine = config.engine.to_engine_config();
        assert_eq!(engine.lock_poll_interval, Duration::from_millis(5));
        assert_eq!(engine.backoff.kind, BackoffKind::Fixed);
        assert_eq!(engine.backoff.initial_delay, Duration::from_millis(10));
        assert_eq!(engine.backoff.max_retries, None);
        assert_eq!(engine.backoff.deadline, Some(Duration::from_secs(2)));
        assert!(!engine.backoff.jitter);

        assert_eq!(config.simulation.workers, 8);
        assert_eq!(config.simulation.strategy, StrategyMix::TryLock);
        assert_eq!(config.simulation.seed, 7);
        assert_eq!(
            config.accounts,
            vec![AccountSeed {
                id: 10,
                owner: "Erin".to_string(),
                balance: 100
            }]
        );
    }

    #[test]
    fn test_partial_engine_block() {
        let yaml = format!("{MINIMAL}engine:\n  backoff:\n    deadline_ms: 250\n");
        let engine = AppConfig::from_yaml(&yaml).unwrap().engine.to_engine_config();
        assert_eq!(engine.backoff.deadline, Some(Duration::from_millis(250)));
        assert_eq!(engine.backoff.max_retries, Some(1000));
        assert_eq!(engine.lock_poll_interval, DEFAULT_LOCK_POLL_INTERVAL);
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(AppConfig::from_yaml("log_level: [").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::load("does-not-exist").unwrap_err();
        assert!(err.to_string().contains("config/does-not-exist.yaml"));
    }
}
