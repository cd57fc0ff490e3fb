//! Environment-driven server configuration.

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use airsep_core::SeparationRules;

pub const DEFAULT_TELEMETRY_PORT: u16 = 7401;
pub const DEFAULT_CONSOLE_PORT: u16 = 7402;

#[derive(Debug, Clone)]
pub struct Config {
    /// Pilot-side listener port (`AIRSEP_TELEMETRY_PORT`).
    pub telemetry_port: u16,
    /// Console-side listener port (`AIRSEP_CONSOLE_PORT`).
    pub console_port: u16,
    /// Broadcast and assessment cadence (`AIRSEP_TICK_MS`).
    pub tick: Duration,
    /// Per-read deadline on every connection (`AIRSEP_READ_TIMEOUT_SECS`).
    pub read_timeout: Duration,
    /// Optional JSON file overriding the separation rules
    /// (`AIRSEP_RULES_FILE`).
    pub rules_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            telemetry_port: DEFAULT_TELEMETRY_PORT,
            console_port: DEFAULT_CONSOLE_PORT,
            tick: Duration::from_millis(1000),
            read_timeout: Duration::from_secs(10),
            rules_file: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            telemetry_port: env_parsed("AIRSEP_TELEMETRY_PORT", DEFAULT_TELEMETRY_PORT),
            console_port: env_parsed("AIRSEP_CONSOLE_PORT", DEFAULT_CONSOLE_PORT),
            tick: Duration::from_millis(env_parsed("AIRSEP_TICK_MS", 1000u64)),
            read_timeout: Duration::from_secs(env_parsed("AIRSEP_READ_TIMEOUT_SECS", 10u64)),
            rules_file: env::var("AIRSEP_RULES_FILE").ok().map(PathBuf::from),
        }
    }

    /// Separation rules for this run: the configured file if set,
    /// otherwise the operational defaults.
    pub fn load_rules(&self) -> anyhow::Result<SeparationRules> {
        let Some(path) = &self.rules_file else {
            return Ok(SeparationRules::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read rules file {}", path.display()))?;
        let rules = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse rules file {}", path.display()))?;
        Ok(rules)
    }
}

fn env_parsed<T>(key: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, %raw, %default, "ignoring unparseable environment value");
                default
            }
        },
        Err(_) => default,
    }
}
