use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

use crate::error::LedgerError;
use crate::ledger::LedgerOptions;

/// Optional config file, resolved by the `config` crate (`consent-ledger.toml` etc).
const CONFIG_FILE: &str = "consent-ledger";
const ENV_PREFIX: &str = "CONSENT_LEDGER";
/// Legacy switch from the first ledger server.
const LEGACY_INSECURE_VAR: &str = "INSECURE_LEDGER";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub ledger_path: String,
    pub server_host: String,
    pub server_port: u16,
    pub insecure: bool,
    pub hardened: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ledger_path: "data/ledger.json".to_string(),
            server_host: "127.0.0.1".to_string(),
            server_port: 3030,
            insecure: false,
            hardened: false,
        }
    }
}

impl AppConfig {
    /// Defaults, then `consent-ledger.{toml,yaml,json}` if present, then
    /// `CONSENT_LEDGER_*` environment variables.
    pub fn load() -> Result<Self, LedgerError> {
        let defaults = Self::default();

        let settings = Config::builder()
            .set_default("ledger_path", defaults.ledger_path)?
            .set_default("server_host", defaults.server_host)?
            .set_default("server_port", i64::from(defaults.server_port))?
            .set_default("insecure", defaults.insecure)?
            .set_default("hardened", defaults.hardened)?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let mut config: AppConfig = settings.try_deserialize()?;

        if env::var(LEGACY_INSECURE_VAR).map_or(false, |v| v == "1") {
            config.insecure = true;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.ledger_path.trim().is_empty() {
            return Err(LedgerError::Config("ledger_path must not be empty".to_string()));
        }

        if self.server_port == 0 {
            return Err(LedgerError::Config("server_port must not be 0".to_string()));
        }

        if self.insecure && self.hardened {
            return Err(LedgerError::Config(
                "insecure mode cannot be enabled on a hardened deployment".to_string(),
            ));
        }

        Ok(())
    }

    pub fn ledger_options(&self) -> LedgerOptions {
        LedgerOptions {
            insecure: self.insecure,
            hardened: self.hardened,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
