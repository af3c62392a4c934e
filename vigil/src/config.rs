use rust_decimal::Decimal;
use serde::Deserialize;
use std::{env, fs, path::Path, str::FromStr};
use thiserror::Error;
use vigil_instrument::{Currency, account::AccountId};
use vigil_risk::fx::DEFAULT_FX_URL;

const DEFAULT_TWS_HOST: &str = "127.0.0.1";
const DEFAULT_TWS_PORT: u16 = 4001;
const DEFAULT_TWS_CLIENT_ID: i32 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error reading config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("error parsing config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Runtime configuration, file-backed with environment overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Accounts the report spans. Must be non-empty.
    pub accounts: Vec<AccountId>,

    #[serde(default = "default_base_currency")]
    pub base_currency: Currency,

    #[serde(default = "default_unprotected_loss_percentage")]
    pub unprotected_loss_percentage: Decimal,

    #[serde(default = "default_fx_url")]
    pub fx_url: String,

    pub backend: BackendConfig,
}

/// Which broker backend to wire; everything downstream of the gateway is identical.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    Rest {
        base_url: String,

        #[serde(default)]
        session_cookie: Option<String>,
    },
    Socket {
        #[serde(default = "default_tws_host")]
        host: String,

        #[serde(default = "default_tws_port")]
        port: u16,

        #[serde(default = "default_tws_client_id")]
        client_id: i32,
    },
}

impl Config {
    /// Load from a JSON file, then apply `VIGIL_*` environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config: Config = serde_json::from_str(&fs::read_to_string(path)?)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Environment overrides, applied on top of whatever the file provided.
    fn apply_env(&mut self) {
        if let Ok(accounts) = env::var("VIGIL_ACCOUNTS") {
            self.accounts = accounts
                .split(',')
                .map(str::trim)
                .filter(|account| !account.is_empty())
                .map(AccountId::new)
                .collect();
        }
        if let Ok(base_currency) = env::var("VIGIL_BASE_CURRENCY") {
            self.base_currency = Currency::new(base_currency);
        }
        if let Ok(percentage) = env::var("VIGIL_UNPROTECTED_LOSS_PCT")
            && let Ok(percentage) = Decimal::from_str(&percentage)
        {
            self.unprotected_loss_percentage = percentage;
        }
        if let Ok(fx_url) = env::var("VIGIL_FX_URL") {
            self.fx_url = fx_url;
        }

        if let BackendConfig::Rest {
            base_url,
            session_cookie,
        } = &mut self.backend
        {
            if let Ok(url) = env::var("VIGIL_REST_BASE_URL") {
                *base_url = url;
            }
            if let Ok(cookie) = env::var("VIGIL_SESSION_COOKIE") {
                *session_cookie = Some(cookie);
            }
        }

        if let BackendConfig::Socket {
            host,
            port,
            client_id,
        } = &mut self.backend
        {
            if let Ok(value) = env::var("VIGIL_TWS_HOST") {
                *host = value;
            }
            if let Ok(value) = env::var("VIGIL_TWS_PORT")
                && let Ok(value) = value.parse()
            {
                *port = value;
            }
            if let Ok(value) = env::var("VIGIL_TWS_CLIENT_ID")
                && let Ok(value) = value.parse()
            {
                *client_id = value;
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.accounts.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one account must be configured".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_base_currency() -> Currency {
    Currency::new("EUR")
}

fn default_unprotected_loss_percentage() -> Decimal {
    Decimal::from(50)
}

fn default_fx_url() -> String {
    DEFAULT_FX_URL.to_string()
}

fn default_tws_host() -> String {
    DEFAULT_TWS_HOST.to_string()
}

fn default_tws_port() -> u16 {
    DEFAULT_TWS_PORT
}

fn default_tws_client_id() -> i32 {
    DEFAULT_TWS_CLIENT_ID
}
