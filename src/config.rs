use std::{env, net::SocketAddr, time::Duration};

use thiserror::Error;

use crate::{
    clients::{
        building_registry::DEFAULT_BUILDING_REGISTRY_URL,
        land_registry::{DEFAULT_LAND_REGISTRY_URL, DEFAULT_VWORLD_DOMAIN},
    },
    scheduler::{
        gate::DEFAULT_SAMPLE_SIZE,
        ledger::{DEFAULT_MAX_RETRY_ATTEMPTS, DEFAULT_RETRY_RESET_DAYS},
    },
};

#[cfg(test)]
use once_cell::sync::Lazy;
#[cfg(test)]
pub(crate) static ENV_MUTEX: Lazy<std::sync::Mutex<()>> = Lazy::new(|| std::sync::Mutex::new(()));

const DEFAULT_AIRTABLE_API_URL: &str = "https://api.airtable.com";

/// Outbound mail relay settings; absent when notifications only go to the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailSettings {
    pub relay_url: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    http_bind: SocketAddr,
    airtable_api_url: String,
    airtable_base_id: String,
    airtable_access_token: String,
    building_table: String,
    building_view: String,
    land_table: String,
    land_view: String,
    public_api_key: String,
    vworld_api_key: String,
    vworld_domain: String,
    code_resolver_url: String,
    building_registry_url: String,
    land_registry_url: String,
    registry_timeout: Duration,
    max_retry_attempts: u32,
    retry_reset_days: u32,
    pacing: Duration,
    schedule_interval: Duration,
    gate_sample_size: usize,
    building_no_data_permanent: bool,
    mail: Option<MailSettings>,
    service_admin_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Config {
    /// Reads and validates the service configuration from the environment.
    ///
    /// # Errors
    /// [`ConfigError::Missing`] when a required variable is unset,
    /// [`ConfigError::Invalid`] when a value does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_bind = parse_socket_addr("BUILDING_SERVICE_BIND", "0.0.0.0:3000")?;

        let airtable_api_url = env_or("AIRTABLE_API_URL", DEFAULT_AIRTABLE_API_URL);
        let airtable_base_id = env_var("AIRTABLE_BASE_ID")?;
        // personal access tokens replaced API keys; accept either
        let airtable_access_token = env_var("AIRTABLE_ACCESS_TOKEN")
            .or_else(|_| env_var("AIRTABLE_API_KEY"))
            .map_err(|_| ConfigError::Missing("AIRTABLE_ACCESS_TOKEN"))?;
        let building_table = env_var("AIRTABLE_BUILDING_TABLE")?;
        let building_view = env_var("AIRTABLE_BUILDING_VIEW")?;
        let land_table = env_var("AIRTABLE_LAND_TABLE")?;
        let land_view = env_var("AIRTABLE_LAND_VIEW")?;

        let public_api_key = env_var("PUBLIC_API_KEY")?;
        let vworld_api_key = env_var("VWORLD_APIKEY")?;
        let vworld_domain = env_or("VWORLD_DOMAIN", DEFAULT_VWORLD_DOMAIN);
        let code_resolver_url = env_var("GOOGLE_SCRIPT_URL")?;
        let building_registry_url = env_or("BUILDING_REGISTRY_URL", DEFAULT_BUILDING_REGISTRY_URL);
        let land_registry_url = env_or("LAND_REGISTRY_URL", DEFAULT_LAND_REGISTRY_URL);
        let registry_timeout = parse_duration_secs("REGISTRY_TIMEOUT_SECS", 30)?;

        // Retry and scheduling
        let max_retry_attempts = parse_positive_u32("MAX_RETRY_ATTEMPTS", DEFAULT_MAX_RETRY_ATTEMPTS)?;
        let retry_reset_days = parse_u32("RETRY_RESET_DAYS", DEFAULT_RETRY_RESET_DAYS)?;
        let pacing = parse_duration_ms("PACING_MS", 1000)?;
        let schedule_interval = parse_duration_secs("SCHEDULE_INTERVAL_SECS", 60)?;
        if schedule_interval.is_zero() {
            return Err(ConfigError::Invalid {
                name: "SCHEDULE_INTERVAL_SECS",
                source: anyhow::anyhow!("must be greater than zero"),
            });
        }
        let gate_sample_size = parse_usize("GATE_SAMPLE_SIZE", DEFAULT_SAMPLE_SIZE)?;
        let building_no_data_permanent = parse_bool("BUILDING_NO_DATA_PERMANENT", false)?;

        let mail = match env::var("MAIL_RELAY_URL").ok().filter(|url| !url.trim().is_empty()) {
            Some(relay_url) => {
                let from = env_var("EMAIL_ADDRESS")?;
                let to = env_or("NOTIFICATION_EMAIL_TO", &from);
                Some(MailSettings { relay_url, from, to })
            }
            None => None,
        };
        let service_admin_url = env::var("SERVICE_ADMIN_URL").ok();

        Ok(Self {
            http_bind,
            airtable_api_url,
            airtable_base_id,
            airtable_access_token,
            building_table,
            building_view,
            land_table,
            land_view,
            public_api_key,
            vworld_api_key,
            vworld_domain,
            code_resolver_url,
            building_registry_url,
            land_registry_url,
            registry_timeout,
            max_retry_attempts,
            retry_reset_days,
            pacing,
            schedule_interval,
            gate_sample_size,
            building_no_data_permanent,
            mail,
            service_admin_url,
        })
    }

    #[must_use]
    pub fn http_bind(&self) -> SocketAddr {
        self.http_bind
    }

    #[must_use]
    pub fn airtable_api_url(&self) -> &str {
        &self.airtable_api_url
    }

    #[must_use]
    pub fn airtable_base_id(&self) -> &str {
        &self.airtable_base_id
    }

    #[must_use]
    pub fn airtable_access_token(&self) -> &str {
        &self.airtable_access_token
    }

    #[must_use]
    pub fn building_table(&self) -> &str {
        &self.building_table
    }

    #[must_use]
    pub fn building_view(&self) -> &str {
        &self.building_view
    }

    #[must_use]
    pub fn land_table(&self) -> &str {
        &self.land_table
    }

    #[must_use]
    pub fn land_view(&self) -> &str {
        &self.land_view
    }

    #[must_use]
    pub fn public_api_key(&self) -> &str {
        &self.public_api_key
    }

    #[must_use]
    pub fn vworld_api_key(&self) -> &str {
        &self.vworld_api_key
    }

    #[must_use]
    pub fn vworld_domain(&self) -> &str {
        &self.vworld_domain
    }

    #[must_use]
    pub fn code_resolver_url(&self) -> &str {
        &self.code_resolver_url
    }

    #[must_use]
    pub fn building_registry_url(&self) -> &str {
        &self.building_registry_url
    }

    #[must_use]
    pub fn land_registry_url(&self) -> &str {
        &self.land_registry_url
    }

    #[must_use]
    pub fn registry_timeout(&self) -> Duration {
        self.registry_timeout
    }

    #[must_use]
    pub fn max_retry_attempts(&self) -> u32 {
        self.max_retry_attempts
    }

    #[must_use]
    pub fn retry_reset_days(&self) -> u32 {
        self.retry_reset_days
    }

    #[must_use]
    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    #[must_use]
    pub fn schedule_interval(&self) -> Duration {
        self.schedule_interval
    }

    #[must_use]
    pub fn gate_sample_size(&self) -> usize {
        self.gate_sample_size
    }

    #[must_use]
    pub fn building_no_data_permanent(&self) -> bool {
        self.building_no_data_permanent
    }

    #[must_use]
    pub fn mail(&self) -> Option<&MailSettings> {
        self.mail.as_ref()
    }

    #[must_use]
    pub fn service_admin_url(&self) -> Option<&str> {
        self.service_admin_url.as_deref()
    }
}

fn env_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn env_or(name: &'static str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_socket_addr(name: &'static str, default: &str) -> Result<SocketAddr, ConfigError> {
    let raw = env_or(name, default);

    raw.parse().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_duration_secs(name: &'static str, default_secs: u64) -> Result<Duration, ConfigError> {
    let value = parse_u64(name, default_secs)?;
    Ok(Duration::from_secs(value))
}

fn parse_duration_ms(name: &'static str, default_ms: u64) -> Result<Duration, ConfigError> {
    let value = parse_u64(name, default_ms)?;
    Ok(Duration::from_millis(value))
}

fn parse_usize(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    let raw = env_or(name, &default.to_string());
    raw.parse::<usize>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_u32(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    let raw = env_or(name, &default.to_string());
    raw.parse::<u32>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_positive_u32(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    let parsed = parse_u32(name, default)?;
    if parsed == 0 {
        return Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("must be greater than zero"),
        });
    }
    Ok(parsed)
}

fn parse_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    let raw = env_or(name, &default.to_string());
    raw.parse::<u64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    let raw = env_or(name, &default.to_string());
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("invalid boolean value: {raw}"),
        }),
    }
}
