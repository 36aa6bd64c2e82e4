// Adapted from https://dev.to/bdhobare/managing-application-config-in-rust-23ai
use chrono::NaiveTime;
use chrono_tz::Tz;
use std::{collections::HashMap, str::FromStr, time::Duration};
use thiserror::Error;
use url::Url;

const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Rome;
const DEFAULT_MESSAGE_DELAY_MS: u64 = 1000;
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 15;
const DEFAULT_PENDING_STALE_AFTER_SECS: u64 = 900;
const DEFAULT_PORT: u16 = 1312;

#[derive(Clone, Debug)]
pub struct Config {
    pub auth: String,
    pub database_url: Url,
    pub salon_location: String,
    pub salon_timezone: Tz,
    pub message_delay: Duration,
    pub provider_timeout: Duration,
    pub pending_stale_after: Duration,
    pub daily_run_at: Option<NaiveTime>,
    pub port: u16,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing {0}")]
    Missing(&'static str),

    #[error("unable to parse {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

pub trait ConfigProvider {
    fn get_config(&self) -> &Config;
}

pub struct EnvVarProvider(Config);

impl EnvVarProvider {
    pub fn new(args: HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = required(&args, "DATABASE_URL")?;

        let config = Config {
            auth: required(&args, "AUTH")?.to_string(),
            database_url: Url::parse(database_url).map_err(|e| ConfigError::Invalid {
                name: "DATABASE_URL",
                reason: e.to_string(),
            })?,
            salon_location: args.get("SALON_LOCATION").cloned().unwrap_or_default(),
            salon_timezone: optional(&args, "SALON_TIMEZONE")?.unwrap_or(DEFAULT_TIMEZONE),
            message_delay: Duration::from_millis(
                optional(&args, "MESSAGE_DELAY_MS")?.unwrap_or(DEFAULT_MESSAGE_DELAY_MS),
            ),
            provider_timeout: Duration::from_secs(
                optional(&args, "PROVIDER_TIMEOUT_SECS")?.unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECS),
            ),
            pending_stale_after: Duration::from_secs(
                optional(&args, "PENDING_STALE_AFTER_SECS")?
                    .unwrap_or(DEFAULT_PENDING_STALE_AFTER_SECS),
            ),
            daily_run_at: args
                .get("DAILY_RUN_AT")
                .map(|at| {
                    NaiveTime::parse_from_str(at, "%H:%M").map_err(|e| ConfigError::Invalid {
                        name: "DAILY_RUN_AT",
                        reason: e.to_string(),
                    })
                })
                .transpose()?,
            port: optional(&args, "PORT")?.unwrap_or(DEFAULT_PORT),
        };

        Ok(EnvVarProvider(config))
    }
}

impl ConfigProvider for EnvVarProvider {
    fn get_config(&self) -> &Config {
        &self.0
    }
}

fn required<'a>(
    args: &'a HashMap<String, String>,
    name: &'static str,
) -> Result<&'a str, ConfigError> {
    args.get(name)
        .map(String::as_str)
        .ok_or(ConfigError::Missing(name))
}

fn optional<T>(args: &HashMap<String, String>, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    args.get(name)
        .map(|value| {
            value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            })
        })
        .transpose()
}
