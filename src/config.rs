use std::{env, fmt::Display, str::FromStr};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in environment")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct MessagingConfig {
    pub whatsapp_api_url: Option<String>,
    pub whatsapp_api_token: Option<String>,
    pub email_api_url: Option<String>,
    pub email_api_key: Option<String>,
    pub email_from: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub cron_secret: Option<String>,
    pub default_utc_offset_minutes: i32,
    pub analytics_cache_ttl_secs: u64,
    pub messaging: MessagingConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: var_or("HOST", "127.0.0.1"),
            port: parse_or("PORT", "8080")?,
            database_url: optional("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            cron_secret: optional("CRON_SECRET"),
            default_utc_offset_minutes: parse_or("DEFAULT_UTC_OFFSET_MINUTES", "-360")?,
            analytics_cache_ttl_secs: parse_or("ANALYTICS_CACHE_TTL_SECS", "60")?,
            messaging: MessagingConfig {
                whatsapp_api_url: optional("WHATSAPP_API_URL"),
                whatsapp_api_token: optional("WHATSAPP_API_TOKEN"),
                email_api_url: optional("EMAIL_API_URL"),
                email_api_key: optional("EMAIL_API_KEY"),
                email_from: var_or("EMAIL_FROM", "HappyMeter <reportes@happymeter.app>"),
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn var_or(key: &str, default: &str) -> String {
    optional(key).unwrap_or_else(|| {
        log::debug!("{key} not set, using default: {default}");
        default.to_string()
    })
}

fn parse_or<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    var_or(key, default)
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_uses_default_when_unset() {
        let value: u16 = parse_or("HAPPYMETER_TEST_UNSET_PORT", "8080").unwrap();
        assert_eq!(value, 8080);
    }

    #[test]
    fn parse_or_reports_invalid_values() {
        let err = parse_or::<u16>("HAPPYMETER_TEST_UNSET_PORT", "not-a-port").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { key: "HAPPYMETER_TEST_UNSET_PORT", .. }
        ));
    }
}
