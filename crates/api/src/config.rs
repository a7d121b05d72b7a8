//! Application configuration loaded from environment variables.

use std::str::FromStr;

use application::{MandrillConfig, StripeConfig};
use domain::{Country, Money};
use thiserror::Error;

/// Invalid configuration value.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Log output format selected with `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {other:?}")),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `pretty` or `json` (default `pretty`)
/// - `APP_ENV`: deployment name, logged at startup (default `development`)
/// - `FRONT_URL`: storefront origin used for checkout redirects
/// - `DATABASE_URL`: PostgreSQL connection string; unset selects the in-memory store
/// - `STRIPE_API_KEY`, `STRIPE_API_BASE`, `STRIPE_WEBHOOK_SECRET`,
///   `STRIPE_WEBHOOK_PATH`, `STRIPE_WEBHOOK_TOLERANCE_SECS`
/// - `SERVICE_FEE_CENTS`
/// - `EMAIL_API_KEY`, `EMAIL_API_BASE`, `EMAIL_FROM`
/// - `SERVICED_DESTINATIONS`: comma-separated country codes; empty serves every destination
/// - `SHIPMENT_BASE_CENTS`, `SHIPMENT_PER_KG_CENTS`, `SHIPMENT_MAX_WEIGHT_GRAMS`
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub app_env: String,
    pub front_url: String,
    pub database_url: Option<String>,
    pub stripe_api_key: Option<String>,
    pub stripe_api_base: String,
    pub stripe_webhook_secret: Option<String>,
    pub stripe_webhook_path: String,
    pub stripe_webhook_tolerance_secs: i64,
    pub service_fee_cents: i64,
    pub email_api_key: Option<String>,
    pub email_api_base: String,
    pub email_from: String,
    pub serviced_destinations: Vec<Country>,
    pub shipment_base_cents: i64,
    pub shipment_per_kg_cents: i64,
    pub shipment_max_weight_grams: u64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: parse(&get, "PORT", defaults.port)?,
            log_level: get("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: parse(&get, "LOG_FORMAT", defaults.log_format)?,
            app_env: get("APP_ENV").unwrap_or(defaults.app_env),
            front_url: get("FRONT_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.front_url),
            database_url: get("DATABASE_URL"),
            stripe_api_key: get("STRIPE_API_KEY"),
            stripe_api_base: get("STRIPE_API_BASE").unwrap_or(defaults.stripe_api_base),
            stripe_webhook_secret: get("STRIPE_WEBHOOK_SECRET"),
            stripe_webhook_path: get("STRIPE_WEBHOOK_PATH")
                .map(|path| normalize_path(&path))
                .unwrap_or(defaults.stripe_webhook_path),
            stripe_webhook_tolerance_secs: parse(
                &get,
                "STRIPE_WEBHOOK_TOLERANCE_SECS",
                defaults.stripe_webhook_tolerance_secs,
            )?,
            service_fee_cents: parse(&get, "SERVICE_FEE_CENTS", defaults.service_fee_cents)?,
            email_api_key: get("EMAIL_API_KEY"),
            email_api_base: get("EMAIL_API_BASE").unwrap_or(defaults.email_api_base),
            email_from: get("EMAIL_FROM").unwrap_or(defaults.email_from),
            serviced_destinations: match get("SERVICED_DESTINATIONS") {
                Some(value) => parse_countries(&value)?,
                None => defaults.serviced_destinations,
            },
            shipment_base_cents: parse(&get, "SHIPMENT_BASE_CENTS", defaults.shipment_base_cents)?,
            shipment_per_kg_cents: parse(
                &get,
                "SHIPMENT_PER_KG_CENTS",
                defaults.shipment_per_kg_cents,
            )?,
            shipment_max_weight_grams: parse(
                &get,
                "SHIPMENT_MAX_WEIGHT_GRAMS",
                defaults.shipment_max_weight_grams,
            )?,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn service_fee(&self) -> Money {
        Money::from_cents(self.service_fee_cents)
    }

    pub fn webhook_tolerance(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.stripe_webhook_tolerance_secs)
    }

    /// Stripe client settings, or `None` when no API key is configured.
    pub fn stripe(&self) -> Option<StripeConfig> {
        self.stripe_api_key.as_ref().map(|api_key| StripeConfig {
            api_key: api_key.clone(),
            api_base: self.stripe_api_base.clone(),
            success_url: format!("{}/order/thank-you", self.front_url),
            cancel_url: format!("{}/order/error", self.front_url),
            ..StripeConfig::default()
        })
    }

    /// Mail relay settings, or `None` when no API key is configured.
    pub fn mandrill(&self) -> Option<MandrillConfig> {
        self.email_api_key.as_ref().map(|api_key| MandrillConfig {
            api_key: api_key.clone(),
            api_base: self.email_api_base.clone(),
            default_from: self.email_from.clone(),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            app_env: "development".to_string(),
            front_url: "http://localhost:8080".to_string(),
            database_url: None,
            stripe_api_key: None,
            stripe_api_base: StripeConfig::default().api_base,
            stripe_webhook_secret: None,
            stripe_webhook_path: "/stripe/webhook".to_string(),
            stripe_webhook_tolerance_secs: 300,
            service_fee_cents: 1000,
            email_api_key: None,
            email_api_base: MandrillConfig::default().api_base,
            email_from: "orders@localhost".to_string(),
            serviced_destinations: Vec::new(),
            shipment_base_cents: 500,
            shipment_per_kg_cents: 250,
            shipment_max_weight_grams: 30_000,
        }
    }
}

fn parse<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

fn parse_countries(value: &str) -> Result<Vec<Country>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(|code| {
            Country::new(code).map_err(|e| ConfigError::Invalid {
                key: "SERVICED_DESTINATIONS",
                value: value.to_string(),
                reason: e.message,
            })
        })
        .collect()
}

fn normalize_path(path: &str) -> String {
    format!("/{}", path.trim().trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.stripe_webhook_path, "/stripe/webhook");
        assert!(config.database_url.is_none());
        assert!(config.stripe().is_none());
        assert!(config.mandrill().is_none());
        assert!(config.serviced_destinations.is_empty());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = from_pairs(&[
            ("PORT", "8081"),
            ("LOG_FORMAT", "JSON"),
            ("SERVICE_FEE_CENTS", "1500"),
            ("SERVICED_DESTINATIONS", "gb, de ,"),
            ("STRIPE_WEBHOOK_PATH", "hooks/stripe"),
            ("SHIPMENT_MAX_WEIGHT_GRAMS", "5000"),
        ])
        .unwrap();

        assert_eq!(config.port, 8081);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.service_fee(), Money::from_cents(1500));
        assert_eq!(
            config.serviced_destinations,
            vec![Country::new("GB").unwrap(), Country::new("DE").unwrap()]
        );
        assert_eq!(config.stripe_webhook_path, "/hooks/stripe");
        assert_eq!(config.shipment_max_weight_grams, 5000);
    }

    #[test]
    fn test_empty_values_count_as_unset() {
        let config = from_pairs(&[("DATABASE_URL", ""), ("STRIPE_API_KEY", "  ")]).unwrap();
        assert!(config.database_url.is_none());
        assert!(config.stripe_api_key.is_none());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = from_pairs(&[("PORT", "http")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));

        assert!(from_pairs(&[("LOG_FORMAT", "xml")]).is_err());
        assert!(from_pairs(&[("SERVICED_DESTINATIONS", "GB,Britain")]).is_err());
    }

    #[test]
    fn test_checkout_urls_derive_from_front_url() {
        let config = from_pairs(&[
            ("FRONT_URL", "https://shop.example.com/"),
            ("STRIPE_API_KEY", "sk_test_1"),
        ])
        .unwrap();

        let stripe = config.stripe().unwrap();
        assert_eq!(stripe.api_key, "sk_test_1");
        assert_eq!(stripe.success_url, "https://shop.example.com/order/thank-you");
        assert_eq!(stripe.cancel_url, "https://shop.example.com/order/error");
    }
}
