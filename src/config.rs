use crate::application::wallet_ledger::DEFAULT_INITIAL_BALANCE;
use crate::domain::money::Currency;
use crate::infrastructure::http_gateway::HttpGatewayConfig;
use crate::resilience::BreakerConfig;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be set")]
    Missing { var: &'static str },
    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime configuration parsed from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub breaker: BreakerConfig,
    pub wallet_initial_balance: Decimal,
    pub wallet_currency: Currency,
    pub store_timeout: Duration,
    pub gateway_timeout: Duration,
    pub gateway_base_url: Option<String>,
    pub gateway_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            breaker: BreakerConfig::default(),
            wallet_initial_balance: DEFAULT_INITIAL_BALANCE,
            wallet_currency: Currency::default(),
            store_timeout: Duration::from_millis(5_000),
            gateway_timeout: Duration::from_millis(30_000),
            gateway_base_url: None,
            gateway_api_key: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds a config from an arbitrary variable source, falling back to the
    /// defaults for anything unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |var: &'static str| lookup(var).filter(|v| !v.trim().is_empty());

        let breaker = BreakerConfig {
            failure_threshold: parse(&get, "BREAKER_FAILURE_THRESHOLD")?
                .unwrap_or(defaults.breaker.failure_threshold),
            success_threshold: parse(&get, "BREAKER_SUCCESS_THRESHOLD")?
                .unwrap_or(defaults.breaker.success_threshold),
            reset_timeout: parse(&get, "BREAKER_RESET_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.breaker.reset_timeout),
            half_open_max_calls: parse(&get, "BREAKER_HALF_OPEN_MAX_CALLS")?
                .unwrap_or(defaults.breaker.half_open_max_calls),
        };
        for (var, value) in [
            ("BREAKER_FAILURE_THRESHOLD", breaker.failure_threshold),
            ("BREAKER_SUCCESS_THRESHOLD", breaker.success_threshold),
            ("BREAKER_HALF_OPEN_MAX_CALLS", breaker.half_open_max_calls),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    var,
                    value: value.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        let wallet_initial_balance: Decimal = parse(&get, "WALLET_INITIAL_BALANCE")?
            .unwrap_or(defaults.wallet_initial_balance);
        if wallet_initial_balance.is_sign_negative() {
            return Err(ConfigError::Invalid {
                var: "WALLET_INITIAL_BALANCE",
                value: wallet_initial_balance.to_string(),
                reason: "must not be negative".to_string(),
            });
        }

        let wallet_currency = match get("WALLET_CURRENCY") {
            Some(code) => Currency::new(&code).map_err(|e| ConfigError::Invalid {
                var: "WALLET_CURRENCY",
                value: code.clone(),
                reason: e.to_string(),
            })?,
            None => defaults.wallet_currency,
        };

        Ok(Self {
            breaker,
            wallet_initial_balance,
            wallet_currency,
            store_timeout: parse(&get, "STORE_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.store_timeout),
            gateway_timeout: parse(&get, "GATEWAY_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.gateway_timeout),
            gateway_base_url: get("GATEWAY_BASE_URL"),
            gateway_api_key: get("GATEWAY_API_KEY"),
        })
    }

    /// Settings for the HTTP gateway; both the URL and the key are required.
    pub fn http_gateway(&self) -> Result<HttpGatewayConfig, ConfigError> {
        let base_url = self.gateway_base_url.clone().ok_or(ConfigError::Missing {
            var: "GATEWAY_BASE_URL",
        })?;
        let api_key = self.gateway_api_key.clone().ok_or(ConfigError::Missing {
            var: "GATEWAY_API_KEY",
        })?;
        Ok(HttpGatewayConfig {
            base_url,
            api_key,
            timeout: self.gateway_timeout,
        })
    }
}

fn parse<T, G>(get: &G, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&'static str) -> Option<String>,
{
    get(var)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                var,
                value: raw.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| vars.get(k).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.breaker, BreakerConfig::default());
        assert_eq!(config.wallet_initial_balance, dec!(1000));
        assert_eq!(config.wallet_currency.as_str(), "USD");
        assert_eq!(config.store_timeout, Duration::from_secs(5));
        assert_eq!(config.gateway_timeout, Duration::from_secs(30));
        assert!(config.http_gateway().is_err());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("BREAKER_FAILURE_THRESHOLD", "5"),
            ("BREAKER_RESET_TIMEOUT_SECS", "10"),
            ("WALLET_INITIAL_BALANCE", "250.50"),
            ("WALLET_CURRENCY", "eur"),
            ("GATEWAY_BASE_URL", "http://localhost:8080"),
            ("GATEWAY_API_KEY", "secret"),
        ]))
        .unwrap();
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.breaker.reset_timeout, Duration::from_secs(10));
        assert_eq!(config.wallet_initial_balance, dec!(250.50));
        assert_eq!(config.wallet_currency.as_str(), "EUR");

        let http = config.http_gateway().unwrap();
        assert_eq!(http.base_url, "http://localhost:8080");
        assert_eq!(http.api_key, "secret");
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        let err = Config::from_lookup(lookup(&[("STORE_TIMEOUT_MS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "STORE_TIMEOUT_MS", .. }));

        let err = Config::from_lookup(lookup(&[("BREAKER_SUCCESS_THRESHOLD", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "BREAKER_SUCCESS_THRESHOLD", .. }));

        let err = Config::from_lookup(lookup(&[("WALLET_CURRENCY", "dollars")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "WALLET_CURRENCY", .. }));
    }
}
