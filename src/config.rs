use catalog_types::Role;
use rate_service::{default_cache_path, RateOptions, DEFAULT_REFRESH, DEFAULT_TIMEOUT};
use std::path::PathBuf;
use std::time::Duration;

pub static DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub api_role: Option<Role>,
    pub rate_cache_path: PathBuf,
    pub rate_refresh: Duration,
    pub rate_timeout: Duration,
}

pub fn parse_duration(duration: &str) -> Result<Duration, anyhow::Error> {
    duration_str::parse(duration.trim())
        .map_err(|err| anyhow::anyhow!("Unable to parse duration {duration}: {err}"))
}

impl Config {
    /// Read from the process environment, `.env` included once loaded.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        Self::from_lookup(|key| Some(envmnt::get_or(key, "")))
    }

    pub fn from_lookup<F>(get: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        let duration = |key: &str, default: Duration| -> Result<Duration, anyhow::Error> {
            match get(key) {
                Some(v) => parse_duration(&v).map_err(|err| err.context(format!("Invalid {key}"))),
                None => Ok(default),
            }
        };
        let api_role = match get("API_ROLE") {
            Some(v) => Some(
                Role::try_from(&v).ok_or_else(|| anyhow::anyhow!("Unknown API_ROLE {v}"))?,
            ),
            None => None,
        };
        Ok(Self {
            api_base_url: get("API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            api_token: get("API_TOKEN"),
            api_role,
            rate_cache_path: get("CONVERSION_RATE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_cache_path),
            rate_refresh: duration("CONVERSION_RATE_REFRESH", DEFAULT_REFRESH)?,
            rate_timeout: duration("CONVERSION_RATE_TIMEOUT", DEFAULT_TIMEOUT)?,
        })
    }

    pub fn rate_options(&self) -> RateOptions {
        RateOptions {
            cache_path: self.rate_cache_path.clone(),
            refresh: self.rate_refresh,
            timeout: self.rate_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, anyhow::Error> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = config(&[]).unwrap();
        assert_eq!(DEFAULT_API_BASE_URL, config.api_base_url);
        assert_eq!(None, config.api_token);
        assert_eq!(None, config.api_role);
        assert_eq!(DEFAULT_REFRESH, config.rate_refresh);
        assert_eq!(Duration::from_secs(5), config.rate_timeout);
    }

    #[test]
    fn reads_values() {
        let config = config(&[
            ("API_BASE_URL", "https://shop.example/api"),
            ("API_TOKEN", "secret"),
            ("API_ROLE", "Seller"),
            ("CONVERSION_RATE_PATH", "/tmp/rate.csv"),
            ("CONVERSION_RATE_REFRESH", "30m"),
            ("CONVERSION_RATE_TIMEOUT", ""),
        ])
        .unwrap();
        assert_eq!(Some("secret".to_string()), config.api_token);
        assert_eq!(Some(Role::Seller), config.api_role);
        assert_eq!(PathBuf::from("/tmp/rate.csv"), config.rate_options().cache_path);
        assert_eq!(Duration::from_secs(30 * 60), config.rate_refresh);
        assert_eq!(DEFAULT_TIMEOUT, config.rate_timeout);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(config(&[("API_ROLE", "owner")]).is_err());
        assert!(config(&[("CONVERSION_RATE_REFRESH", "soon")]).is_err());
    }
}
