use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    credentials::parse_dotenv, domain::TokenScheme, errors::Error, retry::RetryPolicy, Result,
};

pub const DEFAULT_ENV_FILE: &str = ".env";
pub const DEFAULT_API_URL: &str = "https://www.clubhouseapi.com/api";
pub const DEFAULT_DELAY_SECS: u64 = 2;

/// Typed configuration for the client.
#[derive(Clone, Debug)]
pub struct Config {
    // Session
    pub env_file: PathBuf,
    pub token_scheme: TokenScheme,

    // Remote
    pub api_url: String,
    pub http_timeout: Duration,
    pub app_version: String,
    pub app_build: String,

    // Loops
    pub refresh_interval: Duration,
    pub retry: RetryPolicy,
    pub ping_interval: Duration,
    pub join_interval: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_file = env_str("ROAM_ENV_FILE").unwrap_or_else(|| DEFAULT_ENV_FILE.to_string());
        load_dotenv_if_present(Path::new(&env_file));
        Self::from_lookup(env_str)
    }

    /// Build the config from an arbitrary key lookup (process env in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);
        let num = |key: &str| -> Result<Option<u64>> {
            match get(key) {
                None => Ok(None),
                Some(v) => v
                    .trim()
                    .parse::<u64>()
                    .map(Some)
                    .map_err(|_| Error::Config(format!("{key} must be a non-negative integer"))),
            }
        };

        let env_file = PathBuf::from(get("ROAM_ENV_FILE").unwrap_or(DEFAULT_ENV_FILE.to_string()));

        let token_scheme = match get("ROAM_TOKEN_SCHEME") {
            None => TokenScheme::Bearer,
            Some(s) => TokenScheme::parse(&s).ok_or_else(|| {
                Error::Config(format!(
                    "ROAM_TOKEN_SCHEME must be `bearer` or `token`, got `{s}`"
                ))
            })?,
        };

        let api_url = get("ROAM_API_URL")
            .unwrap_or(DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let http_timeout = Duration::from_secs(num("ROAM_HTTP_TIMEOUT_SECS")?.unwrap_or(10));
        let app_version = get("ROAM_APP_VERSION").unwrap_or("0.1.28".to_string());
        let app_build = get("ROAM_APP_BUILD").unwrap_or("304".to_string());

        let refresh_interval =
            Duration::from_secs(num("ROAM_REFRESH_INTERVAL_SECS")?.unwrap_or(60));
        if refresh_interval.is_zero() {
            return Err(Error::Config(
                "ROAM_REFRESH_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        let max_retries = num("ROAM_RETRY_MAX")?
            .map(|n| u32::try_from(n).unwrap_or(u32::MAX));
        let retry = RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(num("ROAM_RETRY_BASE_MS")?.unwrap_or(2_000)),
            max_delay: Duration::from_millis(num("ROAM_RETRY_MAX_MS")?.unwrap_or(60_000)),
        };

        Ok(Self {
            env_file,
            token_scheme,
            api_url,
            http_timeout,
            app_version,
            app_build,
            refresh_interval,
            retry,
            ping_interval: Duration::from_secs(DEFAULT_DELAY_SECS),
            join_interval: Duration::from_secs(DEFAULT_DELAY_SECS * 2),
        })
    }

    /// Apply the CLI `--delay`: pings are spaced by `delay`, joins by twice that.
    pub fn with_delay(mut self, delay_secs: u64) -> Self {
        self.ping_interval = Duration::from_secs(delay_secs);
        self.join_interval = Duration::from_secs(delay_secs.saturating_mul(2));
        self
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Export the dotenv file into the process env without overriding existing vars.
fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let cfg = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.env_file, PathBuf::from(".env"));
        assert_eq!(cfg.token_scheme, TokenScheme::Bearer);
        assert_eq!(cfg.api_url, DEFAULT_API_URL);
        assert_eq!(cfg.refresh_interval, Duration::from_secs(60));
        assert_eq!(cfg.retry.max_retries, None);
        assert_eq!(cfg.retry.base_delay, Duration::from_secs(2));
        assert_eq!(cfg.ping_interval, Duration::from_secs(2));
        assert_eq!(cfg.join_interval, Duration::from_secs(4));
    }

    #[test]
    fn reads_overrides() {
        let cfg = Config::from_lookup(lookup(&[
            ("ROAM_TOKEN_SCHEME", "token"),
            ("ROAM_API_URL", "http://localhost:9000/api/"),
            ("ROAM_RETRY_MAX", "0"),
            ("ROAM_REFRESH_INTERVAL_SECS", "30"),
        ]))
        .unwrap()
        .with_delay(5);
        assert_eq!(cfg.token_scheme, TokenScheme::Token);
        assert_eq!(cfg.api_url, "http://localhost:9000/api");
        assert_eq!(cfg.retry.max_retries, Some(0));
        assert_eq!(cfg.refresh_interval, Duration::from_secs(30));
        assert_eq!(cfg.ping_interval, Duration::from_secs(5));
        assert_eq!(cfg.join_interval, Duration::from_secs(10));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("ROAM_TOKEN_SCHEME", "jwt")])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("ROAM_RETRY_MAX", "-1")])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("ROAM_REFRESH_INTERVAL_SECS", "0")])),
            Err(Error::Config(_))
        ));
    }
}
