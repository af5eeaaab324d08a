//! Process configuration: parses environment variables at startup into a
//! typed, immutable `Settings`, with per-source TTL precedence
//! (`CACHE_TTL_<SOURCE>_MS` → `CACHE_TTL_DEFAULT_MS` → hard-coded default).

use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    AlphaVantage,
    Bls,
    Census,
    Fred,
    Imf,
    Nasdaq,
    Oecd,
    WorldBank,
}

impl Source {
    /// The `<SOURCE>` token used in `CACHE_TTL_<SOURCE>_MS` env var names.
    fn env_token(self) -> &'static str {
        match self {
            Self::AlphaVantage => "ALPHA_VANTAGE",
            Self::Bls => "BLS",
            Self::Census => "CENSUS",
            Self::Fred => "FRED",
            Self::Imf => "IMF",
            Self::Nasdaq => "NASDAQ",
            Self::Oecd => "OECD",
            Self::WorldBank => "WORLD_BANK",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlClass {
    Success,
    NoData,
    /// Only meaningful for Alpha Vantage today, but kept generic so another
    /// source that grows an explicit rate-limit signal doesn't need a new
    /// enum variant plumbed through every call site.
    RateLimited,
}

const DEFAULT_SUCCESS_TTL_MS: u64 = 86_400_000; // 1 day
const DEFAULT_NODATA_TTL_MS: u64 = 3_600_000; // 1 hour
const DEFAULT_RATELIMIT_TTL_MS: u64 = 300_000; // 5 minutes

#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub host: String,
    pub log_level: String,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,
    /// Path to persist/reload a cache snapshot across restarts. `None`
    /// (the default) means the cache is purely in-memory for the process
    /// lifetime.
    pub cache_snapshot_path: Option<String>,

    alpha_vantage_api_key: Option<String>,
    fred_api_key: Option<String>,
    census_api_key: Option<String>,
    nasdaq_data_link_api_key: Option<String>,
    bls_api_key: Option<String>,

    cache_ttl_default_ms: u64,
    env: std::collections::HashMap<String, String>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_map(env::vars().collect())
    }

    /// Testable constructor that doesn't touch the real process environment.
    pub fn from_map(env: std::collections::HashMap<String, String>) -> Self {
        let get = |k: &str| env.get(k).cloned();
        let get_u64 = |k: &str, default: u64| {
            env.get(k)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(default)
        };

        Self {
            port: get("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            rate_limit_requests: get("RATE_LIMIT_REQUESTS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            rate_limit_window: Duration::from_millis(get_u64("RATE_LIMIT_WINDOW", 60_000)),
            cache_snapshot_path: get("CACHE_SNAPSHOT_PATH"),
            alpha_vantage_api_key: get("ALPHA_VANTAGE_API_KEY"),
            fred_api_key: get("FRED_API_KEY"),
            census_api_key: get("CENSUS_API_KEY"),
            nasdaq_data_link_api_key: get("NASDAQ_DATA_LINK_API_KEY"),
            bls_api_key: get("BLS_API_KEY"),
            cache_ttl_default_ms: get_u64("CACHE_TTL_DEFAULT_MS", DEFAULT_SUCCESS_TTL_MS),
            env,
        }
    }

    pub fn alpha_vantage_api_key(&self) -> Option<&str> {
        self.alpha_vantage_api_key.as_deref()
    }

    pub fn fred_api_key(&self) -> Option<&str> {
        self.fred_api_key.as_deref()
    }

    pub fn census_api_key(&self) -> Option<&str> {
        self.census_api_key.as_deref()
    }

    pub fn nasdaq_data_link_api_key(&self) -> Option<&str> {
        self.nasdaq_data_link_api_key.as_deref()
    }

    pub fn bls_api_key(&self) -> Option<&str> {
        self.bls_api_key.as_deref()
    }

    /// Resolves the TTL for `source`/`class` following the documented
    /// precedence: per-source-and-class env var, then `CACHE_TTL_DEFAULT_MS`,
    /// then the hard-coded class default. Alpha Vantage rate-limit TTL has
    /// its own dedicated variable name.
    pub fn cache_ttl_for(&self, source: Source, class: TtlClass) -> Duration {
        let hard_default = match class {
            TtlClass::Success => DEFAULT_SUCCESS_TTL_MS,
            TtlClass::NoData => DEFAULT_NODATA_TTL_MS,
            TtlClass::RateLimited => DEFAULT_RATELIMIT_TTL_MS,
        };

        let var_name = match (source, class) {
            (Source::AlphaVantage, TtlClass::RateLimited) => {
                "CACHE_TTL_ALPHA_VANTAGE_RATELIMIT_MS".to_string()
            }
            (s, TtlClass::Success) => format!("CACHE_TTL_{}_MS", s.env_token()),
            (s, TtlClass::NoData) => format!("CACHE_TTL_{}_NODATA_MS", s.env_token()),
            (_, TtlClass::RateLimited) => return Duration::from_millis(self.cache_ttl_default_ms),
        };

        let millis = self
            .env
            .get(&var_name)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(if self.env.contains_key("CACHE_TTL_DEFAULT_MS") {
                self.cache_ttl_default_ms
            } else {
                hard_default
            });
        Duration::from_millis(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn missing_api_key_leaves_field_none() {
        let settings = Settings::from_map(HashMap::new());
        assert!(settings.fred_api_key().is_none());
    }

    #[test]
    fn per_source_ttl_overrides_default() {
        let settings = Settings::from_map(map(&[("CACHE_TTL_FRED_MS", "12345")]));
        assert_eq!(
            settings.cache_ttl_for(Source::Fred, TtlClass::Success),
            Duration::from_millis(12345)
        );
    }

    #[test]
    fn falls_back_to_cache_ttl_default_ms() {
        let settings = Settings::from_map(map(&[("CACHE_TTL_DEFAULT_MS", "999")]));
        assert_eq!(
            settings.cache_ttl_for(Source::Census, TtlClass::NoData),
            Duration::from_millis(999)
        );
    }

    #[test]
    fn falls_back_to_hardcoded_default_when_nothing_set() {
        let settings = Settings::from_map(HashMap::new());
        assert_eq!(
            settings.cache_ttl_for(Source::Oecd, TtlClass::Success),
            Duration::from_millis(DEFAULT_SUCCESS_TTL_MS)
        );
        assert_eq!(
            settings.cache_ttl_for(Source::Oecd, TtlClass::NoData),
            Duration::from_millis(DEFAULT_NODATA_TTL_MS)
        );
    }

    #[test]
    fn alpha_vantage_ratelimit_uses_dedicated_variable() {
        let settings = Settings::from_map(map(&[(
            "CACHE_TTL_ALPHA_VANTAGE_RATELIMIT_MS",
            "7000",
        )]));
        assert_eq!(
            settings.cache_ttl_for(Source::AlphaVantage, TtlClass::RateLimited),
            Duration::from_millis(7000)
        );
    }

    #[test]
    fn alpha_vantage_ratelimit_without_override_uses_hardcoded_default() {
        let settings = Settings::from_map(HashMap::new());
        assert_eq!(
            settings.cache_ttl_for(Source::AlphaVantage, TtlClass::RateLimited),
            Duration::from_millis(DEFAULT_RATELIMIT_TTL_MS)
        );
    }
}
