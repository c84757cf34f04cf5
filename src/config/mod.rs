use std::env;
use std::time::Duration;

use chrono::TimeDelta;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub cache_ttl_secs: u64,
    pub reset_token_ttl_secs: u64,
    pub verification_code_ttl_secs: u64,
    pub verification_max_attempts: u32,
    pub reaper_interval_secs: u64,
    pub mail_relay_url: Option<String>,
    /// 是否挂载 `/cache/*` 管理接口
    pub cache_admin_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: String::new(),
            server_host: "::".to_string(),
            server_port: 3000,
            api_base_uri: "/api".to_string(),
            cache_ttl_secs: 300,
            reset_token_ttl_secs: 3600,
            verification_code_ttl_secs: 15 * 60,
            verification_max_attempts: 5,
            reaper_interval_secs: 600,
            mail_relay_url: None,
            cache_admin_enabled: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();
        let defaults = Config::default();

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            server_host: optional("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parsed("SERVER_PORT").unwrap_or(defaults.server_port),
            api_base_uri: optional("API_BASE_URI").unwrap_or(defaults.api_base_uri),
            cache_ttl_secs: parsed("CACHE_TTL").unwrap_or(defaults.cache_ttl_secs),
            reset_token_ttl_secs: scaled(optional("RESET_TOKEN_TTL"), 'h', 3600, 1),
            verification_code_ttl_secs: scaled(optional("VERIFICATION_CODE_TTL"), 'm', 60, 15),
            verification_max_attempts: parsed("VERIFICATION_MAX_ATTEMPTS")
                .unwrap_or(defaults.verification_max_attempts),
            reaper_interval_secs: parsed("REAPER_INTERVAL")
                .unwrap_or(defaults.reaper_interval_secs),
            mail_relay_url: optional("MAIL_RELAY_URL").filter(|url| !url.trim().is_empty()),
            cache_admin_enabled: parsed("CACHE_ADMIN_ENABLED")
                .unwrap_or(defaults.cache_admin_enabled),
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn reset_token_ttl(&self) -> TimeDelta {
        seconds(self.reset_token_ttl_secs)
    }

    pub fn verification_code_ttl(&self) -> TimeDelta {
        seconds(self.verification_code_ttl_secs)
    }

    /// 至少 1 秒
    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs.max(1))
    }
}

/// 解析 "2h"、"15m" 这类带单位的值，换算成秒
fn scaled(value: Option<String>, suffix: char, unit_secs: u64, default: u64) -> u64 {
    value
        .and_then(|v| v.trim().trim_end_matches(suffix).parse::<u64>().ok())
        .unwrap_or(default)
        .saturating_mul(unit_secs)
}

/// 超出 `TimeDelta` 范围时取最大值
fn seconds(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    optional(name).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_durations_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.reset_token_ttl(), TimeDelta::hours(1));
        assert_eq!(config.verification_code_ttl(), TimeDelta::minutes(15));
        assert_eq!(config.reaper_interval(), Duration::from_secs(600));
    }

    #[test]
    fn extreme_values_are_clamped() {
        let config = Config {
            reset_token_ttl_secs: u64::MAX,
            verification_code_ttl_secs: u64::MAX / 2,
            reaper_interval_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.reset_token_ttl(), TimeDelta::MAX);
        assert_eq!(config.verification_code_ttl(), TimeDelta::MAX);
        assert_eq!(config.reaper_interval(), Duration::from_secs(1));
        assert_eq!(scaled(Some(u64::MAX.to_string()), 'h', 3600, 1), u64::MAX);
        assert_eq!(scaled(Some("2h".into()), 'h', 3600, 1), 7200);
        assert_eq!(scaled(Some("oops".into()), 'm', 60, 15), 900);
        assert_eq!(scaled(None, 'm', 60, 15), 900);
    }
}
