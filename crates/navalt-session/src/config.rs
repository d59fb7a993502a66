//! Session configuration from environment.

use std::env;
use std::time::Duration;

use crate::controller::RouteAlternativesOptions;
use crate::loops::online_alternatives_loop::OnlineAlternativesConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub alternatives_interval: Duration,
    pub avoid_maneuver_seconds: u32,
    pub online_retry_interval: Duration,
    pub online_avoid_maneuver_seconds: u32,
    pub directions_url: String,
    pub access_token: Option<String>,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            alternatives_interval: Duration::from_millis(300_000),
            avoid_maneuver_seconds: 8,
            online_retry_interval: Duration::from_millis(1_000),
            online_avoid_maneuver_seconds: 3,
            directions_url: "https://api.mapbox.com".to_string(),
            access_token: None,
            connect_timeout: Duration::from_millis(10_000),
            read_timeout: Duration::from_millis(30_000),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            alternatives_interval: env_millis("NAVALT_ALTERNATIVES_INTERVAL_MS")
                .unwrap_or(defaults.alternatives_interval),
            avoid_maneuver_seconds: env::var("NAVALT_AVOID_MANEUVER_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.avoid_maneuver_seconds),
            online_retry_interval: env_millis("NAVALT_ONLINE_RETRY_INTERVAL_MS")
                .unwrap_or(defaults.online_retry_interval),
            online_avoid_maneuver_seconds: env::var("NAVALT_ONLINE_AVOID_MANEUVER_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.online_avoid_maneuver_seconds),
            directions_url: env::var("NAVALT_DIRECTIONS_URL")
                .unwrap_or(defaults.directions_url),
            access_token: env::var("MAPBOX_ACCESS_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty()),
            connect_timeout: env_millis("NAVALT_CONNECT_TIMEOUT_MS")
                .unwrap_or(defaults.connect_timeout),
            read_timeout: env_millis("NAVALT_READ_TIMEOUT_MS").unwrap_or(defaults.read_timeout),
        }
    }

    pub fn alternatives_options(&self) -> RouteAlternativesOptions {
        RouteAlternativesOptions {
            interval: self.alternatives_interval,
            avoid_maneuver_seconds: self.avoid_maneuver_seconds,
        }
    }

    pub fn online_alternatives(&self) -> OnlineAlternativesConfig {
        OnlineAlternativesConfig {
            minimum_retry_interval: self.online_retry_interval,
            avoid_maneuver_seconds: self.online_avoid_maneuver_seconds,
        }
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}
