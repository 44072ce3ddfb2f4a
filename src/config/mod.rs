use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Complete collector configuration
///
/// Read once from the environment at startup and passed by reference
/// afterwards; nothing mutates it for the lifetime of the process.
#[derive(Clone, Debug)]
pub struct CollectorConfig {
    pub broker: BrokerConfig,
    pub site: SiteConfig,
    pub schedule: ScheduleConfig,
    /// Weather provider base URL (overridable for tests)
    pub api_url: String,
}

/// Broker configuration
#[derive(Clone, Debug)]
pub struct BrokerConfig {
    pub url: String,
    /// Durable stream backing the queue
    pub stream_name: String,
    /// Publish subject (routing key)
    pub subject: String,
}

/// The geographic point observations are collected for
#[derive(Clone, Debug)]
pub struct SiteConfig {
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Passed through to the provider so `current.time` is local time
    pub timezone: String,
}

/// Scheduler timing configuration
#[derive(Clone, Debug)]
pub struct ScheduleConfig {
    /// Wall-clock gap between collection cycles
    pub interval: Duration,
    /// Optional wait before the first cycle, for a co-located broker to come up
    pub startup_delay: Duration,
    /// Pause after an unexpected loop error before resuming
    pub cooldown: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            stream_name: "WEATHER".to_string(),
            subject: "weather.observations".to_string(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            location: "Pato Branco, PR".to_string(),
            latitude: -26.2286,
            longitude: -52.6708,
            timezone: "auto".to_string(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
            startup_delay: Duration::ZERO,
            cooldown: Duration::from_secs(60),
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            site: SiteConfig::default(),
            schedule: ScheduleConfig::default(),
            api_url: "https://api.open-meteo.com/v1/forecast".to_string(),
        }
    }
}

impl CollectorConfig {
    /// Load configuration from environment variables.
    ///
    /// Every variable is optional; a malformed numeric value falls back to
    /// its default with a warning rather than refusing to start.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            broker: BrokerConfig {
                url: env_or("BROKER_URL", &defaults.broker.url),
                stream_name: env_or("STREAM_NAME", &defaults.broker.stream_name),
                subject: env_or("QUEUE_NAME", &defaults.broker.subject),
            },
            site: SiteConfig {
                location: env_or("LOCATION", &defaults.site.location),
                latitude: parse_or("LATITUDE", defaults.site.latitude),
                longitude: parse_or("LONGITUDE", defaults.site.longitude),
                timezone: env_or("TIMEZONE", &defaults.site.timezone),
            },
            schedule: ScheduleConfig {
                interval: Duration::from_secs(parse_or("INTERVAL_MINUTES", 60u64) * 60),
                startup_delay: Duration::from_secs(parse_or("STARTUP_DELAY_SECONDS", 0u64)),
                cooldown: defaults.schedule.cooldown,
            },
            api_url: env_or("WEATHER_API_URL", &defaults.api_url),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy + fmt::Display,
{
    match env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, default = %default, "Malformed value, using default");
                default
            }
        },
        Err(_) => default,
    }
}
