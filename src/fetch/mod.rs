use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::SiteConfig;


/// Fields requested from the provider's `current` block.
pub const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,wind_speed_10m,\
precipitation,pressure_msl,apparent_temperature,cloud_cover,weather_code";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from a single fetch attempt.
///
/// A fetch failure abandons the cycle; the next scheduled tick is the
/// retry mechanism.
#[derive(Debug)]
pub enum FetchError {
    /// Network or timeout error before a response arrived
    Request(reqwest::Error),
    /// Provider answered with a non-2xx status
    Status(reqwest::StatusCode),
    /// Body was not the expected JSON shape
    Payload(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Request(e) => write!(f, "request failed: {}", e),
            FetchError::Status(status) => write!(f, "provider returned HTTP {}", status),
            FetchError::Payload(msg) => write!(f, "malformed provider response: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

/// Raw current-condition readings as reported by the provider.
///
/// Everything is optional: a degraded provider payload still normalizes
/// into a publishable Observation downstream.
#[derive(Clone, Debug, Default)]
pub struct CurrentConditions {
    pub time: Option<String>,
    pub temperature_2m: Option<f64>,
    pub relative_humidity_2m: Option<f64>,
    pub wind_speed_10m: Option<f64>,
    pub precipitation: Option<f64>,
    pub pressure_msl: Option<f64>,
    pub apparent_temperature: Option<f64>,
    pub cloud_cover: Option<f64>,
    pub weather_code: Option<i64>,
    /// First element of the hourly series, i.e. the current hour
    pub precipitation_probability: Option<f64>,
}

/// Source of current weather conditions for one geographic point.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch_current(&self) -> Result<CurrentConditions, FetchError>;
}

/// Open-Meteo forecast API client
pub struct OpenMeteoClient {
    client: reqwest::Client,
    api_url: String,
    site: SiteConfig,
}

impl OpenMeteoClient {
    pub fn new(api_url: String, site: SiteConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url,
            site,
        })
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    async fn fetch_current(&self) -> Result<CurrentConditions, FetchError> {
        debug!(
            url = %self.api_url,
            latitude = self.site.latitude,
            longitude = self.site.longitude,
            "Fetching current conditions"
        );

        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("latitude", self.site.latitude.to_string()),
                ("longitude", self.site.longitude.to_string()),
                ("current", CURRENT_FIELDS.to_string()),
                ("hourly", "precipitation_probability".to_string()),
                ("timezone", self.site.timezone.clone()),
            ])
            .send()
            .await
            .map_err(FetchError::Request)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body: ForecastResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Payload(e.to_string()))?;

        assemble(body)
    }
}

/// Provider response envelope. Only the blocks we ask for are modeled.
#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: Option<CurrentBlock>,
    #[serde(default)]
    hourly: Option<HourlyBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct CurrentBlock {
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    temperature_2m: Option<f64>,
    #[serde(default)]
    relative_humidity_2m: Option<f64>,
    #[serde(default)]
    wind_speed_10m: Option<f64>,
    #[serde(default)]
    precipitation: Option<f64>,
    #[serde(default)]
    pressure_msl: Option<f64>,
    #[serde(default)]
    apparent_temperature: Option<f64>,
    #[serde(default)]
    cloud_cover: Option<f64>,
    #[serde(default)]
    weather_code: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct HourlyBlock {
    #[serde(default)]
    precipitation_probability: Vec<f64>,
}

/// Flatten the response into one record, pulling the current-hour
/// precipitation probability out of the hourly series.
fn assemble(body: ForecastResponse) -> Result<CurrentConditions, FetchError> {
    let current = body
        .current
        .ok_or_else(|| FetchError::Payload("response missing current block".to_string()))?;

    let precipitation_probability = body
        .hourly
        .and_then(|h| h.precipitation_probability.first().copied());

    Ok(CurrentConditions {
        time: current.time,
        temperature_2m: current.temperature_2m,
        relative_humidity_2m: current.relative_humidity_2m,
        wind_speed_10m: current.wind_speed_10m,
        precipitation: current.precipitation,
        pressure_msl: current.pressure_msl,
        apparent_temperature: current.apparent_temperature,
        cloud_cover: current.cloud_cover,
        weather_code: current.weather_code,
        precipitation_probability,
    })
}
