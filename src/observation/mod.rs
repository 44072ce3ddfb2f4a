use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SiteConfig;
use crate::fetch::CurrentConditions;

mod conditions;

pub use conditions::condition_label;

/// One normalized weather reading, ready for publication.
///
/// Built fresh each cycle, never mutated after normalization, and
/// discarded once the publish attempt finishes. Every numeric field is
/// always present: missing provider readings default to 0 so a partially
/// degraded response still yields a publishable record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub condition: String,
    pub weather_code: i64,
    pub precipitation_probability: f64,
    pub pressure: f64,
    pub precipitation: f64,
    pub apparent_temperature: f64,
    pub cloud_cover: f64,
    /// Provider observation time when reported, collection time otherwise
    pub timestamp: String,
    pub collected_at: String,
}

impl Observation {
    /// Normalize raw provider readings into the canonical document.
    ///
    /// This cannot fail: absent optional fields are defaulted, unmapped
    /// weather codes resolve to "Unknown", and all floats are rounded to
    /// one decimal place.
    pub fn from_raw(raw: &CurrentConditions, site: &SiteConfig, collected_at: DateTime<Utc>) -> Self {
        let condition = raw
            .weather_code
            .map(condition_label)
            .unwrap_or("Unknown")
            .to_string();
        let collected_at = collected_at.to_rfc3339();

        Self {
            location: site.location.clone(),
            latitude: site.latitude,
            longitude: site.longitude,
            temperature: round1(raw.temperature_2m.unwrap_or(0.0)),
            humidity: round1(raw.relative_humidity_2m.unwrap_or(0.0)),
            wind_speed: round1(raw.wind_speed_10m.unwrap_or(0.0)),
            condition,
            weather_code: raw.weather_code.unwrap_or(0),
            precipitation_probability: round1(raw.precipitation_probability.unwrap_or(0.0)),
            pressure: round1(raw.pressure_msl.unwrap_or(0.0)),
            precipitation: round1(raw.precipitation.unwrap_or(0.0)),
            apparent_temperature: round1(raw.apparent_temperature.unwrap_or(0.0)),
            cloud_cover: round1(raw.cloud_cover.unwrap_or(0.0)),
            timestamp: raw.time.clone().unwrap_or_else(|| collected_at.clone()),
            collected_at,
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
