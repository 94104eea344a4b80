use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Temperature display units. The provider is always queried in metric;
/// conversion happens on the way to the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    Metric,
    Imperial,
}

impl Units {
    pub fn toggled(self) -> Self {
        match self {
            Units::Metric => Units::Imperial,
            Units::Imperial => Units::Metric,
        }
    }

    /// Value for the provider's `units` query parameter.
    pub fn as_query_param(self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
        }
    }
}

impl FromStr for Units {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            other => Err(format!("unknown units: {other}")),
        }
    }
}

/// Convert a temperature between display units. Identity when the units
/// already match.
pub fn convert_temperature(value: f64, from: Units, to: Units) -> f64 {
    match (from, to) {
        (Units::Metric, Units::Imperial) => value * 9.0 / 5.0 + 32.0,
        (Units::Imperial, Units::Metric) => (value - 32.0) * 5.0 / 9.0,
        _ => value,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherCondition {
    pub main: String,
    pub description: String,
    pub icon: String,
}

impl WeatherCondition {
    /// Provider-hosted icon image for this condition.
    pub fn icon_url(&self) -> String {
        format!("https://openweathermap.org/img/wn/{}@2x.png", self.icon)
    }
}

/// One raw 3-hour forecast data point, immutable once fetched.
#[derive(Debug, Clone, Serialize)]
pub struct WeatherSample {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub wind_direction_deg: f64,
    /// Probability of precipitation, 0.0..=1.0. Zero when the provider
    /// omits the field.
    pub precipitation_probability: f64,
    pub condition: WeatherCondition,
}

/// Current observed conditions for one city.
#[derive(Debug, Clone, Serialize)]
pub struct WeatherSnapshot {
    pub city: String,
    pub country: String,
    pub observed_at: DateTime<Utc>,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub wind_direction_deg: f64,
    pub condition: WeatherCondition,
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
}

impl WeatherSnapshot {
    /// Identity used for the favorites set.
    pub fn favorite_id(&self) -> String {
        format!("{}-{}", self.city, self.country)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub name: String,
    pub country: String,
}

/// A city pinned by the user, persisted across sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteCity {
    pub id: String,
    pub name: String,
    pub country: String,
    pub last_known_temp: i32,
    pub last_known_condition: WeatherCondition,
    pub saved_at: DateTime<Utc>,
}

impl FavoriteCity {
    pub fn from_snapshot(snapshot: &WeatherSnapshot) -> Self {
        Self {
            id: snapshot.favorite_id(),
            name: snapshot.city.clone(),
            country: snapshot.country.clone(),
            last_known_temp: snapshot.temperature.round() as i32,
            last_known_condition: snapshot.condition.clone(),
            saved_at: Utc::now(),
        }
    }
}
