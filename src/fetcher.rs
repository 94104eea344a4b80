use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::fetch_error::FetchError;
use crate::models::{LocationInfo, WeatherCondition, WeatherSample, WeatherSnapshot};

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// HTTP client for the weather data provider.
///
/// All requests are issued in metric units; unit conversion is a display
/// concern handled by the caller.
#[derive(Clone)]
pub struct WeatherFetcher {
    client: Client,
    base_url: String,
    api_key: String,
    language: String,
}

impl WeatherFetcher {
    pub fn new(api_key: String, language: String) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL.to_string(), api_key, language)
    }

    /// Custom base URL constructor, used to point at a mock server in tests.
    pub fn with_base_url(base_url: String, api_key: String, language: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url,
            api_key,
            language,
        }
    }

    /// Current observed conditions for a city.
    #[instrument(skip(self), fields(city = %city))]
    pub async fn current_conditions(&self, city: &str) -> Result<WeatherSnapshot, FetchError> {
        debug!("Requesting current conditions");
        let response = self
            .client
            .get(format!("{}/weather", self.base_url))
            .query(&[
                ("q", city),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
                ("lang", self.language.as_str()),
            ])
            .send()
            .await?;

        let body: CurrentConditionsDto = decode(response).await?;
        body.into_snapshot()
    }

    /// Current observed conditions for a coordinate pair.
    #[instrument(skip(self))]
    pub async fn current_conditions_by_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<WeatherSnapshot, FetchError> {
        debug!("Requesting current conditions by coordinates");
        let response = self
            .client
            .get(format!("{}/weather", self.base_url))
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
                ("lang", self.language.clone()),
            ])
            .send()
            .await?;

        let body: CurrentConditionsDto = decode(response).await?;
        body.into_snapshot()
    }

    /// Raw 3-hour forecast samples for a city, plus the provider's
    /// location echo.
    #[instrument(skip(self), fields(city = %city))]
    pub async fn forecast_samples(
        &self,
        city: &str,
    ) -> Result<(LocationInfo, Vec<WeatherSample>), FetchError> {
        debug!("Requesting forecast samples");
        let response = self
            .client
            .get(format!("{}/forecast", self.base_url))
            .query(&[
                ("q", city),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
                ("lang", self.language.as_str()),
            ])
            .send()
            .await?;

        let body: ForecastDto = decode(response).await?;
        debug!("Received {} forecast entries", body.list.len());

        let location = LocationInfo {
            name: body.city.name,
            country: body.city.country.unwrap_or_default(),
        };
        let samples = body
            .list
            .into_iter()
            .map(ForecastEntryDto::into_sample)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((location, samples))
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, FetchError> {
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Http {
            status: status.as_u16(),
        });
    }
    Ok(response.json::<T>().await?)
}

fn timestamp_from_unix(seconds: i64) -> Result<DateTime<Utc>, FetchError> {
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| FetchError::DateTimeError(format!("unix seconds out of range: {seconds}")))
}

// Wire DTOs. These mirror the provider's JSON; the rest of the crate only
// sees the domain types they convert into.

#[derive(Debug, Deserialize)]
struct CurrentConditionsDto {
    name: String,
    dt: i64,
    #[serde(default)]
    sys: SysDto,
    main: MainDto,
    #[serde(default)]
    wind: WindDto,
    weather: Vec<ConditionDto>,
}

#[derive(Debug, Default, Deserialize)]
struct SysDto {
    country: Option<String>,
    sunrise: Option<i64>,
    sunset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct MainDto {
    temp: f64,
    feels_like: f64,
    humidity: f64,
    pressure: f64,
}

#[derive(Debug, Default, Deserialize)]
struct WindDto {
    #[serde(default)]
    speed: f64,
    #[serde(default)]
    deg: f64,
}

#[derive(Debug, Deserialize)]
struct ConditionDto {
    main: String,
    description: String,
    icon: String,
}

impl ConditionDto {
    fn into_condition(self) -> WeatherCondition {
        WeatherCondition {
            main: self.main,
            description: self.description,
            icon: self.icon,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ForecastDto {
    city: CityDto,
    list: Vec<ForecastEntryDto>,
}

#[derive(Debug, Deserialize)]
struct CityDto {
    name: String,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastEntryDto {
    dt: i64,
    main: MainDto,
    #[serde(default)]
    wind: WindDto,
    weather: Vec<ConditionDto>,
    #[serde(default)]
    pop: f64,
}

impl CurrentConditionsDto {
    fn into_snapshot(self) -> Result<WeatherSnapshot, FetchError> {
        let observed_at = timestamp_from_unix(self.dt)?;
        let sunrise = self.sys.sunrise.map(timestamp_from_unix).transpose()?;
        let sunset = self.sys.sunset.map(timestamp_from_unix).transpose()?;
        Ok(WeatherSnapshot {
            city: self.name,
            country: self.sys.country.unwrap_or_default(),
            observed_at,
            temperature: self.main.temp,
            feels_like: self.main.feels_like,
            humidity: self.main.humidity,
            pressure: self.main.pressure,
            wind_speed: self.wind.speed,
            wind_direction_deg: self.wind.deg,
            condition: primary_condition(self.weather),
            sunrise,
            sunset,
        })
    }
}

impl ForecastEntryDto {
    fn into_sample(self) -> Result<WeatherSample, FetchError> {
        Ok(WeatherSample {
            timestamp: timestamp_from_unix(self.dt)?,
            temperature: self.main.temp,
            feels_like: self.main.feels_like,
            humidity: self.main.humidity,
            pressure: self.main.pressure,
            wind_speed: self.wind.speed,
            wind_direction_deg: self.wind.deg,
            precipitation_probability: self.pop,
            condition: primary_condition(self.weather),
        })
    }
}

fn primary_condition(conditions: Vec<ConditionDto>) -> WeatherCondition {
    conditions
        .into_iter()
        .next()
        .map(ConditionDto::into_condition)
        .unwrap_or_default()
}
