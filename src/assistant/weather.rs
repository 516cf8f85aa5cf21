//! OpenWeatherMap adapter: geocode a place name, then read current conditions.
//!
//! All readings are metric: °C for temperatures, m/s for wind, % for humidity.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::assistant::tools::ToolFailure;

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";
const PROVIDER: &str = "OpenWeatherMap";

/// Current conditions at a resolved place.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub place: String,
    pub country: Option<String>,
    pub condition: String,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: f64,
    pub wind_speed_ms: Option<f64>,
}

impl WeatherReport {
    pub fn render(&self) -> String {
        let mut out = format!("Weather in {}", self.place);
        if let Some(ref country) = self.country {
            out.push_str(&format!(", {}", country));
        }
        out.push_str(&format!(":\n• Condition: {}\n", self.condition));
        out.push_str(&format!("• Temperature: {}°C\n", self.temperature_c));
        out.push_str(&format!("• Feels like: {}°C\n", self.feels_like_c));
        out.push_str(&format!("• Humidity: {}%", self.humidity_pct));
        if let Some(wind) = self.wind_speed_ms {
            out.push_str(&format!("\n• Wind speed: {} m/s", wind));
        }
        out
    }
}

#[derive(Deserialize, Debug)]
struct GeoMatch {
    name: String,
    lat: f64,
    lon: f64,
    country: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CurrentWeather {
    name: Option<String>,
    #[serde(default)]
    weather: Vec<Condition>,
    main: Readings,
    wind: Option<Wind>,
    sys: Option<Sys>,
}

#[derive(Deserialize, Debug)]
struct Condition {
    description: String,
}

#[derive(Deserialize, Debug)]
struct Readings {
    temp: f64,
    feels_like: f64,
    humidity: f64,
}

#[derive(Deserialize, Debug)]
struct Wind {
    speed: f64,
}

#[derive(Deserialize, Debug)]
struct Sys {
    country: Option<String>,
}

/// Capitalize the first character (OpenWeatherMap descriptions are lowercase).
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub struct WeatherClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl WeatherClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL, timeout)
    }

    pub fn with_base_url(api_key: String, base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Current weather for a place name.
    pub async fn current(&self, location: &str) -> Result<WeatherReport, ToolFailure> {
        let location = location.trim();
        if location.is_empty() {
            return Err(ToolFailure::invalid_input("empty location"));
        }
        info!("🌤️ Weather requested for: {}", location);

        let place = self.geocode(location).await?;
        debug!("Geocoded {} to {} ({}, {})", location, place.name, place.lat, place.lon);

        let url = format!("{}/data/2.5/weather", self.base_url);
        let lat = place.lat.to_string();
        let lon = place.lon.to_string();
        let body = self
            .get(
                &url,
                &[
                    ("lat", lat.as_str()),
                    ("lon", lon.as_str()),
                    ("units", "metric"),
                    ("lang", "es"),
                ],
            )
            .await?;

        let current: CurrentWeather = serde_json::from_str(&body)
            .map_err(|e| ToolFailure::malformed(format!("weather body: {e}")))?;

        let condition = current
            .weather
            .first()
            .map(|c| capitalize(&c.description))
            .ok_or_else(|| ToolFailure::malformed("weather body has no conditions"))?;

        Ok(WeatherReport {
            place: current.name.filter(|n| !n.is_empty()).unwrap_or(place.name),
            country: current.sys.and_then(|s| s.country).or(place.country),
            condition,
            temperature_c: current.main.temp,
            feels_like_c: current.main.feels_like,
            humidity_pct: current.main.humidity,
            wind_speed_ms: current.wind.map(|w| w.speed),
        })
    }

    async fn geocode(&self, location: &str) -> Result<GeoMatch, ToolFailure> {
        let url = format!("{}/geo/1.0/direct", self.base_url);
        let body = self.get(&url, &[("q", location), ("limit", "1")]).await?;

        let matches: Vec<GeoMatch> = serde_json::from_str(&body)
            .map_err(|e| ToolFailure::malformed(format!("geocoding body: {e}")))?;

        matches
            .into_iter()
            .next()
            .ok_or_else(|| ToolFailure::invalid_input(format!("could not find the location: {location}")))
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<String, ToolFailure> {
        let response = self
            .http
            .get(url)
            .query(query)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| ToolFailure::from_transport(PROVIDER, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ToolFailure::from_transport(PROVIDER, e))?;

        if !status.is_success() {
            return Err(ToolFailure::from_status(PROVIDER, status, &body));
        }
        Ok(body)
    }
}
