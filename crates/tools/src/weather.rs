//! Weather tool: current conditions via the Open-Meteo APIs.
//!
//! Two requests: geocode the city name, then fetch the current weather for
//! the resulting coordinates. No API key required.

use async_trait::async_trait;
use jarvis_core::error::ToolError;
use jarvis_core::schema::{ParamType, ParameterSchema};
use jarvis_core::tool::Tool;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

pub struct WeatherTool {
    client: reqwest::Client,
    geocoding_url: String,
    forecast_url: String,
}

impl WeatherTool {
    pub fn new(client: reqwest::Client, geocoding_url: &str, forecast_url: &str) -> Self {
        Self {
            client,
            geocoding_url: geocoding_url.to_string(),
            forecast_url: forecast_url.to_string(),
        }
    }

    fn failed(&self, reason: impl Into<String>) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: self.name().to_string(),
            reason: reason.into(),
        }
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, ToolError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| self.failed(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(self.failed(format!("weather service returned {}", response.status())));
        }

        response
            .json()
            .await
            .map_err(|e| self.failed(format!("unreadable weather response: {e}")))
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "weather"
    }

    fn description(&self) -> &str {
        "Get the current weather for a city: temperature in °C, wind speed and direction, and conditions."
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new().required("city", ParamType::String, "Name of the city")
    }

    async fn invoke(&self, arguments: Map<String, Value>) -> Result<Value, ToolError> {
        let city = arguments
            .get("city")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if city.is_empty() {
            return Err(ToolError::InvalidArguments {
                tool: self.name().into(),
                field: "city".into(),
                reason: "city must not be empty".into(),
            });
        }

        let geo = self
            .get_json(&self.geocoding_url, &[("name", city.to_string()), ("count", "1".into())])
            .await?;
        let location =
            parse_location(&geo).ok_or_else(|| self.failed(format!("City '{city}' not found.")))?;
        debug!(city, lat = location.latitude, lon = location.longitude, "Geocoded city");

        let forecast = self
            .get_json(&self.forecast_url, &[
                ("latitude", location.latitude.to_string()),
                ("longitude", location.longitude.to_string()),
                ("current_weather", "true".into()),
            ])
            .await?;

        parse_current_weather(city, &forecast).ok_or_else(|| self.failed("Weather data not available."))
    }
}

#[derive(Debug, Deserialize)]
struct GeoLocation {
    latitude: f64,
    longitude: f64,
}

fn parse_location(body: &Value) -> Option<GeoLocation> {
    let first = body.get("results")?.as_array()?.first()?;
    serde_json::from_value(first.clone()).ok()
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature: f64,
    windspeed: f64,
    winddirection: f64,
    weathercode: u32,
}

/// Build the tool payload from an Open-Meteo forecast body.
fn parse_current_weather(city: &str, body: &Value) -> Option<Value> {
    let cw: CurrentWeather = serde_json::from_value(body.get("current_weather")?.clone()).ok()?;
    Some(json!({
        "city": city,
        "temperature": cw.temperature,
        "windspeed": cw.windspeed,
        "winddirection": cw.winddirection,
        "weathercode": cw.weathercode,
        "conditions": describe_weather_code(cw.weathercode),
    }))
}

/// WMO weather interpretation codes.
fn describe_weather_code(code: u32) -> &'static str {
    match code {
        0 => "clear sky",
        1 => "mainly clear",
        2 => "partly cloudy",
        3 => "overcast",
        45 | 48 => "fog",
        51 | 53 | 55 => "drizzle",
        56 | 57 => "freezing drizzle",
        61 | 63 | 65 => "rain",
        66 | 67 => "freezing rain",
        71 | 73 | 75 | 77 => "snow",
        80..=82 => "rain showers",
        85 | 86 => "snow showers",
        95 => "thunderstorm",
        96 | 99 => "thunderstorm with hail",
        _ => "unknown conditions",
    }
}
