//! Weather client
//!
//! Fetches current conditions from an Open-Meteo-style endpoint and derives
//! a travel-oriented analysis: condition label, advisory, safety score and
//! a go/no-go flag. Never fails; an unreachable upstream yields a fixed
//! benign default marked as degraded so mode selection stays viable.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use crate::models::WeatherAnalysis;

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current_weather: CurrentWeather,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature: f64,
    windspeed: f64,
    weathercode: i32,
}

pub struct WeatherClient {
    client: Client,
    base_url: String,
}

impl WeatherClient {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to build HTTP client");

        Self { client, base_url }
    }

    pub async fn analysis(&self, lat: f64, lng: f64) -> WeatherAnalysis {
        match self.fetch(lat, lng).await {
            Ok(response) => analyze(&response.current_weather),
            Err(e) => {
                warn!("Weather lookup failed for ({}, {}): {}, using default", lat, lng, e);
                default_analysis()
            }
        }
    }

    async fn fetch(&self, lat: f64, lng: f64) -> reqwest::Result<ForecastResponse> {
        self.client
            .get(&self.base_url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lng.to_string()),
                ("current_weather", "true".to_string()),
                ("temperature_unit", "celsius".to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

fn analyze(current: &CurrentWeather) -> WeatherAnalysis {
    let safety_score = calculate_safety_score(current);

    WeatherAnalysis {
        temperature_c: current.temperature,
        wind_kph: current.windspeed,
        weather_code: current.weathercode,
        condition: condition_for_code(current.weathercode).to_string(),
        travel_advisory: travel_advisory(current).to_string(),
        safety_score,
        suitable_for_travel: safety_score > 70.0,
        degraded: false,
    }
}

/// Fixed benign conditions returned when the upstream is unreachable.
pub fn default_analysis() -> WeatherAnalysis {
    WeatherAnalysis {
        temperature_c: 20.0,
        wind_kph: 10.0,
        weather_code: 0,
        condition: "Clear sky".to_string(),
        travel_advisory: "Weather service unavailable - using default data".to_string(),
        safety_score: 85.0,
        suitable_for_travel: true,
        degraded: true,
    }
}

fn condition_for_code(weather_code: i32) -> &'static str {
    if weather_code == 0 {
        return "Clear sky";
    }
    if weather_code <= 3 {
        return "Partly cloudy";
    }
    if weather_code <= 48 {
        return "Foggy";
    }
    if weather_code <= 67 {
        return "Rainy";
    }
    if weather_code <= 77 {
        return "Snowy";
    }
    if weather_code <= 99 {
        return "Thunderstorm";
    }
    "Unknown"
}

fn travel_advisory(weather: &CurrentWeather) -> &'static str {
    if weather.windspeed > 50.0 {
        return "High winds - avoid travel";
    }
    if weather.temperature < -10.0 {
        return "Extreme cold - travel not recommended";
    }
    if weather.weathercode > 80 {
        return "Severe weather - postpone travel";
    }
    "Weather conditions are good for travel"
}

fn calculate_safety_score(weather: &CurrentWeather) -> f64 {
    let mut score = 100.0;
    if weather.windspeed > 30.0 {
        score -= 30.0;
    }
    if weather.temperature < -5.0 || weather.temperature > 40.0 {
        score -= 25.0;
    }
    if weather.weathercode > 60 {
        score -= 20.0;
    }
    score.max(0.0)
}
