//! Core data models for the travel planner

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComfortLevel {
    Economy,
    Comfort,
    Luxury,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    Car,
    Train,
    Bus,
    Flight,
}

impl TravelMode {
    /// Lenient parse for model output; unknown strings fall back to car.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "train" => TravelMode::Train,
            "bus" => TravelMode::Bus,
            "flight" | "plane" => TravelMode::Flight,
            _ => TravelMode::Car,
        }
    }
}

//
// ================= User =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

//
// ================= Trip =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub source_city: String,
    pub destination_city: String,
    pub source_lat: f64,
    pub source_lng: f64,
    pub dest_lat: f64,
    pub dest_lng: f64,
    pub passengers: i32,
    pub budget: f64,
    pub comfort_level: ComfortLevel,
    pub recommended_mode: TravelMode,
    pub distance_estimate_km: f64,
    pub confidence_score: f64,
    pub source_weather: String,
    pub destination_weather: String,
    pub created_at: DateTime<Utc>,
    pub conversation_id: Option<String>,
    pub recommended_places: Vec<Place>,
}

/// Trip fields known before the store assigns an id and timestamp.
#[derive(Debug, Clone)]
pub struct NewTrip {
    pub user_id: i64,
    pub username: String,
    pub source_city: String,
    pub destination_city: String,
    pub source_lat: f64,
    pub source_lng: f64,
    pub dest_lat: f64,
    pub dest_lng: f64,
    pub passengers: i32,
    pub budget: f64,
    pub comfort_level: ComfortLevel,
    pub recommended_mode: TravelMode,
    pub distance_estimate_km: f64,
    pub confidence_score: f64,
    pub source_weather: String,
    pub destination_weather: String,
    pub conversation_id: Option<String>,
    pub recommended_place_ids: Vec<i64>,
}

//
// ================= Place =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub city: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    /// False when coordinates were defaulted rather than geocoded.
    pub coordinates_known: bool,
    pub category: String,
    pub image_url: Option<String>,
    pub entry_fee: f64,
    pub recommended_duration_hours: i32,
    pub rating: f64,
    pub best_time_to_visit: Option<String>,
}

/// A model-suggested place before it is reconciled with the catalogue.
/// Optional fields only overwrite stored values when the model supplied them.
#[derive(Debug, Clone)]
pub struct PlaceDraft {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub entry_fee: Option<f64>,
    pub recommended_duration_hours: Option<i32>,
}

//
// ================= Chat =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatHistory {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub user_message: String,
    pub ai_response: String,
    pub conversation_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewChatTurn {
    pub user_id: i64,
    pub username: String,
    pub user_message: String,
    pub ai_response: String,
    pub conversation_id: String,
}

//
// ================= Weather =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherAnalysis {
    pub temperature_c: f64,
    pub wind_kph: f64,
    pub weather_code: i32,
    pub condition: String,
    pub travel_advisory: String,
    pub safety_score: f64,
    pub suitable_for_travel: bool,
    /// True when the upstream failed and this is the fixed default.
    pub degraded: bool,
}

impl WeatherAnalysis {
    /// One-line summary stored on the trip row. Degraded analyses say so,
    /// so a persisted trip shows which weather data was real.
    pub fn summary(&self) -> String {
        let base = format!(
            "Temp: {}°C, {}, Wind: {} km/h",
            self.temperature_c, self.condition, self.wind_kph
        );
        if self.degraded {
            format!("{} (weather service unavailable)", base)
        } else {
            base
        }
    }
}

//
// ================= Recommendations =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeRecommendation {
    pub mode: TravelMode,
    pub distance_km: f64,
    pub confidence: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyItinerary {
    pub day: i32,
    pub places: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceRecommendation {
    pub recommended_places: Vec<Place>,
    pub daily_itinerary: Vec<DailyItinerary>,
    pub total_cost_estimate: f64,
    pub reasoning: String,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for ComfortLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComfortLevel::Economy => "ECONOMY",
            ComfortLevel::Comfort => "COMFORT",
            ComfortLevel::Luxury => "LUXURY",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for TravelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TravelMode::Car => "car",
            TravelMode::Train => "train",
            TravelMode::Bus => "bus",
            TravelMode::Flight => "flight",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

impl std::str::FromStr for ComfortLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ECONOMY" => Ok(ComfortLevel::Economy),
            "COMFORT" => Ok(ComfortLevel::Comfort),
            "LUXURY" => Ok(ComfortLevel::Luxury),
            other => Err(format!("Unknown comfort level: {}", other)),
        }
    }
}

impl std::str::FromStr for TravelMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "car" => Ok(TravelMode::Car),
            "train" => Ok(TravelMode::Train),
            "bus" => Ok(TravelMode::Bus),
            "flight" => Ok(TravelMode::Flight),
            other => Err(format!("Unknown travel mode: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_travel_mode_lenient_parse() {
        assert_eq!(TravelMode::parse_lenient("Flight"), TravelMode::Flight);
        assert_eq!(TravelMode::parse_lenient("plane"), TravelMode::Flight);
        assert_eq!(TravelMode::parse_lenient("TRAIN"), TravelMode::Train);
        assert_eq!(TravelMode::parse_lenient("hovercraft"), TravelMode::Car);
    }

    #[test]
    fn test_weather_summary_format() {
        let analysis = WeatherAnalysis {
            temperature_c: 20.0,
            wind_kph: 10.0,
            weather_code: 0,
            condition: "Clear sky".to_string(),
            travel_advisory: "Weather conditions are good for travel".to_string(),
            safety_score: 100.0,
            suitable_for_travel: true,
            degraded: false,
        };
        assert_eq!(analysis.summary(), "Temp: 20°C, Clear sky, Wind: 10 km/h");

        let degraded = WeatherAnalysis {
            degraded: true,
            ..analysis
        };
        assert!(degraded.summary().ends_with("(weather service unavailable)"));
    }

    #[test]
    fn test_comfort_level_round_trip() {
        for level in [ComfortLevel::Economy, ComfortLevel::Comfort, ComfortLevel::Luxury] {
            let parsed: ComfortLevel = level.to_string().parse().unwrap();
            assert_eq!(parsed, level);
        }
    }
}
