//! Request and response documents for the HTTP surface
//!
//! Wire names are camelCase; entities are projected here so internals like
//! password hashes and store ids never leak by accident.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::admin::ConversationStats;
use crate::error::TravelPlannerError;
use crate::models::{ChatHistory, DailyItinerary, Place, PlaceRecommendation, Trip, User};
use crate::trips::TripPlanRequest;
use crate::Result;

//
// ================= Auth =================
//

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminRegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub admin_secret_code: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role.to_string(),
            created_at: user.created_at,
        }
    }
}

//
// ================= Trips =================
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripRequest {
    pub source_city: String,
    pub destination_city: String,
    pub passengers: i32,
    pub budget: f64,
    pub comfort_level: String,
    #[serde(default)]
    pub interests: Vec<String>,
    pub trip_duration: Option<i32>,
}

impl TripRequest {
    /// Parse the enum field up front so bad values surface as a 400 with a
    /// field-specific message rather than a deserialization failure.
    pub fn into_plan_request(self) -> Result<TripPlanRequest> {
        let comfort_level = self.comfort_level.parse().map_err(|_| {
            TravelPlannerError::ValidationError(format!(
                "Unknown comfort level: {}",
                self.comfort_level
            ))
        })?;

        Ok(TripPlanRequest {
            source_city: self.source_city,
            destination_city: self.destination_city,
            passengers: self.passengers,
            budget: self.budget,
            comfort_level,
            interests: self.interests,
            trip_duration: self.trip_duration,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripResponse {
    pub id: i64,
    pub username: String,
    pub source_city: String,
    pub destination_city: String,
    pub source_lat: f64,
    pub source_lng: f64,
    pub dest_lat: f64,
    pub dest_lng: f64,
    pub passengers: i32,
    pub budget: f64,
    pub comfort_level: String,
    pub recommended_mode: String,
    pub distance_estimate: f64,
    pub confidence_score: f64,
    pub source_weather: String,
    pub destination_weather: String,
    pub created_at: DateTime<Utc>,
    pub conversation_id: Option<String>,
    pub has_chat_history: bool,
    pub recommended_places: Vec<PlaceSummary>,
}

impl From<&Trip> for TripResponse {
    fn from(trip: &Trip) -> Self {
        Self {
            id: trip.id,
            username: trip.username.clone(),
            source_city: trip.source_city.clone(),
            destination_city: trip.destination_city.clone(),
            source_lat: trip.source_lat,
            source_lng: trip.source_lng,
            dest_lat: trip.dest_lat,
            dest_lng: trip.dest_lng,
            passengers: trip.passengers,
            budget: trip.budget,
            comfort_level: trip.comfort_level.to_string(),
            recommended_mode: trip.recommended_mode.to_string(),
            distance_estimate: trip.distance_estimate_km,
            confidence_score: trip.confidence_score,
            source_weather: trip.source_weather.clone(),
            destination_weather: trip.destination_weather.clone(),
            created_at: trip.created_at,
            conversation_id: trip.conversation_id.clone(),
            has_chat_history: trip.conversation_id.is_some(),
            recommended_places: trip.recommended_places.iter().map(PlaceSummary::from).collect(),
        }
    }
}

//
// ================= Places =================
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceSummary {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub city: String,
    pub category: String,
    pub entry_fee: f64,
    pub recommended_duration: i32,
    pub rating: f64,
    pub coordinates_known: bool,
}

impl From<&Place> for PlaceSummary {
    fn from(place: &Place) -> Self {
        Self {
            id: place.id,
            name: place.name.clone(),
            description: place.description.clone(),
            city: place.city.clone(),
            category: place.category.clone(),
            entry_fee: place.entry_fee,
            recommended_duration: place.recommended_duration_hours,
            rating: place.rating,
            coordinates_known: place.coordinates_known,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AiRecommendationQuery {
    pub city: String,
    /// Comma-separated list, e.g. `historical,food`.
    pub interests: Option<String>,
    pub duration: Option<i32>,
    pub budget: Option<f64>,
    pub companions: Option<String>,
}

impl AiRecommendationQuery {
    pub fn interests_list(&self) -> Vec<String> {
        self.interests
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyItineraryEntry {
    pub day: i32,
    pub places: Vec<String>,
    pub description: String,
}

impl From<&DailyItinerary> for DailyItineraryEntry {
    fn from(day: &DailyItinerary) -> Self {
        Self {
            day: day.day,
            places: day.places.clone(),
            description: day.description.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceRecommendationResponse {
    pub recommended_places: Vec<PlaceSummary>,
    pub daily_itinerary: Vec<DailyItineraryEntry>,
    pub total_cost_estimate: f64,
    pub reasoning: String,
}

impl From<&PlaceRecommendation> for PlaceRecommendationResponse {
    fn from(rec: &PlaceRecommendation) -> Self {
        Self {
            recommended_places: rec.recommended_places.iter().map(PlaceSummary::from).collect(),
            daily_itinerary: rec.daily_itinerary.iter().map(DailyItineraryEntry::from).collect(),
            total_cost_estimate: rec.total_cost_estimate,
            reasoning: rec.reasoning.clone(),
        }
    }
}

//
// ================= Chat =================
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub id: i64,
    pub username: String,
    pub user_message: String,
    pub ai_response: String,
    pub conversation_id: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&ChatHistory> for ChatTurn {
    fn from(turn: &ChatHistory) -> Self {
        Self {
            id: turn.id,
            username: turn.username.clone(),
            user_message: turn.user_message.clone(),
            ai_response: turn.ai_response.clone(),
            conversation_id: turn.conversation_id.clone(),
            timestamp: turn.timestamp,
        }
    }
}

//
// ================= Admin =================
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedUserResponse {
    pub message: String,
    pub deleted_user_id: i64,
}

#[derive(Debug, Serialize)]
pub struct ConversationDeleteResponse {
    pub stats: ConversationStatsResponse,
    pub deleted: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationStatsResponse {
    pub conversation_id: String,
    pub username: String,
    pub message_count: usize,
    pub first_message: DateTime<Utc>,
    pub last_message: DateTime<Utc>,
}

impl From<&ConversationStats> for ConversationStatsResponse {
    fn from(stats: &ConversationStats) -> Self {
        Self {
            conversation_id: stats.conversation_id.clone(),
            username: stats.username.clone(),
            message_count: stats.message_count,
            first_message: stats.first_message,
            last_message: stats.last_message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ComfortLevel;

    #[test]
    fn test_trip_request_parses_comfort_level() {
        let request = TripRequest {
            source_city: "Delhi".to_string(),
            destination_city: "Mumbai".to_string(),
            passengers: 2,
            budget: 8000.0,
            comfort_level: "LUXURY".to_string(),
            interests: vec![],
            trip_duration: None,
        };

        let plan = request.into_plan_request().unwrap();
        assert_eq!(plan.comfort_level, ComfortLevel::Luxury);
    }

    #[test]
    fn test_trip_request_rejects_unknown_comfort_level() {
        let request = TripRequest {
            source_city: "Delhi".to_string(),
            destination_city: "Mumbai".to_string(),
            passengers: 2,
            budget: 8000.0,
            comfort_level: "FIRST_CLASS".to_string(),
            interests: vec![],
            trip_duration: None,
        };

        assert!(matches!(
            request.into_plan_request(),
            Err(TravelPlannerError::ValidationError(_))
        ));
    }

    #[test]
    fn test_interests_query_parsing() {
        let query = AiRecommendationQuery {
            city: "Goa".to_string(),
            interests: Some("beach, food,,nightlife ".to_string()),
            duration: None,
            budget: None,
            companions: None,
        };
        assert_eq!(query.interests_list(), vec!["beach", "food", "nightlife"]);

        let empty = AiRecommendationQuery {
            city: "Goa".to_string(),
            interests: None,
            duration: None,
            budget: None,
            companions: None,
        };
        assert!(empty.interests_list().is_empty());
    }

    #[test]
    fn test_trip_request_wire_names() {
        let json = r#"{
            "sourceCity": "Delhi",
            "destinationCity": "Mumbai",
            "passengers": 2,
            "budget": 8000,
            "comfortLevel": "LUXURY",
            "tripDuration": 4
        }"#;

        let request: TripRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.source_city, "Delhi");
        assert_eq!(request.trip_duration, Some(4));
        assert!(request.interests.is_empty());
    }
}
