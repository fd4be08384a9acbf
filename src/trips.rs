//! Trip synthesis
//!
//! Orchestrates geocoder, weather, mode and place recommenders for one trip
//! request, reconciles their results under the partial-failure policy, and
//! persists the trip together with two chat turns recording the prompts
//! used. External services can all fail; the trip is still produced.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::chat::ChatService;
use crate::error::TravelPlannerError;
use crate::geocoding::GeocodingClient;
use crate::mode::{ModeRecommender, ModeRequest};
use crate::models::{ComfortLevel, ModeRecommendation, NewTrip, PlaceRecommendation, Trip, User};
use crate::places::PlaceRecommender;
use crate::store::{TripStore, UserStore};
use crate::weather::WeatherClient;
use crate::Result;

const DEFAULT_TRIP_DURATION_DAYS: i32 = 3;

/// Validated trip request as the synthesiser consumes it.
#[derive(Debug, Clone)]
pub struct TripPlanRequest {
    pub source_city: String,
    pub destination_city: String,
    pub passengers: i32,
    pub budget: f64,
    pub comfort_level: ComfortLevel,
    pub interests: Vec<String>,
    pub trip_duration: Option<i32>,
}

pub struct TripService {
    users: Arc<dyn UserStore>,
    trips: Arc<dyn TripStore>,
    geocoding: Arc<GeocodingClient>,
    weather: Arc<WeatherClient>,
    mode: ModeRecommender,
    places: PlaceRecommender,
    chat: Arc<ChatService>,
}

impl TripService {
    pub fn new(
        users: Arc<dyn UserStore>,
        trips: Arc<dyn TripStore>,
        geocoding: Arc<GeocodingClient>,
        weather: Arc<WeatherClient>,
        mode: ModeRecommender,
        places: PlaceRecommender,
        chat: Arc<ChatService>,
    ) -> Self {
        Self {
            users,
            trips,
            geocoding,
            weather,
            mode,
            places,
            chat,
        }
    }

    pub async fn create_trip(&self, request: TripPlanRequest, username: &str) -> Result<Trip> {
        validate(&request)?;
        let user = self.resolve_user(username).await?;

        info!(
            "Creating trip for user: {} from {} to {}",
            username, request.source_city, request.destination_city
        );

        let (source_coords, dest_coords) = tokio::join!(
            self.geocoding.coordinates(&request.source_city),
            self.geocoding.coordinates(&request.destination_city),
        );

        let (source_weather, dest_weather) = tokio::join!(
            self.weather.analysis(source_coords.lat, source_coords.lng),
            self.weather.analysis(dest_coords.lat, dest_coords.lng),
        );

        let duration = request
            .trip_duration
            .unwrap_or(DEFAULT_TRIP_DURATION_DAYS)
            .max(1);
        let companions = format!("{} passengers", request.passengers);

        let mode_request = ModeRequest {
            source: &request.source_city,
            destination: &request.destination_city,
            passengers: request.passengers,
            budget: request.budget,
            comfort_level: request.comfort_level,
            source_weather: &source_weather.condition,
            dest_weather: &dest_weather.condition,
        };

        let (mode_rec, place_rec) = tokio::join!(
            self.mode.recommend(&mode_request),
            self.places.recommend(
                &request.destination_city,
                &request.interests,
                duration,
                request.budget,
                &companions,
            ),
        );
        let place_rec = place_rec?;

        // Opaque but sortable: later trips mint later ids.
        let conversation_id = format!("trip_{}", Utc::now().timestamp_millis());

        let planning_message = build_trip_planning_message(
            &request,
            &source_weather.condition,
            source_weather.temperature_c,
            &dest_weather.condition,
            dest_weather.temperature_c,
            &mode_rec,
        );
        self.chat
            .record_exchange(&planning_message, &mode_rec.reasoning, username, &conversation_id)
            .await?;

        let place_prompt = build_place_recommendation_message(&request, duration);
        let place_summary = place_response_summary(&place_rec);
        self.chat
            .record_exchange(&place_prompt, &place_summary, username, &conversation_id)
            .await?;

        let trip = self
            .trips
            .insert_trip(NewTrip {
                user_id: user.id,
                username: user.username,
                source_city: request.source_city,
                destination_city: request.destination_city,
                source_lat: source_coords.lat,
                source_lng: source_coords.lng,
                dest_lat: dest_coords.lat,
                dest_lng: dest_coords.lng,
                passengers: request.passengers,
                budget: request.budget,
                comfort_level: request.comfort_level,
                recommended_mode: mode_rec.mode,
                distance_estimate_km: mode_rec.distance_km,
                confidence_score: mode_rec.confidence,
                source_weather: source_weather.summary(),
                destination_weather: dest_weather.summary(),
                conversation_id: Some(conversation_id.clone()),
                recommended_place_ids: place_rec
                    .recommended_places
                    .iter()
                    .map(|p| p.id)
                    .collect(),
            })
            .await?;

        info!(
            "Trip created successfully with ID: {} and conversation: {}",
            trip.id, conversation_id
        );

        Ok(trip)
    }

    pub async fn user_trips(&self, username: &str) -> Result<Vec<Trip>> {
        self.trips.trips_for_username(username).await
    }

    pub async fn user_trip(&self, trip_id: i64, username: &str) -> Result<Trip> {
        let trip = self
            .trips
            .trip_by_id(trip_id)
            .await?
            .ok_or_else(|| TravelPlannerError::NotFound(format!("Trip not found: {}", trip_id)))?;

        if trip.username != username {
            return Err(TravelPlannerError::Forbidden(
                "Trip belongs to another user".to_string(),
            ));
        }

        Ok(trip)
    }

    async fn resolve_user(&self, username: &str) -> Result<User> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or_else(|| TravelPlannerError::Unauthorized(format!("User not found: {}", username)))
    }
}

fn validate(request: &TripPlanRequest) -> Result<()> {
    if request.source_city.trim().is_empty() {
        return Err(TravelPlannerError::ValidationError(
            "Source city is required".to_string(),
        ));
    }
    if request.destination_city.trim().is_empty() {
        return Err(TravelPlannerError::ValidationError(
            "Destination city is required".to_string(),
        ));
    }
    if request.passengers < 1 {
        return Err(TravelPlannerError::ValidationError(
            "At least 1 passenger is required".to_string(),
        ));
    }
    if request.budget < 0.0 || !request.budget.is_finite() {
        return Err(TravelPlannerError::ValidationError(
            "Budget cannot be negative".to_string(),
        ));
    }
    Ok(())
}

fn build_trip_planning_message(
    request: &TripPlanRequest,
    source_condition: &str,
    source_temp: f64,
    dest_condition: &str,
    dest_temp: f64,
    mode_rec: &ModeRecommendation,
) -> String {
    format!(
        "Plan a trip from {} to {}:\n\
         - Passengers: {}\n\
         - Budget: ${:.2}\n\
         - Comfort Level: {}\n\
         - Source Weather: {} ({:.1}°C)\n\
         - Destination Weather: {} ({:.1}°C)\n\
         - Recommended Mode: {}\n\
         - Distance: {:.1} km",
        request.source_city,
        request.destination_city,
        request.passengers,
        request.budget,
        request.comfort_level,
        source_condition,
        source_temp,
        dest_condition,
        dest_temp,
        mode_rec.mode,
        mode_rec.distance_km,
    )
}

fn build_place_recommendation_message(request: &TripPlanRequest, duration: i32) -> String {
    let interests = if request.interests.is_empty() {
        "general".to_string()
    } else {
        request.interests.join(", ")
    };

    format!(
        "Recommend specific places to visit in {} for:\n\
         - Interests: {}\n\
         - Duration: {} days\n\
         - Budget: ${:.2}\n\
         - Travelers: {} passengers\n\
         Provide specific place names, daily itinerary, and cost estimates.",
        request.destination_city, interests, duration, request.budget, request.passengers,
    )
}

fn place_response_summary(place_rec: &PlaceRecommendation) -> String {
    let mut summary = place_rec.reasoning.clone();
    for day in &place_rec.daily_itinerary {
        summary.push_str(&format!(
            "\nDay {}: {} - {}",
            day.day,
            day.places.join(", "),
            day.description
        ));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat_model::testing::{FailingModel, StaticModel};
    use crate::models::{NewUser, Role};
    use crate::store::{ChatStore, MemoryStore, PlaceStore};

    const MODE_JSON: &str =
        r#"{"recommendedMode": "flight", "distanceEstimate": 1150, "confidenceScore": 0.92, "reasoning": "Fast and within budget"}"#;

    const PLACES_JSON: &str = r#"{
        "recommendedPlaces": [
            {"name": "Gateway of India", "description": "Harbour arch", "category": "Historical",
             "estimatedCost": 0, "recommendedDuration": 2}
        ],
        "dailyItinerary": [{"day": 1, "places": ["Gateway of India"], "description": "South Mumbai"}],
        "totalCostEstimate": 0.0,
        "reasoning": "Classic first visit"
    }"#;

    fn offline_geocoder() -> Arc<GeocodingClient> {
        Arc::new(GeocodingClient::new("http://127.0.0.1:9/search".to_string()))
    }

    fn offline_weather() -> Arc<WeatherClient> {
        Arc::new(WeatherClient::new("http://127.0.0.1:9/v1/forecast".to_string()))
    }

    async fn store_with_user(username: &str) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_user(NewUser {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password_hash: "hash".to_string(),
                role: Role::User,
            })
            .await
            .unwrap();
        store
    }

    fn service_with_models(
        store: Arc<MemoryStore>,
        mode_model: Arc<dyn crate::chat_model::ChatModel>,
        place_model: Arc<dyn crate::chat_model::ChatModel>,
        chat_model: Arc<dyn crate::chat_model::ChatModel>,
    ) -> TripService {
        let chat = Arc::new(ChatService::new(store.clone(), store.clone(), chat_model));
        TripService::new(
            store.clone(),
            store.clone(),
            offline_geocoder(),
            offline_weather(),
            ModeRecommender::new(mode_model),
            PlaceRecommender::new(place_model, store),
            chat,
        )
    }

    fn request(budget: f64, comfort_level: ComfortLevel) -> TripPlanRequest {
        TripPlanRequest {
            source_city: "Delhi".to_string(),
            destination_city: "Mumbai".to_string(),
            passengers: 2,
            budget,
            comfort_level,
            interests: vec!["historical".to_string()],
            trip_duration: Some(2),
        }
    }

    #[tokio::test]
    async fn test_trip_with_healthy_model() {
        let store = store_with_user("alice").await;
        let service = service_with_models(
            store.clone(),
            Arc::new(StaticModel::new(MODE_JSON)),
            Arc::new(StaticModel::new(PLACES_JSON)),
            Arc::new(StaticModel::new("ok")),
        );

        let trip = service
            .create_trip(request(8000.0, ComfortLevel::Luxury), "alice")
            .await
            .unwrap();

        assert_eq!(trip.recommended_mode, crate::models::TravelMode::Flight);
        assert!(trip.confidence_score >= 0.8);
        assert!(!trip.recommended_places.is_empty());

        // Two chat rows share the returned conversation id.
        let conversation_id = trip.conversation_id.clone().unwrap();
        assert!(conversation_id.starts_with("trip_"));
        let turns = store
            .turns_for_conversation(&conversation_id)
            .await
            .unwrap();
        assert_eq!(turns.len(), 2);
        assert!(turns[0].user_message.starts_with("Plan a trip from Delhi to Mumbai"));
        assert_eq!(turns[0].ai_response, "Fast and within budget");
        assert!(turns[1].user_message.starts_with("Recommend specific places"));
        assert!(turns[1].ai_response.contains("Classic first visit"));
    }

    #[tokio::test]
    async fn test_trip_survives_total_upstream_outage() {
        let store = store_with_user("bob").await;
        let service = service_with_models(
            store.clone(),
            Arc::new(FailingModel),
            Arc::new(FailingModel),
            Arc::new(FailingModel),
        );

        let trip = service
            .create_trip(request(8000.0, ComfortLevel::Luxury), "bob")
            .await
            .unwrap();

        // Heuristic mode, hash-derived coordinates, defaulted weather.
        assert_eq!(trip.recommended_mode, crate::models::TravelMode::Flight);
        assert_eq!(trip.distance_estimate_km, 800.0);
        assert!(trip.source_lat.is_finite() && trip.dest_lat.is_finite());
        assert!(trip.source_weather.contains("Clear sky"));
        assert!(trip.source_weather.contains("service unavailable"));
        assert!(trip.destination_weather.contains("service unavailable"));

        let again = service
            .create_trip(request(8000.0, ComfortLevel::Luxury), "bob")
            .await
            .unwrap();
        assert_eq!(trip.source_lat, again.source_lat);
        assert_eq!(trip.dest_lng, again.dest_lng);
    }

    #[tokio::test]
    async fn test_unknown_user_is_unauthorized() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with_models(
            store.clone(),
            Arc::new(FailingModel),
            Arc::new(FailingModel),
            Arc::new(FailingModel),
        );

        let result = service
            .create_trip(request(1000.0, ComfortLevel::Economy), "ghost")
            .await;
        assert!(matches!(result, Err(TravelPlannerError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_validation_rejects_bad_input() {
        let store = store_with_user("carol").await;
        let service = service_with_models(
            store.clone(),
            Arc::new(FailingModel),
            Arc::new(FailingModel),
            Arc::new(FailingModel),
        );

        let mut bad = request(1000.0, ComfortLevel::Economy);
        bad.source_city = "  ".to_string();
        assert!(matches!(
            service.create_trip(bad, "carol").await,
            Err(TravelPlannerError::ValidationError(_))
        ));

        let mut bad = request(1000.0, ComfortLevel::Economy);
        bad.passengers = 0;
        assert!(matches!(
            service.create_trip(bad, "carol").await,
            Err(TravelPlannerError::ValidationError(_))
        ));

        let mut bad = request(-5.0, ComfortLevel::Economy);
        bad.budget = -5.0;
        assert!(matches!(
            service.create_trip(bad, "carol").await,
            Err(TravelPlannerError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_owner_check_on_single_trip() {
        let store = store_with_user("dana").await;
        store
            .insert_user(NewUser {
                username: "eve".to_string(),
                email: "eve@example.com".to_string(),
                password_hash: "hash".to_string(),
                role: Role::User,
            })
            .await
            .unwrap();

        let service = service_with_models(
            store.clone(),
            Arc::new(StaticModel::new(MODE_JSON)),
            Arc::new(StaticModel::new(PLACES_JSON)),
            Arc::new(StaticModel::new("ok")),
        );

        let trip = service
            .create_trip(request(2000.0, ComfortLevel::Comfort), "dana")
            .await
            .unwrap();

        assert!(service.user_trip(trip.id, "dana").await.is_ok());
        assert!(matches!(
            service.user_trip(trip.id, "eve").await,
            Err(TravelPlannerError::Forbidden(_))
        ));
        assert!(matches!(
            service.user_trip(999_999, "dana").await,
            Err(TravelPlannerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_trip_places_are_upserted_catalogue_rows() {
        let store = store_with_user("frank").await;
        let service = service_with_models(
            store.clone(),
            Arc::new(StaticModel::new(MODE_JSON)),
            Arc::new(StaticModel::new(PLACES_JSON)),
            Arc::new(StaticModel::new("ok")),
        );

        let trip = service
            .create_trip(request(2000.0, ComfortLevel::Comfort), "frank")
            .await
            .unwrap();

        let catalogue = store.places_by_city("Mumbai").await.unwrap();
        assert_eq!(catalogue.len(), 1);
        assert_eq!(trip.recommended_places[0].id, catalogue[0].id);
    }
}
