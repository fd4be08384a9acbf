//! Travel mode recommender
//!
//! Asks the chat model for a mode/distance/confidence triple and adapts
//! whatever comes back. Any failure along the way lands on a budget-driven
//! heuristic, so a recommendation is always produced.

use std::sync::Arc;

use tracing::warn;

use crate::ai_adapter;
use crate::chat_model::ChatModel;
use crate::models::{ComfortLevel, ModeRecommendation, TravelMode};

/// The system prompt constrains the model to the JSON schema the adapter
/// expects; changing it is a breaking change to the adapter's inputs.
const MODE_SYSTEM_PROMPT: &str = "\
You are a practical travel planner. \
CRITICAL: Return ONLY valid JSON, no explanations.
- Use realistic distances between cities
- Consider budget and comfort level seriously
- Be concise in reasoning (max 2 sentences)
- recommendedMode: car/train/bus/flight only
- distanceEstimate: realistic km between the cities
- confidenceScore: 0.0 to 1.0";

pub struct ModeRequest<'a> {
    pub source: &'a str,
    pub destination: &'a str,
    pub passengers: i32,
    pub budget: f64,
    pub comfort_level: ComfortLevel,
    pub source_weather: &'a str,
    pub dest_weather: &'a str,
}

pub struct ModeRecommender {
    chat_model: Arc<dyn ChatModel>,
}

impl ModeRecommender {
    pub fn new(chat_model: Arc<dyn ChatModel>) -> Self {
        Self { chat_model }
    }

    pub async fn recommend(&self, request: &ModeRequest<'_>) -> ModeRecommendation {
        let prompt = build_prompt(request);

        match self.chat_model.complete(MODE_SYSTEM_PROMPT, &prompt).await {
            Ok(response) => ai_adapter::adapt_mode_response(&response),
            Err(e) => {
                warn!("Mode recommendation model call failed: {}, using heuristic", e);
                heuristic_recommendation(request.budget, request.comfort_level)
            }
        }
    }
}

fn build_prompt(request: &ModeRequest<'_>) -> String {
    format!(
        r#"[TRAVEL ANALYSIS]
FROM: {} TO: {}
PASSENGERS: {} | BUDGET: {:.2} | COMFORT: {}
WEATHER: {} (source) -> {} (destination)

RETURN ONLY VALID JSON (no other text):
{{
  "recommendedMode": "car/train/bus/flight",
  "distanceEstimate": 123.45,
  "confidenceScore": 0.85,
  "reasoning": "Brief practical explanation"
}}"#,
        request.source,
        request.destination,
        request.passengers,
        request.budget,
        request.comfort_level,
        request.source_weather,
        request.dest_weather,
    )
}

/// Budget-driven fallback used when the model path fails entirely.
pub fn heuristic_recommendation(budget: f64, comfort_level: ComfortLevel) -> ModeRecommendation {
    let (mut mode, distance_km, confidence, mut reasoning) = if budget > 5000.0 {
        (
            TravelMode::Flight,
            800.0,
            0.9,
            "Budget allows for comfortable air travel".to_string(),
        )
    } else if budget > 1500.0 {
        (
            TravelMode::Train,
            500.0,
            0.8,
            "Train offers good balance of comfort and cost".to_string(),
        )
    } else {
        (
            TravelMode::Bus,
            300.0,
            0.7,
            "Most economical option for your budget".to_string(),
        )
    };

    if comfort_level == ComfortLevel::Luxury && mode != TravelMode::Flight {
        mode = TravelMode::Train;
        reasoning.push_str(" with premium comfort options");
    }

    ModeRecommendation {
        mode,
        distance_km,
        confidence,
        reasoning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat_model::testing::{FailingModel, StaticModel};

    fn request(budget: f64, comfort_level: ComfortLevel) -> ModeRequest<'static> {
        ModeRequest {
            source: "Delhi",
            destination: "Mumbai",
            passengers: 2,
            budget,
            comfort_level,
            source_weather: "Clear sky",
            dest_weather: "Partly cloudy",
        }
    }

    #[test]
    fn test_heuristic_budget_boundaries() {
        // Strict > at both thresholds.
        let at_5000 = heuristic_recommendation(5000.0, ComfortLevel::Economy);
        assert_eq!(at_5000.mode, TravelMode::Train);
        assert_eq!(at_5000.distance_km, 500.0);

        let above_5000 = heuristic_recommendation(5000.01, ComfortLevel::Economy);
        assert_eq!(above_5000.mode, TravelMode::Flight);
        assert_eq!(above_5000.confidence, 0.9);

        let at_1500 = heuristic_recommendation(1500.0, ComfortLevel::Economy);
        assert_eq!(at_1500.mode, TravelMode::Bus);
        assert_eq!(at_1500.confidence, 0.7);
    }

    #[test]
    fn test_luxury_upgrades_bus_to_train() {
        let rec = heuristic_recommendation(1000.0, ComfortLevel::Luxury);
        assert_eq!(rec.mode, TravelMode::Train);
        assert!(rec.reasoning.contains("premium comfort"));
    }

    #[test]
    fn test_luxury_keeps_flight() {
        let rec = heuristic_recommendation(8000.0, ComfortLevel::Luxury);
        assert_eq!(rec.mode, TravelMode::Flight);
    }

    #[tokio::test]
    async fn test_model_json_path() {
        let model = Arc::new(StaticModel::new(
            r#"{"recommendedMode": "flight", "distanceEstimate": 1150, "confidenceScore": 0.92, "reasoning": "Long haul"}"#,
        ));
        let recommender = ModeRecommender::new(model);

        let rec = recommender
            .recommend(&request(8000.0, ComfortLevel::Luxury))
            .await;
        assert_eq!(rec.mode, TravelMode::Flight);
        assert_eq!(rec.distance_km, 1150.0);
        assert_eq!(rec.confidence, 0.92);
    }

    #[tokio::test]
    async fn test_model_failure_falls_back_to_heuristic() {
        let recommender = ModeRecommender::new(Arc::new(FailingModel));

        let rec = recommender
            .recommend(&request(8000.0, ComfortLevel::Luxury))
            .await;
        assert_eq!(rec.mode, TravelMode::Flight);
        assert_eq!(rec.distance_km, 800.0);
        assert_eq!(rec.confidence, 0.9);
    }

    #[tokio::test]
    async fn test_prose_reply_goes_through_text_analysis() {
        let model = Arc::new(StaticModel::new("The train is best here, roughly 450 km."));
        let recommender = ModeRecommender::new(model);

        let rec = recommender
            .recommend(&request(2000.0, ComfortLevel::Comfort))
            .await;
        assert_eq!(rec.mode, TravelMode::Train);
        assert_eq!(rec.distance_km, 450.0);
    }

    #[test]
    fn test_prompt_contains_all_inputs() {
        let prompt = build_prompt(&request(2500.0, ComfortLevel::Comfort));
        assert!(prompt.contains("Delhi"));
        assert!(prompt.contains("Mumbai"));
        assert!(prompt.contains("2500.00"));
        assert!(prompt.contains("COMFORT"));
        assert!(prompt.contains("Clear sky"));
    }
}
