//! Place recommender
//!
//! Asks the chat model for places and a day-by-day itinerary for the
//! destination, then reconciles every suggestion with the shared catalogue
//! via a transactional upsert. Falls back to text analysis and finally to
//! the stored top-rated places, so a recommendation always comes back.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::warn;

use crate::ai_adapter;
use crate::chat_model::ChatModel;
use crate::models::{Place, PlaceDraft, PlaceRecommendation};
use crate::store::PlaceStore;
use crate::Result;

const TOP_RATED_THRESHOLD: f64 = 4.0;
const PLACES_PER_DAY: usize = 3;
const DEFAULT_COUNTRY: &str = "India";

/// The system prompt constrains the model to the JSON schema the adapter
/// expects; changing it is a breaking change to the adapter's inputs.
const PLACES_SYSTEM_PROMPT: &str = "\
You are a practical travel expert.
CRITICAL: Return ONLY valid JSON, no other text or markdown.
IMPORTANT FORMAT RULES:
- JSON must start with { and end with }
- No ```json or ``` markers
- No additional explanations
- Use double quotes for all strings
- estimatedCost must be numbers (not strings)
- recommendedDuration must be integers

Content guidelines:
- Suggest realistic, popular places
- Keep descriptions brief and useful (max 20 words)
- recommendedDuration: realistic hours needed
- estimatedCost: realistic entry fees
- Be specific with place names";

pub struct PlaceRecommender {
    chat_model: Arc<dyn ChatModel>,
    store: Arc<dyn PlaceStore>,
}

impl PlaceRecommender {
    pub fn new(chat_model: Arc<dyn ChatModel>, store: Arc<dyn PlaceStore>) -> Self {
        Self { chat_model, store }
    }

    pub async fn recommend(
        &self,
        city: &str,
        interests: &[String],
        duration_days: i32,
        budget: f64,
        companions: &str,
    ) -> Result<PlaceRecommendation> {
        let duration_days = duration_days.max(1);
        let existing = self.store.places_by_city(city).await?;
        let prompt = build_prompt(city, interests, duration_days, budget, companions, &existing);

        let response = match self.chat_model.complete(PLACES_SYSTEM_PROMPT, &prompt).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Place recommendation model call failed: {}, using top-rated", e);
                return self.top_rated_fallback(city).await;
            }
        };

        let json = ai_adapter::extract_json(&response);

        if let Some(parsed) = ai_adapter::places_from_json(&json) {
            return self
                .persist_recommendation(city, duration_days, parsed)
                .await;
        }

        // The model ignored the JSON instruction; scan the prose.
        let drafts = ai_adapter::places_from_text(&response, city);
        if drafts.is_empty() {
            return self.top_rated_fallback(city).await;
        }

        let places = self
            .store
            .upsert_places(city, DEFAULT_COUNTRY, drafts)
            .await?;
        let total_cost_estimate = entry_fee_sum(&places);

        Ok(PlaceRecommendation {
            recommended_places: places,
            daily_itinerary: Vec::new(),
            total_cost_estimate,
            reasoning: "AI-curated based on your preferences (text analysis)".to_string(),
        })
    }

    async fn persist_recommendation(
        &self,
        city: &str,
        duration_days: i32,
        parsed: ai_adapter::ParsedPlaceResponse,
    ) -> Result<PlaceRecommendation> {
        let drafts = cap_to_duration(dedup_by_name(parsed.drafts), duration_days);

        let places = self
            .store
            .upsert_places(city, DEFAULT_COUNTRY, drafts)
            .await?;

        let daily_itinerary = parsed
            .itinerary
            .into_iter()
            .filter(|day| day.day >= 1 && day.day <= duration_days)
            .collect();

        let total_cost_estimate = parsed
            .total_cost_estimate
            .unwrap_or_else(|| entry_fee_sum(&places));

        let reasoning = parsed
            .reasoning
            .unwrap_or_else(|| format!("AI-curated itinerary for {}", city));

        Ok(PlaceRecommendation {
            recommended_places: places,
            daily_itinerary,
            total_cost_estimate,
            reasoning,
        })
    }

    async fn top_rated_fallback(&self, city: &str) -> Result<PlaceRecommendation> {
        let places = self
            .store
            .top_rated_in_city(city, TOP_RATED_THRESHOLD)
            .await?;
        let total_cost_estimate = entry_fee_sum(&places);

        Ok(PlaceRecommendation {
            recommended_places: places,
            daily_itinerary: Vec::new(),
            total_cost_estimate,
            reasoning: format!("Top-rated places in {}", city),
        })
    }
}

/// Keep the first occurrence of each name; models repeat themselves.
fn dedup_by_name(drafts: Vec<PlaceDraft>) -> Vec<PlaceDraft> {
    let mut seen = HashSet::new();
    drafts
        .into_iter()
        .filter(|draft| seen.insert(draft.name.to_lowercase()))
        .collect()
}

/// First N suggestions in emission order, N = capacity of the stay.
fn cap_to_duration(mut drafts: Vec<PlaceDraft>, duration_days: i32) -> Vec<PlaceDraft> {
    let capacity = duration_days as usize * PLACES_PER_DAY;
    drafts.truncate(capacity);
    drafts
}

fn entry_fee_sum(places: &[Place]) -> f64 {
    places.iter().map(|p| p.entry_fee).sum()
}

fn build_prompt(
    city: &str,
    interests: &[String],
    duration_days: i32,
    budget: f64,
    companions: &str,
    existing: &[Place],
) -> String {
    let interests = if interests.is_empty() {
        "general sightseeing".to_string()
    } else {
        interests.join(", ")
    };

    let context = if existing.is_empty() {
        "No places in database yet. Suggest popular attractions.".to_string()
    } else {
        existing
            .iter()
            .map(|place| {
                format!(
                    "- {} ({}): {:.2} entry, {} hours, Rating: {:.1}/5",
                    place.name,
                    place.category,
                    place.entry_fee,
                    place.recommended_duration_hours,
                    place.rating
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"[TRAVEL GUIDE FOR {}]
INTERESTS: {} | DURATION: {} days | BUDGET: {:.2} | COMPANIONS: {}

CONTEXT: {}

RETURN ONLY VALID JSON (no other text):
{{
  "recommendedPlaces": [
    {{
      "name": "Specific Place Name",
      "description": "Brief practical description",
      "category": "Historical/Nature/Beach/Shopping/Food/Nightlife/Relaxation/Adventure/Religious",
      "estimatedCost": 100.00,
      "recommendedDuration": 2
    }}
  ],
  "dailyItinerary": [
    {{
      "day": 1,
      "places": ["Place A", "Place B"],
      "description": "Practical day plan"
    }}
  ],
  "totalCostEstimate": 500.00,
  "reasoning": "Concise matching explanation"
}}"#,
        city, interests, duration_days, budget, companions, context
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat_model::testing::{FailingModel, StaticModel};
    use crate::store::MemoryStore;

    const MUMBAI_JSON: &str = r#"{
        "recommendedPlaces": [
            {"name": "Gateway of India", "description": "Harbour arch", "category": "Historical",
             "estimatedCost": 0, "recommendedDuration": 2},
            {"name": "Juhu Beach", "description": "City beach", "category": "Beach",
             "estimatedCost": 50, "recommendedDuration": 3},
            {"name": "gateway of india", "description": "duplicate", "category": "Historical"}
        ],
        "dailyItinerary": [
            {"day": 1, "places": ["Gateway of India"], "description": "South Mumbai"},
            {"day": 2, "places": ["Juhu Beach"], "description": "Coast"},
            {"day": 5, "places": ["Overflow"], "description": "Beyond the stay"}
        ],
        "totalCostEstimate": 50.0,
        "reasoning": "Classic first visit"
    }"#;

    fn recommender_with(
        reply: &str,
        store: Arc<MemoryStore>,
    ) -> PlaceRecommender {
        PlaceRecommender::new(Arc::new(StaticModel::new(reply)), store)
    }

    #[tokio::test]
    async fn test_json_path_persists_and_dedups() {
        let store = Arc::new(MemoryStore::new());
        let recommender = recommender_with(MUMBAI_JSON, store.clone());

        let rec = recommender
            .recommend("Mumbai", &[], 2, 5000.0, "2 passengers")
            .await
            .unwrap();

        assert_eq!(rec.recommended_places.len(), 2);
        assert_eq!(rec.total_cost_estimate, 50.0);
        assert_eq!(rec.reasoning, "Classic first visit");

        // Itinerary days beyond the stay are discarded.
        assert_eq!(rec.daily_itinerary.len(), 2);

        let stored = store.places_by_city("Mumbai").await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|p| !p.coordinates_known));
        assert!(stored.iter().all(|p| p.rating == 4.0));
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let recommender = recommender_with(MUMBAI_JSON, store.clone());

        let first = recommender
            .recommend("Mumbai", &[], 3, 5000.0, "solo")
            .await
            .unwrap();
        let second = recommender
            .recommend("Mumbai", &[], 3, 5000.0, "solo")
            .await
            .unwrap();

        let first_ids: Vec<i64> = first.recommended_places.iter().map(|p| p.id).collect();
        let second_ids: Vec<i64> = second.recommended_places.iter().map(|p| p.id).collect();
        assert_eq!(first_ids, second_ids);
        assert_eq!(store.places_by_city("Mumbai").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_prose_reply_uses_text_analysis() {
        let store = Arc::new(MemoryStore::new());
        let recommender = recommender_with(
            "You should definitely see the beach and the night market.",
            store.clone(),
        );

        let rec = recommender
            .recommend("Goa", &[], 3, 2000.0, "couple")
            .await
            .unwrap();

        assert_eq!(rec.recommended_places.len(), 1);
        assert_eq!(rec.recommended_places[0].name, "Beach in Goa");
        assert!(rec.reasoning.contains("text analysis"));
    }

    #[tokio::test]
    async fn test_model_failure_returns_top_rated() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_places(
                "Pune",
                "India",
                vec![PlaceDraft {
                    name: "Shaniwar Wada".to_string(),
                    description: Some("Fort".to_string()),
                    category: Some("Historical".to_string()),
                    entry_fee: Some(25.0),
                    recommended_duration_hours: Some(2),
                }],
            )
            .await
            .unwrap();

        let recommender = PlaceRecommender::new(Arc::new(FailingModel), store);
        let rec = recommender
            .recommend("Pune", &[], 2, 1000.0, "family")
            .await
            .unwrap();

        assert_eq!(rec.recommended_places.len(), 1);
        assert_eq!(rec.reasoning, "Top-rated places in Pune");
        assert_eq!(rec.total_cost_estimate, 25.0);
    }

    #[tokio::test]
    async fn test_unusable_reply_with_empty_catalogue() {
        let store = Arc::new(MemoryStore::new());
        let recommender = recommender_with("nothing recognisable at all", store);

        let rec = recommender
            .recommend("Atlantis", &[], 2, 1000.0, "solo")
            .await
            .unwrap();
        assert!(rec.recommended_places.is_empty());
        assert_eq!(rec.reasoning, "Top-rated places in Atlantis");
    }

    #[test]
    fn test_cap_to_duration() {
        let drafts: Vec<PlaceDraft> = (0..10)
            .map(|i| PlaceDraft {
                name: format!("Place {}", i),
                description: None,
                category: None,
                entry_fee: None,
                recommended_duration_hours: None,
            })
            .collect();

        assert_eq!(cap_to_duration(drafts.clone(), 2).len(), 6);
        assert_eq!(cap_to_duration(drafts, 4).len(), 10);
    }

    #[test]
    fn test_prompt_mentions_existing_catalogue() {
        let place = Place {
            id: 1,
            name: "Gateway of India".to_string(),
            description: "Harbour arch".to_string(),
            city: "Mumbai".to_string(),
            country: "India".to_string(),
            latitude: 0.0,
            longitude: 0.0,
            coordinates_known: false,
            category: "Historical".to_string(),
            image_url: None,
            entry_fee: 0.0,
            recommended_duration_hours: 2,
            rating: 4.5,
            best_time_to_visit: None,
        };

        let prompt = build_prompt("Mumbai", &[], 3, 5000.0, "solo", &[place]);
        assert!(prompt.contains("Gateway of India"));

        let empty = build_prompt("Mumbai", &[], 3, 5000.0, "solo", &[]);
        assert!(empty.contains("No places in database yet"));
    }
}
