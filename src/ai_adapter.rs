//! Adapter from raw chat-model text to typed records
//!
//! Models emit JSON wrapped in markdown fences, JSON with stringly-typed
//! numbers, or plain prose. This module turns any of those into the typed
//! records the recommenders need: strict JSON extraction first, keyword
//! text analysis as the fallback. Everything here is pure and deterministic
//! so canned model outputs exercise every path.

use serde_json::Value;

use crate::models::{DailyItinerary, ModeRecommendation, PlaceDraft, TravelMode};

/// Defaults used when neither JSON nor text analysis yields a field.
const DEFAULT_MODE: TravelMode = TravelMode::Car;
const DEFAULT_DISTANCE_KM: f64 = 250.0;
const DEFAULT_CONFIDENCE: f64 = 0.8;
const DEFAULT_REASONING: &str = "Based on your travel preferences";

/// Mode categories checked in order, each overwriting the previous hit,
/// so the last category present in the text wins.
const MODE_KEYWORDS: &[(&[&str], TravelMode)] = &[
    (&["train"], TravelMode::Train),
    (&["bus"], TravelMode::Bus),
    (&["flight", "plane"], TravelMode::Flight),
    (&["car", "drive"], TravelMode::Car),
];

/// Category keywords scanned when a place response is not valid JSON.
const PLACE_KEYWORDS: &[&str] = &[
    "Beach", "Fort", "Temple", "Market", "Falls", "Church", "Museum",
];

//
// ================= JSON extraction =================
//

/// Pull a JSON object out of a model reply.
///
/// Strips ```json fences, trims to the substring between the first `{` and
/// the last `}`, then parses strictly. Anything unparseable yields an empty
/// object so callers fall through to text analysis.
pub fn extract_json(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }

    let mut cleaned = raw.replace("```json", "").replace("```JSON", "");
    cleaned = cleaned.replace("```", "");
    let cleaned = cleaned.trim();

    let start = cleaned.find('{');
    let end = cleaned.rfind('}');

    if let (Some(start), Some(end)) = (start, end) {
        if end > start {
            let candidate = &cleaned[start..=end];
            if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(candidate) {
                return value;
            }
        }
    }

    Value::Object(Default::default())
}

//
// ================= Typed coercion =================
//

/// Number, or string that parses as a number, or default.
pub fn coerce_f64(value: Option<&Value>, default: f64) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

/// Integer coercion; floats truncate, numeric strings parse.
pub fn coerce_i64(value: Option<&Value>, default: i64) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(default),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(|f| f as i64))
                .unwrap_or(default)
        }
        _ => default,
    }
}

pub fn coerce_string(value: Option<&Value>, default: &str) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => default.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Every element is stringified; non-lists yield an empty vec.
pub fn coerce_string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

//
// ================= Mode recommendation =================
//

/// Project a parsed JSON object onto a mode recommendation.
///
/// `recommendedMode` is the minimum viable field; without it the caller
/// should fall back to text analysis.
pub fn mode_from_json(value: &Value) -> Option<ModeRecommendation> {
    let mode_str = value.get("recommendedMode").and_then(Value::as_str)?;

    Some(ModeRecommendation {
        mode: TravelMode::parse_lenient(mode_str),
        distance_km: coerce_f64(value.get("distanceEstimate"), DEFAULT_DISTANCE_KM),
        confidence: coerce_f64(value.get("confidenceScore"), DEFAULT_CONFIDENCE),
        reasoning: coerce_string(value.get("reasoning"), DEFAULT_REASONING),
    })
}

/// Keyword scan over prose when the model ignored the JSON instruction.
pub fn mode_from_text(raw: &str) -> ModeRecommendation {
    let lowered = raw.to_lowercase();

    let mut mode = DEFAULT_MODE;
    for (keywords, candidate) in MODE_KEYWORDS {
        if keywords.iter().any(|keyword| lowered.contains(keyword)) {
            mode = *candidate;
        }
    }

    let distance_km = first_int_before_km(raw).unwrap_or(DEFAULT_DISTANCE_KM);

    ModeRecommendation {
        mode,
        distance_km,
        confidence: DEFAULT_CONFIDENCE,
        reasoning: DEFAULT_REASONING.to_string(),
    }
}

/// Full adaptation pipeline for a mode reply: JSON first, then text.
pub fn adapt_mode_response(raw: &str) -> ModeRecommendation {
    let json = extract_json(raw);
    mode_from_json(&json).unwrap_or_else(|| mode_from_text(raw))
}

/// Distance extraction for prose replies.
///
/// Only applies when some digit run sits directly before a "km" marker;
/// the value taken is then the first digit run of the first km-delimited
/// segment that contains one, which is not necessarily the adjacent run
/// ("go 100 then 450 km" yields 100).
fn first_int_before_km(text: &str) -> Option<f64> {
    let lowered = text.to_lowercase();

    if !has_digit_adjacent_to_km(&lowered) {
        return None;
    }

    lowered
        .split("km")
        .find_map(first_digit_run)
        .and_then(|run| run.parse().ok())
}

fn has_digit_adjacent_to_km(lowered: &str) -> bool {
    let bytes = lowered.as_bytes();

    let mut search_from = 0;
    while let Some(rel) = lowered[search_from..].find("km") {
        let km_at = search_from + rel;

        // Walk back over whitespace and look for a digit.
        let mut i = km_at;
        while i > 0 && bytes[i - 1].is_ascii_whitespace() {
            i -= 1;
        }
        if i > 0 && bytes[i - 1].is_ascii_digit() {
            return true;
        }

        search_from = km_at + 2;
    }

    false
}

fn first_digit_run(segment: &str) -> Option<&str> {
    let bytes = segment.as_bytes();
    let start = bytes.iter().position(|b| b.is_ascii_digit())?;
    let len = bytes[start..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    Some(&segment[start..start + len])
}

//
// ================= Place recommendation =================
//

/// Parsed form of the place-recommendation JSON before any storage work.
#[derive(Debug, Clone)]
pub struct ParsedPlaceResponse {
    pub drafts: Vec<PlaceDraft>,
    pub itinerary: Vec<DailyItinerary>,
    pub total_cost_estimate: Option<f64>,
    pub reasoning: Option<String>,
}

/// Project a parsed JSON object onto place drafts and an itinerary.
///
/// Returns `None` when `recommendedPlaces` is absent or empty, signalling
/// the caller to try text analysis.
pub fn places_from_json(value: &Value) -> Option<ParsedPlaceResponse> {
    let raw_places = value.get("recommendedPlaces").and_then(Value::as_array)?;

    let drafts: Vec<PlaceDraft> = raw_places
        .iter()
        .filter_map(place_draft_from_value)
        .collect();

    if drafts.is_empty() {
        return None;
    }

    let itinerary = value
        .get("dailyItinerary")
        .and_then(Value::as_array)
        .map(|days| {
            days.iter()
                .filter_map(Value::as_object)
                .map(|day| DailyItinerary {
                    day: coerce_i64(day.get("day"), 1) as i32,
                    places: coerce_string_list(day.get("places")),
                    description: coerce_string(day.get("description"), "Daily itinerary"),
                })
                .collect()
        })
        .unwrap_or_default();

    let total_cost_estimate = match value.get("totalCostEstimate") {
        Some(cost) => Some(coerce_f64(Some(cost), 0.0)),
        None => None,
    };

    let reasoning = value
        .get("reasoning")
        .and_then(Value::as_str)
        .map(|s| s.to_string());

    Some(ParsedPlaceResponse {
        drafts,
        itinerary,
        total_cost_estimate,
        reasoning,
    })
}

fn place_draft_from_value(value: &Value) -> Option<PlaceDraft> {
    let obj = value.as_object()?;
    let name = obj.get("name").and_then(Value::as_str)?.trim().to_string();
    if name.is_empty() {
        return None;
    }

    Some(PlaceDraft {
        name,
        description: obj
            .get("description")
            .and_then(Value::as_str)
            .map(|s| s.to_string()),
        category: obj
            .get("category")
            .and_then(Value::as_str)
            .map(|s| s.to_string()),
        entry_fee: obj.get("estimatedCost").map(|v| coerce_f64(Some(v), 0.0)),
        recommended_duration_hours: obj
            .get("recommendedDuration")
            .map(|v| coerce_i64(Some(v), 2) as i32),
    })
}

/// Text-analysis fallback: the first category keyword found in the reply
/// becomes a single generic draft for the city.
pub fn places_from_text(raw: &str, city: &str) -> Vec<PlaceDraft> {
    let lowered = raw.to_lowercase();

    for keyword in PLACE_KEYWORDS {
        if lowered.contains(&keyword.to_lowercase()) {
            return vec![PlaceDraft {
                name: format!("{} in {}", keyword, city),
                description: Some("Extracted from AI recommendation".to_string()),
                category: Some("General".to_string()),
                entry_fee: Some(0.0),
                recommended_duration_hours: Some(2),
            }];
        }
    }

    Vec::new()
}
