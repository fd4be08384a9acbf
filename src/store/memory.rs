//! In-memory store for tests
//!
//! Implements every persistence port over HashMaps behind one RwLock so
//! service tests run without a database. Ids are handed out from the same
//! monotonic counter scheme the relational store uses.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use tokio::sync::RwLock;

use crate::models::{
    ChatHistory, NewChatTurn, NewTrip, NewUser, Place, PlaceDraft, Trip, User,
};
use crate::store::{ChatStore, PlaceStore, TripStore, UserStore};
use crate::Result;

#[derive(Default)]
struct Inner {
    users: HashMap<i64, User>,
    // Trips store their place ids; entities are resolved on read so updates
    // to the catalogue are visible, mirroring the relational join table.
    trips: HashMap<i64, (Trip, Vec<i64>)>,
    places: HashMap<i64, Place>,
    chats: Vec<ChatHistory>,
}

pub struct MemoryStore {
    inner: RwLock<Inner>,
    next_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            next_id: AtomicI64::new(1),
        }
    }

    fn mint_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_trip(trip: &Trip, place_ids: &[i64], places: &HashMap<i64, Place>) -> Trip {
    let mut resolved = trip.clone();
    resolved.recommended_places = place_ids
        .iter()
        .filter_map(|id| places.get(id).cloned())
        .collect();
    resolved
}

#[async_trait::async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let id = self.mint_id();
        let stored = User {
            id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: Utc::now(),
        };

        let mut inner = self.inner.write().await;
        inner.users.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(&id).cloned())
    }

    async fn username_exists(&self, username: &str) -> Result<bool> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().any(|u| u.username == username))
    }

    async fn email_exists(&self, email: &str) -> Result<bool> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().any(|u| u.email == email))
    }

    async fn all_users(&self) -> Result<Vec<User>> {
        let inner = self.inner.read().await;
        let mut users: Vec<User> = inner.users.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn delete_user(&self, id: i64) -> Result<bool> {
        let mut inner = self.inner.write().await;
        if inner.users.remove(&id).is_none() {
            return Ok(false);
        }
        inner.trips.retain(|_, (trip, _)| trip.user_id != id);
        inner.chats.retain(|chat| chat.user_id != id);
        Ok(true)
    }
}

#[async_trait::async_trait]
impl TripStore for MemoryStore {
    async fn insert_trip(&self, trip: NewTrip) -> Result<Trip> {
        let id = self.mint_id();
        let place_ids = trip.recommended_place_ids.clone();
        let stored = Trip {
            id,
            user_id: trip.user_id,
            username: trip.username,
            source_city: trip.source_city,
            destination_city: trip.destination_city,
            source_lat: trip.source_lat,
            source_lng: trip.source_lng,
            dest_lat: trip.dest_lat,
            dest_lng: trip.dest_lng,
            passengers: trip.passengers,
            budget: trip.budget,
            comfort_level: trip.comfort_level,
            recommended_mode: trip.recommended_mode,
            distance_estimate_km: trip.distance_estimate_km,
            confidence_score: trip.confidence_score,
            source_weather: trip.source_weather,
            destination_weather: trip.destination_weather,
            created_at: Utc::now(),
            conversation_id: trip.conversation_id,
            recommended_places: Vec::new(),
        };

        let mut inner = self.inner.write().await;
        inner.trips.insert(id, (stored.clone(), place_ids.clone()));
        Ok(resolve_trip(&stored, &place_ids, &inner.places))
    }

    async fn trip_by_id(&self, id: i64) -> Result<Option<Trip>> {
        let inner = self.inner.read().await;
        Ok(inner
            .trips
            .get(&id)
            .map(|(trip, ids)| resolve_trip(trip, ids, &inner.places)))
    }

    async fn trips_for_username(&self, username: &str) -> Result<Vec<Trip>> {
        let inner = self.inner.read().await;
        let mut trips: Vec<Trip> = inner
            .trips
            .values()
            .filter(|(trip, _)| trip.username == username)
            .map(|(trip, ids)| resolve_trip(trip, ids, &inner.places))
            .collect();
        trips.sort_by_key(|t| t.id);
        Ok(trips)
    }

    async fn trips_for_user_id(&self, user_id: i64) -> Result<Vec<Trip>> {
        let inner = self.inner.read().await;
        let mut trips: Vec<Trip> = inner
            .trips
            .values()
            .filter(|(trip, _)| trip.user_id == user_id)
            .map(|(trip, ids)| resolve_trip(trip, ids, &inner.places))
            .collect();
        trips.sort_by_key(|t| t.id);
        Ok(trips)
    }

    async fn all_trips(&self) -> Result<Vec<Trip>> {
        let inner = self.inner.read().await;
        let mut trips: Vec<Trip> = inner
            .trips
            .values()
            .map(|(trip, ids)| resolve_trip(trip, ids, &inner.places))
            .collect();
        trips.sort_by_key(|t| t.id);
        Ok(trips)
    }

    async fn delete_trip(&self, id: i64) -> Result<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.trips.remove(&id).is_some())
    }

    async fn clear_conversation(&self, conversation_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        for (trip, _) in inner.trips.values_mut() {
            if trip.conversation_id.as_deref() == Some(conversation_id) {
                trip.conversation_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl PlaceStore for MemoryStore {
    async fn places_by_city(&self, city: &str) -> Result<Vec<Place>> {
        let inner = self.inner.read().await;
        let mut places: Vec<Place> = inner
            .places
            .values()
            .filter(|p| p.city == city)
            .cloned()
            .collect();
        places.sort_by_key(|p| p.id);
        Ok(places)
    }

    async fn top_rated_in_city(&self, city: &str, min_rating: f64) -> Result<Vec<Place>> {
        let inner = self.inner.read().await;
        let mut places: Vec<Place> = inner
            .places
            .values()
            .filter(|p| p.city == city && p.rating >= min_rating)
            .cloned()
            .collect();
        places.sort_by(|a, b| b.rating.partial_cmp(&a.rating).unwrap_or(std::cmp::Ordering::Equal));
        Ok(places)
    }

    async fn upsert_places(
        &self,
        city: &str,
        country: &str,
        drafts: Vec<PlaceDraft>,
    ) -> Result<Vec<Place>> {
        let mut inner = self.inner.write().await;
        let mut results = Vec::with_capacity(drafts.len());

        for draft in drafts {
            let existing_id = inner
                .places
                .values()
                .find(|p| p.city == city && p.name.eq_ignore_ascii_case(&draft.name))
                .map(|p| p.id);

            let stored = match existing_id.and_then(|id| inner.places.get_mut(&id)) {
                Some(place) => {
                    if let Some(description) = draft.description {
                        place.description = description;
                    }
                    if let Some(category) = draft.category {
                        place.category = category;
                    }
                    if let Some(entry_fee) = draft.entry_fee {
                        place.entry_fee = entry_fee;
                    }
                    if let Some(duration) = draft.recommended_duration_hours {
                        place.recommended_duration_hours = duration;
                    }
                    place.clone()
                }
                None => {
                    let id = self.mint_id();
                    let place = Place {
                        id,
                        name: draft.name,
                        description: draft.description.unwrap_or_default(),
                        city: city.to_string(),
                        country: country.to_string(),
                        latitude: 0.0,
                        longitude: 0.0,
                        coordinates_known: false,
                        category: draft.category.unwrap_or_else(|| "General".to_string()),
                        image_url: None,
                        entry_fee: draft.entry_fee.unwrap_or(0.0),
                        recommended_duration_hours: draft.recommended_duration_hours.unwrap_or(2),
                        rating: 4.0,
                        best_time_to_visit: None,
                    };
                    inner.places.insert(id, place.clone());
                    place
                }
            };

            results.push(stored);
        }

        Ok(results)
    }
}

#[async_trait::async_trait]
impl ChatStore for MemoryStore {
    async fn insert_turn(&self, turn: NewChatTurn) -> Result<ChatHistory> {
        let id = self.mint_id();
        let stored = ChatHistory {
            id,
            user_id: turn.user_id,
            username: turn.username,
            user_message: turn.user_message,
            ai_response: turn.ai_response,
            conversation_id: turn.conversation_id,
            timestamp: Utc::now(),
        };

        let mut inner = self.inner.write().await;
        inner.chats.push(stored.clone());
        Ok(stored)
    }

    async fn turns_for_user(&self, username: &str) -> Result<Vec<ChatHistory>> {
        let inner = self.inner.read().await;
        Ok(ordered(
            inner
                .chats
                .iter()
                .filter(|c| c.username == username)
                .cloned()
                .collect(),
        ))
    }

    async fn turns_for_user_conversation(
        &self,
        username: &str,
        conversation_id: &str,
    ) -> Result<Vec<ChatHistory>> {
        let inner = self.inner.read().await;
        Ok(ordered(
            inner
                .chats
                .iter()
                .filter(|c| c.username == username && c.conversation_id == conversation_id)
                .cloned()
                .collect(),
        ))
    }

    async fn turns_for_conversation(&self, conversation_id: &str) -> Result<Vec<ChatHistory>> {
        let inner = self.inner.read().await;
        Ok(ordered(
            inner
                .chats
                .iter()
                .filter(|c| c.conversation_id == conversation_id)
                .cloned()
                .collect(),
        ))
    }

    async fn turns_for_user_id(&self, user_id: i64) -> Result<Vec<ChatHistory>> {
        let inner = self.inner.read().await;
        Ok(ordered(
            inner
                .chats
                .iter()
                .filter(|c| c.user_id == user_id)
                .cloned()
                .collect(),
        ))
    }

    async fn all_turns(&self) -> Result<Vec<ChatHistory>> {
        let inner = self.inner.read().await;
        Ok(ordered(inner.chats.clone()))
    }

    async fn delete_turn(&self, id: i64) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.chats.len();
        inner.chats.retain(|c| c.id != id);
        Ok(inner.chats.len() < before)
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.chats.len();
        inner.chats.retain(|c| c.conversation_id != conversation_id);
        Ok((before - inner.chats.len()) as u64)
    }
}

// Timestamp order with insertion id as the tie-break.
fn ordered(mut turns: Vec<ChatHistory>) -> Vec<ChatHistory> {
    turns.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
    turns
}
