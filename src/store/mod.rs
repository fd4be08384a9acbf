//! Persistence ports
//!
//! Repository traits for users, trips, places and chat history, with a
//! Postgres implementation and an in-memory implementation for tests.
//! Stores assign ids monotonically; callers never pick them.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::models::{
    ChatHistory, NewChatTurn, NewTrip, NewUser, Place, PlaceDraft, Trip, User,
};
use crate::Result;

#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: NewUser) -> Result<User>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;
    async fn username_exists(&self, username: &str) -> Result<bool>;
    async fn email_exists(&self, email: &str) -> Result<bool>;
    async fn all_users(&self) -> Result<Vec<User>>;
    /// Removes the user together with their trips and chat history.
    async fn delete_user(&self, id: i64) -> Result<bool>;
}

#[async_trait::async_trait]
pub trait TripStore: Send + Sync {
    async fn insert_trip(&self, trip: NewTrip) -> Result<Trip>;
    async fn trip_by_id(&self, id: i64) -> Result<Option<Trip>>;
    async fn trips_for_username(&self, username: &str) -> Result<Vec<Trip>>;
    async fn trips_for_user_id(&self, user_id: i64) -> Result<Vec<Trip>>;
    async fn all_trips(&self) -> Result<Vec<Trip>>;
    async fn delete_trip(&self, id: i64) -> Result<bool>;
    /// Nulls out the conversation reference on every trip pointing at it.
    async fn clear_conversation(&self, conversation_id: &str) -> Result<()>;
}

#[async_trait::async_trait]
pub trait PlaceStore: Send + Sync {
    async fn places_by_city(&self, city: &str) -> Result<Vec<Place>>;
    async fn top_rated_in_city(&self, city: &str, min_rating: f64) -> Result<Vec<Place>>;
    /// Insert-or-update every draft under one transaction, keyed on
    /// `(city, lowercased name)`. Returns the stored entities in draft order.
    async fn upsert_places(
        &self,
        city: &str,
        country: &str,
        drafts: Vec<PlaceDraft>,
    ) -> Result<Vec<Place>>;
}

#[async_trait::async_trait]
pub trait ChatStore: Send + Sync {
    async fn insert_turn(&self, turn: NewChatTurn) -> Result<ChatHistory>;
    async fn turns_for_user(&self, username: &str) -> Result<Vec<ChatHistory>>;
    async fn turns_for_user_conversation(
        &self,
        username: &str,
        conversation_id: &str,
    ) -> Result<Vec<ChatHistory>>;
    /// All turns of a conversation regardless of owner (admin surface).
    async fn turns_for_conversation(&self, conversation_id: &str) -> Result<Vec<ChatHistory>>;
    async fn turns_for_user_id(&self, user_id: i64) -> Result<Vec<ChatHistory>>;
    async fn all_turns(&self) -> Result<Vec<ChatHistory>>;
    async fn delete_turn(&self, id: i64) -> Result<bool>;
    /// Removes every turn of the conversation, returning how many went.
    async fn delete_conversation(&self, conversation_id: &str) -> Result<u64>;
}
