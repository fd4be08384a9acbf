//! Admin service
//!
//! Listing and deletion across users, trips and chat history, plus
//! conversation statistics. Deleting a user cascades to everything they
//! own; deleting a conversation nulls the reference on any trip that
//! pointed at it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::TravelPlannerError;
use crate::models::{ChatHistory, Trip, User};
use crate::store::{ChatStore, TripStore, UserStore};
use crate::Result;

#[derive(Debug, Clone, Serialize)]
pub struct ConversationStats {
    pub conversation_id: String,
    pub username: String,
    pub message_count: usize,
    pub first_message: DateTime<Utc>,
    pub last_message: DateTime<Utc>,
}

pub struct AdminService {
    users: Arc<dyn UserStore>,
    trips: Arc<dyn TripStore>,
    chats: Arc<dyn ChatStore>,
}

impl AdminService {
    pub fn new(
        users: Arc<dyn UserStore>,
        trips: Arc<dyn TripStore>,
        chats: Arc<dyn ChatStore>,
    ) -> Self {
        Self {
            users,
            trips,
            chats,
        }
    }

    pub async fn all_users(&self) -> Result<Vec<User>> {
        self.users.all_users().await
    }

    pub async fn all_trips(&self) -> Result<Vec<Trip>> {
        self.trips.all_trips().await
    }

    pub async fn all_chats(&self) -> Result<Vec<ChatHistory>> {
        self.chats.all_turns().await
    }

    pub async fn user_trips(&self, user_id: i64) -> Result<Vec<Trip>> {
        self.require_user(user_id).await?;
        self.trips.trips_for_user_id(user_id).await
    }

    pub async fn user_chats(&self, user_id: i64) -> Result<Vec<ChatHistory>> {
        self.require_user(user_id).await?;
        self.chats.turns_for_user_id(user_id).await
    }

    /// Removes the user with their trips and chat history.
    pub async fn delete_user(&self, user_id: i64) -> Result<()> {
        if !self.users.delete_user(user_id).await? {
            return Err(TravelPlannerError::NotFound(format!(
                "User not found with id: {}",
                user_id
            )));
        }
        Ok(())
    }

    pub async fn delete_trip(&self, trip_id: i64) -> Result<()> {
        if !self.trips.delete_trip(trip_id).await? {
            return Err(TravelPlannerError::NotFound(format!(
                "Trip not found with id: {}",
                trip_id
            )));
        }
        Ok(())
    }

    pub async fn delete_chat(&self, chat_id: i64) -> Result<()> {
        if !self.chats.delete_turn(chat_id).await? {
            return Err(TravelPlannerError::NotFound(format!(
                "Chat message not found with id: {}",
                chat_id
            )));
        }
        Ok(())
    }

    /// Deletes every turn of the conversation and returns the stats taken
    /// just before deletion. Trips keep no dangling reference.
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<(ConversationStats, u64)> {
        let stats = self.conversation_stats(conversation_id).await?;
        let deleted = self.chats.delete_conversation(conversation_id).await?;
        self.trips.clear_conversation(conversation_id).await?;
        Ok((stats, deleted))
    }

    pub async fn conversation_stats(&self, conversation_id: &str) -> Result<ConversationStats> {
        let turns = self.chats.turns_for_conversation(conversation_id).await?;

        let (first, last) = match (turns.first(), turns.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(TravelPlannerError::NotFound(format!(
                    "Conversation not found: {}",
                    conversation_id
                )))
            }
        };

        Ok(ConversationStats {
            conversation_id: conversation_id.to_string(),
            username: first.username.clone(),
            message_count: turns.len(),
            first_message: first.timestamp,
            last_message: last.timestamp,
        })
    }

    async fn require_user(&self, user_id: i64) -> Result<()> {
        if self.users.find_by_id(user_id).await?.is_none() {
            return Err(TravelPlannerError::NotFound(format!(
                "User not found with id: {}",
                user_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewChatTurn, NewUser, Role};
    use crate::store::MemoryStore;

    async fn seeded_store() -> (Arc<MemoryStore>, User) {
        let store = Arc::new(MemoryStore::new());
        let user = store
            .insert_user(NewUser {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password_hash: "hash".to_string(),
                role: Role::User,
            })
            .await
            .unwrap();

        for i in 0..4 {
            store
                .insert_turn(NewChatTurn {
                    user_id: user.id,
                    username: user.username.clone(),
                    user_message: format!("msg {}", i),
                    ai_response: "ok".to_string(),
                    conversation_id: "abc".to_string(),
                })
                .await
                .unwrap();
        }

        (store, user)
    }

    fn admin(store: &Arc<MemoryStore>) -> AdminService {
        AdminService::new(store.clone(), store.clone(), store.clone())
    }

    #[tokio::test]
    async fn test_conversation_stats() {
        let (store, user) = seeded_store().await;
        let service = admin(&store);

        let stats = service.conversation_stats("abc").await.unwrap();
        assert_eq!(stats.message_count, 4);
        assert_eq!(stats.username, user.username);
        assert!(stats.first_message <= stats.last_message);

        assert!(matches!(
            service.conversation_stats("missing").await,
            Err(TravelPlannerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_conversation_reports_stats_and_empties_history() {
        let (store, _user) = seeded_store().await;
        let service = admin(&store);

        let (stats, deleted) = service.delete_conversation("abc").await.unwrap();
        assert_eq!(stats.message_count, 4);
        assert_eq!(deleted, 4);

        assert!(store
            .turns_for_conversation("abc")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_delete_user_cascades_and_missing_is_not_found() {
        let (store, user) = seeded_store().await;
        let service = admin(&store);

        service.delete_user(user.id).await.unwrap();
        assert!(store.all_turns().await.unwrap().is_empty());

        assert!(matches!(
            service.delete_user(user.id).await,
            Err(TravelPlannerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_per_user_listings_require_existing_user() {
        let (store, user) = seeded_store().await;
        let service = admin(&store);

        assert_eq!(service.user_chats(user.id).await.unwrap().len(), 4);
        assert!(matches!(
            service.user_chats(999).await,
            Err(TravelPlannerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_chat_and_trip_not_found() {
        let (store, _user) = seeded_store().await;
        let service = admin(&store);

        assert!(matches!(
            service.delete_trip(42).await,
            Err(TravelPlannerError::NotFound(_))
        ));
        assert!(matches!(
            service.delete_chat(4242).await,
            Err(TravelPlannerError::NotFound(_))
        ));
    }
}
