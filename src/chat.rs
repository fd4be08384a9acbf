//! Chat service
//!
//! Multi-turn travel conversations. Each turn loads the prior transcript
//! for the conversation, rebuilds the prompt context, calls the chat model
//! and persists the exchange. A model outage stores a fixed apology rather
//! than failing, so the conversation stays auditable.

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::chat_model::ChatModel;
use crate::error::TravelPlannerError;
use crate::models::{ChatHistory, NewChatTurn, User};
use crate::store::{ChatStore, UserStore};
use crate::Result;

const CHAT_SYSTEM_PROMPT: &str = "You are a helpful travel planning assistant. \
Provide concise and helpful responses about travel, trips, destinations, and planning.";

const CONTEXT_PREAMBLE: &str =
    "You are a travel planning assistant. Help users with travel-related questions.\n\n";

const APOLOGY: &str =
    "I apologize, but I'm having trouble responding right now. Please try again later.";

pub struct ChatService {
    users: Arc<dyn UserStore>,
    chats: Arc<dyn ChatStore>,
    chat_model: Arc<dyn ChatModel>,
}

impl ChatService {
    pub fn new(
        users: Arc<dyn UserStore>,
        chats: Arc<dyn ChatStore>,
        chat_model: Arc<dyn ChatModel>,
    ) -> Self {
        Self {
            users,
            chats,
            chat_model,
        }
    }

    /// Handle one user turn: build context, ask the model, persist.
    pub async fn process_message(
        &self,
        message: &str,
        username: &str,
        conversation_id: Option<&str>,
    ) -> Result<ChatHistory> {
        let user = self.resolve_user(username).await?;

        let conversation_id = match conversation_id {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };

        let ai_response = match self.model_response(message, username, &conversation_id).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Chat model failed mid-conversation: {}, storing apology", e);
                APOLOGY.to_string()
            }
        };

        self.chats
            .insert_turn(NewChatTurn {
                user_id: user.id,
                username: user.username,
                user_message: message.to_string(),
                ai_response,
                conversation_id,
            })
            .await
    }

    /// Persist a turn whose assistant response was produced elsewhere.
    /// Trip synthesis uses this to file its planning prompts as ordinary
    /// chat history without a second model call.
    pub async fn record_exchange(
        &self,
        message: &str,
        response: &str,
        username: &str,
        conversation_id: &str,
    ) -> Result<ChatHistory> {
        let user = self.resolve_user(username).await?;

        self.chats
            .insert_turn(NewChatTurn {
                user_id: user.id,
                username: user.username,
                user_message: message.to_string(),
                ai_response: response.to_string(),
                conversation_id: conversation_id.to_string(),
            })
            .await
    }

    /// All turns for the user, optionally scoped to one conversation,
    /// oldest first.
    pub async fn history(
        &self,
        username: &str,
        conversation_id: Option<&str>,
    ) -> Result<Vec<ChatHistory>> {
        match conversation_id {
            Some(id) if !id.trim().is_empty() => {
                self.chats.turns_for_user_conversation(username, id).await
            }
            _ => self.chats.turns_for_user(username).await,
        }
    }

    async fn resolve_user(&self, username: &str) -> Result<User> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or_else(|| TravelPlannerError::Unauthorized(format!("User not found: {}", username)))
    }

    async fn model_response(
        &self,
        message: &str,
        username: &str,
        conversation_id: &str,
    ) -> Result<String> {
        let history = self
            .chats
            .turns_for_user_conversation(username, conversation_id)
            .await?;

        let prompt = build_context(&history, message);
        self.chat_model.complete(CHAT_SYSTEM_PROMPT, &prompt).await
    }
}

/// Fixed preamble, then alternating User/Assistant lines, then the new turn.
fn build_context(history: &[ChatHistory], message: &str) -> String {
    let mut context = String::from(CONTEXT_PREAMBLE);

    for turn in history {
        context.push_str("User: ");
        context.push_str(&turn.user_message);
        context.push('\n');
        context.push_str("Assistant: ");
        context.push_str(&turn.ai_response);
        context.push('\n');
    }

    context.push_str("User: ");
    context.push_str(message);
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat_model::testing::{FailingModel, ScriptedModel, StaticModel};
    use crate::models::{NewUser, Role};
    use crate::store::MemoryStore;

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

    #[tokio::test]
    async fn test_fresh_conversation_mints_id() {
        let store = store_with_user("alice").await;
        let service = ChatService::new(
            store.clone(),
            store.clone(),
            Arc::new(StaticModel::new("Hello traveller!")),
        );

        let turn = service.process_message("hi", "alice", None).await.unwrap();
        assert!(!turn.conversation_id.is_empty());
        assert_eq!(turn.ai_response, "Hello traveller!");

        // Empty string also mints a fresh id.
        let other = service.process_message("hi", "alice", Some("")).await.unwrap();
        assert_ne!(other.conversation_id, turn.conversation_id);
    }

    #[tokio::test]
    async fn test_prior_turns_flow_into_prompt() {
        let store = store_with_user("bob").await;
        let model = Arc::new(ScriptedModel::new(vec!["First answer", "Second answer"]));
        let service = ChatService::new(store.clone(), store.clone(), model.clone());

        let first = service
            .process_message("What about Goa?", "bob", None)
            .await
            .unwrap();
        service
            .process_message("And the beaches?", "bob", Some(&first.conversation_id))
            .await
            .unwrap();

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[1].contains("User: What about Goa?"));
        assert!(prompts[1].contains("Assistant: First answer"));
        assert!(prompts[1].ends_with("User: And the beaches?"));
    }

    #[tokio::test]
    async fn test_model_outage_stores_apology() {
        let store = store_with_user("carol").await;
        let service = ChatService::new(store.clone(), store.clone(), Arc::new(FailingModel));

        let turn = service
            .process_message("help", "carol", Some("conv-1"))
            .await
            .unwrap();
        assert_eq!(turn.ai_response, APOLOGY);

        // The turn was persisted despite the outage.
        let history = service.history("carol", Some("conv-1")).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_user_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let service = ChatService::new(
            store.clone(),
            store.clone(),
            Arc::new(StaticModel::new("hi")),
        );

        let result = service.process_message("hi", "ghost", None).await;
        assert!(matches!(result, Err(TravelPlannerError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_history_scoping() {
        let store = store_with_user("dave").await;
        let service = ChatService::new(
            store.clone(),
            store.clone(),
            Arc::new(StaticModel::new("ok")),
        );

        service
            .process_message("a", "dave", Some("conv-a"))
            .await
            .unwrap();
        service
            .process_message("b", "dave", Some("conv-b"))
            .await
            .unwrap();

        assert_eq!(service.history("dave", None).await.unwrap().len(), 2);
        assert_eq!(
            service.history("dave", Some("conv-a")).await.unwrap().len(),
            1
        );
    }

    #[test]
    fn test_context_format() {
        let context = build_context(&[], "hello");
        assert!(context.starts_with(CONTEXT_PREAMBLE));
        assert!(context.ends_with("User: hello"));
    }
}
