use crate::ai::{TextGenerator, UserProfile};
use crate::error::ChatError;
use crate::store::{ChatMessage, ChatRole, ChatSession, Database};
use log::{debug, info};
use std::sync::Arc;

/// Messages of history included in each chat prompt
pub const CONTEXT_MESSAGES: usize = 20;

/// Length of a title derived from the first user message
pub const DERIVED_TITLE_CHARS: usize = 40;

/// Free-form conversations with the health assistant, persisted per session
pub struct ChatService {
    db: Database,
    backend: Arc<dyn TextGenerator>,
    profile: UserProfile,
}

impl ChatService {
    pub fn new(db: Database, backend: Arc<dyn TextGenerator>, profile: UserProfile) -> Self {
        Self {
            db,
            backend,
            profile,
        }
    }

    pub fn create_session(&self, title: &str) -> Result<ChatSession, ChatError> {
        let session = self.db.create_chat_session(title.trim())?;
        info!("Created chat session {}", session.id);
        Ok(session)
    }

    pub fn list_sessions(&self) -> Result<Vec<ChatSession>, ChatError> {
        Ok(self.db.chat_sessions()?)
    }

    pub fn session(&self, session_id: &str) -> Result<ChatSession, ChatError> {
        self.db
            .chat_session(session_id)?
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))
    }

    pub fn messages(&self, session_id: &str) -> Result<Vec<ChatMessage>, ChatError> {
        self.session(session_id)?;
        Ok(self.db.chat_messages(session_id)?)
    }

    pub fn delete_session(&self, session_id: &str) -> Result<(), ChatError> {
        if !self.db.delete_chat_session(session_id)? {
            return Err(ChatError::SessionNotFound(session_id.to_string()));
        }
        info!("Deleted chat session {}", session_id);
        Ok(())
    }

    /// Store the user's message, ask the model and store its reply
    ///
    /// The user message stays persisted even when generation fails. An
    /// untitled session takes its title from the first user message.
    pub async fn send_message(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<ChatMessage, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let id = session_id.to_string();
        let user_text = text.to_string();
        let history = self
            .db
            .run_blocking(move |db| {
                let Some(session) = db.chat_session(&id)? else {
                    return Ok(None);
                };
                db.add_chat_message(&id, ChatRole::User, &user_text)?;

                if session.title.is_empty() {
                    let title = derive_title(&user_text);
                    db.rename_chat_session(&id, &title)?;
                    debug!("Titled chat session {} as '{}'", id, title);
                }

                db.recent_chat_messages(&id, CONTEXT_MESSAGES).map(Some)
            })
            .await?
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))?;

        let prompt = self.build_prompt(&history);
        let reply = self.backend.generate(&prompt).await?;

        let id = session_id.to_string();
        let reply = reply.trim().to_string();
        let message = self
            .db
            .run_blocking(move |db| db.add_chat_message(&id, ChatRole::Assistant, &reply))
            .await?;
        Ok(message)
    }

    fn build_prompt(&self, history: &[ChatMessage]) -> String {
        let transcript = history
            .iter()
            .map(|message| {
                let speaker = match message.role {
                    ChatRole::User => "User",
                    ChatRole::Assistant => "Assistant",
                };
                format!("{}: {}", speaker, message.content)
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are a friendly personal health assistant. Answer the user's latest message \
             concisely, using the conversation so far. You are not a doctor; suggest seeing \
             one when something sounds serious.\n\nUser profile:\n{}\n\nConversation:\n{}\nAssistant:",
            self.profile.describe(),
            transcript
        )
    }
}

fn derive_title(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or(text);
    first_line
        .chars()
        .take(DERIVED_TITLE_CHARS)
        .collect::<String>()
        .trim()
        .to_string()
}
