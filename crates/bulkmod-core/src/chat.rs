//! Conversational auto-reply for regular (non-operator) users.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
    cache::{Clock, TokioClock},
    domain::UserId,
    ports::AuthorizationSource,
    Result,
};

/// Messages kept per user (and sent as context).
pub const HISTORY_LIMIT: usize = 8;
pub const CONVERSATION_EXPIRY: Duration = Duration::from_secs(3600);

pub const FALLBACK_REPLY: &str = "Hmm, I'm drawing a blank here! 😅 Try asking me something else?";
pub const APOLOGY_REPLY: &str = "Oops! Something went wrong 🤖 Try again?";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Hexagonal port for a chat-completion backend.
///
/// An empty string means "no answer"; the caller substitutes a fallback.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

struct Conversation {
    messages: Vec<ChatMessage>,
    last_active: tokio::time::Instant,
}

pub struct ChatbotService {
    completion: Arc<dyn ChatCompletion>,
    auth: Arc<dyn AuthorizationSource>,
    enabled: bool,
    clock: Arc<dyn Clock>,
    conversations: Mutex<HashMap<UserId, Conversation>>,
}

impl ChatbotService {
    pub fn new(
        completion: Arc<dyn ChatCompletion>,
        auth: Arc<dyn AuthorizationSource>,
        enabled: bool,
    ) -> Self {
        Self::with_clock(completion, auth, enabled, Arc::new(TokioClock))
    }

    pub fn with_clock(
        completion: Arc<dyn ChatCompletion>,
        auth: Arc<dyn AuthorizationSource>,
        enabled: bool,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            completion,
            auth,
            enabled,
            clock,
            conversations: Mutex::new(HashMap::new()),
        }
    }

    /// Reply to `text` from `user`, or `None` when the chatbot must stay quiet.
    pub async fn reply(&self, user: UserId, display_name: &str, text: &str) -> Option<String> {
        if !self.enabled || self.auth.is_privileged_operator(user) {
            return None;
        }
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let mut history = {
            let mut convs = self.conversations.lock().await;
            self.expire(&mut convs);
            convs
                .get(&user)
                .map(|c| c.messages.clone())
                .unwrap_or_default()
        };
        history.push(ChatMessage::new(ChatRole::User, text));

        let mut payload = Vec::with_capacity(HISTORY_LIMIT + 1);
        payload.push(ChatMessage::new(ChatRole::System, system_prompt(display_name)));
        payload.extend(last_n(&history, HISTORY_LIMIT).iter().cloned());

        let answer = match self.completion.complete(&payload).await {
            Ok(a) if a.trim().is_empty() => {
                tracing::debug!(user = %user, "empty completion, using fallback");
                FALLBACK_REPLY.to_string()
            }
            Ok(a) => a.trim().to_string(),
            Err(e) => {
                tracing::warn!(user = %user, error = %e, "chat completion failed");
                return Some(APOLOGY_REPLY.to_string());
            }
        };

        history.push(ChatMessage::new(ChatRole::Assistant, answer.clone()));
        let conversation = Conversation {
            messages: last_n(&history, HISTORY_LIMIT).to_vec(),
            last_active: self.clock.now(),
        };
        self.conversations.lock().await.insert(user, conversation);

        Some(answer)
    }

    pub async fn active_conversations(&self) -> usize {
        let mut convs = self.conversations.lock().await;
        self.expire(&mut convs);
        convs.len()
    }

    fn expire(&self, convs: &mut HashMap<UserId, Conversation>) {
        let now = self.clock.now();
        convs.retain(|_, c| now.saturating_duration_since(c.last_active) <= CONVERSATION_EXPIRY);
    }
}

fn system_prompt(display_name: &str) -> String {
    format!(
        "You are ChatMate, a friendly AI assistant chatting with {display_name}. \
         Keep responses SHORT (1-3 sentences), natural, and conversational. \
         Use emojis occasionally. Be helpful and engaging."
    )
}

fn last_n(messages: &[ChatMessage], n: usize) -> &[ChatMessage] {
    &messages[messages.len().saturating_sub(n)..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::ProtectionRoster;
    use crate::testing::ManualClock;
    use crate::Error;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct ScriptedCompletion {
        answers: StdMutex<Vec<Result<String>>>,
        seen: StdMutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedCompletion {
        fn answering(answers: Vec<Result<String>>) -> Self {
            Self {
                answers: StdMutex::new(answers),
                seen: StdMutex::new(Vec::new()),
            }
        }

        fn last_payload(&self) -> Vec<ChatMessage> {
            self.seen.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl ChatCompletion for ScriptedCompletion {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            self.seen.lock().unwrap().push(messages.to_vec());
            let mut answers = self.answers.lock().unwrap();
            if answers.is_empty() {
                Ok("ok".to_string())
            } else {
                answers.remove(0)
            }
        }
    }

    fn service(
        completion: Arc<ScriptedCompletion>,
        enabled: bool,
    ) -> (ChatbotService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let roster = Arc::new(ProtectionRoster::new(vec![1], []));
        let svc = ChatbotService::with_clock(completion, roster, enabled, clock.clone());
        (svc, clock)
    }

    #[tokio::test]
    async fn operators_and_disabled_bot_get_no_reply() {
        let completion = Arc::new(ScriptedCompletion::default());
        let (svc, _) = service(completion.clone(), true);
        assert_eq!(svc.reply(UserId(1), "op", "hi").await, None);

        let (disabled, _) = service(completion.clone(), false);
        assert_eq!(disabled.reply(UserId(2), "bob", "hi").await, None);
        assert!(completion.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn payload_has_system_prompt_and_history() {
        let completion = Arc::new(ScriptedCompletion::answering(vec![
            Ok("first".to_string()),
            Ok("  second  ".to_string()),
        ]));
        let (svc, _) = service(completion.clone(), true);

        assert_eq!(svc.reply(UserId(2), "bob", "hello").await.as_deref(), Some("first"));
        assert_eq!(svc.reply(UserId(2), "bob", "again").await.as_deref(), Some("second"));

        let payload = completion.last_payload();
        assert_eq!(payload.len(), 4);
        assert_eq!(payload[0].role, ChatRole::System);
        assert!(payload[0].content.contains("bob"));
        assert_eq!(payload[1], ChatMessage::new(ChatRole::User, "hello"));
        assert_eq!(payload[2], ChatMessage::new(ChatRole::Assistant, "first"));
        assert_eq!(payload[3], ChatMessage::new(ChatRole::User, "again"));
    }

    #[tokio::test]
    async fn history_is_bounded() {
        let completion = Arc::new(ScriptedCompletion::default());
        let (svc, _) = service(completion.clone(), true);

        for i in 0..10 {
            svc.reply(UserId(2), "bob", &format!("m{i}")).await;
        }

        let payload = completion.last_payload();
        assert_eq!(payload.len(), HISTORY_LIMIT + 1);
        assert_eq!(payload.last().unwrap().content, "m9");
    }

    #[tokio::test]
    async fn empty_answer_falls_back_and_error_apologizes() {
        let completion = Arc::new(ScriptedCompletion::answering(vec![
            Ok("   ".to_string()),
            Err(Error::External("http 500".to_string())),
        ]));
        let (svc, _) = service(completion, true);

        assert_eq!(svc.reply(UserId(2), "bob", "a").await.as_deref(), Some(FALLBACK_REPLY));
        assert_eq!(svc.reply(UserId(2), "bob", "b").await.as_deref(), Some(APOLOGY_REPLY));
    }

    #[tokio::test]
    async fn idle_conversations_expire() {
        let completion = Arc::new(ScriptedCompletion::default());
        let (svc, clock) = service(completion.clone(), true);

        svc.reply(UserId(2), "bob", "hello").await;
        assert_eq!(svc.active_conversations().await, 1);

        clock.advance(CONVERSATION_EXPIRY + Duration::from_secs(1));
        assert_eq!(svc.active_conversations().await, 0);

        svc.reply(UserId(2), "bob", "back").await;
        assert_eq!(completion.last_payload().len(), 2);
    }
}
