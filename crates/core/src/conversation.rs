//! Client-side chat state: an append-only message list plus a loading flag.

use crate::{DeliveryStatus, Message, Role};

pub const GREETING: &str = "안녕하세요, K-Actuary AI Agent입니다. 궁금하신게 있으신가요?";
pub const REQUEST_FAILED: &str = "죄송합니다. 요청 처리 중 오류가 발생했습니다.";

#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
    loading: bool,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::with_greeting(GREETING)
    }

    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::assistant(greeting)],
            loading: false,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Appends a `sending` user message and returns the history to post.
    /// Blank input, or a submit while a request is pending, changes nothing.
    pub fn begin_submit(&mut self, input: &str) -> Option<Vec<Message>> {
        if input.trim().is_empty() || self.loading {
            return None;
        }

        self.messages.push(Message::user(input));
        self.loading = true;
        Some(self.messages.clone())
    }

    pub fn resolve_success(&mut self, reply: Message) {
        self.settle_pending(DeliveryStatus::Sent);
        self.messages.push(Message {
            role: Role::Assistant,
            status: Some(DeliveryStatus::Sent),
            timestamp: reply.timestamp.or_else(|| Some(chrono::Utc::now())),
            content: reply.content,
        });
        self.loading = false;
    }

    pub fn resolve_failure(&mut self, content: impl Into<String>) {
        self.settle_pending(DeliveryStatus::Error);
        self.messages.push(Message::new(
            Role::Assistant,
            content,
            DeliveryStatus::Error,
        ));
        self.loading = false;
    }

    fn settle_pending(&mut self, status: DeliveryStatus) {
        if let Some(pending) = self
            .messages
            .iter_mut()
            .rev()
            .find(|message| message.status == Some(DeliveryStatus::Sending))
        {
            pending.status = Some(status);
        }
    }
}
