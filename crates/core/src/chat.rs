use crate::retrieval::Retriever;
use crate::traits::{CompletionModel, PromptMessage};
use crate::{ChatError, ChatOptions, Message, Role};
use std::sync::Arc;
use tracing::debug;

pub struct ChatService {
    retriever: Arc<Retriever>,
    completion: Arc<dyn CompletionModel>,
    options: ChatOptions,
}

impl ChatService {
    pub fn new(
        retriever: Arc<Retriever>,
        completion: Arc<dyn CompletionModel>,
        options: ChatOptions,
    ) -> Self {
        Self {
            retriever,
            completion,
            options,
        }
    }

    /// Answers the latest user message of `history` using retrieved context.
    pub async fn reply(&self, history: &[Message]) -> Result<Message, ChatError> {
        if history.is_empty() {
            return Err(ChatError::EmptyConversation);
        }

        let question = history
            .iter()
            .rev()
            .find(|message| message.role == Role::User)
            .ok_or(ChatError::NoUserMessage)?;

        let context = self
            .retriever
            .context_with_top_k(&question.content, self.options.top_k)
            .await?;
        debug!(context_chars = context.chars().count(), "retrieved context");

        let prompt = build_prompt(&self.options.system_prompt, &context, history);
        let content = self
            .completion
            .complete(&prompt)
            .await?
            .ok_or(ChatError::EmptyCompletion)?;

        Ok(Message::assistant(content))
    }
}

pub fn build_prompt(system_prompt: &str, context: &str, history: &[Message]) -> Vec<PromptMessage> {
    let mut prompt = Vec::with_capacity(history.len() + 1);
    prompt.push(PromptMessage {
        role: "system".to_string(),
        content: format!("{system_prompt}\n\n참고 문서:\n{context}"),
    });
    prompt.extend(history.iter().map(|message| PromptMessage {
        role: message.role.as_str().to_string(),
        content: message.content.clone(),
    }));
    prompt
}
