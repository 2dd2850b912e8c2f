//! Chat completion client used to write answers from retrieved museum context.

use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use tracing::debug;

/// Answers one prompt pair with one completion.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LLMClient: Send + Sync {
    async fn complete(&self, system_prompt: String, user_prompt: String) -> Result<String>;
}

/// Chat completions against the OpenAI API, or anything that speaks it.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    /// `model` is the chat model used for every completion, e.g. `gpt-4o-mini`.
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn complete(&self, system_prompt: String, user_prompt: String) -> Result<String> {
        let system: ChatCompletionRequestMessage = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt)
            .build()?
            .into();
        let user: ChatCompletionRequestMessage = ChatCompletionRequestUserMessageArgs::default()
            .content(user_prompt)
            .build()?
            .into();
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([system, user])
            .build()?;

        let response = self.client.chat().create(request).await?;
        debug!(model = %self.model, usage = ?response.usage, "Chat completion finished");
        response
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .context("Chat completion returned no text")
    }
}
