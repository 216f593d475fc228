use std::{sync::Arc, time::Duration};

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tokio::time::timeout;
use tokio_retry::{strategy::FixedInterval, Retry};
use tracing::warn;

/// Prefix of the text returned when the remote model could not be reached.
/// Callers treat the whole string as the answer; they never parse it.
pub const GENERATION_UNAVAILABLE: &str = "[generation unavailable]";

const SYSTEM_PROMPT: &str = "You are a helpful assistant for a domain-specific knowledge base.";

/// Builds the fixed prompt template that grounds the model in retrieved
/// passages.
pub fn context_prompt(query: &str, contexts: &[String]) -> String {
    format!(
        "Answer the user's question using the background knowledge below.\n\n\
         [Background]\n{}\n\n\
         [Question]\n{}\n\n\
         [Answer]",
        contexts.join("\n"),
        query
    )
}

/// Prompt for the last-resort layer: no retrieved context at all.
pub fn free_prompt(query: &str) -> String {
    format!("{query}\n\nAnswer from your own knowledge. If you are unsure, say so.")
}

/// Opaque prompt-to-text collaborator.
///
/// Implementations never return an error: a failed remote call yields a
/// string starting with [`GENERATION_UNAVAILABLE`], which the cascade passes
/// through as the answer (degradation, not failure).
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f32) -> String;

    async fn generate_with_context(
        &self,
        query: &str,
        contexts: &[String],
        max_tokens: u32,
        temperature: f32,
    ) -> String {
        self.generate(&context_prompt(query, contexts), max_tokens, temperature)
            .await
    }
}

/// Chat-completion backed generation with a bounded timeout and a single
/// retry on transient failure. The retry policy lives here so the cascade
/// controller stays deterministic.
pub struct OpenAiGeneration {
    client: Arc<Client<OpenAIConfig>>,
    model: String,
    request_timeout: Duration,
}

impl OpenAiGeneration {
    pub fn new(client: Arc<Client<OpenAIConfig>>, model: String, timeout_secs: u64) -> Self {
        Self {
            client,
            model,
            request_timeout: Duration::from_secs(timeout_secs),
        }
    }

    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, OpenAIError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .max_tokens(max_tokens)
            .temperature(temperature)
            .messages([
                ChatCompletionRequestSystemMessage::from(SYSTEM_PROMPT).into(),
                ChatCompletionRequestUserMessage::from(prompt).into(),
            ])
            .build()?;

        let response = self.client.chat().create(request).await?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| {
                OpenAIError::InvalidArgument("no content in chat completion response".into())
            })
    }
}

#[async_trait]
impl GenerationService for OpenAiGeneration {
    async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f32) -> String {
        // One immediate retry; a second consecutive failure degrades.
        let retry_strategy = FixedInterval::from_millis(250).take(1);

        let attempt = Retry::spawn(retry_strategy, || async {
            timeout(
                self.request_timeout,
                self.complete(prompt, max_tokens, temperature),
            )
            .await
            .map_err(|_| {
                OpenAIError::InvalidArgument(format!(
                    "generation timed out after {:?}",
                    self.request_timeout
                ))
            })?
        })
        .await;

        match attempt {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, model = %self.model, "generation degraded");
                format!("{GENERATION_UNAVAILABLE}: {err}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_prompt_embeds_contexts_and_query() {
        let prompt = context_prompt(
            "refund policy?",
            &["Q: refund policy\nA: thirty days".to_string()],
        );

        assert!(prompt.contains("[Background]"));
        assert!(prompt.contains("Q: refund policy"));
        assert!(prompt.contains("[Question]\nrefund policy?"));
        assert!(prompt.ends_with("[Answer]"));
    }

    #[test]
    fn free_prompt_contains_only_the_query_as_dynamic_content() {
        let prompt = free_prompt("what is the shipping time?");
        assert!(prompt.starts_with("what is the shipping time?"));
        assert!(prompt.contains("Answer from your own knowledge"));
    }

    #[tokio::test]
    async fn unreachable_backend_degrades_instead_of_erroring() {
        let config = OpenAIConfig::new()
            .with_api_key("test-key")
            .with_api_base("http://127.0.0.1:9"); // discard port, nothing listens
        let service =
            OpenAiGeneration::new(Arc::new(Client::with_config(config)), "gpt-4o-mini".into(), 2);

        let answer = service.generate("hello", 16, 0.0).await;
        assert!(
            answer.starts_with(GENERATION_UNAVAILABLE),
            "expected degradation marker, got: {answer}"
        );
    }
}
