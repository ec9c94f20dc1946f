use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse,
    },
    Client,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    storage::types::system_prompts::DEFAULT_QUERY_SYSTEM_PROMPT, utils::config::AppConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionBackend {
    #[default]
    #[serde(alias = "open-ai")]
    OpenAI,
    Extractive,
}

/// A retrieved passage handed to the language model as context.
#[derive(Debug, Clone, Serialize)]
pub struct ContextPassage {
    pub document: String,
    pub content: String,
    pub score: f32,
}

#[derive(Clone)]
pub enum CompletionProvider {
    OpenAI {
        client: Arc<Client<OpenAIConfig>>,
        model: String,
        system_prompt: String,
    },
    /// Answers with the best-scoring passage verbatim, without any remote call.
    Extractive,
}

impl CompletionProvider {
    pub fn from_config(
        config: &AppConfig,
        openai_client: Option<Arc<Client<OpenAIConfig>>>,
    ) -> Result<Self> {
        match config.completion_backend {
            CompletionBackend::OpenAI => {
                let client = openai_client
                    .ok_or_else(|| anyhow!("openai completion backend requires an OpenAI client"))?;
                Ok(Self::OpenAI {
                    client,
                    model: config.query_model.clone(),
                    system_prompt: DEFAULT_QUERY_SYSTEM_PROMPT.to_string(),
                })
            }
            CompletionBackend::Extractive => Ok(Self::Extractive),
        }
    }

    pub fn backend_label(&self) -> &'static str {
        match self {
            Self::OpenAI { .. } => "openai",
            Self::Extractive => "extractive",
        }
    }

    /// Produces an answer to `query` grounded on `passages`.
    pub async fn complete(&self, query: &str, passages: &[ContextPassage]) -> Result<String> {
        match self {
            Self::OpenAI {
                client,
                model,
                system_prompt,
            } => {
                let context = passages_to_context(passages);
                let request =
                    create_chat_request(model, system_prompt, create_user_message(&context, query))?;
                let response = client.chat().create(request).await?;
                process_llm_response(response)
            }
            Self::Extractive => Ok(passages
                .iter()
                .max_by(|a, b| a.score.total_cmp(&b.score))
                .map(|passage| passage.content.trim().to_string())
                .unwrap_or_default()),
        }
    }
}

fn passages_to_context(passages: &[ContextPassage]) -> Value {
    fn round_score(value: f32) -> f64 {
        (f64::from(value) * 1000.0).round() / 1000.0
    }

    serde_json::json!(passages
        .iter()
        .map(|passage| {
            serde_json::json!({
                "document": passage.document,
                "content": passage.content,
                "score": round_score(passage.score),
            })
        })
        .collect::<Vec<_>>())
}

pub fn create_user_message(context_json: &Value, query: &str) -> String {
    format!(
        r"
        Context Information:
        ==================
        {context_json}

        User Question:
        ==================
        {query}
        "
    )
}

fn create_chat_request(
    model: &str,
    system_prompt: &str,
    user_message: String,
) -> Result<CreateChatCompletionRequest> {
    Ok(CreateChatCompletionRequestArgs::default()
        .model(model)
        .messages([
            ChatCompletionRequestSystemMessage::from(system_prompt.to_string()).into(),
            ChatCompletionRequestUserMessage::from(user_message).into(),
        ])
        .build()?)
}

fn process_llm_response(response: CreateChatCompletionResponse) -> Result<String> {
    response
        .choices
        .first()
        .and_then(|choice| choice.message.content.clone())
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| anyhow!("No content found in LLM response"))
}
