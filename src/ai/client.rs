use super::builder::{ChatRequestBuilder, UserInput};
use super::error::{ChatError, ChatResult, TransportError};
use super::transport::{HttpTransport, Transport};
use crate::config::Config;
use crate::types::{ChatRequest, ConversationTurn};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

pub const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// Reply text used when the response carries no message content.
pub const EMPTY_REPLY: &str = "Sorry, I cannot process your request.";

// OpenAI-shaped response; every level optional so partial bodies still parse.
#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

/// `choices[0].message.content`, or [`EMPTY_REPLY`].
pub fn reply_text(body: &Value) -> String {
    serde_json::from_value::<CompletionResponse>(body.clone())
        .ok()
        .and_then(|r| r.choices.into_iter().next())
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .unwrap_or_else(|| EMPTY_REPLY.to_string())
}

/// Result of a send, with the raw response body.
#[derive(Debug, Clone, PartialEq)]
pub struct SendOutcome {
    pub response: Value,
    /// True when the reply came from the reduced single-image request.
    pub used_fallback: bool,
    /// Images the user attached, before any capping.
    pub images_attached: usize,
}

impl SendOutcome {
    pub fn reply(&self) -> String {
        reply_text(&self.response)
    }
}

/// Per-send progress. `SendingFallback` is only entered from a failed
/// primary attempt that embedded more than one image.
#[derive(Debug)]
enum SendState {
    SendingPrimary,
    SendingFallback(ChatError, ChatRequest),
    Done(ChatResult<SendOutcome>),
}

async fn post_request(
    transport: &dyn Transport,
    request: &ChatRequest,
) -> Result<Value, TransportError> {
    let body = serde_json::to_value(request)
        .map_err(|e| TransportError::Other(format!("failed to encode request: {e}")))?;
    transport.post(CHAT_COMPLETIONS_PATH, &body).await
}

/// Send the primary request, and once, a single-image fallback if a primary
/// request that embedded several images fails for a reason other than
/// credentials.
pub async fn send_with_fallback(
    builder: &ChatRequestBuilder,
    input: UserInput<'_>,
    history: &[ConversationTurn],
    transport: &dyn Transport,
) -> ChatResult<SendOutcome> {
    let images_attached = input.images.len();
    let mut state = SendState::SendingPrimary;

    loop {
        state = match state {
            SendState::SendingPrimary => {
                let request = builder.build(input, history);
                tracing::info!(
                    model = %request.model,
                    images = request.image_count(),
                    history = history.len(),
                    "sending chat request"
                );
                match post_request(transport, &request).await {
                    Ok(response) => SendState::Done(Ok(SendOutcome {
                        response,
                        used_fallback: false,
                        images_attached,
                    })),
                    Err(err) => {
                        let err = ChatError::from(err);
                        let fallback = if err.is_credential_failure() {
                            None
                        } else {
                            builder.build_fallback(input, history)
                        };
                        match fallback {
                            Some(request) => SendState::SendingFallback(err, request),
                            None => SendState::Done(Err(err)),
                        }
                    }
                }
            }
            SendState::SendingFallback(primary_err, request) => {
                tracing::warn!(
                    error = %primary_err,
                    images = images_attached,
                    "multi-image request failed, retrying with the first image only"
                );
                let result = post_request(transport, &request)
                    .await
                    .map(|response| SendOutcome {
                        response,
                        used_fallback: true,
                        images_attached,
                    })
                    .map_err(ChatError::from);
                SendState::Done(result)
            }
            SendState::Done(result) => return result,
        };
    }
}

/// Client for the inference proxy.
#[derive(Clone)]
pub struct NebulaClient {
    transport: Arc<dyn Transport>,
}

impl NebulaClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// HTTP client from configuration. Fails without an API key.
    pub fn from_config(config: &Config) -> ChatResult<Self> {
        if config.api_key.is_none() {
            return Err(ChatError::MissingApiKey);
        }
        let transport = HttpTransport::from_config(config)
            .map_err(|e| ChatError::Unknown(format!("Failed to initialize client: {e}")))?;
        Ok(Self::new(Arc::new(transport)))
    }

    pub async fn chat(
        &self,
        model_id: &str,
        input: UserInput<'_>,
        history: &[ConversationTurn],
    ) -> ChatResult<SendOutcome> {
        let builder = ChatRequestBuilder::new(model_id);
        send_with_fallback(&builder, input, history, self.transport.as_ref()).await
    }

    /// Raw `GET /models` body.
    pub async fn list_models(&self) -> ChatResult<Value> {
        tracing::info!("getting available models");
        Ok(self.transport.get("/models").await?)
    }

    /// Raw `GET /user` body.
    pub async fn user_info(&self) -> ChatResult<Value> {
        tracing::info!("getting user info");
        Ok(self.transport.get("/user").await?)
    }

    pub async fn test_connection(&self) -> bool {
        match self.transport.get("/models").await {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(error = %err, "connection test failed");
                false
            }
        }
    }
}
