use eventsource_client::{Client as EsClient, ClientBuilder, ReconnectOptions, SSE};
use futures::future;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::message;

// Chat Completion API
const CHAT_API: &str = "/chat/completions";

// Sentinel sent as the last `data:` line of a successful stream.
const DONE: &str = "[DONE]";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Assistant,
    User,
}

// From the conversation Role to openai::Role
impl From<message::Role> for Role {
    fn from(role: message::Role) -> Self {
        match role {
            message::Role::User => Role::User,
            message::Role::Assistant => Role::Assistant,
            message::Role::System => Role::System,
        }
    }
}

impl From<message::Message> for Message {
    fn from(message: message::Message) -> Self {
        Self {
            role: message.role.into(),
            content: message.content,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct MessageBody {
    /// ID of the model to use.
    pub model: String,
    /// The messages comprising the conversation so far.
    pub messages: Vec<Message>,
    /// What sampling temperature to use, between 0 and 2. Higher values make the output more
    /// random, lower values make it more focused and deterministic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Nucleus sampling. 0.1 means only the tokens comprising the top 10% probability mass are
    /// considered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// The maximum number of tokens that can be generated in the completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// If set, partial message deltas will be sent as data-only server-sent events, terminated
    /// by a `data: [DONE]` message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl MessageBody {
    /// Creates a new streaming `MessageBody`
    #[must_use]
    pub fn new(model: &str, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: Some(true),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Delta {
    pub role: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub total_tokens: u32,
    pub completion_tokens: u32,
}

/// Error payload the API may send in place of a chunk.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Auth {
    pub api_key: String,
}

impl Auth {
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }

    pub fn from_env(variable: &str) -> Result<Self, Error> {
        match std::env::var(variable) {
            Ok(api_key) => Ok(Self { api_key }),
            Err(_) => Err(Error::AuthError(format!("{variable} not found"))),
        }
    }
}

#[derive(Clone)]
pub struct Client {
    pub auth: Auth,
    pub api_url: String,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn new(auth: Auth, api_url: impl Into<String>) -> Self {
        Self {
            auth,
            api_url: api_url.into(),
        }
    }
}

/// Decodes the `data` field of one server-sent event.
///
/// Returns `Ok(None)` for the `[DONE]` sentinel, otherwise the text carried by the first choice
/// (empty when the chunk only carries a role or a finish reason).
pub fn decode_event(data: &str) -> Result<Option<String>, Error> {
    if data.trim() == DONE {
        return Ok(None);
    }

    match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => Ok(Some(
            chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content)
                .unwrap_or_default(),
        )),
        Err(e) => match serde_json::from_str::<ErrorEnvelope>(data) {
            Ok(envelope) => Err(Error::Provider(envelope.error.message)),
            Err(_) => Err(Error::Serde(e)),
        },
    }
}

impl Client {
    /// Opens a streaming completion and yields the text deltas in arrival order.
    ///
    /// The stream finishes cleanly on `[DONE]`. Reconnection is disabled, so a dropped
    /// connection or a body that ends without the sentinel shows up as an error item.
    pub fn delta(
        &self,
        message_body: &MessageBody,
    ) -> Result<BoxStream<'static, Result<String, Error>>, Error> {
        log::debug!("message_body: {:#?}", message_body);

        let request_body = serde_json::to_value(message_body)?;

        let authorization: &str = &format!("Bearer {}", self.auth.api_key);

        let client = ClientBuilder::for_url(&(self.api_url.clone() + CHAT_API))?
            .header("content-type", "application/json")?
            .header("authorization", authorization)?
            .method("POST".into())
            .body(request_body.to_string())
            .reconnect(ReconnectOptions::reconnect(false).build())
            .build();

        let stream = client
            .stream()
            .map_err(Error::from)
            .and_then(|event| {
                future::ready(match event {
                    SSE::Connected(_) => Ok(Some(String::default())),
                    SSE::Event(ev) => decode_event(&ev.data),
                    SSE::Comment(comment) => {
                        log::debug!("Comment: {:#?}", comment);
                        Ok(Some(String::default()))
                    }
                })
            })
            // Only `[DONE]` ends the stream cleanly.
            .chain(stream::once(future::ready(Err(Error::Truncated))))
            .try_take_while(|delta| future::ready(Ok(delta.is_some())))
            .map_ok(Option::unwrap_or_default)
            .boxed();

        Ok(stream)
    }
}
