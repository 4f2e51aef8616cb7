use chat_stream::message::Message;
use chat_stream::openai;
use futures::stream::BoxStream;

use crate::prelude::*;

pub const DEFAULT_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ENV: &str = "OPENAI_API_KEY";

/// Text fragments produced by a provider, in arrival order.
pub type DeltaStream = BoxStream<'static, std::result::Result<String, chat_stream::error::Error>>;

/// What the relay asks a provider to complete.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<Message>,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            system: system.into(),
            messages,
        }
    }
}

/// A hosted model that can stream a completion.
pub trait Provider: Send + Sync + 'static {
    fn stream(&self, request: CompletionRequest) -> Result<DeltaStream>;
}

#[derive(Debug)]
pub struct OpenAi {
    client: Option<openai::Client>,
    env: String,
    model: String,
    temperature: Option<f32>,
    top_p: Option<f32>,
    max_tokens: Option<u32>,
}

impl OpenAi {
    /// Builds the provider from the merged arguments.
    ///
    /// A missing credential is not fatal: the relay still starts and every call fails.
    pub fn from_args(args: &Args) -> Self {
        let env = args.api_env.clone().unwrap_or(DEFAULT_ENV.to_string());

        let auth = match args.api_key.clone() {
            Some(key) => Some(openai::Auth::new(key)),
            None => match openai::Auth::from_env(&env) {
                Ok(auth) => Some(auth),
                Err(e) => {
                    log::warn!("{}; every relay call will fail", e);
                    None
                }
            },
        };

        let url = args.api_base_url.clone().unwrap_or(DEFAULT_URL.to_string());
        log::info!("url: {}", url);

        Self {
            client: auth.map(|auth| openai::Client::new(auth, url)),
            env,
            model: args.model.clone().unwrap_or(DEFAULT_MODEL.to_string()),
            temperature: args.temperature,
            top_p: args.top_p,
            max_tokens: args.max_tokens,
        }
    }

    /// Builds the provider body: the system instruction first, then the conversation in order.
    pub fn body(&self, request: CompletionRequest) -> openai::MessageBody {
        let mut messages: Vec<openai::Message> = Vec::with_capacity(request.messages.len() + 1);

        messages.push(openai::Message {
            role: openai::Role::System,
            content: request.system,
        });
        messages.extend(request.messages.into_iter().map(openai::Message::from));

        let mut body = openai::MessageBody::new(&self.model, messages);

        body.temperature = self.temperature;
        body.top_p = self.top_p;
        body.max_tokens = self.max_tokens;

        body
    }
}

impl Provider for OpenAi {
    fn stream(&self, request: CompletionRequest) -> Result<DeltaStream> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| Error::MissingCredential(self.env.clone()))?;

        let body = self.body(request);
        log::debug!("body: {:#?}", body);

        Ok(client.delta(&body)?)
    }
}
