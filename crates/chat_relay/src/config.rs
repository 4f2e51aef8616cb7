use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    // Server
    #[serde(default = "default_bind")]
    pub bind: Option<String>,
    pub allowed_origins: Option<Vec<String>>,

    // Api
    #[serde(default = "default_base_url")]
    pub base_url: Option<String>,
    #[serde(default = "default_env")]
    pub env: Option<String>,
    pub key: Option<String>,

    // Model
    #[serde(default = "default_model")]
    pub model: Option<String>,

    // Model Configuration
    #[serde(default = "default_system")]
    pub system: Option<String>,
    pub vars: Option<Value>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

impl Config {
    /// Config populated with the built-in defaults.
    pub fn new() -> Self {
        Self {
            bind: default_bind(),
            base_url: default_base_url(),
            env: default_env(),
            model: default_model(),
            system: default_system(),
            ..Default::default()
        }
    }
}

fn default_bind() -> Option<String> {
    Some("127.0.0.1:3000".to_string())
}

fn default_base_url() -> Option<String> {
    Some(crate::provider::DEFAULT_URL.to_string())
}

fn default_env() -> Option<String> {
    Some(crate::provider::DEFAULT_ENV.to_string())
}

fn default_model() -> Option<String> {
    Some(crate::provider::DEFAULT_MODEL.to_string())
}

fn default_system() -> Option<String> {
    Some(crate::prelude::DEFAULT_SYSTEM.to_string())
}
