use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Custom parser function for JSON values
fn parse_json(s: &str) -> std::result::Result<Value, serde_json::Error> {
    serde_json::from_str(s)
}

#[derive(Default, Clone, Debug, Parser, PartialEq, Serialize, Deserialize)]
#[command(name = "chat-relay", version = "0.1.0")]
#[command(about = "Relay chat conversations to an LLM and stream the reply back")]
#[command(
    long_about = "Runs an HTTP relay between a chat front-end and a hosted LLM provider.

Clients POST the whole conversation to `/api/chat`. The relay prepends a fixed system
instruction, opens a streaming completion with the provider, and forwards every fragment
as soon as it arrives, framed one part per line.

Options can be set through command line arguments, environment variables, or a TOML
configuration file. The system instruction is a template rendered once at startup with
the configured `vars`, so the assistant persona can change without touching the code."
)]
pub struct Args {
    /// Address to listen on.
    #[clap(long, env = "CHAT_RELAY_BIND")]
    pub bind: Option<String>,

    /// The LLM Model to use
    #[clap(short, long, env = "CHAT_RELAY_MODEL")]
    pub model: Option<String>,

    /// The maximum amount of tokens to return.
    #[clap(long)]
    pub max_tokens: Option<u32>,

    /// The environment variable to use to get the access token for the api.
    #[clap(long)]
    pub api_env: Option<String>,

    /// The api key to use (will override the value of the environment variable.)
    #[clap(long)]
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// The api base url.
    #[clap(long)]
    pub api_base_url: Option<String>,

    /// System instruction template prepended to every conversation.
    #[clap(long)]
    pub system: Option<String>,

    /// Temperature value.
    #[clap(long)]
    pub temperature: Option<f32>,

    /// Top-P value.
    #[clap(long)]
    pub top_p: Option<f32>,

    /// Additional template variables in JSON format
    #[clap(long, value_parser = parse_json)]
    pub vars: Option<Value>,

    /// Origins allowed to call the relay from a browser.
    #[clap(long = "allowed-origin")]
    pub allowed_origins: Option<Vec<String>>,

    /// Config dir where the configuration will be stored.
    #[clap(long, default_value = "~/.config/chat-relay")]
    #[serde(skip_serializing)]
    pub config_dir: String,

    /// Config file. If undefined, it will be set as `config_dir/config.toml`.
    #[clap(long)]
    #[serde(skip_serializing)]
    pub config_file: Option<String>,

    /// Prints the rendered system instruction and exits.
    #[clap(long, default_value = "false")]
    #[serde(skip_serializing, default)]
    pub print_system: bool,
}
