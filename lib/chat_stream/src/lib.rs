//! Streaming chat plumbing shared by the relay and its clients.
//!
//! The relay side talks to the provider through [`openai::Client`] and frames the reply with
//! [`data_stream::StreamPart`]. The client side feeds the framed bytes into a [`chat::Chat`],
//! usually through a [`session::Session`] backed by a [`relay_client::RelayClient`].

pub mod chat;
pub mod data_stream;
pub mod error;
pub mod message;
pub mod openai;
pub mod relay_client;
pub mod session;
