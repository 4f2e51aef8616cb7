use futures::future::BoxFuture;
use futures::stream::{StreamExt, TryStreamExt};
use futures::FutureExt;

use crate::error::Error;
use crate::message::{ChatRequest, Message};
use crate::session::{ByteStream, Transport};

/// [`Transport`] that POSTs the conversation to a relay over HTTP.
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    url: String,
}

impl RelayClient {
    /// `url` is the full endpoint, e.g. `http://127.0.0.1:3000/api/chat`.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_http_client(reqwest::Client::new(), url)
    }

    pub fn with_http_client(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

impl Transport for RelayClient {
    fn send(&self, messages: Vec<Message>) -> BoxFuture<'static, Result<ByteStream, Error>> {
        log::debug!("posting {} messages to {}", messages.len(), self.url);

        let request = self.http.post(&self.url).json(&ChatRequest::new(messages));

        async move {
            let response = request.send().await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let body: ByteStream = response
                .bytes_stream()
                .map_ok(|bytes| bytes.to_vec())
                .map_err(Error::from)
                .boxed();

            Ok(body)
        }
        .boxed()
    }
}
