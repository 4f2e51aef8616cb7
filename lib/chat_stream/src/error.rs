#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("auth error: {0}")]
    AuthError(String),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("eventsource error: {0}")]
    EventSource(#[from] eventsource_client::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("relay responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider error: {0}")]
    Provider(String),
    #[error("invalid stream line: {0}")]
    InvalidLine(String),
    #[error("stream fragment is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("stream ended before the finish marker")]
    Truncated,
    #[error("{0}")]
    Stream(String),
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
