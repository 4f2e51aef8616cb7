use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
    #[error("toml serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("config file error: {0}")]
    ConfigFile(#[from] config_file::ConfigFileError),
    #[error("template error: {0}")]
    Tera(#[from] tera::Error),
    #[error("invalid allowed origin: {0}")]
    InvalidOrigin(String),
    #[error("invalid request body: {0}")]
    BadRequest(String),
    #[error("missing credential: set {0} or pass --api-key")]
    MissingCredential(String),
    #[error(transparent)]
    Provider(#[from] chat_stream::error::Error),
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::BadRequest(rejection.body_text())
    }
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Provider(chat_stream::error::Error::InvalidMessage(_)) => {
                StatusCode::BAD_REQUEST
            }
            Error::Provider(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            log::error!("{}", self);
        } else {
            log::warn!("{}", self);
        }

        (
            status,
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_stream::error::Error as StreamError;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::BadRequest("nope".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::Provider(StreamError::InvalidMessage("empty".to_string())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::Provider(StreamError::Provider("overloaded".to_string())).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            Error::MissingCredential("OPENAI_API_KEY".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
