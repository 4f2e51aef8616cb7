use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::{CONTENT_TYPE, ORIGIN};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chat_stream::data_stream::{self, FinishMessage, FinishStep, StartStep, StreamPart};
use chat_stream::message::ChatRequest;
use futures::future;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::prelude::*;
use crate::provider::{CompletionRequest, DeltaStream, OpenAi, Provider};

pub const CHAT_PATH: &str = "/api/chat";

const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Shared, read-only state of the relay. Nothing here changes between requests.
#[derive(Clone)]
pub struct Relay {
    provider: Arc<dyn Provider>,
    system: Arc<str>,
}

impl Relay {
    pub fn new(provider: impl Provider, system: impl Into<String>) -> Self {
        Self {
            provider: Arc::new(provider),
            system: system.into().into(),
        }
    }
}

pub fn router(relay: Relay, allowed_origins: &[String]) -> Result<Router> {
    let router = Router::new()
        .route(CHAT_PATH, post(chat))
        .with_state(relay);

    if allowed_origins.is_empty() {
        return Ok(router);
    }

    let origins = allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|_| Error::InvalidOrigin(origin.clone()))
        })
        .collect::<Result<Vec<_>>>()?;

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::POST])
        .allow_headers([CONTENT_TYPE, ORIGIN]);

    Ok(router.layer(cors))
}

async fn chat(
    State(relay): State<Relay>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = payload?;
    request.validate()?;

    log::info!("relaying a conversation of {} messages", request.messages.len());

    let mut deltas = relay
        .provider
        .stream(CompletionRequest::new(&*relay.system, request.messages))?
        .try_filter(|text| future::ready(!text.is_empty()))
        .boxed();

    // Hold the response until the provider produced something, so a failed call still gets a
    // proper status code.
    let first = match deltas.next().await {
        Some(Err(e)) => return Err(Error::Provider(e)),
        first => first,
    };

    let deltas: DeltaStream = stream::iter(first).chain(deltas).boxed();
    let message_id = format!("msg-{}", xid::new());

    let body = parts(message_id, deltas).map(|part| Ok::<_, Infallible>(part.to_string()));

    Ok((
        [
            (CONTENT_TYPE, data_stream::CONTENT_TYPE),
            (
                HeaderName::from_static(data_stream::HEADER_NAME),
                data_stream::HEADER_VALUE,
            ),
        ],
        Body::from_stream(body),
    )
        .into_response())
}

/// Frames the provider fragments as stream parts.
///
/// A provider failure ends the stream with an error part and no finish parts.
fn parts(message_id: String, deltas: DeltaStream) -> impl Stream<Item = StreamPart> + Send {
    let start = StreamPart::StartStep(StartStep { message_id });

    let rest = stream::unfold(Some(deltas), |deltas| async move {
        let Some(mut deltas) = deltas else {
            return None;
        };

        let parts = match deltas.next().await {
            Some(Ok(text)) => return Some((vec![StreamPart::Text(text)], Some(deltas))),
            Some(Err(e)) => {
                log::error!("provider stream failed: {}", e);
                vec![StreamPart::Error(e.to_string())]
            }
            None => vec![
                StreamPart::FinishStep(FinishStep::default()),
                StreamPart::FinishMessage(FinishMessage::default()),
            ],
        };

        Some((parts, None))
    });

    stream::once(future::ready(vec![start]))
        .chain(rest)
        .flat_map(stream::iter)
}

pub async fn serve(args: Args) -> Result<()> {
    let system = render_system(&args)?;
    let relay = Relay::new(OpenAi::from_args(&args), system);

    let app = router(relay, args.allowed_origins.as_deref().unwrap_or_default())?;

    let bind = args.bind.unwrap_or(DEFAULT_BIND.to_string());
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    log::info!("listening on http://{}{}", listener.local_addr()?, CHAT_PATH);

    axum::serve(listener, app).await?;

    Ok(())
}
