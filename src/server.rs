//! HTTP transport: the artifact, the live event stream and the docs page.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::get;
use futures::Stream;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::broadcast::{BuildEvent, EventBroadcaster, SubscriptionId};
use crate::build::Builder;
use crate::writer::INDEX_HTML;

/// Shared by every request handler.
#[derive(Clone)]
pub struct ServerState {
    builder: Arc<Builder>,
    broadcaster: Arc<EventBroadcaster>,
    /// Ends open event streams so graceful shutdown can complete.
    shutdown: CancellationToken,
}

impl ServerState {
    pub fn new(builder: Arc<Builder>, broadcaster: Arc<EventBroadcaster>) -> Self {
        Self {
            builder,
            broadcaster,
            shutdown: CancellationToken::new(),
        }
    }
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/openapi.json", get(openapi))
        .route("/events", get(events))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve on `listener` until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    state: ServerState,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    crate::log_event!("http", "listening", "{addr}");
    println!("Documentation: http://{addr}/");
    println!("Artifact:      http://{addr}/openapi.json");
    println!("Events:        http://{addr}/events");

    let state = ServerState {
        shutdown: cancel.clone(),
        ..state
    };
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    crate::log_event!("http", "stopped");
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn openapi(State(state): State<ServerState>) -> Response {
    match state.builder.current() {
        Some(artifact) => Json(artifact.document.clone()).into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

async fn events(
    State(state): State<ServerState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let id = state.broadcaster.subscribe(Arc::new(move |event: &BuildEvent| {
        let _ = tx.send(event.clone());
    }));
    let subscription = Subscription {
        broadcaster: state.broadcaster.clone(),
        id,
    };
    let shutdown = state.shutdown.clone();
    crate::debug_event!("http", "event stream opened");

    let stream = async_stream::stream! {
        // Dropped with the stream when the client goes away.
        let _subscription = subscription;
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => None,
                event = rx.recv() => event,
            };
            let Some(event) = event else { break };
            yield Ok(Event::default().event(event.name()).data(event.payload()));
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    )
}

/// Unsubscribes from the broadcaster on drop.
struct Subscription {
    broadcaster: Arc<EventBroadcaster>,
    id: SubscriptionId,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(self.id);
        crate::debug_event!("http", "event stream closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{ArtifactStatus, BuildArtifact};
    use crate::reference::{DereferenceError, Dereferencer};
    use crate::validate::StructuralValidator;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::path::{Path, PathBuf};

    struct NoSources;

    #[async_trait]
    impl Dereferencer for NoSources {
        async fn reference_paths(&self, _root: &Path) -> Result<Vec<String>, DereferenceError> {
            Ok(Vec::new())
        }

        async fn bundle(&self, _root: &Path) -> Result<Value, DereferenceError> {
            Ok(Value::Null)
        }
    }

    async fn start() -> (String, ServerState, CancellationToken) {
        let builder = Arc::new(Builder::new(
            PathBuf::from("/api/root.yaml"),
            Arc::new(NoSources),
            Arc::new(StructuralValidator::new()),
            json!({}),
        ));
        let state = ServerState::new(builder, Arc::new(EventBroadcaster::new()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let cancel = CancellationToken::new();
        tokio::spawn(serve(listener, state.clone(), cancel.clone()));
        (base, state, cancel)
    }

    #[tokio::test]
    async fn test_openapi_unavailable_until_built() {
        let (base, state, cancel) = start().await;

        let response = reqwest::get(format!("{base}/openapi.json")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.text().await.unwrap().is_empty());

        state.builder.commit(BuildArtifact::new(
            json!({ "openapi": "3.0.3" }),
            ArtifactStatus::Success,
        ));
        let response = reqwest::get(format!("{base}/openapi.json")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = serde_json::from_str(&response.text().await.unwrap()).unwrap();
        assert_eq!(body, json!({ "openapi": "3.0.3" }));

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_index_page() {
        let (base, _state, cancel) = start().await;

        let response = reqwest::get(format!("{base}/")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert!(response.text().await.unwrap().contains("EventSource"));

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_event_stream_replays_failure() {
        let (base, state, cancel) = start().await;
        state
            .broadcaster
            .set_replay(Some("Dereference error: boom".to_string()));

        let mut response = reqwest::get(format!("{base}/events")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let chunk = tokio::time::timeout(Duration::from_secs(5), response.chunk())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let text = String::from_utf8_lossy(&chunk);
        assert!(text.contains("event: build-error"), "{text}");
        assert!(text.contains("data: Dereference error: boom"), "{text}");
        assert_eq!(state.broadcaster.subscriber_count(), 1);

        state.broadcaster.emit(BuildEvent::Refresh);
        let chunk = tokio::time::timeout(Duration::from_secs(5), response.chunk())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(String::from_utf8_lossy(&chunk).contains("event: refresh"));

        cancel.cancel();
    }

    #[test]
    fn test_subscription_unsubscribes_on_drop() {
        let broadcaster = Arc::new(EventBroadcaster::new());
        let id = broadcaster.subscribe(Arc::new(|_: &BuildEvent| {}));
        assert_eq!(broadcaster.subscriber_count(), 1);

        drop(Subscription {
            broadcaster: broadcaster.clone(),
            id,
        });
        assert_eq!(broadcaster.subscriber_count(), 0);
    }
}
