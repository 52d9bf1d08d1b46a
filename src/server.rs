//! HTTP boundary for the guestbook UI.
//!
//! | Route | Operation |
//! |---|---|
//! | `POST /api/comments` | create, `201 { data: Comment }` |
//! | `GET /api/comments` | list, newest first |
//! | `POST /api/comments/{id}/like` | like, `{ data: Comment + hasLiked }` |
//! | `GET /health` | store liveness |
//!
//! `/api/comment` is kept as an alias for create and list; older UI builds
//! still call it.
//!
//! Every failure is `{ "error": <message>, "code": <stable code> }`.

use std::{convert::Infallible, net::SocketAddr, time::Duration};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{ConnectInfo, FromRequestParts, Path, State, rejection::JsonRejection},
    http::{HeaderMap, Method, StatusCode, header::CONTENT_TYPE, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tokio::{net::TcpListener, signal::ctrl_c};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use crate::error::{ErrorCode, GuestbookError};
use crate::models::{Comment, NewComment};
use crate::store::CommentStore;

const PING_TIMEOUT: Duration = Duration::from_secs(1);

pub const UNKNOWN_VISITOR: &str = "unknown";

#[derive(Serialize)]
struct Data<T> {
    data: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikedComment {
    #[serde(flatten)]
    pub comment: Comment,
    pub has_liked: bool,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    code: ErrorCode,
}

/// A core failure plus what the caller was trying to do, for the generic
/// message on server-side errors.
#[derive(Debug)]
pub struct ApiError {
    error: GuestbookError,
    action: &'static str,
}

impl ApiError {
    fn on(action: &'static str) -> impl FnOnce(GuestbookError) -> Self {
        move |error| Self { error, action }
    }

    fn status(&self) -> StatusCode {
        match self.error.code() {
            ErrorCode::ValidationError | ErrorCode::AlreadyLiked => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Timeout => StatusCode::REQUEST_TIMEOUT,
            ErrorCode::DecryptionError | ErrorCode::PersistenceError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn message(&self) -> String {
        match &self.error {
            GuestbookError::Validation(msg) => msg.clone(),
            GuestbookError::NotFound(_) => "Comment not found".to_string(),
            GuestbookError::AlreadyLiked => self.error.to_string(),
            GuestbookError::Timeout(_) => "Request timed out, please try again".to_string(),
            GuestbookError::Decryption { .. } | GuestbookError::Persistence(_) => {
                format!("Failed to {}", self.action)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(action = self.action, error = %self.error, "Request failed");
        }

        let message = self.message();
        let body = ErrorBody {
            error: &message,
            code: self.error.code(),
        };
        (status, Json(body)).into_response()
    }
}

/// Best-effort client identity used to deduplicate likes.
///
/// Taken from the first `X-Forwarded-For` hop, then `X-Real-IP`, then the
/// peer address. This is trivially spoofable and is not an auth boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitorId(pub String);

impl VisitorId {
    fn from_parts(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>) -> Self {
        let forwarded = |name: &str| {
            headers
                .get(name)?
                .to_str()
                .ok()?
                .split(',')
                .next()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };

        let id = forwarded("x-forwarded-for")
            .or_else(|| forwarded("x-real-ip"))
            .or_else(|| peer.map(|ConnectInfo(addr)| addr.ip().to_string()))
            .unwrap_or_else(|| UNKNOWN_VISITOR.to_string());
        Self(id)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for VisitorId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(
            &parts.headers,
            parts.extensions.get::<ConnectInfo<SocketAddr>>(),
        ))
    }
}

async fn create_handler(
    State(store): State<CommentStore>,
    payload: Result<Json<NewComment>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(input) = payload.map_err(|e| ApiError {
        error: GuestbookError::validation(e.body_text()),
        action: "create comment",
    })?;

    let comment = store
        .create(input)
        .await
        .map_err(ApiError::on("create comment"))?;
    Ok((StatusCode::CREATED, Json(Data { data: comment })))
}

async fn list_handler(State(store): State<CommentStore>) -> Result<impl IntoResponse, ApiError> {
    let comments = store
        .list()
        .await
        .map_err(ApiError::on("fetch comments"))?;
    Ok(Json(Data { data: comments }))
}

async fn like_handler(
    State(store): State<CommentStore>,
    Path(id): Path<String>,
    VisitorId(visitor): VisitorId,
) -> Result<impl IntoResponse, ApiError> {
    let comment = store
        .like(&id, &visitor)
        .await
        .map_err(ApiError::on("like comment"))?;
    Ok(Json(Data {
        data: LikedComment {
            comment,
            has_liked: true,
        },
    }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health_handler(State(store): State<CommentStore>) -> Response {
    let (status_code, status) = match tokio::time::timeout(PING_TIMEOUT, store.ping()).await {
        Ok(Ok(())) => (StatusCode::OK, "pass"),
        Ok(Err(_)) | Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "fail"),
    };
    (status_code, Json(HealthResponse { status })).into_response()
}

pub fn create_app(store: CommentStore) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/comments", get(list_handler).post(create_handler))
        .route("/api/comment", get(list_handler).post(create_handler))
        .route("/api/comments/{id}/like", post(like_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(store)
}

/// Serve until Ctrl-C or SIGTERM. The store is closed once in-flight
/// requests drain.
pub async fn serve(store: CommentStore, port: u16) -> anyhow::Result<()> {
    let app = create_app(store);

    let address = format!("0.0.0.0:{port}");
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server shut down, store closed");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => error!("Failed to listen for Ctrl+C: {e}"),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
