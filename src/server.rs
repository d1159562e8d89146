//! HTTP endpoint glue. A thin axum router; all real decisions
//! are made by `auth::Authenticator`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use crate::auth::{Authenticator, RequestMeta, TokenTrinity};
use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub authenticator: Arc<Authenticator>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/auth/signin", post(signin))
        .route("/api/v1/auth/refresh", post(refresh))
        .with_state(state)
}

pub async fn run(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(target: "auth", %addr, "identity service listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct SigninRequest {
    username: String,
    password: String,
}

/// Wraps a `TokenTrinity` so it is emitted with `Content-Type:
/// application/text` on success.
struct TrinityResponse(TokenTrinity);

impl IntoResponse for TrinityResponse {
    fn into_response(self) -> Response {
        let body = serde_json::to_vec(&self.0).unwrap_or_default();
        (StatusCode::OK, [("content-type", "application/text")], body).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

fn request_meta(headers: &HeaderMap, addr: SocketAddr) -> RequestMeta {
    let user_agent = headers.get("user-agent").and_then(|v| v.to_str().ok()).unwrap_or("").to_string();
    RequestMeta::new(addr.ip(), user_agent)
}

async fn signin(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<SigninRequest>,
) -> Result<TrinityResponse, AppError> {
    let meta = request_meta(&headers, addr);
    let user = state.authenticator.authenticate(&req.username, &req.password, &meta).await?;
    let trinity = state.authenticator.generate_token_trinity(&user, &meta).await?;
    Ok(TrinityResponse(trinity))
}

async fn refresh(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<TrinityResponse, AppError> {
    let meta = request_meta(&headers, addr);
    let token = String::from_utf8_lossy(&body).into_owned();
    let trinity = state.authenticator.refresh(&token, &meta).await?;
    Ok(TrinityResponse(trinity))
}
