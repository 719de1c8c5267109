use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use crate::{
    AppState,
    error::AppResult,
    extract::{AppJson, Requester},
    models::{LoginRequest, RegisterRequest, RegisterResponse, TokenResponse},
};

pub async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let (account, token) = state.auth.register(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { username: account.username, email: account.email, token }),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let token = state.auth.login(&req.username, &req.password).await?;
    Ok(Json(TokenResponse { token }))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    req: Requester,
) -> AppResult<Json<Value>> {
    let identity = req.caller.require_identity()?;
    state.auth.logout(identity).await?;
    Ok(Json(json!({ "detail": "logged out" })))
}
