use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    error::{AppError, AppResult},
    extract::{AppJson, AppPath, Requester},
    models::{PlatformInput, PlatformResponse},
    policy::{Action, Resource, authorize},
    throttle::Endpoint,
};

pub async fn list(
    State(state): State<Arc<AppState>>,
    req: Requester,
) -> AppResult<Json<Vec<PlatformResponse>>> {
    authorize(&req.caller, Resource::Platform, Action::Read)?;
    state.throttle.check(Endpoint::Catalog, &req.caller, &req.client)?;

    let rows = state.platforms.list().await?;
    Ok(Json(rows.into_iter().map(|(p, titles)| PlatformResponse::new(p, titles)).collect()))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    req: Requester,
    body: Result<AppJson<PlatformInput>, AppError>,
) -> AppResult<(StatusCode, Json<PlatformResponse>)> {
    authorize(&req.caller, Resource::Platform, Action::Write)?;
    state.throttle.check(Endpoint::Catalog, &req.caller, &req.client)?;
    let AppJson(input) = body?;
    input.validate()?;

    let created = state.platforms.create(input).await?;
    tracing::info!(platform_id = created.id, name = %created.name, "platform created");
    Ok((StatusCode::CREATED, Json(PlatformResponse::new(created, Vec::new()))))
}

pub async fn detail(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
    req: Requester,
) -> AppResult<Json<PlatformResponse>> {
    authorize(&req.caller, Resource::Platform, Action::Read)?;
    state.throttle.check(Endpoint::Catalog, &req.caller, &req.client)?;

    let (found, titles) = state.platforms.get(id).await?;
    Ok(Json(PlatformResponse::new(found, titles)))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
    req: Requester,
    body: Result<AppJson<PlatformInput>, AppError>,
) -> AppResult<Json<PlatformResponse>> {
    authorize(&req.caller, Resource::Platform, Action::Write)?;
    state.throttle.check(Endpoint::Catalog, &req.caller, &req.client)?;
    let AppJson(input) = body?;
    input.validate()?;

    state.platforms.update(id, input).await?;
    let (found, titles) = state.platforms.get(id).await?;
    Ok(Json(PlatformResponse::new(found, titles)))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
    req: Requester,
) -> AppResult<StatusCode> {
    authorize(&req.caller, Resource::Platform, Action::Write)?;
    state.throttle.check(Endpoint::Catalog, &req.caller, &req.client)?;

    state.platforms.delete(id).await?;
    tracing::info!(platform_id = id, "platform deleted");
    Ok(StatusCode::NO_CONTENT)
}
