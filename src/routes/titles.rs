use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    error::{AppError, AppResult},
    extract::{AppJson, AppPath, AppQuery, Requester},
    models::{Page, TitleInput, TitleQuery, TitleResponse},
    policy::{Action, Resource, authorize},
    repo::Paging,
    throttle::Endpoint,
};

use super::into_page;

pub async fn list(
    State(state): State<Arc<AppState>>,
    req: Requester,
    AppQuery(query): AppQuery<TitleQuery>,
) -> AppResult<Json<Page<TitleResponse>>> {
    authorize(&req.caller, Resource::Title, Action::Read)?;
    state.throttle.check(Endpoint::Catalog, &req.caller, &req.client)?;

    let paging =
        Paging::resolve(query.paging(), state.config.page_size, state.config.max_page_size)?;
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let paged = state.titles.list(search, paging).await?;

    let mut params = Vec::new();
    if let Some(search) = search {
        params.push(("search", search.to_string()));
    }
    if query.page_size.is_some() {
        params.push(("page_size", paging.size.to_string()));
    }

    Ok(Json(into_page(paged, "/titles", &params, |(title, platform)| {
        TitleResponse::new(title, platform.map(|p| p.name))
    })))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    req: Requester,
    body: Result<AppJson<TitleInput>, AppError>,
) -> AppResult<(StatusCode, Json<TitleResponse>)> {
    authorize(&req.caller, Resource::Title, Action::Write)?;
    state.throttle.check(Endpoint::Catalog, &req.caller, &req.client)?;
    let AppJson(input) = body?;
    input.validate()?;

    let (created, platform) = state.titles.create(input).await?;
    tracing::info!(title_id = created.id, platform_id = platform.id, "title created");
    Ok((StatusCode::CREATED, Json(TitleResponse::new(created, Some(platform.name)))))
}

pub async fn detail(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
    req: Requester,
) -> AppResult<Json<TitleResponse>> {
    authorize(&req.caller, Resource::Title, Action::Read)?;
    state.throttle.check(Endpoint::Catalog, &req.caller, &req.client)?;

    let (found, platform) = state.titles.get(id).await?;
    Ok(Json(TitleResponse::new(found, platform.map(|p| p.name))))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
    req: Requester,
    body: Result<AppJson<TitleInput>, AppError>,
) -> AppResult<Json<TitleResponse>> {
    authorize(&req.caller, Resource::Title, Action::Write)?;
    state.throttle.check(Endpoint::Catalog, &req.caller, &req.client)?;
    let AppJson(input) = body?;
    input.validate()?;

    let (updated, platform) = state.titles.update(id, input).await?;
    Ok(Json(TitleResponse::new(updated, Some(platform.name))))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
    req: Requester,
) -> AppResult<StatusCode> {
    authorize(&req.caller, Resource::Title, Action::Write)?;
    state.throttle.check(Endpoint::Catalog, &req.caller, &req.client)?;

    state.titles.delete(id).await?;
    tracing::info!(title_id = id, "title deleted");
    Ok(StatusCode::NO_CONTENT)
}
