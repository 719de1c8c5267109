use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    error::{AppError, AppResult},
    extract::{AppJson, AppPath, AppQuery, Requester},
    models::{Page, ReviewInput, ReviewListQuery, ReviewResponse, UserReviewQuery},
    policy::{Action, Resource, authorize},
    repo::{Paging, ReviewWithUser},
    throttle::Endpoint,
};

use super::into_page;

fn respond((review, user): ReviewWithUser) -> ReviewResponse {
    ReviewResponse::new(review, user.map(|u| u.username).unwrap_or_default())
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    AppPath(title_id): AppPath<i32>,
    req: Requester,
    body: Result<AppJson<ReviewInput>, AppError>,
) -> AppResult<(StatusCode, Json<ReviewResponse>)> {
    let reviewer = req.caller.require_identity()?;
    state.throttle.check(Endpoint::ReviewCreate, &req.caller, &req.client)?;
    let AppJson(input) = body?;

    let created = state.ratings.create_review(title_id, reviewer, input).await?;
    Ok((StatusCode::CREATED, Json(ReviewResponse::new(created, reviewer.username.clone()))))
}

pub async fn list_for_title(
    State(state): State<Arc<AppState>>,
    AppPath(title_id): AppPath<i32>,
    req: Requester,
    AppQuery(query): AppQuery<ReviewListQuery>,
) -> AppResult<Json<Page<ReviewResponse>>> {
    state.throttle.check(Endpoint::ReviewList, &req.caller, &req.client)?;

    let paging =
        Paging::resolve(query.paging(), state.config.page_size, state.config.max_page_size)?;
    let filter = query.filter();
    let paged = state.reviews.list_for_title(title_id, &filter, paging).await?;

    let mut params = Vec::new();
    if let Some(username) = &filter.username {
        params.push(("username", username.clone()));
    }
    if let Some(active) = filter.active {
        params.push(("active", active.to_string()));
    }
    if query.page_size.is_some() {
        params.push(("page_size", paging.size.to_string()));
    }

    let path = format!("/titles/{title_id}/reviews");
    Ok(Json(into_page(paged, &path, &params, respond)))
}

pub async fn by_username(
    State(state): State<Arc<AppState>>,
    req: Requester,
    AppQuery(query): AppQuery<UserReviewQuery>,
) -> AppResult<Json<Vec<ReviewResponse>>> {
    state.throttle.check(Endpoint::Catalog, &req.caller, &req.client)?;

    let Some(username) = query.username.as_deref().map(str::trim).filter(|u| !u.is_empty())
    else {
        return Ok(Json(Vec::new()));
    };

    let rows = state.reviews.list_by_username(username).await?;
    Ok(Json(rows.into_iter().map(respond).collect()))
}

pub async fn detail(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
    req: Requester,
) -> AppResult<Json<ReviewResponse>> {
    let found = state.reviews.get(id).await?;
    authorize(&req.caller, Resource::Review { owner_id: found.0.user_id }, Action::Read)?;
    state.throttle.check(Endpoint::ReviewDetail, &req.caller, &req.client)?;
    Ok(Json(respond(found)))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
    req: Requester,
    body: Result<AppJson<ReviewInput>, AppError>,
) -> AppResult<Json<ReviewResponse>> {
    let (existing, user) = state.reviews.get(id).await?;
    authorize(&req.caller, Resource::Review { owner_id: existing.user_id }, Action::Write)?;
    state.throttle.check(Endpoint::ReviewDetail, &req.caller, &req.client)?;
    let AppJson(input) = body?;
    input.validate()?;

    let updated = state.reviews.update(existing, input).await?;
    tracing::info!(review_id = id, "review updated");
    Ok(Json(respond((updated, user))))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
    req: Requester,
) -> AppResult<StatusCode> {
    let (existing, _) = state.reviews.get(id).await?;
    authorize(&req.caller, Resource::Review { owner_id: existing.user_id }, Action::Write)?;
    state.throttle.check(Endpoint::ReviewDetail, &req.caller, &req.client)?;

    state.reviews.delete(existing).await?;
    tracing::info!(review_id = id, "review deleted");
    Ok(StatusCode::NO_CONTENT)
}
