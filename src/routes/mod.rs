mod accounts;
mod platforms;
mod reviews;
mod titles;


use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{AppState, models::Page, repo::Paged};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/account/register", post(accounts::register))
        .route("/account/login", post(accounts::login))
        .route("/account/logout", post(accounts::logout))
        .route("/platforms", get(platforms::list).post(platforms::create))
        .route(
            "/platforms/{id}",
            get(platforms::detail).put(platforms::update).delete(platforms::delete),
        )
        .route("/titles", get(titles::list).post(titles::create))
        .route("/titles/{id}", get(titles::detail).put(titles::update).delete(titles::delete))
        .route("/titles/{id}/reviews", get(reviews::list_for_title).post(reviews::create))
        .route("/reviews", get(reviews::by_username))
        .route("/reviews/{id}", get(reviews::detail).put(reviews::update).delete(reviews::delete))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}

/// Wraps a fetched page with `next`/`previous` links that keep `params`.
fn into_page<T, U>(
    paged: Paged<T>,
    path: &str,
    params: &[(&str, String)],
    f: impl FnMut(T) -> U,
) -> Page<U> {
    let next = paged.has_next().then(|| page_url(path, params, paged.paging.page + 1));
    let previous = paged.has_previous().then(|| page_url(path, params, paged.paging.page - 1));

    Page { count: paged.count, next, previous, results: paged.items.into_iter().map(f).collect() }
}

fn page_url(path: &str, params: &[(&str, String)], page: u64) -> String {
    let mut query: Vec<String> =
        params.iter().map(|(k, v)| format!("{k}={}", urlencoding::encode(v))).collect();
    if page > 1 {
        query.push(format!("page={page}"));
    }

    if query.is_empty() { path.to_string() } else { format!("{path}?{}", query.join("&")) }
}
