use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{ConnectInfo, FromRequest, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::{
    AppState,
    auth::{Caller, token_from_header},
    error::AppError,
};

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

/// Who is calling and from where. A request without an `Authorization`
/// header is anonymous; a header with an unknown token is rejected.
#[derive(Clone, Debug)]
pub struct Requester {
    pub caller: Caller,
    pub client: String,
}

impl FromRequestParts<Arc<AppState>> for Requester {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let client = client_addr(parts);

        let caller = match parts.headers.get(AUTHORIZATION) {
            None => Caller::Anonymous,
            Some(value) => {
                let key = value
                    .to_str()
                    .ok()
                    .and_then(token_from_header)
                    .ok_or(AppError::Unauthenticated("invalid token header"))?;
                Caller::User(state.auth.resolve(key).await?)
            },
        };

        Ok(Self { caller, client })
    }
}

fn client_addr(parts: &Parts) -> String {
    let forwarded = parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(addr) = forwarded {
        return addr.to_string();
    }

    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
