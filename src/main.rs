mod auth;
mod config;
mod db;
mod entities;
mod error;
mod extract;
mod models;
mod policy;
mod rating;
mod repo;
mod routes;
mod throttle;

use std::{net::SocketAddr, sync::Arc};

use sea_orm::DatabaseConnection;

use crate::{
    auth::AuthService,
    config::Config,
    rating::RatingAggregator,
    repo::{PlatformRepo, ReviewRepo, TitleRepo},
    throttle::Throttle,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: AuthService,
    pub platforms: PlatformRepo,
    pub titles: TitleRepo,
    pub reviews: ReviewRepo,
    pub ratings: RatingAggregator,
    pub throttle: Arc<Throttle>,
}

impl AppState {
    pub fn new(config: Arc<Config>, db: DatabaseConnection) -> Self {
        Self {
            throttle: Arc::new(Throttle::new(&config.rates)),
            auth: AuthService::new(db.clone()),
            platforms: PlatformRepo::new(db.clone()),
            titles: TitleRepo::new(db.clone()),
            reviews: ReviewRepo::new(db.clone()),
            ratings: RatingAggregator::new(db),
            config,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,watchmate=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    let db = db::connect_and_migrate(&config.database_url).await?;
    let state = Arc::new(AppState::new(config.clone(), db));

    if let Some(admin) = &config.admin {
        state.auth.ensure_admin(&admin.username, &admin.password).await?;
    }

    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
