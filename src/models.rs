use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::{
    entities::{platform, review, title},
    error::{AppError, AppResult},
};

fn default_true() -> bool {
    true
}

fn timestamp(secs: i64) -> Timestamp {
    Timestamp::from_second(secs).unwrap_or(Timestamp::UNIX_EPOCH)
}

#[derive(Debug, Deserialize)]
pub struct PlatformInput {
    pub name: String,
    #[serde(default, alias = "description")]
    pub about: String,
    pub website: String,
}

#[derive(Debug, Deserialize)]
pub struct TitleInput {
    pub platform: i32,
    pub title: String,
    #[serde(default)]
    pub storyline: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReviewInput {
    pub rating: i32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn check_len(field: &str, value: &str, min: usize, max: usize) -> AppResult<()> {
    let len = value.chars().count();
    if len < min {
        return Err(AppError::validation(format!("{field} may not be blank")));
    }
    if len > max {
        return Err(AppError::validation(format!("{field} must be at most {max} characters")));
    }
    Ok(())
}

impl PlatformInput {
    pub fn validate(&self) -> AppResult<()> {
        check_len("name", self.name.trim(), 1, 30)?;
        check_len("about", &self.about, 0, 150)?;

        let website = self.website.trim();
        check_len("website", website, 1, 100)?;
        let host = website
            .strip_prefix("https://")
            .or_else(|| website.strip_prefix("http://"))
            .unwrap_or_default();
        if host.is_empty() || host.starts_with('/') || host.contains(char::is_whitespace) {
            return Err(AppError::validation("website must be a valid http(s) URL"));
        }
        Ok(())
    }
}

impl TitleInput {
    pub fn validate(&self) -> AppResult<()> {
        check_len("title", self.title.trim(), 1, 50)?;
        check_len("storyline", &self.storyline, 0, 200)
    }
}

impl ReviewInput {
    pub const MIN_RATING: i32 = 1;
    pub const MAX_RATING: i32 = 5;

    pub fn validate(&self) -> AppResult<()> {
        if !(Self::MIN_RATING..=Self::MAX_RATING).contains(&self.rating) {
            return Err(AppError::validation(format!(
                "rating must be between {} and {}",
                Self::MIN_RATING,
                Self::MAX_RATING
            )));
        }
        match &self.description {
            Some(description) => check_len("description", description, 0, 200),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlatformResponse {
    pub id: i32,
    pub name: String,
    pub about: String,
    pub website: String,
    pub watchlist: Vec<TitleResponse>,
}

impl PlatformResponse {
    pub fn new(platform: platform::Model, titles: Vec<title::Model>) -> Self {
        let name = &platform.name;
        let watchlist =
            titles.into_iter().map(|t| TitleResponse::new(t, Some(name.clone()))).collect();
        Self {
            id: platform.id,
            name: platform.name,
            about: platform.about,
            website: platform.website,
            watchlist,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TitleResponse {
    pub id: i32,
    pub platform: i32,
    pub platform_name: Option<String>,
    pub title: String,
    pub storyline: String,
    pub active: bool,
    pub avg_rating: f64,
    pub number_rating: i32,
    pub created: Timestamp,
}

impl TitleResponse {
    pub fn new(title: title::Model, platform_name: Option<String>) -> Self {
        Self {
            id: title.id,
            platform: title.platform_id,
            platform_name,
            title: title.title,
            storyline: title.storyline,
            active: title.active,
            avg_rating: title.avg_rating,
            number_rating: title.number_rating,
            created: timestamp(title.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub id: i32,
    pub review_user: String,
    pub watchlist: i32,
    pub rating: i32,
    pub description: Option<String>,
    pub active: bool,
    pub created: Timestamp,
    pub updated: Timestamp,
}

impl ReviewResponse {
    pub fn new(review: review::Model, review_user: String) -> Self {
        Self {
            id: review.id,
            review_user,
            watchlist: review.title_id,
            rating: review.rating,
            description: review.description,
            active: review.active,
            created: timestamp(review.created_at),
            updated: timestamp(review.updated_at),
        }
    }
}

/// One page of a listing with links to the neighbouring pages.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TitleQuery {
    pub search: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl TitleQuery {
    pub fn paging(&self) -> PageQuery {
        PageQuery { page: self.page, page_size: self.page_size }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ReviewFilter {
    pub username: Option<String>,
    pub active: Option<bool>,
}

/// `review_user__username` is the legacy spelling of `username`; when both
/// are sent, `username` wins.
#[derive(Debug, Default, Deserialize)]
pub struct ReviewListQuery {
    pub username: Option<String>,
    #[serde(rename = "review_user__username")]
    pub review_user: Option<String>,
    pub active: Option<bool>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl ReviewListQuery {
    pub fn filter(&self) -> ReviewFilter {
        let username = self.username.as_ref().or(self.review_user.as_ref()).cloned();
        ReviewFilter { username, active: self.active }
    }

    pub fn paging(&self) -> PageQuery {
        PageQuery { page: self.page, page_size: self.page_size }
    }
}

#[derive(Debug, Deserialize)]
pub struct UserReviewQuery {
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub password: String,
    pub password2: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub username: String,
    pub email: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}
