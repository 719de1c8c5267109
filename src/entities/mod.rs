pub mod auth_token;
pub mod platform;
pub mod review;
pub mod title;
pub mod user;
