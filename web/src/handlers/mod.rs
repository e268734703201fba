//! HTTP request handlers.

pub mod auth;
pub mod health;
pub mod login;

pub use health::health_check;
pub use login::login_page;
