mod dto;
pub mod advisor;
pub mod handlers;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub use advisor::{FeedAdvisor, NoopAdvisor};

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::feed_routes())
}
