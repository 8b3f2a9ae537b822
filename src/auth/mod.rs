use crate::state::AppState;
use axum::Router;

mod credentials;
mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
