mod dto;
pub mod handlers;
pub mod presence;
pub mod repo;
pub mod services;

pub use dto::ActiveUserView;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
