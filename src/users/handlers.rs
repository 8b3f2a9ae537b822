use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};

use super::{
    dto::{
        HomeResponse, NearbyListResponse, NearbyUserView, ProfileResponse, UpdateProfileRequest,
        UpdatedProfileResponse,
    },
    presence,
    repo::User,
    services::{nearby_for, profile_update},
};
use crate::{
    auth::extractors::AuthUser,
    error::{ApiResponse, ApiResult},
    extract::ApiJson,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/perfil", get(profile))
        .route("/actualizar", post(update_profile))
        .route("/actualizar/ubicacion", get(nearby_users))
        .route("/home", get(home))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<ProfileResponse> {
    let window = state.config.proximity.activity_window_secs;
    let is_active = presence::is_active(user.last_activity, OffsetDateTime::now_utc(), window);
    Ok(ApiResponse::ok(ProfileResponse {
        id: user.id,
        email: user.email,
        username: user.username,
        first_name: user.first_name,
        last_name: user.last_name,
        phone: user.phone,
        latitude: user.latitude,
        longitude: user.longitude,
        is_online: user.is_online,
        is_active,
        last_activity: user.last_activity,
        created_at: user.created_at,
    }))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> ApiResult<UpdatedProfileResponse> {
    let update = profile_update(payload)?;
    let user = User::update_profile(&state.db, user.id, &update).await?;
    info!(moved = update.position.is_some(), "profile updated");

    Ok(ApiResponse::ok(UpdatedProfileResponse {
        id: user.id,
        username: user.username,
        latitude: user.latitude,
        longitude: user.longitude,
        is_online: user.is_online,
        last_activity: user.last_activity,
        message: "Datos actualizados correctamente",
    }))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn nearby_users(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<NearbyListResponse> {
    let users: Vec<NearbyUserView> = nearby_for(&state, &user, None)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    let total = users.len();
    Ok(ApiResponse::ok(NearbyListResponse { users, total })
        .with_meta("radiusKm", state.config.proximity.radius_km))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn home(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<HomeResponse> {
    let nearby_users: Vec<NearbyUserView> = nearby_for(&state, &user, None)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    let radius_km = state.config.proximity.radius_km;
    Ok(ApiResponse::ok(HomeResponse {
        current_user: (&user).into(),
        total_users_nearby: nearby_users.len(),
        nearby_users,
        radius_km,
    })
    .with_meta("radiusKm", radius_km))
}
