use axum::{extract::State, routing::get, Router};
use time::OffsetDateTime;
use tracing::{info, instrument};

use super::{
    dto::{
        GlobalFeedResponse, GlobalMessageView, PostGlobalResponse, PostMessageRequest,
        PostedMessage, SenderView,
    },
    repo::{self, MessageRow},
    services::{time_ago, validate_content},
};
use crate::{
    auth::extractors::AuthUser,
    error::{ApiResponse, ApiResult},
    extract::ApiJson,
    geo::{haversine_km, round2, Coordinates},
    state::AppState,
    users::{services::nearby_for, ActiveUserView},
};

pub const GLOBAL_FEED_LIMIT: i64 = 100;

pub fn routes() -> Router<AppState> {
    Router::new().route("/general", get(global_feed).post(post_global))
}

fn global_view(row: MessageRow, viewer: Coordinates, now: OffsetDateTime) -> GlobalMessageView {
    let sender_at = Coordinates {
        latitude: row.sender_latitude,
        longitude: row.sender_longitude,
    };
    GlobalMessageView {
        id: row.id,
        sender: SenderView::of_row(&row),
        distance_from_me: round2(haversine_km(viewer, sender_at)),
        distance_when_sent: row.distance_when_sent,
        time_ago: time_ago(row.created_at, now),
        created_at: row.created_at,
        content: row.content,
    }
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn global_feed(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<GlobalFeedResponse> {
    let now = OffsetDateTime::now_utc();
    let viewer = user.position();

    let messages: Vec<GlobalMessageView> = repo::list_global(&state.db, GLOBAL_FEED_LIMIT)
        .await?
        .into_iter()
        .map(|row| global_view(row, viewer, now))
        .collect();
    let active_users: Vec<ActiveUserView> = nearby_for(&state, &user, None)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(ApiResponse::ok(GlobalFeedResponse {
        total_messages: messages.len(),
        total_active_users: active_users.len(),
        messages,
        active_users,
    })
    .with_meta("radiusKm", state.config.proximity.radius_km))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn post_global(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<PostMessageRequest>,
) -> ApiResult<PostGlobalResponse> {
    let content = validate_content(payload.content.as_deref())?;
    let msg = repo::insert(&state.db, user.id, None, &content).await?;
    info!(message_id = %msg.id, "global message posted");

    Ok(ApiResponse::created(PostGlobalResponse {
        message: PostedMessage::new(msg, &user),
        info: "Mensaje enviado al chat global",
    }))
}
