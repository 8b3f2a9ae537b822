//! Polling endpoint clients hit every 30-60 seconds for badge counts.

use axum::{
    extract::State,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, Duration, OffsetDateTime};
use tracing::{debug, instrument};

use crate::{
    auth::extractors::AuthUser,
    chat::repo::{self as messages, Scope},
    error::{ApiError, ApiResponse, ApiResult},
    extract::ApiQuery,
    rooms::repo as rooms,
    state::AppState,
    users::{services::nearby_for, ActiveUserView},
};

pub const NEARBY_LIMIT: i64 = 20;
const DEFAULT_LOOKBACK: Duration = Duration::minutes(5);

pub fn router() -> Router<AppState> {
    Router::new().route("/updates", get(updates))
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatesQuery {
    pub since: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageCounts {
    pub global: i64,
    pub private: i64,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct NearbySummary {
    pub count: usize,
    pub users: Vec<ActiveUserView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnPresence {
    pub is_online: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity: OffsetDateTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatesResponse {
    pub new_messages: MessageCounts,
    pub pending_invitations: i64,
    pub nearby_users: NearbySummary,
    pub user: OwnPresence,
    #[serde(with = "time::serde::rfc3339")]
    pub since: OffsetDateTime,
}

/// Effective lower bound for the counts: the parsed `since`, or five
/// minutes before `now` when absent.
pub fn resolve_since(raw: Option<&str>, now: OffsetDateTime) -> Result<OffsetDateTime, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(now - DEFAULT_LOOKBACK);
    };
    // An unencoded `+` offset arrives as a space.
    OffsetDateTime::parse(raw, &Rfc3339)
        .or_else(|_| OffsetDateTime::parse(&raw.replace(' ', "+"), &Rfc3339))
        .map_err(|_| ApiError::validation("Parámetro since inválido (se espera ISO 8601)"))
}

#[instrument(skip(state, user, q), fields(user_id = %user.id))]
pub async fn updates(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiQuery(q): ApiQuery<UpdatesQuery>,
) -> ApiResult<UpdatesResponse> {
    let since = resolve_since(q.since.as_deref(), OffsetDateTime::now_utc())?;

    let global = messages::count_since(&state.db, Scope::Global, user.id, since).await?;
    let private = messages::count_since(&state.db, Scope::MemberRooms, user.id, since).await?;
    let pending_invitations = rooms::count_pending(&state.db, user.id).await?;
    let users: Vec<ActiveUserView> = nearby_for(&state, &user, Some(NEARBY_LIMIT))
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    debug!(global, private, pending_invitations, nearby = users.len(), "updates computed");
    Ok(ApiResponse::ok(UpdatesResponse {
        new_messages: MessageCounts {
            global,
            private,
            total: global + private,
        },
        pending_invitations,
        nearby_users: NearbySummary {
            count: users.len(),
            users,
        },
        user: OwnPresence {
            is_online: user.is_online,
            last_activity: user.last_activity,
        },
        since,
    })
    .with_meta("checkInterval", "30-60 seconds recommended"))
}
