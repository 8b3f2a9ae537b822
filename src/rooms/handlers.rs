use std::collections::{HashMap, HashSet};

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{
        AnswerResponse, InviteRequest, InviteResponse, LastMessageView, LeaveResponse,
        ParticipantView, PendingInvitationView, PendingListResponse, PostRoomMessageResponse,
        RoomDetailResponse, RoomListItem, RoomListResponse, RoomMessageView, RoomRef,
        SentInvitation, UserRef,
    },
    repo::{self, Invitation, InvitationStatus, Room},
    services::{
        accept_invitation, check_answerable, invite_summary, leave_room, plan_invitations,
        room_not_found, Accepted, Candidate, LeaveOutcome, RoomSnapshot,
    },
};
use crate::{
    auth::extractors::AuthUser,
    chat::{
        dto::{PostMessageRequest, PostedMessage, SenderView},
        repo as messages,
        services::{time_ago, validate_content},
    },
    error::{ApiError, ApiResponse, ApiResult},
    extract::{ApiJson, ApiPath},
    state::AppState,
    users::{presence, repo::User},
};

pub const ROOM_HISTORY_LIMIT: i64 = 200;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/invitar", post(invite))
        .route("/invitar/pendientes", get(pending))
        .route("/invitar/aceptar/:id", post(accept))
        .route("/invitar/rechazar/:id", post(reject))
        .route("/privado", get(list_rooms))
        .route("/privado/:room_id", get(room_detail))
        .route("/privado/:room_id/mensajes", post(post_room_message))
        .route("/privado/salir/:room_id", post(leave))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn invite(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<InviteRequest>,
) -> ApiResult<InviteResponse> {
    if payload.user_ids.is_empty() {
        return Err(ApiError::validation(
            "Debes proporcionar al menos un usuario para invitar",
        ));
    }
    let max = state.config.rooms.max_participants;
    let window = state.config.proximity.activity_window_secs;
    let now = OffsetDateTime::now_utc();

    let candidates: HashMap<Uuid, Candidate> = User::find_many(&state.db, &payload.user_ids)
        .await?
        .into_iter()
        .map(|u| {
            let candidate = Candidate {
                id: u.id,
                active: presence::is_active(u.last_activity, now, window),
                username: u.username,
            };
            (candidate.id, candidate)
        })
        .collect();

    let mut tx = state.db.begin().await?;
    let room_id = match payload.room_id {
        Some(id) => {
            Room::lock(&mut tx, id).await?.ok_or_else(room_not_found)?;
            if !repo::is_member(&mut *tx, user.id, id).await? {
                return Err(ApiError::forbidden("No eres miembro de esta sala"));
            }
            id
        }
        None => Room::create(&mut tx, user.id).await?,
    };

    let members: HashSet<Uuid> = repo::member_ids(&mut tx, room_id).await?.into_iter().collect();
    let snapshot = RoomSnapshot {
        participants: members.len() as i64,
        pending: repo::pending_receivers(&mut tx, room_id).await?.into_iter().collect(),
        members,
    };
    let plan = plan_invitations(user.id, &payload.user_ids, &candidates, &snapshot, max);

    let mut invitations = Vec::with_capacity(plan.invite.len());
    for (receiver_id, username) in plan.invite {
        let inv = Invitation::insert(&mut tx, user.id, receiver_id, room_id).await?;
        invitations.push(SentInvitation {
            id: inv.id,
            receiver: UserRef {
                id: receiver_id,
                username,
            },
            status: inv.status,
        });
    }
    tx.commit().await?;

    info!(
        room_id = %room_id,
        sent = invitations.len(),
        skipped = plan.errors.len(),
        "invitations processed"
    );
    Ok(ApiResponse::created(InviteResponse {
        room: RoomRef {
            id: room_id,
            participants_count: snapshot.participants,
        },
        invitations_sent: invitations.len(),
        message: invite_summary(invitations.len()),
        invitations,
        errors: plan.errors,
    }))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn pending(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<PendingListResponse> {
    let invitations: Vec<PendingInvitationView> = repo::pending_for(&state.db, user.id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(ApiResponse::ok(PendingListResponse {
        total: invitations.len(),
        invitations,
    }))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn accept(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<AnswerResponse> {
    let max = state.config.rooms.max_participants;
    let Accepted {
        invitation: inv,
        participants,
    } = accept_invitation(&state.db, user.id, id, max).await?;

    info!(room_id = %inv.room_id, sender_id = %inv.sender_id, participants, "invitation accepted");
    Ok(ApiResponse::ok(AnswerResponse {
        message: "Te has unido a la sala correctamente",
        room: Some(RoomRef {
            id: inv.room_id,
            participants_count: participants,
        }),
    }))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn reject(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<AnswerResponse> {
    let mut tx = state.db.begin().await?;
    let inv = Invitation::lock(&mut tx, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Invitación no encontrada"))?;
    check_answerable(&inv, user.id)?;
    Invitation::set_status(&mut tx, inv.id, InvitationStatus::Rejected).await?;
    tx.commit().await?;

    info!(invitation_id = %inv.id, "invitation rejected");
    Ok(ApiResponse::ok(AnswerResponse {
        message: "Invitación rechazada",
        room: None,
    }))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_rooms(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<RoomListResponse> {
    let memberships = repo::memberships(&state.db, user.id).await?;
    let mut rooms = Vec::with_capacity(memberships.len());
    for m in memberships {
        let participants = repo::participants(&state.db, m.room.id).await?;
        let last = messages::last_in_room(&state.db, m.room.id)
            .await?
            .map(|row| LastMessageView {
                content: row.content,
                sender: row.sender_username,
                created_at: row.created_at,
            });
        rooms.push(RoomListItem::new(m, participants, last));
    }
    Ok(ApiResponse::ok(RoomListResponse {
        total_rooms: rooms.len(),
        rooms,
    }))
}

/// Room and caller membership, or the error the caller should see.
async fn member_room(
    state: &AppState,
    user_id: Uuid,
    room_id: Uuid,
    not_member: &str,
) -> Result<Room, ApiError> {
    let room = Room::find(&state.db, room_id)
        .await?
        .ok_or_else(room_not_found)?;
    if !repo::is_member(&state.db, user_id, room_id).await? {
        return Err(ApiError::forbidden(not_member));
    }
    Ok(room)
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn room_detail(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(room_id): ApiPath<Uuid>,
) -> ApiResult<RoomDetailResponse> {
    let room = member_room(&state, user.id, room_id, "No tienes acceso a esta sala").await?;
    let now = OffsetDateTime::now_utc();

    let messages: Vec<RoomMessageView> = messages::list_room(&state.db, room_id, ROOM_HISTORY_LIMIT)
        .await?
        .into_iter()
        .map(|row| RoomMessageView {
            id: row.id,
            sender: SenderView::of_row(&row),
            time_ago: time_ago(row.created_at, now),
            created_at: row.created_at,
            content: row.content,
        })
        .collect();
    let participants: Vec<ParticipantView> = repo::participants(&state.db, room_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(ApiResponse::ok(RoomDetailResponse {
        room: room.into(),
        total_messages: messages.len(),
        messages,
        participants,
    }))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn post_room_message(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(room_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<PostMessageRequest>,
) -> ApiResult<PostRoomMessageResponse> {
    let room = member_room(&state, user.id, room_id, "No eres miembro de esta sala").await?;
    let content = validate_content(payload.content.as_deref())?;
    let msg = messages::insert(&state.db, user.id, Some(room_id), &content).await?;
    info!(room_id = %room_id, message_id = %msg.id, "room message posted");

    Ok(ApiResponse::created(PostRoomMessageResponse {
        message: PostedMessage::new(msg, &user),
        room: RoomRef {
            id: room.id,
            participants_count: room.participants_count,
        },
    }))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn leave(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(room_id): ApiPath<Uuid>,
) -> ApiResult<LeaveResponse> {
    let outcome = leave_room(&state.db, user.id, room_id).await?;

    info!(room_id = %room_id, ?outcome, "user left room");
    Ok(ApiResponse::ok(match outcome {
        LeaveOutcome::DeleteRoom => LeaveResponse {
            message: "Has salido de la sala. La sala ha sido eliminada porque quedó vacía.",
            room_deleted: true,
            remaining_participants: 0,
        },
        LeaveOutcome::Remaining(n) => LeaveResponse {
            message: "Has salido de la sala correctamente",
            room_deleted: false,
            remaining_participants: n,
        },
    }))
}
