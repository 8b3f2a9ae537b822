use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{InvitationStatus, Membership, Participant, PendingInvitation, Room};
use crate::chat::dto::{PostedMessage, SenderView};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequest {
    #[serde(default)]
    pub user_ids: Vec<Uuid>,
    pub room_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct UserRef {
    pub id: Uuid,
    pub username: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRef {
    pub id: Uuid,
    pub participants_count: i64,
}

#[derive(Debug, Serialize)]
pub struct SentInvitation {
    pub id: Uuid,
    pub receiver: UserRef,
    pub status: InvitationStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteResponse {
    pub room: RoomRef,
    pub invitations_sent: usize,
    pub invitations: Vec<SentInvitation>,
    pub errors: Vec<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRoomView {
    pub id: Uuid,
    pub participants_count: i64,
    pub created_by: UserRef,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingInvitationView {
    pub id: Uuid,
    pub sender: SenderView,
    pub room: PendingRoomView,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub status: InvitationStatus,
}

impl From<PendingInvitation> for PendingInvitationView {
    fn from(p: PendingInvitation) -> Self {
        Self {
            id: p.id,
            sender: SenderView {
                id: p.sender_id,
                username: p.sender_username,
                first_name: p.sender_first_name,
            },
            room: PendingRoomView {
                id: p.room_id,
                participants_count: p.room_participants,
                created_by: UserRef {
                    id: p.room_created_by,
                    username: p.room_creator_username,
                },
            },
            created_at: p.created_at,
            status: p.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PendingListResponse {
    pub invitations: Vec<PendingInvitationView>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomRef>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub id: Uuid,
    pub username: String,
    #[serde(rename = "nombre")]
    pub first_name: Option<String>,
    pub is_online: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
}

impl From<Participant> for ParticipantView {
    fn from(p: Participant) -> Self {
        Self {
            id: p.id,
            username: p.username,
            first_name: p.first_name,
            is_online: p.is_online,
            joined_at: p.joined_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessageView {
    pub content: String,
    pub sender: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub id: Uuid,
    pub created_by: UserRef,
    pub participants_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Room> for RoomView {
    fn from(r: Room) -> Self {
        Self {
            id: r.id,
            created_by: UserRef {
                id: r.created_by,
                username: r.creator_username,
            },
            participants_count: r.participants_count,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomListItem {
    #[serde(flatten)]
    pub room: RoomView,
    pub participants: Vec<ParticipantView>,
    pub last_message: Option<LastMessageView>,
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
}

impl RoomListItem {
    pub fn new(
        m: Membership,
        participants: Vec<Participant>,
        last_message: Option<LastMessageView>,
    ) -> Self {
        Self {
            room: m.room.into(),
            participants: participants.into_iter().map(Into::into).collect(),
            last_message,
            joined_at: m.joined_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomListResponse {
    pub rooms: Vec<RoomListItem>,
    pub total_rooms: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMessageView {
    pub id: Uuid,
    pub content: String,
    pub sender: SenderView,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub time_ago: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDetailResponse {
    pub room: RoomView,
    pub messages: Vec<RoomMessageView>,
    pub participants: Vec<ParticipantView>,
    pub total_messages: usize,
}

#[derive(Debug, Serialize)]
pub struct PostRoomMessageResponse {
    pub message: PostedMessage,
    pub room: RoomRef,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveResponse {
    pub message: &'static str,
    pub room_deleted: bool,
    pub remaining_participants: i64,
}
