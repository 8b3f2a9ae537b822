use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{Message, MessageRow};
use crate::{users::repo::User, users::ActiveUserView};

#[derive(Debug, Default, Deserialize)]
pub struct PostMessageRequest {
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SenderView {
    pub id: Uuid,
    pub username: String,
    #[serde(rename = "nombre", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
}

impl SenderView {
    pub fn of_row(row: &MessageRow) -> Self {
        Self {
            id: row.sender_id,
            username: row.sender_username.clone(),
            first_name: row.sender_first_name.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalMessageView {
    pub id: Uuid,
    pub content: String,
    pub sender: SenderView,
    pub distance_from_me: f64,
    pub distance_when_sent: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub time_ago: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalFeedResponse {
    pub messages: Vec<GlobalMessageView>,
    pub active_users: Vec<ActiveUserView>,
    pub total_messages: usize,
    pub total_active_users: usize,
}

/// A freshly stored message as echoed back to its sender.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostedMessage {
    pub id: Uuid,
    pub content: String,
    pub sender: SenderView,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl PostedMessage {
    pub fn new(msg: Message, sender: &User) -> Self {
        Self {
            id: msg.id,
            content: msg.content,
            sender: SenderView {
                id: sender.id,
                username: sender.username.clone(),
                first_name: None,
            },
            created_at: msg.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostGlobalResponse {
    pub message: PostedMessage,
    pub info: &'static str,
}
