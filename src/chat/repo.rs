use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// A stored message as returned by [`insert`].
#[derive(Debug, Clone, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub content: String,
    pub created_at: OffsetDateTime,
}

/// A message joined with the sender's public fields and current position.
#[derive(Debug, Clone, FromRow)]
pub struct MessageRow {
    pub id: Uuid,
    pub content: String,
    pub distance_when_sent: Option<f64>,
    pub created_at: OffsetDateTime,
    pub sender_id: Uuid,
    pub sender_username: String,
    pub sender_first_name: Option<String>,
    pub sender_latitude: f64,
    pub sender_longitude: f64,
}

const MESSAGE_ROW_SELECT: &str = r#"
    SELECT m.id, m.content, m.distance_when_sent::float8 AS distance_when_sent, m.created_at,
           u.id AS sender_id, u.username AS sender_username, u.first_name AS sender_first_name,
           u.latitude::float8 AS sender_latitude, u.longitude::float8 AS sender_longitude
      FROM messages m
      JOIN users u ON u.id = m.sender_id
"#;

/// Appends a message to the global feed (`room_id = None`) or to a room.
pub async fn insert(
    db: &PgPool,
    sender_id: Uuid,
    room_id: Option<Uuid>,
    content: &str,
) -> anyhow::Result<Message> {
    let msg = sqlx::query_as::<_, Message>(
        r#"
        INSERT INTO messages (content, sender_id, is_global, room_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id, content, created_at
        "#,
    )
    .bind(content)
    .bind(sender_id)
    .bind(room_id.is_none())
    .bind(room_id)
    .fetch_one(db)
    .await?;
    Ok(msg)
}

/// The `limit` most recent global messages, oldest first.
pub async fn list_global(db: &PgPool, limit: i64) -> anyhow::Result<Vec<MessageRow>> {
    let sql = format!("{MESSAGE_ROW_SELECT} WHERE m.is_global ORDER BY m.created_at DESC, m.id DESC LIMIT $1");
    let mut rows = sqlx::query_as::<_, MessageRow>(&sql)
        .bind(limit)
        .fetch_all(db)
        .await?;
    rows.reverse();
    Ok(rows)
}

/// The first `limit` messages of a room in chronological order.
pub async fn list_room(db: &PgPool, room_id: Uuid, limit: i64) -> anyhow::Result<Vec<MessageRow>> {
    let sql = format!("{MESSAGE_ROW_SELECT} WHERE m.room_id = $1 ORDER BY m.created_at ASC, m.id ASC LIMIT $2");
    let rows = sqlx::query_as::<_, MessageRow>(&sql)
        .bind(room_id)
        .bind(limit)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

pub async fn last_in_room(db: &PgPool, room_id: Uuid) -> anyhow::Result<Option<MessageRow>> {
    let sql = format!("{MESSAGE_ROW_SELECT} WHERE m.room_id = $1 ORDER BY m.created_at DESC, m.id DESC LIMIT 1");
    let row = sqlx::query_as::<_, MessageRow>(&sql)
        .bind(room_id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

/// Where [`count_since`] looks for new messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    /// Every room the querying user belongs to.
    MemberRooms,
}

/// Messages in `scope` created strictly after `since`, not sent by `user_id`.
pub async fn count_since(
    db: &PgPool,
    scope: Scope,
    user_id: Uuid,
    since: OffsetDateTime,
) -> anyhow::Result<i64> {
    let filter = match scope {
        Scope::Global => "m.is_global",
        Scope::MemberRooms => {
            "m.room_id IN (SELECT ur.room_id FROM user_rooms ur WHERE ur.user_id = $1)"
        }
    };
    let sql = format!(
        "SELECT COUNT(*) FROM messages m WHERE {filter} AND m.created_at > $2 AND m.sender_id <> $1"
    );
    let (count,) = sqlx::query_as::<_, (i64,)>(&sql)
        .bind(user_id)
        .bind(since)
        .fetch_one(db)
        .await?;
    Ok(count)
}
