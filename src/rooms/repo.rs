use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "invitation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
}

/// A private room together with its creator's username.
#[derive(Debug, Clone, FromRow)]
pub struct Room {
    pub id: Uuid,
    pub created_by: Uuid,
    pub creator_username: String,
    pub participants_count: i64,
    pub created_at: OffsetDateTime,
}

const ROOM_SELECT: &str = r#"
    SELECT r.id, r.created_by, c.username AS creator_username,
           r.participants_count::int8 AS participants_count, r.created_at
      FROM private_rooms r
      JOIN users c ON c.id = r.created_by
"#;

/// A room the user belongs to, with the moment they joined.
#[derive(Debug, Clone, FromRow)]
pub struct Membership {
    #[sqlx(flatten)]
    pub room: Room,
    pub joined_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct Participant {
    pub id: Uuid,
    pub username: String,
    pub first_name: Option<String>,
    pub is_online: bool,
    pub joined_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct Invitation {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub room_id: Uuid,
    pub status: InvitationStatus,
}

/// A pending invitation as shown to its receiver.
#[derive(Debug, Clone, FromRow)]
pub struct PendingInvitation {
    pub id: Uuid,
    pub status: InvitationStatus,
    pub created_at: OffsetDateTime,
    pub sender_id: Uuid,
    pub sender_username: String,
    pub sender_first_name: Option<String>,
    pub room_id: Uuid,
    pub room_participants: i64,
    pub room_created_by: Uuid,
    pub room_creator_username: String,
}

impl Room {
    pub async fn find(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Room>> {
        let sql = format!("{ROOM_SELECT} WHERE r.id = $1");
        let room = sqlx::query_as::<_, Room>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await
            .context("find room")?;
        Ok(room)
    }

    /// Loads the room and holds its row lock until the transaction ends.
    pub async fn lock(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> anyhow::Result<Option<Room>> {
        let sql = format!("{ROOM_SELECT} WHERE r.id = $1 FOR UPDATE OF r");
        let room = sqlx::query_as::<_, Room>(&sql)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .context("lock room")?;
        Ok(room)
    }

    /// Creates a room with `creator` as its only member.
    pub async fn create(tx: &mut Transaction<'_, Postgres>, creator: Uuid) -> anyhow::Result<Uuid> {
        let (id,) = sqlx::query_as::<_, (Uuid,)>(
            r#"
            INSERT INTO private_rooms (created_by, participants_count)
            VALUES ($1, 1)
            RETURNING id
            "#,
        )
        .bind(creator)
        .fetch_one(&mut **tx)
        .await
        .context("insert room")?;
        add_member(tx, creator, id).await?;
        Ok(id)
    }

    pub async fn delete(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM private_rooms WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .context("delete room")?;
        Ok(())
    }

    pub async fn set_participants(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        count: i64,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE private_rooms SET participants_count = $2 WHERE id = $1")
            .bind(id)
            .bind(count)
            .execute(&mut **tx)
            .await
            .context("update participants count")?;
        Ok(())
    }
}

// ---- Memberships ----

pub async fn is_member<'e>(db: impl PgExecutor<'e>, user_id: Uuid, room_id: Uuid) -> anyhow::Result<bool> {
    let (exists,) = sqlx::query_as::<_, (bool,)>(
        "SELECT EXISTS (SELECT 1 FROM user_rooms WHERE user_id = $1 AND room_id = $2)",
    )
    .bind(user_id)
    .bind(room_id)
    .fetch_one(db)
    .await
    .context("check membership")?;
    Ok(exists)
}

pub async fn member_ids(tx: &mut Transaction<'_, Postgres>, room_id: Uuid) -> anyhow::Result<Vec<Uuid>> {
    let rows = sqlx::query_as::<_, (Uuid,)>("SELECT user_id FROM user_rooms WHERE room_id = $1")
        .bind(room_id)
        .fetch_all(&mut **tx)
        .await
        .context("list room members")?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

pub async fn add_member(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    room_id: Uuid,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_rooms (user_id, room_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, room_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(room_id)
    .execute(&mut **tx)
    .await
    .context("insert membership")?;
    Ok(())
}

pub async fn remove_member(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    room_id: Uuid,
) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM user_rooms WHERE user_id = $1 AND room_id = $2")
        .bind(user_id)
        .bind(room_id)
        .execute(&mut **tx)
        .await
        .context("delete membership")?;
    Ok(())
}

pub async fn participants(db: &PgPool, room_id: Uuid) -> anyhow::Result<Vec<Participant>> {
    let rows = sqlx::query_as::<_, Participant>(
        r#"
        SELECT u.id, u.username, u.first_name, u.is_online, ur.joined_at
          FROM user_rooms ur
          JOIN users u ON u.id = ur.user_id
         WHERE ur.room_id = $1
         ORDER BY ur.joined_at ASC
        "#,
    )
    .bind(room_id)
    .fetch_all(db)
    .await
    .context("list participants")?;
    Ok(rows)
}

pub async fn memberships(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Membership>> {
    let rows = sqlx::query_as::<_, Membership>(
        r#"
        SELECT r.id, r.created_by, c.username AS creator_username,
               r.participants_count::int8 AS participants_count, r.created_at, ur.joined_at
          FROM user_rooms ur
          JOIN private_rooms r ON r.id = ur.room_id
          JOIN users c ON c.id = r.created_by
         WHERE ur.user_id = $1
         ORDER BY ur.joined_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
    .context("list memberships")?;
    Ok(rows)
}

// ---- Invitations ----

pub async fn pending_receivers(
    tx: &mut Transaction<'_, Postgres>,
    room_id: Uuid,
) -> anyhow::Result<Vec<Uuid>> {
    let rows = sqlx::query_as::<_, (Uuid,)>(
        "SELECT receiver_id FROM invitations WHERE room_id = $1 AND status = 'pending'",
    )
    .bind(room_id)
    .fetch_all(&mut **tx)
    .await
    .context("list pending receivers")?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

impl Invitation {
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        sender_id: Uuid,
        receiver_id: Uuid,
        room_id: Uuid,
    ) -> anyhow::Result<Invitation> {
        let inv = sqlx::query_as::<_, Invitation>(
            r#"
            INSERT INTO invitations (sender_id, receiver_id, room_id)
            VALUES ($1, $2, $3)
            RETURNING id, sender_id, receiver_id, room_id, status
            "#,
        )
        .bind(sender_id)
        .bind(receiver_id)
        .bind(room_id)
        .fetch_one(&mut **tx)
        .await
        .context("insert invitation")?;
        Ok(inv)
    }

    pub async fn find<'e>(db: impl PgExecutor<'e>, id: Uuid) -> anyhow::Result<Option<Invitation>> {
        let inv = sqlx::query_as::<_, Invitation>(
            "SELECT id, sender_id, receiver_id, room_id, status FROM invitations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find invitation")?;
        Ok(inv)
    }

    /// Row-locks the invitation. Callers that also lock its room must take
    /// the room lock first.
    pub async fn lock(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> anyhow::Result<Option<Invitation>> {
        let inv = sqlx::query_as::<_, Invitation>(
            r#"
            SELECT id, sender_id, receiver_id, room_id, status
              FROM invitations
             WHERE id = $1
             FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .context("lock invitation")?;
        Ok(inv)
    }

    pub async fn set_status(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        status: InvitationStatus,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE invitations SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&mut **tx)
            .await
            .context("update invitation status")?;
        Ok(())
    }
}

/// Pending invitations received by `user_id`, newest first.
pub async fn pending_for(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<PendingInvitation>> {
    let rows = sqlx::query_as::<_, PendingInvitation>(
        r#"
        SELECT i.id, i.status, i.created_at,
               s.id AS sender_id, s.username AS sender_username, s.first_name AS sender_first_name,
               r.id AS room_id, r.participants_count::int8 AS room_participants,
               r.created_by AS room_created_by, c.username AS room_creator_username
          FROM invitations i
          JOIN users s ON s.id = i.sender_id
          JOIN private_rooms r ON r.id = i.room_id
          JOIN users c ON c.id = r.created_by
         WHERE i.receiver_id = $1 AND i.status = 'pending'
         ORDER BY i.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
    .context("list pending invitations")?;
    Ok(rows)
}

pub async fn count_pending(db: &PgPool, user_id: Uuid) -> anyhow::Result<i64> {
    let (count,) = sqlx::query_as::<_, (i64,)>(
        "SELECT COUNT(*) FROM invitations WHERE receiver_id = $1 AND status = 'pending'",
    )
    .bind(user_id)
    .fetch_one(db)
    .await
    .context("count pending invitations")?;
    Ok(count)
}
