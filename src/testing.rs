//! Fixtures for tests that run against a migrated database.

use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    geo::Coordinates,
    rooms::repo::{self as rooms, Invitation, Room},
    users::repo::{NewUser, User},
};

pub const MADRID: Coordinates = Coordinates {
    latitude: 40.4168,
    longitude: -3.7038,
};

/// Inserts an online user at [`MADRID`] named `username`.
pub async fn seed_user(db: &PgPool, username: &str) -> User {
    let email = format!("{username}@test.com");
    User::create(
        db,
        &NewUser {
            email: &email,
            username,
            password_hash: "not-a-real-hash",
            position: MADRID,
            first_name: None,
            last_name: None,
            phone: None,
        },
    )
    .await
    .unwrap()
}

/// Room created by `creator` with `others` as extra members.
pub async fn seed_room(db: &PgPool, creator: &User, others: &[&User]) -> Uuid {
    let mut tx = db.begin().await.unwrap();
    let room_id = Room::create(&mut tx, creator.id).await.unwrap();
    for user in others {
        rooms::add_member(&mut tx, user.id, room_id).await.unwrap();
    }
    Room::set_participants(&mut tx, room_id, 1 + others.len() as i64)
        .await
        .unwrap();
    tx.commit().await.unwrap();
    room_id
}

pub async fn seed_invitation(db: &PgPool, sender: &User, receiver: &User, room_id: Uuid) -> Invitation {
    let mut tx = db.begin().await.unwrap();
    let inv = Invitation::insert(&mut tx, sender.id, receiver.id, room_id)
        .await
        .unwrap();
    tx.commit().await.unwrap();
    inv
}

/// Rewrites a row's `created_at` so age-based queries see it at `at`.
pub async fn backdate(db: &PgPool, table: &str, id: Uuid, at: OffsetDateTime) {
    sqlx::query(&format!("UPDATE {table} SET created_at = $2 WHERE id = $1"))
        .bind(id)
        .bind(at)
        .execute(db)
        .await
        .unwrap();
}
