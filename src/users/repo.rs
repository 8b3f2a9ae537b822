use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::geo::{self, Coordinates};

/// Columns of `users`, with the fixed-precision coordinates read as `float8`.
const USER_COLUMNS: &str = "id, email, username, password_hash, \
    latitude::float8 AS latitude, longitude::float8 AS longitude, \
    last_activity, is_online, first_name, last_name, phone, created_at";

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub latitude: f64,
    pub longitude: f64,
    pub last_activity: OffsetDateTime,
    pub is_online: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub password_hash: &'a str,
    pub position: Coordinates,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub phone: Option<&'a str>,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub position: Option<Coordinates>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

/// Another user found around a point, with the distance to it.
#[derive(Debug, Clone, FromRow)]
pub struct NearbyUser {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub is_online: bool,
    pub last_activity: OffsetDateTime,
    pub distance_km: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct NearbyQuery {
    pub origin: Coordinates,
    pub radius_km: f64,
    pub active_since: OffsetDateTime,
    pub limit: Option<i64>,
}

impl User {
    pub fn position(&self) -> Coordinates {
        Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    pub async fn find_many(db: &PgPool, ids: &[Uuid]) -> anyhow::Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)");
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(ids)
            .fetch_all(db)
            .await?;
        Ok(users)
    }

    /// Inserts a user already marked online. Unique violations are returned
    /// untouched so callers can map them to a conflict.
    pub async fn create(db: &PgPool, new: &NewUser<'_>) -> Result<User, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO users (email, username, password_hash, latitude, longitude,
                               first_name, last_name, phone, last_activity, is_online)
            VALUES ($1, $2, $3, $4::numeric, $5::numeric, $6, $7, $8, now(), TRUE)
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(new.email)
            .bind(new.username)
            .bind(new.password_hash)
            .bind(new.position.latitude)
            .bind(new.position.longitude)
            .bind(new.first_name)
            .bind(new.last_name)
            .bind(new.phone)
            .fetch_one(db)
            .await
    }

    /// Records activity for `id` and returns the refreshed row.
    pub async fn touch(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET last_activity = now(), is_online = TRUE WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    pub async fn set_offline(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET is_online = FALSE WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        update: &ProfileUpdate,
    ) -> anyhow::Result<User> {
        let sql = format!(
            r#"
            UPDATE users
               SET latitude = COALESCE($2::numeric, latitude),
                   longitude = COALESCE($3::numeric, longitude),
                   first_name = COALESCE($4, first_name),
                   last_name = COALESCE($5, last_name),
                   phone = COALESCE($6, phone),
                   last_activity = now(),
                   is_online = TRUE
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(update.position.map(|p| p.latitude))
            .bind(update.position.map(|p| p.longitude))
            .bind(update.first_name.as_deref())
            .bind(update.last_name.as_deref())
            .bind(update.phone.as_deref())
            .fetch_one(db)
            .await?;
        Ok(user)
    }
}

/// Other users active since `q.active_since` within `q.radius_km` of
/// `q.origin`, closest first. Distance is computed and filtered in SQL.
pub async fn find_nearby(
    db: &PgPool,
    exclude: Uuid,
    q: &NearbyQuery,
) -> anyhow::Result<Vec<NearbyUser>> {
    let distance = geo::haversine_sql("$1", "$2", "u");
    let sql = format!(
        r#"
        SELECT * FROM (
            SELECT u.id, u.email, u.username, u.first_name, u.last_name,
                   u.latitude::float8 AS latitude, u.longitude::float8 AS longitude,
                   u.is_online, u.last_activity,
                   {distance} AS distance_km
              FROM users u
             WHERE u.id <> $3
               AND u.last_activity >= $4
        ) nearby
        WHERE nearby.distance_km <= $5
        ORDER BY nearby.distance_km ASC
        LIMIT $6
        "#
    );
    let rows = sqlx::query_as::<_, NearbyUser>(&sql)
        .bind(q.origin.latitude)
        .bind(q.origin.longitude)
        .bind(exclude)
        .bind(q.active_since)
        .bind(q.radius_km)
        .bind(q.limit)
        .fetch_all(db)
        .await?;
    Ok(rows)
}
