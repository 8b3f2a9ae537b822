use anyhow::Context;
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use tracing::info;

/// Earliest `last_activity` that still counts as active at `now`.
pub fn activity_cutoff(now: OffsetDateTime, window_secs: i64) -> OffsetDateTime {
    now - Duration::seconds(window_secs)
}

pub fn is_active(last_activity: OffsetDateTime, now: OffsetDateTime, window_secs: i64) -> bool {
    last_activity >= activity_cutoff(now, window_secs)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: i64,
    pub marked_offline: i64,
}

/// Marks online users idle for longer than `window_secs` as offline.
pub async fn sweep_inactive(db: &PgPool, window_secs: i64) -> anyhow::Result<SweepReport> {
    let cutoff = activity_cutoff(OffsetDateTime::now_utc(), window_secs);
    let (checked, marked_offline) = sqlx::query_as::<_, (i64, i64)>(
        r#"
        WITH online AS (
            SELECT id, last_activity FROM users WHERE is_online
        ), demoted AS (
            UPDATE users u
               SET is_online = FALSE
              FROM online o
             WHERE u.id = o.id AND o.last_activity < $1
            RETURNING u.id
        )
        SELECT (SELECT COUNT(*) FROM online), (SELECT COUNT(*) FROM demoted)
        "#,
    )
    .bind(cutoff)
    .fetch_one(db)
    .await
    .context("sweep inactive users")?;

    info!(checked, marked_offline, window_secs, "presence sweep finished");
    Ok(SweepReport {
        checked,
        marked_offline,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn activity_window_is_inclusive() {
        let now = datetime!(2026-01-15 12:00:00 UTC);
        assert!(is_active(now, now, 300));
        assert!(is_active(now - Duration::seconds(300), now, 300));
        assert!(!is_active(now - Duration::seconds(301), now, 300));
    }

    #[test]
    fn cutoff_moves_back_by_window() {
        let now = datetime!(2026-01-15 12:00:00 UTC);
        assert_eq!(activity_cutoff(now, 300), datetime!(2026-01-15 11:55:00 UTC));
    }

    use crate::testing::seed_user;

    #[sqlx::test(migrations = "./migrations")]
    async fn sweep_demotes_only_idle_online_users(pool: PgPool) {
        let idle = seed_user(&pool, "inactivo").await;
        seed_user(&pool, "activo").await;
        sqlx::query("UPDATE users SET last_activity = now() - interval '10 minutes' WHERE id = $1")
            .bind(idle.id)
            .execute(&pool)
            .await
            .unwrap();

        let report = sweep_inactive(&pool, 300).await.unwrap();
        assert_eq!(report, SweepReport { checked: 2, marked_offline: 1 });

        let online: Vec<(String, bool)> =
            sqlx::query_as("SELECT username, is_online FROM users ORDER BY username")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(
            online,
            vec![("activo".to_string(), true), ("inactivo".to_string(), false)]
        );

        let again = sweep_inactive(&pool, 300).await.unwrap();
        assert_eq!(again, SweepReport { checked: 1, marked_offline: 0 });
    }
}
