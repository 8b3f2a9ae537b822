//! Maintenance work: retention purges and the periodic presence sweep.

use anyhow::Context;
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use tokio::{sync::watch, task::JoinHandle, time::interval};
use tracing::{info, warn};

use crate::users::presence;

/// Longest retention the purge commands accept, about a century.
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// Moment `days` before `now`. Negative ages would put the cutoff in the
/// future and purge everything, so they are refused.
pub fn retention_cutoff(now: OffsetDateTime, days: i64) -> anyhow::Result<OffsetDateTime> {
    anyhow::ensure!(
        (0..=MAX_RETENTION_DAYS).contains(&days),
        "retention must be between 0 and {MAX_RETENTION_DAYS} days, got {days}"
    );
    Ok(now - Duration::days(days))
}

/// Deletes answered invitations created more than `days` ago. Pending
/// invitations are kept whatever their age.
pub async fn purge_old_invitations(db: &PgPool, days: i64) -> anyhow::Result<u64> {
    let cutoff = retention_cutoff(OffsetDateTime::now_utc(), days)?;
    let deleted = sqlx::query(
        r#"
        DELETE FROM invitations
         WHERE status <> 'pending'
           AND created_at < $1
        "#,
    )
    .bind(cutoff)
    .execute(db)
    .await
    .context("purge old invitations")?
    .rows_affected();

    info!(deleted, days, "old invitations purged");
    Ok(deleted)
}

/// Deletes messages older than `days`, oldest first, `batch` rows per
/// statement until a batch comes back short.
pub async fn purge_old_messages(db: &PgPool, days: i64, batch: i64) -> anyhow::Result<u64> {
    let cutoff = retention_cutoff(OffsetDateTime::now_utc(), days)?;
    let batch = batch.max(1);
    let mut total = 0u64;
    loop {
        let deleted = sqlx::query(
            r#"
            DELETE FROM messages
             WHERE id IN (
                SELECT id FROM messages
                 WHERE created_at < $1
                 ORDER BY created_at ASC
                 LIMIT $2
             )
            "#,
        )
        .bind(cutoff)
        .bind(batch)
        .execute(db)
        .await
        .context("purge old messages batch")?
        .rows_affected();

        total += deleted;
        if !batch_is_full(deleted, batch) {
            break;
        }
    }

    info!(deleted = total, days, batch, "old messages purged");
    Ok(total)
}

fn batch_is_full(deleted: u64, batch: i64) -> bool {
    u64::try_from(batch).map_or(false, |b| deleted >= b)
}

/// Runs [`presence::sweep_inactive`] every `every_secs` until `shutdown`
/// flips to true. Returns `None` when the sweep is disabled (`0`).
pub fn spawn_presence_sweeper(
    db: PgPool,
    window_secs: i64,
    every_secs: u64,
    mut shutdown: watch::Receiver<bool>,
) -> Option<JoinHandle<()>> {
    if every_secs == 0 {
        info!("presence sweeper disabled");
        return None;
    }
    info!(every_secs, window_secs, "presence sweeper started");
    Some(tokio::spawn(async move {
        let mut ticker = interval(std::time::Duration::from_secs(every_secs));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = presence::sweep_inactive(&db, window_secs).await {
                        warn!(error = ?e, "presence sweep failed; retrying next tick");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("presence sweeper stopped");
    }))
}
