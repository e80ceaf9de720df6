use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, info};

use crate::db::models::{LatestCaptureRow, ScheduleRow};
use crate::db::sql;
use crate::error::{AppError, Result};
use crate::types::{Mode, RankingEntry, RotationWindow};

/// Persistence adapter over the shared Postgres pool. All writes are
/// insert-or-ignore on the natural keys; all point lookups return `None`
/// rather than an error when nothing matches.
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create-if-absent for the schema, enum type, extension, tables and
    /// indexes. Safe to call on every process start.
    pub async fn bootstrap(&self) -> Result<()> {
        sqlx::query(sql::ENSURE_SCHEMA).execute(&self.pool).await?;
        sqlx::query(sql::CREATE_MODE_ENUM).execute(&self.pool).await?;
        sqlx::query(sql::ENSURE_TRGM_EXTENSION).execute(&self.pool).await?;
        sqlx::query(sql::ENSURE_PLAYERS_TABLE).execute(&self.pool).await?;
        sqlx::query(sql::ENSURE_SCHEDULES_TABLE).execute(&self.pool).await?;
        for stmt in sql::ENSURE_PLAYER_INDEXES {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        for stmt in sql::ENSURE_SCHEDULE_INDEXES {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        debug!("schema bootstrap complete");
        Ok(())
    }

    /// Insert a batch of entries in one transaction. Rows that collide on
    /// `(player_id, captured_at, mode)` are silently absorbed; any other
    /// failure rolls back the whole batch.
    pub async fn insert_players(&self, entries: &[RankingEntry]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;
        for entry in entries {
            let result = sqlx::query(sql::INSERT_PLAYER)
                .bind(&entry.player_id)
                .bind(&entry.name)
                .bind(&entry.name_id)
                .bind(entry.rank)
                .bind(entry.x_power)
                .bind(entry.weapon_id)
                .bind(entry.nameplate_id)
                .bind(&entry.byname)
                .bind(&entry.text_color)
                .bind(entry.badge_left_id)
                .bind(entry.badge_center_id)
                .bind(entry.badge_right_id)
                .bind(entry.captured_at)
                .bind(entry.mode.name())
                .bind(entry.region.as_db_bool())
                .bind(entry.rotation_start)
                .bind(entry.season_number)
                .execute(&mut *tx)
                .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;
        info!(
            inserted,
            absorbed = entries.len() as u64 - inserted,
            "player batch committed"
        );
        Ok(inserted)
    }

    /// Insert rotation windows keyed on `(start_time, end_time)`, one
    /// transaction, duplicates ignored.
    pub async fn insert_schedules(&self, windows: &[RotationWindow]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;
        for window in windows {
            let result = sqlx::query(sql::INSERT_SCHEDULE)
                .bind(window.start_time)
                .bind(window.end_time)
                .bind(window.splatfest)
                .bind(window.mode.map(Mode::name))
                .bind(window.stage_1_id)
                .bind(window.stage_1_name.as_deref())
                .bind(window.stage_2_id)
                .bind(window.stage_2_name.as_deref())
                .execute(&mut *tx)
                .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;
        info!(
            inserted,
            absorbed = windows.len() as u64 - inserted,
            "schedule batch committed"
        );
        Ok(inserted)
    }

    /// The window containing `instant` (`start <= instant < end`), latest
    /// `end_time` on ties.
    pub async fn current_schedule(&self, instant: DateTime<Utc>) -> Result<Option<RotationWindow>> {
        let row = sqlx::query_as::<_, ScheduleRow>(sql::SELECT_CURRENT_SCHEDULE)
            .bind(instant)
            .fetch_optional(&self.pool)
            .await?;
        row.map(ScheduleRow::into_window).transpose()
    }

    /// The latest window that ended at or before `instant`.
    pub async fn previous_schedule(&self, instant: DateTime<Utc>) -> Result<Option<RotationWindow>> {
        let row = sqlx::query_as::<_, ScheduleRow>(sql::SELECT_PREVIOUS_SCHEDULE)
            .bind(instant)
            .fetch_optional(&self.pool)
            .await?;
        row.map(ScheduleRow::into_window).transpose()
    }

    /// Timestamp and mode of the most recent stored capture, if any.
    pub async fn latest_capture(&self) -> Result<Option<(DateTime<Utc>, Mode)>> {
        let row = sqlx::query_as::<_, LatestCaptureRow>(sql::SELECT_LATEST_CAPTURE)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| {
            let mode = Mode::from_name(&r.mode).ok_or_else(|| {
                AppError::SchemaShape(format!("stored capture has unknown mode `{}`", r.mode))
            })?;
            Ok((r.captured_at, mode))
        })
        .transpose()
    }
}
