use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::types::{Mode, RotationWindow};

/// One `xrank.schedules` row. `mode` is selected as text and parsed back
/// into [`Mode`] on the way out.
#[derive(Debug, sqlx::FromRow)]
pub struct ScheduleRow {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub splatfest: bool,
    pub mode: Option<String>,
    pub stage_1_id: Option<i32>,
    pub stage_1_name: Option<String>,
    pub stage_2_id: Option<i32>,
    pub stage_2_name: Option<String>,
}

impl ScheduleRow {
    pub fn into_window(self) -> Result<RotationWindow> {
        let mode = match self.mode {
            Some(name) => Some(Mode::from_name(&name).ok_or_else(|| {
                AppError::SchemaShape(format!("stored schedule has unknown mode `{name}`"))
            })?),
            None => None,
        };
        Ok(RotationWindow {
            start_time: self.start_time,
            end_time: self.end_time,
            splatfest: self.splatfest,
            mode,
            stage_1_id: self.stage_1_id,
            stage_1_name: self.stage_1_name,
            stage_2_id: self.stage_2_id,
            stage_2_name: self.stage_2_name,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct LatestCaptureRow {
    pub captured_at: DateTime<Utc>,
    pub mode: String,
}
