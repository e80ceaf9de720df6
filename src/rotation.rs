use chrono::{DateTime, Timelike, Utc};
use serde_json::json;
use tracing::{info, warn};

use crate::config::ROTATION_LOOKBACK_MINUTES;
use crate::db::Store;
use crate::error::{AppError, Result};
use crate::query::{Node, QueryApi, QueryResponse};
use crate::types::{Mode, RotationWindow};

pub const SCHEDULE_QUERY: &str = "StageScheduleQuery";

/// Rotations flip every two hours on even UTC hours. For the first few
/// minutes after a boundary the remote board still serves results earned in
/// the previous window, so captures taken there are attributed to both.
pub fn needs_boundary_lookback(now: DateTime<Utc>) -> bool {
    now.minute() < ROTATION_LOOKBACK_MINUTES && now.hour() % 2 == 0
}

/// Resolve which rotation windows this cycle must scrape: the window
/// containing `now`, plus the previous window when `now` is just past a
/// rotation boundary. Current window first.
///
/// Returns `NoSchedule` when storage has no window covering `now`; the
/// caller refreshes the schedule and retries once.
pub async fn windows_to_scrape(store: &Store, now: DateTime<Utc>) -> Result<Vec<RotationWindow>> {
    let current = store
        .current_schedule(now)
        .await?
        .ok_or(AppError::NoSchedule)?;

    let mut windows = vec![current];
    if needs_boundary_lookback(now) {
        info!("within the look-back margin of a rotation boundary, also scraping the previous window");
        if let Some(previous) = store.previous_schedule(now).await? {
            windows.push(previous);
        }
    }

    Ok(filter_ranked(windows))
}

/// Drop windows that carry no ranked mode: splatfest windows by design, and
/// anything else malformed enough to be missing one. An empty result is a
/// valid quiet cycle, not an error.
pub fn filter_ranked(windows: Vec<RotationWindow>) -> Vec<RotationWindow> {
    windows
        .into_iter()
        .filter(|w| {
            if w.splatfest {
                info!(start = %w.start_time, "skipping splatfest window, no ranked leaderboard");
                return false;
            }
            if w.mode.is_none() {
                warn!(start = %w.start_time, "skipping stored window without a mode");
                return false;
            }
            true
        })
        .collect()
}

/// Fetch the full rotation schedule from the remote API and upsert it.
/// Runs on demand (first cycle, or after the stored schedule runs dry);
/// the schedule changes far less often than the leaderboard.
pub async fn refresh_schedule(client: &dyn QueryApi, store: &Store) -> Result<()> {
    let response = client.query(SCHEDULE_QUERY, json!({})).await?;
    let windows = parse_schedule(&response)?;
    info!(windows = windows.len(), "fetched rotation schedule");
    store.insert_schedules(&windows).await?;
    Ok(())
}

pub fn parse_schedule(response: &QueryResponse) -> Result<Vec<RotationWindow>> {
    response
        .root()
        .field("xSchedules")?
        .field("nodes")?
        .as_array()?
        .iter()
        .map(parse_window)
        .collect()
}

fn parse_window(node: &Node<'_>) -> Result<RotationWindow> {
    let start_time = parse_time(&node.field("startTime")?)?;
    let end_time = parse_time(&node.field("endTime")?)?;

    let setting = node.field("xMatchSetting")?;
    if setting.is_null() {
        // Splatfest window: no ranked rule or stages.
        return Ok(RotationWindow {
            start_time,
            end_time,
            splatfest: true,
            mode: None,
            stage_1_id: None,
            stage_1_name: None,
            stage_2_id: None,
            stage_2_name: None,
        });
    }

    let rule = setting.field("vsRule")?.field("name")?.as_str()?;
    let mode = Mode::from_name(rule)
        .ok_or_else(|| AppError::SchemaShape(format!("unknown rule name `{rule}` in schedule")))?;

    let stages = setting.field("vsStages")?;
    let stage_1 = stages.index(0)?;
    let stage_2 = stages.index(1)?;

    Ok(RotationWindow {
        start_time,
        end_time,
        splatfest: false,
        mode: Some(mode),
        stage_1_id: Some(stage_1.field("vsStageId")?.as_i64()? as i32),
        stage_1_name: Some(stage_1.field("name")?.as_str()?.to_string()),
        stage_2_id: Some(stage_2.field("vsStageId")?.as_i64()? as i32),
        stage_2_name: Some(stage_2.field("name")?.as_str()?.to_string()),
    })
}

fn parse_time(node: &Node<'_>) -> Result<DateTime<Utc>> {
    let raw = node.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| AppError::SchemaShape(format!("unparseable schedule timestamp `{raw}`")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 12, 4, hour, minute, 30).unwrap()
    }

    #[test]
    fn lookback_only_in_first_quarter_hour_of_even_hours() {
        assert!(needs_boundary_lookback(at(8, 0)));
        assert!(needs_boundary_lookback(at(8, 14)));
        assert!(!needs_boundary_lookback(at(8, 15)));
        assert!(!needs_boundary_lookback(at(8, 59)));
        assert!(!needs_boundary_lookback(at(9, 0)));
        assert!(!needs_boundary_lookback(at(9, 14)));
        assert!(needs_boundary_lookback(at(0, 4)));
        assert!(needs_boundary_lookback(at(22, 10)));
        assert!(!needs_boundary_lookback(at(23, 10)));
    }

    fn schedule_response() -> QueryResponse {
        QueryResponse::new(json!({
            "xSchedules": {
                "nodes": [
                    {
                        "startTime": "2023-12-04T08:00:00Z",
                        "endTime": "2023-12-04T10:00:00Z",
                        "xMatchSetting": {
                            "vsRule": { "name": "Splat Zones" },
                            "vsStages": [
                                { "vsStageId": 1, "name": "Scorch Gorge" },
                                { "vsStageId": 12, "name": "Flounder Heights" },
                            ],
                        },
                    },
                    {
                        "startTime": "2023-12-04T10:00:00Z",
                        "endTime": "2023-12-04T12:00:00Z",
                        "xMatchSetting": null,
                    },
                ],
            },
        }))
    }

    #[test]
    fn parses_ranked_and_splatfest_windows() {
        let windows = parse_schedule(&schedule_response()).unwrap();
        assert_eq!(windows.len(), 2);

        let ranked = &windows[0];
        assert_eq!(ranked.mode, Some(Mode::SplatZones));
        assert!(!ranked.splatfest);
        assert_eq!(ranked.stage_1_id, Some(1));
        assert_eq!(ranked.stage_2_name.as_deref(), Some("Flounder Heights"));
        assert_eq!(
            ranked.start_time,
            Utc.with_ymd_and_hms(2023, 12, 4, 8, 0, 0).unwrap(),
        );

        let fest = &windows[1];
        assert!(fest.splatfest);
        assert_eq!(fest.mode, None);
        assert_eq!(fest.stage_1_id, None);
    }

    #[test]
    fn unknown_rule_is_a_schema_error() {
        let resp = QueryResponse::new(json!({
            "xSchedules": { "nodes": [{
                "startTime": "2023-12-04T08:00:00Z",
                "endTime": "2023-12-04T10:00:00Z",
                "xMatchSetting": {
                    "vsRule": { "name": "Turf War" },
                    "vsStages": [],
                },
            }]},
        }));
        assert!(matches!(
            parse_schedule(&resp),
            Err(AppError::SchemaShape(_)),
        ));
    }

    #[test]
    fn filter_ranked_drops_fest_and_modeless_windows() {
        let ranked = RotationWindow {
            start_time: at(8, 0),
            end_time: at(10, 0),
            splatfest: false,
            mode: Some(Mode::Rainmaker),
            stage_1_id: Some(3),
            stage_1_name: Some("Eeltail Alley".to_string()),
            stage_2_id: Some(7),
            stage_2_name: Some("Mahi-Mahi Resort".to_string()),
        };
        let fest = RotationWindow {
            splatfest: true,
            mode: None,
            ..ranked.clone()
        };
        let modeless = RotationWindow {
            mode: None,
            ..ranked.clone()
        };

        let kept = filter_ranked(vec![ranked.clone(), fest, modeless]);
        assert_eq!(kept, vec![ranked]);
    }
}
