use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Datelike, Utc};

use crate::error::{AppError, Result};
use crate::query::Node;
use crate::types::{Mode, RankingEntry, Region};

/// Per-cycle context stamped onto every normalized entry.
#[derive(Debug, Clone, Copy)]
pub struct CaptureStamp {
    pub captured_at: DateTime<Utc>,
    pub mode: Mode,
    pub region: Region,
    pub rotation_start: DateTime<Utc>,
    pub season_number: i32,
}

impl CaptureStamp {
    pub fn new(
        captured_at: DateTime<Utc>,
        mode: Mode,
        region: Region,
        rotation_start: DateTime<Utc>,
    ) -> Self {
        Self {
            captured_at,
            mode,
            region,
            rotation_start,
            season_number: season_number(captured_at),
        }
    }
}

/// Decode an opaque node id (base64 text of the form `TypeName-<suffix>` or
/// `TypeName:<suffix>`) and return the trailing suffix. `:` wins over `-`
/// when both appear, so suffixes containing dashes survive intact.
/// Malformed tokens are a contract violation, never a silent default.
pub fn decode_trailing_id(token: &str) -> Result<String> {
    let bytes = STANDARD
        .decode(token)
        .map_err(|_| AppError::SchemaShape(format!("node id `{token}` is not valid base64")))?;
    let decoded = String::from_utf8(bytes)
        .map_err(|_| AppError::SchemaShape(format!("node id `{token}` is not UTF-8")))?;

    let suffix = match decoded.rfind(':') {
        Some(pos) => &decoded[pos + 1..],
        None => match decoded.rfind('-') {
            Some(pos) => &decoded[pos + 1..],
            None => {
                return Err(AppError::SchemaShape(format!(
                    "node id `{decoded}` has no type delimiter"
                )))
            }
        },
    };
    if suffix.is_empty() {
        return Err(AppError::SchemaShape(format!(
            "node id `{decoded}` has an empty suffix"
        )));
    }
    Ok(suffix.to_string())
}

/// `decode_trailing_id` for ids whose suffix is a decimal integer
/// (weapons, nameplates, badges).
pub fn decode_trailing_int(token: &str) -> Result<i32> {
    let suffix = decode_trailing_id(token)?;
    suffix.parse::<i32>().map_err(|_| {
        AppError::SchemaShape(format!("node id suffix `{suffix}` is not an integer"))
    })
}

/// Convert float color channels in [0, 1] to `#rrggbb`. Channels are clamped,
/// scaled by 255, and truncated (0.5 → 127 → `7f`).
pub fn color_to_hex(r: f64, g: f64, b: f64) -> String {
    let channel = |c: f64| (c.clamp(0.0, 1.0) * 255.0) as u8;
    format!("#{:02x}{:02x}{:02x}", channel(r), channel(g), channel(b))
}

/// Seasons are 3-month blocks anchored so that December 2022 starts season 1.
/// December belongs to the following season year, which is why January and
/// February subtract a full year's worth of seasons.
pub fn season_number(ts: DateTime<Utc>) -> i32 {
    let month = ts.month();
    let mut season_year = 4 * (ts.year() - 2022);
    if month <= 2 {
        season_year -= 4;
    }
    let offset = match month {
        12 | 1 | 2 => 0,
        3..=5 => -3,
        6..=8 => -2,
        _ => -1,
    };
    season_year + offset + 1
}

/// Normalize one raw leaderboard node into a [`RankingEntry`].
pub fn parse_entry(node: &Node<'_>, stamp: &CaptureStamp) -> Result<RankingEntry> {
    let player_id = decode_trailing_id(node.field("id")?.as_str()?)?;
    let name = node.field("name")?.as_str()?.to_string();
    let name_id = node.field("nameId")?.as_str()?.to_string();
    let byname = node.field("byname")?.as_str()?.to_string();
    let rank = node.field("rank")?.as_i64()? as i32;
    let x_power = node.field("xPower")?.as_f64()?;
    let weapon_id = decode_trailing_int(node.field("weapon")?.field("id")?.as_str()?)?;

    let nameplate = node.field("nameplate")?;
    let background = nameplate.field("background")?;
    let nameplate_id = decode_trailing_int(background.field("id")?.as_str()?)?;

    let text_color = background.field("textColor")?;
    let text_color = color_to_hex(
        text_color.field("r")?.as_f64()?,
        text_color.field("g")?.as_f64()?,
        text_color.field("b")?.as_f64()?,
    );

    let (badge_left_id, badge_center_id, badge_right_id) =
        badge_slots(&nameplate.field("badges")?)?;

    Ok(RankingEntry {
        player_id,
        name,
        name_id,
        byname,
        rank,
        x_power,
        weapon_id,
        nameplate_id,
        text_color,
        badge_left_id,
        badge_center_id,
        badge_right_id,
        captured_at: stamp.captured_at,
        mode: stamp.mode,
        region: stamp.region,
        rotation_start: stamp.rotation_start,
        season_number: stamp.season_number,
    })
}

/// Nameplates carry 0–3 badge slots, some possibly null. Normalize to exactly
/// three optional slots, padding missing trailing entries and preserving the
/// position of every present entry.
fn badge_slots(badges: &Node<'_>) -> Result<(Option<i32>, Option<i32>, Option<i32>)> {
    let nodes = badges.as_array()?;
    let mut slots = [None, None, None];
    for (i, slot) in slots.iter_mut().enumerate() {
        match nodes.get(i) {
            Some(badge) if !badge.is_null() => {
                *slot = Some(decode_trailing_int(badge.field("id")?.as_str()?)?);
            }
            _ => {}
        }
    }
    Ok((slots[0], slots[1], slots[2]))
}
