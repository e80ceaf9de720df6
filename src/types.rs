use chrono::{DateTime, Utc};

use crate::error::AppError;

// ---------------------------------------------------------------------------
// Modes and regions
// ---------------------------------------------------------------------------

/// The four ranked modes with an X-ranking leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    SplatZones,
    TowerControl,
    Rainmaker,
    ClamBlitz,
}

impl Mode {
    pub const ALL: [Mode; 4] = [
        Mode::SplatZones,
        Mode::TowerControl,
        Mode::Rainmaker,
        Mode::ClamBlitz,
    ];

    /// Short code used in refetch query names and `mode` variables.
    pub fn code(self) -> &'static str {
        match self {
            Mode::SplatZones => "Ar",
            Mode::TowerControl => "Lf",
            Mode::Rainmaker => "Gl",
            Mode::ClamBlitz => "Cl",
        }
    }

    /// Human-readable rule name as reported by the schedule API and stored
    /// in the `mode_name` enum column.
    pub fn name(self) -> &'static str {
        match self {
            Mode::SplatZones => "Splat Zones",
            Mode::TowerControl => "Tower Control",
            Mode::Rainmaker => "Rainmaker",
            Mode::ClamBlitz => "Clam Blitz",
        }
    }

    pub fn from_name(name: &str) -> Option<Mode> {
        Mode::ALL.into_iter().find(|m| m.name() == name)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The two regional leaderboard divisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Tentatek,
    Takoroka,
}

impl Region {
    pub const ALL: [Region; 2] = [Region::Tentatek, Region::Takoroka];

    /// Region key expected by the ranking query variables.
    pub fn api_key(self) -> &'static str {
        match self {
            Region::Tentatek => "ATLANTIC",
            Region::Takoroka => "PACIFIC",
        }
    }

    /// Storage encoding: the region column is a boolean, false = Tentatek.
    pub fn as_db_bool(self) -> bool {
        matches!(self, Region::Takoroka)
    }

    pub fn from_db_bool(value: bool) -> Region {
        if value {
            Region::Takoroka
        } else {
            Region::Tentatek
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Region::Tentatek => "Tentatek",
            Region::Takoroka => "Takoroka",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Leaderboard entries
// ---------------------------------------------------------------------------

/// One normalized leaderboard row at one point in time.
/// `(player_id, captured_at, mode)` is the natural key; duplicate fetches of
/// the same snapshot are absorbed by the insert-or-ignore persistence contract.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingEntry {
    pub player_id: String,
    pub name: String,
    pub name_id: String,
    pub byname: String,
    pub rank: i32,
    pub x_power: f64,
    pub weapon_id: i32,
    pub nameplate_id: i32,
    pub text_color: String,
    pub badge_left_id: Option<i32>,
    pub badge_center_id: Option<i32>,
    pub badge_right_id: Option<i32>,
    pub captured_at: DateTime<Utc>,
    pub mode: Mode,
    pub region: Region,
    pub rotation_start: DateTime<Utc>,
    pub season_number: i32,
}

// ---------------------------------------------------------------------------
// Rotation schedule
// ---------------------------------------------------------------------------

/// One half-open `[start_time, end_time)` rotation window from the schedule
/// API. Splatfest windows have no ranked mode or stages.
#[derive(Debug, Clone, PartialEq)]
pub struct RotationWindow {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub splatfest: bool,
    pub mode: Option<Mode>,
    pub stage_1_id: Option<i32>,
    pub stage_1_name: Option<String>,
    pub stage_2_id: Option<i32>,
    pub stage_2_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Cycle outcomes
// ---------------------------------------------------------------------------

/// Result of one scrape cycle, inspected by the scheduler loop rather than
/// propagated as control flow.
#[derive(Debug)]
pub enum CycleOutcome {
    Success,
    Failed(AppError),
}

impl CycleOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CycleOutcome::Failed(_))
    }
}
