//! Statements owned by the persistence layer. Everything here is idempotent:
//! bootstrap uses IF NOT EXISTS / guarded DO blocks, inserts use
//! ON CONFLICT DO NOTHING on the natural keys.

pub const ENSURE_SCHEMA: &str = "CREATE SCHEMA IF NOT EXISTS xrank";

pub const ENSURE_TRGM_EXTENSION: &str = "CREATE EXTENSION IF NOT EXISTS pg_trgm";

pub const CREATE_MODE_ENUM: &str = "DO $$ BEGIN \
     IF NOT EXISTS (\
     SELECT 1 FROM pg_type t \
     JOIN pg_namespace n ON n.oid = t.typnamespace \
     WHERE t.typname = 'mode_name' AND n.nspname = 'xrank') THEN \
     CREATE TYPE xrank.mode_name AS ENUM (\
     'Splat Zones',\
     'Clam Blitz',\
     'Rainmaker',\
     'Tower Control'\
     ); \
     END IF; \
     END $$";

pub const ENSURE_PLAYERS_TABLE: &str = "CREATE TABLE IF NOT EXISTS xrank.players (\
     player_id TEXT NOT NULL, \
     name TEXT NOT NULL, \
     name_id TEXT NOT NULL, \
     splashtag TEXT GENERATED ALWAYS AS (name || '#' || name_id) STORED, \
     rank INTEGER NOT NULL, \
     x_power DOUBLE PRECISION NOT NULL, \
     weapon_id INTEGER NOT NULL, \
     nameplate_id INTEGER, \
     byname TEXT, \
     text_color TEXT, \
     badge_left_id INTEGER, \
     badge_center_id INTEGER, \
     badge_right_id INTEGER, \
     captured_at TIMESTAMP WITH TIME ZONE NOT NULL, \
     mode xrank.mode_name NOT NULL, \
     region BOOLEAN NOT NULL, \
     rotation_start TIMESTAMP WITH TIME ZONE, \
     season_number INTEGER, \
     CONSTRAINT pk_player_capture UNIQUE (player_id, captured_at, mode)\
     )";

pub const ENSURE_SCHEDULES_TABLE: &str = "CREATE TABLE IF NOT EXISTS xrank.schedules (\
     start_time TIMESTAMP WITH TIME ZONE NOT NULL, \
     end_time TIMESTAMP WITH TIME ZONE NOT NULL, \
     splatfest BOOLEAN NOT NULL, \
     mode xrank.mode_name, \
     stage_1_id INTEGER, \
     stage_1_name TEXT, \
     stage_2_id INTEGER, \
     stage_2_name TEXT, \
     CONSTRAINT sc_start_time_end_time UNIQUE (start_time, end_time)\
     )";

pub const ENSURE_PLAYER_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_players_splashtag_gin \
     ON xrank.players USING GIN (splashtag gin_trgm_ops)",
    "CREATE INDEX IF NOT EXISTS idx_players_captured_at \
     ON xrank.players (captured_at)",
    "CREATE INDEX IF NOT EXISTS idx_players_mode \
     ON xrank.players (mode)",
    "CREATE INDEX IF NOT EXISTS idx_players_region \
     ON xrank.players (region)",
    "CREATE INDEX IF NOT EXISTS idx_players_rotation_start \
     ON xrank.players (rotation_start)",
    "CREATE INDEX IF NOT EXISTS idx_players_season_number \
     ON xrank.players (season_number)",
    "CREATE INDEX IF NOT EXISTS idx_players_mode_captured_at_season_number \
     ON xrank.players (mode, captured_at, season_number)",
];

pub const ENSURE_SCHEDULE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_schedules_start_time \
     ON xrank.schedules (start_time)",
    "CREATE INDEX IF NOT EXISTS idx_schedules_end_time \
     ON xrank.schedules (end_time)",
];

pub const INSERT_PLAYER: &str = "INSERT INTO xrank.players (\
     player_id, name, name_id, rank, x_power, weapon_id, nameplate_id, byname, \
     text_color, badge_left_id, badge_center_id, badge_right_id, captured_at, \
     mode, region, rotation_start, season_number\
     ) VALUES (\
     $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, \
     $14::xrank.mode_name, $15, $16, $17\
     ) ON CONFLICT (player_id, captured_at, mode) DO NOTHING";

pub const INSERT_SCHEDULE: &str = "INSERT INTO xrank.schedules (\
     start_time, end_time, splatfest, mode, stage_1_id, stage_1_name, \
     stage_2_id, stage_2_name\
     ) VALUES ($1, $2, $3, $4::xrank.mode_name, $5, $6, $7, $8) \
     ON CONFLICT (start_time, end_time) DO NOTHING";

pub const SELECT_CURRENT_SCHEDULE: &str = "SELECT start_time, end_time, splatfest, mode::text AS mode, \
     stage_1_id, stage_1_name, stage_2_id, stage_2_name \
     FROM xrank.schedules \
     WHERE start_time <= $1 AND end_time > $1 \
     ORDER BY end_time DESC \
     LIMIT 1";

pub const SELECT_PREVIOUS_SCHEDULE: &str = "SELECT start_time, end_time, splatfest, mode::text AS mode, \
     stage_1_id, stage_1_name, stage_2_id, stage_2_name \
     FROM xrank.schedules \
     WHERE end_time <= $1 \
     ORDER BY end_time DESC \
     LIMIT 1";

pub const SELECT_LATEST_CAPTURE: &str = "SELECT captured_at, mode::text AS mode \
     FROM xrank.players \
     ORDER BY captured_at DESC \
     LIMIT 1";
