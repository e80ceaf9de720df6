use crate::error::{AppError, Result};

pub const GRAPHQL_URL: &str = "https://api.lp1.av5ja.srv.nintendo.net/api/graphql";

/// Number of fixed top-level leaderboard pages walked per region and mode.
/// Each page is itself cursor-paginated; 5 pages × 100 entries covers the
/// full top-500 board.
pub const TOP_PAGES: usize = 5;

/// Immediate retries allowed after a failed cycle before the loop is forced
/// to wait for the next minute boundary.
pub const MAX_IMMEDIATE_RETRIES: u32 = 2;

/// Upper bound on numbered credential files probed at startup.
pub const MAX_QUERY_CLIENTS: usize = 10;

/// Ranked results begin a new rotation every two hours; captures taken within
/// this many minutes of a boundary are also attributed to the previous window.
pub const ROTATION_LOOKBACK_MINUTES: u32 = 15;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_host: String,
    pub db_port: u16,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    /// Directory probed for scraper_0.json, scraper_1.json, ... (SCRAPER_CONFIG_DIR)
    pub scraper_config_dir: String,
    /// Cycle cadence in minutes (SCRAPE_CADENCE_MINUTES)
    pub cadence_minutes: u32,
    /// Minute-of-hour offset within the cadence (SCRAPE_OFFSET_MINUTES)
    pub offset_minutes: u32,
    /// Ring buffer size for recent cycle outcomes (FAILURE_TRACKER_SIZE)
    pub failure_tracker_size: usize,
    /// Failure fraction of the ring that trips the breaker (FAILURE_THRESHOLD)
    pub failure_threshold: f64,
    /// Per-request timeout in seconds (REQUEST_TIMEOUT_SECS)
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let cfg = Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_host: std::env::var("POSTGRES_HOST").unwrap_or_else(|_| "localhost".to_string()),
            db_port: std::env::var("POSTGRES_PORT")
                .unwrap_or_else(|_| "5432".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("POSTGRES_PORT must be a valid port number".to_string()))?,
            db_user: std::env::var("POSTGRES_USER")
                .map_err(|_| AppError::Config("POSTGRES_USER must be set".to_string()))?,
            db_password: std::env::var("POSTGRES_PASSWORD")
                .map_err(|_| AppError::Config("POSTGRES_PASSWORD must be set".to_string()))?,
            db_name: std::env::var("POSTGRES_NAME")
                .map_err(|_| AppError::Config("POSTGRES_NAME must be set".to_string()))?,
            scraper_config_dir: std::env::var("SCRAPER_CONFIG_DIR")
                .unwrap_or_else(|_| ".".to_string()),
            cadence_minutes: std::env::var("SCRAPE_CADENCE_MINUTES")
                .unwrap_or_else(|_| "10".to_string())
                .parse::<u32>()
                .map_err(|_| AppError::Config("SCRAPE_CADENCE_MINUTES must be an integer".to_string()))?,
            offset_minutes: std::env::var("SCRAPE_OFFSET_MINUTES")
                .unwrap_or_else(|_| "4".to_string())
                .parse::<u32>()
                .map_err(|_| AppError::Config("SCRAPE_OFFSET_MINUTES must be an integer".to_string()))?,
            failure_tracker_size: std::env::var("FAILURE_TRACKER_SIZE")
                .unwrap_or_else(|_| "30".to_string())
                .parse::<usize>()
                .unwrap_or(30),
            failure_threshold: std::env::var("FAILURE_THRESHOLD")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse::<f64>()
                .unwrap_or(0.5),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse::<u64>()
                .unwrap_or(30),
        };

        if cfg.cadence_minutes == 0 || cfg.cadence_minutes > 60 {
            return Err(AppError::Config(
                "SCRAPE_CADENCE_MINUTES must be between 1 and 60".to_string(),
            ));
        }
        if cfg.offset_minutes >= cfg.cadence_minutes {
            return Err(AppError::Config(
                "SCRAPE_OFFSET_MINUTES must be less than the cadence".to_string(),
            ));
        }
        if cfg.failure_tracker_size == 0 {
            return Err(AppError::Config(
                "FAILURE_TRACKER_SIZE must be at least 1".to_string(),
            ));
        }

        Ok(cfg)
    }

    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db_user, self.db_password, self.db_host, self.db_port, self.db_name
        )
    }
}
