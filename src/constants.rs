// Default locations and metadata shared across modules

pub const SCHEMA_VERSION: u32 = 1;

pub const DEFAULT_GAMES_FILE: &str = "games.json";
pub const DEFAULT_GAMES_DIR: &str = "games";
pub const DEFAULT_FRONTEND_DIR: &str = "frontend";

pub const USER_AGENT: &str = "Open-Source-Chess-Explorer/1.0";

// Eval cache
pub const DEFAULT_EVAL_CACHE_FILE: &str = ".cache/lichess_eval.json";
pub const DEFAULT_EVAL_CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;

// Network timeouts (seconds)
pub const ARCHIVE_LIST_TIMEOUT_SECS: u64 = 15;
pub const ARCHIVE_MONTH_TIMEOUT_SECS: u64 = 30;
pub const LICHESS_STREAM_TIMEOUT_SECS: u64 = 60;
pub const CLOUD_EVAL_TIMEOUT_SECS: u64 = 10;

// Archive fetching
pub const MAX_FETCH_WORKERS: usize = 8;
