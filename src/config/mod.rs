//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default Twitch Helix endpoint used to resolve an access token to a login
pub const DEFAULT_TWITCH_USERS_URL: &str = "https://api.twitch.tv/helix/users";

/// Default cap on one Twitch users lookup
pub const DEFAULT_TWITCH_TIMEOUT: Duration = Duration::from_millis(1500);

/// Largest inbound WebSocket text frame accepted (bytes)
pub const MAX_MESSAGE_BYTES: usize = 4 * 1024;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Directory holding the browser client bundle
    pub static_dir: PathBuf,
    /// Extra origins allowed by CORS (comma-separated), e.g. a hosted overlay page
    pub client_origin: String,

    /// Twitch application client id; Twitch login is disabled when absent
    pub twitch_client_id: Option<String>,
    /// Twitch users endpoint (overridable for tests and proxies)
    pub twitch_users_url: String,
    /// Upper bound on a single Twitch users lookup
    pub twitch_timeout: Duration,

    /// Fixed RNG seed for spawn points and bounce spin
    pub arena_seed: Option<u64>,
    /// Gameplay tuning
    pub tuning: ArenaTuning,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        };

        let mut tuning = ArenaTuning::default();
        if let Some(min_players) = parse_var::<usize>("MIN_PLAYERS")? {
            if min_players < 2 {
                return Err(ConfigError::Invalid("MIN_PLAYERS"));
            }
            tuning.min_players = min_players;
        }
        if let Some(secs) = parse_var::<u64>("ROUND_DURATION_SECS")? {
            if secs == 0 {
                return Err(ConfigError::Invalid("ROUND_DURATION_SECS"));
            }
            tuning.round_duration = Duration::from_secs(secs);
        }

        let twitch_timeout = match parse_var::<u64>("TWITCH_TIMEOUT_MS")? {
            Some(0) => return Err(ConfigError::Invalid("TWITCH_TIMEOUT_MS")),
            Some(ms) => Duration::from_millis(ms),
            None => DEFAULT_TWITCH_TIMEOUT,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            static_dir: env::var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("public")),
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_default(),

            twitch_client_id: env::var("TWITCH_CLIENT_ID").ok().filter(|s| !s.is_empty()),
            twitch_users_url: env::var("TWITCH_USERS_URL")
                .unwrap_or_else(|_| DEFAULT_TWITCH_USERS_URL.to_string()),
            twitch_timeout,

            arena_seed: parse_var("ARENA_SEED")?,
            tuning,
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map(Some).map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(None),
    }
}

/// Gameplay tuning for one arena.
///
/// Keep this separate from runtime/server configuration (addresses, secrets, paths).
#[derive(Debug, Clone, Copy)]
pub struct ArenaTuning {
    /// Players required before a round may start
    pub min_players: usize,
    /// Hit points every participant starts a round with
    pub max_hp: u32,
    /// Countdown length in whole seconds
    pub countdown_secs: u32,
    /// Round length before it times out without a winner
    pub round_duration: Duration,
    /// Delay before returning to the lobby after a win
    pub win_reset_delay: Duration,
    /// Delay before returning to the lobby after a draw or timeout
    pub draw_reset_delay: Duration,
    /// Arena width in pixels
    pub arena_width: f32,
    /// Arena height in pixels
    pub arena_height: f32,
    /// Longest username kept, in characters
    pub max_username_chars: usize,
}

impl Default for ArenaTuning {
    fn default() -> Self {
        Self {
            min_players: 2,
            max_hp: 1000,
            countdown_secs: 5,
            round_duration: Duration::from_secs(5 * 60),
            win_reset_delay: Duration::from_secs(5),
            draw_reset_delay: Duration::from_secs(4),
            arena_width: 1280.0,
            arena_height: 720.0,
            max_username_chars: 16,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
