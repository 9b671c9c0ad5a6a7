//! Process configuration read from the environment

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Read a variable, trimmed; unset and blank are the same
fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn env_number<T: std::str::FromStr + std::fmt::Display + Copy>(name: &str, default: T) -> T {
    match env_value(name) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}, using {}", name, raw, default);
            default
        }),
        None => default,
    }
}

/// A period in seconds that must not be zero
fn env_period(name: &str, default: Duration) -> Duration {
    match env_number(name, default.as_secs()) {
        0 => {
            tracing::warn!("Ignoring {}=0, using {}", name, default.as_secs());
            default
        }
        secs => Duration::from_secs(secs),
    }
}

/// Knobs of the contest itself
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Correct answers needed to qualify; the run ends there
    pub max_puzzles: usize,
    /// Period of the in-game reminder
    pub reminder_interval: Duration,
    /// Send the closing-soon notice when at most this many minutes remain
    pub closing_soon_minutes: i64,
    /// How long a content-error notice stays before it is deleted
    pub error_notice_ttl: Duration,
    /// Label of the prize stand named in the qualification message
    pub stand_label: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_puzzles: 10,
            reminder_interval: Duration::from_secs(60),
            closing_soon_minutes: 5,
            error_notice_ttl: Duration::from_secs(10),
            stand_label: "⬛⬛⬛⬛⬛".to_string(),
        }
    }
}

impl GameConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_puzzles: env_number("MAX_PUZZLES_TO_WIN", defaults.max_puzzles),
            reminder_interval: env_period("REMINDER_INTERVAL_SECS", defaults.reminder_interval),
            closing_soon_minutes: env_number("CLOSING_SOON_MINUTES", defaults.closing_soon_minutes),
            error_notice_ttl: Duration::from_secs(env_number(
                "ERROR_NOTICE_SECONDS",
                defaults.error_notice_ttl.as_secs(),
            )),
            stand_label: env_value("STAND_LABEL").unwrap_or(defaults.stand_label),
        }
    }
}

/// How updates reach the bot
#[derive(Debug, Clone, PartialEq)]
pub enum RunMode {
    Polling,
    Webhook {
        addr: SocketAddr,
        secret: Option<String>,
        /// Registered with Telegram on startup when set
        public_url: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct RollbarConfig {
    pub token: String,
    pub environment: String,
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub token: String,
    pub api_url: String,
    pub content_dir: PathBuf,
    /// Snapshot file; None keeps everything in memory
    pub store_path: Option<PathBuf>,
    pub mode: RunMode,
    pub rollbar: Option<RollbarConfig>,
    pub game: GameConfig,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = env_value("TELEGRAM_ACCESS_TOKEN").ok_or(ConfigError::Missing("TELEGRAM_ACCESS_TOKEN"))?;

        let mode = match env_value("BOT_MODE").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("polling") => RunMode::Polling,
            Some("webhook") => {
                let raw_addr = env_value("WEBHOOK_ADDR").unwrap_or_else(|| "0.0.0.0:8443".to_string());
                let addr = raw_addr.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                    name: "WEBHOOK_ADDR",
                    reason: e.to_string(),
                })?;
                let secret = env_value("WEBHOOK_SECRET");
                if secret.is_none() {
                    tracing::warn!("WEBHOOK_SECRET not set - webhook requests are not authenticated!");
                }
                RunMode::Webhook {
                    addr,
                    secret,
                    public_url: env_value("WEBHOOK_URL"),
                }
            }
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "BOT_MODE",
                    reason: format!("expected 'polling' or 'webhook', got '{}'", other),
                })
            }
        };

        let rollbar = env_value("ROLLBAR_TOKEN").map(|token| RollbarConfig {
            token,
            environment: env_value("ROLLBAR_ENVIRONMENT").unwrap_or_else(|| "production".to_string()),
        });

        Ok(Self {
            token,
            api_url: env_value("TELEGRAM_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            content_dir: env_value("CONTENT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("content")),
            store_path: env_value("STORE_PATH").map(PathBuf::from),
            mode,
            rollbar,
            game: GameConfig::from_env(),
        })
    }
}
