//! Configuration for POLLX
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

/// Development-only JWT secret, used when DEV_MODE is on and JWT_SECRET is unset
pub const DEV_JWT_SECRET: &str = "dev-only-insecure-secret-do-not-deploy-0001";

/// POLLX - polling and social voting backend
#[derive(Parser, Debug, Clone)]
#[command(name = "pollx")]
#[command(about = "Polling and social voting backend")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:5000")]
    pub listen: SocketAddr,

    /// Enable development mode (in-memory store fallback, default JWT secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "pollx")]
    pub mongodb_db: String,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds (30 days)
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "2592000")]
    pub jwt_expiry_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format (text or json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Front-end origin allowed by CORS (in addition to http://localhost:3000)
    #[arg(long, env = "FRONTEND_URL")]
    pub frontend_url: Option<String>,

    /// Text evaluation configuration
    #[command(flatten)]
    pub ai: AiArgs,

    /// Collective mood configuration
    #[command(flatten)]
    pub mood: MoodArgs,

    /// Buffered events per live poll channel before slow subscribers lag
    #[arg(long, env = "LIVE_CHANNEL_CAPACITY", default_value = "64")]
    pub live_channel_capacity: usize,
}

/// Text evaluation service configuration
#[derive(Parser, Debug, Clone)]
pub struct AiArgs {
    /// Gemini API key. Without it, evaluation short-circuits to mock output.
    #[arg(long, env = "GEMINI_API_KEY")]
    pub ai_api_key: Option<String>,

    /// Model used for generateContent calls
    #[arg(long, env = "AI_MODEL", default_value = "gemini-1.5-flash")]
    pub ai_model: String,

    /// Base URL of the generative language API
    #[arg(
        long,
        env = "AI_BASE_URL",
        default_value = "https://generativelanguage.googleapis.com/v1beta"
    )]
    pub ai_base_url: String,

    /// Upper bound on a single evaluation call, in milliseconds
    #[arg(long, env = "AI_TIMEOUT_MS", default_value = "15000")]
    pub ai_timeout_ms: u64,
}

/// Collective mood aggregation configuration
#[derive(Parser, Debug, Clone)]
pub struct MoodArgs {
    /// Seconds between mood recalculations
    #[arg(long, env = "MOOD_INTERVAL_SECS", default_value = "900")]
    pub mood_interval_secs: u64,

    /// Trailing window of approved polls considered, in hours
    #[arg(long, env = "MOOD_WINDOW_HOURS", default_value = "4")]
    pub mood_window_hours: i64,

    /// Minimum qualifying polls before the evaluator is consulted
    #[arg(long, env = "MOOD_MIN_POLLS", default_value = "3")]
    pub mood_min_polls: usize,
}

impl Args {
    /// Get effective JWT secret (uses default in dev mode)
    pub fn jwt_secret(&self) -> Option<String> {
        match &self.jwt_secret {
            Some(secret) => Some(secret.clone()),
            None if self.dev_mode => Some(DEV_JWT_SECRET.to_string()),
            None => None,
        }
    }

    /// Origins accepted by the CORS layer
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins = vec!["http://localhost:3000".to_string()];
        if let Some(ref url) = self.frontend_url {
            let url = url.trim().trim_end_matches('/');
            if !url.is_empty() && !origins.iter().any(|o| o == url) {
                origins.push(url.to_string());
            }
        }
        origins
    }

    /// Timeout applied to every evaluator call
    pub fn ai_timeout(&self) -> Duration {
        Duration::from_millis(self.ai.ai_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            match &self.jwt_secret {
                None => return Err("JWT_SECRET is required in production mode".to_string()),
                Some(s) if s.len() < 32 => {
                    return Err("JWT_SECRET must be at least 32 characters".to_string())
                }
                Some(_) => {}
            }
        }

        if self.mood.mood_min_polls == 0 {
            return Err("MOOD_MIN_POLLS must be at least 1".to_string());
        }

        if self.ai.ai_timeout_ms == 0 {
            return Err("AI_TIMEOUT_MS must be greater than zero".to_string());
        }

        if self.live_channel_capacity == 0 {
            return Err("LIVE_CHANNEL_CAPACITY must be greater than zero".to_string());
        }

        Ok(())
    }
}

impl Default for Args {
    fn default() -> Self {
        Self::parse_from(["pollx"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_requires_secret() {
        let args = Args::parse_from(["pollx"]);
        assert!(args.validate().is_err());

        let args = Args::parse_from(["pollx", "--jwt-secret", "short"]);
        assert!(args.validate().is_err());

        let args = Args::parse_from([
            "pollx",
            "--jwt-secret",
            "a-secret-that-is-definitely-32-chars-long",
        ]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_dev_mode_falls_back_to_dev_secret() {
        let args = Args::parse_from(["pollx", "--dev-mode"]);
        assert!(args.validate().is_ok());
        assert_eq!(args.jwt_secret().as_deref(), Some(DEV_JWT_SECRET));
    }

    #[test]
    fn test_allowed_origins_dedup() {
        let args = Args::parse_from(["pollx", "--frontend-url", "http://localhost:3000/"]);
        assert_eq!(args.allowed_origins(), vec!["http://localhost:3000".to_string()]);

        let args = Args::parse_from(["pollx", "--frontend-url", "https://pollx.app"]);
        assert_eq!(args.allowed_origins().len(), 2);
    }

    #[test]
    fn test_mood_defaults() {
        let args = Args::parse_from(["pollx", "--dev-mode"]);
        assert_eq!(args.mood.mood_window_hours, 4);
        assert_eq!(args.mood.mood_min_polls, 3);
        assert_eq!(args.ai_timeout(), Duration::from_millis(15000));
    }
}
