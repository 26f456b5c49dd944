//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::game::physics::DEFAULT_HALF_WIDTH;

/// What this process runs as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Offline fight against the simple opponent
    Local,
    /// Authoritative room server
    Server,
    /// Networked client rendering server snapshots
    Client,
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Mode::Local),
            "server" => Ok(Mode::Server),
            "client" => Ok(Mode::Client),
            _ => Err(ConfigError::InvalidMode(s.to_string())),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub mode: Mode,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Player name shown above the fighter
    pub player_name: String,
    /// Half the arena width; walls sit 50 units inside it
    pub arena_half_width: f32,

    /// Server binding address
    pub server_addr: SocketAddr,
    /// Origins allowed to open the WebSocket
    pub allowed_origins: Vec<String>,

    /// WebSocket URL the client connects to
    pub server_url: String,
    /// Room the client joins (required in client mode)
    pub room: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mode = match env::var("GAME_MODE") {
            Ok(value) => value.parse()?,
            Err(_) => Mode::Local,
        };

        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let arena_half_width = match env::var("ARENA_HALF_WIDTH") {
            Ok(value) => value
                .parse::<f32>()
                .ok()
                .filter(|w| w.is_finite() && *w > 0.0)
                .ok_or(ConfigError::Invalid("ARENA_HALF_WIDTH"))?,
            Err(_) => DEFAULT_HALF_WIDTH,
        };

        let room = env::var("ROOM")
            .ok()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        if mode == Mode::Client && room.is_none() {
            return Err(ConfigError::Missing("ROOM"));
        }

        Ok(Self {
            mode,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            player_name: env::var("PLAYER_NAME")
                .ok()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "Player".to_string()),
            arena_half_width,

            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173,http://127.0.0.1:5173".to_string())
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),

            server_url: env::var("SERVER_URL")
                .unwrap_or_else(|_| "ws://localhost:8080/ws".to_string()),
            room,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Unknown GAME_MODE '{0}' (expected local, server or client)")]
    InvalidMode(String),

    #[error("Invalid server address format")]
    InvalidAddress,
}
