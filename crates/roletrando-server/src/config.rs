use std::time::Duration;

use serde::Deserialize;

use roletrando_core::room::GameKind;
use roletrando_wheel::segments::WHEEL_SEGMENTS;

/// Name of the optional config file read from the working directory.
pub const CONFIG_FILE: &str = "roletrando.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse roletrando.toml: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{0}")]
    Invalid(String),
}

/// Top-level server configuration, loaded from `roletrando.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub limits: LimitsConfig,
    pub rooms: RoomsConfig,
    pub content: ContentConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            limits: LimitsConfig::default(),
            rooms: RoomsConfig::default(),
            content: ContentConfig::default(),
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    pub ws_rate_limit_per_sec: f64,
    /// Outbound frames buffered per connection before frames are dropped.
    pub player_message_buffer: usize,
    /// Commands buffered in each room actor's mailbox.
    pub room_mailbox: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 500,
            ws_rate_limit_per_sec: 20.0,
            player_message_buffer: 256,
            room_mailbox: 256,
        }
    }
}

/// Room lifecycle and game timing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    pub reconnect_grace_secs: u64,
    pub empty_room_grace_secs: u64,
    pub max_players_wheel: usize,
    pub max_players_quiz: usize,
    pub quiz_round_secs: u64,
    pub spin_reveal_timeout_secs: u64,
    pub bot_action_delay_ms: u64,
    /// Values the wheel can land on.
    pub wheel_segments: Vec<u32>,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            reconnect_grace_secs: 30,
            empty_room_grace_secs: 60,
            max_players_wheel: 3,
            max_players_quiz: 8,
            quiz_round_secs: 20,
            spin_reveal_timeout_secs: 12,
            bot_action_delay_ms: 1500,
            wheel_segments: WHEEL_SEGMENTS.to_vec(),
        }
    }
}

impl RoomsConfig {
    pub fn max_players(&self, kind: GameKind) -> usize {
        match kind {
            GameKind::Game => self.max_players_wheel,
            GameKind::Quiz => self.max_players_quiz,
        }
    }

    pub fn reconnect_grace(&self) -> Duration {
        Duration::from_secs(self.reconnect_grace_secs)
    }

    pub fn empty_room_grace(&self) -> Duration {
        Duration::from_secs(self.empty_room_grace_secs)
    }

    pub fn quiz_round(&self) -> Duration {
        Duration::from_secs(self.quiz_round_secs)
    }

    pub fn spin_reveal_timeout(&self) -> Duration {
        Duration::from_secs(self.spin_reveal_timeout_secs)
    }

    pub fn bot_action_delay(&self) -> Duration {
        Duration::from_millis(self.bot_action_delay_ms)
    }
}

/// Where game content comes from.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Directory holding `<theme>/{wheel,quiz,millionaire}.json`.
    pub data_dir: Option<String>,
    pub default_theme: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            default_theme: "default".to_string(),
        }
    }
}

impl ServerConfig {
    /// Parse a config file body. Missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Check values that would make the server misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "listen_addr is not a valid socket address: {}",
                self.listen_addr
            )));
        }

        let positive = [
            ("limits.max_ws_connections", self.limits.max_ws_connections),
            (
                "limits.player_message_buffer",
                self.limits.player_message_buffer,
            ),
            ("limits.room_mailbox", self.limits.room_mailbox),
            ("rooms.max_players_wheel", self.rooms.max_players_wheel),
            ("rooms.max_players_quiz", self.rooms.max_players_quiz),
            ("rooms.quiz_round_secs", self.rooms.quiz_round_secs as usize),
            (
                "rooms.spin_reveal_timeout_secs",
                self.rooms.spin_reveal_timeout_secs as usize,
            ),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be > 0")));
            }
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            return Err(ConfigError::Invalid(
                "limits.ws_rate_limit_per_sec must be > 0".to_string(),
            ));
        }
        if self.rooms.wheel_segments.is_empty() {
            return Err(ConfigError::Invalid(
                "rooms.wheel_segments must not be empty".to_string(),
            ));
        }
        if self.content.default_theme.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "content.default_theme must not be empty".to_string(),
            ));
        }
        if self.rooms.reconnect_grace_secs > self.rooms.empty_room_grace_secs {
            tracing::warn!(
                reconnect = self.rooms.reconnect_grace_secs,
                empty_room = self.rooms.empty_room_grace_secs,
                "Reconnect grace is longer than the empty-room grace; empty rooms close first"
            );
        }
        Ok(())
    }

    /// Load config from `roletrando.toml` if it exists, then apply env var overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(CONFIG_FILE) {
            Ok(content) => {
                let cfg = Self::from_toml_str(&content)?;
                tracing::info!("Loaded configuration from {CONFIG_FILE}");
                cfg
            },
            Err(_) => {
                tracing::info!("No {CONFIG_FILE} found, using defaults");
                ServerConfig::default()
            },
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `ROLETRANDO_*` overrides. `lookup` is `std::env::var` outside tests.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("ROLETRANDO_LISTEN_ADDR")
            && !addr.is_empty()
        {
            self.listen_addr = addr;
        }
        if let Some(dir) = lookup("ROLETRANDO_DATA_DIR")
            && !dir.is_empty()
        {
            self.content.data_dir = Some(dir);
        }
        if let Some(theme) = lookup("ROLETRANDO_DEFAULT_THEME")
            && !theme.is_empty()
        {
            self.content.default_theme = theme;
        }

        // Limits overrides
        if let Some(val) = lookup("ROLETRANDO_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            self.limits.max_ws_connections = n;
        }
        if let Some(val) = lookup("ROLETRANDO_WS_RATE_LIMIT")
            && let Ok(n) = val.parse::<f64>()
        {
            self.limits.ws_rate_limit_per_sec = n;
        }

        // Room timing overrides
        if let Some(val) = lookup("ROLETRANDO_RECONNECT_GRACE_SECS")
            && let Ok(n) = val.parse::<u64>()
        {
            self.rooms.reconnect_grace_secs = n;
        }
        if let Some(val) = lookup("ROLETRANDO_EMPTY_ROOM_GRACE_SECS")
            && let Ok(n) = val.parse::<u64>()
        {
            self.rooms.empty_room_grace_secs = n;
        }
        if let Some(val) = lookup("ROLETRANDO_QUIZ_ROUND_SECS")
            && let Ok(n) = val.parse::<u64>()
        {
            self.rooms.quiz_round_secs = n;
        }
    }
}
