//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::game::unit::{Color, SpawnTransform, Vec3};
use crate::game::{LabelStyle, MatchSettings, ParticipantSlot};
use crate::sim::UnitTemplate;
use crate::util::time::{tick_period, SIMULATION_TPS};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed spectator origins for CORS (comma-separated, `*` for any)
    pub client_origin: String,

    /// Rules and roster for every match session
    pub match_settings: MatchSettings,
    /// Template the headless arena spawns units from
    pub unit_template: UnitTemplate,
    /// Arena RNG seed; random per session when unset
    pub arena_seed: Option<u64>,
    /// Stop after this many sessions (0 = run until shutdown)
    pub max_sessions: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = if let Some(port) = lookup("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string())
        };

        let win_threshold: u32 = parse_or(&lookup, "WIN_THRESHOLD", 5)?;
        if win_threshold == 0 {
            return Err(ConfigError::Invalid {
                key: "WIN_THRESHOLD",
                reason: "must be at least 1".to_string(),
            });
        }

        let tick_rate: u32 = parse_or(&lookup, "TICK_RATE", SIMULATION_TPS)?;
        if tick_rate == 0 {
            return Err(ConfigError::Invalid {
                key: "TICK_RATE",
                reason: "must be at least 1".to_string(),
            });
        }

        let defaults = MatchSettings::default();
        let roster = match lookup("ARENA_PLAYERS") {
            Some(raw) => parse_roster(&raw)?,
            None => defaults.roster,
        };

        let label_style = if parse_or(&lookup, "RICH_TEXT_LABELS", false)? {
            LabelStyle::RichText
        } else {
            LabelStyle::Plain
        };

        let match_settings = MatchSettings {
            win_threshold,
            start_delay: parse_secs(&lookup, "START_DELAY_SECS", defaults.start_delay)?,
            end_delay: parse_secs(&lookup, "END_DELAY_SECS", defaults.end_delay)?,
            tick: tick_period(tick_rate),
            roster,
            label_style,
        };

        let template = UnitTemplate::default();
        let unit_template = UnitTemplate {
            max_health: parse_or(&lookup, "UNIT_MAX_HEALTH", template.max_health)?,
            weapon_damage: parse_or(&lookup, "UNIT_WEAPON_DAMAGE", template.weapon_damage)?,
            fire_cooldown_secs: parse_or(
                &lookup,
                "UNIT_FIRE_COOLDOWN_SECS",
                template.fire_cooldown_secs,
            )?,
            accuracy: parse_or(&lookup, "UNIT_ACCURACY", template.accuracy)?,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            client_origin: lookup("CLIENT_ORIGIN").unwrap_or_else(|| "*".to_string()),

            match_settings,
            unit_template,
            arena_seed: lookup("ARENA_SEED")
                .map(|raw| parse_value("ARENA_SEED", &raw))
                .transpose()?,
            max_sessions: parse_or(&lookup, "MAX_SESSIONS", 0)?,
        })
    }
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_secs<F>(lookup: &F, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: f64 = parse_or(lookup, key, default.as_secs_f64())?;
    Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

/// Parse `RRGGBB@x,y,z@yaw` entries separated by `;`
pub fn parse_roster(raw: &str) -> Result<Vec<ParticipantSlot>, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        key: "ARENA_PLAYERS",
        reason,
    };

    let roster = raw
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let mut parts = entry.split('@');
            let (Some(color), Some(position), yaw) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(invalid(format!("'{}' is not RRGGBB@x,y,z@yaw", entry)));
            };

            let color = color
                .parse::<Color>()
                .map_err(|e| invalid(e.to_string()))?;

            let coords = position
                .split(',')
                .map(|c| c.trim().parse::<f32>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| invalid(format!("'{}': {}", entry, e)))?;
            let &[x, y, z] = &coords[..] else {
                return Err(invalid(format!("'{}' needs three coordinates", entry)));
            };

            let yaw_degrees = match yaw {
                Some(raw) => raw
                    .trim()
                    .parse::<f32>()
                    .map_err(|e| invalid(format!("'{}': {}", entry, e)))?,
                None => 0.0,
            };

            Ok(ParticipantSlot {
                color,
                spawn: SpawnTransform::new(Vec3::new(x, y, z), yaw_degrees),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if roster.is_empty() {
        return Err(invalid("needs at least one player".to_string()));
    }

    Ok(roster)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
