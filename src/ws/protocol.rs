//! WebSocket protocol message definitions
//! These are the wire types for the spectator feed

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::MatchPhase;

/// Messages sent from spectator to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to spectator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection, with the panels as they are now
    Welcome {
        server_time: u64,
        message: String,
        score: String,
        status: Option<MatchStatus>,
    },

    /// Round/result announcement panel was overwritten
    Message { text: String },

    /// Scoreboard panel was overwritten
    Score { text: String },

    /// Match state changed phase
    Status { status: MatchStatus },

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Snapshot of a running match, published on every phase transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchStatus {
    pub session_id: Uuid,
    pub phase: MatchPhase,
    pub round_number: u32,
    pub win_threshold: u32,
    pub participants: Vec<ParticipantStatus>,
    /// Player index of the last round's winner
    pub round_winner: Option<u32>,
    /// Player index of the match winner, once decided
    pub match_winner: Option<u32>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantStatus {
    pub player_index: u32,
    pub label: String,
    /// `#RRGGBB`
    pub color: String,
    pub wins: u32,
    pub alive: bool,
    pub control_enabled: bool,
}
