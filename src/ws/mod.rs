//! Spectator WebSocket feed

pub mod handler;
pub mod protocol;
