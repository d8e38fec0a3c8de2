//! Time utilities for the match loop

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Default tick rate of the playing-phase poll and the headless arena
pub const SIMULATION_TPS: u32 = 30; // 30 ticks per second

/// Tick period for a given rate; a zero rate falls back to the default
pub fn tick_period(ticks_per_second: u32) -> Duration {
    let tps = if ticks_per_second == 0 {
        SIMULATION_TPS
    } else {
        ticks_per_second
    };
    Duration::from_micros(1_000_000 / tps as u64)
}
