//! Time utilities for the arena simulation

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

/// Synchronization loop rate
pub const SIMULATION_TPS: u32 = 30; // 30 ticks per second

/// Simulated time advanced by one physics step.
///
/// Deliberately shorter than the wall-clock tick so the arena plays in slight
/// slow motion.
pub const PHYSICS_STEP_SECS: f32 = 1.0 / 60.0;

/// Wall-clock spacing between synchronization ticks
pub fn tick_interval() -> Duration {
    Duration::from_micros(1_000_000 / SIMULATION_TPS as u64)
}
