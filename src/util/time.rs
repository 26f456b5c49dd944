//! Time utilities and loop cadences

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

/// Local simulation / render rate (one step per displayed frame)
pub const RENDER_TPS: u32 = 60;
/// Authoritative room tick rate; every tick is broadcast as a snapshot
pub const SERVER_TPS: u32 = 20;
/// Input sampling rate, decoupled from rendering
pub const INPUT_TPS: u32 = 20;

/// Expected gap between two snapshots, used as the interpolation window
pub const SNAPSHOT_INTERVAL: Duration = Duration::from_millis(1000 / SERVER_TPS as u64);
/// Latency probe period
pub const PING_INTERVAL: Duration = Duration::from_secs(2);

/// Period of a loop running at `tps`
pub fn tick_interval(tps: u32) -> Duration {
    Duration::from_micros(1_000_000 / tps.max(1) as u64)
}
