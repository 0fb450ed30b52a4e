use crate::pose::DEFAULT_STALE_WINDOW;
use std::time::Duration;

/// Tunables for a [`crate::session::DeviceSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long an unchanged pose still counts as live tracking.
    pub stale_window: Duration,
    /// Initial size of the plane scratch buffer, in bytes.
    pub plane_buffer_initial: usize,
    /// Largest plane payload the session will allocate for, in bytes.
    pub plane_buffer_max: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stale_window: DEFAULT_STALE_WINDOW,
            plane_buffer_initial: 64 * 1024,
            plane_buffer_max: 16 * 1024 * 1024,
        }
    }
}

impl SessionConfig {
    /// Defaults overridden by environment variables:
    /// - `XSLAM_STALE_WINDOW_MS`
    /// - `XSLAM_PLANE_BUFFER_INITIAL`
    /// - `XSLAM_PLANE_BUFFER_MAX`
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let stale_ms = read_u64(
            &lookup,
            "XSLAM_STALE_WINDOW_MS",
            defaults.stale_window.as_millis() as u64,
        );
        let initial = read_u64(
            &lookup,
            "XSLAM_PLANE_BUFFER_INITIAL",
            defaults.plane_buffer_initial as u64,
        ) as usize;
        let max = read_u64(
            &lookup,
            "XSLAM_PLANE_BUFFER_MAX",
            defaults.plane_buffer_max as u64,
        ) as usize;

        let config = Self {
            stale_window: Duration::from_millis(stale_ms),
            plane_buffer_initial: initial.min(max),
            plane_buffer_max: max,
        };
        log::debug!("Session config: {:?}", config);
        config
    }
}

fn read_u64(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u64) -> u64 {
    match lookup(name) {
        None => default,
        Some(raw) => raw.trim().parse::<u64>().unwrap_or_else(|_| {
            log::warn!("Ignoring {}='{}', using {}", name, raw, default);
            default
        }),
    }
}
