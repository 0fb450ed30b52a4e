//! Scriptable in-memory tracker for tests and demos.

use crate::native::{NativeTracker, PlaneRead};
use crate::types::Pose;
use std::collections::VecDeque;
use std::time::Duration;

/// A [`NativeTracker`] whose every answer is set by the caller.
///
/// Fields are public so a test can script the device and inspect what the
/// session asked of it.
#[derive(Debug, Clone)]
pub struct MockTracker {
    pub init_ok: bool,
    pub start_tracking_ok: bool,
    /// Simulated boot time spent inside `init`.
    pub init_delay: Duration,
    pub stop_ok: bool,
    pub ready: bool,
    pub camera_code: i32,
    pub events: VecDeque<i32>,
    pub save_status: i32,
    pub map_quality: i32,
    pub visibility: f32,
    pub pose: Option<Pose>,
    /// Result returned by reset/start/load/save commands.
    pub commands_ok: bool,
    pub image_size: Option<(u32, u32)>,
    pub plane_payload: Option<Vec<u8>>,

    pub init_calls: usize,
    pub stop_calls: usize,
    pub reset_calls: usize,
    pub image_size_queries: usize,
    pub loaded_maps: Vec<String>,
    pub saved_maps: Vec<String>,
}

impl Default for MockTracker {
    fn default() -> Self {
        Self {
            init_ok: true,
            start_tracking_ok: true,
            init_delay: Duration::ZERO,
            stop_ok: true,
            ready: true,
            camera_code: 0,
            events: VecDeque::new(),
            save_status: 0,
            map_quality: 0,
            visibility: 0.0,
            pose: None,
            commands_ok: true,
            image_size: None,
            plane_payload: None,
            init_calls: 0,
            stop_calls: 0,
            reset_calls: 0,
            image_size_queries: 0,
            loaded_maps: Vec::new(),
            saved_maps: Vec::new(),
        }
    }
}

impl MockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event code for the next drain.
    pub fn push_event(&mut self, code: i32) {
        self.events.push_back(code);
    }

    /// Report a device-space pose from now on.
    pub fn set_pose(&mut self, position: [f64; 3], orientation: [f64; 4]) {
        let timestamp_us = self.pose.map_or(0, |p| p.timestamp_us + 1000);
        self.pose = Some(Pose {
            position,
            orientation,
            confidence: 1.0,
            timestamp_us,
        });
    }
}

impl NativeTracker for MockTracker {
    fn init(&mut self) -> bool {
        self.init_calls += 1;
        if !self.init_delay.is_zero() {
            std::thread::sleep(self.init_delay);
        }
        self.init_ok
    }

    fn start_tracking(&mut self) -> bool {
        self.start_tracking_ok
    }

    fn stop(&mut self) -> bool {
        self.stop_calls += 1;
        self.stop_ok
    }

    fn is_ready(&mut self) -> bool {
        self.ready
    }

    fn camera_model(&mut self) -> i32 {
        self.camera_code
    }

    fn next_event(&mut self) -> Option<i32> {
        self.events.pop_front()
    }

    fn save_status(&mut self) -> i32 {
        self.save_status
    }

    fn map_quality(&mut self) -> i32 {
        self.map_quality
    }

    fn visibility(&mut self) -> f32 {
        self.visibility
    }

    fn pose(&mut self) -> Option<Pose> {
        self.pose
    }

    fn reset_slam(&mut self) -> bool {
        self.reset_calls += 1;
        self.commands_ok
    }

    fn start_slam(&mut self) -> bool {
        self.commands_ok
    }

    fn load_map(&mut self, path: &str) -> bool {
        if self.commands_ok {
            self.loaded_maps.push(path.to_string());
        }
        self.commands_ok
    }

    fn save_map(&mut self, path: &str) -> bool {
        if self.commands_ok {
            self.saved_maps.push(path.to_string());
        }
        self.commands_ok
    }

    fn stereo_image_size(&mut self) -> Option<(u32, u32)> {
        self.image_size_queries += 1;
        self.image_size
    }

    fn read_planes(&mut self, buf: &mut [u8]) -> PlaneRead {
        match &self.plane_payload {
            None => PlaneRead::Unavailable,
            Some(payload) if payload.len() > buf.len() => PlaneRead::NeedsCapacity(payload.len()),
            Some(payload) => {
                buf[..payload.len()].copy_from_slice(payload);
                PlaneRead::Written(payload.len())
            }
        }
    }
}
