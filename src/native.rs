use crate::types::Pose;

/// Outcome of asking the tracker to copy its plane geometry into a caller buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneRead {
    /// The first `n` bytes of the buffer hold a complete plane payload.
    Written(usize),
    /// The payload needs a buffer of at least `n` bytes; nothing was written.
    NeedsCapacity(usize),
    /// No plane geometry is available.
    Unavailable,
}

/// Entry points of the native tracking engine.
///
/// The session is the only caller and never calls concurrently. Return values
/// are passed through untouched; interpreting codes is left to
/// [`crate::protocol`].
pub trait NativeTracker {
    /// Boot the engine. May block for a long time on first connection.
    fn init(&mut self) -> bool;

    fn start_tracking(&mut self) -> bool;

    /// Release every native resource held by the engine.
    fn stop(&mut self) -> bool;

    /// Whether a fresh frame of tracking data is available this tick.
    fn is_ready(&mut self) -> bool;

    /// Raw camera model capability code.
    fn camera_model(&mut self) -> i32;

    /// Pop the next queued event code, or `None` when the queue is empty.
    fn next_event(&mut self) -> Option<i32>;

    fn save_status(&mut self) -> i32;

    fn map_quality(&mut self) -> i32;

    /// Fraction of the loaded map currently in view, in `[0, 1]`.
    fn visibility(&mut self) -> f32;

    /// Latest device-space pose.
    fn pose(&mut self) -> Option<Pose>;

    fn reset_slam(&mut self) -> bool;

    fn start_slam(&mut self) -> bool;

    /// Request loading the map at `path` and switching to C-SLAM.
    fn load_map(&mut self, path: &str) -> bool;

    /// Request saving the current map to `path` and switching to C-SLAM.
    fn save_map(&mut self, path: &str) -> bool;

    /// Stereo image `(width, height)` in pixels.
    fn stereo_image_size(&mut self) -> Option<(u32, u32)>;

    /// Copy the current plane payload into `buf`.
    ///
    /// `buf` is only borrowed for the duration of the call.
    fn read_planes(&mut self, buf: &mut [u8]) -> PlaneRead;
}
