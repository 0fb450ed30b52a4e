//! Device session: lifecycle, per-frame event pump, and command dispatch.
//!
//! ```text
//! Uninitialized --initialize--> Initializing --ok--> Ready <--> MappingActive
//!       ^                            |
//!       +-----------fail-------------+          (any) --stop--> Stopped
//! ```

use crate::config::SessionConfig;
use crate::native::{NativeTracker, PlaneRead};
use crate::plane;
use crate::pose::{self, StalenessGate};
use crate::protocol::{self, EventCode};
use crate::types::{CameraModel, Notification, Plane, Pose, SessionState};
use crate::{Result, XslamError};
use crossbeam_channel::{Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Stereo image dimensions, resolved on first use and cleared as a unit.
#[derive(Debug, Default)]
pub struct DimensionCache {
    dims: Option<(u32, u32)>,
}

impl DimensionCache {
    pub fn get(&self) -> Option<(u32, u32)> {
        self.dims
    }

    /// Return the cached dimensions, resolving them with `resolve` if unset.
    /// A failed resolve leaves the cache empty so the next call retries.
    pub fn get_or_resolve(
        &mut self,
        resolve: impl FnOnce() -> Option<(u32, u32)>,
    ) -> Option<(u32, u32)> {
        if self.dims.is_none() {
            self.dims = resolve();
        }
        self.dims
    }

    pub fn invalidate(&mut self) {
        self.dims = None;
    }
}

/// A connection to one tracker.
///
/// All methods take `&mut self`; wrap the session in a [`SharedSession`] when
/// more than one thread needs it.
pub struct DeviceSession<T: NativeTracker> {
    native: T,
    config: SessionConfig,
    state: SessionState,
    camera_model: CameraModel,
    map_loaded: bool,
    planes_pending: bool,
    image_dims: DimensionCache,
    staleness: StalenessGate,
    listeners: Vec<Sender<Notification>>,
    plane_buffer: Vec<u8>,
}

impl<T: NativeTracker> DeviceSession<T> {
    pub fn new(native: T) -> Self {
        Self::with_config(native, SessionConfig::default())
    }

    pub fn with_config(native: T, config: SessionConfig) -> Self {
        let staleness = StalenessGate::new(config.stale_window);
        Self {
            native,
            config,
            state: SessionState::Uninitialized,
            camera_model: CameraModel::Unknown,
            map_loaded: false,
            planes_pending: false,
            image_dims: DimensionCache::default(),
            staleness,
            listeners: Vec::new(),
            plane_buffer: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Camera model detected during [`initialize`](Self::initialize).
    pub fn camera_model(&self) -> CameraModel {
        self.camera_model
    }

    pub fn is_map_loaded(&self) -> bool {
        self.map_loaded
    }

    /// True when the tracker announced new plane geometry that has not been fetched yet.
    pub fn planes_pending(&self) -> bool {
        self.planes_pending
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn native(&self) -> &T {
        &self.native
    }

    pub fn native_mut(&mut self) -> &mut T {
        &mut self.native
    }

    /// Register a new notification listener.
    pub fn subscribe(&mut self) -> Receiver<Notification> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        self.listeners.push(sender);
        receiver
    }

    fn notify(&mut self, notification: Notification) {
        log::debug!("Notify {:?}", notification);
        self.listeners.retain(|tx| tx.send(notification).is_ok());
    }

    fn require(&self, op: &'static str, allowed: &[SessionState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(XslamError::InvalidState {
                op,
                state: self.state,
            })
        }
    }

    fn require_active(&self, op: &'static str) -> Result<()> {
        self.require(op, &[SessionState::Ready, SessionState::MappingActive])
    }

    /// Boot the tracker, start tracking and detect the camera model.
    ///
    /// On failure the session returns to `Uninitialized` and may be retried.
    pub fn initialize(&mut self) -> Result<()> {
        self.require("initialize", &[SessionState::Uninitialized])?;
        self.state = SessionState::Initializing;
        self.image_dims.invalidate();
        self.staleness.reset();
        self.map_loaded = false;
        self.planes_pending = false;

        if !self.native.init() {
            log::warn!("Tracker init failed");
            self.state = SessionState::Uninitialized;
            return Err(XslamError::NativeCallFailed("init"));
        }
        if !self.native.start_tracking() {
            log::warn!("Tracker start tracking failed");
            if !self.native.stop() {
                log::warn!("Tracker stop after failed start tracking reported failure");
            }
            self.state = SessionState::Uninitialized;
            return Err(XslamError::NativeCallFailed("start_tracking"));
        }

        self.camera_model = protocol::parse_camera_model(self.native.camera_model());
        self.state = SessionState::Ready;
        log::info!("Session ready, camera model {:?}", self.camera_model);
        Ok(())
    }

    /// True when the session is running and the tracker has data this tick.
    pub fn is_ready(&mut self) -> bool {
        self.require_active("is_ready").is_ok() && self.native.is_ready()
    }

    /// Per-frame update: drain every queued tracker event.
    ///
    /// Returns `Ok(false)` without touching the queue when the tracker is not
    /// ready this tick. An unknown event code aborts the drain with
    /// [`XslamError::ProtocolDesync`]; the session stays usable and later events
    /// are picked up by the next pump.
    pub fn pump(&mut self) -> Result<bool> {
        self.require_active("pump")?;
        if !self.native.is_ready() {
            return Ok(false);
        }
        self.drain_events()?;
        Ok(true)
    }

    /// [`pump`](Self::pump), then fetch the current pose if the tracker was ready.
    pub fn pump_with_pose(&mut self) -> Result<Option<Pose>> {
        if !self.pump()? {
            return Ok(None);
        }
        self.pose().map(Some)
    }

    fn drain_events(&mut self) -> Result<()> {
        let mut drained = 0usize;
        while let Some(code) = self.native.next_event() {
            let event = EventCode::try_from(code).map_err(|e| {
                log::warn!("Dropping rest of event drain after {} events: {}", drained, e);
                e
            })?;
            drained += 1;
            log::debug!("Tracker event {:?}", event);

            match event {
                EventCode::MapSaved | EventCode::MapSaveFailed => {
                    let status = protocol::parse_save_status(self.native.save_status());
                    let map_quality = self.native.map_quality();
                    self.notify(Notification::MapSaveStatusChanged {
                        status,
                        map_quality,
                    });
                }
                EventCode::MapSwitched => {
                    let map_quality = self.native.map_quality();
                    self.map_loaded = true;
                    if self.state == SessionState::MappingActive {
                        self.state = SessionState::Ready;
                    }
                    self.notify(Notification::CslamSwitched { map_quality });
                }
                EventCode::Localized => {
                    let visibility = self.native.visibility();
                    self.notify(Notification::Localized { visibility });
                }
                EventCode::PlanesUpdated => {
                    self.planes_pending = true;
                }
            }
        }
        if drained > 0 {
            log::trace!("Drained {} tracker events", drained);
        }
        Ok(())
    }

    /// Current pose in the host frame.
    ///
    /// Fails with [`XslamError::PoseStale`] when the tracker has repeated the
    /// same pose for longer than the configured staleness window.
    pub fn pose(&mut self) -> Result<Pose> {
        self.pose_at(Instant::now())
    }

    /// [`pose`](Self::pose) evaluated at an explicit monotonic instant.
    pub fn pose_at(&mut self, now: Instant) -> Result<Pose> {
        self.require_active("pose")?;
        let raw = self
            .native
            .pose()
            .ok_or(XslamError::NativeCallFailed("pose"))?;
        let converted = pose::to_target_space(&raw, self.camera_model);
        self.staleness.observe(converted, now)
    }

    /// Discard the current map and restart mapping from empty.
    pub fn reset_slam(&mut self) -> Result<()> {
        self.require_active("reset_slam")?;
        if !self.native.reset_slam() {
            log::warn!("Tracker refused SLAM reset");
            return Err(XslamError::NativeCallFailed("reset_slam"));
        }
        self.apply_reset();
        Ok(())
    }

    fn apply_reset(&mut self) {
        self.map_loaded = false;
        self.planes_pending = false;
        self.staleness.reset();
        self.image_dims.invalidate();
        log::info!("SLAM reset");
        self.notify(Notification::SlamReset);
    }

    /// Begin building a new map.
    pub fn start_slam(&mut self) -> Result<()> {
        self.require("start_slam", &[SessionState::Ready])?;
        if !self.native.start_slam() {
            return Err(XslamError::NativeCallFailed("start_slam"));
        }
        self.state = SessionState::MappingActive;
        log::info!("Mapping started");
        Ok(())
    }

    /// Request loading the map at `path`.
    ///
    /// Success means the tracker accepted the request; the switch is reported
    /// later as [`Notification::CslamSwitched`]. A previously loaded map is
    /// reset first so only one map is ever active.
    pub fn load_map(&mut self, path: &str) -> Result<()> {
        self.require("load_map", &[SessionState::Ready])?;
        if !self.native.load_map(path) {
            log::warn!("Tracker refused to load map {}", path);
            return Err(XslamError::NativeCallFailed("load_map"));
        }
        if self.map_loaded {
            self.apply_reset();
        }
        self.map_loaded = true;
        log::info!("Map load requested: {}", path);
        Ok(())
    }

    /// Request saving the current map to `path`; completion arrives as
    /// [`Notification::MapSaveStatusChanged`].
    pub fn save_map(&mut self, path: &str) -> Result<()> {
        self.require("save_map", &[SessionState::Ready])?;
        if !self.native.save_map(path) {
            log::warn!("Tracker refused to save map {}", path);
            return Err(XslamError::NativeCallFailed("save_map"));
        }
        log::info!("Map save requested: {}", path);
        Ok(())
    }

    /// Stereo image dimensions, queried from the tracker once per connection.
    pub fn stereo_image_size(&mut self) -> Option<(u32, u32)> {
        if self.require_active("stereo_image_size").is_err() {
            return None;
        }
        let native = &mut self.native;
        self.image_dims
            .get_or_resolve(|| native.stereo_image_size())
    }

    /// Copy the tracker's plane payload into the session buffer and decode it.
    ///
    /// Returns an empty list when the tracker has no geometry.
    pub fn fetch_planes(&mut self) -> Result<Vec<Plane>> {
        self.require_active("fetch_planes")?;
        if self.plane_buffer.is_empty() {
            self.plane_buffer = vec![0u8; self.config.plane_buffer_initial.max(4)];
        }

        loop {
            match self.native.read_planes(&mut self.plane_buffer) {
                PlaneRead::Written(len) => {
                    let len = len.min(self.plane_buffer.len());
                    let planes = plane::decode(&self.plane_buffer[..len])?;
                    self.planes_pending = false;
                    log::trace!("Fetched {} planes ({} bytes)", planes.len(), len);
                    return Ok(planes);
                }
                PlaneRead::NeedsCapacity(len) => {
                    if len > self.config.plane_buffer_max {
                        return Err(XslamError::PlaneBufferTooLarge(len));
                    }
                    if len <= self.plane_buffer.len() {
                        return Err(XslamError::NativeCallFailed("read_planes"));
                    }
                    log::debug!("Growing plane buffer to {} bytes", len);
                    self.plane_buffer.resize(len, 0);
                }
                PlaneRead::Unavailable => return Ok(Vec::new()),
            }
        }
    }

    /// Release the tracker. Calling `stop` again is a no-op.
    pub fn stop(&mut self) -> Result<()> {
        if self.state == SessionState::Stopped {
            return Ok(());
        }
        let released = self.native.stop();
        self.state = SessionState::Stopped;
        self.map_loaded = false;
        self.planes_pending = false;
        self.image_dims.invalidate();
        self.staleness.reset();
        self.plane_buffer = Vec::new();

        if released {
            log::info!("Session stopped");
            Ok(())
        } else {
            log::warn!("Tracker stop reported failure");
            Err(XslamError::NativeCallFailed("stop"))
        }
    }
}

impl<T: NativeTracker + Send + 'static> DeviceSession<T> {
    /// Run [`initialize`](Self::initialize) on a worker thread.
    ///
    /// The session is moved to the worker and handed back exactly once through
    /// the returned [`PendingInit`].
    pub fn spawn_initialize(self) -> Result<PendingInit<T>> {
        let (sender, receiver) = crossbeam_channel::bounded(1);

        let thread = std::thread::Builder::new()
            .name("xslam-init".into())
            .spawn(move || {
                let mut session = self;
                let result = session.initialize();
                if sender.send(InitOutcome { session, result }).is_err() {
                    log::info!("Initialize result dropped, caller went away");
                }
            })
            .map_err(|e| {
                log::warn!("Failed to spawn initialize thread: {}", e);
                XslamError::InitInterrupted
            })?;

        Ok(PendingInit {
            receiver,
            thread: Some(thread),
        })
    }
}

impl<T: NativeTracker> Drop for DeviceSession<T> {
    fn drop(&mut self) {
        if matches!(
            self.state,
            SessionState::Ready | SessionState::MappingActive
        ) {
            let _ = self.stop();
        }
    }
}

/// Session and result handed back by an initialize worker.
pub struct InitOutcome<T: NativeTracker> {
    pub session: DeviceSession<T>,
    pub result: Result<()>,
}

/// Handle to an initialize running on a worker thread.
pub struct PendingInit<T: NativeTracker> {
    receiver: Receiver<InitOutcome<T>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl<T: NativeTracker> PendingInit<T> {
    /// Take the outcome if the worker has finished.
    pub fn try_wait(&mut self) -> Result<Option<InitOutcome<T>>> {
        match self.receiver.try_recv() {
            Ok(outcome) => {
                self.join();
                Ok(Some(outcome))
            }
            Err(crossbeam_channel::TryRecvError::Empty) => Ok(None),
            Err(crossbeam_channel::TryRecvError::Disconnected) => {
                self.join();
                Err(XslamError::InitInterrupted)
            }
        }
    }

    /// Wait up to `timeout` for the outcome.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Result<Option<InitOutcome<T>>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(outcome) => {
                self.join();
                Ok(Some(outcome))
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => Ok(None),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                self.join();
                Err(XslamError::InitInterrupted)
            }
        }
    }

    /// Block until the worker reports.
    pub fn wait(mut self) -> Result<InitOutcome<T>> {
        let outcome = self
            .receiver
            .recv()
            .map_err(|_| XslamError::InitInterrupted);
        self.join();
        outcome
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// A session behind a single lock, for hosts that drive it from several threads.
///
/// The whole session is one critical section so an event drain is never
/// observed half way.
pub struct SharedSession<T: NativeTracker> {
    inner: Arc<Mutex<DeviceSession<T>>>,
}

impl<T: NativeTracker> Clone for SharedSession<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: NativeTracker> SharedSession<T> {
    pub fn new(session: DeviceSession<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Lock the session. A panic in another holder does not poison it for good.
    pub fn lock(&self) -> MutexGuard<'_, DeviceSession<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTracker;
    use crate::protocol::*;
    use crate::types::MapSaveStatus;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn ready_session() -> DeviceSession<MockTracker> {
        init_logger();
        let mut session = DeviceSession::new(MockTracker::new());
        session.initialize().unwrap();
        session
    }

    fn drain(rx: &Receiver<Notification>) -> Vec<Notification> {
        rx.try_iter().collect()
    }

    #[test]
    fn test_initialize_detects_camera_model() {
        init_logger();
        let mut tracker = MockTracker::new();
        tracker.camera_code = CAMERA_DS80;
        let mut session = DeviceSession::new(tracker);
        assert_eq!(session.state(), SessionState::Uninitialized);

        session.initialize().unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.camera_model(), CameraModel::Ds80);
        assert!(matches!(
            session.initialize(),
            Err(XslamError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_failed_initialize_is_retriable() {
        init_logger();
        let mut tracker = MockTracker::new();
        tracker.init_ok = false;
        let mut session = DeviceSession::new(tracker);

        assert!(matches!(
            session.initialize(),
            Err(XslamError::NativeCallFailed("init"))
        ));
        assert_eq!(session.state(), SessionState::Uninitialized);

        session.native_mut().init_ok = true;
        session.native_mut().start_tracking_ok = false;
        assert!(session.initialize().is_err());
        assert_eq!(session.state(), SessionState::Uninitialized);

        // The booted engine is released before the next attempt.
        assert_eq!(session.native().stop_calls, 1);

        session.native_mut().start_tracking_ok = true;
        session.initialize().unwrap();
        assert_eq!(session.native().init_calls, 3);
        assert_eq!(session.native().stop_calls, 1);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_pump_requires_running_session() {
        init_logger();
        let mut session = DeviceSession::new(MockTracker::new());
        assert!(matches!(
            session.pump(),
            Err(XslamError::InvalidState {
                op: "pump",
                state: SessionState::Uninitialized
            })
        ));
        assert!(!session.is_ready());
    }

    #[test]
    fn test_pump_is_noop_when_not_ready() {
        let mut session = ready_session();
        session.native_mut().ready = false;
        session.native_mut().push_event(EVENT_LOCALIZED);

        assert!(!session.pump().unwrap());
        assert_eq!(session.native().events.len(), 1);
        assert!(session.pump_with_pose().unwrap().is_none());
    }

    #[test]
    fn test_drain_emits_one_notification_per_event() {
        let mut session = ready_session();
        let rx = session.subscribe();
        {
            let native = session.native_mut();
            native.save_status = SAVE_STATUS_SAVED;
            native.map_quality = 87;
            native.visibility = 0.75;
            native.push_event(EVENT_MAP_SAVED);
            native.push_event(EVENT_LOCALIZED);
            native.push_event(EVENT_PLANES_UPDATED);
            native.push_event(EVENT_MAP_SWITCHED);
        }

        assert!(session.pump().unwrap());
        assert!(session.native().events.is_empty());
        assert!(session.planes_pending());
        assert!(session.is_map_loaded());
        assert_eq!(
            drain(&rx),
            vec![
                Notification::MapSaveStatusChanged {
                    status: MapSaveStatus::Saved,
                    map_quality: 87
                },
                Notification::Localized { visibility: 0.75 },
                Notification::CslamSwitched { map_quality: 87 },
            ]
        );
    }

    #[test]
    fn test_save_failure_reports_status() {
        let mut session = ready_session();
        let rx = session.subscribe();
        session.native_mut().save_status = SAVE_STATUS_ERROR;
        session.native_mut().push_event(EVENT_MAP_SAVE_FAILED);

        session.pump().unwrap();
        assert_eq!(
            drain(&rx),
            vec![Notification::MapSaveStatusChanged {
                status: MapSaveStatus::Error,
                map_quality: 0
            }]
        );
    }

    #[test]
    fn test_unknown_event_desyncs_only_current_pump() {
        let mut session = ready_session();
        let rx = session.subscribe();
        {
            let native = session.native_mut();
            native.push_event(EVENT_LOCALIZED);
            native.push_event(77);
            native.push_event(EVENT_LOCALIZED);
        }

        assert!(matches!(session.pump(), Err(XslamError::ProtocolDesync(77))));
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(drain(&rx).len(), 1);

        assert!(session.pump().unwrap());
        assert_eq!(drain(&rx).len(), 1);
    }

    #[test]
    fn test_dropped_listener_is_pruned() {
        let mut session = ready_session();
        let kept = session.subscribe();
        drop(session.subscribe());
        session.native_mut().push_event(EVENT_LOCALIZED);

        session.pump().unwrap();
        assert_eq!(session.listeners.len(), 1);
        assert_eq!(drain(&kept).len(), 1);
    }

    #[test]
    fn test_pose_is_converted_for_camera_model() {
        let mut tracker = MockTracker::new();
        tracker.camera_code = CAMERA_XR50;
        tracker.set_pose([1.0, 2.0, 3.0], crate::pose::euler_to_quaternion([10.0, 20.0, 30.0]));
        let mut session = DeviceSession::new(tracker);
        session.initialize().unwrap();

        let pose = session.pose().unwrap();
        assert_eq!(pose.position, [-1.0, -2.0, -3.0]);
        let euler = crate::pose::quaternion_to_euler(pose.orientation);
        assert!((euler[0] + 10.0).abs() < 1e-9);
        assert!((euler[1] + 20.0).abs() < 1e-9);
        assert!((euler[2] - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_pose_staleness_across_pumps() {
        let mut session = ready_session();
        session.native_mut().set_pose([0.1, 0.2, 0.3], [0.0, 0.0, 0.0, 1.0]);
        let t0 = Instant::now();

        for ms in [0u64, 100, 250, 499] {
            assert!(session.pump().unwrap());
            assert!(session.pose_at(t0 + Duration::from_millis(ms)).is_ok());
        }
        assert!(session.pump().unwrap());
        assert!(matches!(
            session.pose_at(t0 + Duration::from_millis(650)),
            Err(XslamError::PoseStale)
        ));

        session.native_mut().set_pose([0.1, 0.2, 0.4], [0.0, 0.0, 0.0, 1.0]);
        assert!(session.pose_at(t0 + Duration::from_millis(700)).is_ok());
    }

    #[test]
    fn test_missing_pose_is_not_stale() {
        let mut session = ready_session();
        assert!(matches!(
            session.pose(),
            Err(XslamError::NativeCallFailed("pose"))
        ));
    }

    #[test]
    fn test_reset_keeps_state_and_notifies() {
        let mut session = ready_session();
        let rx = session.subscribe();
        session.start_slam().unwrap();
        assert_eq!(session.state(), SessionState::MappingActive);

        session.reset_slam().unwrap();
        assert_eq!(session.state(), SessionState::MappingActive);
        assert!(!session.is_map_loaded());
        assert_eq!(drain(&rx), vec![Notification::SlamReset]);

        session.native_mut().commands_ok = false;
        assert!(session.reset_slam().is_err());
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn test_map_commands_only_when_ready() {
        let mut session = ready_session();
        session.start_slam().unwrap();
        assert!(matches!(
            session.load_map("/maps/a.bin"),
            Err(XslamError::InvalidState { op: "load_map", .. })
        ));
        assert!(session.save_map("/maps/a.bin").is_err());
        assert!(session.start_slam().is_err());

        // Switching to the saved map brings the session back to Ready.
        session.native_mut().push_event(EVENT_MAP_SWITCHED);
        session.pump().unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        session.save_map("/maps/b.bin").unwrap();
        assert_eq!(session.native().saved_maps, vec!["/maps/b.bin".to_string()]);
    }

    #[test]
    fn test_second_load_resets_once() {
        let mut session = ready_session();
        let rx = session.subscribe();

        session.load_map("/maps/first.bin").unwrap();
        assert!(session.is_map_loaded());
        assert!(drain(&rx).is_empty());

        session.load_map("/maps/second.bin").unwrap();
        assert!(session.is_map_loaded());
        assert_eq!(drain(&rx), vec![Notification::SlamReset]);
        assert_eq!(session.native().loaded_maps.len(), 2);
        assert_eq!(session.native().reset_calls, 0);
    }

    #[test]
    fn test_refused_load_keeps_current_map() {
        let mut session = ready_session();
        let rx = session.subscribe();
        session.load_map("/maps/first.bin").unwrap();
        session.native_mut().commands_ok = false;

        assert!(session.load_map("/maps/second.bin").is_err());
        assert!(session.is_map_loaded());
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut session = ready_session();
        session.stop().unwrap();
        session.stop().unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.native().stop_calls, 1);
        assert!(session.pump().is_err());
        assert!(session.initialize().is_err());
    }

    #[test]
    fn test_failed_native_stop_still_stops() {
        let mut session = ready_session();
        session.native_mut().stop_ok = false;

        assert!(matches!(
            session.stop(),
            Err(XslamError::NativeCallFailed("stop"))
        ));
        assert_eq!(session.state(), SessionState::Stopped);
        session.stop().unwrap();
        assert_eq!(session.native().stop_calls, 1);
    }

    #[test]
    fn test_stop_before_initialize() {
        init_logger();
        let mut session = DeviceSession::new(MockTracker::new());
        session.stop().unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
        session.stop().unwrap();
        assert_eq!(session.native().stop_calls, 1);
        assert!(matches!(
            session.initialize(),
            Err(XslamError::InvalidState {
                op: "initialize",
                state: SessionState::Stopped
            })
        ));
    }

    #[test]
    fn test_image_size_is_cached_until_reset() {
        let mut session = ready_session();
        session.native_mut().image_size = Some((640, 400));

        assert_eq!(session.image_dims.get(), None);
        assert_eq!(session.stereo_image_size(), Some((640, 400)));
        assert_eq!(session.stereo_image_size(), Some((640, 400)));
        assert_eq!(session.native().image_size_queries, 1);

        session.reset_slam().unwrap();
        assert_eq!(session.image_dims.get(), None);
        assert_eq!(session.stereo_image_size(), Some((640, 400)));
        assert_eq!(session.native().image_size_queries, 2);
    }

    #[test]
    fn test_unresolved_image_size_retries() {
        let mut session = ready_session();
        assert_eq!(session.stereo_image_size(), None);
        session.native_mut().image_size = Some((1280, 800));
        assert_eq!(session.stereo_image_size(), Some((1280, 800)));
    }

    fn one_plane_payload(id: &str) -> Vec<u8> {
        let mut buf = 1i32.to_le_bytes().to_vec();
        buf.extend_from_slice(&0i32.to_le_bytes());
        for c in [0.0f64, 1.0, 0.0, -0.5] {
            buf.extend_from_slice(&c.to_le_bytes());
        }
        buf.extend_from_slice(&(id.len() as i32).to_le_bytes());
        buf.extend_from_slice(id.as_bytes());
        buf.extend_from_slice(&0i32.to_le_bytes());
        buf.extend_from_slice(&0i32.to_le_bytes());
        buf
    }

    #[test]
    fn test_fetch_planes_grows_buffer() {
        init_logger();
        let config = SessionConfig {
            plane_buffer_initial: 8,
            ..SessionConfig::default()
        };
        let mut session = DeviceSession::with_config(MockTracker::new(), config);
        session.initialize().unwrap();
        assert!(session.fetch_planes().unwrap().is_empty());

        session.native_mut().plane_payload = Some(one_plane_payload("wall-3"));
        session.native_mut().push_event(EVENT_PLANES_UPDATED);
        session.pump().unwrap();
        assert!(session.planes_pending());

        let planes = session.fetch_planes().unwrap();
        assert_eq!(planes.len(), 1);
        assert_eq!(planes[0].id, "wall-3");
        assert_eq!(planes[0].d, -0.5);
        assert!(!session.planes_pending());
    }

    #[test]
    fn test_fetch_planes_respects_cap_and_corruption() {
        init_logger();
        let config = SessionConfig {
            plane_buffer_initial: 8,
            plane_buffer_max: 16,
            ..SessionConfig::default()
        };
        let mut session = DeviceSession::with_config(MockTracker::new(), config);
        session.initialize().unwrap();

        session.native_mut().plane_payload = Some(one_plane_payload("floor"));
        assert!(matches!(
            session.fetch_planes(),
            Err(XslamError::PlaneBufferTooLarge(_))
        ));

        session.native_mut().plane_payload = Some(vec![2, 0, 0, 0, 0, 0]);
        assert!(matches!(
            session.fetch_planes(),
            Err(XslamError::BufferUnderrun { .. })
        ));
    }

    #[test]
    fn test_spawn_initialize_hands_session_back() {
        init_logger();
        let mut tracker = MockTracker::new();
        tracker.init_delay = Duration::from_millis(20);
        tracker.camera_code = CAMERA_DS60;

        let pending = DeviceSession::new(tracker).spawn_initialize().unwrap();
        let InitOutcome { mut session, result } = pending.wait().unwrap();
        result.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.camera_model(), CameraModel::Ds60);
        assert!(session.pump().unwrap());
    }

    #[test]
    fn test_spawn_initialize_reports_failure() {
        init_logger();
        let mut tracker = MockTracker::new();
        tracker.init_ok = false;

        let mut pending = DeviceSession::new(tracker).spawn_initialize().unwrap();
        let outcome = loop {
            if let Some(outcome) = pending.wait_timeout(Duration::from_secs(5)).unwrap() {
                break outcome;
            }
        };
        assert!(outcome.result.is_err());
        assert_eq!(outcome.session.state(), SessionState::Uninitialized);
    }

    #[test]
    fn test_shared_session_across_threads() {
        let shared = SharedSession::new(ready_session());
        let rx = shared.lock().subscribe();

        let worker = {
            let shared = shared.clone();
            std::thread::spawn(move || {
                for _ in 0..10 {
                    let mut session = shared.lock();
                    session.native_mut().push_event(EVENT_LOCALIZED);
                    session.pump().unwrap();
                }
            })
        };
        worker.join().unwrap();

        assert_eq!(drain(&rx).len(), 10);
        shared.lock().stop().unwrap();
    }
}
