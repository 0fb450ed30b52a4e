//! C FFI layer for xslam.
//!
//! Provides opaque handle-based API for C/C++ consumers.
//! The generated C header is written to `include/xslam.h` by cbindgen.
//! Session entry points are only available with the `sys` feature.

use crate::error::LastError;
use crate::types::{Plane, Vec3};
use std::ffi::{c_char, c_int, CString};

/// Last error message for C consumers.
static LAST_ERROR: LastError = LastError::new();

fn report<T>(result: crate::Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            LAST_ERROR.set(&e);
            None
        }
    }
}

/// Opaque list of decoded planes.
pub struct XsPlaneList {
    planes: Vec<Plane>,
    /// NUL-terminated copies of the plane ids, same order as `planes`.
    ids: Vec<CString>,
}

impl XsPlaneList {
    fn new(planes: Vec<Plane>) -> Self {
        let ids = planes
            .iter()
            .map(|p| CString::new(p.id.replace('\0', "")).unwrap_or_default())
            .collect();
        Self { planes, ids }
    }
}

/// Decode a plane buffer.
/// Returns NULL on error (check xs_last_error()).
///
/// # Safety
/// `data` must point to `len` readable bytes, or be null when `len` is 0.
#[no_mangle]
pub unsafe extern "C" fn xs_decode_planes(data: *const u8, len: usize) -> *mut XsPlaneList {
    let bytes: &[u8] = if len == 0 {
        &[]
    } else if data.is_null() {
        return std::ptr::null_mut();
    } else {
        std::slice::from_raw_parts(data, len)
    };

    match report(crate::plane::decode(bytes)) {
        Some(planes) => Box::into_raw(Box::new(XsPlaneList::new(planes))),
        None => std::ptr::null_mut(),
    }
}

/// Free a plane list returned by `xs_decode_planes`.
///
/// # Safety
/// `list` must be a pointer returned by `xs_decode_planes`, or null.
#[no_mangle]
pub unsafe extern "C" fn xs_free_plane_list(list: *mut XsPlaneList) {
    if !list.is_null() {
        drop(Box::from_raw(list));
    }
}

/// Number of planes in the list.
///
/// # Safety
/// `list` must be a valid plane list pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn xs_plane_count(list: *const XsPlaneList) -> usize {
    if list.is_null() {
        return 0;
    }
    let list = &*list;
    list.planes.len()
}

unsafe fn plane_at<'a>(list: *const XsPlaneList, index: usize) -> Option<&'a Plane> {
    if list.is_null() {
        return None;
    }
    let list: &'a XsPlaneList = &*list;
    list.planes.get(index)
}

/// Plane id as a null-terminated string, valid for the lifetime of the list.
///
/// # Safety
/// `list` must be a valid plane list pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn xs_plane_id(list: *const XsPlaneList, index: usize) -> *const c_char {
    if list.is_null() {
        return std::ptr::null();
    }
    let list = &*list;
    match list.ids.get(index) {
        Some(id) => id.as_ptr(),
        None => std::ptr::null(),
    }
}

/// Write the plane normal (3 doubles) and offset. Returns false for a bad index.
///
/// # Safety
/// `normal` must point to 3 writable doubles and `d` to one, or be null.
#[no_mangle]
pub unsafe extern "C" fn xs_plane_equation(
    list: *const XsPlaneList,
    index: usize,
    normal: *mut f64,
    d: *mut f64,
) -> bool {
    let Some(plane) = plane_at(list, index) else {
        return false;
    };
    if !normal.is_null() {
        std::ptr::copy_nonoverlapping(plane.normal.as_ptr(), normal, 3);
    }
    if !d.is_null() {
        d.write(plane.d);
    }
    true
}

unsafe fn copy_points(points: &[Vec3], out: *mut f64, max: usize) -> c_int {
    if !out.is_null() {
        for (i, p) in points.iter().take(max).enumerate() {
            std::ptr::copy_nonoverlapping(p.as_ptr(), out.add(i * 3), 3);
        }
    }
    c_int::try_from(points.len()).unwrap_or(c_int::MAX)
}

/// Copy up to `max` border points as xyz triples into `out`.
/// Returns the total number of border points, or -1 for a bad index.
///
/// # Safety
/// `out` must point to at least `3 * max` writable doubles, or be null.
#[no_mangle]
pub unsafe extern "C" fn xs_plane_border_points(
    list: *const XsPlaneList,
    index: usize,
    out: *mut f64,
    max: usize,
) -> c_int {
    match plane_at(list, index) {
        Some(plane) => copy_points(&plane.border_points, out, max),
        None => -1,
    }
}

/// Copy up to `max` mesh vertices as xyz triples into `out`.
/// Returns the total number of vertices, or -1 for a bad index.
///
/// # Safety
/// `out` must point to at least `3 * max` writable doubles, or be null.
#[no_mangle]
pub unsafe extern "C" fn xs_plane_vertices(
    list: *const XsPlaneList,
    index: usize,
    out: *mut f64,
    max: usize,
) -> c_int {
    match plane_at(list, index) {
        Some(plane) => copy_points(&plane.vertices, out, max),
        None => -1,
    }
}

/// Copy up to `max` triangles as index triples into `out`.
/// Returns the total number of triangles, or -1 for a bad index.
///
/// # Safety
/// `out` must point to at least `3 * max` writable u32 values, or be null.
#[no_mangle]
pub unsafe extern "C" fn xs_plane_triangles(
    list: *const XsPlaneList,
    index: usize,
    out: *mut u32,
    max: usize,
) -> c_int {
    let Some(plane) = plane_at(list, index) else {
        return -1;
    };
    if !out.is_null() {
        for (i, tri) in plane.triangles.iter().take(max).enumerate() {
            std::ptr::copy_nonoverlapping(tri.as_ptr(), out.add(i * 3), 3);
        }
    }
    c_int::try_from(plane.triangles.len()).unwrap_or(c_int::MAX)
}

/// Get the last error message. Returns NULL if no error.
/// The returned pointer is valid until the next xslam API call.
#[no_mangle]
pub extern "C" fn xs_last_error() -> *const c_char {
    LAST_ERROR.as_ptr()
}

#[cfg(feature = "sys")]
pub use session_api::*;

#[cfg(feature = "sys")]
mod session_api {
    use super::report;
    use crate::session::DeviceSession;
    use crate::sys::SysTracker;
    use crate::types::{MapSaveStatus, Notification, Pose};
    use crate::{SessionConfig, XslamError};
    use crossbeam_channel::Receiver;
    use std::ffi::{c_char, c_int, CStr};

    /// Opaque session handle for C consumers.
    pub struct XsSession {
        session: DeviceSession<SysTracker>,
        notifications: Receiver<Notification>,
    }

    /// Notification in C-compatible layout.
    /// `kind`: 0 = Localized, 1 = CslamSwitched, 2 = MapSaveStatusChanged, 3 = SlamReset.
    #[repr(C)]
    pub struct XsNotification {
        pub kind: c_int,
        pub visibility: f32,
        pub map_quality: c_int,
        /// `MapSaveStatus` as integer; only meaningful for kind 2.
        pub save_status: c_int,
    }

    impl From<Notification> for XsNotification {
        fn from(n: Notification) -> Self {
            let mut out = XsNotification {
                kind: 0,
                visibility: 0.0,
                map_quality: 0,
                save_status: MapSaveStatus::NotLoaded as c_int,
            };
            match n {
                Notification::Localized { visibility } => out.visibility = visibility,
                Notification::CslamSwitched { map_quality } => {
                    out.kind = 1;
                    out.map_quality = map_quality;
                }
                Notification::MapSaveStatusChanged {
                    status,
                    map_quality,
                } => {
                    out.kind = 2;
                    out.map_quality = map_quality;
                    out.save_status = status as c_int;
                }
                Notification::SlamReset => out.kind = 3,
            }
            out
        }
    }

    unsafe fn session_mut<'a>(s: *mut XsSession) -> Option<&'a mut XsSession> {
        if s.is_null() {
            None
        } else {
            Some(&mut *s)
        }
    }

    unsafe fn path_arg(path: *const c_char) -> Option<String> {
        if path.is_null() {
            return None;
        }
        Some(CStr::from_ptr(path).to_string_lossy().into_owned())
    }

    /// Create a session configured from `XSLAM_*` environment variables.
    #[no_mangle]
    pub extern "C" fn xs_session_new() -> *mut XsSession {
        let mut session = DeviceSession::with_config(SysTracker::new(), SessionConfig::from_env());
        let notifications = session.subscribe();
        Box::into_raw(Box::new(XsSession {
            session,
            notifications,
        }))
    }

    /// Stop and free a session.
    ///
    /// # Safety
    /// `s` must be a pointer returned by `xs_session_new`, or null.
    #[no_mangle]
    pub unsafe extern "C" fn xs_session_free(s: *mut XsSession) {
        if !s.is_null() {
            drop(Box::from_raw(s));
        }
    }

    /// Initialize the tracker. Blocks until the device has booted.
    ///
    /// # Safety
    /// `s` must be a valid session pointer, or null.
    #[no_mangle]
    pub unsafe extern "C" fn xs_session_initialize(s: *mut XsSession) -> bool {
        session_mut(s).is_some_and(|s| report(s.session.initialize()).is_some())
    }

    /// # Safety
    /// `s` must be a valid session pointer, or null.
    #[no_mangle]
    pub unsafe extern "C" fn xs_session_is_ready(s: *mut XsSession) -> bool {
        session_mut(s).is_some_and(|s| s.session.is_ready())
    }

    /// Drain tracker events. Returns false when the tracker is not ready or on error.
    ///
    /// # Safety
    /// `s` must be a valid session pointer, or null.
    #[no_mangle]
    pub unsafe extern "C" fn xs_session_pump(s: *mut XsSession) -> bool {
        session_mut(s).is_some_and(|s| report(s.session.pump()).unwrap_or(false))
    }

    /// Pop the next pending notification. Returns false when none is queued.
    ///
    /// # Safety
    /// `s` must be a valid session pointer and `out` writable, or null.
    #[no_mangle]
    pub unsafe extern "C" fn xs_session_poll_notification(
        s: *mut XsSession,
        out: *mut XsNotification,
    ) -> bool {
        let Some(s) = session_mut(s) else {
            return false;
        };
        if out.is_null() {
            return false;
        }
        match s.notifications.try_recv() {
            Ok(n) => {
                out.write(n.into());
                true
            }
            Err(_) => false,
        }
    }

    /// Detected camera model as integer (`CameraModel`), 0 when unknown.
    ///
    /// # Safety
    /// `s` must be a valid session pointer, or null.
    #[no_mangle]
    pub unsafe extern "C" fn xs_session_camera_model(s: *mut XsSession) -> c_int {
        session_mut(s).map_or(0, |s| s.session.camera_model() as c_int)
    }

    /// Fetch the current host-frame pose.
    /// Returns 0 on success, 1 when the pose is stale, -1 on error.
    ///
    /// # Safety
    /// `s` must be a valid session pointer and `out` writable, or null.
    #[no_mangle]
    pub unsafe extern "C" fn xs_session_get_pose(s: *mut XsSession, out: *mut Pose) -> c_int {
        let Some(s) = session_mut(s) else {
            return -1;
        };
        if out.is_null() {
            return -1;
        }
        match s.session.pose() {
            Ok(pose) => {
                out.write(pose);
                0
            }
            Err(XslamError::PoseStale) => 1,
            Err(e) => {
                super::LAST_ERROR.set(&e);
                -1
            }
        }
    }

    /// # Safety
    /// `s` must be a valid session pointer, or null.
    #[no_mangle]
    pub unsafe extern "C" fn xs_session_reset_slam(s: *mut XsSession) -> bool {
        session_mut(s).is_some_and(|s| report(s.session.reset_slam()).is_some())
    }

    /// # Safety
    /// `s` must be a valid session pointer, or null.
    #[no_mangle]
    pub unsafe extern "C" fn xs_session_start_slam(s: *mut XsSession) -> bool {
        session_mut(s).is_some_and(|s| report(s.session.start_slam()).is_some())
    }

    /// Request loading a map. Completion is reported as a CslamSwitched notification.
    ///
    /// # Safety
    /// `s` must be a valid session pointer and `path` a null-terminated string, or null.
    #[no_mangle]
    pub unsafe extern "C" fn xs_session_load_map(s: *mut XsSession, path: *const c_char) -> bool {
        match (session_mut(s), path_arg(path)) {
            (Some(s), Some(path)) => report(s.session.load_map(&path)).is_some(),
            _ => false,
        }
    }

    /// Request saving the map. Completion is reported as a MapSaveStatusChanged notification.
    ///
    /// # Safety
    /// `s` must be a valid session pointer and `path` a null-terminated string, or null.
    #[no_mangle]
    pub unsafe extern "C" fn xs_session_save_map(s: *mut XsSession, path: *const c_char) -> bool {
        match (session_mut(s), path_arg(path)) {
            (Some(s), Some(path)) => report(s.session.save_map(&path)).is_some(),
            _ => false,
        }
    }

    /// Decode the tracker's current planes into a list freed with `xs_free_plane_list`.
    /// Returns NULL on error.
    ///
    /// # Safety
    /// `s` must be a valid session pointer, or null.
    #[no_mangle]
    pub unsafe extern "C" fn xs_session_fetch_planes(s: *mut XsSession) -> *mut super::XsPlaneList {
        let Some(s) = session_mut(s) else {
            return std::ptr::null_mut();
        };
        match report(s.session.fetch_planes()) {
            Some(planes) => Box::into_raw(Box::new(super::XsPlaneList::new(planes))),
            None => std::ptr::null_mut(),
        }
    }

    /// Stop the session. Safe to call more than once.
    ///
    /// # Safety
    /// `s` must be a valid session pointer, or null.
    #[no_mangle]
    pub unsafe extern "C" fn xs_session_stop(s: *mut XsSession) -> bool {
        session_mut(s).is_some_and(|s| report(s.session.stop()).is_some())
    }
}
