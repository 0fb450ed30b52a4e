//! Bindings to the vendor tracking library (`libxslam_unity_wrapper`).
//!
//! Only built with the `sys` feature. Set `XSLAM_LIB_DIR` to the directory
//! holding the library if it is not on the default linker path.

use crate::native::{NativeTracker, PlaneRead};
use crate::types::Pose;
use std::ffi::{c_char, c_int, CString};

#[link(name = "xslam_unity_wrapper")]
extern "C" {
    fn xslam_init() -> bool;
    fn xslam_start_tracking() -> bool;
    fn xslam_stop() -> bool;
    fn xslam_ready() -> bool;
    fn xslam_camera_model() -> c_int;
    fn xslam_get_event(code: *mut c_int) -> bool;
    fn xslam_save_map_status() -> c_int;
    fn xslam_map_quality() -> c_int;
    fn xslam_localized_visibility() -> f32;
    fn xslam_get_6dof(
        position: *mut f64,
        orientation: *mut f64,
        confidence: *mut f64,
        timestamp_us: *mut i64,
    ) -> bool;
    fn xslam_reset_slam() -> bool;
    fn xslam_start_slam() -> bool;
    fn xslam_load_map_and_switch_to_cslam(path: *const c_char) -> bool;
    fn xslam_save_map_and_switch_to_cslam(path: *const c_char) -> bool;
    fn xslam_stereo_size(width: *mut c_int, height: *mut c_int) -> bool;
    /// Returns 1 when written, 0 when no planes, -1 when `capacity` is too small.
    fn xslam_get_planes(buffer: *mut u8, capacity: c_int, size: *mut c_int) -> c_int;
}

/// [`NativeTracker`] backed by the vendor library.
///
/// The library keeps process-global state, so only one instance should be
/// driven at a time.
pub struct SysTracker {
    _private: (),
}

impl SysTracker {
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl Default for SysTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn with_path(path: &str, call: unsafe extern "C" fn(*const c_char) -> bool) -> bool {
    match CString::new(path) {
        Ok(c_path) => unsafe { call(c_path.as_ptr()) },
        Err(_) => {
            log::warn!("Map path contains an interior NUL byte: {:?}", path);
            false
        }
    }
}

impl NativeTracker for SysTracker {
    fn init(&mut self) -> bool {
        unsafe { xslam_init() }
    }

    fn start_tracking(&mut self) -> bool {
        unsafe { xslam_start_tracking() }
    }

    fn stop(&mut self) -> bool {
        unsafe { xslam_stop() }
    }

    fn is_ready(&mut self) -> bool {
        unsafe { xslam_ready() }
    }

    fn camera_model(&mut self) -> i32 {
        unsafe { xslam_camera_model() }
    }

    fn next_event(&mut self) -> Option<i32> {
        let mut code: c_int = 0;
        if unsafe { xslam_get_event(&mut code) } {
            Some(code)
        } else {
            None
        }
    }

    fn save_status(&mut self) -> i32 {
        unsafe { xslam_save_map_status() }
    }

    fn map_quality(&mut self) -> i32 {
        unsafe { xslam_map_quality() }
    }

    fn visibility(&mut self) -> f32 {
        unsafe { xslam_localized_visibility() }
    }

    fn pose(&mut self) -> Option<Pose> {
        let mut position = [0.0f64; 3];
        let mut orientation = [0.0f64; 4];
        let mut confidence = 0.0f64;
        let mut timestamp_us: i64 = 0;
        let ok = unsafe {
            xslam_get_6dof(
                position.as_mut_ptr(),
                orientation.as_mut_ptr(),
                &mut confidence,
                &mut timestamp_us,
            )
        };
        ok.then(|| Pose {
            position,
            orientation,
            confidence,
            timestamp_us: timestamp_us.max(0) as u64,
        })
    }

    fn reset_slam(&mut self) -> bool {
        unsafe { xslam_reset_slam() }
    }

    fn start_slam(&mut self) -> bool {
        unsafe { xslam_start_slam() }
    }

    fn load_map(&mut self, path: &str) -> bool {
        with_path(path, xslam_load_map_and_switch_to_cslam)
    }

    fn save_map(&mut self, path: &str) -> bool {
        with_path(path, xslam_save_map_and_switch_to_cslam)
    }

    fn stereo_image_size(&mut self) -> Option<(u32, u32)> {
        let mut width: c_int = 0;
        let mut height: c_int = 0;
        if !unsafe { xslam_stereo_size(&mut width, &mut height) } {
            return None;
        }
        match (u32::try_from(width), u32::try_from(height)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        }
    }

    fn read_planes(&mut self, buf: &mut [u8]) -> PlaneRead {
        let capacity = c_int::try_from(buf.len()).unwrap_or(c_int::MAX);
        let mut size: c_int = 0;
        let rc = unsafe { xslam_get_planes(buf.as_mut_ptr(), capacity, &mut size) };
        let size = usize::try_from(size).unwrap_or(0);
        match rc {
            1 => PlaneRead::Written(size.min(buf.len())),
            -1 => PlaneRead::NeedsCapacity(size),
            _ => PlaneRead::Unavailable,
        }
    }
}
