//! # xslam - plane decoding and device-session core for XVisio SLAM trackers
//!
//! Provides:
//! - A decoder for the tracker's binary plane-geometry buffers
//! - Device-space to host-space pose conversion with per-camera axis corrections
//! - A device session that drives the tracker's lifecycle and event queue
//! - C FFI for integration with game engines and other native hosts
//!
//! ## Quick Start
//! ```no_run
//! use xslam::mock::MockTracker;
//! use xslam::{DeviceSession, Notification};
//!
//! let mut session = DeviceSession::new(MockTracker::new());
//! let notifications = session.subscribe();
//! session.initialize().unwrap();
//!
//! loop {
//!     if session.pump().unwrap() {
//!         if let Ok(pose) = session.pose() {
//!             println!("pos: {:?}", pose.position);
//!         }
//!     }
//!     for n in notifications.try_iter() {
//!         if let Notification::SlamReset = n {
//!             println!("map cleared");
//!         }
//!     }
//! #   break;
//! }
//! ```

pub mod error;
pub mod types;
pub mod cursor;
pub mod plane;
pub mod pose;
pub mod protocol;
pub mod config;
pub mod native;
pub mod mock;
pub mod session;
#[cfg(feature = "sys")]
pub mod sys;
pub mod ffi;

pub use config::SessionConfig;
pub use error::{FieldKind, XslamError};
pub use native::{NativeTracker, PlaneRead};
pub use plane::decode as decode_planes;
pub use session::{DeviceSession, SharedSession};
pub use types::*;

/// Result type alias for xslam operations.
pub type Result<T> = std::result::Result<T, XslamError>;
