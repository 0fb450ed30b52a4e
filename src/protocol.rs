use crate::types::{CameraModel, MapSaveStatus};
use crate::XslamError;

// -- Event codes returned by the tracker's event queue --
pub const EVENT_MAP_SAVED: i32 = 1;
pub const EVENT_MAP_SAVE_FAILED: i32 = 2;
pub const EVENT_MAP_SWITCHED: i32 = 3;
pub const EVENT_LOCALIZED: i32 = 4;
pub const EVENT_PLANES_UPDATED: i32 = 5;

// -- Map save status codes --
pub const SAVE_STATUS_SAVED: i32 = 0;
pub const SAVE_STATUS_ERROR: i32 = 1;
pub const SAVE_STATUS_PROGRESS: i32 = 2;
pub const SAVE_STATUS_NOT_LOADED: i32 = 3;

// -- Camera model capability codes --
pub const CAMERA_XR50: i32 = 1;
pub const CAMERA_DS80: i32 = 2;
pub const CAMERA_DS60: i32 = 3;
pub const CAMERA_XR50_MIRRORED: i32 = 4;

/// Closed set of events the tracker may queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCode {
    MapSaved,
    MapSaveFailed,
    MapSwitched,
    Localized,
    PlanesUpdated,
}

impl TryFrom<i32> for EventCode {
    type Error = XslamError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            EVENT_MAP_SAVED => Ok(EventCode::MapSaved),
            EVENT_MAP_SAVE_FAILED => Ok(EventCode::MapSaveFailed),
            EVENT_MAP_SWITCHED => Ok(EventCode::MapSwitched),
            EVENT_LOCALIZED => Ok(EventCode::Localized),
            EVENT_PLANES_UPDATED => Ok(EventCode::PlanesUpdated),
            other => Err(XslamError::ProtocolDesync(other)),
        }
    }
}

/// Interpret a save status code. Unrecognised codes are reported as errors.
pub fn parse_save_status(code: i32) -> MapSaveStatus {
    match code {
        SAVE_STATUS_SAVED => MapSaveStatus::Saved,
        SAVE_STATUS_PROGRESS => MapSaveStatus::Progress,
        SAVE_STATUS_NOT_LOADED => MapSaveStatus::NotLoaded,
        SAVE_STATUS_ERROR => MapSaveStatus::Error,
        other => {
            log::warn!("Unknown map save status {}, treating as error", other);
            MapSaveStatus::Error
        }
    }
}

/// Interpret the camera model capability code. Anything unrecognised uses the baseline profile.
pub fn parse_camera_model(code: i32) -> CameraModel {
    match code {
        CAMERA_XR50 => CameraModel::Xr50,
        CAMERA_DS80 => CameraModel::Ds80,
        CAMERA_DS60 => CameraModel::Ds60,
        CAMERA_XR50_MIRRORED => CameraModel::Xr50Mirrored,
        _ => CameraModel::Unknown,
    }
}
