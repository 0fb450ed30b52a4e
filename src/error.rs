use std::fmt;

use crate::types::SessionState;

/// Primitive kind a [`crate::cursor::BinaryCursor`] was reading when it ran out of bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int32,
    UInt32,
    Double,
    Utf8,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Int32 => "int32",
            FieldKind::UInt32 => "uint32",
            FieldKind::Double => "double",
            FieldKind::Utf8 => "utf8 string",
        };
        f.write_str(name)
    }
}

/// Errors produced by the decoder and the device session.
#[derive(Debug, thiserror::Error)]
pub enum XslamError {
    #[error("Buffer underrun reading {field} at offset {offset}")]
    BufferUnderrun { field: FieldKind, offset: usize },

    #[error("Native call failed: {0}")]
    NativeCallFailed(&'static str),

    #[error("Unknown event code {0} from tracker, event stream desynchronized")]
    ProtocolDesync(i32),

    #[error("Pose unchanged beyond staleness window")]
    PoseStale,

    #[error("{op} not allowed in state {state:?}")]
    InvalidState {
        op: &'static str,
        state: SessionState,
    },

    #[error("Native plane buffer of {0} bytes exceeds configured maximum")]
    PlaneBufferTooLarge(usize),

    #[error("Initialize worker exited without reporting")]
    InitInterrupted,
}

/// Thread-safe last-error storage for the C FFI layer.
pub(crate) struct LastError {
    message: std::sync::Mutex<String>,
}

impl LastError {
    pub const fn new() -> Self {
        Self {
            message: std::sync::Mutex::new(String::new()),
        }
    }

    pub fn set(&self, err: &XslamError) {
        if let Ok(mut msg) = self.message.lock() {
            *msg = fmt::format(format_args!("{}\0", err));
        }
    }

    pub fn as_ptr(&self) -> *const std::ffi::c_char {
        match self.message.lock() {
            Ok(msg) if !msg.is_empty() => msg.as_ptr() as *const std::ffi::c_char,
            _ => std::ptr::null(),
        }
    }
}
