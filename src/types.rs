/// Three-component vector `[x, y, z]`.
pub type Vec3 = [f64; 3];

/// 6DOF pose as reported by the tracker or after conversion to the host frame.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Position in meters [x, y, z].
    pub position: Vec3,
    /// Unit quaternion [qx, qy, qz, qw].
    pub orientation: [f64; 4],
    /// Tracking confidence as reported by the device.
    pub confidence: f64,
    /// Device timestamp in microseconds.
    pub timestamp_us: u64,
}

impl Pose {
    /// True when position and orientation match `other` bit for bit.
    pub fn same_placement(&self, other: &Pose) -> bool {
        self.position
            .iter()
            .chain(self.orientation.iter())
            .zip(other.position.iter().chain(other.orientation.iter()))
            .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

/// One detected planar surface.
///
/// Planes carry no identity across decode calls; consumers match them frame to
/// frame by `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub id: String,
    pub normal: Vec3,
    /// Offset of the plane equation `normal · x = d`.
    pub d: f64,
    /// Polygon outline, possibly empty.
    pub border_points: Vec<Vec3>,
    pub vertices: Vec<Vec3>,
    /// Vertex index triples into `vertices`.
    pub triangles: Vec<[u32; 3]>,
}

/// Lifecycle of a [`crate::session::DeviceSession`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized = 0,
    Initializing = 1,
    Ready = 2,
    MappingActive = 3,
    Stopped = 4,
}

/// Camera model reported by the tracker's capability query.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraModel {
    /// Unresolved or unrecognised model; uses the baseline profile.
    Unknown = 0,
    /// SeerSense XR50 headset module.
    Xr50 = 1,
    /// DS80 stereo module, mounted upside down in its housing.
    Ds80 = 2,
    /// DS60 rear-facing module.
    Ds60 = 3,
    /// XR50 variant with the stereo pair mounted facing the user.
    Xr50Mirrored = 4,
}

bitflags::bitflags! {
    /// Axis corrections applied to a pose's Euler decomposition.
    ///
    /// Always applied in declaration order: the negations first, then the
    /// half-turn offsets.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AxisCorrection: u8 {
        const NEGATE_X = 1 << 0;
        const NEGATE_Y = 1 << 1;
        const NEGATE_Z = 1 << 2;
        const ADD_180_X = 1 << 3;
        const ADD_180_Y = 1 << 4;
        const ADD_180_Z = 1 << 5;
    }
}

/// Map persistence status reported with map save events.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapSaveStatus {
    Saved = 0,
    Error = 1,
    Progress = 2,
    NotLoaded = 3,
}

/// Notifications delivered to session subscribers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Notification {
    /// Device localized against the active map; `visibility` is the fraction of the map in view.
    Localized { visibility: f32 },
    /// Tracker switched to constrained (C-SLAM) mode on a loaded map.
    CslamSwitched { map_quality: i32 },
    MapSaveStatusChanged {
        status: MapSaveStatus,
        map_quality: i32,
    },
    SlamReset,
}
