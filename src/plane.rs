//! Decoder for the plane-geometry buffers produced by the tracker.
//!
//! Buffer layout (all little-endian):
//! - `i32` plane count; zero or negative means no planes
//! - per plane:
//!   - `i32` border point count, then that many `3 x f64` points
//!   - `3 x f64` normal, `f64` offset `d`
//!   - `i32` id length, then that many UTF-8 bytes
//!   - `i32` vertex count, then that many `3 x f64` vertices
//!   - `i32` triangle count, then that many `3 x u32` index triples
//!
//! Producers without mesh data still write zero vertex and triangle counts.

use crate::cursor::BinaryCursor;
use crate::types::{Plane, Vec3};
use crate::Result;

const VEC3_SIZE: usize = 24;
const TRIANGLE_SIZE: usize = 12;

/// Decode every plane record in `buffer`.
///
/// Decoding is all-or-nothing: any short field fails the whole call with
/// [`crate::XslamError::BufferUnderrun`] and no planes are returned.
pub fn decode(buffer: &[u8]) -> Result<Vec<Plane>> {
    decode_with_consumed(buffer).map(|(planes, _)| planes)
}

/// Like [`decode`], also returning the number of bytes consumed.
pub fn decode_with_consumed(buffer: &[u8]) -> Result<(Vec<Plane>, usize)> {
    let mut cursor = BinaryCursor::new(buffer);
    let count = count_of(cursor.read_i32()?);

    // Each plane needs at least its fixed fields, so a hostile count cannot
    // reserve more than the buffer could possibly describe.
    let min_plane_size = 4 + VEC3_SIZE + 8 + 4 + 4 + 4;
    let mut planes = Vec::with_capacity(count.min(cursor.remaining() / min_plane_size));

    for _ in 0..count {
        planes.push(read_plane(&mut cursor)?);
    }

    let consumed = cursor.position();
    if !cursor.is_empty() {
        log::trace!(
            "Plane buffer has {} trailing bytes after {} planes",
            cursor.remaining(),
            planes.len()
        );
    }
    Ok((planes, consumed))
}

fn count_of(raw: i32) -> usize {
    usize::try_from(raw).unwrap_or(0)
}

fn read_points(cursor: &mut BinaryCursor<'_>) -> Result<Vec<Vec3>> {
    let count = count_of(cursor.read_i32()?);
    let mut points = Vec::with_capacity(count.min(cursor.remaining() / VEC3_SIZE));
    for _ in 0..count {
        points.push(cursor.read_vec3()?);
    }
    Ok(points)
}

fn read_triangles(cursor: &mut BinaryCursor<'_>) -> Result<Vec<[u32; 3]>> {
    let count = count_of(cursor.read_i32()?);
    let mut triangles = Vec::with_capacity(count.min(cursor.remaining() / TRIANGLE_SIZE));
    for _ in 0..count {
        triangles.push([cursor.read_u32()?, cursor.read_u32()?, cursor.read_u32()?]);
    }
    Ok(triangles)
}

fn read_plane(cursor: &mut BinaryCursor<'_>) -> Result<Plane> {
    let border_points = read_points(cursor)?;
    let normal = cursor.read_vec3()?;
    let d = cursor.read_f64()?;
    let id_len = cursor.read_i32()?;
    let id = cursor.read_utf8(id_len)?;
    let vertices = read_points(cursor)?;
    let triangles = read_triangles(cursor)?;

    Ok(Plane {
        id,
        normal,
        d,
        border_points,
        vertices,
        triangles,
    })
}

impl Plane {
    /// True when the plane carries a triangle mesh.
    pub fn has_mesh(&self) -> bool {
        !self.vertices.is_empty() && !self.triangles.is_empty()
    }

    /// Check that every triangle index refers to an existing vertex.
    ///
    /// Returns the position of the first offending triangle.
    pub fn validate_mesh(&self) -> std::result::Result<(), usize> {
        let len = self.vertices.len();
        match self
            .triangles
            .iter()
            .position(|tri| tri.iter().any(|&i| i as usize >= len))
        {
            Some(bad) => Err(bad),
            None => Ok(()),
        }
    }
}
