use crate::error::FieldKind;
use crate::types::Vec3;
use crate::{Result, XslamError};

/// Bounds-checked little-endian reader over an immutable byte slice.
///
/// Every read either consumes exactly the bytes it needs or fails with
/// [`XslamError::BufferUnderrun`] and leaves the offset untouched.
pub struct BinaryCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> BinaryCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Current read offset from the start of the buffer.
    pub fn position(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, len: usize, field: FieldKind) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(XslamError::BufferUnderrun {
                field,
                offset: self.offset,
            });
        }
        let bytes = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self, field: FieldKind) -> Result<[u8; N]> {
        let bytes = self.take(N, field)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.take_array(FieldKind::Int32).map(i32::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.take_array(FieldKind::UInt32).map(u32::from_le_bytes)
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.take_array(FieldKind::Double).map(f64::from_le_bytes)
    }

    /// Read three consecutive doubles as `[x, y, z]`.
    ///
    /// Checks the full 24 bytes up front so a short buffer never leaves the
    /// cursor between components.
    pub fn read_vec3(&mut self) -> Result<Vec3> {
        let bytes: [u8; 24] = self.take_array(FieldKind::Double)?;
        let component = |i: usize| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[i * 8..i * 8 + 8]);
            f64::from_le_bytes(raw)
        };
        Ok([component(0), component(1), component(2)])
    }

    /// Read exactly `byte_len` bytes as UTF-8.
    ///
    /// Malformed sequences are replaced with U+FFFD (`String::from_utf8_lossy`).
    /// A negative length is reported as an underrun of the string field.
    pub fn read_utf8(&mut self, byte_len: i32) -> Result<String> {
        let len = usize::try_from(byte_len).map_err(|_| XslamError::BufferUnderrun {
            field: FieldKind::Utf8,
            offset: self.offset,
        })?;
        let bytes = self.take(len, FieldKind::Utf8)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}
