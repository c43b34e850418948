//! Low-level field readers and writers.
//!
//! Every integer is little-endian. Narrow strings are a u8 byte count followed
//! by UTF-8 bytes; wide strings are a u8 char count followed by UTF-32LE code
//! units (four bytes per char).

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};

/// Longest string either prefix can describe.
pub const MAX_STRING_LEN: usize = u8::MAX as usize;

/// Three-component float vector as carried on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    /// Create a vector from components.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean length.
    #[must_use]
    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f32 {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z).length()
    }
}

/// Cursor over a received datagram.
pub struct PacketReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Number of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    pub fn read_exact(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .ok_or_else(|| CodecError::truncated(len, self.offset, self.data.len()))?;

        let slice = self
            .data
            .get(self.offset..end)
            .ok_or_else(|| CodecError::truncated(len, self.offset, self.data.len()))?;
        self.offset = end;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let bytes = self.read_exact(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> CodecResult<u8> {
        Ok(u8::from_le_bytes(self.read_array::<1>()?))
    }

    pub fn read_bool(&mut self) -> CodecResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> CodecResult<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> CodecResult<i16> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> CodecResult<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> CodecResult<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> CodecResult<f32> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    pub fn read_vector3(&mut self) -> CodecResult<Vector3> {
        Ok(Vector3 {
            x: self.read_f32()?,
            y: self.read_f32()?,
            z: self.read_f32()?,
        })
    }

    pub fn read_string(&mut self) -> CodecResult<String> {
        let length = usize::from(self.read_u8()?);
        let raw = self.read_exact(length)?;
        String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }

    pub fn read_wide_string(&mut self) -> CodecResult<String> {
        let length = usize::from(self.read_u8()?);
        let mut value = String::with_capacity(length);
        for _ in 0..length {
            let code = self.read_u32()?;
            let ch = char::from_u32(code).ok_or(CodecError::InvalidChar(code))?;
            value.push(ch);
        }
        Ok(value)
    }

    /// Fail unless every byte has been consumed.
    pub fn finish(&self, kind: &'static str) -> CodecResult<()> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(CodecError::TrailingBytes { kind, remaining }),
        }
    }
}

/// Growable buffer for an outgoing datagram.
#[derive(Debug, Default)]
pub struct PacketWriter {
    buffer: Vec<u8>,
}

impl PacketWriter {
    pub fn with_tag(tag: u8) -> Self {
        let mut buffer = Vec::with_capacity(64);
        buffer.push(tag);
        Self { buffer }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buffer.push(u8::from(value));
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_vector3(&mut self, value: &Vector3) {
        self.write_f32(value.x);
        self.write_f32(value.y);
        self.write_f32(value.z);
    }

    pub fn write_string(&mut self, value: &str) -> CodecResult<()> {
        let bytes = value.as_bytes();
        let length = u8::try_from(bytes.len())
            .map_err(|_| CodecError::string_too_long(bytes.len(), MAX_STRING_LEN))?;
        self.buffer.push(length);
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    pub fn write_wide_string(&mut self, value: &str) -> CodecResult<()> {
        let count = value.chars().count();
        let length =
            u8::try_from(count).map_err(|_| CodecError::string_too_long(count, MAX_STRING_LEN))?;
        self.buffer.push(length);
        for ch in value.chars() {
            self.write_u32(u32::from(ch));
        }
        Ok(())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_wide_string_layout() -> TestResult {
        let mut writer = PacketWriter::with_tag(0);
        writer.write_wide_string("ab")?;
        let bytes = writer.into_bytes();
        assert_eq!(bytes, vec![0, 2, b'a', 0, 0, 0, b'b', 0, 0, 0]);
        Ok(())
    }

    #[test]
    fn test_wide_string_non_ascii_round_trip() -> TestResult {
        let mut writer = PacketWriter::default();
        writer.write_wide_string("Räikkönen 🏁")?;
        let bytes = writer.into_bytes();

        let mut reader = PacketReader::new(&bytes);
        assert_eq!(reader.read_wide_string()?, "Räikkönen 🏁");
        reader.finish("test")?;
        Ok(())
    }

    #[test]
    fn test_invalid_code_point_rejected() {
        let mut bytes = vec![1u8];
        bytes.extend_from_slice(&0xD800u32.to_le_bytes());
        let mut reader = PacketReader::new(&bytes);
        assert_eq!(
            reader.read_wide_string(),
            Err(CodecError::InvalidChar(0xD800))
        );
    }

    #[test]
    fn test_narrow_string_too_long() {
        let mut writer = PacketWriter::default();
        let long = "x".repeat(256);
        assert_eq!(
            writer.write_string(&long),
            Err(CodecError::string_too_long(256, MAX_STRING_LEN))
        );
    }

    #[test]
    fn test_truncated_read_reports_offset() {
        let bytes = [1u8, 2, 3];
        let mut reader = PacketReader::new(&bytes);
        assert!(matches!(reader.read_u16(), Ok(_)));
        assert_eq!(reader.read_u32(), Err(CodecError::truncated(4, 2, 3)));
    }

    #[test]
    fn test_vector_distance() {
        let a = Vector3::new(0.0, 0.0, 0.0);
        let b = Vector3::new(3.0, 4.0, 0.0);
        assert!((a.distance_to(&b) - 5.0).abs() < f32::EPSILON);
    }
}
