//! Fixed-layout binary codec.
//!
//! [`WireWriter`] appends values to a growing buffer; [`WireReader`] is a
//! cursor over a borrowed byte slice that consumes exactly as many bytes as
//! each value needs. Layout rules:
//!
//! - integers and floats are fixed width, little-endian
//! - vectors are their component floats back to back, no padding
//! - strings are `[i32 length][bytes]`, ASCII only, no terminator, at most
//!   [`MAX_TEXT_LEN`] bytes
//! - Groups nest at most [`MAX_GROUP_DEPTH`] deep
//!
//! Every read checks the remaining length first. `bytes::Buf` getters panic
//! on a short buffer, so they are only called after [`WireReader::need`].

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{ProtocolError, Quat, Vec2, Vec3};

/// Size of the leading message tag.
pub const TAG_SIZE: usize = 2;
/// Size of a string or group count prefix.
pub const LEN_SIZE: usize = 4;
pub const VEC2_SIZE: usize = 8;
pub const VEC3_SIZE: usize = 12;
pub const QUAT_SIZE: usize = 16;

/// Longest string (username, chat line) accepted in either direction.
pub const MAX_TEXT_LEN: usize = 256;

/// Deepest Group nesting accepted in either direction. A lone Group is
/// depth 1.
pub const MAX_GROUP_DEPTH: usize = 8;

/// Encoded size of a string: its length prefix plus one byte per character.
pub fn string_size(s: &str) -> usize {
    LEN_SIZE + s.len()
}

// ---------------------------------------------------------------------------
// WireWriter
// ---------------------------------------------------------------------------

/// Append-only encode buffer.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
    group_depth: usize,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preallocates `capacity` bytes. Messages pass their computed size so
    /// encoding never reallocates.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            group_depth: 0,
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.put_u16_le(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32_le(value);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.put_f32_le(value);
    }

    pub fn write_vec2(&mut self, v: Vec2) {
        self.write_f32(v.x);
        self.write_f32(v.y);
    }

    pub fn write_vec3(&mut self, v: Vec3) {
        self.write_f32(v.x);
        self.write_f32(v.y);
        self.write_f32(v.z);
    }

    pub fn write_quat(&mut self, q: Quat) {
        self.write_f32(q.x);
        self.write_f32(q.y);
        self.write_f32(q.z);
        self.write_f32(q.w);
    }

    /// Writes `[i32 length][bytes]`.
    ///
    /// # Errors
    /// [`ProtocolError::NonAscii`] if any character needs more than one
    /// byte, [`ProtocolError::TextTooLong`] past [`MAX_TEXT_LEN`]. Nothing
    /// is written in either case.
    pub fn write_str(&mut self, s: &str) -> Result<(), ProtocolError> {
        if !s.is_ascii() {
            return Err(ProtocolError::NonAscii(s.to_string()));
        }
        check_text_len(s.len())?;
        // MAX_TEXT_LEN fits in an i32.
        self.write_i32(s.len() as i32);
        self.buf.put_slice(s.as_bytes());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Called by a Group before writing its members.
    pub fn enter_group(&mut self) -> Result<(), ProtocolError> {
        self.group_depth = enter_group(self.group_depth)?;
        Ok(())
    }

    pub fn leave_group(&mut self) {
        self.group_depth = self.group_depth.saturating_sub(1);
    }

    /// Finishes encoding and hands back an immutable, cheaply clonable
    /// buffer.
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

// ---------------------------------------------------------------------------
// WireReader
// ---------------------------------------------------------------------------

/// Decode cursor over a borrowed datagram.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    group_depth: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, group_depth: 0 }
    }

    /// Called by a Group before reading its members. Fails past
    /// [`MAX_GROUP_DEPTH`] so nesting cannot grow the decode stack without
    /// bound.
    pub fn enter_group(&mut self) -> Result<(), ProtocolError> {
        self.group_depth = enter_group(self.group_depth)?;
        Ok(())
    }

    pub fn leave_group(&mut self) {
        self.group_depth = self.group_depth.saturating_sub(1);
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Fails with [`ProtocolError::Truncated`] unless `needed` bytes remain.
    pub fn need(&self, needed: usize) -> Result<(), ProtocolError> {
        if self.buf.len() < needed {
            return Err(ProtocolError::Truncated {
                needed,
                remaining: self.buf.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        self.need(2)?;
        Ok(self.buf.get_u16_le())
    }

    /// Reads the next `u16` without consuming it. Used to look at a tag
    /// before deciding which message type decodes the frame.
    pub fn peek_u16(&self) -> Result<u16, ProtocolError> {
        self.need(2)?;
        Ok(u16::from_le_bytes([self.buf[0], self.buf[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        self.need(4)?;
        Ok(self.buf.get_u32_le())
    }

    pub fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        self.need(4)?;
        Ok(self.buf.get_i32_le())
    }

    pub fn read_f32(&mut self) -> Result<f32, ProtocolError> {
        self.need(4)?;
        Ok(self.buf.get_f32_le())
    }

    pub fn read_vec2(&mut self) -> Result<Vec2, ProtocolError> {
        self.need(VEC2_SIZE)?;
        Ok(Vec2::new(self.buf.get_f32_le(), self.buf.get_f32_le()))
    }

    pub fn read_vec3(&mut self) -> Result<Vec3, ProtocolError> {
        self.need(VEC3_SIZE)?;
        Ok(Vec3::new(
            self.buf.get_f32_le(),
            self.buf.get_f32_le(),
            self.buf.get_f32_le(),
        ))
    }

    pub fn read_quat(&mut self) -> Result<Quat, ProtocolError> {
        self.need(QUAT_SIZE)?;
        Ok(Quat::new(
            self.buf.get_f32_le(),
            self.buf.get_f32_le(),
            self.buf.get_f32_le(),
            self.buf.get_f32_le(),
        ))
    }

    /// Reads `[i32 length][bytes]` as ASCII text.
    pub fn read_string(&mut self) -> Result<String, ProtocolError> {
        let len = self.read_i32()?;
        let len = usize::try_from(len).map_err(|_| ProtocolError::NegativeLength(len))?;
        check_text_len(len)?;
        self.need(len)?;
        let (text, rest) = self.buf.split_at(len);
        if !text.is_ascii() {
            return Err(ProtocolError::NonAscii(
                String::from_utf8_lossy(text).into_owned(),
            ));
        }
        self.buf = rest;
        // ASCII is always valid UTF-8.
        Ok(text.iter().map(|&b| b as char).collect())
    }
}

fn check_text_len(len: usize) -> Result<(), ProtocolError> {
    if len > MAX_TEXT_LEN {
        return Err(ProtocolError::TextTooLong {
            len,
            max: MAX_TEXT_LEN,
        });
    }
    Ok(())
}

fn enter_group(depth: usize) -> Result<usize, ProtocolError> {
    if depth >= MAX_GROUP_DEPTH {
        return Err(ProtocolError::NestingTooDeep(MAX_GROUP_DEPTH));
    }
    Ok(depth + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars_are_little_endian_fixed_width() {
        let mut w = WireWriter::new();
        w.write_u16(0x0102);
        w.write_u32(0x0A0B0C0D);
        w.write_u8(0xFF);
        let bytes = w.freeze();
        assert_eq!(&bytes[..], &[0x02, 0x01, 0x0D, 0x0C, 0x0B, 0x0A, 0xFF]);
    }

    #[test]
    fn test_vectors_have_no_padding() {
        let mut w = WireWriter::new();
        w.write_vec2(Vec2::new(1.0, 2.0));
        w.write_vec3(Vec3::new(1.0, 2.0, 3.0));
        w.write_quat(Quat::IDENTITY);
        assert_eq!(w.len(), VEC2_SIZE + VEC3_SIZE + QUAT_SIZE);

        let bytes = w.freeze();
        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_vec2().unwrap(), Vec2::new(1.0, 2.0));
        assert_eq!(r.read_vec3().unwrap(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(r.read_quat().unwrap(), Quat::IDENTITY);
        assert!(r.is_empty());
    }

    #[test]
    fn test_string_is_length_prefixed_without_terminator() {
        let mut w = WireWriter::new();
        w.write_str("hey").unwrap();
        let bytes = w.freeze();
        assert_eq!(&bytes[..], &[3, 0, 0, 0, b'h', b'e', b'y']);
        assert_eq!(string_size("hey"), bytes.len());

        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_string().unwrap(), "hey");
        assert!(r.is_empty());
    }

    #[test]
    fn test_non_ascii_string_is_rejected_on_write() {
        let mut w = WireWriter::new();
        let err = w.write_str("héllo").unwrap_err();
        assert!(matches!(err, ProtocolError::NonAscii(_)));
        assert!(w.is_empty(), "nothing written on failure");
    }

    #[test]
    fn test_text_length_is_capped_both_ways() {
        let mut w = WireWriter::new();
        w.write_str(&"a".repeat(MAX_TEXT_LEN)).unwrap();
        let err = w.write_str(&"a".repeat(MAX_TEXT_LEN + 1)).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::TextTooLong {
                len: MAX_TEXT_LEN + 1,
                max: MAX_TEXT_LEN
            }
        );
        assert_eq!(w.len(), LEN_SIZE + MAX_TEXT_LEN, "nothing written on failure");

        // A hostile length prefix is refused before the bytes are looked at.
        let data = [0x00, 0x10, 0x00, 0x00, b'a'];
        let mut r = WireReader::new(&data);
        assert!(matches!(r.read_string(), Err(ProtocolError::TextTooLong { len: 4096, .. })));
    }

    #[test]
    fn test_group_depth_is_bounded() {
        let mut r = WireReader::new(&[]);
        for _ in 0..MAX_GROUP_DEPTH {
            r.enter_group().unwrap();
        }
        assert_eq!(
            r.enter_group(),
            Err(ProtocolError::NestingTooDeep(MAX_GROUP_DEPTH))
        );
        r.leave_group();
        assert!(r.enter_group().is_ok());
    }

    #[test]
    fn test_non_ascii_bytes_are_rejected_on_read() {
        let data = [2, 0, 0, 0, 0xC3, 0xA9];
        let mut r = WireReader::new(&data);
        assert!(matches!(r.read_string(), Err(ProtocolError::NonAscii(_))));
    }

    #[test]
    fn test_truncated_read_fails_instead_of_zero_filling() {
        let data = [1, 2, 3];
        let mut r = WireReader::new(&data);
        assert_eq!(
            r.read_u32(),
            Err(ProtocolError::Truncated { needed: 4, remaining: 3 })
        );
        // Nothing consumed by the failed read.
        assert_eq!(r.remaining(), 3);
    }

    #[test]
    fn test_string_longer_than_buffer_is_truncated() {
        let data = [10, 0, 0, 0, b'a', b'b'];
        let mut r = WireReader::new(&data);
        assert_eq!(
            r.read_string(),
            Err(ProtocolError::Truncated { needed: 10, remaining: 2 })
        );
    }

    #[test]
    fn test_negative_string_length_is_rejected() {
        let mut w = WireWriter::new();
        w.write_i32(-1);
        let bytes = w.freeze();
        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_string(), Err(ProtocolError::NegativeLength(-1)));
    }

    #[test]
    fn test_peek_does_not_advance() {
        let data = [7, 0, 9];
        let mut r = WireReader::new(&data);
        assert_eq!(r.peek_u16().unwrap(), 7);
        assert_eq!(r.read_u16().unwrap(), 7);
        assert_eq!(r.read_u8().unwrap(), 9);
    }
}
