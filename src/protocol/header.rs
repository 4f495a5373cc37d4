use crate::error::{Result, TreefoldError};
use crate::types::PROTOCOL_VERSION;

/// Bytes in front of every frame's rkyv payload.
pub const HEADER_SIZE: usize = 8;

/// What the payload behind a header holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// A partial result sent one edge up the reduction tree.
    Partial = 0,
}

impl TryFrom<u8> for FrameKind {
    type Error = TreefoldError;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(FrameKind::Partial),
            other => Err(TreefoldError::DecodeFailed(format!(
                "unknown frame kind {other}"
            ))),
        }
    }
}

/// Fixed prefix of a tree-edge frame.
///
/// Byte 0..4 is the payload length (u32 LE), byte 4 the sender's protocol
/// version, byte 5 the [`FrameKind`]. Bytes 6 and 7 are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub payload_len: u32,
    pub version: u8,
    pub kind: FrameKind,
}

impl Header {
    /// Header for a partial result of `payload_len` bytes from this build.
    pub fn partial(payload_len: u32) -> Self {
        Self {
            payload_len,
            version: PROTOCOL_VERSION,
            kind: FrameKind::Partial,
        }
    }

    pub fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let len = self.payload_len.to_le_bytes();
        [len[0], len[1], len[2], len[3], self.version, self.kind as u8, 0, 0]
    }

    /// Read a header off the front of `buf`.
    ///
    /// The version is returned as sent; the caller decides whether it can
    /// read that payload.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let Some(&[a, b, c, d, version, kind, r0, r1]) = buf.first_chunk::<HEADER_SIZE>() else {
            return Err(TreefoldError::DecodeFailed(format!(
                "buffer too short: {} < {HEADER_SIZE}",
                buf.len()
            )));
        };
        if (r0, r1) != (0, 0) {
            return Err(TreefoldError::DecodeFailed(
                "reserved header bytes are set".into(),
            ));
        }
        Ok(Self {
            payload_len: u32::from_le_bytes([a, b, c, d]),
            version,
            kind: FrameKind::try_from(kind)?,
        })
    }
}
