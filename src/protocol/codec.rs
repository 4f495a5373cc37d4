use crate::element::{Element, decode_slice, encode_slice};
use crate::error::{Result, TreefoldError};
use crate::layout::Partial;
use crate::protocol::header::{HEADER_SIZE, Header};
use crate::protocol::message::ReduceFrame;
use crate::types::{PROTOCOL_VERSION, Rank};

/// Encode a `ReduceFrame` into a framed byte buffer: `[header][rkyv payload]`.
pub fn encode_frame(frame: &ReduceFrame) -> Result<Vec<u8>> {
    let payload = rkyv::to_bytes::<rkyv::rancor::Error>(frame)
        .map_err(|e| TreefoldError::EncodeFailed(e.to_string()))?;

    if payload.len() > u32::MAX as usize {
        return Err(TreefoldError::EncodeFailed(format!(
            "payload too large for framed header: {} bytes exceeds u32::MAX",
            payload.len()
        )));
    }

    let header = Header::partial(payload.len() as u32);

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.to_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decode a framed byte buffer back into a `(Header, ReduceFrame)`.
pub fn decode_frame(buf: &[u8]) -> Result<(Header, ReduceFrame)> {
    let header = Header::parse(buf)?;

    if header.version != PROTOCOL_VERSION {
        return Err(TreefoldError::ProtocolMismatch {
            local: PROTOCOL_VERSION,
            remote: header.version,
        });
    }

    let payload_end = HEADER_SIZE + header.payload_len as usize;
    if buf.len() < payload_end {
        return Err(TreefoldError::DecodeFailed(format!(
            "buffer too short for payload: {} < {payload_end}",
            buf.len()
        )));
    }

    // The archive is read in place, so it needs the alignment rkyv wrote it with.
    let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(header.payload_len as usize);
    aligned.extend_from_slice(&buf[HEADER_SIZE..payload_end]);
    let frame = rkyv::from_bytes::<ReduceFrame, rkyv::rancor::Error>(&aligned)
        .map_err(|e| TreefoldError::DecodeFailed(e.to_string()))?;

    Ok((header, frame))
}

/// Wrap a partial result for the wire.
pub(crate) fn encode_partial<E: Element>(partial: &Partial<E>, root: Rank) -> Result<Vec<u8>> {
    encode_frame(&ReduceFrame {
        root,
        stride: partial.stride() as u64,
        elem_size: E::SIZE as u32,
        slots: partial.slots().to_vec(),
        payload: encode_slice(partial.units()),
    })
}

/// Rebuild a partial result from a decoded frame.
pub(crate) fn frame_to_partial<E: Element>(frame: ReduceFrame) -> Result<Partial<E>> {
    if frame.elem_size as usize != E::SIZE {
        return Err(TreefoldError::SizeMismatch {
            expected: E::SIZE,
            actual: frame.elem_size as usize,
        });
    }
    let stride = frame.stride as usize;
    let units = decode_slice::<E>(&frame.payload, frame.slots.len() * stride)?;
    Partial::from_parts(stride, frame.slots, units)
}
