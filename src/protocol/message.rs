use crate::types::Rank;

/// A partial reduction result travelling one edge of the tree.
///
/// The sender's view of the call (`root`, `stride`, `elem_size`) rides
/// along so the receiver can detect a group that disagrees about it.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, PartialEq)]
pub struct ReduceFrame {
    /// Root rank as seen by the sender.
    pub root: Rank,
    /// Raw elements per logical unit.
    pub stride: u64,
    /// Encoded size of one element.
    pub elem_size: u32,
    /// Virtual slots held, strictly increasing.
    pub slots: Vec<u64>,
    /// `slots.len() * stride` elements, little-endian, in slot order.
    pub payload: Vec<u8>,
}
