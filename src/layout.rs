//! Translation between physical buffers and the virtual slots of a call.
//!
//! A call reduces `count` logical units, each a block of `stride` raw
//! elements. Unit `k` of the call is *virtual slot* `k`; every process that
//! supplies a value for slot `k` is folded into the same output unit.
//!
//! Without maps, slot `k` is read from (and written to) local unit `k`.
//! A send map redirects the read: slot `k` comes from local unit
//! `send_map[k]`, or from nowhere if the entry is unmapped. A receive map
//! redirects the write on the root: slot `k` lands in local unit
//! `recv_map[k]`, and is dropped if the entry is unmapped or past the end
//! of the map.

use crate::element::Element;
use crate::error::{Result, TreefoldError};
use crate::reduce::{Operator, combine_into};

/// Explicit sequence of local unit indices, one entry per virtual slot.
///
/// Unmapped entries are `None`; [`IndexMap::from_signed`] turns negative
/// sentinels (conventionally `-1`) into unmapped entries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexMap {
    entries: Vec<Option<usize>>,
}

impl IndexMap {
    /// Map where every entry is mapped.
    pub fn new(indices: Vec<usize>) -> Self {
        Self {
            entries: indices.into_iter().map(Some).collect(),
        }
    }

    /// Map from signed indices; negative values mark unmapped slots.
    pub fn from_signed<T>(indices: &[T]) -> Self
    where
        T: Copy + TryInto<usize>,
    {
        Self {
            entries: indices.iter().map(|&i| i.try_into().ok()).collect(),
        }
    }

    /// Map with explicit unmapped entries.
    pub fn from_entries(entries: Vec<Option<usize>>) -> Self {
        Self { entries }
    }

    /// Local unit for virtual slot `slot`, if mapped.
    #[inline]
    pub fn get(&self, slot: usize) -> Option<usize> {
        self.entries.get(slot).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Largest local unit referenced by the first `slots` entries.
    pub fn max_target(&self, slots: usize) -> Option<usize> {
        self.entries.iter().take(slots).flatten().copied().max()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<usize>> + '_ {
        self.entries.iter().copied()
    }
}

impl From<Vec<usize>> for IndexMap {
    fn from(indices: Vec<usize>) -> Self {
        Self::new(indices)
    }
}

impl From<Vec<i32>> for IndexMap {
    fn from(indices: Vec<i32>) -> Self {
        Self::from_signed(&indices)
    }
}

impl From<&[i32]> for IndexMap {
    fn from(indices: &[i32]) -> Self {
        Self::from_signed(indices)
    }
}

impl FromIterator<usize> for IndexMap {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(Some).collect(),
        }
    }
}

/// Shape of one reduction call: unit count, stride and optional maps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    count: usize,
    stride: usize,
    send_map: Option<IndexMap>,
    recv_map: Option<IndexMap>,
}

impl Layout {
    /// `count` contiguous units of one element each.
    pub fn dense(count: usize) -> Self {
        Self {
            count,
            stride: 1,
            send_map: None,
            recv_map: None,
        }
    }

    /// `count` units of `stride` elements each.
    pub fn strided(count: usize, stride: usize) -> Self {
        Self::dense(count).with_stride(stride)
    }

    /// `count` virtual slots read through `send_map` and written through `recv_map`.
    pub fn mapped(
        count: usize,
        send_map: impl Into<IndexMap>,
        recv_map: impl Into<IndexMap>,
    ) -> Self {
        Self::dense(count)
            .with_send_map(send_map)
            .with_recv_map(recv_map)
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_send_map(mut self, map: impl Into<IndexMap>) -> Self {
        self.send_map = Some(map.into());
        self
    }

    pub fn with_recv_map(mut self, map: impl Into<IndexMap>) -> Self {
        self.recv_map = Some(map.into());
        self
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn send_map(&self) -> Option<&IndexMap> {
        self.send_map.as_ref()
    }

    pub fn recv_map(&self) -> Option<&IndexMap> {
        self.recv_map.as_ref()
    }

    /// Check the layout on its own, before any buffer is looked at.
    pub fn validate(&self) -> Result<()> {
        if self.stride == 0 {
            return Err(TreefoldError::invalid("stride must be at least 1"));
        }
        if let Some(map) = &self.send_map
            && map.len() < self.count
        {
            return Err(TreefoldError::invalid(format!(
                "send map has {} entries but count is {}",
                map.len(),
                self.count
            )));
        }
        if self.count.checked_mul(self.stride).is_none() {
            return Err(TreefoldError::invalid(format!(
                "count {} with stride {} overflows the address space",
                self.count, self.stride
            )));
        }
        // Send entries past `count` are never read; receive entries may serve
        // slots folded from other processes.
        let send_top = self.send_map.as_ref().and_then(|m| m.max_target(self.count));
        let recv_top = self.recv_map.as_ref().and_then(|m| m.max_target(m.len()));
        for (name, top) in [("send", send_top), ("recv", recv_top)] {
            if let Some(top) = top {
                self.unit_end(top).map_err(|_| {
                    TreefoldError::invalid(format!(
                        "{name} map target {top} with stride {} overflows the address space",
                        self.stride
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Element offset one past local unit `unit`.
    fn unit_end(&self, unit: usize) -> Result<usize> {
        unit.checked_add(1)
            .and_then(|n| n.checked_mul(self.stride))
            .ok_or_else(|| {
                TreefoldError::invalid(format!(
                    "unit {unit} with stride {} overflows the address space",
                    self.stride
                ))
            })
    }

    /// Raw elements the send buffer must hold.
    pub fn required_send_len(&self) -> Result<usize> {
        let last = match &self.send_map {
            Some(map) => map.max_target(self.count),
            None => self.count.checked_sub(1),
        };
        last.map_or(Ok(0), |m| self.unit_end(m))
    }

    /// Local unit that receives virtual slot `slot`.
    #[inline]
    fn recv_target(&self, slot: usize) -> Option<usize> {
        match &self.recv_map {
            Some(map) => map.get(slot),
            None => Some(slot),
        }
    }

    /// Output extent in units for the root, given the slots folded from
    /// every process.
    ///
    /// Covers the targets of this call's own `count` slots plus every
    /// folded slot that has a receive entry.
    pub fn output_units(&self, folded_slots: &[u64]) -> Result<usize> {
        let own = (0..self.count).filter_map(|k| self.recv_target(k));
        let folded = folded_slots
            .iter()
            .filter_map(|&k| usize::try_from(k).ok())
            .filter_map(|k| self.recv_target(k));
        match own.chain(folded).max() {
            None => Ok(0),
            Some(m) => m
                .checked_add(1)
                .ok_or_else(|| TreefoldError::invalid(format!("output unit {m} is out of range"))),
        }
    }

    /// Output extent in raw elements for the root.
    pub fn output_len(&self, folded_slots: &[u64]) -> Result<usize> {
        match self.output_units(folded_slots)? {
            0 => Ok(0),
            units => self.unit_end(units - 1),
        }
    }

    /// Output extent in raw elements derived from the local call alone.
    pub fn local_output_len(&self) -> Result<usize> {
        self.output_len(&[])
    }

    /// Collect this process's contribution, keyed by virtual slot.
    pub fn gather<E: Element>(&self, send: &[E]) -> Result<Partial<E>> {
        let required = self.required_send_len()?;
        if send.len() < required {
            return Err(TreefoldError::SizeMismatch {
                expected: required,
                actual: send.len(),
            });
        }

        let stride = self.stride;
        let mut partial = Partial::with_capacity(stride, self.count);
        for k in 0..self.count {
            let local = match &self.send_map {
                Some(map) => map.get(k),
                None => Some(k),
            };
            if let Some(p) = local {
                partial.push(k as u64, &send[p * stride..(p + 1) * stride]);
            }
        }
        Ok(partial)
    }

    /// Write folded units into `out` at their receive positions.
    ///
    /// Positions without a folded slot keep their previous contents.
    pub fn scatter<E: Element>(&self, partial: &Partial<E>, out: &mut [E]) -> Result<()> {
        let stride = self.stride;
        let required = self.output_len(partial.slots())?;
        if out.len() < required {
            return Err(TreefoldError::SizeMismatch {
                expected: required,
                actual: out.len(),
            });
        }
        for (slot, unit) in partial.iter() {
            let target = usize::try_from(slot)
                .ok()
                .and_then(|k| self.recv_target(k));
            if let Some(t) = target {
                out[t * stride..(t + 1) * stride].copy_from_slice(unit);
            }
        }
        Ok(())
    }
}

/// Units held for a sorted set of virtual slots.
///
/// This is what travels up the reduction tree: each process starts with its
/// own contribution and folds in the partials of its children.
#[derive(Debug, Clone, PartialEq)]
pub struct Partial<E> {
    stride: usize,
    slots: Vec<u64>,
    units: Vec<E>,
}

impl<E: Element> Partial<E> {
    pub fn new(stride: usize) -> Self {
        Self::with_capacity(stride, 0)
    }

    pub(crate) fn with_capacity(stride: usize, slots: usize) -> Self {
        Self {
            stride,
            slots: Vec::with_capacity(slots),
            units: Vec::with_capacity(slots * stride),
        }
    }

    /// Rebuild from decoded wire data.
    pub(crate) fn from_parts(stride: usize, slots: Vec<u64>, units: Vec<E>) -> Result<Self> {
        if units.len() != slots.len() * stride {
            return Err(TreefoldError::SizeMismatch {
                expected: slots.len() * stride,
                actual: units.len(),
            });
        }
        if slots.windows(2).any(|w| w[0] >= w[1]) {
            return Err(TreefoldError::DecodeFailed(
                "partial slots are not strictly increasing".into(),
            ));
        }
        Ok(Self {
            stride,
            slots,
            units,
        })
    }

    /// Append a unit for a slot greater than every slot already held.
    pub fn push(&mut self, slot: u64, unit: &[E]) {
        debug_assert_eq!(unit.len(), self.stride);
        debug_assert!(self.slots.last().is_none_or(|&last| last < slot));
        self.slots.push(slot);
        self.units.extend_from_slice(unit);
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn slots(&self) -> &[u64] {
        &self.slots
    }

    pub fn units(&self) -> &[E] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Unit held for `slot`, if any.
    pub fn get(&self, slot: u64) -> Option<&[E]> {
        let i = self.slots.binary_search(&slot).ok()?;
        Some(&self.units[i * self.stride..(i + 1) * self.stride])
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &[E])> + '_ {
        self.slots
            .iter()
            .copied()
            .zip(self.units.chunks_exact(self.stride.max(1)))
    }

    /// Fold `other` into `self`: shared slots are combined with `op`,
    /// the rest are carried over.
    pub fn merge<O: Operator<E> + ?Sized>(self, other: Partial<E>, op: &O) -> Result<Self> {
        if self.stride != other.stride {
            return Err(TreefoldError::SizeMismatch {
                expected: self.stride,
                actual: other.stride,
            });
        }
        if other.is_empty() {
            return Ok(self);
        }
        if self.is_empty() {
            return Ok(other);
        }

        let stride = self.stride;
        let mut out = Partial::with_capacity(stride, self.len() + other.len());
        let (mut i, mut j) = (0, 0);
        while i < self.len() && j < other.len() {
            let (a, b) = (self.slots[i], other.slots[j]);
            let ua = &self.units[i * stride..(i + 1) * stride];
            let ub = &other.units[j * stride..(j + 1) * stride];
            if a < b {
                out.push(a, ua);
                i += 1;
            } else if b < a {
                out.push(b, ub);
                j += 1;
            } else {
                out.push(a, ua);
                let at = out.units.len() - stride;
                combine_into(&mut out.units[at..], ub, op);
                i += 1;
                j += 1;
            }
        }
        for k in i..self.len() {
            out.push(self.slots[k], &self.units[k * stride..(k + 1) * stride]);
        }
        for k in j..other.len() {
            out.push(other.slots[k], &other.units[k * stride..(k + 1) * stride]);
        }
        Ok(out)
    }
}
