//! Node slot framing (`NODE_IDS`) and the node record returned to callers.

use crate::engine::codec::properties::PropertyMap;
use crate::engine::storage::files::{read_u32_at, write_all_at};
use crate::engine::types::GraphError;
use byteorder::{BigEndian, WriteBytesExt};
use std::fs::File;

/// A fully decoded node: its id and property map.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: u32,
    pub props: PropertyMap,
}

/// The fixed 12-byte `NODE_IDS` slot: `addr · edge_from · edge_to`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct NodeSlot {
    pub addr: u32,
    pub edge_from: u32,
    pub edge_to: u32,
}

impl NodeSlot {
    pub(crate) const SIZE: u64 = 12;

    /// Byte offset of slot `id` within `NODE_IDS`. Slots are 1-indexed; id 0
    /// is never stored.
    pub(crate) fn offset(id: u32) -> u64 {
        4 + Self::SIZE * (id as u64 - 1)
    }

    pub(crate) fn tombstone() -> Self {
        Self::default()
    }

    pub(crate) fn is_live(&self) -> bool {
        self.addr != 0
    }

    pub(crate) fn read(file: &mut File, id: u32) -> Result<Self, GraphError> {
        let offset = Self::offset(id);
        let addr = read_u32_at(file, offset)?;
        let edge_from = read_u32_at(file, offset + 4)?;
        let edge_to = read_u32_at(file, offset + 8)?;
        Ok(Self { addr, edge_from, edge_to })
    }

    pub(crate) fn write(&self, file: &mut File, id: u32) -> Result<(), GraphError> {
        let mut buf = Vec::with_capacity(Self::SIZE as usize);
        buf.write_u32::<BigEndian>(self.addr)?;
        buf.write_u32::<BigEndian>(self.edge_from)?;
        buf.write_u32::<BigEndian>(self.edge_to)?;
        write_all_at(file, Self::offset(id), &buf)?;
        Ok(())
    }
}
