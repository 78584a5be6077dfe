//! Edge record framing (`EDGES`) and the edge record returned to callers.

use crate::engine::codec::properties::PropertyMap;
use crate::engine::storage::files::{read_u32_at, write_all_at};
use crate::engine::types::GraphError;
use byteorder::{BigEndian, WriteBytesExt};
use std::fs::File;

/// A fully decoded edge: its id, endpoints, and property map.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: u32,
    pub from_id: u32,
    pub to_id: u32,
    pub props: PropertyMap,
    pub from: Option<Node>,
    pub to: Option<Node>,
}

use crate::engine::storage::node::Node;

/// The fixed 28-byte `EDGES` record: `from_nid · to_nid · prev_1 · next_1 ·
/// prev_2 · next_2 · props_addr`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct EdgeRecord {
    pub from_nid: u32,
    pub to_nid: u32,
    pub prev_1: u32,
    pub next_1: u32,
    pub prev_2: u32,
    pub next_2: u32,
    pub props_addr: u32,
}

impl EdgeRecord {
    pub(crate) const SIZE: u64 = 28;

    pub(crate) fn offset(id: u32) -> u64 {
        4 + Self::SIZE * (id as u64 - 1)
    }

    pub(crate) fn tombstone() -> Self {
        Self::default()
    }

    pub(crate) fn is_live(&self) -> bool {
        self.from_nid != 0
    }

    pub(crate) fn read(file: &mut File, id: u32) -> Result<Self, GraphError> {
        let offset = Self::offset(id);
        Ok(Self {
            from_nid: read_u32_at(file, offset)?,
            to_nid: read_u32_at(file, offset + 4)?,
            prev_1: read_u32_at(file, offset + 8)?,
            next_1: read_u32_at(file, offset + 12)?,
            prev_2: read_u32_at(file, offset + 16)?,
            next_2: read_u32_at(file, offset + 20)?,
            props_addr: read_u32_at(file, offset + 24)?,
        })
    }

    pub(crate) fn write(&self, file: &mut File, id: u32) -> Result<(), GraphError> {
        let mut buf = Vec::with_capacity(Self::SIZE as usize);
        buf.write_u32::<BigEndian>(self.from_nid)?;
        buf.write_u32::<BigEndian>(self.to_nid)?;
        buf.write_u32::<BigEndian>(self.prev_1)?;
        buf.write_u32::<BigEndian>(self.next_1)?;
        buf.write_u32::<BigEndian>(self.prev_2)?;
        buf.write_u32::<BigEndian>(self.next_2)?;
        buf.write_u32::<BigEndian>(self.props_addr)?;
        write_all_at(file, Self::offset(id), &buf)?;
        Ok(())
    }
}
