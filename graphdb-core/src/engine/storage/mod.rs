//! The storage engine: three append-structured files (`PROPERTIES`,
//! `NODE_IDS`, `EDGES`), their header counters, and the CRUD operations that
//! keep the node slots, edge records, and property blocks mutually
//! consistent on disk.

pub mod edge;
pub mod files;
pub mod node;

pub use edge::Edge;
pub use node::Node;

use crate::engine::codec::properties::{PropertyMap, PropertyRecord};
use crate::engine::types::GraphError;
use edge::EdgeRecord;
use files::{file_len, read_exact_at, read_u32_at, write_all_at, write_u32_at};
use node::NodeSlot;
use std::fs::{File, OpenOptions};
use std::path::Path;

/// Owns the three open file handles and the in-memory copies of their header
/// counters. Every mutation is write-through: the header is rewritten on
/// disk before the call that changed it returns.
pub struct StorageEngine {
    properties: File,
    node_ids: File,
    edges: File,
    cur_node_addr: u32,
    cur_node_id: u32,
    cur_eid: u32,
}

impl StorageEngine {
    /// Opens (creating if absent) the three files `{db_name}.properties`,
    /// `{db_name}.node_ids`, `{db_name}.edges` under `dir`.
    pub fn open(dir: impl AsRef<Path>, db_name: &str) -> Result<Self, GraphError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let mut properties = open_rw(dir.join(format!("{db_name}.properties")))?;
        let mut node_ids = open_rw(dir.join(format!("{db_name}.node_ids")))?;
        let mut edges = open_rw(dir.join(format!("{db_name}.edges")))?;

        let cur_node_addr = init_header(&mut properties, 4)?;
        let cur_node_id = init_header(&mut node_ids, 1)?;
        let cur_eid = init_header(&mut edges, 1)?;

        tracing::debug!(
            db_name,
            cur_node_addr,
            cur_node_id,
            cur_eid,
            "opened storage engine"
        );

        Ok(Self {
            properties,
            node_ids,
            edges,
            cur_node_addr,
            cur_node_id,
            cur_eid,
        })
    }

    pub fn create_node(&mut self, props: &PropertyMap) -> Result<u32, GraphError> {
        let addr = self.append_property_record(props)?;
        let node_id = self.cur_node_id;
        self.cur_node_id = self
            .cur_node_id
            .checked_add(1)
            .ok_or_else(|| GraphError::Corruption("node id space exhausted".into()))?;
        write_u32_at(&mut self.node_ids, 0, self.cur_node_id)?;

        NodeSlot {
            addr,
            edge_from: 0,
            edge_to: 0,
        }
        .write(&mut self.node_ids, node_id)?;

        tracing::trace!(node_id, addr, "created node");
        Ok(node_id)
    }

    pub fn get_node(&mut self, node_id: u32) -> Result<Node, GraphError> {
        let slot = self.live_node_slot(node_id)?;
        let props = self.read_property_record(slot.addr)?;
        Ok(Node { id: node_id, props })
    }

    /// Appends a new property record and repoints the slot at it; the old
    /// record is left in place as garbage. The node id never changes.
    pub fn update_node(&mut self, node_id: u32, props: &PropertyMap) -> Result<(), GraphError> {
        let mut slot = self.live_node_slot(node_id)?;
        slot.addr = self.append_property_record(props)?;
        slot.write(&mut self.node_ids, node_id)?;
        Ok(())
    }

    /// Cascades to every incident edge, then tombstones the slot. Deleting an
    /// already-tombstoned (or never allocated within range) node is a no-op.
    pub fn delete_node(&mut self, node_id: u32) -> Result<(), GraphError> {
        if node_id == 0 || node_id >= self.cur_node_id {
            return Err(GraphError::NotFound);
        }
        let slot = NodeSlot::read(&mut self.node_ids, node_id)?;
        if !slot.is_live() {
            return Ok(());
        }

        let mut eid = slot.edge_from;
        while eid != 0 {
            let rec = EdgeRecord::read(&mut self.edges, eid)?;
            let next = rec.next_1;
            self.delete_edge(eid)?;
            eid = next;
        }

        // Self-loops already removed from the incoming list above, so the
        // slot must be re-read before walking what remains of it.
        let slot = NodeSlot::read(&mut self.node_ids, node_id)?;
        let mut eid = slot.edge_to;
        while eid != 0 {
            let rec = EdgeRecord::read(&mut self.edges, eid)?;
            let next = rec.next_2;
            self.delete_edge(eid)?;
            eid = next;
        }

        NodeSlot::tombstone().write(&mut self.node_ids, node_id)?;
        tracing::trace!(node_id, "deleted node");
        Ok(())
    }

    pub fn create_edge(
        &mut self,
        from_id: u32,
        props: &PropertyMap,
        to_id: u32,
    ) -> Result<u32, GraphError> {
        self.live_node_slot(from_id)?;
        self.live_node_slot(to_id)?;

        let props_addr = if props.is_empty() {
            0
        } else {
            self.append_property_record(props)?
        };

        let edge_id = self.cur_eid;
        self.cur_eid = self
            .cur_eid
            .checked_add(1)
            .ok_or_else(|| GraphError::Corruption("edge id space exhausted".into()))?;
        write_u32_at(&mut self.edges, 0, self.cur_eid)?;

        let mut from_slot = NodeSlot::read(&mut self.node_ids, from_id)?;
        let old_from_head = from_slot.edge_from;
        if old_from_head != 0 {
            let mut head = EdgeRecord::read(&mut self.edges, old_from_head)?;
            head.prev_1 = edge_id;
            head.write(&mut self.edges, old_from_head)?;
        }
        from_slot.edge_from = edge_id;
        from_slot.write(&mut self.node_ids, from_id)?;

        // Re-read: for a self-loop this picks up the `edge_from` update just
        // made above before the `edge_to` field is set alongside it.
        let mut to_slot = NodeSlot::read(&mut self.node_ids, to_id)?;
        let old_to_head = to_slot.edge_to;
        if old_to_head != 0 {
            let mut head = EdgeRecord::read(&mut self.edges, old_to_head)?;
            head.prev_2 = edge_id;
            head.write(&mut self.edges, old_to_head)?;
        }
        to_slot.edge_to = edge_id;
        to_slot.write(&mut self.node_ids, to_id)?;

        EdgeRecord {
            from_nid: from_id,
            to_nid: to_id,
            prev_1: 0,
            next_1: old_from_head,
            prev_2: 0,
            next_2: old_to_head,
            props_addr,
        }
        .write(&mut self.edges, edge_id)?;

        tracing::trace!(edge_id, from_id, to_id, "created edge");
        Ok(edge_id)
    }

    pub fn get_edge(
        &mut self,
        edge_id: u32,
        want_from: bool,
        want_to: bool,
    ) -> Result<Edge, GraphError> {
        let rec = self.live_edge_record(edge_id)?;
        let props = self.read_property_record(rec.props_addr)?;
        let from = if want_from {
            Some(self.get_node(rec.from_nid)?)
        } else {
            None
        };
        let to = if want_to {
            Some(self.get_node(rec.to_nid)?)
        } else {
            None
        };
        Ok(Edge {
            id: edge_id,
            from_id: rec.from_nid,
            to_id: rec.to_nid,
            props,
            from,
            to,
        })
    }

    pub fn update_edge_properties(
        &mut self,
        edge_id: u32,
        props: &PropertyMap,
    ) -> Result<(), GraphError> {
        let mut rec = self.live_edge_record(edge_id)?;
        rec.props_addr = if props.is_empty() {
            0
        } else {
            self.append_property_record(props)?
        };
        rec.write(&mut self.edges, edge_id)?;
        Ok(())
    }

    /// Unlinks the edge from both adjacency lists and tombstones it.
    /// Deleting an already-tombstoned edge is a no-op.
    pub fn delete_edge(&mut self, edge_id: u32) -> Result<(), GraphError> {
        if edge_id == 0 || edge_id >= self.cur_eid {
            return Err(GraphError::NotFound);
        }
        let rec = EdgeRecord::read(&mut self.edges, edge_id)?;
        if !rec.is_live() {
            return Ok(());
        }

        if rec.prev_1 != 0 {
            let mut prev = EdgeRecord::read(&mut self.edges, rec.prev_1)?;
            prev.next_1 = rec.next_1;
            prev.write(&mut self.edges, rec.prev_1)?;
        } else {
            let mut from_slot = NodeSlot::read(&mut self.node_ids, rec.from_nid)?;
            from_slot.edge_from = rec.next_1;
            from_slot.write(&mut self.node_ids, rec.from_nid)?;
        }
        if rec.next_1 != 0 {
            let mut next = EdgeRecord::read(&mut self.edges, rec.next_1)?;
            next.prev_1 = rec.prev_1;
            next.write(&mut self.edges, rec.next_1)?;
        }

        if rec.prev_2 != 0 {
            let mut prev = EdgeRecord::read(&mut self.edges, rec.prev_2)?;
            prev.next_2 = rec.next_2;
            prev.write(&mut self.edges, rec.prev_2)?;
        } else {
            let mut to_slot = NodeSlot::read(&mut self.node_ids, rec.to_nid)?;
            to_slot.edge_to = rec.next_2;
            to_slot.write(&mut self.node_ids, rec.to_nid)?;
        }
        if rec.next_2 != 0 {
            let mut next = EdgeRecord::read(&mut self.edges, rec.next_2)?;
            next.prev_2 = rec.prev_2;
            next.write(&mut self.edges, rec.next_2)?;
        }

        EdgeRecord::tombstone().write(&mut self.edges, edge_id)?;
        tracing::trace!(edge_id, "deleted edge");
        Ok(())
    }

    /// Edge ids whose `from_nid` is `node_id`, newest first. Reflects list
    /// state at the moment of the call; the returned `Vec` is not a live view.
    pub fn get_edges_from(&mut self, node_id: u32) -> Result<Vec<u32>, GraphError> {
        let slot = self.live_node_slot(node_id)?;
        let mut out = Vec::new();
        let mut eid = slot.edge_from;
        while eid != 0 {
            out.push(eid);
            eid = EdgeRecord::read(&mut self.edges, eid)?.next_1;
        }
        Ok(out)
    }

    /// Edge ids whose `to_nid` is `node_id`, newest first.
    pub fn get_edges_to(&mut self, node_id: u32) -> Result<Vec<u32>, GraphError> {
        let slot = self.live_node_slot(node_id)?;
        let mut out = Vec::new();
        let mut eid = slot.edge_to;
        while eid != 0 {
            out.push(eid);
            eid = EdgeRecord::read(&mut self.edges, eid)?.next_2;
        }
        Ok(out)
    }

    /// Linear scan over every live node whose property map is a superset of
    /// `query`.
    pub fn get_nodes_by_properties(&mut self, query: &PropertyMap) -> Result<Vec<Node>, GraphError> {
        let mut out = Vec::new();
        for id in 1..self.cur_node_id {
            let slot = NodeSlot::read(&mut self.node_ids, id)?;
            if !slot.is_live() {
                continue;
            }
            let props = self.read_property_record(slot.addr)?;
            if props.matches(query) {
                out.push(Node { id, props });
            }
        }
        Ok(out)
    }

    /// Linear scan over every live edge whose property map is a superset of
    /// `query`.
    pub fn get_edges_by_properties(&mut self, query: &PropertyMap) -> Result<Vec<Edge>, GraphError> {
        let mut out = Vec::new();
        for id in 1..self.cur_eid {
            let rec = EdgeRecord::read(&mut self.edges, id)?;
            if !rec.is_live() {
                continue;
            }
            let props = self.read_property_record(rec.props_addr)?;
            if props.matches(query) {
                out.push(Edge {
                    id,
                    from_id: rec.from_nid,
                    to_id: rec.to_nid,
                    props,
                    from: None,
                    to: None,
                });
            }
        }
        Ok(out)
    }

    pub(crate) fn node_exists(&mut self, node_id: u32) -> Result<bool, GraphError> {
        if node_id == 0 || node_id >= self.cur_node_id {
            return Ok(false);
        }
        Ok(NodeSlot::read(&mut self.node_ids, node_id)?.is_live())
    }

    fn live_node_slot(&mut self, node_id: u32) -> Result<NodeSlot, GraphError> {
        if node_id == 0 || node_id >= self.cur_node_id {
            return Err(GraphError::NotFound);
        }
        let slot = NodeSlot::read(&mut self.node_ids, node_id)?;
        if !slot.is_live() {
            return Err(GraphError::NotFound);
        }
        Ok(slot)
    }

    fn live_edge_record(&mut self, edge_id: u32) -> Result<EdgeRecord, GraphError> {
        if edge_id == 0 || edge_id >= self.cur_eid {
            return Err(GraphError::NotFound);
        }
        let rec = EdgeRecord::read(&mut self.edges, edge_id)?;
        if !rec.is_live() {
            return Err(GraphError::NotFound);
        }
        Ok(rec)
    }

    fn append_property_record(&mut self, props: &PropertyMap) -> Result<u32, GraphError> {
        let record = PropertyRecord::encode(props)?;
        let addr = self.cur_node_addr;
        write_all_at(&mut self.properties, addr as u64, &record)?;
        self.cur_node_addr = self
            .cur_node_addr
            .checked_add(record.len() as u32)
            .ok_or_else(|| GraphError::Corruption("PROPERTIES file exceeds addressable range".into()))?;
        write_u32_at(&mut self.properties, 0, self.cur_node_addr)?;
        Ok(addr)
    }

    fn read_property_record(&mut self, addr: u32) -> Result<PropertyMap, GraphError> {
        if addr == 0 {
            return Ok(PropertyMap::new());
        }
        let rec_len = read_u32_at(&mut self.properties, addr as u64)?;
        let bytes = read_exact_at(&mut self.properties, addr as u64, rec_len as usize)?;
        let (map, _) = PropertyRecord::decode(&bytes)?;
        Ok(map)
    }
}

fn open_rw(path: impl AsRef<Path>) -> std::io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)
}

/// Reads the 4-byte header at offset 0, initializing it to `initial` if the
/// file was just created (shorter than a header).
fn init_header(file: &mut File, initial: u32) -> Result<u32, GraphError> {
    if file_len(file)? < 4 {
        write_u32_at(file, 0, initial)?;
        Ok(initial)
    } else {
        Ok(read_u32_at(file, 0)?)
    }
}
