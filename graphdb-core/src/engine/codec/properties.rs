//! Property block codec: an ordered, unique-keyed sequence of property
//! values, and the outer `rec_len`-framed record both node and edge property
//! records share.

use crate::engine::codec::value::PropertyValue;
use crate::engine::types::GraphError;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// An ordered key/value property map. Insertion order is preserved for
/// testability; inserting an already-present key updates its value without
/// moving its position, so the map can never contain duplicate keys and
/// therefore always round-trips through [`PropertyMap::encode`] /
/// [`PropertyMap::decode`] unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyMap {
    entries: Vec<(String, PropertyValue)>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: PropertyValue) -> &mut Self {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// True if `self` contains every (key, value) pair in `query`, i.e. `self`
    /// is a superset of `query` under key equality and same-tag value
    /// equality.
    pub fn matches(&self, query: &PropertyMap) -> bool {
        query.iter().all(|(key, value)| self.get(key) == Some(value))
    }

    /// Encodes the property block: `num_props` followed by each
    /// `key_strlen · key_bytes · val_desc · value_bytes` in insertion order.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), GraphError> {
        out.write_u32::<BigEndian>(self.entries.len() as u32)?;
        for (key, value) in &self.entries {
            let key_bytes = key.as_bytes();
            out.write_u32::<BigEndian>(key_bytes.len() as u32)?;
            out.extend_from_slice(key_bytes);
            out.write_i32::<BigEndian>(value.val_desc())?;
            value.encode(out)?;
        }
        Ok(())
    }

    /// Decodes a property block from the front of `input`, returning the map
    /// and the remaining bytes. Duplicate keys fold left-to-right: only the
    /// first occurrence is kept.
    pub fn decode(input: &[u8]) -> Result<(Self, &[u8]), GraphError> {
        let mut cursor = Cursor::new(input);
        let num_props = cursor.read_u32::<BigEndian>()?;
        let mut rest = &input[cursor.position() as usize..];

        let mut map = PropertyMap::new();
        for _ in 0..num_props {
            let (key, after_key) = read_key(rest)?;
            let mut key_cursor = Cursor::new(after_key);
            let val_desc = key_cursor.read_i32::<BigEndian>()?;
            let after_desc = &after_key[key_cursor.position() as usize..];
            let (value, after_value) = PropertyValue::decode(val_desc, after_desc)?;
            rest = after_value;

            if map.get(&key).is_none() {
                map.entries.push((key, value));
            }
        }
        Ok((map, rest))
    }
}

fn read_key(input: &[u8]) -> Result<(String, &[u8]), GraphError> {
    let mut cursor = Cursor::new(input);
    let key_strlen = cursor.read_u32::<BigEndian>()? as usize;
    let after_len = &input[cursor.position() as usize..];
    if after_len.len() < key_strlen {
        return Err(GraphError::Corruption(format!(
            "key needs {key_strlen} bytes, only {} available",
            after_len.len()
        )));
    }
    let (key_bytes, rest) = after_len.split_at(key_strlen);
    let key = String::from_utf8(key_bytes.to_vec())
        .map_err(|e| GraphError::Corruption(format!("property key is not valid utf-8: {e}")))?;
    Ok((key, rest))
}

impl FromIterator<(String, PropertyValue)> for PropertyMap {
    fn from_iter<T: IntoIterator<Item = (String, PropertyValue)>>(iter: T) -> Self {
        let mut map = PropertyMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// Wraps an encoded [`PropertyMap`] with the `rec_len` frame shared by node
/// and edge property records.
pub struct PropertyRecord;

impl PropertyRecord {
    /// Encodes `props` as `rec_len (UINT) · num_props (UINT) · props...`,
    /// where `rec_len` counts every byte of the record, itself included.
    pub fn encode(props: &PropertyMap) -> Result<Vec<u8>, GraphError> {
        let mut body = Vec::new();
        props.encode(&mut body)?;

        let rec_len = 4usize
            .checked_add(body.len())
            .ok_or_else(|| GraphError::Corruption("record too large".to_string()))?;
        let mut out = Vec::with_capacity(rec_len);
        out.write_u32::<BigEndian>(rec_len as u32)?;
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Decodes a record starting at the front of `bytes`, returning the
    /// property map and the record's declared `rec_len`.
    pub fn decode(bytes: &[u8]) -> Result<(PropertyMap, u32), GraphError> {
        let mut cursor = Cursor::new(bytes);
        let rec_len = cursor.read_u32::<BigEndian>()?;
        let body_start = cursor.position() as usize;
        let body_len = (rec_len as usize)
            .checked_sub(4)
            .ok_or_else(|| GraphError::Corruption("rec_len smaller than its own header".into()))?;
        let body_end = body_start
            .checked_add(body_len)
            .ok_or_else(|| GraphError::Corruption("rec_len overflows record bounds".into()))?;
        if bytes.len() < body_end {
            return Err(GraphError::Corruption(format!(
                "record declares {rec_len} bytes but only {} are available",
                bytes.len()
            )));
        }
        let (map, rest) = PropertyMap::decode(&bytes[body_start..body_end])?;
        if !rest.is_empty() {
            return Err(GraphError::Corruption(
                "property block did not consume the full record body".into(),
            ));
        }
        Ok((map, rec_len))
    }
}
