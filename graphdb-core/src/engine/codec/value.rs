//! Encodes and decodes a single typed property value, driven by the signed
//! `val_desc` tag described in the on-disk format: negative values enumerate
//! the five scalar types, non-negative values mean "TEXT of this many bytes".

use crate::engine::types::GraphError;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

const DESC_BOOL: i32 = -1;
const DESC_INT: i32 = -2;
const DESC_UINT: i32 = -3;
const DESC_FLOAT: i32 = -4;
const DESC_CHAR: i32 = -5;

/// A single property value. `Uint` is reserved for internal fields (proxy
/// node sentinels) and MUST NOT be produced by the user-facing API.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i32),
    Uint(u32),
    Float(f32),
    Char(char),
    Text(Vec<u8>),
}

impl PropertyValue {
    /// The `val_desc` this value encodes as.
    pub fn val_desc(&self) -> i32 {
        match self {
            PropertyValue::Bool(_) => DESC_BOOL,
            PropertyValue::Int(_) => DESC_INT,
            PropertyValue::Uint(_) => DESC_UINT,
            PropertyValue::Float(_) => DESC_FLOAT,
            PropertyValue::Char(_) => DESC_CHAR,
            PropertyValue::Text(bytes) => bytes.len() as i32,
        }
    }

    /// Appends this value's wire bytes (not the `val_desc`) to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), GraphError> {
        match self {
            PropertyValue::Bool(b) => out.push(if *b { 1 } else { 0 }),
            PropertyValue::Int(v) => out.write_i32::<BigEndian>(*v)?,
            PropertyValue::Uint(v) => out.write_u32::<BigEndian>(*v)?,
            PropertyValue::Float(v) => out.write_f32::<BigEndian>(*v)?,
            PropertyValue::Char(c) => out.write_u32::<BigEndian>(*c as u32)?,
            PropertyValue::Text(bytes) => out.extend_from_slice(bytes),
        }
        Ok(())
    }

    /// Decodes a value whose tag is `val_desc` from the front of `input`,
    /// returning the value and the remaining, unconsumed bytes.
    pub fn decode(val_desc: i32, input: &[u8]) -> Result<(Self, &[u8]), GraphError> {
        if val_desc >= 0 {
            let len = val_desc as usize;
            if input.len() < len {
                return Err(GraphError::Corruption(format!(
                    "TEXT value needs {len} bytes, only {} available",
                    input.len()
                )));
            }
            let (text, rest) = input.split_at(len);
            return Ok((PropertyValue::Text(text.to_vec()), rest));
        }

        match val_desc {
            DESC_BOOL => {
                let (byte, rest) = take(input, 1)?;
                Ok((PropertyValue::Bool(byte[0] != 0), rest))
            }
            DESC_INT => {
                let (bytes, rest) = take(input, 4)?;
                let mut cur = Cursor::new(bytes);
                Ok((PropertyValue::Int(cur.read_i32::<BigEndian>()?), rest))
            }
            DESC_UINT => {
                let (bytes, rest) = take(input, 4)?;
                let mut cur = Cursor::new(bytes);
                Ok((PropertyValue::Uint(cur.read_u32::<BigEndian>()?), rest))
            }
            DESC_FLOAT => {
                let (bytes, rest) = take(input, 4)?;
                let mut cur = Cursor::new(bytes);
                Ok((PropertyValue::Float(cur.read_f32::<BigEndian>()?), rest))
            }
            DESC_CHAR => {
                let (bytes, rest) = take(input, 4)?;
                let mut cur = Cursor::new(bytes);
                let code = cur.read_u32::<BigEndian>()?;
                let c = char::from_u32(code).ok_or_else(|| {
                    GraphError::Corruption(format!("{code:#x} is not a valid code point"))
                })?;
                Ok((PropertyValue::Char(c), rest))
            }
            _ => Err(GraphError::Corruption(format!(
                "val_desc {val_desc} is not a recognized scalar tag"
            ))),
        }
    }
}

fn take(input: &[u8], n: usize) -> Result<(&[u8], &[u8]), GraphError> {
    if input.len() < n {
        return Err(GraphError::Corruption(format!(
            "need {n} bytes, only {} available",
            input.len()
        )));
    }
    Ok(input.split_at(n))
}
