//! Low-level big-endian positional I/O shared by the three on-disk files.
//! Every record field in the format is a 32-bit integer, so these helpers
//! are the only place that talks `byteorder` directly.

use crate::engine::types::GraphError;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// A short/truncated read is a structural format violation, not a transient
/// I/O failure, per the spec's error taxonomy — classify it as `Corruption`
/// rather than letting it fall through as `Io`.
fn classify_read_error(error: io::Error, offset: u64, len: usize) -> GraphError {
    if error.kind() == io::ErrorKind::UnexpectedEof {
        GraphError::Corruption(format!(
            "short read: needed {len} bytes at offset {offset}, file ended first"
        ))
    } else {
        GraphError::Io(error)
    }
}

pub(crate) fn read_u32_at(file: &mut File, offset: u64) -> Result<u32, GraphError> {
    file.seek(SeekFrom::Start(offset))?;
    file.read_u32::<BigEndian>()
        .map_err(|e| classify_read_error(e, offset, 4))
}

pub(crate) fn write_u32_at(file: &mut File, offset: u64, value: u32) -> io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_u32::<BigEndian>(value)
}

/// Reads `len` bytes starting at `offset`, raising `Corruption` if the file
/// is shorter than `offset + len`.
pub(crate) fn read_exact_at(file: &mut File, offset: u64, len: usize) -> Result<Vec<u8>, GraphError> {
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf)
        .map_err(|e| classify_read_error(e, offset, len))?;
    Ok(buf)
}

pub(crate) fn write_all_at(file: &mut File, offset: u64, bytes: &[u8]) -> io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(bytes)
}

pub(crate) fn file_len(file: &mut File) -> io::Result<u64> {
    file.seek(SeekFrom::End(0))
}
