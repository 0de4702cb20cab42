//! PFSC, the compressed wrapper around an embedded PFS image.
//!
//! Layout (little-endian):
//!
//! | Offset | Field                                      |
//! |--------|--------------------------------------------|
//! | 0x00   | magic `PFSC`                               |
//! | 0x04   | u32 0                                      |
//! | 0x08   | u32 6                                      |
//! | 0x0C   | u32 block size                             |
//! | 0x10   | u64 block size (again)                     |
//! | 0x18   | u64 offset-table position (0x30)           |
//! | 0x20   | u64 data start (block-aligned)             |
//! | 0x28   | u64 uncompressed length                    |
//! | 0x30   | u64 × (blocks + 1) absolute block offsets  |
//!
//! Each block is an independent zlib stream. A block that does not shrink
//! is stored raw, which the offset delta (equal to the block size) makes
//! self-describing.

use std::io::{self, Read, Write};

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

pub const PFSC_MAGIC: &[u8; 4] = b"PFSC";
pub const PFSC_BLOCK_SIZE: usize = 0x10000;
const TABLE_OFFSET: usize = 0x30;

fn align_block(v: usize) -> usize {
    (v + PFSC_BLOCK_SIZE - 1) & !(PFSC_BLOCK_SIZE - 1)
}

/// Compress a PFS image into a PFSC container.
pub fn compress(image: &[u8]) -> io::Result<Vec<u8>> {
    let blocks = image.len().div_ceil(PFSC_BLOCK_SIZE);
    let data_start = align_block(TABLE_OFFSET + 8 * (blocks + 1));

    let mut out = vec![0u8; data_start];
    out[0..4].copy_from_slice(PFSC_MAGIC);
    LittleEndian::write_u32(&mut out[0x08..], 6);
    LittleEndian::write_u32(&mut out[0x0C..], PFSC_BLOCK_SIZE as u32);
    LittleEndian::write_u64(&mut out[0x10..], PFSC_BLOCK_SIZE as u64);
    LittleEndian::write_u64(&mut out[0x18..], TABLE_OFFSET as u64);
    LittleEndian::write_u64(&mut out[0x20..], data_start as u64);
    LittleEndian::write_u64(&mut out[0x28..], image.len() as u64);

    let mut offsets = Vec::with_capacity(blocks + 1);
    for chunk in image.chunks(PFSC_BLOCK_SIZE) {
        offsets.push(out.len() as u64);
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(chunk)?;
        let packed = enc.finish()?;
        if packed.len() >= chunk.len() {
            out.extend_from_slice(chunk);
        } else {
            out.extend_from_slice(&packed);
        }
    }
    offsets.push(out.len() as u64);

    let mut table = &mut out[TABLE_OFFSET..TABLE_OFFSET + 8 * (blocks + 1)];
    for off in &offsets {
        table.write_u64::<LittleEndian>(*off)?;
    }
    Ok(out)
}

/// Read one uncompressed block back out of a PFSC container.
pub fn read_block(pfsc: &[u8], index: usize) -> io::Result<Vec<u8>> {
    if &pfsc[0..4] != PFSC_MAGIC {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad PFSC magic"));
    }
    let table = LittleEndian::read_u64(&pfsc[0x18..]) as usize;
    let total = LittleEndian::read_u64(&pfsc[0x28..]) as usize;
    let blocks = total.div_ceil(PFSC_BLOCK_SIZE);
    if index >= blocks {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "block index"));
    }
    let start = LittleEndian::read_u64(&pfsc[table + 8 * index..]) as usize;
    let end = LittleEndian::read_u64(&pfsc[table + 8 * (index + 1)..]) as usize;
    let want = (total - index * PFSC_BLOCK_SIZE).min(PFSC_BLOCK_SIZE);

    if end - start == want {
        return Ok(pfsc[start..end].to_vec());
    }
    let mut out = Vec::with_capacity(want);
    ZlibDecoder::new(&pfsc[start..end]).read_to_end(&mut out)?;
    Ok(out)
}
