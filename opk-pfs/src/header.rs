//! PFS superblock (block 0).
//!
//! Layout (little-endian):
//!
//! | Offset | Field                                   |
//! |--------|-----------------------------------------|
//! | 0x000  | version (u64, 1)                        |
//! | 0x008  | magic (u64, 20130315)                   |
//! | 0x010  | id (u64)                                |
//! | 0x018  | fmode, clean, ronly, rsv (u8 each)      |
//! | 0x01C  | mode (u16)                              |
//! | 0x020  | block size (u32)                        |
//! | 0x028  | nblock (u64, 1)                         |
//! | 0x030  | dinode count (u64)                      |
//! | 0x038  | ndblock (u64)                           |
//! | 0x040  | dinode block count (u64)                |
//! | 0x048  | super-root inode (u64)                  |
//! | 0x054  | inode-block inode (direct sigs at 0xB8) |
//! | 0x370  | seed (16 bytes, signed/encrypted only)  |
//! | 0x380  | header signature slot (36 bytes)        |

use byteorder::{ByteOrder, LittleEndian};
use enumflags2::{bitflags, BitFlags};

use crate::error::Result;
use crate::inode::Inode;

#[bitflags]
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PfsMode {
    Signed = 0x1,
    Is64Bit = 0x2,
    Encrypted = 0x4,
    UnknownAlwaysSet = 0x8,
}

pub const PFS_MAGIC: u64 = 20130315;
/// Offset of the embedded inode that maps the inode blocks; its direct
/// signature slots land at 0xB8 + 36·i.
pub const INODE_BLOCK_INO_OFFSET: usize = 0x54;
/// Offset of the first direct signature slot of that inode.
pub const HEADER_DIRECT_SIG_OFFSET: u64 = 0xB8;
pub const PFS_SEED_OFFSET: usize = 0x370;
/// Where the header's own HMAC is stored.
pub const PFS_HEADER_SIG_OFFSET: u64 = 0x380;
/// How much of block 0 the header HMAC covers.
pub const PFS_HEADER_SIGNED_SIZE: u32 = 0x5A0;

pub struct PfsHeader {
    pub mode: BitFlags<PfsMode>,
    pub block_size: u32,
    pub seed: [u8; 16],
    pub dinode_count: u64,
    pub ndblock: u64,
    pub dinode_block_count: u64,
    pub superroot_ino: u64,
}

impl PfsHeader {
    pub fn new(mode: BitFlags<PfsMode>, block_size: u32, seed: [u8; 16]) -> Self {
        Self {
            mode,
            block_size,
            seed,
            dinode_count: 0,
            ndblock: 0,
            dinode_block_count: 0,
            superroot_ino: 0,
        }
    }

    pub fn is_signed(&self) -> bool {
        self.mode.contains(PfsMode::Signed)
    }

    pub fn is_encrypted(&self) -> bool {
        self.mode.contains(PfsMode::Encrypted)
    }

    /// Serialize into the start of block 0. `inode_block_ino` is the
    /// embedded inode describing the inode blocks.
    pub fn write_to(&self, block: &mut [u8], inode_block_ino: &Inode) -> Result<()> {
        LittleEndian::write_u64(&mut block[0x00..], 1);
        LittleEndian::write_u64(&mut block[0x08..], PFS_MAGIC);
        LittleEndian::write_u64(&mut block[0x10..], 0); // id
        // fmode / clean / ronly / rsv stay zero
        LittleEndian::write_u16(&mut block[0x1C..], self.mode.bits());
        LittleEndian::write_u32(&mut block[0x20..], self.block_size);
        LittleEndian::write_u32(&mut block[0x24..], 0); // nbackup
        LittleEndian::write_u64(&mut block[0x28..], 1); // nblock
        LittleEndian::write_u64(&mut block[0x30..], self.dinode_count);
        LittleEndian::write_u64(&mut block[0x38..], self.ndblock);
        LittleEndian::write_u64(&mut block[0x40..], self.dinode_block_count);
        LittleEndian::write_u64(&mut block[0x48..], self.superroot_ino);

        let ino_end = INODE_BLOCK_INO_OFFSET + Inode::record_size(self.is_signed());
        let mut slot = &mut block[INODE_BLOCK_INO_OFFSET..ino_end];
        if self.is_signed() {
            inode_block_ino.write_s32(&mut slot)?;
        } else {
            inode_block_ino.write_d32(&mut slot)?;
        }

        if self.is_signed() || self.is_encrypted() {
            block[PFS_SEED_OFFSET..PFS_SEED_OFFSET + 16].copy_from_slice(&self.seed);
        }
        Ok(())
    }

    /// Parse the fields written by [`write_to`](Self::write_to); used by the
    /// round-trip checks.
    pub fn parse(block: &[u8]) -> Option<PfsHeader> {
        if LittleEndian::read_u64(&block[0x08..]) != PFS_MAGIC {
            return None;
        }
        let mode = BitFlags::from_bits(LittleEndian::read_u16(&block[0x1C..])).ok()?;
        let mut seed = [0u8; 16];
        seed.copy_from_slice(&block[PFS_SEED_OFFSET..PFS_SEED_OFFSET + 16]);
        Some(PfsHeader {
            mode,
            block_size: LittleEndian::read_u32(&block[0x20..]),
            seed,
            dinode_count: LittleEndian::read_u64(&block[0x30..]),
            ndblock: LittleEndian::read_u64(&block[0x38..]),
            dinode_block_count: LittleEndian::read_u64(&block[0x40..]),
            superroot_ino: LittleEndian::read_u64(&block[0x48..]),
        })
    }
}
