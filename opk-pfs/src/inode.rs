//! PFS inode and directory-entry encoders.
//!
//! Two physical inode layouts exist. Signed images use the 0x2C0-byte
//! variant whose block pointers are 36-byte signature slots (32-byte HMAC
//! followed by the LE32 block number); unsigned images use the 0xA8-byte
//! variant with plain LE32 pointers and `-1` marking unused slots.

use std::io::{self, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use enumflags2::{bitflags, BitFlags};

/// Fixed leading part shared by both inode layouts.
pub const DINODE_FIXED_SIZE: usize = 0x64;
/// Signed inode record size.
pub const DINODE_S32_SIZE: usize = 0x2C0;
/// Unsigned inode record size.
pub const DINODE_D32_SIZE: usize = 0xA8;
/// One signature slot: 32-byte HMAC plus LE32 block number.
pub const SIG_ENTRY_SIZE: usize = 36;
/// Direct block slots per inode.
pub const DIRECT_SLOTS: usize = 12;

#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeFlags {
    Compressed = 0x1,
    Readonly = 0x10,
    Unk5 = 0x20,
    Unk13 = 0x2000,
    Internal = 0x20000,
}

pub mod inode_mode {
    /// `r-xr-xr-x`
    pub const RX: u16 = 0o555;
    /// `rwxrwxrwx`
    pub const RWX: u16 = 0o777;
    pub const DIR: u16 = 0x4000;
    pub const FILE: u16 = 0x8000;
}

pub struct Inode {
    pub number: u32,
    pub mode: u16,
    pub nlink: u16,
    pub flags: BitFlags<InodeFlags>,
    pub size: u64,
    pub size_compressed: u64,
    pub time: i64,
    pub uid: u32,
    pub gid: u32,
    pub blocks: u32,
    /// Direct block pointers. Unused slots hold 0 in signed images and -1
    /// in unsigned images.
    pub direct: [i64; DIRECT_SLOTS],
    /// Single- and double-indirect block pointers.
    pub indirect: [i64; 2],
    signed: bool,
}

impl Inode {
    pub fn new(number: u32, signed: bool) -> Self {
        let sentinel = if signed { 0 } else { -1 };
        Self {
            number,
            mode: 0,
            nlink: 1,
            flags: BitFlags::empty(),
            size: 0,
            size_compressed: 0,
            time: 0,
            uid: 0,
            gid: 0,
            blocks: 0,
            direct: [sentinel; DIRECT_SLOTS],
            indirect: [sentinel; 2],
            signed,
        }
    }

    /// Record a direct block pointer.
    ///
    /// The signed variant treats zero as "unassigned" and advances to the
    /// first unassigned slot at or after `idx`; the unsigned variant stores
    /// at `idx`. Both behaviors are relied on by the layout pass.
    pub fn set_direct_block(&mut self, idx: usize, block: u64) {
        if self.signed {
            let mut i = idx;
            while i < DIRECT_SLOTS && self.direct[i] != 0 {
                i += 1;
            }
            if i < DIRECT_SLOTS {
                self.direct[i] = block as i64;
            }
        } else {
            self.direct[idx] = block as i64;
        }
    }

    /// First data block of this inode's payload.
    pub fn start_block(&self) -> u64 {
        self.direct[0].max(0) as u64
    }

    fn write_fixed<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u16::<LittleEndian>(self.mode)?;
        w.write_u16::<LittleEndian>(self.nlink)?;
        w.write_u32::<LittleEndian>(self.flags.bits())?;
        w.write_i64::<LittleEndian>(self.size as i64)?;
        w.write_i64::<LittleEndian>(self.size_compressed as i64)?;
        for _ in 0..4 {
            w.write_i64::<LittleEndian>(self.time)?;
        }
        for _ in 0..4 {
            w.write_u32::<LittleEndian>(0)?; // nanoseconds
        }
        w.write_u32::<LittleEndian>(self.uid)?;
        w.write_u32::<LittleEndian>(self.gid)?;
        w.write_u64::<LittleEndian>(0)?;
        w.write_u64::<LittleEndian>(0)?;
        w.write_u32::<LittleEndian>(self.blocks)?;
        Ok(())
    }

    /// Serialize the signed (0x2C0) layout. Signature bytes are zero here;
    /// the signing pass patches them in the image.
    pub fn write_s32<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.write_fixed(w)?;
        for ptr in self.direct.iter().chain(self.indirect.iter()) {
            w.write_all(&[0u8; 32])?;
            w.write_u32::<LittleEndian>((*ptr).max(0) as u32)?;
        }
        let used = DINODE_FIXED_SIZE + 14 * SIG_ENTRY_SIZE;
        w.write_all(&vec![0u8; DINODE_S32_SIZE - used])?;
        Ok(())
    }

    /// Serialize the unsigned (0xA8) layout.
    pub fn write_d32<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.write_fixed(w)?;
        for ptr in self.direct.iter().chain(self.indirect.iter()) {
            w.write_i32::<LittleEndian>(*ptr as i32)?;
        }
        let used = DINODE_FIXED_SIZE + 14 * 4;
        w.write_all(&vec![0u8; DINODE_D32_SIZE - used])?;
        Ok(())
    }

    pub fn record_size(signed: bool) -> usize {
        if signed {
            DINODE_S32_SIZE
        } else {
            DINODE_D32_SIZE
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DirentType {
    File = 2,
    Directory = 3,
    Dot = 4,
    DotDot = 5,
}

#[derive(Debug, Clone)]
pub struct Dirent {
    pub ino: u32,
    pub dtype: DirentType,
    pub name: String,
}

impl Dirent {
    pub fn new(ino: u32, dtype: DirentType, name: &str) -> Self {
        Self {
            ino,
            dtype,
            name: name.into(),
        }
    }

    pub fn dot(ino: u32) -> Self {
        Self::new(ino, DirentType::Dot, ".")
    }

    pub fn dotdot(parent_ino: u32) -> Self {
        Self::new(parent_ino, DirentType::DotDot, "..")
    }

    /// Serialized record size: 0x10 header plus the name padded to 8 bytes.
    pub fn entsize(&self) -> usize {
        0x10 + (self.name.len() + 7) / 8 * 8
    }

    /// Write the record with an explicit entsize (the writer widens the
    /// last record of a block to absorb the tail).
    pub fn write_to<W: Write>(&self, w: &mut W, entsize: usize) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.ino)?;
        w.write_u32::<LittleEndian>(self.dtype as u32)?;
        w.write_u32::<LittleEndian>(self.name.len() as u32)?;
        w.write_u32::<LittleEndian>(entsize as u32)?;
        w.write_all(self.name.as_bytes())?;
        w.write_all(&vec![0u8; entsize - 0x10 - self.name.len()])?;
        Ok(())
    }
}

/// Render a dirent list into its on-image bytes.
///
/// No record may straddle a block boundary: when the next record does not
/// fit, the previous record's entsize is widened over the remainder of the
/// block and the record starts on the next block.
pub fn render_dirents(dirents: &[Dirent], block_size: usize) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    let mut prev: Option<(usize, usize)> = None;
    for d in dirents {
        let ent = d.entsize();
        let block_rem = block_size - out.len() % block_size;
        if ent > block_rem {
            if let Some((off, psize)) = prev {
                let widened = (psize + block_rem) as u32;
                out[off + 12..off + 16].copy_from_slice(&widened.to_le_bytes());
            }
            out.resize(out.len() + block_rem, 0);
        }
        let off = out.len();
        d.write_to(&mut out, ent).expect("vec write");
        prev = Some((off, ent));
    }
    out
}
