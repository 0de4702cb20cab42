//! PKG container structures.
//!
//! A PS4 `.pkg` file has the following high-level layout (all header fields
//! big-endian):
//!
//! | Region          | Offset    | Notes                                    |
//! |-----------------|-----------|------------------------------------------|
//! | Header          | `0x0000`  | magic `\x7FCNT`, digests at fixed slots  |
//! | Header digest   | `0x0FE0`  | SHA-256 of `0x0000..0x0FE0`              |
//! | RSA signature   | `0x1000`  | raw RSA-2048 over SHA-256 of the header  |
//! | Body            | `0x2000`  | entry table, entry payloads              |
//! | PFS image       | `0x80000` | aligned to 0x80000, absent for AL        |

use byteorder::{BigEndian, ByteOrder};

/// PKG magic: `\x7FCNT`.
pub const PKG_MAGIC: u32 = 0x7F43_4E54;
/// Size of the header region covered by the header digest and signature.
pub const PKG_HEADER_SIZE: usize = 0x1000;
/// Byte offset of the header digest.
pub const PKG_HEADER_DIGEST_OFFSET: usize = 0xFE0;
/// Size of the RSA header signature written at [`PKG_HEADER_SIZE`].
pub const PKG_SIGNATURE_SIZE: usize = 0x100;
/// Start of the entry body.
pub const PKG_BODY_OFFSET: u64 = 0x2000;
/// The body is padded so the PFS image starts on this alignment.
pub const PKG_PFS_ALIGN: u64 = 0x80000;
/// Alignment between consecutive entry payloads.
pub const PKG_ENTRY_ALIGN: u64 = 16;

/// `pfs_flags` for the original key derivation.
pub const PFS_FLAGS_OLD_CRYPT: u64 = 0x8000_0000_0000_03CC;
/// `pfs_flags` with bit 61 set, selecting the new key derivation.
pub const PFS_FLAGS_NEW_CRYPT: u64 = 0xA000_0000_0000_03CC;
pub const PFS_SIGNED_SIZE: u32 = 0x10000;
pub const PFS_CACHE_SIZE: u32 = 0xD0000;

pub mod content_type {
    pub const GD: u32 = 0x1A;
    pub const AC: u32 = 0x1B;
    pub const AL: u32 = 0x1C;
    pub const DP: u32 = 0x1E;
}

pub mod drm_type {
    pub const PS4: u32 = 0xF;
}

pub mod content_flags {
    pub const FIRST_PATCH: u32 = 0x0010_0000;
    pub const REMASTER: u32 = 0x0040_0000;
    pub const GD_AC: u32 = 0x0200_0000;
    pub const NON_GAME: u32 = 0x0400_0000;
    /// Selects the new PFS key derivation (mirrored into `pfs_flags`).
    pub const PFS_NEW_CRYPT: u32 = 0x0800_0000;
}

// ---------------------------------------------------------------------------
// Entry ids
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum EntryId {
    EntryKeys = 0x0010,
    ImageKey = 0x0020,
    GeneralDigests = 0x0080,
    Metas = 0x0100,
    Digests = 0x0200,
    EntryNames = 0x0400,
    LicenseDat = 0x0C00,
    LicenseInfo = 0x0C01,
    NptitleDat = 0x0C02,
    NpbindDat = 0x0C03,
    SelfinfoDat = 0x0C04,
    ImageinfoDat = 0x0C06,
    TargetDeltainfoDat = 0x0C08,
    OriginDeltainfoDat = 0x0C09,
    PsreservedDat = 0x0C0F,
    ParamSfo = 0x1000,
    PlaygoChunkDat = 0x1001,
    PlaygoChunkSha = 0x1002,
    PlaygoManifestXml = 0x1003,
    PronunciationXml = 0x1004,
    PronunciationSig = 0x1005,
    Pic1Png = 0x1006,
    PubtoolinfoDat = 0x1007,
    AppPlaygoChunkDat = 0x1008,
    AppPlaygoChunkSha = 0x1009,
    AppPlaygoManifestXml = 0x100A,
    ShareparamJson = 0x100B,
    SaveDataPng = 0x100C,
    ShareoverlayimagePng = 0x100D,
    Icon0Png = 0x1200,
    Pic0Png = 0x1220,
    Snd0At9 = 0x1240,
    ChangeinfoXml = 0x1260,
    Icon0Dds = 0x1280,
    Pic0Dds = 0x12A0,
    Pic1Dds = 0x12C0,
    Trophy00Trp = 0x1400,
}

const FILE_NAMES: &[(EntryId, &str)] = &[
    (EntryId::ParamSfo, "param.sfo"),
    (EntryId::PlaygoChunkDat, "playgo-chunk.dat"),
    (EntryId::PlaygoChunkSha, "playgo-chunk.sha"),
    (EntryId::PlaygoManifestXml, "playgo-manifest.xml"),
    (EntryId::PronunciationXml, "pronunciation.xml"),
    (EntryId::PronunciationSig, "pronunciation.sig"),
    (EntryId::Pic1Png, "pic1.png"),
    (EntryId::PubtoolinfoDat, "pubtoolinfo.dat"),
    (EntryId::AppPlaygoChunkDat, "app/playgo-chunk.dat"),
    (EntryId::AppPlaygoChunkSha, "app/playgo-chunk.sha"),
    (EntryId::AppPlaygoManifestXml, "app/playgo-manifest.xml"),
    (EntryId::ShareparamJson, "shareparam.json"),
    (EntryId::SaveDataPng, "save_data.png"),
    (EntryId::ShareoverlayimagePng, "shareoverlayimage.png"),
    (EntryId::Icon0Png, "icon0.png"),
    (EntryId::Pic0Png, "pic0.png"),
    (EntryId::Snd0At9, "snd0.at9"),
    (EntryId::ChangeinfoXml, "changeinfo/changeinfo.xml"),
    (EntryId::Icon0Dds, "icon0.dds"),
    (EntryId::Pic0Dds, "pic0.dds"),
    (EntryId::Pic1Dds, "pic1.dds"),
    (EntryId::Trophy00Trp, "trophy/trophy00.trp"),
];

/// Order in which recognized `sce_sys` files are appended after the
/// canonical entries; ids missing from this list sort last.
const CANONICAL_ORDER: &[EntryId] = &[
    EntryId::NptitleDat,
    EntryId::NpbindDat,
    EntryId::SelfinfoDat,
    EntryId::ImageinfoDat,
    EntryId::TargetDeltainfoDat,
    EntryId::OriginDeltainfoDat,
    EntryId::PronunciationXml,
    EntryId::PronunciationSig,
    EntryId::Pic1Png,
    EntryId::PubtoolinfoDat,
    EntryId::AppPlaygoChunkDat,
    EntryId::AppPlaygoChunkSha,
    EntryId::AppPlaygoManifestXml,
    EntryId::ShareparamJson,
    EntryId::SaveDataPng,
    EntryId::ShareoverlayimagePng,
    EntryId::Icon0Png,
    EntryId::Pic0Png,
    EntryId::Snd0At9,
    EntryId::ChangeinfoXml,
    EntryId::Icon0Dds,
    EntryId::Pic0Dds,
    EntryId::Pic1Dds,
    EntryId::Trophy00Trp,
];

impl EntryId {
    /// The `sce_sys`-relative file name this entry is staged as, if any.
    pub fn file_name(self) -> Option<&'static str> {
        FILE_NAMES.iter().find(|(id, _)| *id == self).map(|(_, n)| *n)
    }

    /// Reverse of [`file_name`](Self::file_name).
    pub fn from_file_name(name: &str) -> Option<EntryId> {
        FILE_NAMES.iter().find(|(_, n)| *n == name).map(|(id, _)| *id)
    }

    /// Sort key used when appending recognized `sce_sys` files.
    pub fn canonical_rank(self) -> u32 {
        CANONICAL_ORDER
            .iter()
            .position(|&e| e == self)
            .map_or(999, |p| p as u32)
    }

    /// Entries from this id upward carry a name-table reference.
    pub fn is_named(self) -> bool {
        self as u32 >= EntryId::ParamSfo as u32
    }
}

/// Per-entry encryption/verification class, written to `flags1`.
pub fn entry_flags1(id: EntryId) -> u32 {
    match id {
        EntryId::EntryKeys | EntryId::GeneralDigests | EntryId::Metas => 0x6000_0000,
        EntryId::ImageKey => 0xE000_0000,
        EntryId::Digests | EntryId::EntryNames => 0x4000_0000,
        EntryId::LicenseDat | EntryId::LicenseInfo => 0x8000_0000,
        _ => 0,
    }
}

/// Key-index word written to `flags2`.
pub fn entry_flags2(id: EntryId) -> u32 {
    match id {
        EntryId::ImageKey | EntryId::LicenseDat => 3 << 12,
        EntryId::LicenseInfo => 2 << 12,
        _ => 0,
    }
}

// ---------------------------------------------------------------------------
// Meta entry
// ---------------------------------------------------------------------------

/// One 0x20-byte record of the entry table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetaEntry {
    pub id: u32,
    pub name_table_offset: u32,
    pub flags1: u32,
    pub flags2: u32,
    pub data_offset: u32,
    pub data_size: u32,
}

impl MetaEntry {
    pub const SIZE: usize = 0x20;

    pub fn write_to(&self, out: &mut [u8]) {
        BigEndian::write_u32(&mut out[0x00..], self.id);
        BigEndian::write_u32(&mut out[0x04..], self.name_table_offset);
        BigEndian::write_u32(&mut out[0x08..], self.flags1);
        BigEndian::write_u32(&mut out[0x0C..], self.flags2);
        BigEndian::write_u32(&mut out[0x10..], self.data_offset);
        BigEndian::write_u32(&mut out[0x14..], self.data_size);
        out[0x18..0x20].fill(0);
    }

    pub fn parse(data: &[u8]) -> MetaEntry {
        MetaEntry {
            id: BigEndian::read_u32(&data[0x00..]),
            name_table_offset: BigEndian::read_u32(&data[0x04..]),
            flags1: BigEndian::read_u32(&data[0x08..]),
            flags2: BigEndian::read_u32(&data[0x0C..]),
            data_offset: BigEndian::read_u32(&data[0x10..]),
            data_size: BigEndian::read_u32(&data[0x14..]),
        }
    }
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PkgHeader {
    pub flags: u32,
    pub pkg_file_count: u32,
    pub entry_count: u32,
    pub sc_entry_count: u16,
    pub entry_table_offset: u32,
    pub main_ent_data_size: u32,
    pub body_offset: u64,
    pub body_size: u64,
    pub content_offset: u64,
    pub content_size: u64,
    pub content_id: String,
    pub drm_type: u32,
    pub content_type: u32,
    pub content_flags: u32,
    pub promote_size: u32,
    pub version_date: u32,
    pub version_hash: u32,
    pub iro_tag: u32,
    pub drm_type_version: u32,
    pub sc_entries1_hash: [u8; 32],
    pub sc_entries2_hash: [u8; 32],
    pub digest_table_hash: [u8; 32],
    pub body_digest: [u8; 32],
    pub pfs_image_count: u32,
    pub pfs_flags: u64,
    pub pfs_image_offset: u64,
    pub pfs_image_size: u64,
    pub mount_image_offset: u64,
    pub mount_image_size: u64,
    pub package_size: u64,
    pub pfs_signed_size: u32,
    pub pfs_cache_size: u32,
    pub pfs_image_digest: [u8; 32],
    pub pfs_signed_digest: [u8; 32],
}

impl PkgHeader {
    /// Serialize everything below the header digest into `out[..0x1000]`.
    pub fn write_to(&self, out: &mut [u8]) {
        BigEndian::write_u32(&mut out[0x000..], PKG_MAGIC);
        BigEndian::write_u32(&mut out[0x004..], self.flags);
        BigEndian::write_u32(&mut out[0x008..], 0);
        BigEndian::write_u32(&mut out[0x00C..], self.pkg_file_count);
        BigEndian::write_u32(&mut out[0x010..], self.entry_count);
        BigEndian::write_u16(&mut out[0x014..], self.sc_entry_count);
        BigEndian::write_u16(&mut out[0x016..], self.entry_count as u16);
        BigEndian::write_u32(&mut out[0x018..], self.entry_table_offset);
        BigEndian::write_u32(&mut out[0x01C..], self.main_ent_data_size);
        BigEndian::write_u64(&mut out[0x020..], self.body_offset);
        BigEndian::write_u64(&mut out[0x028..], self.body_size);
        BigEndian::write_u64(&mut out[0x030..], self.content_offset);
        BigEndian::write_u64(&mut out[0x038..], self.content_size);
        let id = self.content_id.as_bytes();
        out[0x040..0x070].fill(0);
        out[0x040..0x040 + id.len().min(0x30)].copy_from_slice(&id[..id.len().min(0x30)]);
        BigEndian::write_u32(&mut out[0x070..], self.drm_type);
        BigEndian::write_u32(&mut out[0x074..], self.content_type);
        BigEndian::write_u32(&mut out[0x078..], self.content_flags);
        BigEndian::write_u32(&mut out[0x07C..], self.promote_size);
        BigEndian::write_u32(&mut out[0x080..], self.version_date);
        BigEndian::write_u32(&mut out[0x084..], self.version_hash);
        BigEndian::write_u32(&mut out[0x098..], self.iro_tag);
        BigEndian::write_u32(&mut out[0x09C..], self.drm_type_version);
        out[0x100..0x120].copy_from_slice(&self.sc_entries1_hash);
        out[0x120..0x140].copy_from_slice(&self.sc_entries2_hash);
        out[0x140..0x160].copy_from_slice(&self.digest_table_hash);
        out[0x160..0x180].copy_from_slice(&self.body_digest);

        BigEndian::write_u32(&mut out[0x400..], 1);
        BigEndian::write_u32(&mut out[0x404..], self.pfs_image_count);
        BigEndian::write_u64(&mut out[0x408..], self.pfs_flags);
        BigEndian::write_u64(&mut out[0x410..], self.pfs_image_offset);
        BigEndian::write_u64(&mut out[0x418..], self.pfs_image_size);
        BigEndian::write_u64(&mut out[0x420..], self.mount_image_offset);
        BigEndian::write_u64(&mut out[0x428..], self.mount_image_size);
        BigEndian::write_u64(&mut out[0x430..], self.package_size);
        BigEndian::write_u32(&mut out[0x438..], self.pfs_signed_size);
        BigEndian::write_u32(&mut out[0x43C..], self.pfs_cache_size);
        out[0x440..0x460].copy_from_slice(&self.pfs_image_digest);
        out[0x460..0x480].copy_from_slice(&self.pfs_signed_digest);
    }

    /// Parse the fields written by [`write_to`](Self::write_to); `None` when
    /// the magic does not match.
    pub fn parse(data: &[u8]) -> Option<PkgHeader> {
        if BigEndian::read_u32(&data[0x000..]) != PKG_MAGIC {
            return None;
        }
        let id_raw = &data[0x040..0x070];
        let id_end = id_raw.iter().position(|&b| b == 0).unwrap_or(id_raw.len());
        let take32 = |off: usize| {
            let mut a = [0u8; 32];
            a.copy_from_slice(&data[off..off + 32]);
            a
        };
        Some(PkgHeader {
            flags: BigEndian::read_u32(&data[0x004..]),
            pkg_file_count: BigEndian::read_u32(&data[0x00C..]),
            entry_count: BigEndian::read_u32(&data[0x010..]),
            sc_entry_count: BigEndian::read_u16(&data[0x014..]),
            entry_table_offset: BigEndian::read_u32(&data[0x018..]),
            main_ent_data_size: BigEndian::read_u32(&data[0x01C..]),
            body_offset: BigEndian::read_u64(&data[0x020..]),
            body_size: BigEndian::read_u64(&data[0x028..]),
            content_offset: BigEndian::read_u64(&data[0x030..]),
            content_size: BigEndian::read_u64(&data[0x038..]),
            content_id: String::from_utf8_lossy(&id_raw[..id_end]).into_owned(),
            drm_type: BigEndian::read_u32(&data[0x070..]),
            content_type: BigEndian::read_u32(&data[0x074..]),
            content_flags: BigEndian::read_u32(&data[0x078..]),
            promote_size: BigEndian::read_u32(&data[0x07C..]),
            version_date: BigEndian::read_u32(&data[0x080..]),
            version_hash: BigEndian::read_u32(&data[0x084..]),
            iro_tag: BigEndian::read_u32(&data[0x098..]),
            drm_type_version: BigEndian::read_u32(&data[0x09C..]),
            sc_entries1_hash: take32(0x100),
            sc_entries2_hash: take32(0x120),
            digest_table_hash: take32(0x140),
            body_digest: take32(0x160),
            pfs_image_count: BigEndian::read_u32(&data[0x404..]),
            pfs_flags: BigEndian::read_u64(&data[0x408..]),
            pfs_image_offset: BigEndian::read_u64(&data[0x410..]),
            pfs_image_size: BigEndian::read_u64(&data[0x418..]),
            mount_image_offset: BigEndian::read_u64(&data[0x420..]),
            mount_image_size: BigEndian::read_u64(&data[0x428..]),
            package_size: BigEndian::read_u64(&data[0x430..]),
            pfs_signed_size: BigEndian::read_u32(&data[0x438..]),
            pfs_cache_size: BigEndian::read_u32(&data[0x43C..]),
            pfs_image_digest: take32(0x440),
            pfs_signed_digest: take32(0x460),
        })
    }
}
