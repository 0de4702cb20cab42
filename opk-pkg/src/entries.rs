//! Entry payload builders.
//!
//! Everything here is deterministic data assembled from project fields; the
//! computed entries (digests, chunk hashes) start as zero-filled buffers and
//! are patched during the digest cascade.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use opk_secure::{compute_keys, sha256, IMAGE_KEYSET};

use crate::structs::{EntryId, MetaEntry};

pub const KEYS_ENTRY_SIZE: usize = 0x800;
pub const GENERAL_DIGESTS_SIZE: usize = 0x180;
pub const LICENSE_DAT_SIZE: usize = 0x400;
pub const LICENSE_INFO_SIZE: usize = 0x200;
pub const PS_RESERVED_SIZE: usize = 0x2000;
pub const PLAYGO_CHUNK_DAT_SIZE: usize = 0x4000;

/// One entry of the package body.
pub struct PkgEntry {
    pub id: EntryId,
    pub data: Vec<u8>,
    pub meta: MetaEntry,
}

impl PkgEntry {
    pub fn new(id: EntryId, data: Vec<u8>) -> Self {
        Self {
            id,
            data,
            meta: MetaEntry::default(),
        }
    }
}

/// The entry-keys blob: 32 reserved bytes, SHA-256 digests of the derived
/// keys 0..6, then the RSA-wrapped derived keys 1..7.
pub fn keys_entry(content_id: &str, passcode: &str) -> Vec<u8> {
    let keys: Vec<[u8; 32]> = (0..8).map(|i| compute_keys(content_id, passcode, i)).collect();
    let mut out = vec![0u8; 0x20];
    for key in &keys[..7] {
        out.extend_from_slice(&sha256(key));
    }
    for key in &keys[1..8] {
        let mut block = [0u8; 256];
        block[256 - 32..].copy_from_slice(key);
        out.extend_from_slice(&IMAGE_KEYSET.public_op(&block));
    }
    debug_assert_eq!(out.len(), KEYS_ENTRY_SIZE);
    out
}

/// EKPFS wrapped with the image keyset's public half.
pub fn image_key_entry(ekpfs: &[u8; 32]) -> Vec<u8> {
    let mut block = [0u8; 256];
    block[256 - 32..].copy_from_slice(ekpfs);
    IMAGE_KEYSET.public_op(&block).to_vec()
}

/// `license.dat`: version, content type, content id and the entitlement key
/// (zeroed for free content), padded to 0x400.
pub fn license_dat(content_id: &str, content_type: u32, entitlement: Option<[u8; 16]>) -> Vec<u8> {
    let mut out = vec![0u8; LICENSE_DAT_SIZE];
    BigEndian::write_u32(&mut out[0x00..], 1);
    BigEndian::write_u32(&mut out[0x04..], content_type);
    let id = content_id.as_bytes();
    out[0x08..0x08 + id.len().min(0x24)].copy_from_slice(&id[..id.len().min(0x24)]);
    if let Some(key) = entitlement {
        out[0x40..0x50].copy_from_slice(&key);
    }
    out
}

/// `license.info`: the plaintext license summary, padded to exactly 0x200.
pub fn license_info(content_id: &str, content_type: u32) -> Vec<u8> {
    let mut out = vec![0u8; LICENSE_INFO_SIZE];
    BigEndian::write_u32(&mut out[0x00..], 1);
    BigEndian::write_u32(&mut out[0x04..], content_type);
    let id = content_id.as_bytes();
    out[0x08..0x08 + id.len().min(0x24)].copy_from_slice(&id[..id.len().min(0x24)]);
    out
}

/// Synthesized `playgo-chunk.dat` used when the project stages none: one
/// chunk, one mchunk, one scenario.
pub fn default_playgo_chunk_dat() -> Vec<u8> {
    let mut out = vec![0u8; PLAYGO_CHUNK_DAT_SIZE];
    out[0x00..0x04].copy_from_slice(b"plgo");
    LittleEndian::write_u16(&mut out[0x04..], 3); // version major
    LittleEndian::write_u16(&mut out[0x06..], 0); // version minor
    LittleEndian::write_u32(&mut out[0x08..], PLAYGO_CHUNK_DAT_SIZE as u32);
    LittleEndian::write_u16(&mut out[0x0C..], 1); // chunk count
    LittleEndian::write_u16(&mut out[0x0E..], 1); // mchunk count
    LittleEndian::write_u16(&mut out[0x10..], 1); // scenario count
    out
}

/// Synthesized `playgo-manifest.xml` counterpart of
/// [`default_playgo_chunk_dat`].
pub fn default_playgo_manifest() -> Vec<u8> {
    concat!(
        "<?xml version=\"1.0\"?>\n",
        "<psproject fmt=\"playgo-manifest\" version=\"1000\">\n",
        "  <volume>\n",
        "    <chunk_info chunk_count=\"1\" scenario_count=\"1\">\n",
        "      <chunks>\n",
        "        <chunk id=\"0\" label=\"Chunk #0\"/>\n",
        "      </chunks>\n",
        "      <scenarios default_id=\"0\">\n",
        "        <scenario id=\"0\" type=\"sp\" initial_chunk_count=\"1\" ",
        "label=\"Scenario #0\">0</scenario>\n",
        "      </scenarios>\n",
        "    </chunk_info>\n",
        "  </volume>\n",
        "</psproject>\n",
    )
    .as_bytes()
    .to_vec()
}
