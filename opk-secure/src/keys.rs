//! Key derivation for PFS images and the package container.
//!
//! Every derivation is a single pass of SHA-256 or HMAC-SHA256 over a small,
//! fixed layout, so identical projects produce identical keys (and therefore
//! identical output files).

use crate::hash::{hmac_sha256, sha256};
use crate::rsa::RsaKeyset;

/// Derivation index that yields EKPFS.
pub const EKPFS_INDEX: u32 = 1;

/// Derive one of the passcode keys.
///
/// The input block is `LE32(index) || content id (zero-padded to 48) ||
/// passcode (32)`; the key is its SHA-256.
pub fn compute_keys(content_id: &str, passcode: &str, index: u32) -> [u8; 32] {
    let mut buf = [0u8; 84];
    buf[0..4].copy_from_slice(&index.to_le_bytes());
    let id = content_id.as_bytes();
    let id_len = id.len().min(48);
    buf[4..4 + id_len].copy_from_slice(&id[..id_len]);
    let pc = passcode.as_bytes();
    let pc_len = pc.len().min(32);
    buf[52..52 + pc_len].copy_from_slice(&pc[..pc_len]);
    sha256(&buf)
}

/// Derive EKPFS from the project's content id and passcode.
pub fn ekpfs(content_id: &str, passcode: &str) -> [u8; 32] {
    compute_keys(content_id, passcode, EKPFS_INDEX)
}

fn index_seed(index: u32, seed: &[u8; 16]) -> [u8; 20] {
    let mut d = [0u8; 20];
    d[0..4].copy_from_slice(&index.to_le_bytes());
    d[4..20].copy_from_slice(seed);
    d
}

/// Derive the per-image HMAC signing key from EKPFS and the image seed.
pub fn pfs_gen_sign_key(ekpfs: &[u8; 32], seed: &[u8; 16]) -> [u8; 32] {
    hmac_sha256(ekpfs, &index_seed(2, seed))
}

/// Derive the XTS `(tweak, data)` key pair from EKPFS and the image seed.
///
/// `new_crypt` selects the second-generation derivation (a different index
/// into the same HMAC schedule), matching the bit-61 flag of `pfs_flags`.
pub fn pfs_gen_enc_keys(
    ekpfs: &[u8; 32],
    seed: &[u8; 16],
    new_crypt: bool,
) -> ([u8; 16], [u8; 16]) {
    let index = if new_crypt { 4 } else { 1 };
    let digest = hmac_sha256(ekpfs, &index_seed(index, seed));
    let mut tweak = [0u8; 16];
    let mut data = [0u8; 16];
    tweak.copy_from_slice(&digest[..16]);
    data.copy_from_slice(&digest[16..]);
    (tweak, data)
}

/// Keyset whose private half signs the package header.
pub static PKG_SIGN_KEYSET: RsaKeyset = RsaKeyset {
    n: &SIGN_N,
    e: 65537,
    p: &SIGN_P,
    q: &SIGN_Q,
    dp: &SIGN_DP,
    dq: &SIGN_DQ,
    qinv: &SIGN_QINV,
};

/// Keyset whose public half wraps EKPFS into the image key entry (and the
/// derived-key table of the entry-keys entry).
pub static IMAGE_KEYSET: RsaKeyset = RsaKeyset {
    n: &IMG_N,
    e: 65537,
    p: &IMG_P,
    q: &IMG_Q,
    dp: &IMG_DP,
    dq: &IMG_DQ,
    qinv: &IMG_QINV,
};

const SIGN_N: [u8; 256] = [
    0xCD, 0x86, 0x82, 0x1C, 0xBC, 0x73, 0x58, 0x95, 0x1B, 0x26, 0x9D, 0xCE, 0x4B, 0x88, 0x2A, 0x6F,
    0x30, 0x25, 0xBC, 0xB2, 0x6C, 0x22, 0xB2, 0xAC, 0xFC, 0x9F, 0x14, 0xA0, 0x8B, 0x87, 0xCA, 0x71,
    0x1D, 0x81, 0xBA, 0x56, 0x36, 0xEE, 0x4F, 0x59, 0xA8, 0x92, 0x72, 0x09, 0x3D, 0x49, 0x16, 0xF8,
    0xEA, 0x2E, 0xB1, 0x98, 0xCF, 0xD1, 0x73, 0x47, 0x80, 0x26, 0xF8, 0xE1, 0x05, 0xDB, 0x5D, 0x08,
    0x31, 0xF0, 0xE7, 0x71, 0x6D, 0x36, 0x94, 0xB9, 0xAA, 0x79, 0x23, 0x9A, 0x2A, 0xB6, 0xA6, 0xBD,
    0x94, 0xE5, 0x75, 0xA5, 0x4C, 0x5A, 0x90, 0x7D, 0x76, 0xB8, 0x80, 0x50, 0x1F, 0xCB, 0xC5, 0x06,
    0x22, 0xA2, 0xC4, 0x32, 0x9C, 0x5B, 0x6B, 0x03, 0x73, 0x37, 0xC1, 0xDB, 0x2F, 0xC3, 0x46, 0x6B,
    0xF7, 0xB8, 0xC0, 0x90, 0xF0, 0x02, 0x18, 0x7C, 0x67, 0x3A, 0x8A, 0xDD, 0x52, 0x88, 0xDA, 0x96,
    0xAC, 0x65, 0x5E, 0xBA, 0x16, 0x71, 0xDD, 0xF8, 0x54, 0xA2, 0xC0, 0x7C, 0xB9, 0x25, 0xA0, 0xDF,
    0x50, 0x86, 0x7E, 0xB6, 0xEC, 0x51, 0x97, 0x6A, 0x8A, 0xA3, 0x16, 0x7B, 0x55, 0x9A, 0x9D, 0x09,
    0x8D, 0x93, 0x86, 0x89, 0xF8, 0x37, 0x57, 0xE5, 0x61, 0x6F, 0x8F, 0x60, 0x8E, 0x58, 0xA9, 0xEE,
    0xC7, 0xA6, 0xEC, 0x23, 0x7B, 0xBC, 0xD5, 0xF0, 0xAA, 0xF6, 0x0E, 0xE7, 0xF7, 0x24, 0x07, 0x7D,
    0xCC, 0xE2, 0x25, 0x64, 0x12, 0xD3, 0x37, 0x9B, 0x55, 0x9E, 0xFC, 0xB8, 0x3A, 0x96, 0x6F, 0x21,
    0x15, 0x47, 0x47, 0x34, 0x3B, 0x1F, 0x50, 0x3B, 0xA4, 0xCE, 0x98, 0x38, 0x8D, 0xFD, 0x5F, 0x6F,
    0x2E, 0xFD, 0x9D, 0xB5, 0xA4, 0xA0, 0x6D, 0x85, 0x57, 0x5C, 0x1E, 0xFA, 0x4B, 0xB2, 0x30, 0xD1,
    0xE2, 0xEF, 0xED, 0x77, 0x5C, 0xE4, 0x00, 0xC6, 0x6D, 0xC9, 0x7A, 0xB2, 0xA3, 0xB5, 0x72, 0x43,
];

const SIGN_P: [u8; 128] = [
    0xF1, 0xF1, 0xCA, 0x30, 0x93, 0xD7, 0x15, 0x8E, 0xE3, 0x0C, 0xA0, 0x71, 0x67, 0xC9, 0xDE, 0x27,
    0xFD, 0x05, 0x08, 0x63, 0xA1, 0x2E, 0xE2, 0x23, 0x8D, 0xB6, 0xA4, 0x4F, 0xEF, 0x19, 0xC8, 0xB9,
    0x96, 0xF8, 0x1F, 0x13, 0xED, 0x26, 0xA5, 0xBE, 0xB0, 0xD7, 0x00, 0xB5, 0xF6, 0xED, 0x45, 0xC5,
    0x31, 0xB4, 0x77, 0xBB, 0x0E, 0x78, 0x1F, 0x5F, 0x3D, 0x19, 0x98, 0x43, 0xE9, 0x62, 0x72, 0xC7,
    0x87, 0x0B, 0x13, 0x70, 0x93, 0xAE, 0x44, 0xE5, 0x4B, 0x5F, 0x02, 0xCD, 0x15, 0x9F, 0xF2, 0xBF,
    0x2D, 0x5B, 0x15, 0xEA, 0xD5, 0xB2, 0x91, 0x61, 0x0E, 0x38, 0xA1, 0xB4, 0x6C, 0xA8, 0xF6, 0xD8,
    0x12, 0x76, 0xE4, 0x97, 0x8C, 0xAF, 0x8F, 0x53, 0x21, 0xC8, 0x63, 0x48, 0x60, 0x34, 0x8F, 0x70,
    0x9A, 0x5F, 0x8D, 0x47, 0x44, 0xA2, 0xB3, 0x6F, 0x22, 0xA4, 0x0F, 0xF7, 0x95, 0x3E, 0xFC, 0x07,
];

const SIGN_Q: [u8; 128] = [
    0xD9, 0x77, 0x17, 0xA0, 0xAB, 0xB1, 0xD4, 0x19, 0x25, 0x94, 0x66, 0x92, 0x6E, 0x5F, 0x9F, 0x45,
    0x4E, 0x73, 0xA5, 0xFB, 0xB7, 0x1D, 0xEC, 0xE6, 0xBE, 0xD1, 0x39, 0xAD, 0xBD, 0x44, 0x47, 0x9A,
    0x9C, 0xD0, 0x04, 0x38, 0x94, 0x3C, 0x19, 0x7B, 0xDE, 0x24, 0xFC, 0x2A, 0x27, 0x17, 0xD6, 0x75,
    0x08, 0x71, 0xDF, 0xF4, 0xAB, 0x9C, 0x22, 0x98, 0x80, 0x64, 0x7A, 0xB8, 0xB5, 0xAA, 0x17, 0x54,
    0xF4, 0x43, 0xF8, 0xF1, 0x3C, 0xCC, 0x16, 0x3D, 0xF0, 0x2A, 0x12, 0xB8, 0xB3, 0xE9, 0x0C, 0x65,
    0xC1, 0x76, 0x80, 0xCF, 0xA9, 0xC9, 0x84, 0x2F, 0xBA, 0xE4, 0x79, 0xA6, 0x58, 0x2A, 0x3A, 0x1B,
    0xC2, 0xEA, 0x6F, 0xCC, 0x0C, 0xDE, 0x7D, 0x7A, 0x05, 0xA0, 0x12, 0x6F, 0xA4, 0x3D, 0x3E, 0xC7,
    0x8C, 0x79, 0x28, 0x71, 0x25, 0x5D, 0x08, 0x3E, 0x1D, 0xAA, 0xAA, 0x73, 0x8F, 0x32, 0x00, 0xE5,
];

const SIGN_DP: [u8; 128] = [
    0xBF, 0x13, 0x83, 0xE9, 0x25, 0x79, 0x22, 0x2F, 0x7C, 0xA5, 0x46, 0x39, 0x0A, 0x0C, 0xE5, 0x84,
    0x93, 0x50, 0xDC, 0x35, 0x42, 0xE0, 0xB1, 0xFB, 0xFE, 0x39, 0x96, 0x3F, 0x02, 0xC8, 0x4C, 0x3C,
    0x36, 0x3C, 0xB2, 0xDE, 0x9B, 0xD6, 0x7F, 0xE3, 0xBF, 0xE9, 0xAD, 0x48, 0x08, 0x41, 0x8F, 0x6E,
    0x93, 0x38, 0xC1, 0xAE, 0x5B, 0x59, 0x06, 0xFD, 0xC2, 0x55, 0x6A, 0x69, 0x87, 0xF2, 0x16, 0x4F,
    0xFA, 0x19, 0x07, 0x3B, 0x4B, 0x86, 0xC0, 0x26, 0x8E, 0x85, 0xF4, 0xC2, 0x5F, 0x27, 0xB9, 0x20,
    0xBF, 0x03, 0x46, 0xA5, 0xF6, 0x2B, 0x56, 0xA1, 0x5E, 0x07, 0xDF, 0xBD, 0x8C, 0x6B, 0x4C, 0xB7,
    0x8C, 0xAD, 0x95, 0x0F, 0x13, 0x2E, 0xBB, 0x74, 0x9E, 0x23, 0x92, 0x35, 0x60, 0xB5, 0x61, 0xEB,
    0x3E, 0x1F, 0xE4, 0x85, 0xBA, 0x70, 0xFC, 0x60, 0xF2, 0xEC, 0xBB, 0x27, 0x7F, 0x19, 0x05, 0x15,
];

const SIGN_DQ: [u8; 128] = [
    0xAC, 0x7C, 0xA7, 0xC3, 0x0B, 0x2C, 0x5B, 0xBD, 0x2E, 0x6F, 0x8D, 0x04, 0x2C, 0x83, 0xB0, 0x02,
    0xFA, 0xFD, 0x03, 0xF4, 0xAA, 0x04, 0x14, 0x79, 0xD9, 0x74, 0x7E, 0xB9, 0x6D, 0xDC, 0x10, 0xA7,
    0x74, 0x26, 0x12, 0x93, 0x06, 0x10, 0xBD, 0x6D, 0xE0, 0x7F, 0x99, 0x7B, 0x9D, 0xD2, 0x6C, 0x8A,
    0x1B, 0x8E, 0xA7, 0x42, 0x9C, 0x33, 0x95, 0xC5, 0x3C, 0x61, 0x76, 0x6D, 0xB7, 0xBA, 0x18, 0x13,
    0x8C, 0x43, 0xB5, 0xDB, 0x32, 0x8B, 0xF6, 0x40, 0x5E, 0x94, 0x20, 0x91, 0x5C, 0x32, 0x47, 0x61,
    0x16, 0x98, 0x76, 0x07, 0x40, 0xF6, 0xD3, 0xE0, 0x3F, 0xEF, 0x25, 0x06, 0x69, 0xFB, 0xE4, 0x67,
    0x4C, 0xAD, 0x42, 0xCB, 0xA8, 0x91, 0x79, 0x19, 0x26, 0x09, 0x17, 0x56, 0x72, 0x01, 0x1A, 0x20,
    0x91, 0x2D, 0x30, 0x84, 0xBE, 0x4C, 0x12, 0x53, 0xA2, 0x98, 0x51, 0xE6, 0xA2, 0xF7, 0xD8, 0x79,
];

const SIGN_QINV: [u8; 128] = [
    0x07, 0x96, 0xFC, 0x37, 0x1B, 0x91, 0xC1, 0x92, 0x7E, 0x9B, 0xAD, 0x9C, 0x79, 0xBB, 0xCD, 0x6D,
    0x0B, 0x55, 0xFC, 0x6C, 0x60, 0x32, 0xB1, 0x10, 0x7B, 0xEF, 0x83, 0xC3, 0x1C, 0xCD, 0x0A, 0xB0,
    0x7D, 0xEA, 0x3D, 0xF3, 0x13, 0x8A, 0x3E, 0x5F, 0x21, 0x2B, 0x67, 0x50, 0x80, 0x7B, 0xB9, 0xA8,
    0xEE, 0x50, 0x60, 0x5D, 0xF4, 0xF0, 0xEC, 0xE8, 0x21, 0xA6, 0xB8, 0xA7, 0xFE, 0x3D, 0x9E, 0x58,
    0x87, 0x8F, 0xF2, 0xE2, 0xD6, 0x9C, 0xBF, 0xEA, 0x69, 0x6B, 0xA6, 0xFC, 0x65, 0x92, 0xDD, 0x1C,
    0x55, 0x98, 0x05, 0x6A, 0x5D, 0xAF, 0x10, 0x8D, 0xBA, 0x59, 0xDF, 0x0F, 0xB9, 0xAC, 0xD5, 0x88,
    0xC2, 0xA1, 0x85, 0x1B, 0xAB, 0x68, 0xD2, 0x03, 0x1D, 0xEF, 0xE6, 0x80, 0x20, 0x6A, 0x16, 0xBA,
    0xA7, 0x5F, 0x49, 0x79, 0x8D, 0x23, 0xF2, 0x7C, 0xB5, 0x0F, 0xC4, 0x1A, 0xB1, 0xC5, 0x56, 0x26,
];

const IMG_N: [u8; 256] = [
    0x87, 0x26, 0x08, 0xC1, 0xC9, 0x12, 0xE7, 0x7A, 0x24, 0xA1, 0x85, 0xC5, 0x00, 0xC6, 0xE5, 0xBC,
    0x13, 0xC0, 0xEB, 0x80, 0xFF, 0xA7, 0x72, 0x90, 0xB3, 0x50, 0x75, 0xBA, 0xF3, 0x3D, 0xE7, 0x29,
    0xAA, 0xAD, 0x3D, 0xFB, 0x79, 0xB8, 0x2E, 0xD4, 0xAC, 0xD9, 0xD1, 0x51, 0x52, 0x17, 0xBE, 0x14,
    0x22, 0xA4, 0xA3, 0x81, 0x54, 0xE4, 0xB7, 0xBC, 0x4F, 0x83, 0xA0, 0xD6, 0xE8, 0xA8, 0x59, 0x15,
    0x16, 0x36, 0xD4, 0xBD, 0x12, 0x86, 0x5D, 0xF2, 0x60, 0xAE, 0x8F, 0x9F, 0xE9, 0x00, 0xD2, 0x65,
    0x6E, 0x02, 0xF1, 0x54, 0x65, 0xCA, 0xA5, 0x48, 0xE2, 0x56, 0x34, 0x4C, 0x59, 0x81, 0xA2, 0x6A,
    0x83, 0xFF, 0x5C, 0x80, 0x45, 0x56, 0xFF, 0xB5, 0xA0, 0x6F, 0x3C, 0xEA, 0xBC, 0x25, 0x12, 0xAD,
    0xA8, 0x85, 0x4A, 0x0A, 0xD1, 0x63, 0x44, 0x28, 0xCF, 0x3D, 0xCD, 0x7A, 0x3E, 0xA4, 0x42, 0xB1,
    0x56, 0x99, 0x3A, 0x4E, 0x80, 0xB7, 0xF6, 0x5B, 0x9C, 0x20, 0xD8, 0xBD, 0x7A, 0x65, 0x35, 0x68,
    0xC9, 0xE9, 0xE5, 0x1E, 0xA0, 0x9B, 0xEC, 0xAF, 0x0A, 0x7B, 0xC7, 0xC8, 0xB5, 0x6C, 0x1D, 0xC5,
    0x1C, 0xA6, 0x08, 0x5C, 0xDA, 0x38, 0xA6, 0xE1, 0x13, 0xB9, 0x87, 0x47, 0xAE, 0xE7, 0xB4, 0x3F,
    0xD3, 0xA1, 0xBD, 0xA9, 0x24, 0x05, 0x7E, 0xD1, 0x47, 0xE8, 0xC3, 0xD7, 0x7D, 0xA7, 0x84, 0x47,
    0x82, 0xF2, 0x5D, 0xD2, 0x36, 0x2D, 0x24, 0x3D, 0x1C, 0xAB, 0x8D, 0xF6, 0x0F, 0x12, 0xBC, 0x5D,
    0x89, 0x25, 0xB5, 0x4E, 0xAC, 0x2E, 0x8C, 0x58, 0x6F, 0xF5, 0x4C, 0xBB, 0x44, 0xC8, 0x02, 0xE6,
    0x51, 0x36, 0x2F, 0x34, 0xFE, 0x2F, 0x4B, 0xE1, 0x7F, 0x6B, 0x1D, 0x54, 0x73, 0x2B, 0xBC, 0xC3,
    0x7A, 0x9A, 0x59, 0x97, 0x77, 0x7A, 0x5D, 0x3B, 0xA4, 0x00, 0x4F, 0x0A, 0x61, 0x88, 0xB7, 0xF1,
];

const IMG_P: [u8; 128] = [
    0xB5, 0x58, 0xE4, 0x9A, 0x51, 0x25, 0x55, 0x61, 0x21, 0x39, 0x0C, 0x5D, 0x9C, 0x46, 0xDC, 0x24,
    0x04, 0xD5, 0xDC, 0x18, 0x4E, 0x36, 0x48, 0xA2, 0xC0, 0x69, 0xB8, 0xD5, 0xB9, 0xE5, 0xC9, 0xD7,
    0x74, 0x50, 0x0E, 0xF6, 0x88, 0xCB, 0x19, 0x18, 0x12, 0x27, 0x9C, 0xF9, 0x0B, 0x43, 0x8D, 0x21,
    0x9E, 0xAD, 0x25, 0x0C, 0x82, 0xBB, 0xB5, 0x88, 0x3A, 0xBA, 0x3D, 0xEC, 0x92, 0x04, 0xEC, 0xEF,
    0x77, 0x13, 0xDA, 0x79, 0xD6, 0xCA, 0x13, 0x04, 0x8B, 0x37, 0x52, 0x42, 0x7F, 0x92, 0x1B, 0x01,
    0xE1, 0xAB, 0xBC, 0x6B, 0xA0, 0x0B, 0xD6, 0x9A, 0xFE, 0x0A, 0xF1, 0x2D, 0x7C, 0x0A, 0xC0, 0x1E,
    0xAA, 0x15, 0xBA, 0x0A, 0x6B, 0xA4, 0xE4, 0xCB, 0x9A, 0x07, 0x5D, 0x47, 0x42, 0x43, 0xAE, 0x4C,
    0x9C, 0x87, 0x27, 0x44, 0xF0, 0x6A, 0x35, 0xC6, 0xE8, 0x18, 0x32, 0x54, 0xA5, 0x4B, 0x56, 0x0D,
];

const IMG_Q: [u8; 128] = [
    0xBE, 0xC8, 0x89, 0xD6, 0xB1, 0x5C, 0xAF, 0xC5, 0x86, 0x09, 0xD4, 0x96, 0x1A, 0xF0, 0x2C, 0x5B,
    0x0C, 0x59, 0x24, 0x7B, 0x36, 0x13, 0x8C, 0xBE, 0x39, 0x92, 0x0B, 0xA0, 0x86, 0x8B, 0x13, 0x1B,
    0x6C, 0x51, 0xBC, 0x16, 0x03, 0x6A, 0xD7, 0x43, 0xEB, 0x14, 0x66, 0xE6, 0xD2, 0x01, 0xBA, 0x43,
    0xDD, 0x08, 0x66, 0x0D, 0x6D, 0xF6, 0x95, 0x0A, 0x8F, 0x83, 0x25, 0x12, 0x4B, 0xEA, 0x87, 0x3C,
    0x26, 0x55, 0x01, 0x0E, 0xEB, 0x00, 0x84, 0x9D, 0xEF, 0xD8, 0x25, 0x84, 0x13, 0xCD, 0xFD, 0xBB,
    0xED, 0x31, 0xC6, 0x5D, 0xD8, 0x5B, 0x93, 0xB0, 0xB7, 0xCA, 0x1E, 0x0E, 0xC9, 0x1C, 0x84, 0x84,
    0x5C, 0x0C, 0x81, 0xDA, 0x9C, 0xA8, 0xEC, 0x00, 0x3E, 0xAD, 0x83, 0x35, 0x81, 0x4F, 0x0F, 0x3F,
    0xEA, 0x4C, 0xB6, 0xC8, 0xE9, 0x8C, 0x90, 0xEB, 0xC0, 0x1B, 0xA2, 0xDF, 0x28, 0xEE, 0xF4, 0x75,
];

const IMG_DP: [u8; 128] = [
    0x1B, 0xAD, 0xE4, 0xBE, 0x95, 0x12, 0x20, 0xB5, 0x01, 0x90, 0x26, 0x8E, 0x07, 0x33, 0x5D, 0x98,
    0x75, 0xD0, 0x7A, 0x96, 0x8F, 0x21, 0x83, 0xF6, 0xAB, 0x6D, 0xB7, 0x93, 0x8F, 0x9B, 0x3E, 0x32,
    0x8F, 0x83, 0x44, 0xB5, 0x66, 0x6D, 0xB1, 0x77, 0xD6, 0x15, 0x8B, 0xC5, 0x0B, 0x6E, 0x15, 0x15,
    0x83, 0x95, 0xA3, 0xE9, 0x03, 0xEF, 0x48, 0xA6, 0xF1, 0x67, 0xC9, 0xD9, 0xD8, 0xF3, 0xBD, 0x82,
    0x53, 0x67, 0x89, 0x5A, 0x3D, 0x69, 0x7C, 0x7B, 0x9E, 0x10, 0x24, 0x93, 0x17, 0xCB, 0xA2, 0x29,
    0xA8, 0x5B, 0x41, 0x18, 0x20, 0x46, 0x8E, 0x4B, 0xFB, 0xE8, 0x89, 0xA5, 0x4A, 0xA0, 0x8D, 0x70,
    0x60, 0xBF, 0x8E, 0x34, 0xD6, 0xF7, 0x45, 0x20, 0xBA, 0x72, 0xD3, 0x4E, 0xF4, 0x13, 0x46, 0x80,
    0x55, 0x07, 0xDF, 0xFB, 0x8A, 0xC2, 0x7B, 0x50, 0xCF, 0xCE, 0x19, 0xA8, 0x87, 0xCE, 0x36, 0xE5,
];

const IMG_DQ: [u8; 128] = [
    0x4E, 0xBA, 0xE9, 0x0E, 0xFD, 0x10, 0x57, 0xC4, 0xF6, 0x84, 0x76, 0x03, 0x1F, 0xC8, 0xBF, 0x35,
    0x2F, 0x8A, 0x55, 0xE0, 0xB6, 0xB7, 0x28, 0x9C, 0x93, 0x9B, 0x6E, 0x4A, 0xE7, 0x5A, 0xDB, 0x1E,
    0xB4, 0xFB, 0xA1, 0xD7, 0x9F, 0xBF, 0x66, 0x68, 0x33, 0xC9, 0xAE, 0x91, 0x50, 0x56, 0xC0, 0x2C,
    0x23, 0x39, 0xC5, 0x0B, 0x83, 0xB6, 0x7F, 0x58, 0xE5, 0x52, 0x64, 0x69, 0x01, 0x85, 0x1E, 0x1B,
    0xB7, 0x61, 0xDA, 0xD6, 0xF2, 0x29, 0xBB, 0x90, 0x85, 0x9A, 0xB8, 0x18, 0xA2, 0x27, 0x9E, 0xAE,
    0xFF, 0xBA, 0x4B, 0xB7, 0x0C, 0x82, 0xF6, 0x16, 0xB6, 0x31, 0xA5, 0x67, 0xCA, 0x9C, 0x87, 0x1F,
    0x2B, 0xF1, 0x49, 0x61, 0x12, 0xC7, 0x2E, 0xE5, 0x06, 0xF8, 0x89, 0xAD, 0xF9, 0xD7, 0xCB, 0x5E,
    0x3F, 0xED, 0x3A, 0x7C, 0xFC, 0xCC, 0x32, 0x3D, 0xE7, 0x80, 0x40, 0x1D, 0x41, 0x82, 0x22, 0xC5,
];

const IMG_QINV: [u8; 128] = [
    0x53, 0x83, 0x38, 0xC1, 0xCB, 0x71, 0x6E, 0x5E, 0x85, 0xD7, 0x6F, 0xE5, 0x5D, 0x6E, 0x92, 0x51,
    0x0D, 0xF8, 0xC7, 0x48, 0xD6, 0x72, 0xFD, 0xDD, 0x44, 0x18, 0xB4, 0xDF, 0xEC, 0x9E, 0x65, 0x40,
    0x76, 0x41, 0xA8, 0xA5, 0x64, 0x0C, 0x5F, 0x9F, 0xEF, 0x51, 0x62, 0xF5, 0x08, 0x99, 0xA6, 0xAF,
    0xE3, 0xCE, 0xF5, 0x24, 0xFC, 0x06, 0xB5, 0xCE, 0xA5, 0x20, 0x3F, 0xF0, 0x6C, 0x0E, 0x8F, 0xFA,
    0xA6, 0x14, 0xDA, 0xD9, 0x88, 0xEE, 0x10, 0x9E, 0x23, 0x98, 0x62, 0xC0, 0xF1, 0x0A, 0x30, 0x18,
    0x17, 0x5D, 0x6D, 0x5A, 0x24, 0x61, 0x1D, 0xC0, 0xFA, 0x78, 0xAD, 0xDD, 0x19, 0x25, 0xB5, 0xCF,
    0xD0, 0xF9, 0x11, 0xA6, 0xC1, 0x4D, 0x43, 0x92, 0xAF, 0x27, 0x38, 0x16, 0x20, 0x45, 0x7A, 0xB9,
    0xC2, 0xFE, 0x52, 0xBF, 0xF5, 0x78, 0x5C, 0xFC, 0x44, 0xE3, 0x59, 0x72, 0x6E, 0x3D, 0x17, 0xAD,
];
