//! SHA-256 and HMAC-SHA256 helpers.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

/// HMAC-SHA256 state, re-exported for callers that key once and sign many
/// blocks (the parallel PFS signing workers).
pub type HmacSha256 = Hmac<Sha256>;

/// SHA-256 of a byte slice.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(data);
    h.finalize().into()
}

/// SHA-256 over a sequence of fragments, without concatenating them first.
pub fn sha256_iter<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> [u8; 32] {
    let mut h = Sha256::new();
    for part in parts {
        h.update(part);
    }
    h.finalize().into()
}

/// One-shot HMAC-SHA256.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    // HMAC accepts keys of any length; new_from_slice cannot fail.
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC key");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// Keyed HMAC state for signing many blocks with one key.
///
/// Each parallel signing worker owns one of these; keying happens once and
/// the state is reset between blocks.
pub struct BlockSigner {
    mac: HmacSha256,
}

impl BlockSigner {
    pub fn new(key: &[u8]) -> Self {
        Self {
            mac: HmacSha256::new_from_slice(key).expect("HMAC key"),
        }
    }

    /// HMAC one block, leaving the signer ready for the next.
    pub fn sign(&mut self, data: &[u8]) -> [u8; 32] {
        self.mac.update(data);
        self.mac.finalize_reset().into_bytes().into()
    }
}
