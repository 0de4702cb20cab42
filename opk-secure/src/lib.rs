//! Cryptographic primitives for PS4 package authoring.
//!
//! Everything the container formats need and nothing more:
//!
//! - SHA-256 and HMAC-SHA256 helpers ([`hash`])
//! - PFS key derivation: EKPFS, per-image sign key, XTS tweak/data keys
//!   ([`keys`])
//! - the AES-128-XTS sector transform used by encrypted PFS images ([`xts`])
//! - raw RSA-2048 (public op and CRT private op) for the image key and the
//!   package header signature ([`rsa`])
//!
//! All operations are deterministic; no randomness is drawn here.

pub mod hash;
pub mod keys;
pub mod rsa;
pub mod xts;

pub use hash::{hmac_sha256, sha256, sha256_iter, BlockSigner};
pub use keys::{compute_keys, ekpfs, pfs_gen_enc_keys, pfs_gen_sign_key};
pub use keys::{IMAGE_KEYSET, PKG_SIGN_KEYSET};
pub use rsa::RsaKeyset;
pub use xts::{XtsTransform, XTS_SECTOR_SIZE};

#[cfg(test)]
mod tests;
