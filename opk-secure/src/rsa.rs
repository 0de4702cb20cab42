//! Raw RSA-2048, as the PKG container uses it.
//!
//! The format applies textbook modular exponentiation to fixed 0x100-byte
//! blocks: the image key entry is the public operation over EKPFS, and the
//! header signature is the private operation over the header digest. No
//! padding scheme is involved, so the operations here are deliberately raw.

use num_bigint::BigUint;

/// Size of one RSA-2048 block in bytes.
pub const RSA_BLOCK_SIZE: usize = 0x100;

/// An RSA-2048 keyset with CRT private components.
///
/// The byte arrays are big-endian, matching the on-disk layout of the
/// container's key blocks.
#[derive(Clone, Copy)]
pub struct RsaKeyset {
    pub n: &'static [u8; 256],
    pub e: u32,
    pub p: &'static [u8; 128],
    pub q: &'static [u8; 128],
    pub dp: &'static [u8; 128],
    pub dq: &'static [u8; 128],
    pub qinv: &'static [u8; 128],
}

impl RsaKeyset {
    /// Raw public operation: `m^e mod n`.
    ///
    /// `data` is interpreted as a big-endian integer and must not exceed the
    /// modulus; the result is left-padded to 256 bytes.
    pub fn public_op(&self, data: &[u8]) -> [u8; 256] {
        let n = BigUint::from_bytes_be(self.n);
        let m = BigUint::from_bytes_be(data);
        to_block(&m.modpow(&BigUint::from(self.e), &n))
    }

    /// Raw private operation `m^d mod n`, computed via the CRT components.
    pub fn private_op(&self, data: &[u8]) -> [u8; 256] {
        let p = BigUint::from_bytes_be(self.p);
        let q = BigUint::from_bytes_be(self.q);
        let dp = BigUint::from_bytes_be(self.dp);
        let dq = BigUint::from_bytes_be(self.dq);
        let qinv = BigUint::from_bytes_be(self.qinv);

        let m = BigUint::from_bytes_be(data);
        let m1 = m.modpow(&dp, &p);
        let m2 = m.modpow(&dq, &q);
        // h = qinv * (m1 - m2) mod p; add p before subtracting to stay
        // non-negative in unsigned arithmetic.
        let h = (qinv * (&p + &m1 - (&m2 % &p))) % &p;
        to_block(&(m2 + h * q))
    }

    /// Sign a 32-byte digest: left-pad it to one block and run the private
    /// operation.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> [u8; 256] {
        let mut block = [0u8; RSA_BLOCK_SIZE];
        block[RSA_BLOCK_SIZE - 32..].copy_from_slice(digest);
        self.private_op(&block)
    }

    /// Recover the padded digest block from a signature.
    pub fn recover(&self, sig: &[u8; 256]) -> [u8; 256] {
        self.public_op(sig)
    }
}

fn to_block(v: &BigUint) -> [u8; 256] {
    let bytes = v.to_bytes_be();
    let mut out = [0u8; RSA_BLOCK_SIZE];
    out[RSA_BLOCK_SIZE - bytes.len()..].copy_from_slice(&bytes);
    out
}
