//! AES-128-XTS sector transform.
//!
//! Encrypted PFS images are transformed in 4 KiB sectors with the sector
//! index as the tweak; sector 0 starts at the beginning of the image.

use aes::Aes128;
use cipher::KeyInit;
use xts_mode::{get_tweak_default, Xts128};

/// XTS sector size used by PFS images.
pub const XTS_SECTOR_SIZE: usize = 0x1000;

/// A reusable XTS transformer; the parallel encryption workers construct one
/// per thread.
pub struct XtsTransform {
    xts: Xts128<Aes128>,
}

impl XtsTransform {
    pub fn new(data_key: &[u8; 16], tweak_key: &[u8; 16]) -> Self {
        let cipher_1 = Aes128::new(data_key.into());
        let cipher_2 = Aes128::new(tweak_key.into());
        Self {
            xts: Xts128::new(cipher_1, cipher_2),
        }
    }

    /// Encrypt one sector in place.
    pub fn encrypt_sector(&self, sector: &mut [u8], index: u64) {
        self.xts
            .encrypt_sector(sector, get_tweak_default(u128::from(index)));
    }

    /// Decrypt one sector in place.
    pub fn decrypt_sector(&self, sector: &mut [u8], index: u64) {
        self.xts
            .decrypt_sector(sector, get_tweak_default(u128::from(index)));
    }
}
