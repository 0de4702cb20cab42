use crate::hash::{hmac_sha256, sha256};
use crate::keys::{compute_keys, ekpfs, pfs_gen_enc_keys, pfs_gen_sign_key};
use crate::keys::{IMAGE_KEYSET, PKG_SIGN_KEYSET};
use crate::xts::XtsTransform;

const CONTENT_ID: &str = "UP9000-TEST00001_00-0000111122223333";
const PASSCODE: &str = "00000000000000000000000000000000";

#[test]
fn sha256_known_vector() {
    assert_eq!(
        sha256(b"abc"),
        [
            0xBA, 0x78, 0x16, 0xBF, 0x8F, 0x01, 0xCF, 0xEA, 0x41, 0x41, 0x40, 0xDE, 0x5D, 0xAE,
            0x22, 0x23, 0xB0, 0x03, 0x61, 0xA3, 0x96, 0x17, 0x7A, 0x9C, 0xB4, 0x10, 0xFF, 0x61,
            0xF2, 0x00, 0x15, 0xAD,
        ]
    );
}

#[test]
fn hmac_sha256_known_vector() {
    // RFC 4231 test case 2.
    assert_eq!(
        hmac_sha256(b"Jefe", b"what do ya want for nothing?"),
        [
            0x5B, 0xDC, 0xC1, 0x46, 0xBF, 0x60, 0x75, 0x4E, 0x6A, 0x04, 0x24, 0x26, 0x08, 0x95,
            0x75, 0xC7, 0x5A, 0x00, 0x3F, 0x08, 0x9D, 0x27, 0x39, 0x83, 0x9D, 0xEC, 0x58, 0xB9,
            0x64, 0xEC, 0x38, 0x43,
        ]
    );
}

#[test]
fn passcode_keys_are_index_sensitive() {
    let k0 = compute_keys(CONTENT_ID, PASSCODE, 0);
    let k1 = compute_keys(CONTENT_ID, PASSCODE, 1);
    assert_ne!(k0, k1);
    assert_eq!(k1, ekpfs(CONTENT_ID, PASSCODE));
    // Deterministic across calls.
    assert_eq!(k1, compute_keys(CONTENT_ID, PASSCODE, 1));
}

#[test]
fn enc_key_variants_differ() {
    let ek = ekpfs(CONTENT_ID, PASSCODE);
    let seed = [7u8; 16];
    let (tweak_old, data_old) = pfs_gen_enc_keys(&ek, &seed, false);
    let (tweak_new, data_new) = pfs_gen_enc_keys(&ek, &seed, true);
    assert_ne!((tweak_old, data_old), (tweak_new, data_new));

    // The sign key comes from its own slot of the schedule.
    let sign = pfs_gen_sign_key(&ek, &seed);
    assert_ne!(&sign[..16], &tweak_old[..]);
    assert_ne!(&sign[..16], &tweak_new[..]);
}

#[test]
fn xts_sector_roundtrip() {
    let xts = XtsTransform::new(&[0x11; 16], &[0x22; 16]);
    let plain: Vec<u8> = (0..0x1000).map(|i| (i % 251) as u8).collect();

    let mut sector = plain.clone();
    xts.encrypt_sector(&mut sector, 16);
    assert_ne!(sector, plain);

    // A different tweak yields different ciphertext.
    let mut other = plain.clone();
    xts.encrypt_sector(&mut other, 17);
    assert_ne!(sector, other);

    xts.decrypt_sector(&mut sector, 16);
    assert_eq!(sector, plain);
}

#[test]
fn header_signature_recovers_digest() {
    let digest = sha256(b"package header bytes");
    let sig = PKG_SIGN_KEYSET.sign_digest(&digest);
    let block = PKG_SIGN_KEYSET.recover(&sig);
    assert_eq!(&block[..256 - 32], &[0u8; 224][..]);
    assert_eq!(&block[256 - 32..], &digest[..]);
}

#[test]
fn image_key_wrap_roundtrip() {
    let ek = ekpfs(CONTENT_ID, PASSCODE);
    let mut block = [0u8; 256];
    block[256 - 32..].copy_from_slice(&ek);

    let wrapped = IMAGE_KEYSET.public_op(&block);
    assert_ne!(&wrapped[..], &block[..]);

    let unwrapped = IMAGE_KEYSET.private_op(&wrapped);
    assert_eq!(&unwrapped[..], &block[..]);
}
