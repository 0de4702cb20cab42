use opk_secure::{hmac_sha256, pfs_gen_enc_keys, pfs_gen_sign_key, XtsTransform};

use crate::builder::{PfsBuilder, PfsProperties, DEFAULT_BLOCK_SIZE};
use crate::error::PfsError;
use crate::header::PfsHeader;
use crate::inode::{render_dirents, Dirent, DirentType};
use crate::node::{FileData, FsTree};
use crate::path_table::{self, path_hash};
use crate::pfsc;

const BS: usize = DEFAULT_BLOCK_SIZE as usize;
const EKPFS: [u8; 32] = [0x5A; 32];
const SEED: [u8; 16] = [0xC3; 16];

fn signed_props() -> PfsProperties {
    PfsProperties {
        sign: true,
        encrypt: false,
        new_crypt: false,
        block_size: DEFAULT_BLOCK_SIZE,
        seed: SEED,
        min_blocks: 0,
        ekpfs: EKPFS,
        file_time: 1_700_000_000,
    }
}

fn build_image(props: PfsProperties, tree: FsTree) -> (PfsBuilder, Vec<u8>) {
    let builder = PfsBuilder::new(props, tree).unwrap();
    let mut image = vec![0u8; builder.image_size() as usize];
    builder.build(&mut image).unwrap();
    (builder, image)
}

fn single_file_tree() -> FsTree {
    let mut tree = FsTree::new();
    let payload: Vec<u8> = (0..100 * 1024).map(|i| (i % 253) as u8).collect();
    tree.add_file(FsTree::ROOT, "eboot.bin", FileData::Memory(payload), 100 * 1024);
    tree
}

/// Parse `(ino, type, name)` triples out of a rendered dirent stream.
fn parse_dirents(data: &[u8]) -> Vec<(u32, u32, String)> {
    let mut out = Vec::new();
    let mut off = 0;
    while off + 0x10 <= data.len() {
        let ino = u32::from_le_bytes(data[off..off + 4].try_into().unwrap());
        let dtype = u32::from_le_bytes(data[off + 4..off + 8].try_into().unwrap());
        let namelen = u32::from_le_bytes(data[off + 8..off + 12].try_into().unwrap()) as usize;
        let entsize = u32::from_le_bytes(data[off + 12..off + 16].try_into().unwrap()) as usize;
        if entsize == 0 {
            break;
        }
        let name = String::from_utf8(data[off + 16..off + 16 + namelen].to_vec()).unwrap();
        out.push((ino, dtype, name));
        off += entsize;
    }
    out
}

#[test]
fn dirent_records_pad_to_eight_bytes() {
    assert_eq!(Dirent::dot(1).entsize(), 0x18);
    assert_eq!(Dirent::new(5, DirentType::File, "12345678").entsize(), 0x18);
    assert_eq!(Dirent::new(5, DirentType::File, "123456789").entsize(), 0x20);
}

#[test]
fn dirent_stream_never_crosses_block_boundary() {
    // Two records of 0x28 bytes in 0x40-byte "blocks": the second would
    // straddle, so the first widens to the block end.
    let dirents = vec![
        Dirent::new(1, DirentType::File, "aaaaaaaaaaaaaaaaaaaaa"), // 0x28
        Dirent::new(2, DirentType::File, "bbbbbbbbbbbbbbbbbbbbb"),
    ];
    let data = render_dirents(&dirents, 0x40);
    assert_eq!(data.len(), 0x40 + 0x28);
    let first_entsize = u32::from_le_bytes(data[12..16].try_into().unwrap());
    assert_eq!(first_entsize, 0x40);
    let second_ino = u32::from_le_bytes(data[0x40..0x44].try_into().unwrap());
    assert_eq!(second_ino, 2);
}

#[test]
fn path_hash_folds_case() {
    assert_eq!(path_hash("/Ab.txt"), path_hash("/aB.txt"));
    assert_ne!(path_hash("/ab.txt"), path_hash("/ac.txt"));
}

#[test]
fn flat_path_table_resolves_collisions() {
    let paths = vec![
        ("/Ab.txt".to_string(), 4u32),
        ("/aB.txt".to_string(), 5u32),
        ("/other".to_string(), 3u32),
    ];
    let (fpt, cr) = path_table::build(&paths);
    assert!(fpt.has_collision());
    let cr = cr.expect("collision resolver");

    assert_eq!(fpt.lookup("/other", Some(&cr)), Some(3));
    assert_eq!(fpt.lookup("/Ab.txt", Some(&cr)), Some(4));
    assert_eq!(fpt.lookup("/aB.txt", Some(&cr)), Some(5));
    assert_eq!(fpt.lookup("/missing", Some(&cr)), None);
}

#[test]
fn from_dir_stages_files_and_honors_exclusions() {
    let dir = tempfile::tempdir().unwrap();
    let sce_sys = dir.path().join("sce_sys");
    std::fs::create_dir_all(&sce_sys).unwrap();
    std::fs::write(sce_sys.join("param.sfo"), b"not staged").unwrap();
    std::fs::write(sce_sys.join("keep.bin"), b"stays in the image").unwrap();
    std::fs::write(dir.path().join("eboot.bin"), vec![0x42u8; 16]).unwrap();

    let tree = FsTree::from_dir(dir.path(), &|path| path == "/sce_sys/param.sfo").unwrap();

    let eboot = tree.find("/eboot.bin").expect("staged");
    assert_eq!(tree.stored_size(eboot), 16);
    assert!(tree.find("/sce_sys/keep.bin").is_some());
    // Excluded files are carried as package entries instead.
    assert!(tree.find("/sce_sys/param.sfo").is_none());

    let mut payload = Vec::new();
    tree.write_payload(eboot, &mut payload).unwrap();
    assert_eq!(payload, vec![0x42u8; 16]);
}

#[test]
fn files_sort_shallow_last() {
    let mut tree = FsTree::new();
    let a = tree.add_dir(FsTree::ROOT, "a");
    let b = tree.add_dir(a, "b");
    tree.add_file(FsTree::ROOT, "x.txt", FileData::Memory(vec![1]), 1);
    let deep = tree.add_file(b, "c.txt", FileData::Memory(vec![2]), 1);

    let files = tree.files_sorted();
    assert_eq!(files[0], deep);
    assert_eq!(tree.full_path(files[0]), "/a/b/c.txt");
    assert_eq!(tree.full_path(files[1]), "/x.txt");
}

#[test]
fn plain_single_file_layout() {
    let (builder, image) = build_image(PfsProperties::plain(1_700_000_000), single_file_tree());

    // super-root, flat path table, uroot, eboot.bin
    assert_eq!(builder.inode_count(), 4);
    assert!(!builder.has_collision());

    let eboot = builder.inode_for_path("/eboot.bin").unwrap();
    assert_eq!(eboot.number, 3);
    assert_eq!(eboot.blocks, 2);
    assert_eq!(eboot.size, 100 * 1024);
    // Both data blocks sit in direct slots; the rest keep the -1 sentinel.
    assert_eq!(eboot.direct[1], eboot.direct[0] + 1);
    assert_eq!(eboot.direct[2], -1);
    assert_eq!(eboot.indirect[0], -1);

    // header + inode block + super-root + path table + empty + uroot + data
    assert_eq!(builder.header().ndblock, 8);
    assert_eq!(image.len(), 8 * BS);

    let parsed = PfsHeader::parse(&image).unwrap();
    assert_eq!(parsed.mode.bits(), builder.header().mode.bits());
    assert_eq!(parsed.block_size, DEFAULT_BLOCK_SIZE);
    assert_eq!(parsed.dinode_count, 4);
    assert_eq!(parsed.ndblock, 8);
    assert_eq!(parsed.dinode_block_count, 1);
    assert_eq!(parsed.superroot_ino, 0);

    // File payload lands at its start block.
    let start = eboot.start_block() as usize * BS;
    assert_eq!(&image[start..start + 4], &[0, 1, 2, 3]);
}

#[test]
fn signed_image_signatures_verify() {
    let (builder, image) = build_image(signed_props(), single_file_tree());
    let key = pfs_gen_sign_key(&EKPFS, &SEED);

    // super-root block + uroot block + two file blocks
    assert_eq!(builder.data_sigs().len(), 4);
    // header + inode block + path table block
    assert_eq!(builder.final_sigs().len(), 3);

    for sig in builder.data_sigs() {
        let start = sig.block as usize * BS;
        let expect = hmac_sha256(&key, &image[start..start + sig.size as usize]);
        let off = sig.sig_offset as usize;
        assert_eq!(&image[off..off + 32], &expect[..]);
        assert_eq!(
            u32::from_le_bytes(image[off + 32..off + 36].try_into().unwrap()),
            sig.block as u32
        );
    }

    for sig in builder.final_sigs() {
        let off = sig.sig_offset as usize;
        let start = sig.block as usize * BS;
        let mut covered = image[start..start + sig.size as usize].to_vec();
        if sig.block == 0 {
            // The header entry is hashed before its own slot is filled.
            let slot = off - start;
            covered[slot..slot + 36].fill(0);
        }
        let expect = hmac_sha256(&key, &covered);
        assert_eq!(&image[off..off + 32], &expect[..]);
    }
}

#[test]
fn encrypted_image_decrypts_back() {
    let (_, plain) = build_image(signed_props(), single_file_tree());

    let mut props = signed_props();
    props.encrypt = true;
    let (builder, encrypted) = build_image(props, single_file_tree());
    assert_eq!(plain.len(), encrypted.len());

    // The header block stays plaintext.
    assert_eq!(&encrypted[..BS], &plain[..BS]);

    // The empty block is a 16-sector plaintext hole.
    let empty = builder.empty_block().unwrap() as usize;
    assert!(encrypted[empty * BS..(empty + 1) * BS].iter().all(|&b| b == 0));

    // Everything else decrypts back to the unencrypted build.
    let (tweak, data) = pfs_gen_enc_keys(&EKPFS, &SEED, false);
    let xts = XtsTransform::new(&data, &tweak);
    let mut roundtrip = encrypted.clone();
    let empty_sectors = empty * 16..(empty + 1) * 16;
    for sector in 16..roundtrip.len() / 0x1000 {
        if empty_sectors.contains(&sector) {
            continue;
        }
        let buf = &mut roundtrip[sector * 0x1000..(sector + 1) * 0x1000];
        xts.decrypt_sector(buf, sector as u64);
    }
    assert_eq!(roundtrip, plain);
}

#[test]
fn crypt_variants_produce_different_ciphertext() {
    let mut props = signed_props();
    props.encrypt = true;
    let (_, old) = build_image(props.clone(), single_file_tree());

    props.new_crypt = true;
    let (_, new) = build_image(props, single_file_tree());

    let (t_old, d_old) = pfs_gen_enc_keys(&EKPFS, &SEED, false);
    let (t_new, d_new) = pfs_gen_enc_keys(&EKPFS, &SEED, true);
    assert_ne!((t_old, d_old), (t_new, d_new));

    // Same plaintext, different keys: sector 16 must differ.
    assert_ne!(&old[16 * 0x1000..17 * 0x1000], &new[16 * 0x1000..17 * 0x1000]);
}

#[test]
fn identical_inputs_build_identical_images() {
    let mut props = signed_props();
    props.encrypt = true;
    let (_, a) = build_image(props.clone(), single_file_tree());
    let (_, b) = build_image(props, single_file_tree());
    assert_eq!(a, b);
}

#[test]
fn collision_tree_gets_resolver_inode() {
    let mut tree = FsTree::new();
    tree.add_file(FsTree::ROOT, "Ab.txt", FileData::Memory(vec![1]), 1);
    tree.add_file(FsTree::ROOT, "aB.txt", FileData::Memory(vec![2]), 1);
    let (builder, image) = build_image(PfsProperties::plain(0), tree);

    assert!(builder.has_collision());
    // 0 super-root, 1 path table, 2 resolver, 3 uroot, 4 and 5 the files.
    assert_eq!(builder.inode_count(), 6);
    assert_eq!(builder.tree().node(FsTree::ROOT).inode, Some(3));

    let sr_off = (builder.header().dinode_block_count as usize + 1) * BS;
    let dirents = parse_dirents(&image[sr_off..sr_off + 0x100]);
    let names: Vec<&str> = dirents.iter().map(|(_, _, n)| n.as_str()).collect();
    assert_eq!(names, ["flat_path_table", "collision_resolver", "uroot"]);
    assert_eq!(dirents[1].0, 2);
    assert_eq!(dirents[2].0, 3);
    assert_eq!(dirents[2].1, DirentType::Directory as u32);
}

#[test]
fn gigabyte_file_uses_double_indirection() {
    let mut tree = FsTree::new();
    tree.add_file(
        FsTree::ROOT,
        "big.bin",
        FileData::Writer(Box::new(|_| Ok(()))),
        1 << 30,
    );
    // Layout only; the writer callback is never invoked.
    let builder = PfsBuilder::new(signed_props(), tree).unwrap();

    let big = builder.inode_for_path("/big.bin").unwrap();
    assert_eq!(big.blocks, 16384);
    assert!(big.indirect[0] > 0);
    assert!(big.indirect[1] > 0);

    // 16384 file blocks plus the super-root and uroot dirent blocks.
    assert_eq!(builder.data_sigs().len(), 16384 + 2);
    // header + inode block + path table + 1 single-indirect +
    // 1 doubly-indirect + ceil((16384 - 12 - 1820) / 1820) = 8 second-level.
    assert_eq!(builder.final_sigs().len(), 3 + 2 + 8);
}

#[test]
fn oversized_file_is_rejected() {
    let blocks = 12u64 + 1820 + 1820 * 1820 + 1;
    let mut tree = FsTree::new();
    tree.add_file(
        FsTree::ROOT,
        "huge.bin",
        FileData::Writer(Box::new(|_| Ok(()))),
        blocks * BS as u64,
    );
    match PfsBuilder::new(signed_props(), tree) {
        Err(PfsError::LayoutOverflow { .. }) => {}
        other => panic!("expected layout overflow, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn min_blocks_pads_the_image() {
    let mut props = PfsProperties::plain(0);
    props.min_blocks = 64;
    let (builder, image) = build_image(props, single_file_tree());
    assert_eq!(builder.header().ndblock, 64);
    assert_eq!(image.len(), 64 * BS);
}

#[test]
fn pfsc_blocks_roundtrip() {
    // One compressible block, one partial block of high-entropy-ish bytes.
    let mut image = vec![0x41u8; pfsc::PFSC_BLOCK_SIZE];
    let mut state = 0x12345678u32;
    for _ in 0..1000 {
        state = state.wrapping_mul(1664525).wrapping_add(1013904223);
        image.extend_from_slice(&state.to_le_bytes());
    }

    let packed = pfsc::compress(&image).unwrap();
    assert_eq!(&packed[..4], b"PFSC");
    // The constant block shrinks, so the container beats raw storage.
    assert!(packed.len() < image.len() + 0x20000);

    let b0 = pfsc::read_block(&packed, 0).unwrap();
    let b1 = pfsc::read_block(&packed, 1).unwrap();
    assert_eq!(b0, &image[..pfsc::PFSC_BLOCK_SIZE]);
    assert_eq!(b1, &image[pfsc::PFSC_BLOCK_SIZE..]);
}
