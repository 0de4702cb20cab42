use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use opk_secure::{sha256, PKG_SIGN_KEYSET};

use crate::sfo::Sfo;
use crate::structs::{
    content_type, EntryId, MetaEntry, PkgHeader, PFS_FLAGS_NEW_CRYPT, PFS_FLAGS_OLD_CRYPT,
};
use crate::{PkgBuilder, PkgError, PkgProject, VolumeType};

const CONTENT_ID: &str = "UP9000-CUSA00001_00-PKGRSTESTPKG0000";
const PASSCODE: &str = "00000000000000000000000000000000";

fn make_sfo() -> Vec<u8> {
    let mut sfo = Sfo::new();
    sfo.set_str("APP_VER", "01.00", 8);
    sfo.set_str("CATEGORY", "gd", 4);
    sfo.set_str("CONTENT_ID", CONTENT_ID, 48);
    sfo.set_str("TITLE", "Example Title", 128);
    sfo.set_str("TITLE_ID", "CUSA00001", 12);
    sfo.set_int("SYSTEM_VER", 0);
    sfo.serialize()
}

fn stage_project(dir: &Path, with_eboot: bool) {
    let sce_sys = dir.join("sce_sys");
    fs::create_dir_all(&sce_sys).unwrap();
    fs::write(sce_sys.join("param.sfo"), make_sfo()).unwrap();
    fs::write(sce_sys.join("icon0.png"), b"\x89PNG not really").unwrap();
    if with_eboot {
        let payload: Vec<u8> = (0..100 * 1024).map(|i| (i % 251) as u8).collect();
        fs::write(dir.join("eboot.bin"), payload).unwrap();
    }
}

fn project(volume_type: VolumeType, root: &Path) -> PkgProject {
    let mut p = PkgProject::new(volume_type, CONTENT_ID, PASSCODE, root);
    p.creation_date = NaiveDate::from_ymd_opt(2026, 8, 2);
    p.pfs.seed = Some([0x11; 16]);
    p.pfs.file_time = 1_700_000_000;
    p
}

fn parse_metas(pkg: &[u8], header: &PkgHeader) -> Vec<MetaEntry> {
    let table = header.entry_table_offset as usize;
    (0..header.entry_count as usize)
        .map(|i| MetaEntry::parse(&pkg[table + i * MetaEntry::SIZE..]))
        .collect()
}

fn entry<'a>(pkg: &'a [u8], metas: &[MetaEntry], id: EntryId) -> &'a [u8] {
    let m = metas.iter().find(|m| m.id == id as u32).expect("entry");
    &pkg[m.data_offset as usize..(m.data_offset + m.data_size) as usize]
}

#[test]
fn sfo_roundtrip_and_patch() {
    let bytes = make_sfo();
    let mut sfo = Sfo::parse(&bytes).unwrap();
    assert_eq!(sfo.get_str("TITLE"), Some("Example Title"));
    assert_eq!(sfo.get_str("CATEGORY"), Some("gd"));
    assert_eq!(sfo.get_int("SYSTEM_VER"), Some(0));

    sfo.set_str("PUBTOOLINFO", "c_date=20260802", 0x200);
    sfo.set_int("PUBTOOLVER", 0x0289_0000);
    let patched = Sfo::parse(&sfo.serialize()).unwrap();
    assert_eq!(patched.get_str("PUBTOOLINFO"), Some("c_date=20260802"));
    assert_eq!(patched.get_int("PUBTOOLVER"), Some(0x0289_0000));
    assert_eq!(patched.get_str("TITLE"), Some("Example Title"));

    // The index stays sorted by key.
    let keys: Vec<&str> = patched.entries().iter().map(|e| e.key.as_str()).collect();
    let mut sorted = keys.clone();
    sorted.sort_unstable();
    assert_eq!(keys, sorted);
}

#[test]
fn header_serialization_roundtrips() {
    let header = PkgHeader {
        flags: 0x8000_0000,
        pkg_file_count: 11,
        entry_count: 11,
        sc_entry_count: 5,
        entry_table_offset: 0x2A80,
        main_ent_data_size: 0xD00,
        body_offset: 0x2000,
        body_size: 0x7E000,
        content_offset: 0x2C40,
        content_size: 0x7D3C0,
        content_id: CONTENT_ID.to_string(),
        drm_type: 0xF,
        content_type: content_type::GD,
        content_flags: 0x0200_0000,
        version_date: 20260802,
        sc_entries1_hash: [1; 32],
        sc_entries2_hash: [2; 32],
        digest_table_hash: [3; 32],
        body_digest: [4; 32],
        pfs_image_count: 1,
        pfs_flags: PFS_FLAGS_OLD_CRYPT,
        pfs_image_offset: 0x80000,
        pfs_image_size: 0x80000,
        mount_image_size: 0x100000,
        package_size: 0x100000,
        pfs_signed_size: 0x10000,
        pfs_cache_size: 0xD0000,
        pfs_image_digest: [5; 32],
        pfs_signed_digest: [6; 32],
        ..PkgHeader::default()
    };
    let mut buf = vec![0u8; 0x1000];
    header.write_to(&mut buf);
    assert_eq!(PkgHeader::parse(&buf).unwrap(), header);
}

#[test]
fn rejects_invalid_projects() {
    let p = PkgProject::new(VolumeType::Ps4App, "TOO-SHORT", PASSCODE, "/tmp");
    assert!(matches!(
        PkgBuilder::new(p),
        Err(PkgError::InvalidProject(_))
    ));

    let p = PkgProject::new(VolumeType::Ps4App, CONTENT_ID, "short", "/tmp");
    assert!(matches!(
        PkgBuilder::new(p),
        Err(PkgError::InvalidProject(_))
    ));
}

#[test]
fn missing_param_sfo_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    let p = project(VolumeType::Ps4AcNodata, dir.path());
    let err = PkgBuilder::new(p)
        .unwrap()
        .write_stream(Vec::new(), None)
        .unwrap_err();
    assert!(matches!(err, PkgError::MissingRequiredFile(_)));
}

#[test]
fn tiny_al_package() {
    let dir = tempfile::tempdir().unwrap();
    stage_project(dir.path(), false);

    let mut out = Vec::new();
    let pkg = PkgBuilder::new(project(VolumeType::Ps4AcNodata, dir.path()))
        .unwrap()
        .write_stream(&mut out, None)
        .unwrap();

    let header = PkgHeader::parse(&out).unwrap();
    assert_eq!(header, pkg.header);
    assert_eq!(header.content_type, content_type::AL);
    assert_eq!(header.content_id, CONTENT_ID);
    assert_eq!(header.version_date, 20260802);
    assert_eq!(header.pfs_image_size, 0);
    assert_eq!(header.pfs_image_count, 0);
    assert_eq!(
        header.package_size,
        header.body_offset + header.body_size
    );
    assert_eq!(out.len() as u64, header.package_size);

    // Entry table and digest checks.
    let metas = parse_metas(&out, &header);
    assert_eq!(metas.len() as u32, header.entry_count);
    let metas_meta = metas
        .iter()
        .find(|m| m.id == EntryId::Metas as u32)
        .unwrap();
    assert_eq!(metas_meta.data_size as usize, metas.len() * MetaEntry::SIZE);
    assert!(metas.iter().any(|m| m.id == EntryId::Icon0Png as u32));

    let digests = entry(&out, &metas, EntryId::Digests);
    let digests_index = metas
        .iter()
        .position(|m| m.id == EntryId::Digests as u32)
        .unwrap();
    for (i, m) in metas.iter().enumerate().skip(1) {
        if i == digests_index {
            continue;
        }
        let body = &out[m.data_offset as usize..(m.data_offset + m.data_size) as usize];
        assert_eq!(&digests[i * 32..(i + 1) * 32], &sha256(body)[..], "entry {i}");
    }

    // SC hash 1 covers exactly the promised byte span.
    let sc_len: u32 = metas[..5].iter().map(|m| m.data_size).sum();
    assert_eq!(sc_len, header.main_ent_data_size);

    // Header digest and RSA signature.
    assert_eq!(&out[0xFE0..0x1000], &sha256(&out[..0xFE0])[..]);
    let sig: [u8; 256] = out[0x1000..0x1100].try_into().unwrap();
    let recovered = PKG_SIGN_KEYSET.recover(&sig);
    assert_eq!(&recovered[256 - 32..], &sha256(&out[..0x1000])[..]);
}

#[test]
fn single_file_gd_package() {
    let dir = tempfile::tempdir().unwrap();
    stage_project(dir.path(), true);

    let mut out = Vec::new();
    let pkg = PkgBuilder::new(project(VolumeType::Ps4App, dir.path()))
        .unwrap()
        .write_stream(&mut out, None)
        .unwrap();
    let header = PkgHeader::parse(&out).unwrap();
    assert_eq!(header, pkg.header);

    assert_eq!(header.content_type, content_type::GD);
    assert_eq!(header.pfs_flags, PFS_FLAGS_OLD_CRYPT);
    assert_eq!(header.pfs_image_offset, 0x80000);
    assert_eq!(header.pfs_signed_size, 0x10000);
    assert_eq!(header.pfs_cache_size, 0xD0000);
    assert_eq!(out.len() as u64, header.package_size);
    assert_eq!(
        header.package_size,
        header.body_offset + header.body_size + header.pfs_image_size
    );

    // PFS digests recompute from the file.
    let a = header.pfs_image_offset as usize;
    assert_eq!(
        header.pfs_signed_digest,
        sha256(&out[a..a + header.pfs_signed_size as usize])
    );
    assert_eq!(
        header.pfs_image_digest,
        sha256(&out[a..a + header.pfs_image_size as usize])
    );

    // PlayGo entries: the chunk table was sized off the body estimate and
    // each slot is a truncated chunk digest.
    let metas = parse_metas(&out, &header);
    let chunk_dat = entry(&out, &metas, EntryId::PlaygoChunkDat);
    assert_eq!(&chunk_dat[..4], b"plgo");

    let estimate = 0x2000 + 0x7E000 + header.pfs_image_size;
    let sha_meta = metas
        .iter()
        .find(|m| m.id == EntryId::PlaygoChunkSha as u32)
        .unwrap();
    assert_eq!(u64::from(sha_meta.data_size), estimate / 0x10000 * 4);

    let chunk_sha = entry(&out, &metas, EntryId::PlaygoChunkSha);
    let first_chunk = header.pfs_image_offset as usize / 0x10000;
    let expected = sha256(&out[first_chunk * 0x10000..(first_chunk + 1) * 0x10000]);
    assert_eq!(
        &chunk_sha[first_chunk * 4..first_chunk * 4 + 4],
        &expected[..4]
    );
    // Slots ahead of the image stay zero.
    assert!(chunk_sha[..first_chunk * 4].iter().all(|&b| b == 0));

    // param.sfo was patched in place.
    let sfo = Sfo::parse(entry(&out, &metas, EntryId::ParamSfo)).unwrap();
    assert_eq!(sfo.get_int("PUBTOOLVER"), Some(0x0289_0000));
    let info = sfo.get_str("PUBTOOLINFO").unwrap();
    assert!(info.contains("c_date=20260802"), "{info}");
    assert!(info.contains("img0_l0_size="), "{info}");
    assert!(info.contains("img0_sc_ksize=512"), "{info}");

    // Identical projects build identical bytes.
    let mut again = Vec::new();
    PkgBuilder::new(project(VolumeType::Ps4App, dir.path()))
        .unwrap()
        .write_stream(&mut again, None)
        .unwrap();
    assert_eq!(out, again);
}

#[test]
fn new_crypt_flips_bit_61_and_ciphertext() {
    let dir = tempfile::tempdir().unwrap();
    stage_project(dir.path(), true);

    let mut old = Vec::new();
    PkgBuilder::new(project(VolumeType::Ps4App, dir.path()))
        .unwrap()
        .write_stream(&mut old, None)
        .unwrap();

    let mut p = project(VolumeType::Ps4App, dir.path());
    p.pfs.new_crypt = true;
    let mut new = Vec::new();
    PkgBuilder::new(p).unwrap().write_stream(&mut new, None).unwrap();

    let h_old = PkgHeader::parse(&old).unwrap();
    let h_new = PkgHeader::parse(&new).unwrap();
    assert_eq!(h_old.pfs_flags, PFS_FLAGS_OLD_CRYPT);
    assert_eq!(h_new.pfs_flags, PFS_FLAGS_NEW_CRYPT);
    assert_eq!(h_old.pfs_flags ^ h_new.pfs_flags, 1 << 61);

    // Same plaintext image, different XTS keys.
    let s = h_old.pfs_image_offset as usize + 16 * 0x1000;
    assert_ne!(&old[s..s + 0x1000], &new[s..s + 0x1000]);
}

#[test]
fn mapped_and_stream_outputs_match() {
    let dir = tempfile::tempdir().unwrap();
    stage_project(dir.path(), false);

    let mut streamed = Vec::new();
    PkgBuilder::new(project(VolumeType::Ps4AcNodata, dir.path()))
        .unwrap()
        .write_stream(&mut streamed, None)
        .unwrap();

    let out_path = dir.path().join("out.pkg");
    let mut events = Vec::new();
    let mut log = |e: crate::Event| events.push(e);
    PkgBuilder::new(project(VolumeType::Ps4AcNodata, dir.path()))
        .unwrap()
        .write(&out_path, Some(&mut log))
        .unwrap();

    assert_eq!(fs::read(&out_path).unwrap(), streamed);
    assert!(!events.is_empty());
}
