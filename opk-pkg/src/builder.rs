//! PKG build orchestrator.
//!
//! The build runs in two halves. The planning pass computes everything
//! whose size gates a later offset: the inner PFS image (built and wrapped
//! in PFSC), the outer PFS layout, the entry list and the header fields.
//! The write pass then puts the planned bytes into the output buffer and
//! runs the digest cascade, whose step order is load-bearing:
//! PFS digests, chunk hashes and the body must exist before the entry
//! digests, which must exist before the body digest and SC hashes, which
//! must exist before the header digest and the RSA signature.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::thread;

use chrono::{DateTime, Datelike, Utc};
use memmap2::MmapMut;
use opk_pfs::{pfsc, FileData, FsTree, PfsBuilder, PfsProperties};
use opk_secure::{ekpfs as derive_ekpfs, sha256, sha256_iter, PKG_SIGN_KEYSET};
use rand::RngCore;

use crate::entries::{
    default_playgo_chunk_dat, default_playgo_manifest, image_key_entry, keys_entry, license_dat,
    license_info, PkgEntry, GENERAL_DIGESTS_SIZE, PS_RESERVED_SIZE,
};
use crate::error::{PkgError, Result};
use crate::project::PkgProject;
use crate::sfo::Sfo;
use crate::structs::{
    drm_type, entry_flags1, entry_flags2, EntryId, MetaEntry, PkgHeader, PFS_CACHE_SIZE,
    PFS_FLAGS_NEW_CRYPT, PFS_FLAGS_OLD_CRYPT, PFS_SIGNED_SIZE, PKG_BODY_OFFSET, PKG_ENTRY_ALIGN,
    PKG_HEADER_DIGEST_OFFSET, PKG_HEADER_SIZE, PKG_PFS_ALIGN, PKG_SIGNATURE_SIZE,
};
use crate::structs::content_flags;

/// Chunk granularity of the PlayGo hash table.
const CHUNK_SIZE: usize = 0x10000;
/// Worker cap for chunk hashing, matching the PFS stages.
const MAX_WORKERS: usize = 10;
/// Initial body-size guess used before the entry layout is known.
const BODY_SIZE_ESTIMATE: u64 = 0x7E000;

/// Progress event delivered to the optional build callback.
pub enum Event {
    Message(String),
    Progress(u8),
}

struct Logger<'a>(Option<&'a mut dyn FnMut(Event)>);

impl Logger<'_> {
    fn msg(&mut self, m: impl Into<String>) {
        if let Some(f) = self.0.as_mut() {
            f(Event::Message(m.into()));
        }
    }

    fn pct(&mut self, p: u8) {
        if let Some(f) = self.0.as_mut() {
            f(Event::Progress(p));
        }
    }
}

/// Descriptor of a finished package.
#[derive(Debug)]
pub struct Pkg {
    pub header: PkgHeader,
    pub entries: Vec<MetaEntry>,
}

struct BuildPlan {
    header: PkgHeader,
    entries: Vec<PkgEntry>,
    outer_pfs: Option<PfsBuilder>,
    total_size: u64,
    digests_index: usize,
    chunk_sha_index: Option<usize>,
}

pub struct PkgBuilder {
    project: PkgProject,
}

impl PkgBuilder {
    pub fn new(project: PkgProject) -> Result<Self> {
        project.validate()?;
        Ok(Self { project })
    }

    /// Build the package into a memory-mapped file at `path`.
    pub fn write<P: AsRef<Path>>(
        &self,
        path: P,
        log: Option<&mut dyn FnMut(Event)>,
    ) -> Result<Pkg> {
        let mut log = Logger(log);
        let mut plan = self.plan(&mut log)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(plan.total_size)?;
        let mut map = unsafe { MmapMut::map_mut(&file)? };
        let pkg = self.build_into(&mut plan, &mut map[..], &mut log, true)?;
        map.flush()?;
        Ok(pkg)
    }

    /// Build the package in memory and copy it to `out`. The bytes are
    /// identical to the mmap-backed path, but every stage runs on the
    /// calling thread.
    pub fn write_stream<W: Write>(
        &self,
        mut out: W,
        log: Option<&mut dyn FnMut(Event)>,
    ) -> Result<Pkg> {
        let mut log = Logger(log);
        let mut plan = self.plan(&mut log)?;
        let mut buf = vec![0u8; plan.total_size as usize];
        let pkg = self.build_into(&mut plan, &mut buf, &mut log, false)?;
        out.write_all(&buf)?;
        Ok(pkg)
    }

    // ------------------------------------------------------------------
    // Planning
    // ------------------------------------------------------------------

    fn plan(&self, log: &mut Logger) -> Result<BuildPlan> {
        let p = &self.project;
        let has_pfs = p.volume_type.has_pfs();
        let is_gd = p.volume_type.is_gd();

        let sfo_path = p.root_dir.join("sce_sys").join("param.sfo");
        let sfo_bytes = fs::read(&sfo_path)
            .map_err(|_| PkgError::MissingRequiredFile("sce_sys/param.sfo".into()))?;
        let mut sfo = Sfo::parse(&sfo_bytes)?;

        let ekpfs = p
            .pfs
            .ekpfs
            .unwrap_or_else(|| derive_ekpfs(&p.content_id, &p.passcode));

        // The filesystem images come first: every later offset depends on
        // the outer image size.
        let mut outer_pfs = None;
        let mut pfs_image_size = 0u64;
        if has_pfs {
            log.msg("Building inner PFS image");
            let exclude = |path: &str| {
                path.strip_prefix("/sce_sys/")
                    .is_some_and(|rel| EntryId::from_file_name(rel).is_some())
            };
            let tree = FsTree::from_dir(&p.root_dir, &exclude)?;
            let inner = PfsBuilder::new(PfsProperties::plain(p.pfs.file_time), tree)?;
            let mut inner_image = vec![0u8; inner.image_size() as usize];
            inner.build(&mut inner_image)?;
            log.pct(15);

            log.msg("Compressing inner PFS image");
            let inner_size = inner_image.len() as u64;
            let pfsc_blob = pfsc::compress(&inner_image)?;
            drop(inner_image);

            let mut outer_tree = FsTree::new();
            let pfsc_size = pfsc_blob.len() as u64;
            outer_tree.add_compressed_file(
                FsTree::ROOT,
                "pfs_image.dat",
                FileData::Memory(pfsc_blob),
                inner_size,
                pfsc_size,
            );

            let seed = p.pfs.seed.unwrap_or_else(|| {
                let mut s = [0u8; 16];
                rand::thread_rng().fill_bytes(&mut s);
                s
            });
            let outer = PfsBuilder::new(
                PfsProperties {
                    sign: p.pfs.sign,
                    encrypt: p.pfs.encrypt,
                    new_crypt: p.pfs.new_crypt,
                    block_size: p.pfs.block_size,
                    seed,
                    min_blocks: p.pfs.min_blocks,
                    ekpfs,
                    file_time: p.pfs.file_time,
                },
                outer_tree,
            )?;
            pfs_image_size = outer.image_size();
            outer_pfs = Some(outer);
        }

        let package_size_estimate = PKG_BODY_OFFSET + BODY_SIZE_ESTIMATE + pfs_image_size;
        self.patch_sfo(&mut sfo, package_size_estimate, has_pfs);
        let sfo_bytes = sfo.serialize();

        // Entry assembly, canonical order first.
        let entitlement = p.entitlement_key_bytes();
        let ct = p.volume_type.content_type();
        let mut entries = vec![
            PkgEntry::new(EntryId::EntryKeys, keys_entry(&p.content_id, &p.passcode)),
            PkgEntry::new(EntryId::ImageKey, image_key_entry(&ekpfs)),
            PkgEntry::new(EntryId::GeneralDigests, vec![0u8; GENERAL_DIGESTS_SIZE]),
            PkgEntry::new(EntryId::Metas, Vec::new()),
            PkgEntry::new(EntryId::Digests, Vec::new()),
            PkgEntry::new(EntryId::EntryNames, Vec::new()),
        ];
        if is_gd {
            entries.push(PkgEntry::new(
                EntryId::PlaygoChunkDat,
                self.staged_or(EntryId::PlaygoChunkDat, default_playgo_chunk_dat)?,
            ));
            // Provisional: recomputed once the real package size is known.
            let chunk_sha_len = (package_size_estimate.div_ceil(CHUNK_SIZE as u64) * 4) as usize;
            entries.push(PkgEntry::new(
                EntryId::PlaygoChunkSha,
                vec![0u8; chunk_sha_len],
            ));
            entries.push(PkgEntry::new(
                EntryId::PlaygoManifestXml,
                self.staged_or(EntryId::PlaygoManifestXml, default_playgo_manifest)?,
            ));
        }
        entries.push(PkgEntry::new(
            EntryId::LicenseDat,
            license_dat(&p.content_id, ct, entitlement),
        ));
        entries.push(PkgEntry::new(
            EntryId::LicenseInfo,
            license_info(&p.content_id, ct),
        ));
        entries.push(PkgEntry::new(EntryId::ParamSfo, sfo_bytes));

        let mut extra = self.scan_sce_sys(&entries)?;
        extra.sort_by_key(|(id, _)| (id.canonical_rank(), *id as u32));
        for (id, data) in extra {
            entries.push(PkgEntry::new(id, data));
        }

        entries.push(PkgEntry::new(
            EntryId::PsreservedDat,
            vec![0u8; PS_RESERVED_SIZE],
        ));

        // Computed entries get their real sizes now that the list is final.
        let count = entries.len();
        let metas_index = entries.iter().position(|e| e.id == EntryId::Metas).unwrap();
        let digests_index = entries
            .iter()
            .position(|e| e.id == EntryId::Digests)
            .unwrap();
        let names_index = entries
            .iter()
            .position(|e| e.id == EntryId::EntryNames)
            .unwrap();
        let chunk_sha_index = entries.iter().position(|e| e.id == EntryId::PlaygoChunkSha);
        entries[metas_index].data = vec![0u8; count * MetaEntry::SIZE];
        entries[digests_index].data = vec![0u8; count * 32];

        let mut name_table = vec![0u8];
        let mut name_offsets = vec![0u32; count];
        for (i, e) in entries.iter().enumerate() {
            if e.id.is_named() {
                if let Some(name) = e.id.file_name() {
                    name_offsets[i] = name_table.len() as u32;
                    name_table.extend_from_slice(name.as_bytes());
                    name_table.push(0);
                }
            }
        }
        entries[names_index].data = name_table;

        // Offsets: 16-byte aligned, in entry order; the entry table is the
        // Metas entry's payload.
        let mut off = PKG_BODY_OFFSET;
        for (i, e) in entries.iter_mut().enumerate() {
            off = (off + PKG_ENTRY_ALIGN - 1) & !(PKG_ENTRY_ALIGN - 1);
            e.meta = MetaEntry {
                id: e.id as u32,
                name_table_offset: name_offsets[i],
                flags1: entry_flags1(e.id),
                flags2: entry_flags2(e.id),
                data_offset: off as u32,
                data_size: e.data.len() as u32,
            };
            off += e.data.len() as u64;
        }
        let body_size = ((off + PKG_PFS_ALIGN - 1) & !(PKG_PFS_ALIGN - 1)) - PKG_BODY_OFFSET;
        let package_size = PKG_BODY_OFFSET + body_size + pfs_image_size;

        let entry_table_offset = entries[metas_index].meta.data_offset;
        let content_offset = u64::from(entry_table_offset) + (count * MetaEntry::SIZE) as u64;
        let main_ent_data_size: u64 = entries[..5].iter().map(|e| e.data.len() as u64).sum();

        let date = p.creation_date.unwrap_or_else(|| {
            DateTime::<Utc>::from_timestamp(p.pfs.file_time, 0)
                .unwrap_or_default()
                .date_naive()
        });
        let version_date =
            date.year() as u32 * 10000 + date.month() * 100 + date.day();

        let mut header = PkgHeader {
            flags: 0x8000_0000,
            pkg_file_count: count as u32,
            entry_count: count as u32,
            sc_entry_count: 5,
            entry_table_offset,
            main_ent_data_size: main_ent_data_size as u32,
            body_offset: PKG_BODY_OFFSET,
            body_size,
            content_offset,
            content_size: PKG_BODY_OFFSET + body_size - content_offset,
            content_id: p.content_id.clone(),
            drm_type: drm_type::PS4,
            content_type: ct,
            content_flags: p.volume_type.base_content_flags()
                | if p.pfs.new_crypt {
                    content_flags::PFS_NEW_CRYPT
                } else {
                    0
                },
            version_date,
            package_size,
            mount_image_size: package_size,
            ..PkgHeader::default()
        };
        if has_pfs {
            header.pfs_image_count = 1;
            header.pfs_flags = if p.pfs.new_crypt {
                PFS_FLAGS_NEW_CRYPT
            } else {
                PFS_FLAGS_OLD_CRYPT
            };
            header.pfs_image_offset = PKG_BODY_OFFSET + body_size;
            header.pfs_image_size = pfs_image_size;
            header.pfs_signed_size = PFS_SIGNED_SIZE;
            header.pfs_cache_size = PFS_CACHE_SIZE;
        }

        Ok(BuildPlan {
            header,
            entries,
            outer_pfs,
            total_size: package_size,
            digests_index,
            chunk_sha_index,
        })
    }

    fn patch_sfo(&self, sfo: &mut Sfo, package_size_estimate: u64, has_pfs: bool) {
        let p = &self.project;
        let ts = DateTime::<Utc>::from_timestamp(p.pfs.file_time, 0).unwrap_or_default();
        let date = p.creation_date.unwrap_or_else(|| ts.date_naive());
        let mut info = format!("c_date={}", date.format("%Y%m%d"));
        if p.use_creation_time {
            info.push_str(&format!(",c_time={}", ts.format("%H%M%S")));
        }
        if has_pfs {
            info.push_str(&format!(
                ",img0_l0_size={},img0_l1_size=0,img0_sc_ksize=512,img0_pc_ksize=832",
                package_size_estimate.div_ceil(0x10_0000)
            ));
        }
        sfo.set_str("PUBTOOLINFO", &info, 0x200);
        sfo.set_int("PUBTOOLVER", 0x0289_0000);
    }

    /// Staged `sce_sys` payload for `id`, or the synthesized default.
    fn staged_or(&self, id: EntryId, default: fn() -> Vec<u8>) -> Result<Vec<u8>> {
        let name = id.file_name().expect("named entry");
        let path = self.project.root_dir.join("sce_sys").join(name);
        if path.is_file() {
            Ok(fs::read(path)?)
        } else {
            Ok(default())
        }
    }

    /// Recognized `sce_sys` files not already carried as entries.
    fn scan_sce_sys(&self, existing: &[PkgEntry]) -> Result<Vec<(EntryId, Vec<u8>)>> {
        fn walk(dir: &Path, prefix: &str, out: &mut Vec<String>) -> std::io::Result<()> {
            let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<std::io::Result<_>>()?;
            entries.sort_by_key(|e| e.file_name());
            for entry in entries {
                let name = entry.file_name().to_string_lossy().into_owned();
                let rel = if prefix.is_empty() {
                    name
                } else {
                    format!("{prefix}/{name}")
                };
                if entry.file_type()?.is_dir() {
                    walk(&entry.path(), &rel, out)?;
                } else {
                    out.push(rel);
                }
            }
            Ok(())
        }

        let dir = self.project.root_dir.join("sce_sys");
        let mut found = Vec::new();
        if !dir.is_dir() {
            return Ok(found);
        }
        let mut names = Vec::new();
        walk(&dir, "", &mut names)?;
        for rel in names {
            if let Some(id) = EntryId::from_file_name(&rel) {
                if existing.iter().any(|e| e.id == id) {
                    continue;
                }
                found.push((id, fs::read(dir.join(&rel))?));
            }
        }
        Ok(found)
    }

    // ------------------------------------------------------------------
    // Writing and the digest cascade
    // ------------------------------------------------------------------

    fn build_into(
        &self,
        plan: &mut BuildPlan,
        file: &mut [u8],
        log: &mut Logger,
        parallel: bool,
    ) -> Result<Pkg> {
        debug_assert_eq!(file.len() as u64, plan.total_size);

        if let Some(outer) = &plan.outer_pfs {
            log.msg("Writing outer PFS image");
            let a = plan.header.pfs_image_offset as usize;
            let b = a + plan.header.pfs_image_size as usize;
            let region = &mut file[a..b];
            outer.write_data(region)?;
            log.pct(40);
            if self.project.pfs.sign {
                log.msg("Signing outer PFS image");
                outer.sign(region, parallel);
                log.pct(70);
            }
            if self.project.pfs.encrypt {
                log.msg("Encrypting outer PFS image");
                outer.encrypt(region, parallel);
                log.pct(80);
            }
        }

        // PFS digests over the finished image.
        if plan.outer_pfs.is_some() {
            let a = plan.header.pfs_image_offset as usize;
            plan.header.pfs_signed_digest =
                sha256(&file[a..a + plan.header.pfs_signed_size as usize]);
            plan.header.pfs_image_digest =
                sha256(&file[a..a + plan.header.pfs_image_size as usize]);
        }

        // PlayGo chunk hashes; the table must be final before the body is
        // serialized.
        if plan.chunk_sha_index.is_some() {
            log.msg("Computing PlayGo chunk hashes");
            self.compute_chunk_hashes(plan, file, log, parallel);
        }

        self.fill_general_digests(plan);

        log.msg("Writing entries");
        for i in 0..plan.entries.len() {
            let e = &plan.entries[i];
            let off = e.meta.data_offset as usize;
            let size = e.meta.data_size as usize;
            if e.id == EntryId::Metas {
                for (j, other) in plan.entries.iter().enumerate() {
                    other
                        .meta
                        .write_to(&mut file[off + j * MetaEntry::SIZE..off + (j + 1) * MetaEntry::SIZE]);
                }
            } else {
                file[off..off + size].copy_from_slice(&e.data[..size]);
            }
        }

        // Per-entry digests; the digest table's own slot stays zero.
        let di = plan.digests_index;
        let d_off = plan.entries[di].meta.data_offset as usize;
        for i in 1..plan.entries.len() {
            if i == di {
                continue;
            }
            let m = plan.entries[i].meta;
            let digest = sha256(
                &file[m.data_offset as usize..m.data_offset as usize + m.data_size as usize],
            );
            plan.entries[di].data[i * 32..(i + 1) * 32].copy_from_slice(&digest);
            file[d_off + i * 32..d_off + (i + 1) * 32].copy_from_slice(&digest);
        }

        let body = plan.header.body_offset as usize
            ..(plan.header.body_offset + plan.header.body_size) as usize;
        plan.header.body_digest = sha256(&file[body]);
        plan.header.digest_table_hash = sha256(&plan.entries[di].data);

        // SC-entry hashes over the serialized bytes.
        let sc_parts: Vec<&[u8]> = plan.entries[..5]
            .iter()
            .map(|e| {
                let off = e.meta.data_offset as usize;
                &file[off..off + e.meta.data_size as usize]
            })
            .collect();
        let actual: u64 = sc_parts.iter().map(|s| s.len() as u64).sum();
        if actual != u64::from(plan.header.main_ent_data_size) {
            return Err(PkgError::SizeMismatch {
                expected: u64::from(plan.header.main_ent_data_size),
                actual,
            });
        }
        plan.header.sc_entries1_hash = sha256_iter(sc_parts.iter().copied());

        let sc2_metas = plan.header.sc_entry_count as usize * MetaEntry::SIZE;
        plan.header.sc_entries2_hash = sha256_iter(
            sc_parts[..3]
                .iter()
                .copied()
                .chain(std::iter::once(&sc_parts[3][..sc2_metas])),
        );

        log.msg("Writing header");
        plan.header.write_to(&mut file[..PKG_HEADER_SIZE]);

        let header_digest = sha256(&file[..PKG_HEADER_DIGEST_OFFSET]);
        file[PKG_HEADER_DIGEST_OFFSET..PKG_HEADER_SIZE].copy_from_slice(&header_digest);

        let signature = PKG_SIGN_KEYSET.sign_digest(&sha256(&file[..PKG_HEADER_SIZE]));
        file[PKG_HEADER_SIZE..PKG_HEADER_SIZE + PKG_SIGNATURE_SIZE].copy_from_slice(&signature);

        log.msg("Package complete");
        Ok(Pkg {
            header: plan.header.clone(),
            entries: plan.entries.iter().map(|e| e.meta).collect(),
        })
    }

    /// Truncated SHA-256 per 64 KiB chunk from the PFS image to the end of
    /// the file, written into disjoint 4-byte slots (one worker per slot
    /// range when `parallel`).
    fn compute_chunk_hashes(
        &self,
        plan: &mut BuildPlan,
        file: &[u8],
        log: &mut Logger,
        parallel: bool,
    ) {
        let ci = plan.chunk_sha_index.expect("GD content");
        let total_chunks = file.len() / CHUNK_SIZE;
        let first = plan.header.pfs_image_offset as usize / CHUNK_SIZE;
        let allocated = plan.entries[ci].meta.data_size as usize;
        let required = total_chunks * 4;
        if required > allocated {
            // Tolerated: report and continue with the allocated prefix.
            log.msg(format!(
                "PlayGo chunk table needs {required} bytes but {allocated} were allocated; \
                 the serialized table is truncated"
            ));
        }

        let table = &mut plan.entries[ci].data;
        if table.len() < required {
            table.resize(required, 0);
        }

        let slots = &mut table[first * 4..required];
        if !parallel {
            for (j, slot) in slots.chunks_mut(4).enumerate() {
                let k = first + j;
                let digest = sha256(&file[k * CHUNK_SIZE..(k + 1) * CHUNK_SIZE]);
                slot.copy_from_slice(&digest[..4]);
            }
            return;
        }

        let jobs = total_chunks - first;
        let workers = thread::available_parallelism()
            .map_or(1, |n| n.get())
            .min(MAX_WORKERS)
            .min(jobs.max(1));
        let per = jobs.div_ceil(workers.max(1)).max(1);
        let file = &*file;
        thread::scope(|s| {
            for (wi, part) in slots.chunks_mut(per * 4).enumerate() {
                let base = first + wi * per;
                s.spawn(move || {
                    for (j, slot) in part.chunks_mut(4).enumerate() {
                        let k = base + j;
                        let digest = sha256(&file[k * CHUNK_SIZE..(k + 1) * CHUNK_SIZE]);
                        slot.copy_from_slice(&digest[..4]);
                    }
                });
            }
        });
    }

    /// Fixed set of SHA-256s over header material, stored in the
    /// general-digests entry.
    fn fill_general_digests(&self, plan: &mut BuildPlan) {
        let mut gd = vec![0u8; GENERAL_DIGESTS_SIZE];

        let mut id48 = [0u8; 0x30];
        let id = self.project.content_id.as_bytes();
        id48[..id.len().min(0x30)].copy_from_slice(&id[..id.len().min(0x30)]);
        gd[0x00..0x20].copy_from_slice(&sha256(&id48));

        gd[0x20..0x40].copy_from_slice(&plan.header.pfs_image_digest);

        let mut hdr_buf = vec![0u8; PKG_HEADER_SIZE];
        plan.header.write_to(&mut hdr_buf);
        gd[0x40..0x60].copy_from_slice(&sha256(&hdr_buf[..0x40]));

        if let Some(sfo) = plan.entries.iter().find(|e| e.id == EntryId::ParamSfo) {
            gd[0x60..0x80].copy_from_slice(&sha256(&sfo.data));
        }

        let gd_index = plan
            .entries
            .iter()
            .position(|e| e.id == EntryId::GeneralDigests)
            .expect("canonical entry");
        plan.entries[gd_index].data = gd;
    }
}
