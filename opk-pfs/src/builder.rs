//! PFS image builder.
//!
//! Building proceeds in four phases over one image buffer:
//!
//! 1. **Setup** — inode numbering, dirent seeding, path-table construction.
//! 2. **Layout** — pure arithmetic: block assignment, signature planning.
//! 3. **Data write** — header, inode table, dirents, file payloads.
//! 4. **Signing / encryption** — parallel HMAC over data blocks, serial
//!    HMAC over metadata blocks, then the XTS sweep.
//!
//! The layout is computed by [`PfsBuilder::new`], so the caller knows the
//! exact image size before allocating or mapping the output buffer.

use std::collections::BTreeMap;
use std::thread;

use enumflags2::BitFlags;
use opk_secure::{pfs_gen_enc_keys, pfs_gen_sign_key, BlockSigner, XtsTransform, XTS_SECTOR_SIZE};

use crate::error::{PfsError, Result};
use crate::header::{
    PfsHeader, PfsMode, HEADER_DIRECT_SIG_OFFSET, PFS_HEADER_SIGNED_SIZE, PFS_HEADER_SIG_OFFSET,
};
use crate::inode::{
    inode_mode, render_dirents, Dirent, DirentType, Inode, InodeFlags, DINODE_FIXED_SIZE,
    DIRECT_SLOTS, SIG_ENTRY_SIZE,
};
use crate::node::{FsTree, NodeId, NodeKind};
use crate::path_table::{self, path_hash};
use crate::shared::SharedSlice;

/// PFS block size; the format fixes it at 64 KiB.
pub const DEFAULT_BLOCK_SIZE: u32 = 0x10000;

/// Upper bound on worker threads for the parallel stages.
const MAX_WORKERS: usize = 10;

#[derive(Clone)]
pub struct PfsProperties {
    pub sign: bool,
    pub encrypt: bool,
    pub new_crypt: bool,
    pub block_size: u32,
    pub seed: [u8; 16],
    pub min_blocks: u64,
    pub ekpfs: [u8; 32],
    pub file_time: i64,
}

impl PfsProperties {
    /// Properties of a plain (unsigned, unencrypted) image, as used for the
    /// inner filesystem.
    pub fn plain(file_time: i64) -> Self {
        Self {
            sign: false,
            encrypt: false,
            new_crypt: false,
            block_size: DEFAULT_BLOCK_SIZE,
            seed: [0u8; 16],
            min_blocks: 0,
            ekpfs: [0u8; 32],
            file_time,
        }
    }
}

/// One planned signature: HMAC over the first `size` bytes of `block`,
/// stored at the absolute image offset `sig_offset` (block number at
/// `sig_offset + 32`).
#[derive(Debug, Clone, Copy)]
pub struct BlockSigInfo {
    pub block: u64,
    pub sig_offset: u64,
    pub size: u32,
}

pub struct PfsBuilder {
    props: PfsProperties,
    tree: FsTree,
    header: PfsHeader,
    header_ino: Inode,
    inodes: Vec<Inode>,
    has_collision: bool,

    super_root_data: Vec<u8>,
    dir_data: Vec<Option<Vec<u8>>>,
    fpt_blob: Vec<u8>,
    cr_blob: Option<Vec<u8>>,

    /// uroot first, then directories in path order, then files shallow-last.
    all_nodes: Vec<NodeId>,
    start_blocks: Vec<u64>,
    fpt_start: u64,
    cr_start: u64,
    sr_block: u64,
    empty_block: Option<u64>,

    /// Leaf data blocks; signed in parallel.
    data_sigs: Vec<BlockSigInfo>,
    /// Indirect and metadata blocks; drained serially in reverse push order
    /// after every data signature is in place.
    final_sigs: Vec<BlockSigInfo>,
}

impl PfsBuilder {
    /// Set up and lay out an image for `tree`. After this the image size and
    /// every block assignment are final; only buffer writes remain.
    pub fn new(props: PfsProperties, tree: FsTree) -> Result<Self> {
        let mode = {
            let mut m: BitFlags<PfsMode> = PfsMode::UnknownAlwaysSet.into();
            if props.sign {
                m |= PfsMode::Signed;
            }
            if props.encrypt {
                m |= PfsMode::Encrypted;
            }
            m
        };
        let header = PfsHeader::new(mode, props.block_size, props.seed);
        let header_ino = Inode::new(0, props.sign);
        let dir_data = vec![None; tree.len()];
        let start_blocks = vec![0; tree.len()];
        let mut builder = Self {
            props,
            tree,
            header,
            header_ino,
            inodes: Vec::new(),
            has_collision: false,
            super_root_data: Vec::new(),
            dir_data,
            fpt_blob: Vec::new(),
            cr_blob: None,
            all_nodes: Vec::new(),
            start_blocks,
            fpt_start: 0,
            cr_start: 0,
            sr_block: 0,
            empty_block: None,
            data_sigs: Vec::new(),
            final_sigs: Vec::new(),
        };
        builder.setup();
        builder.calculate_layout()?;
        Ok(builder)
    }

    // ------------------------------------------------------------------
    // Phase 1: setup
    // ------------------------------------------------------------------

    fn setup(&mut self) {
        let signed = self.props.sign;
        let bs = self.props.block_size as usize;
        let time = self.props.file_time;
        let dirs = self.tree.dirs_sorted();
        let files = self.tree.files_sorted();

        // Collision scan decides the inode numbering before anything else.
        let mut hash_counts: BTreeMap<u32, u32> = BTreeMap::new();
        for &id in dirs.iter().chain(files.iter()) {
            *hash_counts
                .entry(path_hash(&self.tree.full_path(id)))
                .or_insert(0) += 1;
        }
        self.has_collision = hash_counts.values().any(|&c| c > 1);

        // Inode numbers: 0 super-root, 1 flat path table, 2 collision
        // resolver when present, then uroot, directories, files.
        let uroot_num: u32 = if self.has_collision { 3 } else { 2 };
        self.tree.node_mut(FsTree::ROOT).inode = Some(uroot_num);
        let mut next = uroot_num + 1;
        for &d in &dirs {
            self.tree.node_mut(d).inode = Some(next);
            next += 1;
        }
        for &f in &files {
            self.tree.node_mut(f).inode = Some(next);
            next += 1;
        }

        // Lookup blobs over the final numbering.
        let paths: Vec<(String, u32)> = dirs
            .iter()
            .chain(files.iter())
            .map(|&id| {
                (
                    self.tree.full_path(id),
                    self.tree.node(id).inode.expect("numbered"),
                )
            })
            .collect();
        let (fpt, cr) = path_table::build(&paths);
        self.fpt_blob = fpt.to_bytes();
        self.cr_blob = cr.map(|c| c.to_bytes());

        // Dirents: every directory opens with `.` and `..`, then its
        // subdirectories in path order, then its files.
        let mut dirents: Vec<Vec<Dirent>> = vec![Vec::new(); self.tree.len()];
        let mut nlink: Vec<u16> = vec![2; self.tree.len()];
        let ino_of = |tree: &FsTree, id: NodeId| tree.node(id).inode.expect("numbered");

        dirents[FsTree::ROOT].push(Dirent::dot(uroot_num));
        dirents[FsTree::ROOT].push(Dirent::dotdot(0));
        for &d in &dirs {
            let num = ino_of(&self.tree, d);
            let parent = self.tree.node(d).parent.expect("non-root");
            dirents[d].push(Dirent::dot(num));
            dirents[d].push(Dirent::dotdot(ino_of(&self.tree, parent)));
            dirents[parent].push(Dirent::new(num, DirentType::Directory, &self.tree.node(d).name));
            nlink[parent] += 1;
        }
        for &f in &files {
            let parent = self.tree.node(f).parent.expect("non-root");
            dirents[parent].push(Dirent::new(
                ino_of(&self.tree, f),
                DirentType::File,
                &self.tree.node(f).name,
            ));
        }

        // Super-root dirents: the lookup blobs, then uroot.
        let mut sr_dirents = vec![Dirent::new(1, DirentType::File, "flat_path_table")];
        if self.cr_blob.is_some() {
            sr_dirents.push(Dirent::new(2, DirentType::File, "collision_resolver"));
        }
        sr_dirents.push(Dirent::new(uroot_num, DirentType::Directory, "uroot"));
        self.super_root_data = render_dirents(&sr_dirents, bs);

        // Inode records, in numbering order.
        let signed_bits = InodeFlags::Unk5 | InodeFlags::Unk13;
        let mut push = |inodes: &mut Vec<Inode>,
                        mode: u16,
                        nlink: u16,
                        flags: BitFlags<InodeFlags>,
                        size: u64| {
            let mut ino = Inode::new(inodes.len() as u32, signed);
            ino.mode = mode;
            ino.nlink = nlink;
            ino.flags = if signed { flags | signed_bits } else { flags };
            ino.size = size;
            ino.time = time;
            inodes.push(ino);
        };

        let mut inodes = Vec::with_capacity(self.tree.len() + 3);
        push(
            &mut inodes,
            inode_mode::DIR | inode_mode::RX,
            1,
            InodeFlags::Internal.into(),
            bs as u64,
        );
        push(
            &mut inodes,
            inode_mode::FILE | inode_mode::RX,
            1,
            InodeFlags::Internal | InodeFlags::Readonly,
            self.fpt_blob.len() as u64,
        );
        if let Some(cr) = &self.cr_blob {
            push(
                &mut inodes,
                inode_mode::FILE | inode_mode::RX,
                1,
                InodeFlags::Internal | InodeFlags::Readonly,
                cr.len() as u64,
            );
        }

        self.all_nodes = std::iter::once(FsTree::ROOT)
            .chain(dirs.iter().copied())
            .chain(files.iter().copied())
            .collect();
        for &id in &self.all_nodes {
            let node = self.tree.node(id);
            match &node.kind {
                NodeKind::Dir { .. } => {
                    let data = render_dirents(&dirents[id], bs);
                    let blocks = data.len().div_ceil(bs) as u64;
                    push(
                        &mut inodes,
                        inode_mode::DIR | inode_mode::RWX,
                        nlink[id],
                        BitFlags::empty(),
                        blocks * bs as u64,
                    );
                    self.dir_data[id] = Some(data);
                }
                NodeKind::File {
                    size,
                    compressed_size,
                    ..
                } => {
                    let mut flags = BitFlags::empty();
                    if compressed_size.is_some() {
                        flags |= InodeFlags::Compressed;
                    }
                    push(&mut inodes, inode_mode::FILE | inode_mode::RX, 1, flags, *size);
                    let idx = inodes.len() - 1;
                    inodes[idx].size_compressed = compressed_size.unwrap_or(0);
                }
            }
        }
        self.inodes = inodes;

        self.header_ino.mode = inode_mode::FILE | inode_mode::RX;
        self.header_ino.flags = if signed {
            signed_bits | InodeFlags::Internal
        } else {
            InodeFlags::Internal.into()
        };
        self.header_ino.time = time;
    }

    // ------------------------------------------------------------------
    // Phase 2: block layout
    // ------------------------------------------------------------------

    fn inode_abs_offset(&self, index: u64) -> u64 {
        let bs = u64::from(self.props.block_size);
        let isz = Inode::record_size(self.props.sign) as u64;
        let per_block = bs / isz;
        bs * (1 + index / per_block) + (index % per_block) * isz
    }

    fn inode_sig_offset(&self, index: u64, slot: u64) -> u64 {
        self.inode_abs_offset(index) + DINODE_FIXED_SIZE as u64 + SIG_ENTRY_SIZE as u64 * slot
    }

    /// Stored block count of a laid-out node.
    fn node_blocks(&self, id: NodeId) -> u64 {
        let bs = u64::from(self.props.block_size);
        match &self.tree.node(id).kind {
            NodeKind::Dir { .. } => {
                let len = self.dir_data[id].as_ref().map_or(0, Vec::len) as u64;
                len.div_ceil(bs)
            }
            NodeKind::File { .. } => self.tree.stored_size(id).div_ceil(bs),
        }
    }

    fn calculate_layout(&mut self) -> Result<()> {
        let bs = u64::from(self.props.block_size);
        let signed = self.props.sign;
        let isz = Inode::record_size(signed) as u64;
        let per_block = bs / isz;

        let dinode_count = self.inodes.len() as u64;
        let dinode_block_count = dinode_count.div_ceil(per_block);
        self.header.dinode_count = dinode_count;
        self.header.dinode_block_count = dinode_block_count;
        self.header_ino.size = dinode_block_count * bs;
        self.header_ino.blocks = dinode_block_count as u32;

        // Signed indirect blocks hold 36-byte signature entries; unsigned
        // ones hold plain LE32 pointers.
        let density = if signed {
            bs / SIG_ENTRY_SIZE as u64
        } else {
            bs / 4
        };

        let mut ndblock: u64 = 1; // header block
        if signed {
            self.final_sigs.push(BlockSigInfo {
                block: 0,
                sig_offset: PFS_HEADER_SIG_OFFSET,
                size: PFS_HEADER_SIGNED_SIZE,
            });
            for i in 0..dinode_block_count {
                self.header_ino.set_direct_block(0, 1 + i);
                self.final_sigs.push(BlockSigInfo {
                    block: 1 + i,
                    sig_offset: HEADER_DIRECT_SIG_OFFSET + SIG_ENTRY_SIZE as u64 * i,
                    size: bs as u32,
                });
            }
        } else {
            self.header_ino.set_direct_block(0, ndblock);
        }
        ndblock += dinode_block_count;

        // Super-root dirent block.
        self.sr_block = ndblock;
        self.inodes[0].set_direct_block(0, ndblock);
        self.inodes[0].blocks = 1;
        if signed {
            self.data_sigs.push(BlockSigInfo {
                block: ndblock,
                sig_offset: self.inode_sig_offset(0, 0),
                size: bs as u32,
            });
        }
        ndblock += 1;

        // Flat path table.
        let fpt_blocks = (self.fpt_blob.len() as u64).div_ceil(bs);
        if fpt_blocks > DIRECT_SLOTS as u64 {
            return Err(PfsError::PathTableTooLarge { blocks: fpt_blocks });
        }
        self.fpt_start = ndblock;
        self.inodes[1].blocks = fpt_blocks as u32;
        for i in 0..fpt_blocks {
            self.inodes[1].set_direct_block(i as usize, ndblock);
            if signed {
                let off = self.inode_sig_offset(1, i);
                self.final_sigs.push(BlockSigInfo {
                    block: ndblock,
                    sig_offset: off,
                    size: bs as u32,
                });
            }
            ndblock += 1;
        }

        // Collision resolver and the empty block. Signed images always keep
        // the empty block (it is the hole in the XTS sweep); in unsigned
        // images the resolver occupies that slot when present.
        if let Some(cr) = &self.cr_blob {
            let cr_blocks = (cr.len() as u64).div_ceil(bs);
            if cr_blocks > DIRECT_SLOTS as u64 {
                return Err(PfsError::PathTableTooLarge { blocks: cr_blocks });
            }
            self.cr_start = ndblock;
            self.inodes[2].blocks = cr_blocks as u32;
            for i in 0..cr_blocks {
                self.inodes[2].set_direct_block(i as usize, ndblock);
                if signed {
                    let off = self.inode_sig_offset(2, i);
                    self.final_sigs.push(BlockSigInfo {
                        block: ndblock,
                        sig_offset: off,
                        size: bs as u32,
                    });
                }
                ndblock += 1;
            }
            if signed {
                self.empty_block = Some(ndblock);
                ndblock += 1;
            }
        } else {
            self.empty_block = Some(ndblock);
            ndblock += 1;
        }

        // Indirect-block pool.
        let pool_start = ndblock;
        let mut ib = ndblock;
        let total_indirect: u64 = self
            .all_nodes
            .iter()
            .map(|&id| indirect_blocks_needed(self.node_blocks(id), density))
            .sum::<Option<u64>>()
            .ok_or_else(|| self.overflow_error(density))?;
        ndblock += total_indirect;

        for &id in &self.all_nodes.clone() {
            let blocks = self.node_blocks(id);
            let ino_idx = u64::from(self.tree.node(id).inode.expect("numbered"));
            self.start_blocks[id] = ndblock;

            self.inodes[ino_idx as usize].set_direct_block(0, ndblock);
            for i in 0..blocks.min(DIRECT_SLOTS as u64) {
                if i > 0 {
                    self.inodes[ino_idx as usize].set_direct_block(i as usize, ndblock);
                }
                if signed {
                    let off = self.inode_sig_offset(ino_idx, i);
                    self.data_sigs.push(BlockSigInfo {
                        block: ndblock,
                        sig_offset: off,
                        size: bs as u32,
                    });
                }
                ndblock += 1;
            }
            self.inodes[ino_idx as usize].blocks = blocks as u32;

            if blocks > DIRECT_SLOTS as u64 {
                let max = DIRECT_SLOTS as u64 + density + density * density;
                if blocks > max {
                    return Err(PfsError::LayoutOverflow { blocks, max });
                }

                // Single indirect block.
                self.inodes[ino_idx as usize].indirect[0] = ib as i64;
                if signed {
                    let off = self.inode_sig_offset(ino_idx, DIRECT_SLOTS as u64);
                    self.final_sigs.push(BlockSigInfo {
                        block: ib,
                        sig_offset: off,
                        size: bs as u32,
                    });
                }
                let level1 = (blocks - DIRECT_SLOTS as u64).min(density);
                for j in 0..level1 {
                    if signed {
                        self.data_sigs.push(BlockSigInfo {
                            block: ndblock,
                            sig_offset: ib * bs + SIG_ENTRY_SIZE as u64 * j,
                            size: bs as u32,
                        });
                    }
                    ndblock += 1;
                }
                ib += 1;

                // Doubly-indirect block plus its second-level children.
                if blocks > DIRECT_SLOTS as u64 + density {
                    self.inodes[ino_idx as usize].indirect[1] = ib as i64;
                    if signed {
                        let off = self.inode_sig_offset(ino_idx, DIRECT_SLOTS as u64 + 1);
                        self.final_sigs.push(BlockSigInfo {
                            block: ib,
                            sig_offset: off,
                            size: bs as u32,
                        });
                    }
                    let di = ib;
                    ib += 1;

                    let remaining = blocks - DIRECT_SLOTS as u64 - density;
                    for k in 0..remaining.div_ceil(density) {
                        if signed {
                            self.final_sigs.push(BlockSigInfo {
                                block: ib,
                                sig_offset: di * bs + SIG_ENTRY_SIZE as u64 * k,
                                size: bs as u32,
                            });
                        }
                        let children = (remaining - k * density).min(density);
                        for j in 0..children {
                            if signed {
                                self.data_sigs.push(BlockSigInfo {
                                    block: ndblock,
                                    sig_offset: ib * bs + SIG_ENTRY_SIZE as u64 * j,
                                    size: bs as u32,
                                });
                            }
                            ndblock += 1;
                        }
                        ib += 1;
                    }
                }
            }
        }
        debug_assert_eq!(ib, pool_start + total_indirect);

        self.header.ndblock = ndblock.max(self.props.min_blocks);
        Ok(())
    }

    fn overflow_error(&self, density: u64) -> PfsError {
        let max = DIRECT_SLOTS as u64 + density + density * density;
        let blocks = self
            .all_nodes
            .iter()
            .map(|&id| self.node_blocks(id))
            .max()
            .unwrap_or(0);
        PfsError::LayoutOverflow { blocks, max }
    }

    // ------------------------------------------------------------------
    // Phase 3 and 4: write, sign, encrypt
    // ------------------------------------------------------------------

    /// Total image size in bytes; fixed once layout has run.
    pub fn image_size(&self) -> u64 {
        self.header.ndblock * u64::from(self.props.block_size)
    }

    /// Write, sign and encrypt the image into `image`, which must be exactly
    /// [`image_size`](Self::image_size) bytes. Signing and encryption use
    /// the worker pool; callers that must stay single-threaded drive the
    /// phases themselves and pass `parallel = false`.
    pub fn build(&self, image: &mut [u8]) -> Result<()> {
        self.write_data(image)?;
        if self.props.sign {
            self.sign(image, true);
        }
        if self.props.encrypt {
            self.encrypt(image, true);
        }
        Ok(())
    }

    /// Write the header, inode table, dirents and file payloads. The phases
    /// are public so callers can report progress between them; they must run
    /// in write → sign → encrypt order.
    pub fn write_data(&self, image: &mut [u8]) -> Result<()> {
        if image.len() as u64 != self.image_size() {
            return Err(PfsError::ImageSizeMismatch {
                expected: self.image_size(),
                actual: image.len() as u64,
            });
        }
        let bs = self.props.block_size as usize;

        self.header.write_to(&mut image[..bs], &self.header_ino)?;

        let isz = Inode::record_size(self.props.sign);
        for (i, ino) in self.inodes.iter().enumerate() {
            let off = self.inode_abs_offset(i as u64) as usize;
            let mut slot = &mut image[off..off + isz];
            if self.props.sign {
                ino.write_s32(&mut slot)?;
            } else {
                ino.write_d32(&mut slot)?;
            }
        }

        // Super-root dirents sit right after the inode blocks.
        debug_assert_eq!(self.sr_block, self.header.dinode_block_count + 1);
        let off = self.sr_block as usize * bs;
        image[off..off + self.super_root_data.len()].copy_from_slice(&self.super_root_data);

        // The lookup blobs are written like any other file payload.
        let off = self.fpt_start as usize * bs;
        image[off..off + self.fpt_blob.len()].copy_from_slice(&self.fpt_blob);
        if let Some(cr) = &self.cr_blob {
            let off = self.cr_start as usize * bs;
            image[off..off + cr.len()].copy_from_slice(cr);
        }

        for &id in &self.all_nodes {
            let start = self.start_blocks[id] as usize * bs;
            match &self.tree.node(id).kind {
                NodeKind::Dir { .. } => {
                    let data = self.dir_data[id].as_ref().expect("rendered");
                    image[start..start + data.len()].copy_from_slice(data);
                }
                NodeKind::File { .. } => {
                    let stored = self.tree.stored_size(id) as usize;
                    let mut sink = &mut image[start..start + stored];
                    self.tree.write_payload(id, &mut sink)?;
                }
            }
        }
        Ok(())
    }

    /// Sign every planned block. Runs after [`write_data`](Self::write_data).
    ///
    /// `parallel` selects the worker pool for the data-block pass; the
    /// stream-backed build path passes `false` and signs on the calling
    /// thread.
    pub fn sign(&self, image: &mut [u8], parallel: bool) {
        let bs = u64::from(self.props.block_size);
        let key = pfs_gen_sign_key(&self.props.ekpfs, &self.props.seed);

        if parallel {
            // Data blocks in parallel: every worker owns a keyed HMAC state
            // and a block-sized scratch buffer; writes land in disjoint
            // signature slots inside inode and indirect blocks.
            let shared = SharedSlice::new(&mut *image);
            let workers = worker_count(self.data_sigs.len());
            let chunk = self.data_sigs.len().div_ceil(workers.max(1)).max(1);
            thread::scope(|s| {
                for part in self.data_sigs.chunks(chunk) {
                    let shared = &shared;
                    let key = &key;
                    s.spawn(move || {
                        let mut signer = BlockSigner::new(key);
                        let mut buf = vec![0u8; bs as usize];
                        for sig in part {
                            let data = &mut buf[..sig.size as usize];
                            // SAFETY: reads target data blocks, writes target
                            // this entry's unique signature slot.
                            unsafe {
                                shared.read_into((sig.block * bs) as usize, data);
                                let digest = signer.sign(data);
                                shared.write(sig.sig_offset as usize, &digest);
                                shared.write(
                                    sig.sig_offset as usize + 32,
                                    &(sig.block as u32).to_le_bytes(),
                                );
                            }
                        }
                    });
                }
            });
        } else {
            let mut signer = BlockSigner::new(&key);
            for sig in &self.data_sigs {
                let start = (sig.block * bs) as usize;
                let digest = signer.sign(&image[start..start + sig.size as usize]);
                let off = sig.sig_offset as usize;
                image[off..off + 32].copy_from_slice(&digest);
                image[off + 32..off + 36].copy_from_slice(&(sig.block as u32).to_le_bytes());
            }
        }

        // Metadata blocks serially, newest first: second-level indirect
        // signatures must land before the doubly-indirect block is hashed,
        // inode-table signatures before the inode blocks, and the header
        // entry last of all.
        let mut signer = BlockSigner::new(&key);
        for sig in self.final_sigs.iter().rev() {
            let start = (sig.block * bs) as usize;
            let digest = signer.sign(&image[start..start + sig.size as usize]);
            let off = sig.sig_offset as usize;
            image[off..off + 32].copy_from_slice(&digest);
            image[off + 32..off + 36].copy_from_slice(&(sig.block as u32).to_le_bytes());
        }
    }

    /// XTS-encrypt the image in place. Runs last.
    ///
    /// `parallel` mirrors [`sign`](Self::sign): the stream-backed build path
    /// encrypts on the calling thread.
    pub fn encrypt(&self, image: &mut [u8], parallel: bool) {
        let (tweak_key, data_key) =
            pfs_gen_enc_keys(&self.props.ekpfs, &self.props.seed, self.props.new_crypt);

        let sectors_per_block = self.props.block_size as u64 / XTS_SECTOR_SIZE as u64;
        let skip = self
            .empty_block
            .map(|b| (b * sectors_per_block, (b + 1) * sectors_per_block));
        let total = image.len() as u64 / XTS_SECTOR_SIZE as u64;

        // The sweep starts after the signed header block (sector 16 at the
        // standard block size) and leaves the empty block as plaintext zeros.
        let sectors: Vec<u64> = (sectors_per_block..total)
            .filter(|s| skip.map_or(true, |(lo, hi)| *s < lo || *s >= hi))
            .collect();

        if parallel {
            let shared = SharedSlice::new(&mut *image);
            let workers = worker_count(sectors.len());
            let chunk = sectors.len().div_ceil(workers.max(1)).max(1);
            thread::scope(|s| {
                for part in sectors.chunks(chunk) {
                    let shared = &shared;
                    let tweak_key = &tweak_key;
                    let data_key = &data_key;
                    s.spawn(move || {
                        let xts = XtsTransform::new(data_key, tweak_key);
                        for &sector in part {
                            // SAFETY: each sector has exactly one encryptor.
                            let buf = unsafe {
                                shared.slice_mut(
                                    sector as usize * XTS_SECTOR_SIZE,
                                    XTS_SECTOR_SIZE,
                                )
                            };
                            xts.encrypt_sector(buf, sector);
                        }
                    });
                }
            });
        } else {
            let xts = XtsTransform::new(&data_key, &tweak_key);
            for &sector in &sectors {
                let start = sector as usize * XTS_SECTOR_SIZE;
                xts.encrypt_sector(&mut image[start..start + XTS_SECTOR_SIZE], sector);
            }
        }
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn header(&self) -> &PfsHeader {
        &self.header
    }

    pub fn tree(&self) -> &FsTree {
        &self.tree
    }

    pub fn inode(&self, number: u32) -> &Inode {
        &self.inodes[number as usize]
    }

    pub fn inode_count(&self) -> usize {
        self.inodes.len()
    }

    pub fn has_collision(&self) -> bool {
        self.has_collision
    }

    pub fn data_sigs(&self) -> &[BlockSigInfo] {
        &self.data_sigs
    }

    pub fn final_sigs(&self) -> &[BlockSigInfo] {
        &self.final_sigs
    }

    pub fn empty_block(&self) -> Option<u64> {
        self.empty_block
    }

    /// Inode of the node staged at `path`, if any.
    pub fn inode_for_path(&self, path: &str) -> Option<&Inode> {
        let id = self.tree.find(path)?;
        let num = self.tree.node(id).inode?;
        Some(&self.inodes[num as usize])
    }
}

/// Indirect blocks a payload of `blocks` data blocks needs, given the
/// per-indirect-block pointer density. `None` means even two levels of
/// indirection cannot address it.
fn indirect_blocks_needed(blocks: u64, density: u64) -> Option<u64> {
    let direct = DIRECT_SLOTS as u64;
    if blocks <= direct {
        Some(0)
    } else if blocks <= direct + density {
        Some(1)
    } else if blocks <= direct + density + density * density {
        Some(2 + (blocks - direct - density).div_ceil(density))
    } else {
        None
    }
}

fn worker_count(jobs: usize) -> usize {
    let cores = thread::available_parallelism().map_or(1, |n| n.get());
    cores.min(MAX_WORKERS).min(jobs.max(1))
}
