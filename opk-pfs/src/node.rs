//! In-memory staging tree.
//!
//! The tree is an arena: nodes live in one `Vec` and refer to their parents
//! by index, so directories and their contents never form owning cycles.
//! File contents are not read while staging; each file node carries a lazy
//! payload that is streamed into the image during the write phase.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{PfsError, Result};

pub type NodeId = usize;

/// Synthetic path component that sorts after every real name, pushing
/// shallow files behind deep ones in the inode table.
const SHALLOW_LAST: &str = "zzzzzzzzzz/";

/// A lazily-written file payload.
pub enum FileData {
    /// Streamed from a staged file on disk at write time.
    Disk(PathBuf),
    /// Carried in memory (path tables and other generated blobs).
    Memory(Vec<u8>),
    /// Produced by a callback at write time.
    Writer(Box<dyn Fn(&mut dyn Write) -> io::Result<()> + Send + Sync>),
}

pub enum NodeKind {
    Dir { children: Vec<NodeId> },
    File {
        data: FileData,
        size: u64,
        /// Present when the payload is a compressed wrapper; block layout
        /// then uses this stored size instead of `size`.
        compressed_size: Option<u64>,
    },
}

pub struct FsNode {
    pub name: String,
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
    /// Inode number, assigned during PFS setup.
    pub inode: Option<u32>,
}

impl FsNode {
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Dir { .. })
    }
}

/// Arena-backed staging tree rooted at `uroot`.
pub struct FsTree {
    nodes: Vec<FsNode>,
}

impl FsTree {
    /// Index of the root (`uroot`) node.
    pub const ROOT: NodeId = 0;

    pub fn new() -> Self {
        Self {
            nodes: vec![FsNode {
                name: "uroot".into(),
                parent: None,
                kind: NodeKind::Dir {
                    children: Vec::new(),
                },
                inode: None,
            }],
        }
    }

    /// Build a tree from a staged directory on disk.
    ///
    /// `exclude` receives the tree-absolute path (`/sce_sys/param.sfo`) of
    /// every regular file; returning `true` keeps the file out of the image
    /// (it will be carried as a PKG entry instead). Directory entries are
    /// visited in name order so the tree is independent of readdir order.
    pub fn from_dir(root: &Path, exclude: &dyn Fn(&str) -> bool) -> Result<Self> {
        let mut tree = Self::new();
        tree.stage_dir(root, Self::ROOT, exclude)?;
        Ok(tree)
    }

    fn stage_dir(
        &mut self,
        dir: &Path,
        parent: NodeId,
        exclude: &dyn Fn(&str) -> bool,
    ) -> Result<()> {
        let stage = |path: &Path, source: io::Error| PfsError::Stage {
            path: path.to_path_buf(),
            source,
        };

        let mut entries: Vec<_> = fs::read_dir(dir)
            .map_err(|e| stage(dir, e))?
            .collect::<io::Result<_>>()
            .map_err(|e| stage(dir, e))?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            let meta = fs::metadata(&path).map_err(|e| stage(&path, e))?;
            if meta.is_dir() {
                let id = self.add_dir(parent, &name);
                self.stage_dir(&path, id, exclude)?;
            } else {
                let full = format!("{}/{}", self.full_path(parent), name);
                if exclude(&full) {
                    continue;
                }
                self.add_file(parent, &name, FileData::Disk(path), meta.len());
            }
        }
        Ok(())
    }

    pub fn add_dir(&mut self, parent: NodeId, name: &str) -> NodeId {
        self.push(parent, name, NodeKind::Dir {
            children: Vec::new(),
        })
    }

    pub fn add_file(&mut self, parent: NodeId, name: &str, data: FileData, size: u64) -> NodeId {
        self.push(parent, name, NodeKind::File {
            data,
            size,
            compressed_size: None,
        })
    }

    /// Add a file whose payload is a compressed wrapper: `size` is the
    /// uncompressed length recorded in the inode, `compressed_size` the
    /// stored length used for block layout.
    pub fn add_compressed_file(
        &mut self,
        parent: NodeId,
        name: &str,
        data: FileData,
        size: u64,
        compressed_size: u64,
    ) -> NodeId {
        self.push(parent, name, NodeKind::File {
            data,
            size,
            compressed_size: Some(compressed_size),
        })
    }

    fn push(&mut self, parent: NodeId, name: &str, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(FsNode {
            name: name.into(),
            parent: Some(parent),
            kind,
            inode: None,
        });
        match &mut self.nodes[parent].kind {
            NodeKind::Dir { children } => children.push(id),
            NodeKind::File { .. } => unreachable!("files have no children"),
        }
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn node(&self, id: NodeId) -> &FsNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut FsNode {
        &mut self.nodes[id]
    }

    /// Tree-absolute path; the root itself is the empty string, so children
    /// of the root read `/name`.
    pub fn full_path(&self, id: NodeId) -> String {
        if id == Self::ROOT {
            return String::new();
        }
        let node = &self.nodes[id];
        match node.parent {
            Some(p) => format!("{}/{}", self.full_path(p), node.name),
            None => format!("/{}", node.name),
        }
    }

    /// Look a node up by its tree-absolute path.
    pub fn find(&self, path: &str) -> Option<NodeId> {
        let mut cur = Self::ROOT;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            let NodeKind::Dir { children } = &self.nodes[cur].kind else {
                return None;
            };
            cur = *children
                .iter()
                .find(|&&c| self.nodes[c].name == part)?;
        }
        Some(cur)
    }

    /// All directories except the root, ordinally sorted by full path.
    /// Parents precede their children (a path is a prefix of its children's
    /// paths), which is what inode creation relies on.
    pub fn dirs_sorted(&self) -> Vec<NodeId> {
        let mut dirs: Vec<NodeId> = (1..self.nodes.len())
            .filter(|&i| self.nodes[i].is_dir())
            .collect();
        dirs.sort_by_key(|&i| self.full_path(i));
        dirs
    }

    /// All files, ordinally sorted by the shallow-last synthetic key
    /// `parent_path + "zzzzzzzzzz/" + name`.
    pub fn files_sorted(&self) -> Vec<NodeId> {
        let mut files: Vec<NodeId> = (1..self.nodes.len())
            .filter(|&i| !self.nodes[i].is_dir())
            .collect();
        files.sort_by_key(|&i| {
            let node = &self.nodes[i];
            let parent = node.parent.unwrap_or(Self::ROOT);
            format!("{}{}{}", self.full_path(parent), SHALLOW_LAST, node.name)
        });
        files
    }

    /// Stored (on-image) size of a file node.
    pub fn stored_size(&self, id: NodeId) -> u64 {
        match &self.nodes[id].kind {
            NodeKind::Dir { .. } => 0,
            NodeKind::File {
                size,
                compressed_size,
                ..
            } => compressed_size.unwrap_or(*size),
        }
    }

    /// Stream a file node's payload into `sink`.
    pub fn write_payload(&self, id: NodeId, sink: &mut dyn Write) -> io::Result<()> {
        match &self.nodes[id].kind {
            NodeKind::Dir { .. } => Ok(()),
            NodeKind::File { data, .. } => match data {
                FileData::Disk(path) => {
                    let mut f = fs::File::open(path)?;
                    io::copy(&mut f, sink)?;
                    Ok(())
                }
                FileData::Memory(bytes) => sink.write_all(bytes),
                FileData::Writer(write) => write(sink),
            },
        }
    }
}

impl Default for FsTree {
    fn default() -> Self {
        Self::new()
    }
}
