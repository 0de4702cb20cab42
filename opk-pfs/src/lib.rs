//! PFS (PlayStation File System) image builder.
//!
//! Builds the 64 KiB-block filesystem images embedded in PS4 packages: a
//! staged directory tree becomes an image with an inode table, directory
//! entries, a flat path table for O(1) lookup (plus a collision resolver
//! when path hashes clash), per-block HMAC-SHA256 signatures in signed
//! mode, and AES-XTS sector encryption in encrypted mode.
//!
//! # Example
//!
//! ```no_run
//! use opk_pfs::{FsTree, PfsBuilder, PfsProperties};
//!
//! # fn main() -> Result<(), opk_pfs::PfsError> {
//! let tree = FsTree::from_dir("staged".as_ref(), &|_| false)?;
//! let builder = PfsBuilder::new(PfsProperties::plain(0), tree)?;
//! let mut image = vec![0u8; builder.image_size() as usize];
//! builder.build(&mut image)?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod error;
pub mod header;
pub mod inode;
pub mod node;
pub mod path_table;
pub mod pfsc;
mod shared;

pub use builder::{BlockSigInfo, PfsBuilder, PfsProperties, DEFAULT_BLOCK_SIZE};
pub use error::{PfsError, Result};
pub use header::{PfsHeader, PfsMode};
pub use inode::{Dirent, DirentType, Inode, InodeFlags};
pub use node::{FileData, FsNode, FsTree, NodeId, NodeKind};
pub use path_table::{path_hash, FlatPathTable};

#[cfg(test)]
mod tests;
