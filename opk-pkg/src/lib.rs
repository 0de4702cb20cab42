//! PS4 PKG container builder.
//!
//! Takes a [`PkgProject`] describing staged content and produces a complete
//! package file: header, entry table and payloads, PlayGo chunk hashes, the
//! embedded (signed, optionally encrypted) PFS image pair, the digest
//! cascade and the RSA header signature.
//!
//! # Example
//!
//! ```ignore
//! use opk_pkg::{PkgBuilder, PkgProject, VolumeType};
//!
//! let project = PkgProject::new(
//!     VolumeType::Ps4App,
//!     "UP0000-EXAM00001_00-EXAMPLE000000000",
//!     "00000000000000000000000000000000",
//!     "staged/",
//! );
//! let pkg = PkgBuilder::new(project)?.write("out.pkg", None)?;
//! println!("built {} entries", pkg.entries.len());
//! ```

pub mod builder;
pub mod entries;
pub mod error;
pub mod project;
pub mod sfo;
pub mod structs;

pub use builder::{Event, Pkg, PkgBuilder};
pub use error::{PkgError, Result, SfoError};
pub use project::{PfsOptions, PkgProject, VolumeType};
pub use sfo::{Sfo, SfoValue};
pub use structs::{EntryId, MetaEntry, PkgHeader};

#[cfg(test)]
mod tests;
