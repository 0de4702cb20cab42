//! Project configuration handed to the builder by front-ends.

use std::path::PathBuf;

use chrono::NaiveDate;

use crate::error::PkgError;
use crate::structs::{content_flags, content_type};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeType {
    Ps4App,
    Ps4Patch,
    Ps4Remaster,
    Ps4AcData,
    Ps4AcNodata,
    Ps4SfTheme,
    Ps4Theme,
}

impl VolumeType {
    /// Parse the project-file identifier (`pkg_ps4_app`, ...).
    pub fn from_id(id: &str) -> Option<VolumeType> {
        match id {
            "pkg_ps4_app" => Some(VolumeType::Ps4App),
            "pkg_ps4_patch" => Some(VolumeType::Ps4Patch),
            "pkg_ps4_remaster" => Some(VolumeType::Ps4Remaster),
            "pkg_ps4_ac_data" => Some(VolumeType::Ps4AcData),
            "pkg_ps4_ac_nodata" => Some(VolumeType::Ps4AcNodata),
            "pkg_ps4_sf_theme" => Some(VolumeType::Ps4SfTheme),
            "pkg_ps4_theme" => Some(VolumeType::Ps4Theme),
            _ => None,
        }
    }

    pub fn content_type(self) -> u32 {
        match self {
            VolumeType::Ps4App => content_type::GD,
            VolumeType::Ps4Patch | VolumeType::Ps4Remaster => content_type::DP,
            VolumeType::Ps4AcData | VolumeType::Ps4SfTheme | VolumeType::Ps4Theme => {
                content_type::AC
            }
            VolumeType::Ps4AcNodata => content_type::AL,
        }
    }

    pub fn base_content_flags(self) -> u32 {
        match self {
            VolumeType::Ps4App | VolumeType::Ps4AcData | VolumeType::Ps4AcNodata => {
                content_flags::GD_AC
            }
            VolumeType::Ps4Patch => content_flags::GD_AC | content_flags::FIRST_PATCH,
            VolumeType::Ps4Remaster => content_flags::GD_AC | content_flags::REMASTER,
            VolumeType::Ps4SfTheme | VolumeType::Ps4Theme => {
                content_flags::GD_AC | content_flags::NON_GAME
            }
        }
    }

    /// AL packages carry no filesystem image.
    pub fn has_pfs(self) -> bool {
        self != VolumeType::Ps4AcNodata
    }

    /// Only GD content carries the PlayGo chunk entries.
    pub fn is_gd(self) -> bool {
        self.content_type() == content_type::GD
    }
}

/// Filesystem-image options of a project.
#[derive(Debug, Clone)]
pub struct PfsOptions {
    pub sign: bool,
    pub encrypt: bool,
    /// Use the second-generation key derivation (bit 61 of `pfs_flags`).
    pub new_crypt: bool,
    pub block_size: u32,
    /// Image seed; drawn fresh when absent.
    pub seed: Option<[u8; 16]>,
    /// Minimum number of blocks in the outer image.
    pub min_blocks: u64,
    /// EKPFS override; derived from content id and passcode when absent.
    pub ekpfs: Option<[u8; 32]>,
    /// Timestamp stamped into every inode, seconds since the epoch.
    pub file_time: i64,
}

impl Default for PfsOptions {
    fn default() -> Self {
        Self {
            sign: true,
            encrypt: true,
            new_crypt: false,
            block_size: opk_pfs::DEFAULT_BLOCK_SIZE,
            seed: None,
            min_blocks: 0,
            ekpfs: None,
            file_time: 0,
        }
    }
}

pub struct PkgProject {
    /// 36-byte ASCII content id (`XXNNNN-CUSANNNNN_00-...`).
    pub content_id: String,
    /// 32-character passcode.
    pub passcode: String,
    /// Optional entitlement key as 32 hex digits.
    pub entitlement_key: Option<String>,
    pub volume_type: VolumeType,
    /// `c_date` stamped into PUBTOOLINFO; derived from `file_time` when
    /// absent.
    pub creation_date: Option<NaiveDate>,
    /// Include `c_time` in PUBTOOLINFO.
    pub use_creation_time: bool,
    /// Staged directory tree.
    pub root_dir: PathBuf,
    pub pfs: PfsOptions,
}

impl PkgProject {
    pub fn new(
        volume_type: VolumeType,
        content_id: &str,
        passcode: &str,
        root_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            content_id: content_id.to_string(),
            passcode: passcode.to_string(),
            entitlement_key: None,
            volume_type,
            creation_date: None,
            use_creation_time: false,
            root_dir: root_dir.into(),
            pfs: PfsOptions::default(),
        }
    }

    pub fn validate(&self) -> Result<(), PkgError> {
        if self.content_id.len() != 36 || !self.content_id.is_ascii() {
            return Err(PkgError::InvalidProject(format!(
                "content id must be 36 ASCII characters, got \"{}\"",
                self.content_id
            )));
        }
        if self.passcode.len() != 32 {
            return Err(PkgError::InvalidProject(format!(
                "passcode must be 32 characters, got {}",
                self.passcode.len()
            )));
        }
        if let Some(key) = &self.entitlement_key {
            if key.len() != 32 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(PkgError::InvalidProject(
                    "entitlement key must be 32 hex digits".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Entitlement key as bytes, when configured.
    pub fn entitlement_key_bytes(&self) -> Option<[u8; 16]> {
        let key = self.entitlement_key.as_ref()?;
        let mut out = [0u8; 16];
        for (i, chunk) in key.as_bytes().chunks(2).take(16).enumerate() {
            let hex = std::str::from_utf8(chunk).ok()?;
            out[i] = u8::from_str_radix(hex, 16).ok()?;
        }
        Some(out)
    }
}
