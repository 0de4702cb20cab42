use opk_pfs::PfsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PkgError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing required file: {0}")]
    MissingRequiredFile(String),

    #[error("invalid project: {0}")]
    InvalidProject(String),

    #[error("SC entries span {actual} bytes but the header promises {expected}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("cryptographic failure: {0}")]
    Crypto(String),

    #[error(transparent)]
    Pfs(#[from] PfsError),

    #[error("param.sfo: {0}")]
    Sfo(#[from] SfoError),
}

/// Errors raised while parsing or editing a System File Object.
#[derive(Debug, Error)]
pub enum SfoError {
    #[error("invalid SFO magic")]
    InvalidMagic,

    #[error("truncated SFO: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("unsupported value format {0:#06x}")]
    UnsupportedFormat(u16),

    #[error("key table entry is not valid UTF-8")]
    BadKey,
}

pub type Result<T> = std::result::Result<T, PkgError>;
