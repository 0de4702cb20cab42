use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PfsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot stage \"{}\": {source}", path.display())]
    Stage {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("file spans {blocks} blocks; two levels of indirection address at most {max}")]
    LayoutOverflow { blocks: u64, max: u64 },

    #[error("flat path table spans {blocks} blocks; only 12 direct slots are available")]
    PathTableTooLarge { blocks: u64 },

    #[error("image buffer is {actual} bytes; the layout needs {expected}")]
    ImageSizeMismatch { expected: u64, actual: u64 },
}

pub type Result<T> = std::result::Result<T, PfsError>;
