use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("no such file or directory")]
    NotFound,
    #[error("entry already exists")]
    AlreadyExists,
    #[error("operation not supported for this kind of entry")]
    Unsupported,
    #[error("no space left on device")]
    NoSpace,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("device i/o error")]
    IoError,
    /// A handle refers to nothing: a discarded entry, an unbound entry,
    /// or a record that is not resident.
    #[error("handle refers to no entry or record")]
    NullArgument,
    #[error("on-disk structure is corrupted")]
    Corrupted,
}

pub type Result<T> = core::result::Result<T, FsError>;
