use std::fmt;

/// Errors returned by [`Tree`](crate::Tree) operations.
///
/// These mirror the original reference implementation's `errno`-style return
/// codes one-to-one, with one deliberate omission: there is no `Enomem`
/// variant. Allocation failure in Rust's global allocator aborts the process
/// rather than producing a recoverable error, so modeling it here would be
/// dishonest about what callers can actually handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeError {
    /// the path does not satisfy the path grammar
    Einval,
    /// the target of a create, or the destination of a move, already exists
    Eexist,
    /// a path component referenced by the operation does not exist
    Enoent,
    /// a directory being removed is non-empty
    Enotempty,
    /// the operation is not permitted on the root
    Ebusy,
}

impl TreeError {
    /// A short, stable machine-readable name, analogous to a POSIX errno
    /// mnemonic.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Einval => "EINVAL",
            Self::Eexist => "EEXIST",
            Self::Enoent => "ENOENT",
            Self::Enotempty => "ENOTEMPTY",
            Self::Ebusy => "EBUSY",
        }
    }
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::Einval => "path is not well-formed",
            Self::Eexist => "path already exists",
            Self::Enoent => "path does not exist",
            Self::Enotempty => "directory is not empty",
            Self::Ebusy => "operation not permitted on the root",
        };
        write!(f, "{} ({})", msg, self.name())
    }
}

impl std::error::Error for TreeError {}

pub type TreeResult<T> = Result<T, TreeError>;
