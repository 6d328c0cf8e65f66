//! Failure taxonomy of the copy engine

/// Why a copy request, or one branch of it, failed.
///
/// Resolution outcomes of "not found" are not errors; they only surface here once they make a
/// copy impossible (e.g. [`CopyError::SourceNotFound`]).
#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    #[error("expecting <src> [src...] <dest>")]
    Usage,
    #[error("{0}: source doesn't exist")]
    SourceNotFound(String),
    #[error("{0}: not copyable")]
    NotCopyable(String),
    #[error("copy: {0} is a directory")]
    DirectoryNotAllowed(String),
    #[error("{0}: is not a directory yet multiple paths are to be copied to it")]
    AmbiguousMultiDestination(String),
    #[error("copy [{0}]: no duplicates allowed when --allow-duplicates is not set")]
    DuplicateNotAllowed(String),
    #[error("cannot copy to a non existent parent: {0}")]
    NoSuchParent(String),
    #[error("{context}: {source:#}")]
    Transport {
        context: String,
        #[source]
        source: anyhow::Error,
    },
}

impl CopyError {
    pub fn transport(context: impl Into<String>, source: anyhow::Error) -> Self {
        CopyError::Transport {
            context: context.into(),
            source,
        }
    }

    /// True for failures detected before any remote mutation.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CopyError::Usage
                | CopyError::SourceNotFound(_)
                | CopyError::NotCopyable(_)
                | CopyError::DirectoryNotAllowed(_)
                | CopyError::AmbiguousMultiDestination(_)
        )
    }
}

/// Attaches a [`CopyError::Transport`] context to remote call results.
pub trait TransportContext<T> {
    fn transport_context<F, C>(self, context: F) -> Result<T, CopyError>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T> TransportContext<T> for anyhow::Result<T> {
    fn transport_context<F, C>(self, context: F) -> Result<T, CopyError>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|source| CopyError::transport(context(), source))
    }
}
