use std::error::Error as StdError;
use thiserror::Error;

/// Boxed foreign error kept as the cause of a wrapped failure
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Unified error type for deviate operations
#[derive(Error, Debug)]
pub enum DeviateError {
    #[error("configuration is invalid: {0}")]
    ConfigurationInvalid(String),

    #[error("remote git operation failed: {message}")]
    RemoteOperationFailed {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("local git operation failed: {message}")]
    LocalOperationFailed {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("github client failed: {message}")]
    GithubClientFailed {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("running \"{command}\" failed with exit code {code}\nStdout: {stdout}\nStderr: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("sync failed")]
    SyncFailed(#[source] Box<DeviateError>),
}

/// Convenience type alias for Results in deviate
pub type Result<T> = std::result::Result<T, DeviateError>;

/// Discriminant of [DeviateError], used to test a chain for a failure class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ConfigurationInvalid,
    RemoteOperationFailed,
    LocalOperationFailed,
    InvalidAddress,
    GithubClientFailed,
    CommandFailed,
    Cancelled,
    SyncFailed,
}

impl ErrorKind {
    /// Process exit status reported for a failure whose root cause has this kind
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::ConfigurationInvalid => 2,
            ErrorKind::RemoteOperationFailed => 3,
            ErrorKind::LocalOperationFailed => 4,
            ErrorKind::InvalidAddress => 5,
            ErrorKind::GithubClientFailed => 6,
            ErrorKind::Cancelled => 130,
            ErrorKind::CommandFailed | ErrorKind::SyncFailed => 1,
        }
    }
}

impl DeviateError {
    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        DeviateError::ConfigurationInvalid(msg.into())
    }

    /// Create a remote operation error without an underlying cause
    pub fn remote(msg: impl Into<String>) -> Self {
        DeviateError::RemoteOperationFailed {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a local operation error without an underlying cause
    pub fn local(msg: impl Into<String>) -> Self {
        DeviateError::LocalOperationFailed {
            message: msg.into(),
            source: None,
        }
    }

    /// Create an invalid address error for the given remote URL
    pub fn address(address: impl Into<String>) -> Self {
        DeviateError::InvalidAddress(address.into())
    }

    /// Create a GitHub client error without an underlying cause
    pub fn github(msg: impl Into<String>) -> Self {
        DeviateError::GithubClientFailed {
            message: msg.into(),
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DeviateError::ConfigurationInvalid(_) => ErrorKind::ConfigurationInvalid,
            DeviateError::RemoteOperationFailed { .. } => ErrorKind::RemoteOperationFailed,
            DeviateError::LocalOperationFailed { .. } => ErrorKind::LocalOperationFailed,
            DeviateError::InvalidAddress(_) => ErrorKind::InvalidAddress,
            DeviateError::GithubClientFailed { .. } => ErrorKind::GithubClientFailed,
            DeviateError::CommandFailed { .. } => ErrorKind::CommandFailed,
            DeviateError::Cancelled => ErrorKind::Cancelled,
            DeviateError::SyncFailed(_) => ErrorKind::SyncFailed,
        }
    }

    /// Reports whether this error, or any error in its source chain, has `kind`.
    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        self.chain().any(|e| e.kind() == kind)
    }

    /// The innermost deviate error of the chain; a foreign cause ends the walk.
    pub fn root(&self) -> &DeviateError {
        self.chain().last().unwrap_or(self)
    }

    /// Exit status of the innermost classified failure of the chain.
    ///
    /// Host command failures and the sync wrapper carry no class of their own, so
    /// a failed `git apply` below a local operation failure still exits with 4.
    pub fn exit_code(&self) -> i32 {
        // A cancelled git2 transfer surfaces as a remote failure; report the signal.
        if self.has_kind(ErrorKind::Cancelled) {
            return ErrorKind::Cancelled.exit_code();
        }
        self.chain()
            .map(|e| e.kind().exit_code())
            .filter(|code| *code != 1)
            .last()
            .unwrap_or(1)
    }

    fn chain(&self) -> impl Iterator<Item = &DeviateError> {
        let mut next: Option<&(dyn StdError + 'static)> = Some(self);
        std::iter::from_fn(move || {
            let err = next?;
            // `SyncFailed` exposes its boxed cause as the source.
            let current = match err.downcast_ref::<DeviateError>() {
                Some(current) => current,
                None => &**err.downcast_ref::<Box<DeviateError>>()?,
            };
            next = current.source();
            Some(current)
        })
    }
}

/// Wraps an error into [DeviateError::SyncFailed] unless it already is one.
pub fn sync_failed(err: DeviateError) -> DeviateError {
    match err {
        DeviateError::SyncFailed(_) => err,
        other => DeviateError::SyncFailed(Box::new(other)),
    }
}

/// Classifies foreign failures at the boundary where they are detected.
pub trait ResultExt<T> {
    fn remote_err(self, msg: impl Into<String>) -> Result<T>;
    fn local_err(self, msg: impl Into<String>) -> Result<T>;
    fn github_err(self, msg: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<BoxError>,
{
    fn remote_err(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| DeviateError::RemoteOperationFailed {
            message: msg.into(),
            source: Some(e.into()),
        })
    }

    fn local_err(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| DeviateError::LocalOperationFailed {
            message: msg.into(),
            source: Some(e.into()),
        })
    }

    fn github_err(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| DeviateError::GithubClientFailed {
            message: msg.into(),
            source: Some(e.into()),
        })
    }
}
