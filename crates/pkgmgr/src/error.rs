use std::{borrow::Cow, fmt, panic::Location};

/// The fixed packaging-error taxonomy every adapter classifies its native tool's output into.
/// Each variant carries the package name it pertains to where one is known.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PackagingErrorKind {
    #[error("package not found: {0}")]
    PackageNotFound(String),
    #[error("package not installed: {0}")]
    PackageNotInstalled(String),
    #[error("failed to install package(s): {0}")]
    InstallFailed(String),
    #[error("failed to remove package(s): {0}")]
    RemoveFailed(String),
    #[error("failed to update package metadata")]
    UpdateFailed,
    #[error("failed to acquire package manager lock")]
    LockAcquireFailed,
    #[error("network unavailable")]
    NetworkUnavailable,
    #[error("repository already exists: {0}")]
    RepositoryExists(String),
    #[error("repository not found: {0}")]
    RepositoryNotFound(String),
    #[error("rejected unsafe input: {0}")]
    UnsafeInput(String),
}

struct PackagingErrorInner {
    kind: PackagingErrorKind,
    location: &'static Location<'static>,
    cause: Option<String>,
}

/// Structured adapter error: a taxonomy member plus the location it was raised and the
/// underlying native-tool stderr (or other cause) that was classified into that category.
pub struct PackagingError(Box<PackagingErrorInner>);

impl PackagingError {
    #[track_caller]
    pub fn new(kind: PackagingErrorKind) -> Self {
        PackagingError(Box::new(PackagingErrorInner {
            kind,
            location: Location::caller(),
            cause: None,
        }))
    }

    #[track_caller]
    pub fn with_cause(kind: PackagingErrorKind, cause: impl Into<String>) -> Self {
        PackagingError(Box::new(PackagingErrorInner {
            kind,
            location: Location::caller(),
            cause: Some(cause.into()),
        }))
    }

    /// Attach a specific package name to an already-classified error.
    #[track_caller]
    pub fn wrap_with_package(kind: PackagingErrorKind, pkg_name: &str, cause: impl Into<String>) -> Self {
        let kind = match kind {
            PackagingErrorKind::PackageNotFound(_) => {
                PackagingErrorKind::PackageNotFound(pkg_name.to_string())
            }
            PackagingErrorKind::PackageNotInstalled(_) => {
                PackagingErrorKind::PackageNotInstalled(pkg_name.to_string())
            }
            other => other,
        };
        PackagingError::with_cause(kind, cause)
    }

    pub fn kind(&self) -> &PackagingErrorKind {
        &self.0.kind
    }

    pub fn cause(&self) -> Option<&str> {
        self.0.cause.as_deref()
    }
}

impl fmt::Display for PackagingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.kind)
    }
}

impl fmt::Debug for PackagingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {}:{}",
            self.0.kind,
            self.0.location.file(),
            self.0.location.line()
        )?;
        if let Some(ref cause) = self.0.cause {
            write!(f, "\ncaused by: {cause}")?;
        }
        Ok(())
    }
}

impl std::error::Error for PackagingError {}

pub trait PackagingResultExt<T> {
    fn message(self, context: impl Into<Cow<'static, str>>) -> Result<T, PackagingError>;
}

impl<T> PackagingResultExt<T> for Result<T, PackagingError> {
    fn message(self, context: impl Into<Cow<'static, str>>) -> Result<T, PackagingError> {
        // Packaging errors are already classified at the point of construction; context is
        // folded into the cause string so it survives Debug formatting.
        self.map_err(|e| {
            let ctx = context.into();
            let cause = match e.0.cause.clone() {
                Some(c) => format!("{ctx}: {c}"),
                None => ctx.into_owned(),
            };
            PackagingError::with_cause(e.0.kind.clone(), cause)
        })
    }
}
