use std::{borrow::Cow, fmt, panic::Location};

/// A step declared a precondition that does not hold; surfaced by `Step::validate`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("step '{step}' failed validation: {reason}")]
    PreconditionFailed { step: String, reason: String },
}

/// A step's `execute` body failed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StepError {
    #[error("step '{step}' failed: {message}")]
    ExecutionFailed { step: String, message: String },
    #[error("step '{step}' returned an unexpected status")]
    UnexpectedStatus { step: String },
}

/// A step's `rollback` body failed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RollbackError {
    #[error("rollback of step '{step}' failed: {message}")]
    StepRollbackFailed { step: String, message: String },
    #[error("{0} step(s) failed to roll back")]
    Aggregate(usize),
}

/// A hook installed on the orchestrator (pre/post-execute, pre/post-step) errored.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HookError {
    #[error("pre-execute hook failed: {0}")]
    PreExecute(String),
    #[error("post-execute hook failed: {0}")]
    PostExecute(String),
    #[error("pre-step hook failed for step '{step}': {message}")]
    PreStep { step: String, message: String },
    #[error("post-step hook failed for step '{step}': {message}")]
    PostStep { step: String, message: String },
}

/// The workflow builder refused to assemble a workflow.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuilderError {
    #[error("unsupported distribution family")]
    UnsupportedFamily,
    #[error("distribution is nil")]
    MissingHostFacts,
}

/// Top-level category for every error the engine can produce. Mirrors the shape of a
/// category-of-categories error type: each variant wraps one of the enums above, with
/// a transparent `Display` so printing an `EngineError` shows the innermost message.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Step(#[from] StepError),
    #[error(transparent)]
    Rollback(#[from] RollbackError),
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error(transparent)]
    Builder(#[from] BuilderError),
    #[error(transparent)]
    Packaging(#[from] nv_installer_pkgmgr::PackagingError),
}

struct EngineErrorInner {
    kind: ErrorKind,
    location: &'static Location<'static>,
    source: Option<anyhow::Error>,
    context: Vec<(Cow<'static, str>, &'static Location<'static>)>,
}

/// Opaque engine error. Carries a category (`ErrorKind`), the call site that raised it,
/// an optional underlying cause, and a stack of human-readable context messages attached
/// as the error propagated up through `.message(...)`.
pub struct EngineError(Box<EngineErrorInner>);

impl EngineError {
    #[track_caller]
    pub fn new(kind: impl Into<ErrorKind>) -> Self {
        EngineError(Box::new(EngineErrorInner {
            kind: kind.into(),
            location: Location::caller(),
            source: None,
            context: Vec::new(),
        }))
    }

    #[track_caller]
    pub fn with_source(kind: impl Into<ErrorKind>, source: anyhow::Error) -> Self {
        EngineError(Box::new(EngineErrorInner {
            kind: kind.into(),
            location: Location::caller(),
            source: Some(source),
            context: Vec::new(),
        }))
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.0.kind
    }
}

/// Attach a category to a fallible result, turning any error into a structured `EngineError`
/// while preserving the original cause.
pub trait ReportError<T, K> {
    fn structured(self, kind: K) -> Result<T, EngineError>;
}

impl<T, E, K> ReportError<T, K> for Result<T, E>
where
    E: Into<anyhow::Error>,
    K: Into<ErrorKind>,
{
    #[track_caller]
    fn structured(self, kind: K) -> Result<T, EngineError> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(EngineError::with_source(kind, e.into())),
        }
    }
}

/// Attach additional human-readable context to an already-structured error without
/// discarding its category or cause.
pub trait EngineResultExt<T> {
    fn message(self, context: impl Into<Cow<'static, str>>) -> Result<T, EngineError>;
}

impl<T> EngineResultExt<T> for Result<T, EngineError> {
    #[track_caller]
    fn message(mut self, context: impl Into<Cow<'static, str>>) -> Result<T, EngineError> {
        if let Err(ref mut e) = self {
            e.0.context.push((context.into(), Location::caller()));
        }
        self
    }
}

impl fmt::Debug for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {}:{}",
            self.0.kind,
            self.0.location.file(),
            self.0.location.line()
        )?;
        for (i, (ctx, loc)) in self.0.context.iter().enumerate() {
            write!(f, "\n  {i}: {ctx} at {}:{}", loc.file(), loc.line())?;
        }
        if let Some(ref source) = self.0.source {
            write!(f, "\ncaused by: {source:#}")?;
        }
        Ok(())
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.kind)
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<ValidationError> for EngineError {
    #[track_caller]
    fn from(e: ValidationError) -> Self {
        EngineError::new(e)
    }
}
impl From<StepError> for EngineError {
    #[track_caller]
    fn from(e: StepError) -> Self {
        EngineError::new(e)
    }
}
impl From<RollbackError> for EngineError {
    #[track_caller]
    fn from(e: RollbackError) -> Self {
        EngineError::new(e)
    }
}
impl From<HookError> for EngineError {
    #[track_caller]
    fn from(e: HookError) -> Self {
        EngineError::new(e)
    }
}
impl From<BuilderError> for EngineError {
    #[track_caller]
    fn from(e: BuilderError) -> Self {
        EngineError::new(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_preserves_kind_and_adds_context() {
        let err: Result<(), EngineError> =
            Err(EngineError::new(BuilderError::UnsupportedFamily)).message("building workflow");
        let err = err.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Builder(BuilderError::UnsupportedFamily)));
        assert_eq!(format!("{err}"), "unsupported distribution family");
    }
}
