//! The step abstraction (C1): a named, rollbackable unit of work. Modeled as a trait object
//! rather than a tagged enum, matching the teacher's preference for `Box<dyn Subsystem>` over a
//! closed enum of subsystem variants — the catalog of standard steps is open-ended and callers
//! supply their own custom steps, which a tagged enum cannot accommodate.

use std::time::Instant;

use crate::{context::Context, error::EngineError, types::StepResult};

/// A named, rollbackable unit of work inside a workflow.
pub trait Step: Send + Sync {
    /// Stable identifier, lowercase snake_case. Used for equality in event matching and must
    /// be unique within one workflow.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Cheap precondition check with no side effects. Called before `execute`.
    fn validate(&self, ctx: &Context) -> Result<(), EngineError>;

    /// Performs the step's work. Must honor `ctx.dry_run`: when true, make no persistent host
    /// changes and return `Completed`/`Skipped` describing what would have happened.
    fn execute(&self, ctx: &Context) -> StepResult;

    /// Undoes a previously `Completed` execution. Only ever called when `can_rollback()` is
    /// true. Must be idempotent: steps read the state map to learn what they did and treat
    /// "nothing to undo" as success.
    fn rollback(&self, ctx: &Context) -> Result<(), EngineError>;

    fn can_rollback(&self) -> bool;
}

/// Value holder for the name/description/rollback-capability metadata every concrete step
/// carries. Standard step bodies embed a `BaseStep` and delegate the metadata methods to it,
/// the way the teacher's subsystems carry their identity as plain fields rather than
/// re-deriving it per method.
#[derive(Debug, Clone)]
pub struct BaseStep {
    pub name: String,
    pub description: String,
    pub can_rollback: bool,
}

impl BaseStep {
    pub fn new(name: impl Into<String>, description: impl Into<String>, can_rollback: bool) -> Self {
        BaseStep {
            name: name.into(),
            description: description.into(),
            can_rollback,
        }
    }
}

type ValidateFn = dyn Fn(&Context) -> Result<(), EngineError> + Send + Sync;
type ExecuteFn = dyn Fn(&Context) -> StepResult + Send + Sync;
type RollbackFn = dyn Fn(&Context) -> Result<(), EngineError> + Send + Sync;

/// A step composed from closures rather than a dedicated struct/impl. `can_rollback()` is
/// derived from whether a rollback closure was supplied; `execute` measures wall-clock duration
/// and attaches it to the returned result, regardless of what the closure itself set.
pub struct FunctionStep {
    base: BaseStep,
    validate_fn: Option<Box<ValidateFn>>,
    execute_fn: Box<ExecuteFn>,
    rollback_fn: Option<Box<RollbackFn>>,
}

impl FunctionStep {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        execute_fn: impl Fn(&Context) -> StepResult + Send + Sync + 'static,
    ) -> Self {
        FunctionStep {
            base: BaseStep::new(name, description, false),
            validate_fn: None,
            execute_fn: Box::new(execute_fn),
            rollback_fn: None,
        }
    }

    pub fn with_validate(mut self, validate_fn: impl Fn(&Context) -> Result<(), EngineError> + Send + Sync + 'static) -> Self {
        self.validate_fn = Some(Box::new(validate_fn));
        self
    }

    pub fn with_rollback(mut self, rollback_fn: impl Fn(&Context) -> Result<(), EngineError> + Send + Sync + 'static) -> Self {
        self.base.can_rollback = true;
        self.rollback_fn = Some(Box::new(rollback_fn));
        self
    }
}

impl Step for FunctionStep {
    fn name(&self) -> &str {
        &self.base.name
    }

    fn description(&self) -> &str {
        &self.base.description
    }

    fn validate(&self, ctx: &Context) -> Result<(), EngineError> {
        match &self.validate_fn {
            Some(f) => f(ctx),
            None => Ok(()),
        }
    }

    fn execute(&self, ctx: &Context) -> StepResult {
        let start = Instant::now();
        let result = (self.execute_fn)(ctx);
        result.with_duration(start.elapsed())
    }

    fn rollback(&self, ctx: &Context) -> Result<(), EngineError> {
        match &self.rollback_fn {
            Some(f) => f(ctx),
            None => Ok(()),
        }
    }

    fn can_rollback(&self) -> bool {
        self.base.can_rollback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HostFacts;
    use crate::logger::NullLogger;
    use nv_installer_pkgmgr::adapters::apt::AptPackageManager;
    use nv_installer_pkgmgr::executor::mock::MockExecutor;
    use nv_installer_pkgmgr::privilege::mock::MockPrivilegeManager;
    use std::sync::Arc;

    fn test_context() -> Context {
        let executor = Arc::new(MockExecutor::new());
        let privilege = Arc::new(MockPrivilegeManager::new(true));
        let adapter = Arc::new(AptPackageManager::new(executor.clone(), privilege.clone()));
        Context::new(HostFacts::default(), adapter, executor, privilege, Arc::new(NullLogger))
    }

    #[test]
    fn function_step_without_rollback_reports_cannot_rollback() {
        let step = FunctionStep::new("probe", "probes the host", |_ctx| StepResult::complete("done"));
        assert!(!step.can_rollback());
    }

    #[test]
    fn function_step_with_rollback_reports_can_rollback() {
        let step = FunctionStep::new("probe", "probes the host", |_ctx| StepResult::complete("done"))
            .with_rollback(|_ctx| Ok(()));
        assert!(step.can_rollback());
    }

    #[test]
    fn function_step_execute_measures_duration() {
        let step = FunctionStep::new("probe", "probes the host", |_ctx| StepResult::complete("done"));
        let ctx = test_context();
        let result = step.execute(&ctx);
        // duration is always set by the wrapper regardless of what the closure returned.
        assert_eq!(result.status, crate::types::StepStatus::Completed);
    }

    #[test]
    fn default_validate_succeeds_when_no_closure_supplied() {
        let step = FunctionStep::new("probe", "probes the host", |_ctx| StepResult::complete("done"));
        let ctx = test_context();
        assert!(step.validate(&ctx).is_ok());
    }
}
