//! The workflow (C3): an ordered sequence of steps with progress reporting, cancellation, and
//! reverse-order rollback of completed steps.

use std::{
    sync::{Arc, Mutex, RwLock},
    time::Instant,
};

use crate::{
    context::Context,
    error::{EngineError, RollbackError, StepError},
    step::Step,
    types::{Progress, StepResult, StepStatus, WorkflowResult, WorkflowStatus},
};

/// Shared so the orchestrator can forward its own progress callback into the workflow's slot
/// without an unsafe lifetime extension — both hold the same `Arc`.
pub type ProgressCallback = dyn Fn(&Progress) + Send + Sync;

/// Ordered sequence of steps, driven sequentially. Interior mutability follows the teacher's
/// own convention for shared engine state (`std::sync::Mutex`/`RwLock`, not channels or an
/// async runtime) since execution within one run is single-threaded; the locks exist so
/// concurrent *readers* (tests, a status endpoint) observe consistent snapshots.
pub struct Workflow {
    pub name: String,
    steps: Vec<Box<dyn Step>>,
    cancelled: std::sync::atomic::AtomicBool,
    completed_steps: RwLock<Vec<String>>,
    progress_callback: Mutex<Option<Arc<ProgressCallback>>>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Workflow {
            name: name.into(),
            steps: Vec::new(),
            cancelled: std::sync::atomic::AtomicBool::new(false),
            completed_steps: RwLock::new(Vec::new()),
            progress_callback: Mutex::new(None),
        }
    }

    pub fn add_step(&mut self, step: Box<dyn Step>) {
        self.steps.push(step);
    }

    /// Snapshot of step names in execution order; readers must not see later mutations.
    pub fn steps(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn on_progress(&self, callback: impl Fn(&Progress) + Send + Sync + 'static) {
        *self.progress_callback.lock().unwrap() = Some(Arc::new(callback));
    }

    /// Installs an already-shared callback, e.g. one the orchestrator also holds a handle to.
    pub fn on_progress_shared(&self, callback: Arc<ProgressCallback>) {
        *self.progress_callback.lock().unwrap() = Some(callback);
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn report_progress(&self, progress: Progress) {
        if let Some(cb) = self.progress_callback.lock().unwrap().as_ref() {
            cb(&progress);
        }
    }

    /// Snapshot of the steps that have completed so far in the current/most recent run, in
    /// execution order.
    pub fn completed_steps(&self) -> Vec<String> {
        self.completed_steps.read().unwrap().clone()
    }

    /// Resets the cancellation flag and completed-steps tracking for a fresh run. Called by
    /// `execute()` itself; also called by the orchestrator before it drives steps directly
    /// (step hooks present), since that path bypasses `execute()` entirely.
    pub fn reset_run_state(&self) {
        self.cancelled.store(false, std::sync::atomic::Ordering::SeqCst);
        *self.completed_steps.write().unwrap() = Vec::new();
    }

    /// Validates then executes the named step, reporting progress the same way `execute()`
    /// does. Returns `None` if no step with that name exists. Used by the orchestrator when it
    /// drives steps itself (step hooks present) instead of delegating to `execute()`.
    pub fn run_named_step(&self, ctx: &Context, index: usize, total: usize, name: &str) -> Option<StepResult> {
        let step = self.steps.iter().find(|s| s.name() == name)?;

        self.report_progress(Progress::new(step.name(), index, total, format!("Starting: {}", step.description())));

        if let Err(e) = step.validate(ctx) {
            return Some(StepResult::fail(e.to_string(), e.to_string()));
        }

        let result = step.execute(ctx);
        match result.status {
            StepStatus::Completed => {
                self.completed_steps.write().unwrap().push(name.to_string());
                self.report_progress(Progress::new(step.name(), index, total, "Completed"));
            }
            StepStatus::Skipped => {
                self.report_progress(Progress::new(step.name(), index, total, "Skipped"));
            }
            _ => {}
        }
        Some(result)
    }

    /// Drives steps sequentially per the dispatch algorithm: reset tracking state, then for
    /// each step check cancellation, validate, execute, and dispatch on the returned status.
    #[tracing::instrument(skip_all, fields(workflow = %self.name))]
    pub fn execute(&self, ctx: &Context) -> WorkflowResult {
        self.reset_run_state();

        let total_steps = self.steps.len();
        let start = Instant::now();
        let mut result = WorkflowResult::pending();
        result.status = WorkflowStatus::Running;

        for (index, step) in self.steps.iter().enumerate() {
            if self.is_cancelled() || ctx.is_cancelled() {
                result.status = WorkflowStatus::Cancelled;
                result.total_duration = start.elapsed();
                return result;
            }

            self.report_progress(Progress::new(
                step.name(),
                index,
                total_steps,
                format!("Starting: {}", step.description()),
            ));

            if let Err(e) = step.validate(ctx) {
                result.status = WorkflowStatus::Failed;
                result.failed_step = Some(step.name().to_string());
                result.error = Some(e.to_string());
                result.total_duration = start.elapsed();
                return result;
            }

            let step_result = step.execute(ctx);
            match step_result.status {
                StepStatus::Completed => {
                    self.completed_steps.write().unwrap().push(step.name().to_string());
                    result.completed_steps.push(step.name().to_string());
                    self.report_progress(Progress::new(step.name(), index, total_steps, "Completed"));
                }
                StepStatus::Skipped => {
                    self.report_progress(Progress::new(step.name(), index, total_steps, "Skipped"));
                }
                StepStatus::Failed => {
                    result.status = WorkflowStatus::Failed;
                    result.failed_step = Some(step.name().to_string());
                    result.error = step_result.error.or(Some(step_result.message));
                    result.total_duration = start.elapsed();
                    return result;
                }
                other => {
                    let err = EngineError::from(StepError::UnexpectedStatus {
                        step: step.name().to_string(),
                    });
                    result.status = WorkflowStatus::Failed;
                    result.failed_step = Some(step.name().to_string());
                    result.error = Some(format!("{err} (status was {other:?})"));
                    result.total_duration = start.elapsed();
                    return result;
                }
            }
        }

        result.status = WorkflowStatus::Completed;
        result.total_duration = start.elapsed();
        self.report_progress(Progress::new("", total_steps, total_steps, "Workflow completed successfully"));
        result
    }

    /// Traverses the recorded completed-steps list in reverse order, rolling back every step
    /// whose `can_rollback()` is true. Never aborts on the first failure — every rollbackable
    /// completed step gets a chance to undo its effects, and errors are collected into an
    /// aggregate.
    #[tracing::instrument(skip_all, fields(workflow = %self.name))]
    pub fn rollback(&self, ctx: &Context) -> Result<(), EngineError> {
        let completed = self.completed_steps.read().unwrap().clone();
        self.rollback_steps(ctx, &completed)
    }

    /// Same traversal as `rollback`, but over an explicit list of step names rather than the
    /// workflow's own tracking — used by the orchestrator when it drove execution itself.
    pub fn rollback_steps(&self, ctx: &Context, completed_step_names: &[String]) -> Result<(), EngineError> {
        self.rollback_steps_with(ctx, completed_step_names, |_, _| {})
    }

    /// Same traversal as `rollback_steps`, but invokes `on_step(name, outcome)` immediately
    /// before and after each rollbackable step's `rollback()` call (outcome is `None` for the
    /// "about to roll back" notification, `Some(&result)` for the "finished" one). The
    /// orchestrator uses this to emit a `StepRollbackStarted`/`StepRollbackCompleted` pair per
    /// step, per the event-log invariant that a `rollback_performed` run's log contains at
    /// least one such pair.
    pub fn rollback_steps_with(
        &self,
        ctx: &Context,
        completed_step_names: &[String],
        mut on_step: impl FnMut(&str, Option<&Result<(), EngineError>>),
    ) -> Result<(), EngineError> {
        let by_name: std::collections::HashMap<&str, &Box<dyn Step>> =
            self.steps.iter().map(|s| (s.name(), s)).collect();

        let mut failures = 0usize;
        let mut last_error: Option<EngineError> = None;

        for name in completed_step_names.iter().rev() {
            let Some(step) = by_name.get(name.as_str()) else {
                continue;
            };
            if !step.can_rollback() {
                continue;
            }
            on_step(name, None);
            let outcome = step.rollback(ctx);
            on_step(name, Some(&outcome));
            if let Err(e) = outcome {
                failures += 1;
                last_error = Some(e);
            }
        }

        if failures > 0 {
            let aggregate = EngineError::from(RollbackError::Aggregate(failures));
            return Err(last_error.unwrap_or(aggregate));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{context::HostFacts, logger::NullLogger, step::FunctionStep, types::StepResult};
    use nv_installer_pkgmgr::adapters::apt::AptPackageManager;
    use nv_installer_pkgmgr::executor::mock::MockExecutor;
    use nv_installer_pkgmgr::privilege::mock::MockPrivilegeManager;
    use std::sync::{Arc, Mutex as StdMutex};

    fn test_context() -> Context {
        let executor = Arc::new(MockExecutor::new());
        let privilege = Arc::new(MockPrivilegeManager::new(true));
        let adapter = Arc::new(AptPackageManager::new(executor.clone(), privilege.clone()));
        Context::new(HostFacts::default(), adapter, executor, privilege, Arc::new(NullLogger))
    }

    #[test]
    fn executes_steps_in_order_and_tracks_completed() {
        let mut workflow = Workflow::new("test-workflow");
        workflow.add_step(Box::new(FunctionStep::new("one", "first", |_| StepResult::complete("ok"))));
        workflow.add_step(Box::new(FunctionStep::new("two", "second", |_| StepResult::complete("ok"))));
        let ctx = test_context();

        let result = workflow.execute(&ctx);
        assert_eq!(result.status, WorkflowStatus::Completed);
        assert_eq!(result.completed_steps, vec!["one", "two"]);
    }

    #[test]
    fn skipped_steps_are_not_in_completed_list() {
        let mut workflow = Workflow::new("test-workflow");
        workflow.add_step(Box::new(FunctionStep::new("one", "first", |_| StepResult::skip("not needed"))));
        let ctx = test_context();

        let result = workflow.execute(&ctx);
        assert_eq!(result.status, WorkflowStatus::Completed);
        assert!(result.completed_steps.is_empty());
    }

    #[test]
    fn stops_on_first_failure() {
        let mut workflow = Workflow::new("test-workflow");
        workflow.add_step(Box::new(FunctionStep::new("one", "first", |_| StepResult::complete("ok"))));
        workflow.add_step(Box::new(FunctionStep::new("two", "second", |_| StepResult::fail("boom", "boom"))));
        workflow.add_step(Box::new(FunctionStep::new("three", "third", |_| StepResult::complete("ok"))));
        let ctx = test_context();

        let result = workflow.execute(&ctx);
        assert_eq!(result.status, WorkflowStatus::Failed);
        assert_eq!(result.failed_step.as_deref(), Some("two"));
        assert_eq!(result.completed_steps, vec!["one"]);
    }

    #[test]
    fn cancellation_before_a_step_stops_the_workflow() {
        let mut workflow = Workflow::new("test-workflow");
        workflow.add_step(Box::new(FunctionStep::new("one", "first", |_| StepResult::complete("ok"))));
        workflow.add_step(Box::new(FunctionStep::new("two", "second", |ctx| {
            ctx.cancel();
            StepResult::complete("ok")
        })));
        workflow.add_step(Box::new(FunctionStep::new("three", "third", |_| StepResult::complete("ok"))));
        let ctx = test_context();

        let result = workflow.execute(&ctx);
        assert_eq!(result.status, WorkflowStatus::Cancelled);
        assert_eq!(result.completed_steps, vec!["one", "two"]);
    }

    #[test]
    fn rollback_runs_in_reverse_order_over_completed_rollbackable_steps() {
        let order: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));

        let mut workflow = Workflow::new("test-workflow");
        let order1 = order.clone();
        workflow.add_step(Box::new(
            FunctionStep::new("one", "first", |_| StepResult::complete("ok"))
                .with_rollback(move |_| {
                    order1.lock().unwrap().push("one".to_string());
                    Ok(())
                }),
        ));
        let order2 = order.clone();
        workflow.add_step(Box::new(
            FunctionStep::new("two", "second", |_| StepResult::complete("ok"))
                .with_rollback(move |_| {
                    order2.lock().unwrap().push("two".to_string());
                    Ok(())
                }),
        ));
        let ctx = test_context();

        workflow.execute(&ctx);
        workflow.rollback(&ctx).unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["two", "one"]);
    }

    #[test]
    fn non_rollbackable_steps_are_skipped_during_rollback() {
        let mut workflow = Workflow::new("test-workflow");
        workflow.add_step(Box::new(FunctionStep::new("one", "first", |_| StepResult::complete("ok"))));
        let ctx = test_context();

        workflow.execute(&ctx);
        assert!(workflow.rollback(&ctx).is_ok());
    }

    #[test]
    fn rollback_continues_past_individual_failures_and_aggregates() {
        let mut workflow = Workflow::new("test-workflow");
        let invoked: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));

        let invoked1 = invoked.clone();
        workflow.add_step(Box::new(
            FunctionStep::new("one", "first", |_| StepResult::complete("ok")).with_rollback(move |_| {
                invoked1.lock().unwrap().push("one".to_string());
                Ok(())
            }),
        ));
        let invoked2 = invoked.clone();
        workflow.add_step(Box::new(
            FunctionStep::new("two", "second", |_| StepResult::complete("ok")).with_rollback(move |_| {
                invoked2.lock().unwrap().push("two".to_string());
                Err(EngineError::from(crate::error::RollbackError::StepRollbackFailed {
                    step: "two".to_string(),
                    message: "disk busy".to_string(),
                }))
            }),
        ));
        let ctx = test_context();

        workflow.execute(&ctx);
        let result = workflow.rollback(&ctx);
        assert!(result.is_err());
        assert_eq!(*invoked.lock().unwrap(), vec!["two", "one"]);
    }
}
