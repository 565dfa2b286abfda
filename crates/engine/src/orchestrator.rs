//! The orchestrator (C4): wraps a workflow and adds hooks, auto-rollback policy, event
//! logging, and execution-report generation.

use std::{
    sync::{Arc, RwLock},
    time::Instant,
};

use chrono::Utc;

use crate::{
    context::Context,
    error::{EngineError, HookError},
    types::{EventType, ExecutionEvent, ExecutionReport, Progress, StepStatus, WorkflowStatus},
    workflow::{ProgressCallback, Workflow},
};

type Hook = dyn Fn(&Context) -> Result<(), EngineError> + Send + Sync;
type StepHook = dyn Fn(&Context, &str) -> Result<(), EngineError> + Send + Sync;

/// Immutable construction-time options. Built once via `OrchestratorOptions::builder()`-style
/// chained setters and handed to `Orchestrator::new`.
#[derive(Default)]
pub struct OrchestratorOptions {
    pub auto_rollback: bool,
    pub stop_on_first_error: bool,
    pub dry_run: bool,
    pub pre_execute_hook: Option<Box<Hook>>,
    pub post_execute_hook: Option<Box<Hook>>,
    pub pre_step_hook: Option<Box<StepHook>>,
    pub post_step_hook: Option<Box<StepHook>>,
    pub progress_callback: Option<Arc<ProgressCallback>>,
}

impl OrchestratorOptions {
    pub fn new() -> Self {
        OrchestratorOptions {
            auto_rollback: false,
            stop_on_first_error: true,
            dry_run: false,
            pre_execute_hook: None,
            post_execute_hook: None,
            pre_step_hook: None,
            post_step_hook: None,
            progress_callback: None,
        }
    }

    pub fn with_auto_rollback(mut self, value: bool) -> Self {
        self.auto_rollback = value;
        self
    }

    pub fn with_stop_on_first_error(mut self, value: bool) -> Self {
        self.stop_on_first_error = value;
        self
    }

    pub fn with_dry_run(mut self, value: bool) -> Self {
        self.dry_run = value;
        self
    }

    pub fn with_pre_execute_hook(mut self, hook: impl Fn(&Context) -> Result<(), EngineError> + Send + Sync + 'static) -> Self {
        self.pre_execute_hook = Some(Box::new(hook));
        self
    }

    pub fn with_post_execute_hook(mut self, hook: impl Fn(&Context) -> Result<(), EngineError> + Send + Sync + 'static) -> Self {
        self.post_execute_hook = Some(Box::new(hook));
        self
    }

    pub fn with_pre_step_hook(mut self, hook: impl Fn(&Context, &str) -> Result<(), EngineError> + Send + Sync + 'static) -> Self {
        self.pre_step_hook = Some(Box::new(hook));
        self
    }

    pub fn with_post_step_hook(mut self, hook: impl Fn(&Context, &str) -> Result<(), EngineError> + Send + Sync + 'static) -> Self {
        self.post_step_hook = Some(Box::new(hook));
        self
    }

    pub fn with_progress_callback(mut self, callback: impl Fn(&Progress) + Send + Sync + 'static) -> Self {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    fn has_step_hooks(&self) -> bool {
        self.pre_step_hook.is_some() || self.post_step_hook.is_some()
    }
}

/// Drives a `Workflow`, adding hooks, auto-rollback, and a structured event log that folds
/// into an `ExecutionReport`. Reusable across runs via `reset()`.
pub struct Orchestrator {
    workflow: Workflow,
    options: OrchestratorOptions,
    event_log: RwLock<Vec<ExecutionEvent>>,
    tracked_steps: RwLock<Vec<String>>,
}

impl Orchestrator {
    pub fn new(workflow: Workflow, options: OrchestratorOptions) -> Self {
        Orchestrator {
            workflow,
            options,
            event_log: RwLock::new(Vec::new()),
            tracked_steps: RwLock::new(Vec::new()),
        }
    }

    /// Snapshot of the event log accumulated by the most recent `execute()` call.
    pub fn get_execution_log(&self) -> Vec<ExecutionEvent> {
        self.event_log.read().unwrap().clone()
    }

    /// Clears the event log and tracked-steps list so the orchestrator can be reused for an
    /// independent run. No state bleeds between runs even without calling this explicitly,
    /// since `execute()` always starts from a fresh log — `reset()` exists for callers that
    /// want to release memory between runs without starting another run immediately.
    pub fn reset(&self) {
        self.event_log.write().unwrap().clear();
        self.tracked_steps.write().unwrap().clear();
    }

    fn emit(&self, event: ExecutionEvent) {
        self.event_log.write().unwrap().push(event);
    }

    /// Drives one complete run: hooks, step execution (directly or delegated to the workflow
    /// depending on whether step hooks are set), auto-rollback, and report generation. Each
    /// call begins with a fresh event log and empty tracked-steps list.
    #[tracing::instrument(skip_all, fields(workflow = %self.workflow.name))]
    pub fn execute(&self, ctx: &mut Context) -> ExecutionReport {
        *self.event_log.write().unwrap() = Vec::new();
        *self.tracked_steps.write().unwrap() = Vec::new();

        if self.options.dry_run {
            ctx.dry_run = true;
        }

        let started_at = Utc::now();
        let start = Instant::now();
        self.emit(ExecutionEvent::new(EventType::WorkflowStarted, "workflow started"));

        if let Some(ref hook) = self.options.pre_execute_hook {
            if let Err(e) = hook(ctx) {
                let err = EngineError::from(HookError::PreExecute(e.to_string()));
                self.emit(ExecutionEvent::new(EventType::WorkflowFailed, "pre-execute hook failed").with_error(err.to_string()));
                return self.finish_report(WorkflowStatus::Failed, started_at, Some(err.to_string()));
            }
        }

        if let Some(ref cb) = self.options.progress_callback {
            self.workflow.on_progress_shared(cb.clone());
        }

        let (status, completed_steps, failed_step, mut error) = if self.options.has_step_hooks() {
            self.execute_steps_directly(ctx)
        } else {
            let result = self.workflow.execute(ctx);
            *self.tracked_steps.write().unwrap() = result.completed_steps.clone();
            (result.status, result.completed_steps, result.failed_step, result.error)
        };

        let mut final_status = status;

        if final_status == WorkflowStatus::Failed && self.options.auto_rollback {
            self.emit(ExecutionEvent::new(EventType::WorkflowRollbackStarted, "starting rollback"));
            let names = if self.options.has_step_hooks() {
                self.tracked_steps.read().unwrap().clone()
            } else {
                self.workflow.completed_steps()
            };
            let rollback_result = self.workflow.rollback_steps_with(ctx, &names, |name, outcome| match outcome {
                None => self.emit(ExecutionEvent::for_step(EventType::StepRollbackStarted, name, "rolling back")),
                Some(Ok(())) => {
                    self.emit(ExecutionEvent::for_step(EventType::StepRollbackCompleted, name, "rolled back"))
                }
                Some(Err(e)) => self.emit(
                    ExecutionEvent::for_step(EventType::StepRollbackCompleted, name, "rollback failed").with_error(e.to_string()),
                ),
            });
            match rollback_result {
                Ok(()) => {
                    self.emit(ExecutionEvent::new(EventType::WorkflowRollbackCompleted, "rollback completed"));
                }
                Err(e) => {
                    self.emit(
                        ExecutionEvent::new(EventType::WorkflowRollbackCompleted, "rollback completed with errors")
                            .with_error(e.to_string()),
                    );
                }
            }
        }

        if let Some(ref hook) = self.options.post_execute_hook {
            if let Err(e) = hook(ctx) {
                let hook_err = EngineError::from(HookError::PostExecute(e.to_string()));
                if final_status == WorkflowStatus::Completed {
                    // Only escalate if the workflow had been otherwise successful; a
                    // pre-existing failure's error must never be overwritten.
                    final_status = WorkflowStatus::Failed;
                    error = Some(hook_err.to_string());
                }
            }
        }

        let terminal_event = match final_status {
            WorkflowStatus::Completed => ExecutionEvent::new(EventType::WorkflowCompleted, "workflow completed"),
            WorkflowStatus::Cancelled => ExecutionEvent::new(EventType::WorkflowCancelled, "workflow cancelled"),
            _ => ExecutionEvent::new(EventType::WorkflowFailed, "workflow failed"),
        };
        self.emit(terminal_event.with_duration(start.elapsed()));

        let _ = (completed_steps, failed_step);
        self.finish_report(final_status, started_at, error)
    }

    fn finish_report(
        &self,
        status: WorkflowStatus,
        started_at: chrono::DateTime<Utc>,
        error: Option<String>,
    ) -> ExecutionReport {
        ExecutionReport::from_log(
            self.workflow.name.clone(),
            status,
            started_at,
            Utc::now(),
            self.event_log.read().unwrap().clone(),
            error,
        )
    }

    /// Used when step hooks are set: drives the same state machine as `Workflow::execute` but
    /// with hook calls and per-step event logging interleaved. The orchestrator tracks its own
    /// completed-steps list in this mode; the workflow's own list is left untouched.
    fn execute_steps_directly(&self, ctx: &Context) -> (WorkflowStatus, Vec<String>, Option<String>, Option<String>) {
        let step_names = self.workflow.steps();
        let total = step_names.len();
        let mut completed = Vec::new();

        for (index, name) in step_names.iter().enumerate() {
            if self.workflow_cancelled() || ctx.is_cancelled() {
                return (WorkflowStatus::Cancelled, completed, None, None);
            }

            if let Some(ref hook) = self.options.pre_step_hook {
                if let Err(e) = hook(ctx, name) {
                    self.emit(ExecutionEvent::for_step(EventType::StepFailed, name, "pre-step hook failed").with_error(e.to_string()));
                    return (WorkflowStatus::Failed, completed, Some(name.clone()), Some(e.to_string()));
                }
            }

            self.emit(ExecutionEvent::for_step(EventType::StepStarted, name, "starting"));

            let Some(result) = self.run_single_step(ctx, index, total, name) else {
                continue;
            };

            match result.status {
                StepStatus::Completed => {
                    completed.push(name.clone());
                    self.emit(
                        ExecutionEvent::for_step(EventType::StepCompleted, name, result.message.clone())
                            .with_duration(result.duration),
                    );
                }
                StepStatus::Skipped => {
                    self.emit(
                        ExecutionEvent::for_step(EventType::StepSkipped, name, result.message.clone())
                            .with_duration(result.duration),
                    );
                }
                _ => {
                    let mut event = ExecutionEvent::for_step(EventType::StepFailed, name, result.message.clone())
                        .with_duration(result.duration);
                    if let Some(ref err) = result.error {
                        event = event.with_error(err.clone());
                    }
                    self.emit(event);
                    return (
                        WorkflowStatus::Failed,
                        completed,
                        Some(name.clone()),
                        result.error.or(Some(result.message)),
                    );
                }
            }

            if let Some(ref hook) = self.options.post_step_hook {
                if let Err(e) = hook(ctx, name) {
                    self.emit(ExecutionEvent::for_step(EventType::StepFailed, name, "post-step hook failed").with_error(e.to_string()));
                    return (WorkflowStatus::Failed, completed, Some(name.clone()), Some(e.to_string()));
                }
            }
        }

        (WorkflowStatus::Completed, completed, None, None)
    }

    fn workflow_cancelled(&self) -> bool {
        self.workflow.is_cancelled()
    }

    fn run_single_step(&self, ctx: &Context, index: usize, total: usize, name: &str) -> Option<crate::types::StepResult> {
        self.workflow.run_named_step(ctx, index, total, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{context::HostFacts, logger::NullLogger, step::FunctionStep, types::StepResult};
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
    fn simple_run_without_hooks_delegates_to_workflow() {
        let mut workflow = Workflow::new("debian-nvidia-installation");
        for name in ["validation", "repository"] {
            workflow.add_step(Box::new(FunctionStep::new(name, name, |_| StepResult::complete("ok"))));
        }
        let orchestrator = Orchestrator::new(workflow, OrchestratorOptions::new());
        let mut ctx = test_context();

        let report = orchestrator.execute(&mut ctx);
        assert_eq!(report.status, WorkflowStatus::Completed);
        assert_eq!(report.steps_completed, 2);
        assert!(!report.rollback_performed);
    }

    #[test]
    fn auto_rollback_runs_on_failure() {
        let mut workflow = Workflow::new("test");
        workflow.add_step(Box::new(
            FunctionStep::new("one", "first", |_| StepResult::complete("ok")).with_rollback(|_| Ok(())),
        ));
        workflow.add_step(Box::new(FunctionStep::new("two", "second", |_| StepResult::fail("boom", "boom"))));
        let orchestrator = Orchestrator::new(workflow, OrchestratorOptions::new().with_auto_rollback(true));
        let mut ctx = test_context();

        let report = orchestrator.execute(&mut ctx);
        assert_eq!(report.status, WorkflowStatus::Failed);
        assert!(report.rollback_performed);
        assert!(report.rollback_success);

        let rollback_events: Vec<_> = report
            .event_log
            .iter()
            .filter(|e| matches!(e.event_type, EventType::StepRollbackStarted | EventType::StepRollbackCompleted))
            .collect();
        assert_eq!(rollback_events.len(), 2);
        assert_eq!(rollback_events[0].event_type, EventType::StepRollbackStarted);
        assert_eq!(rollback_events[0].step_name.as_deref(), Some("one"));
        assert_eq!(rollback_events[1].event_type, EventType::StepRollbackCompleted);
    }

    #[test]
    fn reset_clears_the_log_between_runs() {
        let mut workflow = Workflow::new("test");
        workflow.add_step(Box::new(FunctionStep::new("one", "first", |_| StepResult::complete("ok"))));
        let orchestrator = Orchestrator::new(workflow, OrchestratorOptions::new());
        let mut ctx = test_context();

        orchestrator.execute(&mut ctx);
        let first_log_len = orchestrator.get_execution_log().len();
        assert!(first_log_len > 0);

        let second_report = orchestrator.execute(&mut ctx);
        // Each execute() call wipes the log itself; the second run's log should not contain
        // leftover entries from the first.
        assert_eq!(second_report.event_log.len(), orchestrator.get_execution_log().len());
    }

    #[test]
    fn post_execute_hook_error_does_not_overwrite_preexisting_failure() {
        let mut workflow = Workflow::new("test");
        workflow.add_step(Box::new(FunctionStep::new("one", "first", |_| StepResult::fail("boom", "boom"))));
        let orchestrator = Orchestrator::new(
            workflow,
            OrchestratorOptions::new().with_post_execute_hook(|_| Err(EngineError::from(HookError::PostExecute("ignored".into())))),
        );
        let mut ctx = test_context();

        let report = orchestrator.execute(&mut ctx);
        assert_eq!(report.status, WorkflowStatus::Failed);
        assert_eq!(report.error.as_deref(), Some("boom"));
    }

    #[test]
    fn post_execute_hook_error_escalates_a_successful_run() {
        let mut workflow = Workflow::new("test");
        workflow.add_step(Box::new(FunctionStep::new("one", "first", |_| StepResult::complete("ok"))));
        let orchestrator = Orchestrator::new(
            workflow,
            OrchestratorOptions::new().with_post_execute_hook(|_| Err(EngineError::from(HookError::PostExecute("disk full".into())))),
        );
        let mut ctx = test_context();

        let report = orchestrator.execute(&mut ctx);
        assert_eq!(report.status, WorkflowStatus::Failed);
    }

    #[test]
    fn partial_rollback_failure_still_runs_every_rollback_and_marks_unsuccessful() {
        let invoked: Arc<std::sync::Mutex<Vec<String>>> = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut workflow = Workflow::new("test");
        for name in ["one", "two", "three"] {
            let invoked = invoked.clone();
            let fails = name == "two";
            workflow.add_step(Box::new(
                FunctionStep::new(name, name, |_| StepResult::complete("ok")).with_rollback(move |_| {
                    invoked.lock().unwrap().push(name.to_string());
                    if fails {
                        Err(EngineError::from(crate::error::RollbackError::StepRollbackFailed {
                            step: name.to_string(),
                            message: "disk busy".to_string(),
                        }))
                    } else {
                        Ok(())
                    }
                }),
            ));
        }
        workflow.add_step(Box::new(FunctionStep::new("four", "fourth", |_| StepResult::fail("boom", "boom"))));

        let orchestrator = Orchestrator::new(workflow, OrchestratorOptions::new().with_auto_rollback(true));
        let mut ctx = test_context();

        let report = orchestrator.execute(&mut ctx);
        assert_eq!(report.status, WorkflowStatus::Failed);
        assert_eq!(report.failed_step.as_deref(), Some("four"));
        assert!(report.rollback_performed);
        assert!(!report.rollback_success);
        assert_eq!(*invoked.lock().unwrap(), vec!["three", "two", "one"]);
    }

    #[test]
    fn cancellation_mid_workflow_stops_before_the_next_step_starts() {
        let mut workflow = Workflow::new("test");
        workflow.add_step(Box::new(FunctionStep::new("one", "first", |_| StepResult::complete("ok"))));
        workflow.add_step(Box::new(FunctionStep::new("two", "second", |ctx| {
            ctx.cancel();
            StepResult::complete("ok")
        })));
        workflow.add_step(Box::new(FunctionStep::new("three", "third", |_| StepResult::complete("ok"))));

        let orchestrator = Orchestrator::new(workflow, OrchestratorOptions::new());
        let mut ctx = test_context();

        let report = orchestrator.execute(&mut ctx);
        assert_eq!(report.status, WorkflowStatus::Cancelled);
        assert!(report.error.is_none());
        assert!(report
            .event_log
            .iter()
            .all(|e| e.step_name.as_deref() != Some("three")));
    }

    #[test]
    fn direct_dispatch_mode_honors_workflow_cancel() {
        // With a step hook set, the orchestrator drives steps itself via `execute_steps_directly`
        // instead of delegating to `Workflow::execute`. `Workflow::cancel()` must still stop that
        // path — it is a public API an observer thread can call regardless of which mode drove
        // execution.
        let mut workflow = Workflow::new("test");
        workflow.add_step(Box::new(FunctionStep::new("one", "first", |_| StepResult::complete("ok"))));
        workflow.cancel();

        let orchestrator = Orchestrator::new(workflow, OrchestratorOptions::new().with_pre_step_hook(|_, _| Ok(())));
        let mut ctx = test_context();

        let report = orchestrator.execute(&mut ctx);
        assert_eq!(report.status, WorkflowStatus::Cancelled);
        assert!(report.event_log.iter().all(|e| e.step_name.as_deref() != Some("one")));
    }
}
