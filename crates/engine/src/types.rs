//! Core data model shared by every engine module: step/workflow status enums, the result and
//! event types that flow between them, and the execution report a caller inspects after a run.
//!
//! Every type here that crosses the report boundary derives `serde::{Serialize, Deserialize}`
//! so a caller can dump an `ExecutionReport` as YAML/JSON without this crate knowing the output
//! format, mirroring how the teacher's `HostStatus` is made diagnostic-friendly.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::EnumIter;

/// Lifecycle state of one step within a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter)]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    RolledBack,
}

impl StepStatus {
    pub fn is_success_terminal(self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Skipped)
    }

    pub fn is_failure_terminal(self) -> bool {
        matches!(self, StepStatus::Failed | StepStatus::RolledBack)
    }

    pub fn is_terminal(self) -> bool {
        self.is_success_terminal() || self.is_failure_terminal()
    }
}

/// Outcome of one `Step::execute` call. Built via the three factory functions rather than
/// constructed directly, so every call site states its intent (`complete`/`skip`/`fail`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub status: StepStatus,
    pub message: String,
    pub error: Option<String>,
    pub duration: Duration,
    pub can_rollback: bool,
}

impl StepResult {
    pub fn complete(message: impl Into<String>) -> Self {
        StepResult {
            status: StepStatus::Completed,
            message: message.into(),
            error: None,
            duration: Duration::ZERO,
            can_rollback: false,
        }
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        StepResult {
            status: StepStatus::Skipped,
            message: reason.into(),
            error: None,
            duration: Duration::ZERO,
            can_rollback: false,
        }
    }

    pub fn fail(message: impl Into<String>, error: impl Into<String>) -> Self {
        StepResult {
            status: StepStatus::Failed,
            message: message.into(),
            error: Some(error.into()),
            duration: Duration::ZERO,
            can_rollback: false,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_can_rollback(mut self, can_rollback: bool) -> Self {
        self.can_rollback = can_rollback;
        self
    }
}

/// Lifecycle state of a whole workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    RollingBack,
    RolledBack,
}

/// Summary returned by `Workflow::execute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub status: WorkflowStatus,
    pub completed_steps: Vec<String>,
    pub failed_step: Option<String>,
    pub error: Option<String>,
    pub total_duration: Duration,
    pub needs_reboot: bool,
}

impl WorkflowResult {
    pub fn pending() -> Self {
        WorkflowResult {
            status: WorkflowStatus::Pending,
            completed_steps: Vec::new(),
            failed_step: None,
            error: None,
            total_duration: Duration::ZERO,
            needs_reboot: false,
        }
    }
}

/// One entry in the execution log: a step- or workflow-level lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    WorkflowStarted,
    WorkflowCompleted,
    WorkflowFailed,
    WorkflowCancelled,
    WorkflowRollbackStarted,
    WorkflowRollbackCompleted,
    StepStarted,
    StepCompleted,
    StepSkipped,
    StepFailed,
    StepRollbackStarted,
    StepRollbackCompleted,
}

/// One logged event. `step_name` is `None` for workflow-level events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub timestamp: DateTime<Utc>,
    pub step_name: Option<String>,
    pub event_type: EventType,
    pub message: String,
    pub duration: Duration,
    pub error: Option<String>,
}

impl ExecutionEvent {
    pub fn new(event_type: EventType, message: impl Into<String>) -> Self {
        ExecutionEvent {
            timestamp: Utc::now(),
            step_name: None,
            event_type,
            message: message.into(),
            duration: Duration::ZERO,
            error: None,
        }
    }

    pub fn for_step(event_type: EventType, step_name: impl Into<String>, message: impl Into<String>) -> Self {
        ExecutionEvent {
            timestamp: Utc::now(),
            step_name: Some(step_name.into()),
            event_type,
            message: message.into(),
            duration: Duration::ZERO,
            error: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Full post-run summary folded from the event log: counters, rollback outcome, terminal error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub workflow_name: String,
    pub status: WorkflowStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub steps_executed: usize,
    pub steps_completed: usize,
    pub steps_skipped: usize,
    pub steps_failed: usize,
    pub rollback_performed: bool,
    pub rollback_success: bool,
    pub event_log: Vec<ExecutionEvent>,
    pub error: Option<String>,
}

impl ExecutionReport {
    /// Folds an event log plus terminal state into the counters the report exposes. This is
    /// the single place that derives `steps_executed`/`rollback_performed`/`rollback_success`
    /// from the log, so the invariants in the testable-properties list hold by construction.
    pub fn from_log(
        workflow_name: impl Into<String>,
        status: WorkflowStatus,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        event_log: Vec<ExecutionEvent>,
        error: Option<String>,
    ) -> Self {
        let steps_completed = event_log
            .iter()
            .filter(|e| e.event_type == EventType::StepCompleted)
            .count();
        let steps_skipped = event_log
            .iter()
            .filter(|e| e.event_type == EventType::StepSkipped)
            .count();
        let steps_failed = event_log
            .iter()
            .filter(|e| e.event_type == EventType::StepFailed)
            .count();
        let rollback_performed = event_log
            .iter()
            .any(|e| e.event_type == EventType::WorkflowRollbackStarted);
        let rollback_success = !rollback_performed
            || event_log.iter().any(|e| {
                e.event_type == EventType::WorkflowRollbackCompleted && e.error.is_none()
            });

        ExecutionReport {
            workflow_name: workflow_name.into(),
            status,
            started_at,
            ended_at,
            steps_executed: steps_completed + steps_skipped + steps_failed,
            steps_completed,
            steps_skipped,
            steps_failed,
            rollback_performed,
            rollback_success,
            event_log,
            error,
        }
    }
}

/// Progress notification delivered to a caller-installed callback during `Workflow::execute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub step_name: String,
    pub step_index: usize,
    pub total_steps: usize,
    pub percent: f64,
    pub message: String,
}

impl Progress {
    pub fn new(step_name: impl Into<String>, step_index: usize, total_steps: usize, message: impl Into<String>) -> Self {
        let percent = if total_steps == 0 {
            0.0
        } else {
            (step_index as f64 / total_steps as f64) * 100.0
        };
        Progress {
            step_name: step_name.into(),
            step_index,
            total_steps,
            percent,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn exactly_one_status_is_both_success_and_failure_terminal() {
        // Every status is terminal in at most one of the two senses; this walks the full
        // variant set via `EnumIter` rather than enumerating it by hand so a new variant
        // added later can't silently slip past the success/failure split.
        for status in StepStatus::iter() {
            assert!(!(status.is_success_terminal() && status.is_failure_terminal()));
        }
    }

    #[test]
    fn progress_percent_is_zero_for_empty_workflow() {
        let p = Progress::new("x", 0, 0, "starting");
        assert_eq!(p.percent, 0.0);
    }

    #[test]
    fn report_from_log_folds_counters_and_rollback_flags() {
        let now = Utc::now();
        let log = vec![
            ExecutionEvent::new(EventType::WorkflowStarted, "start"),
            ExecutionEvent::for_step(EventType::StepCompleted, "validation", "ok"),
            ExecutionEvent::for_step(EventType::StepFailed, "packages", "boom"),
            ExecutionEvent::new(EventType::WorkflowRollbackStarted, "rolling back"),
            ExecutionEvent::for_step(EventType::StepRollbackCompleted, "validation", "undone"),
            ExecutionEvent::new(EventType::WorkflowRollbackCompleted, "rollback done"),
            ExecutionEvent::new(EventType::WorkflowFailed, "failed"),
        ];
        let report = ExecutionReport::from_log(
            "debian-nvidia-installation",
            WorkflowStatus::Failed,
            now,
            now,
            log,
            Some("packages failed".to_string()),
        );
        assert_eq!(report.steps_completed, 1);
        assert_eq!(report.steps_failed, 1);
        assert_eq!(report.steps_executed, 2);
        assert!(report.rollback_performed);
        assert!(report.rollback_success);
    }
}
