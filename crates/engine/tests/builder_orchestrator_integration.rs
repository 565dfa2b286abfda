//! Full builder -> orchestrator -> report scenarios, driven entirely through a mock
//! executor/privilege pair so no real package manager is ever invoked.
//!
//! `skip_validation` is set throughout: `ValidationStep::validate` calls the real adapter's
//! `is_available()`, which probes `$PATH` for the native binary rather than going through the
//! injected executor, so it isn't something these mock-driven scenarios can control.

use std::sync::Arc;

use nv_installer_engine::{
    builder::{BuilderConfig, DistroFamily, WorkflowBuilder},
    context::{Context, HostFacts},
    logger::NullLogger,
    orchestrator::{Orchestrator, OrchestratorOptions},
    types::WorkflowStatus,
};
use nv_installer_pkgmgr::{
    adapter_for,
    executor::mock::MockExecutor,
    executor::CommandOutput,
    privilege::mock::MockPrivilegeManager,
    Family,
};

fn facts(family: Family) -> HostFacts {
    HostFacts {
        family: Some(family),
        gpu_present: true,
        gpu_model: Some("RTX 4090".to_string()),
        kernel_version: "6.8.0-generic".to_string(),
        disk_space_mb: 20_000,
    }
}

fn context_for(family: Family, executor: Arc<MockExecutor>) -> Context {
    let privilege = Arc::new(MockPrivilegeManager::new(true));
    let adapter = Arc::from(adapter_for(family, executor.clone(), privilege.clone()));
    Context::new(facts(family), adapter, executor, privilege, Arc::new(NullLogger))
}

fn ok() -> CommandOutput {
    CommandOutput {
        exit_code: 0,
        stdout: String::new(),
        stderr: String::new(),
    }
}

fn base_config() -> BuilderConfig {
    BuilderConfig {
        skip_validation: true,
        required_disk_mb: 10_000,
        ..Default::default()
    }
}

#[test]
fn debian_happy_path_completes_all_seven_scheduled_steps() {
    let executor = Arc::new(MockExecutor::new());
    for _ in 0..20 {
        executor.push_response(ok());
    }

    let mut ctx = context_for(Family::Debian, executor);
    ctx.driver_version = "535".to_string();
    ctx.selected_components = vec!["cuda".to_string()];

    let workflow = WorkflowBuilder::new(base_config())
        .build(DistroFamily::Debian, Some(&ctx.host_facts.clone()), Vec::new())
        .unwrap();
    assert_eq!(workflow.step_count(), 7);

    let orchestrator = Orchestrator::new(workflow, OrchestratorOptions::new());
    let report = orchestrator.execute(&mut ctx);

    assert_eq!(report.status, WorkflowStatus::Completed);
    assert_eq!(report.steps_failed, 0);
    assert!(!report.rollback_performed);
    assert_eq!(report.steps_completed, 7);
}

#[test]
fn arch_workflow_omits_repository_step_end_to_end() {
    let executor = Arc::new(MockExecutor::new());
    for _ in 0..20 {
        executor.push_response(ok());
    }
    let mut ctx = context_for(Family::Arch, executor);
    ctx.driver_version = "545".to_string();

    let workflow = WorkflowBuilder::new(base_config())
        .build(DistroFamily::Arch, Some(&ctx.host_facts.clone()), Vec::new())
        .unwrap();
    assert_eq!(workflow.step_count(), 6);
    assert!(!workflow.steps().contains(&"repository".to_string()));

    let orchestrator = Orchestrator::new(workflow, OrchestratorOptions::new());
    let report = orchestrator.execute(&mut ctx);

    assert_eq!(report.status, WorkflowStatus::Completed);
    assert_eq!(report.steps_completed, 6);
}

#[test]
fn failed_package_install_triggers_auto_rollback_when_enabled() {
    let executor = Arc::new(MockExecutor::new());
    // repository.add_repository (1 call), nouveau_blacklist's tee + initramfs regen (2 calls),
    // then packages.install fails on its single call.
    executor.push_response(ok());
    executor.push_response(ok());
    executor.push_response(ok());
    executor.push_response(CommandOutput {
        exit_code: 1,
        stdout: String::new(),
        stderr: "E: Could not get lock /var/lib/dpkg/lock-frontend".to_string(),
    });
    // Rollback of nouveau_blacklist (rm + regen) and repository (remove_repository) afterward.
    for _ in 0..10 {
        executor.push_response(ok());
    }

    let mut ctx = context_for(Family::Debian, executor);
    ctx.driver_version = "535".to_string();

    let workflow = WorkflowBuilder::new(base_config())
        .build(DistroFamily::Debian, Some(&ctx.host_facts.clone()), Vec::new())
        .unwrap();

    let options = OrchestratorOptions::new().with_auto_rollback(true);
    let orchestrator = Orchestrator::new(workflow, options);
    let report = orchestrator.execute(&mut ctx);

    assert_eq!(report.status, WorkflowStatus::Failed);
    assert!(report.rollback_performed);
    assert_eq!(report.steps_failed, 1);
}

#[test]
fn dry_run_option_propagates_into_the_context_before_execution() {
    let executor = Arc::new(MockExecutor::new());
    let mut ctx = context_for(Family::Rhel, executor.clone());
    ctx.driver_version = "550".to_string();
    assert!(!ctx.dry_run);

    let workflow = WorkflowBuilder::new(base_config())
        .build(DistroFamily::Rhel, Some(&ctx.host_facts.clone()), Vec::new())
        .unwrap();

    let options = OrchestratorOptions::new().with_dry_run(true);
    let orchestrator = Orchestrator::new(workflow, options);
    let report = orchestrator.execute(&mut ctx);

    assert_eq!(report.status, WorkflowStatus::Completed);
    // Dry-run short-circuits every adapter call before it reaches the executor.
    assert_eq!(executor.call_count(), 0);
}
