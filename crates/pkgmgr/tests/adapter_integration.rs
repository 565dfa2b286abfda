//! Adapter-against-mock-executor scenarios. Exercises each family's `PackageManager` through
//! its public trait contract with a scripted `MockExecutor`, without ever touching a real
//! apt/dnf/pacman/zypper binary.

use std::sync::Arc;

use nv_installer_pkgmgr::{
    adapter_for,
    executor::{mock::MockExecutor, CommandOutput},
    privilege::mock::MockPrivilegeManager,
    AdapterContext, Family, InstallOptions, RemoveOptions,
};

fn success(stdout: &str) -> CommandOutput {
    CommandOutput {
        exit_code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

fn failure(stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code: 1,
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

#[test]
fn debian_install_runs_as_root_without_sudo_wrapper() {
    let executor = Arc::new(MockExecutor::new());
    executor.push_response(success(""));
    let privilege = Arc::new(MockPrivilegeManager::new(true));
    let manager = adapter_for(Family::Debian, executor.clone(), privilege);

    let ctx = AdapterContext::new(false);
    manager
        .install(&ctx, &InstallOptions::non_interactive(), &["nvidia-driver-535"])
        .unwrap();

    assert_eq!(executor.call_count(), 1);
    let (cmd, args) = &executor.calls.lock().unwrap()[0];
    assert_eq!(cmd, "apt-get");
    assert!(args.contains(&"nvidia-driver-535".to_string()));
}

#[test]
fn install_with_empty_package_list_makes_zero_executor_calls() {
    let executor = Arc::new(MockExecutor::new());
    let privilege = Arc::new(MockPrivilegeManager::new(true));
    let manager = adapter_for(Family::Rhel, executor.clone(), privilege);

    let ctx = AdapterContext::new(false);
    manager
        .install(&ctx, &InstallOptions::non_interactive(), &[])
        .unwrap();

    assert_eq!(executor.call_count(), 0);
}

#[test]
fn rhel_missing_package_is_classified_not_found() {
    let executor = Arc::new(MockExecutor::new());
    executor.push_response(failure("Error: No match for argument: nonexistent"));
    let privilege = Arc::new(MockPrivilegeManager::new(true));
    let manager = adapter_for(Family::Rhel, executor, privilege);

    let ctx = AdapterContext::new(false);
    let err = manager
        .install(&ctx, &InstallOptions::non_interactive(), &["nonexistent"])
        .unwrap_err();

    assert!(matches!(
        err.kind(),
        nv_installer_pkgmgr::PackagingErrorKind::PackageNotFound(n) if n == "nonexistent"
    ));
}

#[test]
fn suse_lock_failure_is_classified_lock_acquire_failed() {
    let executor = Arc::new(MockExecutor::new());
    executor.push_response(CommandOutput {
        exit_code: 1,
        stdout: String::new(),
        stderr: "System management is locked by the application with pid 4242".to_string(),
    });
    let privilege = Arc::new(MockPrivilegeManager::new(true));
    let manager = adapter_for(Family::Suse, executor, privilege);

    let ctx = AdapterContext::new(false);
    let err = manager
        .install(&ctx, &InstallOptions::non_interactive(), &["cuda-toolkit"])
        .unwrap_err();

    assert!(matches!(
        err.kind(),
        nv_installer_pkgmgr::PackagingErrorKind::LockAcquireFailed
    ));
}

#[test]
fn non_root_install_is_routed_through_execute_elevated() {
    let executor = Arc::new(MockExecutor::new());
    executor.push_response(success(""));
    let privilege = Arc::new(MockPrivilegeManager::new(false));
    let manager = adapter_for(Family::Arch, executor.clone(), privilege);

    let ctx = AdapterContext::new(false);
    manager
        .install(&ctx, &InstallOptions::non_interactive(), &["nvidia"])
        .unwrap();

    // The mock doesn't distinguish execute from execute_elevated in its call log beyond
    // recording one invocation; the point under test is that a non-root caller still succeeds
    // without touching a real elevation mechanism.
    assert_eq!(executor.call_count(), 1);
}

#[test]
fn dry_run_install_makes_zero_executor_calls() {
    let executor = Arc::new(MockExecutor::new());
    let privilege = Arc::new(MockPrivilegeManager::new(true));
    let manager = adapter_for(Family::Debian, executor.clone(), privilege);

    let ctx = AdapterContext::new(true);
    manager
        .install(&ctx, &InstallOptions::non_interactive(), &["nvidia-driver-535"])
        .unwrap();

    assert_eq!(executor.call_count(), 0);
}

#[test]
fn remove_of_uninstalled_package_is_classified_not_installed() {
    let executor = Arc::new(MockExecutor::new());
    executor.push_response(failure("dpkg: warning: package 'foo' is not installed"));
    let privilege = Arc::new(MockPrivilegeManager::new(true));
    let manager = adapter_for(Family::Debian, executor, privilege);

    let ctx = AdapterContext::new(false);
    let err = manager
        .remove(&ctx, &RemoveOptions::non_interactive(), &["foo"])
        .unwrap_err();

    assert!(matches!(
        err.kind(),
        nv_installer_pkgmgr::PackagingErrorKind::PackageNotInstalled(n) if n == "foo"
    ));
}
