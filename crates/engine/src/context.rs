//! The per-run mutable state bag threaded through every step: host facts, collaborator
//! handles, the dry-run flag, a cooperative cancellation token, and a typed scratch map that
//! steps use to hand information to later steps (and to their own rollback).

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
    time::Duration,
};

use nv_installer_pkgmgr::{Family, PackageManager, PrivilegeManager, ShellExecutor};

use crate::{
    logger::Logger,
    package_set::{DefaultPackageSetCatalog, PackageSetCatalog},
};

/// Host facts gathered by the (out-of-scope) distro-detection/GPU-probing collaborators and
/// handed to the engine at context-construction time.
#[derive(Debug, Clone, Default)]
pub struct HostFacts {
    pub family: Option<Family>,
    pub gpu_present: bool,
    pub gpu_model: Option<String>,
    pub kernel_version: String,
    pub disk_space_mb: u64,
}

/// A value stored in the context's scratch map. Closed set rather than `dyn Any`, per the
/// design notes: keeps the map `Send`/`Debug`-friendly at the cost of only ever needing
/// bool/int/string/duration, which is all the state-map key contract in the external
/// interfaces actually requires.
#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
    Bool(bool),
    Int(i64),
    Str(String),
    StrList(Vec<String>),
    Duration(Duration),
}

/// Cooperative cancellation signal. Checked at two gates per step (before `validate`, before
/// `execute`); a step body already in flight runs to completion. Hand-rolled rather than taken
/// from `tokio_util`, since the engine has no async runtime dependency.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-run mutable state bag. Created once at orchestrator-run entry, released at report
/// generation. Collaborator handles are trait objects behind `Arc` so the same context can be
/// shared across step invocations without cloning the underlying executor/adapter.
pub struct Context {
    pub host_facts: HostFacts,
    pub driver_version: String,
    pub selected_components: Vec<String>,
    pub additional_packages: Vec<String>,
    pub package_adapter: Arc<dyn PackageManager>,
    pub executor: Arc<dyn ShellExecutor>,
    pub privilege: Arc<dyn PrivilegeManager>,
    pub logger: Arc<dyn Logger>,
    pub package_set: Arc<dyn PackageSetCatalog>,
    pub dry_run: bool,
    cancellation: CancellationToken,
    state: RwLock<HashMap<String, StateValue>>,
}

impl Context {
    pub fn new(
        host_facts: HostFacts,
        package_adapter: Arc<dyn PackageManager>,
        executor: Arc<dyn ShellExecutor>,
        privilege: Arc<dyn PrivilegeManager>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Context {
            host_facts,
            driver_version: String::new(),
            selected_components: Vec::new(),
            additional_packages: Vec::new(),
            package_adapter,
            executor,
            privilege,
            logger,
            package_set: Arc::new(DefaultPackageSetCatalog),
            dry_run: false,
            cancellation: CancellationToken::new(),
            state: RwLock::new(HashMap::new()),
        }
    }

    /// Overrides the default package-set catalog, e.g. with one sourced from an on-disk
    /// component manifest rather than the built-in conventional naming.
    pub fn with_package_set(mut self, package_set: Arc<dyn PackageSetCatalog>) -> Self {
        self.package_set = package_set;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn set_state(&self, key: impl Into<String>, value: StateValue) {
        self.state.write().unwrap().insert(key.into(), value);
    }

    /// Snapshot read: returns a value, never a torn or partially-mutated view, per the
    /// concurrency model's requirement that published reads are consistent snapshots.
    fn get(&self, key: &str) -> Option<StateValue> {
        self.state.read().unwrap().get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        matches!(self.get(key), Some(StateValue::Bool(b)) if b)
    }

    pub fn get_int(&self, key: &str) -> i64 {
        match self.get(key) {
            Some(StateValue::Int(i)) => i,
            _ => 0,
        }
    }

    pub fn get_string(&self, key: &str) -> String {
        match self.get(key) {
            Some(StateValue::Str(s)) => s,
            _ => String::new(),
        }
    }

    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(StateValue::StrList(v)) => v,
            _ => Vec::new(),
        }
    }

    pub fn get_duration(&self, key: &str) -> Duration {
        match self.get(key) {
            Some(StateValue::Duration(d)) => d,
            _ => Duration::ZERO,
        }
    }
}

/// Well-known state-map keys exchanged between steps (external interfaces contract).
pub mod state_keys {
    pub const PACKAGES_INSTALLED: &str = "packages_installed";
    pub const INSTALLED_PACKAGES: &str = "installed_packages";
    pub const PACKAGE_INSTALL_TIME: &str = "package_install_time";
    pub const REPOSITORY_CONFIGURED: &str = "repository_configured";
    pub const REPOSITORY_NAME: &str = "repository_name";
    pub const REPOSITORY_URL: &str = "repository_url";
    pub const NEEDS_KERNEL_HEADERS: &str = "needs_kernel_headers";
    pub const NEEDS_NOUVEAU_BLACKLIST: &str = "needs_nouveau_blacklist";
    pub const DRIVER_VERSION: &str = "driver_version";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::NullLogger;
    use nv_installer_pkgmgr::adapters::apt::AptPackageManager;
    use nv_installer_pkgmgr::executor::mock::MockExecutor;
    use nv_installer_pkgmgr::privilege::mock::MockPrivilegeManager;

    fn test_context() -> Context {
        let executor = Arc::new(MockExecutor::new());
        let privilege = Arc::new(MockPrivilegeManager::new(true));
        let adapter = Arc::new(AptPackageManager::new(executor.clone(), privilege.clone()));
        Context::new(HostFacts::default(), adapter, executor, privilege, Arc::new(NullLogger))
    }

    #[test]
    fn missing_key_reads_return_zero_values() {
        let ctx = test_context();
        assert!(!ctx.get_bool("nope"));
        assert_eq!(ctx.get_int("nope"), 0);
        assert_eq!(ctx.get_string("nope"), "");
        assert_eq!(ctx.get_duration("nope"), Duration::ZERO);
    }

    #[test]
    fn set_then_get_round_trips() {
        let ctx = test_context();
        ctx.set_state(state_keys::PACKAGES_INSTALLED, StateValue::Bool(true));
        ctx.set_state(
            state_keys::INSTALLED_PACKAGES,
            StateValue::StrList(vec!["nvidia-driver".to_string()]),
        );
        assert!(ctx.get_bool(state_keys::PACKAGES_INSTALLED));
        assert_eq!(ctx.get_string_list(state_keys::INSTALLED_PACKAGES), vec!["nvidia-driver"]);
    }

    #[test]
    fn cancellation_token_is_observed_through_clones() {
        let ctx = test_context();
        let token = ctx.cancellation_token();
        assert!(!ctx.is_cancelled());
        token.cancel();
        assert!(ctx.is_cancelled());
    }
}
