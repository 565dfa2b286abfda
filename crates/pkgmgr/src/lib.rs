//! Family-neutral package manager abstraction: one trait, four adapters (apt, dnf/yum, pacman,
//! zypper), each driven entirely through injected `ShellExecutor`/`PrivilegeManager`
//! collaborators so the whole crate is testable without touching a real system.

pub mod adapters;
pub mod classify;
pub mod context;
pub mod error;
pub mod executor;
pub mod manager;
pub mod privilege;
pub mod repo_format;
pub mod security;
pub mod types;

pub use adapters::{apt::AptPackageManager, pacman::PacmanPackageManager, yum::YumPackageManager, zypper::ZypperPackageManager};
pub use context::AdapterContext;
pub use error::{PackagingError, PackagingErrorKind, PackagingResultExt};
pub use executor::{CommandOutput, ShellExecutor, SystemExecutor};
pub use manager::PackageManager;
pub use privilege::{PrivilegeManager, SystemPrivilegeManager};
pub use types::{Family, InstallOptions, Package, RemoveOptions, Repository, SearchOptions, UpdateOptions};

use std::sync::Arc;

/// Builds the adapter for `family`, wired to the given executor/privilege collaborators.
/// This is the one place that maps a `Family` to its concrete `PackageManager` implementation.
pub fn adapter_for(
    family: Family,
    executor: Arc<dyn ShellExecutor>,
    privilege: Arc<dyn PrivilegeManager>,
) -> Box<dyn PackageManager> {
    match family {
        Family::Debian => Box::new(AptPackageManager::new(executor, privilege)),
        Family::Rhel => Box::new(YumPackageManager::new(executor, privilege)),
        Family::Arch => Box::new(PacmanPackageManager::new(executor, privilege)),
        Family::Suse => Box::new(ZypperPackageManager::new(executor, privilege)),
    }
}
