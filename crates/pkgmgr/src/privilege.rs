use std::sync::atomic::{AtomicBool, Ordering};

/// Collaborator contract for privilege elevation, named in spec.md §6. The concrete elevation
/// mechanism (sudo, polkit, capability drop) is external to this crate; adapters only ever ask
/// whether the process is already root.
pub trait PrivilegeManager: Send + Sync {
    fn is_root(&self) -> bool;

    /// Test-only hook to force `is_root()`'s return value.
    fn set_root(&self, value: bool);
}

/// Privilege manager backed by the real process UID. `set_root` is a no-op override used only
/// in tests that need to force a specific answer without actually dropping privileges.
#[derive(Debug, Default)]
pub struct SystemPrivilegeManager {
    override_root: AtomicBool,
    forced: AtomicBool,
}

impl SystemPrivilegeManager {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(unix)]
    fn real_is_root() -> bool {
        nix::unistd::Uid::effective().is_root()
    }

    #[cfg(not(unix))]
    fn real_is_root() -> bool {
        false
    }
}

impl PrivilegeManager for SystemPrivilegeManager {
    fn is_root(&self) -> bool {
        if self.forced.load(Ordering::SeqCst) {
            self.override_root.load(Ordering::SeqCst)
        } else {
            Self::real_is_root()
        }
    }

    fn set_root(&self, value: bool) {
        self.forced.store(true, Ordering::SeqCst);
        self.override_root.store(value, Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod mock {
    use super::*;

    #[derive(Debug, Default)]
    pub struct MockPrivilegeManager {
        root: AtomicBool,
    }

    impl MockPrivilegeManager {
        pub fn new(is_root: bool) -> Self {
            let m = Self::default();
            m.root.store(is_root, Ordering::SeqCst);
            m
        }
    }

    impl PrivilegeManager for MockPrivilegeManager {
        fn is_root(&self) -> bool {
            self.root.load(Ordering::SeqCst)
        }

        fn set_root(&self, value: bool) {
            self.root.store(value, Ordering::SeqCst);
        }
    }
}
