use crate::{
    context::AdapterContext,
    error::PackagingError,
    types::{InstallOptions, Package, RemoveOptions, Repository, SearchOptions, UpdateOptions},
    Family,
};

/// Family-neutral contract implemented once per packaging ecosystem (apt, dnf/yum, pacman,
/// zypper). Every method that shells out does so exclusively through the injected
/// `ShellExecutor`/`PrivilegeManager` the adapter was constructed with — never directly.
pub trait PackageManager: Send + Sync {
    fn name(&self) -> &'static str;
    fn family(&self) -> Family;

    /// Detects presence of the native tool on `$PATH`.
    fn is_available(&self) -> bool;

    /// Empty `pkgs` is a no-op success. Non-interactive by default.
    fn install(
        &self,
        ctx: &AdapterContext,
        opts: &InstallOptions,
        pkgs: &[&str],
    ) -> Result<(), PackagingError>;

    /// Empty `pkgs` is a no-op success.
    fn remove(
        &self,
        ctx: &AdapterContext,
        opts: &RemoveOptions,
        pkgs: &[&str],
    ) -> Result<(), PackagingError>;

    /// Refreshes package metadata.
    fn update(&self, ctx: &AdapterContext, opts: &UpdateOptions) -> Result<(), PackagingError>;

    /// Empty `pkgs` means a full system upgrade.
    fn upgrade(
        &self,
        ctx: &AdapterContext,
        opts: &UpdateOptions,
        pkgs: &[&str],
    ) -> Result<(), PackagingError>;

    fn is_installed(&self, ctx: &AdapterContext, name: &str) -> Result<bool, PackagingError>;

    /// Empty result for no matches is success, not error.
    fn search(
        &self,
        ctx: &AdapterContext,
        query: &str,
        opts: &SearchOptions,
    ) -> Result<Vec<Package>, PackagingError>;

    fn info(&self, ctx: &AdapterContext, name: &str) -> Result<Package, PackagingError>;

    fn list_installed(&self, ctx: &AdapterContext) -> Result<Vec<Package>, PackagingError>;

    fn list_upgradable(&self, ctx: &AdapterContext) -> Result<Vec<Package>, PackagingError>;

    fn clean(&self, ctx: &AdapterContext) -> Result<(), PackagingError>;

    fn auto_remove(&self, ctx: &AdapterContext) -> Result<(), PackagingError>;

    /// False means integrity failed; `PackageNotInstalled` when absent.
    fn verify(&self, ctx: &AdapterContext, name: &str) -> Result<bool, PackagingError>;

    fn add_repository(&self, ctx: &AdapterContext, repo: &Repository) -> Result<(), PackagingError>;

    fn remove_repository(&self, ctx: &AdapterContext, name: &str) -> Result<(), PackagingError>;

    fn list_repositories(&self, ctx: &AdapterContext) -> Result<Vec<Repository>, PackagingError>;

    fn enable_repository(&self, ctx: &AdapterContext, name: &str) -> Result<(), PackagingError>;

    fn disable_repository(&self, ctx: &AdapterContext, name: &str) -> Result<(), PackagingError>;

    fn refresh_repositories(&self, ctx: &AdapterContext) -> Result<(), PackagingError>;

    fn import_gpg_key(&self, ctx: &AdapterContext, key_url_or_path: &str) -> Result<(), PackagingError>;
}
