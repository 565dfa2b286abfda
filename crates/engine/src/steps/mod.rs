//! The standard step catalog (spec.md §4.1): one `BaseStep`-flavored struct per policy
//! (`validation`, `repository`, `nouveau_blacklist`, `packages`, `dkms_build`, `module_load`,
//! `xorg_config`, `verification`). Every body consumes the injected `ShellExecutor`/
//! `PrivilegeManager`/package adapter through `Context` exclusively — none calls
//! `std::process::Command` directly.

mod dkms_build;
mod module_load;
mod nouveau_blacklist;
mod packages;
mod repository;
mod validation;
mod verification;
mod xorg_config;

pub use dkms_build::DkmsBuildStep;
pub use module_load::ModuleLoadStep;
pub use nouveau_blacklist::NouveauBlacklistStep;
pub use packages::PackagesStep;
pub use repository::RepositoryStep;
pub use validation::ValidationStep;
pub use verification::VerificationStep;
pub use xorg_config::XorgConfigStep;

/// Resolves the family-appropriate initramfs regeneration tool, shared by any step that writes
/// a modprobe config and needs to fold it into the boot image.
pub(crate) fn initramfs_command(family: nv_installer_pkgmgr::Family) -> (&'static str, &'static [&'static str]) {
    use nv_installer_pkgmgr::Family;
    match family {
        Family::Debian => ("update-initramfs", &["-u"]),
        Family::Rhel => ("dracut", &["-f"]),
        Family::Suse => ("dracut", &["-f"]),
        Family::Arch => ("mkinitcpio", &["-P"]),
    }
}
