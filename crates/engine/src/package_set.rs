//! Package-set catalog (spec.md §6 collaborator contract): maps a driver version and a
//! component name to the native package names the `packages` step installs. The concrete
//! mapping is per-distro domain logic that stays out of this crate's specified scope — the
//! default catalog below exists so the crate is runnable standalone, the same way
//! `SystemExecutor` stands in for a real shell executor.

use std::sync::Arc;

use nv_installer_pkgmgr::Family;

/// Package names for one driver version or optional component, for a single distro family.
pub trait PackageSet: Send + Sync {
    fn get_packages(&self, component: &str) -> Vec<String>;
    fn get_packages_for_version(&self, version: &str) -> Vec<String>;
}

/// Resolves the `PackageSet` for a given family. Held by `Context` so the `packages` step can
/// compute its install list without hard-coding per-family package names itself.
pub trait PackageSetCatalog: Send + Sync {
    fn get_package_set(&self, distro: Family) -> Arc<dyn PackageSet>;
}

struct DebianSet;
impl PackageSet for DebianSet {
    fn get_packages(&self, component: &str) -> Vec<String> {
        match component {
            "cuda" => vec!["cuda-toolkit".to_string()],
            "vulkan" => vec!["libnvidia-vulkan-icd".to_string()],
            "opencl" => vec!["nvidia-opencl-icd".to_string()],
            other => vec![format!("nvidia-{other}")],
        }
    }

    fn get_packages_for_version(&self, version: &str) -> Vec<String> {
        vec![
            format!("nvidia-driver-{version}"),
            format!("nvidia-dkms-{version}"),
            "nvidia-kernel-common".to_string(),
        ]
    }
}

struct RhelSet;
impl PackageSet for RhelSet {
    fn get_packages(&self, component: &str) -> Vec<String> {
        match component {
            "cuda" => vec!["cuda-toolkit".to_string()],
            "vulkan" => vec!["nvidia-vulkan-icd".to_string()],
            "opencl" => vec!["nvidia-opencl".to_string()],
            other => vec![format!("nvidia-{other}")],
        }
    }

    fn get_packages_for_version(&self, version: &str) -> Vec<String> {
        vec![format!("nvidia-driver-{version}"), format!("kmod-nvidia-{version}")]
    }
}

struct ArchSet;
impl PackageSet for ArchSet {
    fn get_packages(&self, component: &str) -> Vec<String> {
        match component {
            "cuda" => vec!["cuda".to_string()],
            "vulkan" => vec!["nvidia-utils".to_string(), "lib32-nvidia-utils".to_string()],
            "opencl" => vec!["opencl-nvidia".to_string()],
            other => vec![format!("nvidia-{other}")],
        }
    }

    fn get_packages_for_version(&self, _version: &str) -> Vec<String> {
        // Arch tracks one current driver package per kernel flavor rather than pinning a
        // version string in the package name.
        vec!["nvidia".to_string(), "nvidia-utils".to_string()]
    }
}

struct SuseSet;
impl PackageSet for SuseSet {
    fn get_packages(&self, component: &str) -> Vec<String> {
        match component {
            "cuda" => vec!["cuda".to_string()],
            "vulkan" => vec!["libnvidia-vulkan".to_string()],
            "opencl" => vec!["nvidia-opencl".to_string()],
            other => vec![format!("nvidia-{other}")],
        }
    }

    fn get_packages_for_version(&self, version: &str) -> Vec<String> {
        vec![format!("nvidia-driver-{version}"), "nvidia-gfxG06-kmp-default".to_string()]
    }
}

/// Built-in catalog covering conventional NVIDIA package names for each of the four families.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPackageSetCatalog;

impl PackageSetCatalog for DefaultPackageSetCatalog {
    fn get_package_set(&self, distro: Family) -> Arc<dyn PackageSet> {
        match distro {
            Family::Debian => Arc::new(DebianSet),
            Family::Rhel => Arc::new(RhelSet),
            Family::Arch => Arc::new(ArchSet),
            Family::Suse => Arc::new(SuseSet),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debian_set_names_driver_package_with_version() {
        let set = DefaultPackageSetCatalog.get_package_set(Family::Debian);
        let pkgs = set.get_packages_for_version("535");
        assert!(pkgs.contains(&"nvidia-driver-535".to_string()));
    }

    #[test]
    fn arch_set_ignores_version_pin() {
        let set = DefaultPackageSetCatalog.get_package_set(Family::Arch);
        assert_eq!(set.get_packages_for_version("535"), set.get_packages_for_version("550"));
    }

    #[test]
    fn component_lookup_falls_back_to_nvidia_prefixed_name() {
        let set = DefaultPackageSetCatalog.get_package_set(Family::Rhel);
        assert_eq!(set.get_packages("settings"), vec!["nvidia-settings".to_string()]);
    }
}
