//! The workflow builder (C5): assembles the family-specific step sequence from a distro family,
//! per-step skip flags, and caller-supplied custom steps.

use crate::{
    context::HostFacts,
    error::{BuilderError, EngineError},
    step::Step,
    steps,
    workflow::Workflow,
};

/// Distro family as presented to the builder. Distinct from `nv_installer_pkgmgr::Family`: the
/// adapter layer's `Family` only ever names one of the four supported ecosystems, while the
/// builder also has to represent "the (out-of-scope) distro-detection collaborator couldn't
/// classify this host" without smuggling a fifth adapter variant into the package-manager trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistroFamily {
    Debian,
    Rhel,
    Arch,
    Suse,
    Unknown,
}

impl DistroFamily {
    pub fn to_package_family(self) -> Option<nv_installer_pkgmgr::Family> {
        match self {
            DistroFamily::Debian => Some(nv_installer_pkgmgr::Family::Debian),
            DistroFamily::Rhel => Some(nv_installer_pkgmgr::Family::Rhel),
            DistroFamily::Arch => Some(nv_installer_pkgmgr::Family::Arch),
            DistroFamily::Suse => Some(nv_installer_pkgmgr::Family::Suse),
            DistroFamily::Unknown => None,
        }
    }

    fn slug(self) -> &'static str {
        match self {
            DistroFamily::Debian => "debian",
            DistroFamily::Rhel => "rhel",
            DistroFamily::Arch => "arch",
            DistroFamily::Suse => "suse",
            DistroFamily::Unknown => "unknown",
        }
    }
}

impl From<nv_installer_pkgmgr::Family> for DistroFamily {
    fn from(family: nv_installer_pkgmgr::Family) -> Self {
        match family {
            nv_installer_pkgmgr::Family::Debian => DistroFamily::Debian,
            nv_installer_pkgmgr::Family::Rhel => DistroFamily::Rhel,
            nv_installer_pkgmgr::Family::Arch => DistroFamily::Arch,
            nv_installer_pkgmgr::Family::Suse => DistroFamily::Suse,
        }
    }
}

/// Per-step skip flags and catalog-shaping knobs the builder reads to decide which of the
/// canonical 8 steps to include. Holds no mutable per-build state, so one `BuilderConfig`/
/// `WorkflowBuilder` pair is safe to reuse across concurrent `build()` calls.
#[derive(Debug, Clone, Default)]
pub struct BuilderConfig {
    pub skip_validation: bool,
    pub skip_repository: bool,
    pub skip_nouveau: bool,
    pub skip_dkms: bool,
    pub skip_module_load: bool,
    pub skip_xorg_config: bool,
    pub skip_verification: bool,
    pub required_disk_mb: u64,
    pub custom_validation_checks: Vec<String>,
    pub additional_packages: Vec<String>,
}

/// Assembles a family-specific `Workflow` from a `BuilderConfig`. `build()` is pure with
/// respect to the config: two calls with the same family and config produce two independent
/// workflow instances equivalent in name and step list.
pub struct WorkflowBuilder {
    config: BuilderConfig,
}

impl WorkflowBuilder {
    pub fn new(config: BuilderConfig) -> Self {
        WorkflowBuilder { config }
    }

    /// Builds the `<family>-nvidia-installation` workflow: the canonical 8-step sequence,
    /// filtered by skip flags, with `custom_steps` appended after `verification` in insertion
    /// order. Arch always omits `repository`, even if `skip_repository` is explicitly false,
    /// because that ecosystem ships the driver through its own official repositories.
    pub fn build(
        &self,
        family: DistroFamily,
        host_facts: Option<&HostFacts>,
        custom_steps: Vec<Box<dyn Step>>,
    ) -> Result<Workflow, EngineError> {
        if family == DistroFamily::Unknown {
            return Err(EngineError::from(BuilderError::UnsupportedFamily));
        }
        if host_facts.is_none() {
            return Err(EngineError::from(BuilderError::MissingHostFacts));
        }

        let mut workflow = Workflow::new(format!("{}-nvidia-installation", family.slug()));

        if !self.config.skip_validation {
            workflow.add_step(Box::new(steps::ValidationStep::new(
                self.config.required_disk_mb,
                self.config.custom_validation_checks.clone(),
            )));
        }
        if !self.config.skip_repository && family != DistroFamily::Arch {
            workflow.add_step(Box::new(steps::RepositoryStep::new()));
        }
        if !self.config.skip_nouveau {
            workflow.add_step(Box::new(steps::NouveauBlacklistStep::new()));
        }
        workflow.add_step(Box::new(steps::PackagesStep::new(self.config.additional_packages.clone())));
        if !self.config.skip_dkms {
            workflow.add_step(Box::new(steps::DkmsBuildStep::new()));
        }
        if !self.config.skip_module_load {
            workflow.add_step(Box::new(steps::ModuleLoadStep::new()));
        }
        if !self.config.skip_xorg_config {
            workflow.add_step(Box::new(steps::XorgConfigStep::new()));
        }
        if !self.config.skip_verification {
            workflow.add_step(Box::new(steps::VerificationStep::new()));
        }

        for step in custom_steps {
            workflow.add_step(step);
        }

        Ok(workflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts() -> HostFacts {
        HostFacts {
            family: Some(nv_installer_pkgmgr::Family::Debian),
            gpu_present: true,
            gpu_model: Some("RTX 4090".to_string()),
            kernel_version: "6.8.0".to_string(),
            disk_space_mb: 10_000,
        }
    }

    #[test]
    fn debian_happy_path_has_eight_steps_in_order() {
        let builder = WorkflowBuilder::new(BuilderConfig::default());
        let workflow = builder.build(DistroFamily::Debian, Some(&facts()), Vec::new()).unwrap();
        assert_eq!(workflow.name, "debian-nvidia-installation");
        assert_eq!(
            workflow.steps(),
            vec![
                "validation",
                "repository",
                "nouveau_blacklist",
                "packages",
                "dkms_build",
                "module_load",
                "xorg_config",
                "verification",
            ]
        );
    }

    #[test]
    fn arch_always_omits_repository_even_when_not_skipped() {
        let config = BuilderConfig {
            skip_repository: false,
            ..Default::default()
        };
        let builder = WorkflowBuilder::new(config);
        let workflow = builder.build(DistroFamily::Arch, Some(&facts()), Vec::new()).unwrap();
        assert_eq!(workflow.step_count(), 7);
        assert!(!workflow.steps().contains(&"repository".to_string()));
    }

    #[test]
    fn unknown_family_is_a_build_error() {
        let builder = WorkflowBuilder::new(BuilderConfig::default());
        let err = builder.build(DistroFamily::Unknown, Some(&facts()), Vec::new()).unwrap_err();
        assert!(err.to_string().contains("unsupported distribution family"));
    }

    #[test]
    fn missing_host_facts_is_a_build_error() {
        let builder = WorkflowBuilder::new(BuilderConfig::default());
        let err = builder.build(DistroFamily::Debian, None, Vec::new()).unwrap_err();
        assert!(err.to_string().contains("distribution is nil"));
    }

    #[test]
    fn custom_steps_are_appended_after_verification() {
        let builder = WorkflowBuilder::new(BuilderConfig::default());
        let custom = vec![Box::new(crate::step::FunctionStep::new("reboot_prompt", "prompts for reboot", |_| {
            crate::types::StepResult::complete("ok")
        })) as Box<dyn Step>];
        let workflow = builder.build(DistroFamily::Debian, Some(&facts()), custom).unwrap();
        assert_eq!(workflow.steps().last(), Some(&"reboot_prompt".to_string()));
    }

    #[test]
    fn build_is_pure_and_reusable() {
        let builder = WorkflowBuilder::new(BuilderConfig::default());
        let a = builder.build(DistroFamily::Suse, Some(&facts()), Vec::new()).unwrap();
        let b = builder.build(DistroFamily::Suse, Some(&facts()), Vec::new()).unwrap();
        assert_eq!(a.name, b.name);
        assert_eq!(a.steps(), b.steps());
    }
}
