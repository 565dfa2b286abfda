//! `packages`: installs the package set computed from driver version + selected components +
//! additional packages. Rollback removes the packages it actually installed. Must persist the
//! installed list in the context state map under `installed_packages` before declaring success.

use std::time::Instant;

use nv_installer_pkgmgr::{AdapterContext, InstallOptions, RemoveOptions};

use crate::{
    context::{state_keys, Context, StateValue},
    error::{EngineError, StepError},
    step::{BaseStep, Step},
    types::StepResult,
};

pub struct PackagesStep {
    base: BaseStep,
    additional_packages: Vec<String>,
}

impl PackagesStep {
    pub fn new(additional_packages: Vec<String>) -> Self {
        PackagesStep {
            base: BaseStep::new("packages", "Installing NVIDIA driver packages", true),
            additional_packages,
        }
    }

    fn resolve_package_list(&self, ctx: &Context) -> Vec<String> {
        let set = ctx.package_set.get_package_set(ctx.package_adapter.family());
        let mut pkgs = set.get_packages_for_version(&ctx.driver_version);
        for component in &ctx.selected_components {
            pkgs.extend(set.get_packages(component));
        }
        pkgs.extend(self.additional_packages.iter().cloned());
        pkgs
    }
}

impl Step for PackagesStep {
    fn name(&self) -> &str {
        &self.base.name
    }

    fn description(&self) -> &str {
        &self.base.description
    }

    fn validate(&self, _ctx: &Context) -> Result<(), EngineError> {
        Ok(())
    }

    fn execute(&self, ctx: &Context) -> StepResult {
        let pkgs = self.resolve_package_list(ctx);
        let refs: Vec<&str> = pkgs.iter().map(String::as_str).collect();

        if ctx.dry_run {
            return StepResult::skip(format!("would install: {}", pkgs.join(", ")));
        }

        let start = Instant::now();
        let adapter_ctx = AdapterContext::new(ctx.dry_run);
        if let Err(e) = ctx
            .package_adapter
            .install(&adapter_ctx, &InstallOptions::non_interactive(), &refs)
        {
            return StepResult::fail(
                "package installation failed",
                EngineError::from(StepError::ExecutionFailed {
                    step: self.name().to_string(),
                    message: e.to_string(),
                })
                .to_string(),
            );
        }
        let elapsed = start.elapsed();

        // Persist what was installed before declaring success, so a later failure in this same
        // step (or a crash) never leaves rollback without a record of what to undo.
        ctx.set_state(state_keys::INSTALLED_PACKAGES, StateValue::StrList(pkgs.clone()));
        ctx.set_state(state_keys::PACKAGE_INSTALL_TIME, StateValue::Duration(elapsed));
        ctx.set_state(state_keys::PACKAGES_INSTALLED, StateValue::Bool(true));

        StepResult::complete(format!("installed {} package(s)", pkgs.len()))
    }

    fn rollback(&self, ctx: &Context) -> Result<(), EngineError> {
        let installed = ctx.get_string_list(state_keys::INSTALLED_PACKAGES);
        if installed.is_empty() {
            return Ok(());
        }

        let refs: Vec<&str> = installed.iter().map(String::as_str).collect();
        let adapter_ctx = AdapterContext::new(ctx.dry_run);
        ctx.package_adapter
            .remove(&adapter_ctx, &RemoveOptions::non_interactive(), &refs)
            .map_err(|e| {
                EngineError::from(StepError::ExecutionFailed {
                    step: self.name().to_string(),
                    message: e.to_string(),
                })
            })
    }

    fn can_rollback(&self) -> bool {
        self.base.can_rollback
    }
}
