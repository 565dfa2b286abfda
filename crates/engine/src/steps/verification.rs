//! `verification`: read-only post-install checks (package installed, modules loaded). No
//! rollback.

use crate::{
    context::{state_keys, Context},
    error::EngineError,
    step::{BaseStep, Step},
    types::StepResult,
};

pub struct VerificationStep {
    base: BaseStep,
}

impl VerificationStep {
    pub fn new() -> Self {
        VerificationStep {
            base: BaseStep::new("verification", "Verifying the driver installation", false),
        }
    }
}

impl Default for VerificationStep {
    fn default() -> Self {
        Self::new()
    }
}

impl Step for VerificationStep {
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
        if ctx.dry_run {
            return StepResult::skip("dry run: skipping post-install verification");
        }

        if !ctx.get_bool(state_keys::PACKAGES_INSTALLED) {
            return StepResult::fail(
                "verification failed: packages were never installed",
                "packages_installed is false",
            );
        }

        let installed = ctx.get_string_list(state_keys::INSTALLED_PACKAGES);
        for pkg in &installed {
            let adapter_ctx = nv_installer_pkgmgr::AdapterContext::new(ctx.dry_run);
            match ctx.package_adapter.is_installed(&adapter_ctx, pkg) {
                Ok(true) => {}
                Ok(false) => {
                    return StepResult::fail(
                        format!("verification failed: '{pkg}' is not installed"),
                        "is_installed returned false",
                    )
                }
                Err(e) => return StepResult::fail(format!("verification failed checking '{pkg}'"), e.to_string()),
            }
        }

        StepResult::complete(format!("verified {} installed package(s)", installed.len()))
    }

    fn rollback(&self, _ctx: &Context) -> Result<(), EngineError> {
        Ok(())
    }

    fn can_rollback(&self) -> bool {
        self.base.can_rollback
    }
}
