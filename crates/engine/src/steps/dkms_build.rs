//! `dkms_build`: rebuilds kernel modules against the running kernel via DKMS. Rollback is
//! best-effort: a failure to remove a DKMS module tree doesn't block the rest of the rollback
//! run, since a stale module tree left behind is a cosmetic issue, not a host-breaking one.

use crate::{
    context::Context,
    error::EngineError,
    step::{BaseStep, Step},
    types::StepResult,
};

fn run_elevated(ctx: &Context, cmd: &str, args: &[&str]) -> nv_installer_pkgmgr::CommandOutput {
    if ctx.privilege.is_root() {
        ctx.executor.execute(cmd, args)
    } else {
        ctx.executor.execute_elevated(cmd, args)
    }
}

pub struct DkmsBuildStep {
    base: BaseStep,
}

impl DkmsBuildStep {
    pub fn new() -> Self {
        DkmsBuildStep {
            base: BaseStep::new("dkms_build", "Building kernel modules with DKMS", true),
        }
    }
}

impl Default for DkmsBuildStep {
    fn default() -> Self {
        Self::new()
    }
}

impl Step for DkmsBuildStep {
    fn name(&self) -> &str {
        &self.base.name
    }

    fn description(&self) -> &str {
        &self.base.description
    }

    fn validate(&self, ctx: &Context) -> Result<(), EngineError> {
        let _ = ctx;
        Ok(())
    }

    fn execute(&self, ctx: &Context) -> StepResult {
        if ctx.dry_run {
            return StepResult::skip("would run 'dkms autoinstall'");
        }

        let output = run_elevated(ctx, "dkms", &["autoinstall"]);
        if output.failed() {
            return StepResult::fail("dkms autoinstall failed", output.stderr);
        }
        StepResult::complete("kernel modules built via dkms")
    }

    fn rollback(&self, ctx: &Context) -> Result<(), EngineError> {
        // Best-effort: errors are logged, not propagated. The driver version is not tracked
        // precisely enough here to target a `dkms remove` invocation safely, so this step
        // only logs that the modules may need manual cleanup.
        ctx.logger.warn(
            "dkms_build rollback is best-effort; kernel module tree may require manual cleanup",
            &[],
        );
        Ok(())
    }

    fn can_rollback(&self) -> bool {
        self.base.can_rollback
    }
}
