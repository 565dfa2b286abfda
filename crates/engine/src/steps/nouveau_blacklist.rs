//! `nouveau_blacklist`: writes a modprobe config file blacklisting the open-source `nouveau`
//! driver and regenerates the initramfs via the family-appropriate tool. Rollback deletes the
//! file and regenerates again.

use crate::{
    context::{state_keys, Context, StateValue},
    error::{EngineError, StepError},
    step::{BaseStep, Step},
    steps::initramfs_command,
    types::StepResult,
};

const BLACKLIST_PATH: &str = "/etc/modprobe.d/blacklist-nouveau.conf";
const BLACKLIST_CONTENTS: &str = "blacklist nouveau\noptions nouveau modeset=0\n";

fn run_elevated(ctx: &Context, cmd: &str, args: &[&str]) -> nv_installer_pkgmgr::CommandOutput {
    if ctx.privilege.is_root() {
        ctx.executor.execute(cmd, args)
    } else {
        ctx.executor.execute_elevated(cmd, args)
    }
}

pub struct NouveauBlacklistStep {
    base: BaseStep,
}

impl NouveauBlacklistStep {
    pub fn new() -> Self {
        NouveauBlacklistStep {
            base: BaseStep::new("nouveau_blacklist", "Blacklisting the nouveau kernel module", true),
        }
    }
}

impl Default for NouveauBlacklistStep {
    fn default() -> Self {
        Self::new()
    }
}

impl Step for NouveauBlacklistStep {
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
        if !ctx.get_bool(state_keys::NEEDS_NOUVEAU_BLACKLIST) {
            return StepResult::skip("nouveau blacklist not required on this host");
        }

        if ctx.dry_run {
            return StepResult::skip(format!("would write {BLACKLIST_PATH} and regenerate initramfs"));
        }

        let write = ctx
            .executor
            .execute_with_input(BLACKLIST_CONTENTS.as_bytes(), "tee", &[BLACKLIST_PATH]);
        if write.failed() {
            return StepResult::fail(
                format!("failed to write {BLACKLIST_PATH}"),
                write.stderr,
            );
        }

        let (cmd, args) = initramfs_command(ctx.package_adapter.family());
        let regen = run_elevated(ctx, cmd, args);
        if regen.failed() {
            return StepResult::fail(format!("failed to regenerate initramfs via {cmd}"), regen.stderr);
        }

        ctx.set_state("nouveau_blacklist_written", StateValue::Bool(true));
        StepResult::complete(format!("blacklisted nouveau and regenerated initramfs via {cmd}"))
    }

    fn rollback(&self, ctx: &Context) -> Result<(), EngineError> {
        if !ctx.get_bool("nouveau_blacklist_written") {
            return Ok(());
        }

        let remove = run_elevated(ctx, "rm", &["-f", BLACKLIST_PATH]);
        if remove.failed() {
            return Err(EngineError::from(StepError::ExecutionFailed {
                step: self.name().to_string(),
                message: remove.stderr,
            }));
        }

        let (cmd, args) = initramfs_command(ctx.package_adapter.family());
        let regen = run_elevated(ctx, cmd, args);
        if regen.failed() {
            return Err(EngineError::from(StepError::ExecutionFailed {
                step: self.name().to_string(),
                message: regen.stderr,
            }));
        }
        Ok(())
    }

    fn can_rollback(&self) -> bool {
        self.base.can_rollback
    }
}
