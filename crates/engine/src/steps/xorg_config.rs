//! `xorg_config`: writes display-server configuration selecting the NVIDIA driver. Rollback
//! deletes it.

use crate::{
    context::{Context, StateValue},
    error::{EngineError, StepError},
    step::{BaseStep, Step},
    types::StepResult,
};

const XORG_CONF_PATH: &str = "/etc/X11/xorg.conf.d/10-nvidia.conf";
const XORG_CONF_CONTENTS: &str = "Section \"Device\"\n    Identifier \"nvidia\"\n    Driver \"nvidia\"\nEndSection\n";
const WRITTEN_KEY: &str = "xorg_config_written";

fn run_elevated(ctx: &Context, cmd: &str, args: &[&str]) -> nv_installer_pkgmgr::CommandOutput {
    if ctx.privilege.is_root() {
        ctx.executor.execute(cmd, args)
    } else {
        ctx.executor.execute_elevated(cmd, args)
    }
}

pub struct XorgConfigStep {
    base: BaseStep,
}

impl XorgConfigStep {
    pub fn new() -> Self {
        XorgConfigStep {
            base: BaseStep::new("xorg_config", "Writing Xorg display configuration", true),
        }
    }
}

impl Default for XorgConfigStep {
    fn default() -> Self {
        Self::new()
    }
}

impl Step for XorgConfigStep {
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
            return StepResult::skip(format!("would write {XORG_CONF_PATH}"));
        }

        let mkdir = run_elevated(ctx, "mkdir", &["-p", "/etc/X11/xorg.conf.d"]);
        if mkdir.failed() {
            return StepResult::fail("failed to create /etc/X11/xorg.conf.d", mkdir.stderr);
        }

        let write = ctx
            .executor
            .execute_with_input(XORG_CONF_CONTENTS.as_bytes(), "tee", &[XORG_CONF_PATH]);
        if write.failed() {
            return StepResult::fail(format!("failed to write {XORG_CONF_PATH}"), write.stderr);
        }

        ctx.set_state(WRITTEN_KEY, StateValue::Bool(true));
        StepResult::complete(format!("wrote {XORG_CONF_PATH}"))
    }

    fn rollback(&self, ctx: &Context) -> Result<(), EngineError> {
        if !ctx.get_bool(WRITTEN_KEY) {
            return Ok(());
        }

        let output = run_elevated(ctx, "rm", &["-f", XORG_CONF_PATH]);
        if output.failed() {
            return Err(EngineError::from(StepError::ExecutionFailed {
                step: self.name().to_string(),
                message: output.stderr,
            }));
        }
        Ok(())
    }

    fn can_rollback(&self) -> bool {
        self.base.can_rollback
    }
}
