//! `module_load`: loads the proprietary modules via `modprobe`. Rollback unloads them.

use crate::{
    context::{Context, StateValue},
    error::{EngineError, StepError},
    step::{BaseStep, Step},
    types::StepResult,
};

const MODULES: &[&str] = &["nvidia", "nvidia_modeset", "nvidia_uvm", "nvidia_drm"];
const LOADED_KEY: &str = "module_load_loaded";

fn run_elevated(ctx: &Context, cmd: &str, args: &[&str]) -> nv_installer_pkgmgr::CommandOutput {
    if ctx.privilege.is_root() {
        ctx.executor.execute(cmd, args)
    } else {
        ctx.executor.execute_elevated(cmd, args)
    }
}

pub struct ModuleLoadStep {
    base: BaseStep,
}

impl ModuleLoadStep {
    pub fn new() -> Self {
        ModuleLoadStep {
            base: BaseStep::new("module_load", "Loading NVIDIA kernel modules", true),
        }
    }
}

impl Default for ModuleLoadStep {
    fn default() -> Self {
        Self::new()
    }
}

impl Step for ModuleLoadStep {
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
            return StepResult::skip(format!("would load modules: {}", MODULES.join(", ")));
        }

        let mut loaded = Vec::new();
        for module in MODULES {
            let output = run_elevated(ctx, "modprobe", &[module]);
            if output.failed() {
                // Roll back any module we already loaded this call before reporting failure,
                // so a partially-loaded module set never masquerades as "nothing happened".
                ctx.set_state(LOADED_KEY, StateValue::StrList(loaded.clone()));
                return StepResult::fail(format!("failed to load module '{module}'"), output.stderr);
            }
            loaded.push(module.to_string());
        }

        ctx.set_state(LOADED_KEY, StateValue::StrList(loaded));
        StepResult::complete(format!("loaded modules: {}", MODULES.join(", ")))
    }

    fn rollback(&self, ctx: &Context) -> Result<(), EngineError> {
        let loaded = ctx.get_string_list(LOADED_KEY);
        if loaded.is_empty() {
            return Ok(());
        }

        let mut failures = Vec::new();
        for module in loaded.iter().rev() {
            let output = run_elevated(ctx, "modprobe", &["-r", module]);
            if output.failed() {
                failures.push(format!("{module}: {}", output.stderr));
            }
        }

        if !failures.is_empty() {
            return Err(EngineError::from(StepError::ExecutionFailed {
                step: self.name().to_string(),
                message: failures.join("; "),
            }));
        }
        Ok(())
    }

    fn can_rollback(&self) -> bool {
        self.base.can_rollback
    }
}
