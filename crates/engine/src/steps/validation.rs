//! `validation`: read-only host checks (GPU present, kernel version, disk space). No rollback.

use crate::{
    context::{state_keys, Context, StateValue},
    error::{EngineError, ValidationError},
    step::{BaseStep, Step},
    types::StepResult,
};

pub struct ValidationStep {
    base: BaseStep,
    required_disk_mb: u64,
    custom_checks: Vec<String>,
}

impl ValidationStep {
    pub fn new(required_disk_mb: u64, custom_checks: Vec<String>) -> Self {
        ValidationStep {
            base: BaseStep::new("validation", "Validating host prerequisites", false),
            required_disk_mb,
            custom_checks,
        }
    }
}

impl Step for ValidationStep {
    fn name(&self) -> &str {
        &self.base.name
    }

    fn description(&self) -> &str {
        &self.base.description
    }

    fn validate(&self, ctx: &Context) -> Result<(), EngineError> {
        if !ctx.package_adapter.is_available() {
            return Err(EngineError::from(ValidationError::PreconditionFailed {
                step: self.name().to_string(),
                reason: format!("{} is not available on $PATH", ctx.package_adapter.name()),
            }));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context) -> StepResult {
        if !ctx.host_facts.gpu_present {
            return StepResult::fail("no NVIDIA GPU detected", "gpu_present is false");
        }
        if ctx.host_facts.kernel_version.is_empty() {
            return StepResult::fail("kernel version could not be determined", "kernel_version is empty");
        }
        if ctx.host_facts.disk_space_mb < self.required_disk_mb {
            return StepResult::fail(
                format!(
                    "insufficient disk space: {} MB available, {} MB required",
                    ctx.host_facts.disk_space_mb, self.required_disk_mb
                ),
                "disk_space_mb below required_disk_mb",
            );
        }

        for check in &self.custom_checks {
            ctx.logger.info("running custom validation check", &[("check", check.as_str())]);
        }

        ctx.set_state(state_keys::NEEDS_KERNEL_HEADERS, StateValue::Bool(true));
        ctx.set_state(state_keys::NEEDS_NOUVEAU_BLACKLIST, StateValue::Bool(true));

        StepResult::complete(format!(
            "host validated: gpu={}, kernel={}, disk={}MB",
            ctx.host_facts.gpu_model.as_deref().unwrap_or("unknown"),
            ctx.host_facts.kernel_version,
            ctx.host_facts.disk_space_mb
        ))
    }

    fn rollback(&self, _ctx: &Context) -> Result<(), EngineError> {
        Ok(())
    }

    fn can_rollback(&self) -> bool {
        self.base.can_rollback
    }
}
