//! `repository`: adds the driver-vendor repository through the package adapter. Rollback
//! removes it. Never scheduled for the Arch family — the builder omits this step entirely
//! there, so this body never has to special-case Arch itself.

use nv_installer_pkgmgr::{AdapterContext, Repository};

use crate::{
    context::{state_keys, Context, StateValue},
    error::{EngineError, StepError},
    step::{BaseStep, Step},
    types::StepResult,
};

const REPO_NAME: &str = "nvidia-cuda";

fn repo_url(family: nv_installer_pkgmgr::Family) -> &'static str {
    use nv_installer_pkgmgr::Family;
    match family {
        Family::Debian => "https://developer.download.nvidia.com/compute/cuda/repos/ubuntu2204/x86_64/",
        Family::Rhel => "https://developer.download.nvidia.com/compute/cuda/repos/rhel9/x86_64/",
        Family::Suse => "https://developer.download.nvidia.com/compute/cuda/repos/opensuse15/x86_64/",
        Family::Arch => "https://developer.download.nvidia.com/compute/cuda/repos/arch/x86_64/",
    }
}

pub struct RepositoryStep {
    base: BaseStep,
}

impl RepositoryStep {
    pub fn new() -> Self {
        RepositoryStep {
            base: BaseStep::new("repository", "Adding the NVIDIA driver repository", true),
        }
    }
}

impl Default for RepositoryStep {
    fn default() -> Self {
        Self::new()
    }
}

impl Step for RepositoryStep {
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
        let family = ctx.package_adapter.family();
        let url = repo_url(family);

        if ctx.dry_run {
            return StepResult::skip(format!("would add repository '{REPO_NAME}' ({url})"));
        }

        let mut repo = Repository::new(REPO_NAME, url);
        repo.gpg_key = Some(format!("{url}3bf863cc.pub"));

        let adapter_ctx = AdapterContext::new(ctx.dry_run);
        if let Err(e) = ctx.package_adapter.add_repository(&adapter_ctx, &repo) {
            return StepResult::fail(
                format!("failed to add repository '{REPO_NAME}'"),
                EngineError::from(StepError::ExecutionFailed {
                    step: self.name().to_string(),
                    message: e.to_string(),
                })
                .to_string(),
            );
        }

        ctx.set_state(state_keys::REPOSITORY_CONFIGURED, StateValue::Bool(true));
        ctx.set_state(state_keys::REPOSITORY_NAME, StateValue::Str(REPO_NAME.to_string()));
        ctx.set_state(state_keys::REPOSITORY_URL, StateValue::Str(url.to_string()));

        StepResult::complete(format!("configured repository '{REPO_NAME}'"))
    }

    fn rollback(&self, ctx: &Context) -> Result<(), EngineError> {
        let name = ctx.get_string(state_keys::REPOSITORY_NAME);
        if name.is_empty() {
            // Nothing was configured (dry-run, or execute never completed); idempotent no-op.
            return Ok(());
        }

        let adapter_ctx = AdapterContext::new(ctx.dry_run);
        ctx.package_adapter
            .remove_repository(&adapter_ctx, &name)
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
