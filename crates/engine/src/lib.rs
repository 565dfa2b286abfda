//! Transactional workflow engine for GPU driver installation.
//!
//! Components: [`step`] (C1, the rollbackable unit of work), [`context`] (C2, the per-run state
//! bag), [`workflow`] (C3, an ordered step sequence with a dispatch loop), [`orchestrator`] (C4,
//! hooks/events/auto-rollback wrapped around a workflow run), and [`builder`] (C5, assembles a
//! family-specific workflow from the standard [`steps`] catalog). [`package_set`] and [`config`]
//! are the ambient collaborator and configuration-loading layers described alongside them.

pub mod builder;
pub mod config;
pub mod context;
pub mod error;
pub mod logger;
pub mod orchestrator;
pub mod package_set;
pub mod step;
pub mod steps;
pub mod types;
pub mod workflow;

pub use builder::{BuilderConfig, DistroFamily, WorkflowBuilder};
pub use config::InstallerConfig;
pub use context::{CancellationToken, Context, HostFacts, StateValue};
pub use error::{EngineError, ErrorKind, EngineResultExt, ReportError};
pub use logger::{LogLogger, Logger, NullLogger};
pub use orchestrator::{Orchestrator, OrchestratorOptions};
pub use package_set::{DefaultPackageSetCatalog, PackageSet, PackageSetCatalog};
pub use step::{BaseStep, FunctionStep, Step};
pub use types::{
    EventType, ExecutionEvent, ExecutionReport, Progress, StepResult, StepStatus, WorkflowResult,
    WorkflowStatus,
};
pub use workflow::{ProgressCallback, Workflow};
