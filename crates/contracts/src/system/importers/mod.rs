//! Общие типы фреймворка импорта: определения импортеров, статус батча,
//! контекст выполнения и DTO для HTTP-поверхности.

pub mod batch_status;
pub mod definition;
pub mod progress;
pub mod response;
pub mod run_context;

pub use batch_status::BatchStatus;
pub use definition::{ImporterConfiguration, ImporterDefinition, DEFAULT_CRON_MINUTES};
pub use progress::{RunProgress, RunStatus};
pub use run_context::{RunContext, RunHandle, RunKind, RunSummary, Sandbox, StepResult};
