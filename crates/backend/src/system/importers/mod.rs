pub mod decoder;
pub mod driver;
pub mod error;
pub mod importer;
pub mod initialization;
pub mod orchestrator;
pub mod progress_tracker;
pub mod queue;
pub mod registry;
pub mod scheduling;
pub mod store;
pub mod worker;

#[cfg(test)]
pub mod testing;

pub use decoder::{Decoder, DecoderRegistry};
pub use driver::{ActiveRuns, ImportDriver, PreparedRun, RunGuard};
pub use error::ImportError;
pub use importer::Importer;
pub use initialization::ImportSystem;
pub use orchestrator::ImportOrchestrator;
pub use progress_tracker::ProgressTracker;
pub use queue::{ImportQueue, ImportQueueWorker};
pub use registry::ImporterRegistry;
pub use scheduling::SchedulingGate;
pub use store::{KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore};
pub use worker::ImportScheduler;
