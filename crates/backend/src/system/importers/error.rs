use thiserror::Error;

/// Ошибки фреймворка импорта.
///
/// Ошибки самих импортеров (`anyhow::Error`) не поглощаются: они
/// сохраняются как `source` соответствующего варианта.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Importer not found: {0}")]
    ImporterNotFound(String),

    #[error("Fetch failed for importer '{importer_id}': {source}")]
    Fetch {
        importer_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Apply failed for importer '{importer_id}': {source}")]
    Apply {
        importer_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to decode payload as '{format}': {message}")]
    Decode { format: String, message: String },

    #[error("Hook '{hook}' failed for importer '{importer_id}': {source}")]
    Hook {
        importer_id: String,
        hook: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Importer '{importer_id}' reported invalid progress {progress} of {total} (was {previous})")]
    InvalidProgress {
        importer_id: String,
        previous: u64,
        progress: u64,
        total: u64,
    },

    #[error("Importer '{importer_id}' made no progress for {steps} steps ({progress} of {total})")]
    Stalled {
        importer_id: String,
        steps: u32,
        progress: u64,
        total: u64,
    },

    #[error("Importer '{0}' already has an active run")]
    AlreadyRunning(String),

    #[error("State store error: {0}")]
    Store(#[source] anyhow::Error),
}

impl ImportError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ImportError::ImporterNotFound(_))
    }
}
