use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::run_context::RunKind;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Pending => "Pending",
            RunStatus::Running => "Running",
            RunStatus::Completed => "Completed",
            RunStatus::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Прогресс сессии запуска для опроса из UI.
///
/// При ошибке сохраняется последняя успешная доля выполнения и текст ошибки.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunProgress {
    pub session_id: String,
    pub importer_id: String,
    pub kind: RunKind,
    pub status: RunStatus,
    pub fraction_complete: f64,
    pub processed: u64,
    pub total: u64,
    pub message: Option<String>,
    pub last_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunProgress {
    pub fn new(session_id: String, importer_id: String, kind: RunKind) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            importer_id,
            kind,
            status: RunStatus::Pending,
            fraction_complete: 0.0,
            processed: 0,
            total: 0,
            message: None,
            last_error: None,
            started_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}
