use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::definition::{ImporterConfiguration, ImporterDefinition};
use super::progress::RunProgress;
use super::run_context::RunKind;

/// Состояние импортера: Idle -> Queued -> Running -> Idle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImporterState {
    Idle,
    Queued,
    Running,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImporterOverview {
    #[serde(flatten)]
    pub definition: ImporterDefinition,
    pub state: ImporterState,
    pub is_due: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub queued_at: Option<DateTime<Utc>>,
}

/// Импортер вместе с его текущими настройками
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImporterDetailResponse {
    #[serde(flatten)]
    pub overview: ImporterOverview,
    pub configuration: ImporterConfiguration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImporterListResponse {
    pub importers: Vec<ImporterOverview>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRunResponse {
    pub session_id: String,
    pub importer_id: String,
    pub kind: RunKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunProgressListResponse {
    pub sessions: Vec<RunProgress>,
}
