use contracts::system::importers::{RunContext, RunHandle, RunProgress, RunStatus, RunSummary};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Трекер прогресса запусков (in-memory, для опроса из UI)
#[derive(Clone)]
pub struct ProgressTracker {
    sessions: Arc<RwLock<HashMap<String, RunProgress>>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, RunProgress>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, RunProgress>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Создать сессию для нового запуска
    pub fn create_session(&self, handle: &RunHandle) {
        let mut progress = RunProgress::new(
            handle.session_id.clone(),
            handle.importer_id.clone(),
            handle.kind,
        );
        progress.started_at = handle.started_at;
        self.write().insert(handle.session_id.clone(), progress);
    }

    pub fn get_progress(&self, session_id: &str) -> Option<RunProgress> {
        self.read().get(session_id).cloned()
    }

    /// Все сессии, последние сверху
    pub fn list(&self) -> Vec<RunProgress> {
        let mut sessions: Vec<RunProgress> = self.read().values().cloned().collect();
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        sessions
    }

    /// Обновить прогресс после успешного шага
    pub fn update_step(&self, session_id: &str, context: &RunContext, fraction_complete: f64) {
        if let Some(progress) = self.write().get_mut(session_id) {
            progress.status = RunStatus::Running;
            progress.fraction_complete = fraction_complete;
            progress.processed = context.progress();
            progress.total = context.total();
            progress.message = context.message.clone();
            progress.updated_at = chrono::Utc::now();
        }
    }

    /// Отметить сессию как проваленную.
    /// Доля выполнения остается на последнем успешном шаге.
    pub fn fail_session(&self, session_id: &str, error: String) {
        if let Some(progress) = self.write().get_mut(session_id) {
            let now = chrono::Utc::now();
            progress.status = RunStatus::Failed;
            progress.last_error = Some(error);
            progress.updated_at = now;
            progress.completed_at = Some(now);
        }
    }

    /// Завершить сессию
    pub fn complete_session(&self, summary: &RunSummary) {
        if let Some(progress) = self.write().get_mut(&summary.session_id) {
            progress.status = RunStatus::Completed;
            progress.fraction_complete = 1.0;
            progress.processed = summary.processed;
            progress.total = summary.total;
            progress.updated_at = summary.finished_at;
            progress.completed_at = Some(summary.finished_at);
        }
    }

    /// Удалить завершенные сессии старше `max_age_hours`
    pub fn cleanup_old_sessions(&self, max_age_hours: i64) {
        let now = chrono::Utc::now();
        self.write().retain(|_, progress| match progress.completed_at {
            Some(completed_at) => (now - completed_at).num_hours() < max_age_hours,
            None => true, // Активные сессии не удаляем
        });
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
