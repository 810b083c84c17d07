use chrono::{DateTime, TimeZone, Utc};
use contracts::system::importers::response::{ImporterOverview, ImporterState};
use contracts::system::importers::ImporterDefinition;
use std::sync::Arc;

use super::error::ImportError;
use super::importer::Importer;
use super::registry::ImporterRegistry;
use super::store::{state_key, KeyValueStore, LAST_RUN_SUFFIX, QUEUED_SUFFIX};

/// Определяет, пора ли запускать импортер, и ведет его метки времени
/// (`<id>.queued`, `<id>.last_run`, unix-секунды, 0 = не задано).
pub struct SchedulingGate {
    store: Arc<dyn KeyValueStore>,
}

impl SchedulingGate {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn last_run_at(&self, importer_id: &str) -> Result<i64, ImportError> {
        self.store
            .get(&state_key(importer_id, LAST_RUN_SUFFIX), 0)
            .await
            .map_err(ImportError::Store)
    }

    pub async fn queued_at(&self, importer_id: &str) -> Result<i64, ImportError> {
        self.store
            .get(&state_key(importer_id, QUEUED_SUFFIX), 0)
            .await
            .map_err(ImportError::Store)
    }

    pub async fn is_due(&self, definition: &ImporterDefinition) -> Result<bool, ImportError> {
        self.is_due_at(definition, Utc::now().timestamp()).await
    }

    /// Импортер ни разу не запускался или интервал с последнего запуска истек
    pub async fn is_due_at(
        &self,
        definition: &ImporterDefinition,
        now: i64,
    ) -> Result<bool, ImportError> {
        let last_run = self.last_run_at(&definition.id).await?;
        Ok(is_due(last_run, definition.cron_interval_seconds(), now))
    }

    pub async fn mark_queued(&self, importer_id: &str, at: i64) -> Result<(), ImportError> {
        self.write(importer_id, QUEUED_SUFFIX, at).await
    }

    pub async fn clear_queued(&self, importer_id: &str) -> Result<(), ImportError> {
        self.write(importer_id, QUEUED_SUFFIX, 0).await
    }

    pub async fn mark_run(&self, importer_id: &str, at: i64) -> Result<(), ImportError> {
        self.write(importer_id, LAST_RUN_SUFFIX, at).await
    }

    /// Атомарно ставит импортер в очередь, если он должен запускаться
    /// и еще не стоит в очереди. Возвращает `true`, если постановка выполнена.
    pub async fn try_mark_queued(
        &self,
        definition: &ImporterDefinition,
        now: i64,
    ) -> Result<bool, ImportError> {
        if !self.is_due_at(definition, now).await? {
            return Ok(false);
        }
        self.store
            .compare_and_set(&state_key(&definition.id, QUEUED_SUFFIX), 0, now)
            .await
            .map_err(ImportError::Store)
    }

    /// Импортеры, которые должны запускаться и не стоят в очереди (без изменения состояния)
    pub async fn due_and_not_queued(
        &self,
        importers: &[Arc<dyn Importer>],
        now: i64,
    ) -> Result<Vec<Arc<dyn Importer>>, ImportError> {
        let mut selected = Vec::new();
        for importer in importers {
            if self.is_due_at(importer.definition(), now).await?
                && self.queued_at(importer.id()).await? == 0
            {
                selected.push(Arc::clone(importer));
            }
        }
        Ok(selected)
    }

    /// Обход реестра: атомарно захватывает все импортеры, которые пора запускать.
    /// Возвращает id захваченных импортеров для постановки в очередь.
    pub async fn claim_due(
        &self,
        registry: &ImporterRegistry,
        now: i64,
    ) -> Result<Vec<String>, ImportError> {
        let mut claimed = Vec::new();
        for importer in registry.list_all() {
            if self.try_mark_queued(importer.definition(), now).await? {
                claimed.push(importer.id().to_string());
            }
        }
        Ok(claimed)
    }

    /// Сводка по импортеру для списка в UI
    pub async fn overview(
        &self,
        definition: &ImporterDefinition,
        running: bool,
        now: i64,
    ) -> Result<ImporterOverview, ImportError> {
        let last_run = self.last_run_at(&definition.id).await?;
        let queued = self.queued_at(&definition.id).await?;

        let state = if running {
            ImporterState::Running
        } else if queued != 0 {
            ImporterState::Queued
        } else {
            ImporterState::Idle
        };

        Ok(ImporterOverview {
            definition: definition.clone(),
            state,
            is_due: is_due(last_run, definition.cron_interval_seconds(), now),
            last_run_at: to_datetime(last_run),
            queued_at: to_datetime(queued),
        })
    }

    async fn write(&self, importer_id: &str, suffix: &str, value: i64) -> Result<(), ImportError> {
        tracing::debug!("Setting {}.{} = {}", importer_id, suffix, value);
        self.store
            .set(&state_key(importer_id, suffix), value)
            .await
            .map_err(ImportError::Store)
    }
}

fn is_due(last_run: i64, interval_seconds: i64, now: i64) -> bool {
    last_run == 0 || now >= last_run.saturating_add(interval_seconds)
}

fn to_datetime(timestamp: i64) -> Option<DateTime<Utc>> {
    if timestamp == 0 {
        return None;
    }
    Utc.timestamp_opt(timestamp, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::importers::store::MemoryKeyValueStore;
    use crate::system::importers::testing::ListImporter;

    const NOW: i64 = 1_700_000_000;

    fn gate() -> SchedulingGate {
        SchedulingGate::new(Arc::new(MemoryKeyValueStore::new()))
    }

    fn hourly() -> ImporterDefinition {
        ImporterDefinition::new("news", "News").with_cron_minutes(60)
    }

    #[tokio::test]
    async fn test_never_run_is_due_regardless_of_interval() {
        let gate = gate();
        let def = ImporterDefinition::new("news", "News").with_cron_minutes(100_000);
        assert!(gate.is_due_at(&def, 1).await.unwrap());
        assert!(gate.is_due(&def).await.unwrap());
    }

    #[tokio::test]
    async fn test_due_after_interval() {
        let gate = gate();
        let def = hourly();
        gate.mark_run("news", NOW).await.unwrap();

        assert!(!gate.is_due_at(&def, NOW + 60).await.unwrap());
        assert!(!gate.is_due_at(&def, NOW + 59 * 60).await.unwrap());
        assert!(gate.is_due_at(&def, NOW + 60 * 60).await.unwrap());
        assert!(gate.is_due_at(&def, NOW + 61 * 60).await.unwrap());
    }

    #[tokio::test]
    async fn test_queue_markers() {
        let gate = gate();
        assert_eq!(gate.queued_at("news").await.unwrap(), 0);
        gate.mark_queued("news", NOW).await.unwrap();
        assert_eq!(gate.queued_at("news").await.unwrap(), NOW);
        gate.clear_queued("news").await.unwrap();
        assert_eq!(gate.queued_at("news").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_due_and_not_queued_selection() {
        let gate = gate();
        let importers: Vec<Arc<dyn Importer>> = vec![
            Arc::new(ListImporter::new("fresh", &["a"])),
            Arc::new(ListImporter::new("queued", &["a"])),
            Arc::new(ListImporter::new("recent", &["a"])),
        ];
        gate.mark_queued("queued", NOW - 10).await.unwrap();
        gate.mark_run("recent", NOW - 10).await.unwrap();

        let selected = gate.due_and_not_queued(&importers, NOW).await.unwrap();
        let ids: Vec<&str> = selected.iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec!["fresh"]);
    }

    #[tokio::test]
    async fn test_try_mark_queued_claims_once() {
        let gate = gate();
        let def = hourly();
        assert!(gate.try_mark_queued(&def, NOW).await.unwrap());
        assert!(!gate.try_mark_queued(&def, NOW + 1).await.unwrap());
        assert_eq!(gate.queued_at("news").await.unwrap(), NOW);
    }

    #[tokio::test]
    async fn test_concurrent_claims_enqueue_once() {
        let gate = Arc::new(gate());
        let def = hourly();

        let mut handles = Vec::new();
        for i in 0..8 {
            let gate = Arc::clone(&gate);
            let def = def.clone();
            handles.push(tokio::spawn(async move {
                gate.try_mark_queued(&def, NOW + i).await.unwrap()
            }));
        }

        let mut claimed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 1);
    }

    #[tokio::test]
    async fn test_claim_due_sweeps_registry() {
        let gate = gate();
        let mut registry = ImporterRegistry::new();
        registry.register(ListImporter::new("a", &["x"]));
        registry.register(ListImporter::new("b", &["x"]));
        gate.mark_run("b", NOW).await.unwrap();

        assert_eq!(gate.claim_due(&registry, NOW).await.unwrap(), vec!["a"]);
        assert!(gate.claim_due(&registry, NOW).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overview_states() {
        let gate = gate();
        let def = hourly();

        let idle = gate.overview(&def, false, NOW).await.unwrap();
        assert_eq!(idle.state, ImporterState::Idle);
        assert!(idle.is_due);
        assert!(idle.last_run_at.is_none());

        gate.mark_queued("news", NOW).await.unwrap();
        let queued = gate.overview(&def, false, NOW).await.unwrap();
        assert_eq!(queued.state, ImporterState::Queued);

        let running = gate.overview(&def, true, NOW).await.unwrap();
        assert_eq!(running.state, ImporterState::Running);

        gate.clear_queued("news").await.unwrap();
        gate.mark_run("news", NOW).await.unwrap();
        let done = gate.overview(&def, false, NOW).await.unwrap();
        assert_eq!(done.state, ImporterState::Idle);
        assert!(!done.is_due);
        assert_eq!(done.last_run_at.map(|t| t.timestamp()), Some(NOW));
    }
}
