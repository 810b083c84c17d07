use anyhow::Result;
use chrono::Utc;
use contracts::system::importers::response::{ImporterDetailResponse, ImporterOverview};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

use super::{
    DecoderRegistry, ImportDriver, ImportError, ImportOrchestrator, ImportQueue, ImportQueueWorker,
    ImportScheduler, ImporterRegistry, KeyValueStore, MemoryKeyValueStore, ProgressTracker,
    SchedulingGate, SqliteKeyValueStore,
};
use crate::shared::config::{get_database_path, Config, SchedulerConfig};
use crate::shared::data::db;
use crate::usecases::u601_bacon_ipsum;

/// Сколько часов хранить завершенные сессии в трекере
const SESSION_RETENTION_HOURS: i64 = 24;

/// Собранная система импорта; разделяется между HTTP-обработчиками и фоновыми задачами
#[derive(Clone)]
pub struct ImportSystem {
    pub registry: Arc<ImporterRegistry>,
    pub gate: Arc<SchedulingGate>,
    pub driver: Arc<ImportDriver>,
    pub queue: ImportQueue,
}

impl ImportSystem {
    /// Собрать систему; возвращает также получателя очереди для воркера
    pub fn new(
        registry: ImporterRegistry,
        store: Arc<dyn KeyValueStore>,
        max_idle_steps: u32,
    ) -> (Self, mpsc::UnboundedReceiver<String>) {
        let registry = Arc::new(registry);
        let gate = Arc::new(SchedulingGate::new(store));
        let orchestrator = Arc::new(ImportOrchestrator::new(
            Arc::clone(&registry),
            Arc::new(DecoderRegistry::with_defaults()),
            Arc::clone(&gate),
        ));
        let driver = Arc::new(ImportDriver::new(
            orchestrator,
            Arc::new(ProgressTracker::new()),
            max_idle_steps,
        ));
        let (queue, receiver) = ImportQueue::channel();

        (
            Self {
                registry,
                gate,
                driver,
                queue,
            },
            receiver,
        )
    }

    pub fn tracker(&self) -> &Arc<ProgressTracker> {
        self.driver.tracker()
    }

    /// Сводка по всем импортерам
    pub async fn list_overviews(&self) -> Result<Vec<ImporterOverview>, ImportError> {
        let now = Utc::now().timestamp();
        let mut overviews = Vec::with_capacity(self.registry.len());
        for importer in self.registry.list_all() {
            let running = self.driver.is_running(importer.id());
            overviews.push(self.gate.overview(importer.definition(), running, now).await?);
        }
        Ok(overviews)
    }

    /// Сводка и настройки одного импортера
    pub async fn detail(&self, importer_id: &str) -> Result<ImporterDetailResponse, ImportError> {
        let importer = self.registry.resolve(importer_id)?;
        let overview = self
            .gate
            .overview(
                importer.definition(),
                self.driver.is_running(importer_id),
                Utc::now().timestamp(),
            )
            .await?;
        Ok(ImporterDetailResponse {
            overview,
            configuration: importer.configuration(),
        })
    }

    /// Вернуть в очередь импортеры с отметкой `queued` из хранилища.
    /// Очередь живет в памяти процесса, отметка переживает перезапуск.
    /// Без повторной постановки такой импортер больше не планируется.
    pub async fn recover_queued(&self) -> Result<Vec<String>, ImportError> {
        let mut recovered = Vec::new();
        for importer in self.registry.list_all() {
            let importer_id = importer.id();
            if self.gate.queued_at(importer_id).await? == 0 {
                continue;
            }
            match self.queue.enqueue(importer_id) {
                Ok(()) => {
                    tracing::info!(
                        "Importer '{}' was queued before restart, queueing again",
                        importer_id
                    );
                    recovered.push(importer_id.to_string());
                }
                Err(e) => {
                    tracing::warn!("Failed to queue importer '{}': {}", importer_id, e);
                    self.gate.clear_queued(importer_id).await?;
                }
            }
        }
        Ok(recovered)
    }

    /// Запустить воркер очереди, планировщик и очистку трекера
    pub fn start_background(
        &self,
        receiver: mpsc::UnboundedReceiver<String>,
        config: &SchedulerConfig,
    ) {
        let worker = ImportQueueWorker::new(receiver, Arc::clone(&self.gate), Arc::clone(&self.driver));
        tokio::spawn(worker.run_loop());

        if config.enabled {
            let scheduler = ImportScheduler::new(
                Arc::clone(&self.registry),
                Arc::clone(&self.gate),
                self.queue.clone(),
                config.sweep_interval_seconds,
            );
            tokio::spawn(async move { scheduler.run_loop().await });
        } else {
            tracing::info!("Import scheduler is disabled, runs start only on request");
        }

        let tracker = Arc::clone(self.tracker());
        tokio::spawn(async move {
            let mut interval = time::interval(time::Duration::from_secs(3600));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                tracker.cleanup_old_sessions(SESSION_RETENTION_HOURS);
            }
        });
    }
}

/// Хранилище меток времени по секции `[storage]`
pub async fn build_store(config: &Config) -> Result<Arc<dyn KeyValueStore>> {
    if config.storage.is_memory() {
        tracing::warn!("Importer state is kept in memory and will be lost on restart");
        return Ok(Arc::new(MemoryKeyValueStore::new()));
    }

    let db_path = get_database_path(config);
    let conn = db::connect(&db_path).await?;
    let store = SqliteKeyValueStore::new(conn, config.storage.collection.clone()).await?;
    tracing::info!(
        "Importer state stored in {} (collection '{}')",
        db_path.display(),
        config.storage.collection
    );
    Ok(Arc::new(store))
}

/// Реестр импортеров по секциям `[importers.<id>]`
pub fn build_registry(config: &Config) -> Result<ImporterRegistry> {
    let mut registry = ImporterRegistry::new();

    // Register U601 Bacon ipsum importer
    let u601 = config.importer(u601_bacon_ipsum::IMPORTER_ID);
    if u601.enabled {
        let sink = Arc::new(u601_bacon_ipsum::MemoryContentStore::new());
        registry.register(u601_bacon_ipsum::BaconIpsumImporter::from_settings(
            &u601.settings,
            u601.cron_minutes,
            sink,
        )?);
    } else {
        tracing::info!("Importer '{}' is disabled", u601_bacon_ipsum::IMPORTER_ID);
    }

    for id in config.importers.keys() {
        if registry.get(id).is_none() && config.importer(id).enabled {
            tracing::warn!("Unknown importer '{}' in configuration, ignored", id);
        }
    }

    tracing::info!("Registered {} importer(s)", registry.len());
    Ok(registry)
}

/// Инициализирует систему импорта и фоновые задачи.
pub async fn initialize_import_system(config: &Config) -> Result<ImportSystem> {
    let store = build_store(config).await?;
    let registry = build_registry(config)?;
    let (system, receiver) = ImportSystem::new(registry, store, config.scheduler.max_idle_steps);
    system.recover_queued().await?;
    system.start_background(receiver, &config.scheduler);
    Ok(system)
}
