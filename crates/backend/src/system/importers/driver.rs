use contracts::system::importers::{RunHandle, RunKind, RunSummary};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use super::error::ImportError;
use super::orchestrator::ImportOrchestrator;
use super::progress_tracker::ProgressTracker;

/// Набор импортеров с активным запуском (в пределах процесса)
#[derive(Clone, Default)]
pub struct ActiveRuns {
    ids: Arc<Mutex<HashSet<String>>>,
}

impl ActiveRuns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Захватить импортер. Повторный захват до освобождения дает `AlreadyRunning`.
    pub fn acquire(&self, importer_id: &str) -> Result<RunGuard, ImportError> {
        let mut ids = self.ids.lock().unwrap_or_else(|e| e.into_inner());
        if !ids.insert(importer_id.to_string()) {
            return Err(ImportError::AlreadyRunning(importer_id.to_string()));
        }
        Ok(RunGuard {
            importer_id: importer_id.to_string(),
            ids: Arc::clone(&self.ids),
        })
    }

    pub fn is_running(&self, importer_id: &str) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(importer_id)
    }
}

/// Освобождает импортер при удалении, в том числе если запуск брошен
pub struct RunGuard {
    importer_id: String,
    ids: Arc<Mutex<HashSet<String>>>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut ids = self.ids.lock().unwrap_or_else(|e| e.into_inner());
        ids.remove(&self.importer_id);
    }
}

/// Подготовленный запуск: дескриптор и захват импортера
pub struct PreparedRun {
    pub handle: RunHandle,
    guard: RunGuard,
}

/// Драйвер запусков: вызывает шаги оркестратора до завершения
/// и публикует прогресс в трекер.
pub struct ImportDriver {
    orchestrator: Arc<ImportOrchestrator>,
    tracker: Arc<ProgressTracker>,
    active: ActiveRuns,
    max_idle_steps: u32,
}

impl ImportDriver {
    pub fn new(
        orchestrator: Arc<ImportOrchestrator>,
        tracker: Arc<ProgressTracker>,
        max_idle_steps: u32,
    ) -> Self {
        Self {
            orchestrator,
            tracker,
            active: ActiveRuns::new(),
            max_idle_steps: max_idle_steps.max(1),
        }
    }

    pub fn orchestrator(&self) -> &Arc<ImportOrchestrator> {
        &self.orchestrator
    }

    pub fn tracker(&self) -> &Arc<ProgressTracker> {
        &self.tracker
    }

    pub fn is_running(&self, importer_id: &str) -> bool {
        self.active.is_running(importer_id)
    }

    /// Захватить импортер и начать запуск
    pub async fn begin(&self, importer_id: &str, kind: RunKind) -> Result<PreparedRun, ImportError> {
        // Несуществующий импортер важнее занятости
        self.orchestrator.registry().resolve(importer_id)?;
        let guard = self.active.acquire(importer_id)?;

        let handle = match kind {
            RunKind::Import => self.orchestrator.start_run(importer_id).await?,
            RunKind::Remove => self.orchestrator.start_removal(importer_id).await?,
        };
        self.tracker.create_session(&handle);

        Ok(PreparedRun { handle, guard })
    }

    /// Выполнять шаги до завершения запуска
    pub async fn drive(&self, run: PreparedRun) -> Result<RunSummary, ImportError> {
        let PreparedRun { mut handle, guard } = run;
        let session_id = handle.session_id.clone();

        let result = self.drive_steps(&mut handle).await;
        let result = match result {
            Ok(()) => self.orchestrator.finish_run(handle).await,
            Err(e) => Err(e),
        };
        drop(guard);

        match result {
            Ok(summary) => {
                self.tracker.complete_session(&summary);
                Ok(summary)
            }
            Err(e) => {
                tracing::error!("Run {} failed: {}", session_id, e);
                self.tracker.fail_session(&session_id, e.to_string());
                Err(e)
            }
        }
    }

    /// Запуск целиком в текущей задаче
    pub async fn run_to_completion(
        &self,
        importer_id: &str,
        kind: RunKind,
    ) -> Result<RunSummary, ImportError> {
        let run = self.begin(importer_id, kind).await?;
        self.drive(run).await
    }

    /// Начать запуск и выполнять его в фоне. Возвращает id сессии.
    pub async fn spawn(self: &Arc<Self>, importer_id: &str, kind: RunKind) -> Result<String, ImportError> {
        let run = self.begin(importer_id, kind).await?;
        let session_id = run.handle.session_id.clone();

        let driver = Arc::clone(self);
        tokio::spawn(async move {
            // Ошибка уже записана в трекер
            let _ = driver.drive(run).await;
        });

        Ok(session_id)
    }

    async fn drive_steps(&self, handle: &mut RunHandle) -> Result<(), ImportError> {
        let mut idle_steps = 0;
        loop {
            let before = handle.context.progress();
            let step = self.orchestrator.advance(handle).await?;
            handle.context = step.context;
            self.tracker
                .update_step(&handle.session_id, &handle.context, step.fraction_complete);

            if step.done {
                return Ok(());
            }

            if handle.context.progress() == before {
                idle_steps += 1;
                if idle_steps >= self.max_idle_steps {
                    return Err(ImportError::Stalled {
                        importer_id: handle.importer_id.clone(),
                        steps: idle_steps,
                        progress: handle.context.progress(),
                        total: handle.context.total(),
                    });
                }
            } else {
                idle_steps = 0;
            }

            // Точка приостановки между шагами
            tokio::task::yield_now().await;
        }
    }
}
