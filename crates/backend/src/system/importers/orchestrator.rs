use chrono::Utc;
use contracts::system::importers::{
    BatchStatus, RunContext, RunHandle, RunKind, RunSummary, StepResult,
};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use super::decoder::DecoderRegistry;
use super::error::ImportError;
use super::importer::Importer;
use super::registry::ImporterRegistry;
use super::scheduling::SchedulingGate;

/// Ключ результата `pre_batch` в служебных данных контекста
pub const PRE_BATCH_KEY: &str = "pre_batch";

/// Оркестратор пошагового импорта.
///
/// Не хранит состояние запусков: все, что нужно для следующего шага,
/// находится в `RunContext`, который передает вызывающая сторона.
pub struct ImportOrchestrator {
    registry: Arc<ImporterRegistry>,
    decoders: Arc<DecoderRegistry>,
    gate: Arc<SchedulingGate>,
}

impl ImportOrchestrator {
    pub fn new(
        registry: Arc<ImporterRegistry>,
        decoders: Arc<DecoderRegistry>,
        gate: Arc<SchedulingGate>,
    ) -> Self {
        Self {
            registry,
            decoders,
            gate,
        }
    }

    pub fn registry(&self) -> &Arc<ImporterRegistry> {
        &self.registry
    }

    pub fn gate(&self) -> &Arc<SchedulingGate> {
        &self.gate
    }

    /// Начать запуск импорта: новый контекст и необязательный хук `pre_batch`
    pub async fn start_run(&self, importer_id: &str) -> Result<RunHandle, ImportError> {
        let importer = self.registry.resolve(importer_id)?;
        let mut context = RunContext::new();

        let prepared = importer
            .pre_batch(&context)
            .await
            .map_err(|source| ImportError::Hook {
                importer_id: importer_id.to_string(),
                hook: "pre_batch",
                source,
            })?;
        if let Some(value) = prepared {
            context.extra.insert(PRE_BATCH_KEY.to_string(), value);
        }

        let handle = new_handle(importer_id, RunKind::Import, context);
        tracing::info!(
            "Import run started: importer={}, session={}",
            importer_id,
            handle.session_id
        );
        Ok(handle)
    }

    /// Начать запуск удаления ранее импортированных элементов
    pub async fn start_removal(&self, importer_id: &str) -> Result<RunHandle, ImportError> {
        self.registry.resolve(importer_id)?;
        let handle = new_handle(importer_id, RunKind::Remove, RunContext::new());
        tracing::info!(
            "Removal run started: importer={}, session={}",
            importer_id,
            handle.session_id
        );
        Ok(handle)
    }

    /// Выполнить следующий шаг запуска в зависимости от его типа
    pub async fn advance(&self, handle: &RunHandle) -> Result<StepResult, ImportError> {
        match handle.kind {
            RunKind::Import => self.run_step(&handle.importer_id, &handle.context).await,
            RunKind::Remove => self.removal_step(&handle.importer_id, &handle.context).await,
        }
    }

    /// Один шаг импорта: fetch -> decode -> apply -> новый контекст.
    /// Для уже завершенного контекста fetch не вызывается.
    ///
    /// При ошибке новый контекст не создается; вызывающая сторона может
    /// повторить шаг с тем же контекстом.
    pub async fn run_step(
        &self,
        importer_id: &str,
        context: &RunContext,
    ) -> Result<StepResult, ImportError> {
        let importer = self.registry.resolve(importer_id)?;

        // Завершенный запуск: источник больше не запрашивается
        if let Some(status) = context.restore_batch_status().filter(|s| s.is_complete()) {
            let previous = status.progress();
            return self.finish_step(importer_id, context, previous, status);
        }

        let raw = importer
            .fetch_step(context)
            .await
            .map_err(|source| ImportError::Fetch {
                importer_id: importer_id.to_string(),
                source,
            })?;
        let data = self.deserialize(importer.as_ref(), raw)?;

        let mut status = match context.restore_batch_status() {
            Some(status) => status,
            None => BatchStatus::initial(importer.size(&data)),
        };
        let previous = status.progress();

        if !status.is_complete() {
            importer
                .apply(data, &mut status)
                .await
                .map_err(|source| ImportError::Apply {
                    importer_id: importer_id.to_string(),
                    source,
                })?;
        }

        self.finish_step(importer_id, context, previous, status)
    }

    /// Один шаг удаления: remove_query -> remove_batch -> новый контекст
    pub async fn removal_step(
        &self,
        importer_id: &str,
        context: &RunContext,
    ) -> Result<StepResult, ImportError> {
        let importer = self.registry.resolve(importer_id)?;

        let mut status = match context.restore_batch_status() {
            Some(status) => status,
            None => {
                let total = importer
                    .remove_total()
                    .await
                    .map_err(|source| ImportError::Fetch {
                        importer_id: importer_id.to_string(),
                        source,
                    })?;
                BatchStatus::initial(total)
            }
        };
        let previous = status.progress();

        if !status.is_complete() {
            let items = importer
                .remove_query(&status)
                .await
                .map_err(|source| ImportError::Fetch {
                    importer_id: importer_id.to_string(),
                    source,
                })?;
            importer
                .remove_batch(items, &mut status)
                .await
                .map_err(|source| ImportError::Apply {
                    importer_id: importer_id.to_string(),
                    source,
                })?;
        }

        self.finish_step(importer_id, context, previous, status)
    }

    /// Завершить запуск: хук `post_batch`, отметка времени запуска, итоговые результаты
    pub async fn finish_run(&self, handle: RunHandle) -> Result<RunSummary, ImportError> {
        let importer = self.registry.resolve(&handle.importer_id)?;

        if handle.kind == RunKind::Import {
            importer
                .post_batch(&handle.context)
                .await
                .map_err(|source| ImportError::Hook {
                    importer_id: handle.importer_id.clone(),
                    hook: "post_batch",
                    source,
                })?;
        }

        let finished_at = Utc::now();
        if handle.kind == RunKind::Import {
            self.gate
                .mark_run(&handle.importer_id, finished_at.timestamp())
                .await?;
        }

        let RunHandle {
            session_id,
            importer_id,
            kind,
            context,
            ..
        } = handle;

        tracing::info!(
            "{} run finished: importer={}, session={}, processed={}/{}",
            kind.as_str(),
            importer_id,
            session_id,
            context.progress(),
            context.total()
        );

        Ok(RunSummary {
            session_id,
            importer_id,
            kind,
            processed: context.progress(),
            total: context.total(),
            results: context.results,
            finished_at,
        })
    }

    fn deserialize(&self, importer: &dyn Importer, raw: Value) -> Result<Value, ImportError> {
        let Some(format) = importer.definition().format.as_deref() else {
            return Ok(raw);
        };

        match importer.deserialize(format, &raw) {
            Some(result) => result.map_err(|e| ImportError::Decode {
                format: format.to_string(),
                message: e.to_string(),
            }),
            None => self.decoders.decode(raw, format),
        }
    }

    fn finish_step(
        &self,
        importer_id: &str,
        context: &RunContext,
        previous: u64,
        status: BatchStatus,
    ) -> Result<StepResult, ImportError> {
        if status.progress() < previous || status.progress() > status.total() {
            return Err(ImportError::InvalidProgress {
                importer_id: importer_id.to_string(),
                previous,
                progress: status.progress(),
                total: status.total(),
            });
        }

        let next = context.with_batch_status(status);
        let fraction_complete = next.fraction_complete();
        let done = next.is_done();

        tracing::debug!(
            "Step finished: importer={}, progress={}/{}, fraction={:.3}, done={}",
            importer_id,
            next.progress(),
            next.total(),
            fraction_complete,
            done
        );

        Ok(StepResult {
            context: next,
            fraction_complete,
            done,
        })
    }
}

fn new_handle(importer_id: &str, kind: RunKind, context: RunContext) -> RunHandle {
    RunHandle {
        session_id: Uuid::new_v4().to_string(),
        importer_id: importer_id.to_string(),
        kind,
        started_at: Utc::now(),
        context,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::importers::store::{KeyValueStore, MemoryKeyValueStore};
    use crate::system::importers::testing::ListImporter;
    use contracts::system::importers::Sandbox;
    use serde_json::json;

    struct Fixture {
        orchestrator: ImportOrchestrator,
        store: Arc<MemoryKeyValueStore>,
        importer: Arc<ListImporter>,
    }

    fn fixture_with(importer: ListImporter, decoders: DecoderRegistry) -> Fixture {
        let importer = Arc::new(importer);
        let mut registry = ImporterRegistry::new();
        registry.register_arc(importer.clone());
        let store = Arc::new(MemoryKeyValueStore::new());
        let gate = Arc::new(SchedulingGate::new(store.clone()));
        Fixture {
            orchestrator: ImportOrchestrator::new(
                Arc::new(registry),
                Arc::new(decoders),
                gate,
            ),
            store,
            importer,
        }
    }

    fn fixture(importer: ListImporter) -> Fixture {
        fixture_with(importer, DecoderRegistry::with_defaults())
    }

    #[tokio::test]
    async fn test_three_items_one_per_step() {
        let f = fixture(ListImporter::new("abc", &["a", "b", "c"]));
        let handle = f.orchestrator.start_run("abc").await.unwrap();

        let mut context = handle.context.clone();
        let mut fractions = Vec::new();
        let mut steps = 0;
        loop {
            let step = f.orchestrator.run_step("abc", &context).await.unwrap();
            steps += 1;
            fractions.push(step.fraction_complete);
            context = step.context;
            if step.done {
                break;
            }
        }

        assert_eq!(steps, 3);
        assert_eq!(context.progress(), 3);
        assert_eq!(context.total(), 3);
        assert_eq!(context.results, vec![json!("a"), json!("b"), json!("c")]);
        assert_eq!(context.message.as_deref(), Some("Imported c"));
        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
        assert!(fractions.iter().all(|f| (0.0..=1.0).contains(f)));
        assert_eq!(fractions.last(), Some(&1.0));
    }

    #[tokio::test]
    async fn test_empty_source_is_done_on_first_step() {
        let f = fixture(ListImporter::new("empty", &[]));
        let step = f
            .orchestrator
            .run_step("empty", &RunContext::new())
            .await
            .unwrap();
        assert!(step.done);
        assert_eq!(step.fraction_complete, 1.0);
        assert_eq!(step.context.total(), 0);
    }

    #[tokio::test]
    async fn test_resume_from_persisted_context() {
        let f = fixture(ListImporter::new("abc", &["a", "b", "c"]));
        let persisted = RunContext {
            sandbox: Some(Sandbox {
                progress: 2,
                total: 3,
                current: Some(json!(1)),
            }),
            results: vec![json!("a"), json!("b")],
            ..RunContext::default()
        };

        let step = f.orchestrator.run_step("abc", &persisted).await.unwrap();
        assert!(step.done);
        assert_eq!(step.context.results, vec![json!("a"), json!("b"), json!("c")]);
        assert_eq!(f.importer.cursors(), vec![Some(json!(1))]);
        assert_eq!(f.importer.stored_items(), vec!["c"]);
    }

    #[tokio::test]
    async fn test_completed_context_does_not_fetch() {
        let f = fixture(ListImporter::new("abc", &["a", "b"]));
        let completed = RunContext {
            sandbox: Some(Sandbox {
                progress: 2,
                total: 2,
                current: Some(json!(1)),
            }),
            results: vec![json!("a"), json!("b")],
            ..RunContext::default()
        };

        let step = f.orchestrator.run_step("abc", &completed).await.unwrap();
        assert!(step.done);
        assert_eq!(step.fraction_complete, 1.0);
        assert_eq!(step.context.results, completed.results);
        assert!(f.importer.cursors().is_empty());
        assert!(f.importer.stored_items().is_empty());
    }

    #[tokio::test]
    async fn test_missing_importer_never_starts() {
        let f = fixture(ListImporter::new("abc", &["a"]));
        let err = f.orchestrator.start_run("missing").await.unwrap_err();
        assert!(matches!(err, ImportError::ImporterNotFound(ref id) if id == "missing"));

        let err = f
            .orchestrator
            .run_step("missing", &RunContext::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_previous_context() {
        let f = fixture(ListImporter::new("abc", &["a", "b"]).fail_fetch_on_call(2));
        let first = f
            .orchestrator
            .run_step("abc", &RunContext::new())
            .await
            .unwrap();

        let err = f
            .orchestrator
            .run_step("abc", &first.context)
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::Fetch { .. }));
        assert!(err.to_string().contains("remote returned 503"));

        // Повтор того же шага с тем же контекстом
        let retried = f
            .orchestrator
            .run_step("abc", &first.context)
            .await
            .unwrap();
        assert!(retried.done);
        assert_eq!(retried.context.results, vec![json!("a"), json!("b")]);
    }

    #[tokio::test]
    async fn test_apply_failure_is_surfaced() {
        let f = fixture(ListImporter::new("abc", &["a", "b", "c"]).page_size(3).fail_apply_at_item(1));
        let err = f
            .orchestrator
            .run_step("abc", &RunContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::Apply { ref importer_id, .. } if importer_id == "abc"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[tokio::test]
    async fn test_progress_overrun_is_rejected() {
        let f = fixture(ListImporter::new("abc", &["a"]).overrun());
        let err = f
            .orchestrator
            .run_step("abc", &RunContext::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ImportError::InvalidProgress { progress: 2, total: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_declared_format_is_decoded() {
        let f = fixture(ListImporter::new("abc", &["a", "b"]).page_size(2).with_format("json"));
        let step = f
            .orchestrator
            .run_step("abc", &RunContext::new())
            .await
            .unwrap();
        assert!(step.done);
        assert_eq!(step.context.total(), 2);
    }

    #[tokio::test]
    async fn test_unsupported_format_passes_raw_payload() {
        // Без декодера importer получает строку и не находит в ней элементов
        let f = fixture_with(
            ListImporter::new("abc", &["a"]).with_format("json"),
            DecoderRegistry::new(),
        );
        let step = f
            .orchestrator
            .run_step("abc", &RunContext::new())
            .await
            .unwrap();
        assert_eq!(step.context.total(), 0);
        assert!(step.done);
    }

    #[tokio::test]
    async fn test_start_and_finish_hooks() {
        let f = fixture(ListImporter::new("abc", &["a"]));
        let mut handle = f.orchestrator.start_run("abc").await.unwrap();
        assert_eq!(handle.kind, RunKind::Import);
        assert_eq!(
            handle.context.extra.get(PRE_BATCH_KEY),
            Some(&json!({"prepared_for": "abc"}))
        );

        let step = f.orchestrator.advance(&handle).await.unwrap();
        handle.context = step.context;
        assert!(step.done);

        let summary = f.orchestrator.finish_run(handle).await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.results, vec![json!("a")]);
        assert_eq!(f.importer.post_batch_calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        let last_run = f.store.get("abc.last_run", 0).await.unwrap();
        assert_eq!(last_run, summary.finished_at.timestamp());
    }

    #[tokio::test]
    async fn test_removal_run() {
        let f = fixture(ListImporter::new("abc", &["a", "b", "c"]).page_size(2));
        let mut context = RunContext::new();
        loop {
            let step = f.orchestrator.run_step("abc", &context).await.unwrap();
            context = step.context;
            if step.done {
                break;
            }
        }
        assert_eq!(f.importer.stored_items().len(), 3);

        let mut handle = f.orchestrator.start_removal("abc").await.unwrap();
        assert_eq!(handle.kind, RunKind::Remove);
        let mut steps = 0;
        loop {
            let step = f.orchestrator.advance(&handle).await.unwrap();
            handle.context = step.context;
            steps += 1;
            if step.done {
                break;
            }
        }
        assert_eq!(steps, 2);
        assert!(f.importer.stored_items().is_empty());

        let summary = f.orchestrator.finish_run(handle).await.unwrap();
        assert_eq!(summary.kind, RunKind::Remove);
        assert_eq!(summary.processed, 3);
        // Удаление не меняет время последнего импорта
        assert_eq!(f.store.get("abc.last_run", 0).await.unwrap(), 0);
    }
}
