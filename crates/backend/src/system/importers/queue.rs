use contracts::system::importers::{RunKind, RunSummary};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::driver::ImportDriver;
use super::error::ImportError;
use super::scheduling::SchedulingGate;

/// Очередь импортеров к выполнению (отправляющая сторона)
#[derive(Clone)]
pub struct ImportQueue {
    sender: mpsc::UnboundedSender<String>,
}

impl ImportQueue {
    /// Создать очередь и ее получателя
    pub fn channel() -> (ImportQueue, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (ImportQueue { sender }, receiver)
    }

    pub fn enqueue(&self, importer_id: &str) -> anyhow::Result<()> {
        self.sender
            .send(importer_id.to_string())
            .map_err(|_| anyhow::anyhow!("Import queue is closed"))
    }
}

/// Обработчик очереди: снимает отметку о постановке в очередь и выполняет импорт
pub struct ImportQueueWorker {
    receiver: mpsc::UnboundedReceiver<String>,
    gate: Arc<SchedulingGate>,
    driver: Arc<ImportDriver>,
}

impl ImportQueueWorker {
    pub fn new(
        receiver: mpsc::UnboundedReceiver<String>,
        gate: Arc<SchedulingGate>,
        driver: Arc<ImportDriver>,
    ) -> Self {
        Self {
            receiver,
            gate,
            driver,
        }
    }

    /// Обрабатывать элементы очереди, пока она не закрыта
    pub async fn run_loop(mut self) {
        info!("Import queue worker started");
        while let Some(importer_id) = self.receiver.recv().await {
            let _ = self.process_item(&importer_id).await;
        }
        info!("Import queue closed, worker stopped");
    }

    /// Выполнить один элемент очереди
    pub async fn process_item(&self, importer_id: &str) -> Result<RunSummary, ImportError> {
        // Queued -> Running
        self.gate.clear_queued(importer_id).await?;

        match self.driver.run_to_completion(importer_id, RunKind::Import).await {
            Ok(summary) => {
                info!(
                    "Queued import '{}' completed: {} of {} items",
                    importer_id, summary.processed, summary.total
                );
                Ok(summary)
            }
            Err(ImportError::AlreadyRunning(id)) => {
                warn!("Importer '{}' is already running, queued run skipped", id);
                Err(ImportError::AlreadyRunning(id))
            }
            Err(e) => {
                error!("Queued import '{}' failed: {}", importer_id, e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::importers::decoder::DecoderRegistry;
    use crate::system::importers::orchestrator::ImportOrchestrator;
    use crate::system::importers::progress_tracker::ProgressTracker;
    use crate::system::importers::registry::ImporterRegistry;
    use crate::system::importers::store::MemoryKeyValueStore;
    use crate::system::importers::testing::ListImporter;

    #[tokio::test]
    async fn test_worker_clears_marker_and_stamps_run() {
        let mut registry = ImporterRegistry::new();
        registry.register(ListImporter::new("abc", &["a", "b"]));
        let gate = Arc::new(SchedulingGate::new(Arc::new(MemoryKeyValueStore::new())));
        let orchestrator = Arc::new(ImportOrchestrator::new(
            Arc::new(registry),
            Arc::new(DecoderRegistry::with_defaults()),
            Arc::clone(&gate),
        ));
        let driver = Arc::new(ImportDriver::new(
            orchestrator,
            Arc::new(ProgressTracker::new()),
            3,
        ));

        let (queue, receiver) = ImportQueue::channel();
        let worker = ImportQueueWorker::new(receiver, Arc::clone(&gate), driver);

        gate.mark_queued("abc", 100).await.unwrap();
        queue.enqueue("abc").unwrap();
        drop(queue);
        worker.run_loop().await;

        assert_eq!(gate.queued_at("abc").await.unwrap(), 0);
        assert!(gate.last_run_at("abc").await.unwrap() > 0);
    }

    #[tokio::test]
    async fn test_enqueue_fails_when_closed() {
        let (queue, receiver) = ImportQueue::channel();
        drop(receiver);
        assert!(queue.enqueue("abc").is_err());
    }
}
