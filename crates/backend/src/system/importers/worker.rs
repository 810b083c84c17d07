use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};

use super::queue::ImportQueue;
use super::registry::ImporterRegistry;
use super::scheduling::SchedulingGate;

/// Фоновый планировщик: периодически ставит в очередь импортеры,
/// которые пора запускать.
pub struct ImportScheduler {
    registry: Arc<ImporterRegistry>,
    gate: Arc<SchedulingGate>,
    queue: ImportQueue,
    interval_seconds: u64,
}

impl ImportScheduler {
    pub fn new(
        registry: Arc<ImporterRegistry>,
        gate: Arc<SchedulingGate>,
        queue: ImportQueue,
        interval_seconds: u64,
    ) -> Self {
        Self {
            registry,
            gate,
            queue,
            interval_seconds,
        }
    }

    /// Запускает цикл обхода.
    pub async fn run_loop(&self) {
        info!(
            "Import scheduler started with interval {} seconds",
            self.interval_seconds
        );
        let mut interval = time::interval(time::Duration::from_secs(self.interval_seconds.max(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            if let Err(e) = self.sweep(Utc::now().timestamp()).await {
                error!("Error while sweeping importers: {:?}", e);
            }
        }
    }

    /// Один обход: захватывает импортеры, которые пора запускать, и ставит их в очередь.
    /// Если очередь недоступна, отметки снимаются со всех не поставленных импортеров.
    pub async fn sweep(&self, now: i64) -> Result<Vec<String>> {
        let claimed = self.gate.claim_due(&self.registry, now).await?;

        for (index, importer_id) in claimed.iter().enumerate() {
            info!("Importer '{}' is due, queueing", importer_id);
            if let Err(e) = self.queue.enqueue(importer_id) {
                warn!("Failed to queue importer '{}': {}", importer_id, e);
                // Снимаем отметки, чтобы следующий обход попробовал снова
                for pending in &claimed[index..] {
                    self.gate.clear_queued(pending).await?;
                }
                return Err(e);
            }
        }

        Ok(claimed)
    }
}
