use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::batch_status::{fraction, BatchStatus};

/// Тип запуска: импорт или удаление ранее импортированных элементов
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    #[default]
    Import,
    Remove,
}

impl RunKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::Import => "import",
            RunKind::Remove => "remove",
        }
    }
}

/// Сохраненные между шагами поля статуса батча
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sandbox {
    pub progress: u64,
    pub total: u64,
    pub current: Option<Value>,
}

/// Контекст одного запуска импортера.
///
/// Единственный источник состояния между шагами. Оркестратор не изменяет
/// переданный контекст: каждый шаг возвращает новый, а вызывающая сторона
/// сохраняет его и передает в следующий шаг.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunContext {
    /// `None` до первого успешного шага
    #[serde(default)]
    pub sandbox: Option<Sandbox>,

    #[serde(default)]
    pub results: Vec<Value>,

    #[serde(default)]
    pub message: Option<String>,

    /// Служебные данные оркестрации (например, результат pre_batch)
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_first_step(&self) -> bool {
        self.sandbox.is_none()
    }

    /// Курсор последнего обработанного элемента
    pub fn cursor(&self) -> Option<&Value> {
        self.sandbox.as_ref().and_then(|s| s.current.as_ref())
    }

    pub fn progress(&self) -> u64 {
        self.sandbox.as_ref().map(|s| s.progress).unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.sandbox.as_ref().map(|s| s.total).unwrap_or(0)
    }

    pub fn fraction_complete(&self) -> f64 {
        match &self.sandbox {
            Some(s) => fraction(s.progress, s.total),
            None => 0.0,
        }
    }

    pub fn is_done(&self) -> bool {
        self.sandbox
            .as_ref()
            .map(|s| s.progress >= s.total)
            .unwrap_or(false)
    }

    /// Восстановить статус батча из сохраненного контекста
    pub fn restore_batch_status(&self) -> Option<BatchStatus> {
        self.sandbox.as_ref().map(|s| {
            let mut status =
                BatchStatus::new(s.progress, s.current.clone(), s.total, self.results.clone());
            status.restore_message(self.message.clone());
            status
        })
    }

    /// Новый контекст с полями статуса батча; служебные данные переносятся.
    pub fn with_batch_status(&self, status: BatchStatus) -> RunContext {
        let (progress, total, current, results, message) = status.into_parts();
        RunContext {
            sandbox: Some(Sandbox {
                progress,
                total,
                current,
            }),
            results,
            message,
            extra: self.extra.clone(),
        }
    }
}

/// Результат одного шага
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub context: RunContext,
    pub fraction_complete: f64,
    pub done: bool,
}

/// Дескриптор запуска, которым управляет внешний драйвер шаг за шагом
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunHandle {
    pub session_id: String,
    pub importer_id: String,
    pub kind: RunKind,
    pub started_at: DateTime<Utc>,
    pub context: RunContext,
}

/// Итог завершенного запуска
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub session_id: String,
    pub importer_id: String,
    pub kind: RunKind,
    pub processed: u64,
    pub total: u64,
    pub results: Vec<Value>,
    pub finished_at: DateTime<Utc>,
}
