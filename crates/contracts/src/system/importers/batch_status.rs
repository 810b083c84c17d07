use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Текущее состояние батча импорта.
///
/// Импортер обновляет статус по мере обработки элементов: на каждый элемент
/// выставляется `current`, добавляется один результат и `progress`
/// увеличивается ровно на единицу. Проверка границ здесь не выполняется,
/// за это отвечает оркестратор.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStatus {
    progress: u64,
    total: u64,
    current: Option<Value>,
    results: Vec<Value>,
    message: Option<String>,
}

impl BatchStatus {
    pub fn new(progress: u64, current: Option<Value>, total: u64, results: Vec<Value>) -> Self {
        Self {
            progress,
            total,
            current,
            results,
            message: None,
        }
    }

    /// Статус первого шага: ничего не обработано
    pub fn initial(total: u64) -> Self {
        Self::new(0, None, total, Vec::new())
    }

    pub fn set_current(&mut self, current: impl Into<Value>) -> &mut Self {
        self.current = Some(current.into());
        self
    }

    pub fn add_result(&mut self, result: impl Into<Value>) -> &mut Self {
        self.results.push(result.into());
        self
    }

    pub fn set_message(&mut self, message: impl Into<String>) -> &mut Self {
        self.message = Some(message.into());
        self
    }

    pub(crate) fn restore_message(&mut self, message: Option<String>) {
        self.message = message;
    }

    pub fn increment_progress(&mut self) -> &mut Self {
        self.progress += 1;
        self
    }

    pub fn progress(&self) -> u64 {
        self.progress
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn current(&self) -> Option<&Value> {
        self.current.as_ref()
    }

    pub fn results(&self) -> &[Value] {
        &self.results
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= self.total
    }

    /// Доля выполнения в диапазоне [0, 1]; пустой батч считается завершенным.
    pub fn fraction_complete(&self) -> f64 {
        fraction(self.progress, self.total)
    }

    pub(crate) fn into_parts(self) -> (u64, u64, Option<Value>, Vec<Value>, Option<String>) {
        (
            self.progress,
            self.total,
            self.current,
            self.results,
            self.message,
        )
    }
}

pub(crate) fn fraction(progress: u64, total: u64) -> f64 {
    if total == 0 {
        return 1.0;
    }
    (progress as f64 / total as f64).clamp(0.0, 1.0)
}
