use anyhow::Result;
use async_trait::async_trait;
use contracts::system::importers::{
    BatchStatus, ImporterConfiguration, ImporterDefinition, RunContext,
};
use serde_json::Value;

/// Контракт импортера.
///
/// Импортер получает порцию сырых данных (`fetch`) и применяет ее (`apply`),
/// обновляя статус батча. Оркестратор зависит только от этого трейта.
/// Все необязательные возможности имеют реализации по умолчанию.
#[async_trait]
pub trait Importer: Send + Sync {
    /// Описание импортера (id, формат, расписание)
    fn definition(&self) -> &ImporterDefinition;

    fn id(&self) -> &str {
        &self.definition().id
    }

    /// Конфигурация экземпляра
    fn configuration(&self) -> ImporterConfiguration {
        ImporterConfiguration::new()
    }

    /// Получить следующую порцию данных.
    /// `cursor`: маркер последнего обработанного элемента (`None` на первом шаге).
    async fn fetch(&self, cursor: Option<&Value>) -> Result<Value>;

    /// Получить данные для шага по контексту запуска.
    /// По умолчанию `fetch` с курсором контекста; импортеры без постраничной
    /// выдачи могут отдавать данные, сохраненные в контексте хуком `pre_batch`.
    async fn fetch_step(&self, context: &RunContext) -> Result<Value> {
        self.fetch(context.cursor()).await
    }

    /// Общее количество элементов для запуска, вычисляется по данным первого шага
    fn size(&self, data: &Value) -> u64;

    /// Обработать порцию данных.
    /// На каждый элемент: `set_current`, `add_result`, `increment_progress`.
    async fn apply(&self, data: Value, status: &mut BatchStatus) -> Result<()>;

    /// Вызывается перед первым шагом. Возвращенное значение сохраняется в контексте.
    async fn pre_batch(&self, _context: &RunContext) -> Result<Option<Value>> {
        Ok(None)
    }

    /// Вызывается после последнего шага
    async fn post_batch(&self, _context: &RunContext) -> Result<()> {
        Ok(())
    }

    /// Собственная десериализация данных.
    /// `None` означает, что используется общий реестр декодеров.
    fn deserialize(&self, _format: &str, _data: &Value) -> Option<Result<Value>> {
        None
    }

    /// Количество элементов для удаления
    async fn remove_total(&self) -> Result<u64> {
        Ok(0)
    }

    /// Выбрать очередную порцию элементов для удаления
    async fn remove_query(&self, _status: &BatchStatus) -> Result<Vec<Value>> {
        Ok(Vec::new())
    }

    /// Удалить выбранные элементы, обновляя статус так же, как в `apply`
    async fn remove_batch(&self, _items: Vec<Value>, _status: &mut BatchStatus) -> Result<()> {
        Ok(())
    }
}
