use anyhow::Result;
use async_trait::async_trait;
use contracts::usecases::u601_bacon_ipsum::content::ContentItem;
use std::sync::RwLock;
use uuid::Uuid;

/// Хранилище контента, в которое импортер сохраняет элементы
#[async_trait]
pub trait ContentSink: Send + Sync {
    async fn save(&self, item: ContentItem) -> Result<Uuid>;

    async fn count(&self, bundle: &str) -> Result<u64>;

    /// Первые `limit` элементов указанного типа
    async fn list(&self, bundle: &str, limit: usize) -> Result<Vec<ContentItem>>;

    /// Удалить элемент; `false`, если элемента нет
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// In-memory хранилище контента
#[derive(Default)]
pub struct MemoryContentStore {
    items: RwLock<Vec<ContentItem>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentSink for MemoryContentStore {
    async fn save(&self, item: ContentItem) -> Result<Uuid> {
        let id = item.id;
        self.items
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(item);
        Ok(id)
    }

    async fn count(&self, bundle: &str) -> Result<u64> {
        let items = self.items.read().unwrap_or_else(|e| e.into_inner());
        Ok(items.iter().filter(|i| i.bundle == bundle).count() as u64)
    }

    async fn list(&self, bundle: &str, limit: usize) -> Result<Vec<ContentItem>> {
        let items = self.items.read().unwrap_or_else(|e| e.into_inner());
        Ok(items
            .iter()
            .filter(|i| i.bundle == bundle)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        let before = items.len();
        items.retain(|i| i.id != id);
        Ok(items.len() != before)
    }
}
