use super::error::ImportError;
use super::importer::Importer;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Реестр импортеров.
/// Заполняется явно при старте приложения; импортеры ищутся по id.
pub struct ImporterRegistry {
    importers: BTreeMap<String, Arc<dyn Importer>>,
}

impl ImporterRegistry {
    pub fn new() -> Self {
        Self {
            importers: BTreeMap::new(),
        }
    }

    /// Регистрирует импортер. Импортер с тем же id заменяется.
    pub fn register<T: Importer + 'static>(&mut self, importer: T) {
        self.register_arc(Arc::new(importer));
    }

    pub fn register_arc(&mut self, importer: Arc<dyn Importer>) {
        let id = importer.id().to_string();
        if self.importers.insert(id.clone(), importer).is_some() {
            tracing::warn!("Importer '{}' registered twice, previous instance replaced", id);
        }
    }

    pub fn get(&self, importer_id: &str) -> Option<Arc<dyn Importer>> {
        self.importers.get(importer_id).cloned()
    }

    /// Возвращает импортер по id или `ImporterNotFound`.
    pub fn resolve(&self, importer_id: &str) -> Result<Arc<dyn Importer>, ImportError> {
        self.get(importer_id)
            .ok_or_else(|| ImportError::ImporterNotFound(importer_id.to_string()))
    }

    /// Все импортеры в порядке id
    pub fn list_all(&self) -> Vec<Arc<dyn Importer>> {
        self.importers.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.importers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.importers.is_empty()
    }
}

impl Default for ImporterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
