use anyhow::{anyhow, Result};
use async_trait::async_trait;
use contracts::system::importers::{
    BatchStatus, ImporterConfiguration, ImporterDefinition, RunContext,
};
use contracts::usecases::u601_bacon_ipsum::content::ContentItem;
use contracts::usecases::u601_bacon_ipsum::request::BaconIpsumSettings;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::bacon_ipsum_client::BaconIpsumClient;
use super::content_store::ContentSink;
use crate::system::importers::orchestrator::PRE_BATCH_KEY;
use crate::system::importers::Importer;

pub const IMPORTER_ID: &str = "u601_bacon_ipsum";

/// Тип создаваемого контента
pub const BUNDLE: &str = "bacon_ipsum";

/// Пример импортера: абзацы с baconipsum.com становятся элементами контента.
///
/// Источник не поддерживает постраничную выдачу и каждый раз отдает новые абзацы.
/// Набор запрашивается один раз в `pre_batch` и хранится в контексте запуска,
/// шаги обрабатывают из него следующие `batch_size` абзацев.
pub struct BaconIpsumImporter {
    definition: ImporterDefinition,
    settings: BaconIpsumSettings,
    client: BaconIpsumClient,
    sink: Arc<dyn ContentSink>,
}

impl BaconIpsumImporter {
    pub fn new(
        settings: BaconIpsumSettings,
        cron_minutes: Option<u32>,
        sink: Arc<dyn ContentSink>,
    ) -> Result<Self> {
        let mut definition = ImporterDefinition::new(IMPORTER_ID, "Bacon ipsum")
            .with_category("Import API examples")
            .with_format("json");
        if let Some(minutes) = cron_minutes {
            definition = definition.with_cron_minutes(minutes);
        }

        Ok(Self {
            client: BaconIpsumClient::new(settings.endpoint.clone())?,
            definition,
            settings,
            sink,
        })
    }

    /// Создать импортер из таблицы настроек конфигурации
    pub fn from_settings(
        settings: &ImporterConfiguration,
        cron_minutes: Option<u32>,
        sink: Arc<dyn ContentSink>,
    ) -> Result<Self> {
        let settings: BaconIpsumSettings =
            serde_json::from_value(Value::Object(settings.clone()))
                .map_err(|e| anyhow!("Invalid settings for {}: {}", IMPORTER_ID, e))?;
        Self::new(settings, cron_minutes, sink)
    }

    pub fn settings(&self) -> &BaconIpsumSettings {
        &self.settings
    }
}

/// Заголовок из первых `words` слов абзаца
pub fn make_title(paragraph: &str, words: usize) -> String {
    paragraph
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|w| !w.is_empty())
        .take(words.max(1))
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['.', '!', '?'])
        .to_string()
}

#[async_trait]
impl Importer for BaconIpsumImporter {
    fn definition(&self) -> &ImporterDefinition {
        &self.definition
    }

    fn configuration(&self) -> ImporterConfiguration {
        serde_json::to_value(&self.settings)
            .ok()
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default()
    }

    async fn fetch(&self, _cursor: Option<&Value>) -> Result<Value> {
        let body = self
            .client
            .fetch_paragraphs(&self.settings.text_type, self.settings.paragraphs)
            .await?;
        Ok(Value::String(body))
    }

    async fn fetch_step(&self, context: &RunContext) -> Result<Value> {
        match context.extra.get(PRE_BATCH_KEY) {
            Some(data) => Ok(data.clone()),
            None => self.fetch(context.cursor()).await,
        }
    }

    async fn pre_batch(&self, _context: &RunContext) -> Result<Option<Value>> {
        self.fetch(None).await.map(Some)
    }

    fn size(&self, data: &Value) -> u64 {
        data.as_array().map(|a| a.len() as u64).unwrap_or(0)
    }

    async fn apply(&self, data: Value, status: &mut BatchStatus) -> Result<()> {
        let paragraphs = data
            .as_array()
            .ok_or_else(|| anyhow!("Unexpected payload: expected an array of paragraphs"))?;

        let start = status.progress() as usize;
        let end = (start + self.settings.batch_size.max(1) as usize)
            .min(paragraphs.len())
            .min(status.total() as usize);

        for (index, paragraph) in paragraphs.iter().enumerate().take(end).skip(start) {
            let body = paragraph
                .as_str()
                .ok_or_else(|| anyhow!("Paragraph {} is not a string", index))?;
            let title = make_title(body, self.settings.title_words);

            let id = self
                .sink
                .save(ContentItem::new(BUNDLE, title.clone(), body))
                .await?;
            tracing::debug!("Created {} content item {}: {}", BUNDLE, id, title);

            status
                .set_current(index)
                .add_result(json!({ "id": id, "title": title }))
                .set_message(format!("Imported \"{}\"", title))
                .increment_progress();
        }

        Ok(())
    }

    async fn remove_total(&self) -> Result<u64> {
        self.sink.count(BUNDLE).await
    }

    async fn remove_query(&self, _status: &BatchStatus) -> Result<Vec<Value>> {
        let items = self
            .sink
            .list(BUNDLE, self.settings.remove_batch_size.max(1) as usize)
            .await?;
        Ok(items
            .into_iter()
            .map(|item| json!({ "id": item.id, "title": item.title }))
            .collect())
    }

    async fn remove_batch(&self, items: Vec<Value>, status: &mut BatchStatus) -> Result<()> {
        for item in items {
            let id = item["id"]
                .as_str()
                .and_then(|s| Uuid::parse_str(s).ok())
                .ok_or_else(|| anyhow!("Content item without a valid id: {}", item))?;

            if !self.sink.delete(id).await? {
                tracing::warn!("Content item {} already removed", id);
            }

            status
                .set_current(id.to_string())
                .add_result(json!({ "removed": id }))
                .set_message(format!("Removed \"{}\"", item["title"].as_str().unwrap_or_default()))
                .increment_progress();
        }
        Ok(())
    }
}
