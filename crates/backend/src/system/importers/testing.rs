//! Тестовые импортеры

use anyhow::{bail, Result};
use async_trait::async_trait;
use contracts::system::importers::{BatchStatus, ImporterDefinition, RunContext};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::importer::Importer;

/// Импортер над списком строк с постраничной выдачей.
/// Курсор: индекс последнего обработанного элемента.
pub struct ListImporter {
    definition: ImporterDefinition,
    items: Vec<String>,
    page_size: usize,
    pub fetch_cursors: Mutex<Vec<Option<Value>>>,
    pub stored: Mutex<Vec<String>>,
    pub post_batch_calls: AtomicUsize,
    fail_fetch_on_call: Option<usize>,
    fail_apply_at_item: Option<usize>,
    overrun: bool,
    stall: bool,
    raw_payload: bool,
}

impl ListImporter {
    pub fn new(id: &str, items: &[&str]) -> Self {
        Self {
            definition: ImporterDefinition::new(id, format!("List {}", id)),
            items: items.iter().map(|s| s.to_string()).collect(),
            page_size: 1,
            fetch_cursors: Mutex::new(Vec::new()),
            stored: Mutex::new(Vec::new()),
            post_batch_calls: AtomicUsize::new(0),
            fail_fetch_on_call: None,
            fail_apply_at_item: None,
            overrun: false,
            stall: false,
            raw_payload: false,
        }
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Отдавать данные строкой JSON и объявить формат
    pub fn with_format(mut self, format: &str) -> Self {
        self.definition = self.definition.with_format(format);
        self.raw_payload = true;
        self
    }

    pub fn fail_fetch_on_call(mut self, call: usize) -> Self {
        self.fail_fetch_on_call = Some(call);
        self
    }

    pub fn fail_apply_at_item(mut self, index: usize) -> Self {
        self.fail_apply_at_item = Some(index);
        self
    }

    pub fn overrun(mut self) -> Self {
        self.overrun = true;
        self
    }

    pub fn stall(mut self) -> Self {
        self.stall = true;
        self
    }

    pub fn cursors(&self) -> Vec<Option<Value>> {
        self.fetch_cursors.lock().unwrap().clone()
    }

    pub fn stored_items(&self) -> Vec<String> {
        self.stored.lock().unwrap().clone()
    }
}

#[async_trait]
impl Importer for ListImporter {
    fn definition(&self) -> &ImporterDefinition {
        &self.definition
    }

    async fn fetch(&self, cursor: Option<&Value>) -> Result<Value> {
        let call = {
            let mut cursors = self.fetch_cursors.lock().unwrap();
            cursors.push(cursor.cloned());
            cursors.len()
        };
        if self.fail_fetch_on_call == Some(call) {
            bail!("remote returned 503");
        }

        let start = cursor
            .and_then(Value::as_u64)
            .map(|c| c as usize + 1)
            .unwrap_or(0)
            .min(self.items.len());
        let end = (start + self.page_size).min(self.items.len());
        let page = json!({
            "total": self.items.len(),
            "start": start,
            "items": &self.items[start..end],
        });

        if self.raw_payload {
            Ok(Value::String(page.to_string()))
        } else {
            Ok(page)
        }
    }

    fn size(&self, data: &Value) -> u64 {
        data["total"].as_u64().unwrap_or(0)
    }

    async fn apply(&self, data: Value, status: &mut BatchStatus) -> Result<()> {
        if self.stall {
            return Ok(());
        }
        let start = data["start"].as_u64().unwrap_or(0) as usize;
        let items = data["items"].as_array().cloned().unwrap_or_default();

        for (offset, item) in items.into_iter().enumerate() {
            let index = start + offset;
            if self.fail_apply_at_item == Some(index) {
                bail!("cannot save item {}", index);
            }
            let title = item.as_str().unwrap_or_default().to_string();
            self.stored.lock().unwrap().push(title.clone());
            status
                .set_current(index)
                .add_result(title.clone())
                .set_message(format!("Imported {}", title))
                .increment_progress();
            if self.overrun {
                status.increment_progress();
            }
        }
        Ok(())
    }

    async fn pre_batch(&self, _context: &RunContext) -> Result<Option<Value>> {
        Ok(Some(json!({"prepared_for": self.definition.id})))
    }

    async fn post_batch(&self, _context: &RunContext) -> Result<()> {
        self.post_batch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove_total(&self) -> Result<u64> {
        Ok(self.stored.lock().unwrap().len() as u64)
    }

    async fn remove_query(&self, _status: &BatchStatus) -> Result<Vec<Value>> {
        let stored = self.stored.lock().unwrap();
        Ok(stored
            .iter()
            .take(self.page_size)
            .map(|s| Value::String(s.clone()))
            .collect())
    }

    async fn remove_batch(&self, items: Vec<Value>, status: &mut BatchStatus) -> Result<()> {
        for item in items {
            let title = item.as_str().unwrap_or_default().to_string();
            self.stored.lock().unwrap().retain(|s| s != &title);
            status
                .set_current(title.clone())
                .add_result(json!({"removed": title}))
                .increment_progress();
        }
        Ok(())
    }
}
