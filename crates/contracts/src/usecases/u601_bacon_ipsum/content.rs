use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Элемент контента, созданный импортером
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: Uuid,
    /// Тип контента (bundle), например "bacon_ipsum"
    pub bundle: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl ContentItem {
    pub fn new(bundle: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            bundle: bundle.into(),
            title: title.into(),
            body: body.into(),
            created_at: Utc::now(),
        }
    }
}
