use serde::{Deserialize, Serialize};

/// Интервал автоматического запуска по умолчанию (в минутах)
pub const DEFAULT_CRON_MINUTES: u32 = 60;

/// Произвольная конфигурация экземпляра импортера (ключ -> значение)
pub type ImporterConfiguration = serde_json::Map<String, serde_json::Value>;

fn default_cron_minutes() -> u32 {
    DEFAULT_CRON_MINUTES
}

/// Описание импортера: идентификатор, подпись для UI, формат данных и расписание.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImporterDefinition {
    /// Стабильный машинный идентификатор
    pub id: String,

    /// Отображаемое имя
    pub label: String,

    /// Категория в списке импортеров
    #[serde(default)]
    pub category: String,

    /// Формат получаемых данных (например, "json").
    /// Если задан, полученные данные декодируются перед применением.
    #[serde(default)]
    pub format: Option<String>,

    /// Минуты между автоматическими запусками
    #[serde(default = "default_cron_minutes")]
    pub cron_minutes: u32,
}

impl ImporterDefinition {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            category: String::new(),
            format: None,
            cron_minutes: DEFAULT_CRON_MINUTES,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_cron_minutes(mut self, minutes: u32) -> Self {
        self.cron_minutes = minutes;
        self
    }

    /// Интервал запуска в секундах
    pub fn cron_interval_seconds(&self) -> i64 {
        i64::from(self.cron_minutes) * 60
    }
}
