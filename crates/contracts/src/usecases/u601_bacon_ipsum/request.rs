use serde::{Deserialize, Serialize};

/// Настройки импортера bacon ipsum (`[importers.u601_bacon_ipsum.settings]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaconIpsumSettings {
    /// Адрес API
    pub endpoint: String,

    /// Тип текста: "meat-and-filler" или "all-meat"
    pub text_type: String,

    /// Количество абзацев за один запрос
    pub paragraphs: u32,

    /// Сколько абзацев обрабатывать за один шаг батча
    pub batch_size: u32,

    /// Количество слов абзаца, из которых строится заголовок
    pub title_words: usize,

    /// Сколько элементов удалять за один шаг батча удаления
    pub remove_batch_size: u32,
}

impl Default for BaconIpsumSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://baconipsum.com/api/".to_string(),
            text_type: "meat-and-filler".to_string(),
            paragraphs: 10,
            batch_size: 5,
            title_words: 4,
            remove_batch_size: 20,
        }
    }
}
