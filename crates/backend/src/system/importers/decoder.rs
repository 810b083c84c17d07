use super::error::ImportError;
use anyhow::Result;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Декодер сырых данных определенного формата
pub trait Decoder: Send + Sync {
    fn format(&self) -> &'static str;

    fn decode(&self, raw: &str) -> Result<Value>;
}

pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn format(&self) -> &'static str {
        "json"
    }

    fn decode(&self, raw: &str) -> Result<Value> {
        Ok(serde_json::from_str(raw)?)
    }
}

pub struct TomlDecoder;

impl Decoder for TomlDecoder {
    fn format(&self) -> &'static str {
        "toml"
    }

    fn decode(&self, raw: &str) -> Result<Value> {
        Ok(toml::from_str::<Value>(raw)?)
    }
}

/// CSV с заголовком: каждая строка превращается в объект `{колонка: значение}`
pub struct CsvDecoder;

impl Decoder for CsvDecoder {
    fn format(&self) -> &'static str {
        "csv"
    }

    fn decode(&self, raw: &str) -> Result<Value> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(raw.as_bytes());

        let headers = reader.headers()?.clone();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row = Map::new();
            for (header, field) in headers.iter().zip(record.iter()) {
                row.insert(header.to_string(), Value::String(field.to_string()));
            }
            rows.push(Value::Object(row));
        }
        Ok(Value::Array(rows))
    }
}

/// Реестр декодеров по имени формата.
///
/// Неподдерживаемый формат не является ошибкой: данные возвращаются как есть.
#[derive(Clone)]
pub struct DecoderRegistry {
    decoders: HashMap<String, Arc<dyn Decoder>>,
}

impl DecoderRegistry {
    /// Пустой реестр (ни один формат не поддерживается)
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Реестр с декодерами json, toml и csv
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(JsonDecoder);
        registry.register(TomlDecoder);
        registry.register(CsvDecoder);
        registry
    }

    pub fn register<D: Decoder + 'static>(&mut self, decoder: D) {
        self.decoders
            .insert(decoder.format().to_ascii_lowercase(), Arc::new(decoder));
    }

    pub fn supports(&self, format: &str) -> bool {
        self.decoders.contains_key(&format.to_ascii_lowercase())
    }

    /// Декодирует строковые данные в указанном формате.
    /// Уже структурированные данные и неизвестные форматы проходят без изменений.
    pub fn decode(&self, raw: Value, format: &str) -> Result<Value, ImportError> {
        let Some(decoder) = self.decoders.get(&format.to_ascii_lowercase()) else {
            tracing::debug!("No decoder for format '{}', passing data through", format);
            return Ok(raw);
        };

        match raw {
            Value::String(text) => decoder.decode(&text).map_err(|e| ImportError::Decode {
                format: format.to_string(),
                message: e.to_string(),
            }),
            other => Ok(other),
        }
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
