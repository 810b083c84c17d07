use anyhow::Result;
use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};
use std::collections::HashMap;
use std::sync::RwLock;

/// Суффикс ключа времени постановки в очередь
pub const QUEUED_SUFFIX: &str = "queued";
/// Суффикс ключа времени последнего запуска
pub const LAST_RUN_SUFFIX: &str = "last_run";

/// Ключ вида `<importer_id>.<suffix>`
pub fn state_key(importer_id: &str, suffix: &str) -> String {
    format!("{}.{}", importer_id, suffix)
}

/// Долговременное хранилище ключ-значение для меток времени импортеров.
/// Отсутствующий ключ читается как `default`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str, default: i64) -> Result<i64>;

    async fn set(&self, key: &str, value: i64) -> Result<()>;

    /// Атомарно записывает `value`, если текущее значение равно `expected`
    /// (отсутствующий ключ считается равным 0). Возвращает `true` при записи.
    async fn compare_and_set(&self, key: &str, expected: i64, value: i64) -> Result<bool>;
}

/// In-memory хранилище (тесты и запуск без базы данных)
#[derive(Default)]
pub struct MemoryKeyValueStore {
    values: RwLock<HashMap<String, i64>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str, default: i64) -> Result<i64> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).copied().unwrap_or(default))
    }

    async fn set(&self, key: &str, value: i64) -> Result<()> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value);
        Ok(())
    }

    async fn compare_and_set(&self, key: &str, expected: i64, value: i64) -> Result<bool> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        let current = values.get(key).copied().unwrap_or(0);
        if current != expected {
            return Ok(false);
        }
        values.insert(key.to_string(), value);
        Ok(true)
    }
}

/// Хранилище в SQLite (таблица `key_value`, разделенная по коллекциям)
pub struct SqliteKeyValueStore {
    conn: DatabaseConnection,
    collection: String,
}

impl SqliteKeyValueStore {
    /// Создает хранилище и при необходимости таблицу
    pub async fn new(conn: DatabaseConnection, collection: impl Into<String>) -> Result<Self> {
        let create_table = r#"
            CREATE TABLE IF NOT EXISTS key_value (
                collection TEXT NOT NULL,
                name TEXT NOT NULL,
                value INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (collection, name)
            );
        "#;
        conn.execute(Statement::from_string(
            DatabaseBackend::Sqlite,
            create_table.to_string(),
        ))
        .await?;

        Ok(Self {
            conn,
            collection: collection.into(),
        })
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str, default: i64) -> Result<i64> {
        let row = self
            .conn
            .query_one(Statement::from_sql_and_values(
                DatabaseBackend::Sqlite,
                "SELECT value FROM key_value WHERE collection = ? AND name = ?",
                [self.collection.clone().into(), key.into()],
            ))
            .await?;

        match row {
            Some(row) => Ok(row.try_get::<i64>("", "value")?),
            None => Ok(default),
        }
    }

    async fn set(&self, key: &str, value: i64) -> Result<()> {
        self.conn
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Sqlite,
                r#"
                INSERT INTO key_value (collection, name, value, updated_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(collection, name)
                DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
                "#,
                [
                    self.collection.clone().into(),
                    key.into(),
                    value.into(),
                    chrono::Utc::now().to_rfc3339().into(),
                ],
            ))
            .await?;
        Ok(())
    }

    async fn compare_and_set(&self, key: &str, expected: i64, value: i64) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        // Отсутствующий ключ равен 0, поэтому для expected == 0 вставка тоже считается успехом
        let statement = if expected == 0 {
            Statement::from_sql_and_values(
                DatabaseBackend::Sqlite,
                r#"
                INSERT INTO key_value (collection, name, value, updated_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(collection, name)
                DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
                WHERE key_value.value = 0
                "#,
                [
                    self.collection.clone().into(),
                    key.into(),
                    value.into(),
                    now.into(),
                ],
            )
        } else {
            Statement::from_sql_and_values(
                DatabaseBackend::Sqlite,
                r#"
                UPDATE key_value SET value = ?, updated_at = ?
                WHERE collection = ? AND name = ? AND value = ?
                "#,
                [
                    value.into(),
                    now.into(),
                    self.collection.clone().into(),
                    key.into(),
                    expected.into(),
                ],
            )
        };

        let result = self.conn.execute(statement).await?;
        Ok(result.rows_affected() == 1)
    }
}
