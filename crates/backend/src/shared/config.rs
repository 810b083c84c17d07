use contracts::system::importers::ImporterConfiguration;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Настройки импортеров по id (`[importers.<id>]`)
    #[serde(default)]
    pub importers: BTreeMap<String, ImporterConfig>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Хранилище меток времени импортеров.
/// `path = ":memory:"` хранит метки только в памяти процесса.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub path: String,
    pub collection: String,
}

pub const MEMORY_STORAGE: &str = ":memory:";

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "target/db/importers.db".to_string(),
            collection: "importers".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn is_memory(&self) -> bool {
        self.path == MEMORY_STORAGE
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub sweep_interval_seconds: u64,
    /// Сколько шагов подряд без продвижения допускается до ошибки
    pub max_idle_steps: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_interval_seconds: 60,
            max_idle_steps: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Директория логов; по умолчанию `logs` рядом с исполняемым файлом
    pub directory: Option<String>,
    /// Фильтр по умолчанию, если не задан RUST_LOG
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            filter: "info,sqlx=warn,sea_orm=warn".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ImporterConfig {
    pub enabled: bool,
    pub cron_minutes: Option<u32>,
    pub settings: ImporterConfiguration,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron_minutes: None,
            settings: ImporterConfiguration::new(),
        }
    }
}

impl Config {
    /// Настройки импортера; отсутствующая секция означает настройки по умолчанию
    pub fn importer(&self, importer_id: &str) -> ImporterConfig {
        self.importers.get(importer_id).cloned().unwrap_or_default()
    }
}

/// Default configuration embedded in the binary
const DEFAULT_CONFIG: &str = r#"
[server]
host = "0.0.0.0"
port = 3000

[storage]
path = "target/db/importers.db"
collection = "importers"

[scheduler]
enabled = true
sweep_interval_seconds = 60
max_idle_steps = 10

[logging]
filter = "info,sqlx=warn,sea_orm=warn"

[importers.u601_bacon_ipsum]
enabled = true
cron_minutes = 60
"#;

/// Откуда загружена конфигурация. Логируется после инициализации tracing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// Встроенная конфигурация; `searched` - где искали config.toml
    Embedded { searched: Option<PathBuf> },
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => tracing::info!("Loaded config from: {}", path.display()),
            ConfigSource::Embedded { searched } => {
                if let Some(path) = searched {
                    tracing::warn!("config.toml not found at: {}", path.display());
                }
                tracing::info!("Using default embedded configuration");
            }
        }
    }
}

/// Load configuration from config.toml file
///
/// Search order:
/// 1. Next to the executable (for production)
/// 2. Falls back to embedded default config
///
/// Subscriber еще не инициализирован, поэтому источник возвращается вызывающей стороне.
pub fn load_config() -> anyhow::Result<(Config, ConfigSource)> {
    let config_path = std::env::current_exe()
        .ok()
        .and_then(|exe_path| exe_path.parent().map(|dir| dir.join("config.toml")));

    match config_path {
        Some(path) => load_config_from(&path),
        None => Ok((
            toml::from_str(DEFAULT_CONFIG)?,
            ConfigSource::Embedded { searched: None },
        )),
    }
}

/// Загрузить конфигурацию из файла; если файла нет, используется встроенная
pub fn load_config_from(path: &Path) -> anyhow::Result<(Config, ConfigSource)> {
    if path.exists() {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        return Ok((config, ConfigSource::File(path.to_path_buf())));
    }

    let config: Config = toml::from_str(DEFAULT_CONFIG)?;
    Ok((
        config,
        ConfigSource::Embedded {
            searched: Some(path.to_path_buf()),
        },
    ))
}

/// Get the database file path from configuration
/// Resolves relative paths relative to the executable directory
pub fn get_database_path(config: &Config) -> PathBuf {
    resolve_path(&config.storage.path)
}

/// Get the log directory from configuration
pub fn get_log_directory(config: &LoggingConfig) -> PathBuf {
    match &config.directory {
        Some(dir) => resolve_path(dir),
        None => resolve_path("logs"),
    }
}

fn resolve_path(path_str: &str) -> PathBuf {
    let path = Path::new(path_str);

    // If absolute path, use as is
    if path.is_absolute() {
        return path.to_path_buf();
    }

    // If relative path, resolve it relative to the executable directory
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            return exe_dir.join(path);
        }
    }

    // Fallback: use relative to current directory
    PathBuf::from(path_str)
}
