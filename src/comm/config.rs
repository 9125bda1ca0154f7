use anyhow::{anyhow, Result};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::TrackerError;

/// 默认状态文件名 / Default state object key
pub const DEFAULT_FILENAME: &str = "data.json";
/// 默认淘汰窗口大小 / Default eviction window size
pub const DEFAULT_MAX_PUBLISHED_OBJECTS: usize = 50;
/// 默认签名区域 / Default signing region
pub const DEFAULT_REGION: &str = "us-east-1";

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("配置项 '{key}' 不存在")]
    KeyNotFound { key: String },
    #[error("配置项 '{key}' 类型转换失败: {message}")]
    TypeConversionError { key: String, message: String },
}

// ============================================================================
// 跟踪器配置 / Tracker Configuration
// ============================================================================

/// 跟踪器配置 / Tracker configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// 目标桶 / Target bucket
    pub bucket_name: String,

    /// 对象存储端点 / Object store endpoint, e.g. `http://localhost:9000`
    pub endpoint_url: String,

    pub access_key_id: String,

    pub secret_access_key: String,

    /// 状态对象的键 / Key the state is persisted under
    #[serde(default = "default_filename")]
    pub filename: String,

    /// 淘汰窗口大小 / Eviction window size
    #[serde(default = "default_max_published_objects")]
    pub max_published_objects: usize,

    /// 签名区域 / Signing region
    #[serde(default = "default_region")]
    pub region: String,

    /// 存储客户端请求超时（毫秒）/ Store client request timeout (ms)
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

fn default_filename() -> String {
    DEFAULT_FILENAME.to_string()
}

fn default_max_published_objects() -> usize {
    DEFAULT_MAX_PUBLISHED_OBJECTS
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl TrackerConfig {
    pub fn new(
        bucket_name: impl Into<String>,
        endpoint_url: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            endpoint_url: endpoint_url.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            filename: default_filename(),
            max_published_objects: default_max_published_objects(),
            region: default_region(),
            request_timeout_ms: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn with_max_published_objects(mut self, max: usize) -> Self {
        self.max_published_objects = max;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = Some(timeout_ms);
        self
    }

    /// 校验构造参数 / Validate construction parameters
    pub fn validate(&self) -> std::result::Result<(), TrackerError> {
        if self.bucket_name.trim().is_empty() {
            return Err(TrackerError::configuration("bucket_name must not be empty"));
        }
        if self.endpoint_url.trim().is_empty() {
            return Err(TrackerError::configuration("endpoint_url must not be empty"));
        }
        if self.filename.trim().is_empty() {
            return Err(TrackerError::configuration("filename must not be empty"));
        }
        if self.max_published_objects == 0 {
            return Err(TrackerError::configuration(
                "max_published_objects must be positive",
            ));
        }
        if self.request_timeout_ms == Some(0) {
            return Err(TrackerError::configuration(
                "request_timeout_ms must be positive",
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for TrackerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackerConfig")
            .field("bucket_name", &self.bucket_name)
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("filename", &self.filename)
            .field("max_published_objects", &self.max_published_objects)
            .field("region", &self.region)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

// ============================================================================
// 配置管理器 / Configuration Manager
// ============================================================================

/// 配置数据源信息
#[derive(Debug, Clone)]
pub struct ConfigSourceInfo {
    pub source_type: String,
    pub description: String,
    pub priority: u8,
    pub loaded: bool,
}

/// 配置管理器
///
/// 后添加的配置源优先生效；库本身不读取环境变量，除非显式添加 `ConfigSource::Env`
/// Later sources win; the library reads no environment variables unless
/// `ConfigSource::Env` is added explicitly
pub struct ConfigManager {
    config: Config,
    sources_info: Vec<ConfigSourceInfo>,
}

impl ConfigManager {
    /// 使用指定的配置源创建配置管理器
    pub fn with_sources(sources: Vec<ConfigSource>) -> Result<Self> {
        let mut builder = Config::builder();
        let mut sources_info = Vec::new();

        for (index, source) in sources.into_iter().enumerate() {
            let priority = u8::try_from(index + 1).unwrap_or(u8::MAX);
            let mut info = source.get_source_info(priority);

            if let ConfigSource::File { path, required, .. } = &source {
                if !std::path::Path::new(path).exists() {
                    if *required {
                        return Err(anyhow!("必需的配置文件不存在: {}", path));
                    }
                    sources_info.push(info);
                    continue;
                }
            }

            builder = source
                .add_to_builder(builder)
                .map_err(|e| anyhow!("添加配置源失败: {}", e))?;
            info.loaded = true;
            sources_info.push(info);
        }

        let config = builder
            .build()
            .map_err(|e| anyhow!("构建配置失败: {}", e))?;
        Ok(Self {
            config,
            sources_info,
        })
    }

    /// 获取指定 key 的配置值
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.config
            .get(key)
            .map_err(|e| anyhow!("获取配置 '{}' 失败: {}", key, e))
    }

    /// 获取指定 key 的配置值，如果不存在返回默认值
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// 安全获取配置值，返回详细错误信息
    pub fn get_safe<T: DeserializeOwned>(&self, key: &str) -> std::result::Result<T, ConfigError> {
        self.config.get(key).map_err(|e| match e {
            config::ConfigError::NotFound(_) => ConfigError::KeyNotFound {
                key: key.to_string(),
            },
            other => ConfigError::TypeConversionError {
                key: key.to_string(),
                message: other.to_string(),
            },
        })
    }

    /// 读取并校验跟踪器配置段 / Read and validate a tracker section
    pub fn tracker_config(&self, section: &str) -> Result<TrackerConfig> {
        let config: TrackerConfig = self.get_safe(section)?;
        config.validate()?;
        Ok(config)
    }

    /// 日志级别，默认 info / Logging level, `info` when unset
    pub fn logging_level(&self) -> String {
        self.get_or("logging.level", "info".to_string())
    }

    /// 获取所有配置源信息
    pub fn sources_info(&self) -> &[ConfigSourceInfo] {
        &self.sources_info
    }

    /// 获取当前活跃的配置源（已成功加载的）
    pub fn active_sources(&self) -> Vec<&ConfigSourceInfo> {
        self.sources_info.iter().filter(|info| info.loaded).collect()
    }
}

/// 配置源类型
pub enum ConfigSource {
    /// 文件配置源，`format` 为空时按扩展名识别
    File {
        path: String,
        format: Option<FileFormat>,
        required: bool,
    },
    /// 环境变量配置源
    Env {
        prefix: String,
        separator: &'static str,
    },
    /// 内存配置源（HashMap）
    Memory(HashMap<String, serde_json::Value>),
    /// 字符串配置源
    String { content: String, format: FileFormat },
}

fn format_name(format: &FileFormat) -> &'static str {
    match format {
        FileFormat::Toml => "TOML",
        FileFormat::Yaml => "YAML",
        FileFormat::Json => "JSON",
        FileFormat::Ini => "INI",
        FileFormat::Ron => "RON",
        FileFormat::Json5 => "JSON5",
        _ => "Unknown",
    }
}

impl ConfigSource {
    /// 获取配置源信息
    pub fn get_source_info(&self, priority: u8) -> ConfigSourceInfo {
        let (source_type, description) = match self {
            ConfigSource::File {
                path,
                format,
                required,
            } => (
                "File",
                format!(
                    "文件配置源: {} (格式: {}, 必需: {})",
                    path,
                    format.as_ref().map(format_name).unwrap_or("Auto-detect"),
                    required
                ),
            ),
            ConfigSource::Env { prefix, separator } => (
                "Environment",
                format!("环境变量配置源: 前缀={}, 分隔符={}", prefix, separator),
            ),
            ConfigSource::Memory(map) => ("Memory", format!("内存配置源: {} 个配置项", map.len())),
            ConfigSource::String { format, .. } => {
                ("String", format!("字符串配置源: 格式={}", format_name(format)))
            }
        };
        ConfigSourceInfo {
            source_type: source_type.to_string(),
            description,
            priority,
            loaded: false,
        }
    }

    pub fn add_to_builder(
        self,
        builder: ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<ConfigBuilder<config::builder::DefaultState>> {
        match self {
            ConfigSource::File {
                path,
                format,
                required,
            } => {
                let file_source = match format {
                    Some(format) => File::with_name(&path).format(format),
                    None => File::with_name(&path),
                };
                Ok(builder.add_source(file_source.required(required)))
            }
            ConfigSource::Env { prefix, separator } => Ok(builder.add_source(
                Environment::with_prefix(&prefix)
                    .separator(separator)
                    .prefix_separator("_")
                    .try_parsing(true)
                    .ignore_empty(true),
            )),
            ConfigSource::Memory(map) => {
                let json_content = serde_json::to_string(&map)
                    .map_err(|e| anyhow!("序列化内存配置失败: {}", e))?;
                Ok(builder.add_source(File::from_str(&json_content, FileFormat::Json)))
            }
            ConfigSource::String { content, format } => {
                Ok(builder.add_source(File::from_str(&content, format)))
            }
        }
    }
}
