/// 统一配置系统
///
/// 提供TOML/JSON配置文件、环境变量覆盖和验证
use crate::bindings::UnsignedOverflowPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::impl_default;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    /// 解析错误
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// 验证错误
    #[error("Config validation error: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 桥接层主配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,

    /// 远程对象缓存
    #[serde(default)]
    pub cache: CacheConfig,

    /// 数值编组
    #[serde(default)]
    pub marshal: MarshalConfig,

    /// 绑定分派
    #[serde(default)]
    pub bindings: BindingsConfig,

    /// 实时视图
    #[serde(default)]
    pub live_view: LiveViewConfig,

    /// 诊断
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

impl BridgeConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 从TOML文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_toml_str(&content)
    }

    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_json_str(&content)
    }

    /// 从JSON字符串解析配置
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 保存为TOML文件
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 保存为JSON文件
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 从环境变量覆盖配置
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("BRIDGE_LOG_LEVEL") {
            if let Some(level) = LogLevel::parse(&val) {
                self.logging.level = level;
            }
        }
        if let Some(val) = lookup("BRIDGE_UNSIGNED_OVERFLOW") {
            match val.to_ascii_lowercase().as_str() {
                "nearest_float" | "nearestfloat" | "float" => {
                    self.marshal.unsigned_overflow = UnsignedOverflowPolicy::NearestFloat
                }
                "saturate" => self.marshal.unsigned_overflow = UnsignedOverflowPolicy::Saturate,
                _ => {}
            }
        }
        if let Some(val) = lookup("BRIDGE_UNKNOWN_KIND") {
            match val.to_ascii_lowercase().as_str() {
                "error" => self.bindings.unknown_kind = UnknownKindPolicy::Error,
                "opaque" => self.bindings.unknown_kind = UnknownKindPolicy::Opaque,
                _ => {}
            }
        }
        if let Some(val) = lookup("BRIDGE_INCLUDE_DEFAULT_OBJECTS") {
            self.live_view.include_default_objects = val
                .parse()
                .unwrap_or(self.live_view.include_default_objects);
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        self.cache.validate()?;
        self.diagnostics.validate()?;
        Ok(())
    }

    /// 自动查找并加载配置文件
    ///
    /// 按以下顺序查找：
    /// 1. ./property_bridge.toml
    /// 2. ./property_bridge.json
    /// 3. ~/.config/property_bridge/config.toml
    /// 4. 使用默认配置
    ///
    /// 找到的配置会再应用环境变量覆盖。
    pub fn load_or_default() -> Self {
        let mut config = Self::find_config_file().unwrap_or_else(|| {
            tracing::info!(target: "config", "Using default configuration");
            Self::default()
        });
        config.apply_env_overrides();
        config
    }

    fn find_config_file() -> Option<Self> {
        if let Ok(config) = Self::from_toml_file("property_bridge.toml") {
            tracing::info!(target: "config", "Loaded config from property_bridge.toml");
            return Some(config);
        }

        if let Ok(config) = Self::from_json_file("property_bridge.json") {
            tracing::info!(target: "config", "Loaded config from property_bridge.json");
            return Some(config);
        }

        let home = env::var_os("HOME")?;
        let config_path = PathBuf::from(home)
            .join(".config")
            .join("property_bridge")
            .join("config.toml");
        match Self::from_toml_file(&config_path) {
            Ok(config) => {
                tracing::info!(target: "config", path = ?config_path, "Loaded config");
                Some(config)
            }
            Err(_) => None,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别（`RUST_LOG` 未设置时生效）
    pub level: LogLevel,

    /// 是否安装控制台订阅者
    pub log_to_console: bool,
}

impl_default!(LoggingConfig {
    level: LogLevel::Info,
    log_to_console: true,
});

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// 跟踪
    Trace,
    /// 调试
    Debug,
    /// 信息
    Info,
    /// 警告
    Warn,
    /// 错误
    Error,
}

impl LogLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// 远程对象缓存配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// 预分配的槽位数量
    pub initial_capacity: usize,

    /// 帧结束时回收已被脚本GC的槽位
    pub sweep_on_end_frame: bool,
}

impl_default!(CacheConfig {
    initial_capacity: 256,
    sweep_on_end_frame: true,
});

impl CacheConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.initial_capacity > u32::MAX as usize {
            return Err(ConfigError::ValidationError(format!(
                "cache.initial_capacity {} exceeds the slot index range",
                self.initial_capacity
            )));
        }
        Ok(())
    }
}

/// 数值编组配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarshalConfig {
    /// 超出脚本整数范围的64位无符号值的呈现方式
    #[serde(default)]
    pub unsigned_overflow: UnsignedOverflowPolicy,
}

/// What the dispatcher does with a property kind it has no binding for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnknownKindPolicy {
    /// Fail with `UnknownPropertyKind`.
    #[default]
    Error,
    /// Hand out an uncached placeholder handle that cannot be read or written.
    Opaque,
}

/// 绑定分派配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BindingsConfig {
    #[serde(default)]
    pub unknown_kind: UnknownKindPolicy,
}

/// 实时视图配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveViewConfig {
    /// 是否列出类默认对象和原型对象
    pub include_default_objects: bool,
}

impl_default!(LiveViewConfig {
    include_default_objects: false,
});

/// 诊断配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// 保留的最近记录数量
    pub max_recent_records: usize,

    /// 持久化路径
    pub persist_path: String,
}

impl_default!(DiagnosticsConfig {
    max_recent_records: 128,
    persist_path: "property_bridge_diagnostics.json".to_string(),
});

impl DiagnosticsConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.max_recent_records == 0 {
            return Err(ConfigError::ValidationError(
                "diagnostics.max_recent_records must be at least 1".to_string(),
            ));
        }
        if self.persist_path.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "diagnostics.persist_path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
