use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `BOQ_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os("BOQ_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 分组键的第二维：区域名或可见性状态。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    Zone,
    Visibility,
}

/// 区域解析与汇总规则，每次计算显式传入引擎。
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// 承载区域证据（房间块、闭合边界）的图层名，比较时不区分大小写。
    #[serde(default = "EngineConfig::default_planner_layer")]
    pub planner_layer: String,
    #[serde(default = "EngineConfig::default_zone_name_tags")]
    pub zone_name_tags: Vec<String>,
    #[serde(default = "EngineConfig::default_description_tags")]
    pub description_tags: Vec<String>,
    #[serde(default = "EngineConfig::default_distance_prefixes")]
    pub distance_parameter_prefixes: Vec<String>,
    #[serde(default = "EngineConfig::default_unassigned_zone")]
    pub unassigned_zone: String,
    #[serde(default)]
    pub group_by: GroupBy,
    #[serde(default)]
    pub include_xrefs: bool,
    #[serde(default = "EngineConfig::default_nested_depth")]
    pub nested_depth: usize,
}

impl EngineConfig {
    fn default_planner_layer() -> String {
        "PLANNER".to_string()
    }

    fn default_zone_name_tags() -> Vec<String> {
        ["NAME", "ROOM", "ZONE", "LABEL", "TITLE"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn default_description_tags() -> Vec<String> {
        ["DESC", "DESCRIPTION", "NOTE", "REM", "REMARK", "INFO", "META_DESC"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn default_distance_prefixes() -> Vec<String> {
        vec!["distance".to_string()]
    }

    fn default_unassigned_zone() -> String {
        "Unmarked Area".to_string()
    }

    fn default_nested_depth() -> usize {
        10
    }

    /// 图层是否为区域规划层。
    pub fn is_planner_layer(&self, layer: &str) -> bool {
        layer.trim().eq_ignore_ascii_case(self.planner_layer.trim())
    }

    /// 参数名是否为距离类参数（前缀匹配，不区分大小写）。
    pub fn is_distance_parameter(&self, name: &str) -> bool {
        let lowered = name.trim().to_ascii_lowercase();
        self.distance_parameter_prefixes
            .iter()
            .any(|prefix| lowered.starts_with(&prefix.trim().to_ascii_lowercase()))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            planner_layer: Self::default_planner_layer(),
            zone_name_tags: Self::default_zone_name_tags(),
            description_tags: Self::default_description_tags(),
            distance_parameter_prefixes: Self::default_distance_prefixes(),
            unassigned_zone: Self::default_unassigned_zone(),
            group_by: GroupBy::default(),
            include_xrefs: false,
            nested_depth: Self::default_nested_depth(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "OutputConfig::default_pretty")]
    pub pretty: bool,
}

impl OutputConfig {
    fn default_pretty() -> bool {
        true
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pretty: Self::default_pretty(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}
