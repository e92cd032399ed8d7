//! 配置相关的基础接口定义

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 可配置组件 trait
///
/// 需要配置的组件必须实现此 trait
pub trait Configurable: Send + Sync {
    /// 配置类型
    type Config: for<'de> Deserialize<'de> + Serialize + Clone + Send + Sync + 'static;

    /// 应用配置
    fn configure(&mut self, config: Self::Config) -> Result<(), ConfigError>;

    /// 获取配置路径
    fn get_config_path() -> &'static str;

    /// 获取默认配置
    fn default_config() -> Self::Config
    where
        Self::Config: Default,
    {
        Self::Config::default()
    }
}

/// 配置节
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigSection {
    /// 配置数据
    pub data: HashMap<String, serde_json::Value>,
}

impl ConfigSection {
    /// 创建新的配置节
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 JSON 对象创建配置节，非对象值得到空配置节
    pub fn from_value(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => Self {
                data: map.into_iter().collect(),
            },
            _ => Self::new(),
        }
    }

    /// 插入配置项
    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }

    /// 获取配置项
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// 按点分路径获取子配置节，例如 `di.container`
    pub fn section(&self, path: &str) -> Result<ConfigSection, ConfigError> {
        let mut segments = path.split('.');
        let first = segments.next().unwrap_or_default();
        let mut current = self.get(first).ok_or_else(|| ConfigError::KeyNotFound {
            key: path.to_string(),
        })?;

        for segment in segments {
            current = current.get(segment).ok_or_else(|| ConfigError::KeyNotFound {
                key: path.to_string(),
            })?;
        }

        Ok(Self::from_value(current.clone()))
    }

    /// 绑定到具体类型
    pub fn bind<T>(&self) -> Result<T, ConfigError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let value = serde_json::Value::Object(
            self.data
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );

        serde_json::from_value(value).map_err(|e| ConfigError::SerializationError { source: e })
    }
}
