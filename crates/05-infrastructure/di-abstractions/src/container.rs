//! 依赖注入容器抽象接口
//!
//! 提供容器配置以及按类型获取组件实例的公共契约

use crate::factory::{downcast_instance, ComponentInstance};
use crate::qualifiers::QualifierSet;
use infrastructure_common::{
    ConfigError, ConfigSection, Configurable, DependencyResult, TypeRef,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;

/// 组件提供者 trait
///
/// 外部集成（Web、ORM 等）只通过此接口获取组件实例
pub trait ComponentProvider: Send + Sync {
    /// 按类型与限定符获取组件实例
    fn get_reference_by_type(
        &self,
        ty: &TypeRef,
        qualifiers: &QualifierSet,
    ) -> DependencyResult<ComponentInstance>;

    /// 指定类型是否恰好解析到一个组件
    fn can_resolve(&self, ty: &TypeRef, qualifiers: &QualifierSet) -> bool;
}

/// 组件提供者的类型化扩展
pub trait TypedComponentProvider: ComponentProvider {
    /// 获取默认限定符下的组件实例
    fn get<T: Any + Send + Sync>(&self) -> DependencyResult<Arc<T>> {
        self.get_qualified::<T>(&QualifierSet::default_set())
    }

    /// 获取指定限定符下的组件实例
    fn get_qualified<T: Any + Send + Sync>(
        &self,
        qualifiers: &QualifierSet,
    ) -> DependencyResult<Arc<T>> {
        let ty = TypeRef::of::<T>();
        let instance = self.get_reference_by_type(&ty, qualifiers)?;
        downcast_instance::<T>(instance, &ty.to_string())
    }
}

impl<P: ComponentProvider + ?Sized> TypedComponentProvider for P {}

/// 容器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// 是否启用循环依赖检测
    pub enable_circular_dependency_detection: bool,
    /// 最大解析深度
    pub max_resolution_depth: usize,
    /// 部署后动态发现的组件是否也执行校验
    pub validate_discovered_components: bool,
    /// 部署时是否执行配置组件
    pub execute_configurations: bool,
}

impl ContainerConfig {
    /// 从 TOML 文本加载配置
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            source: Box::new(e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 从配置节的 `di.container` 路径加载配置，路径不存在时使用默认值
    pub fn from_section(section: &ConfigSection) -> Result<Self, ConfigError> {
        let config: Self = match section.section(Self::get_config_path()) {
            Ok(container) => container.bind()?,
            Err(ConfigError::KeyNotFound { .. }) => Self::default(),
            Err(e) => return Err(e),
        };
        config.validate()?;
        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_resolution_depth == 0 {
            return Err(ConfigError::ValidationError {
                message: "max_resolution_depth 必须大于 0".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            enable_circular_dependency_detection: true,
            max_resolution_depth: 100,
            validate_discovered_components: true,
            execute_configurations: true,
        }
    }
}

impl Configurable for ContainerConfig {
    type Config = ContainerConfig;

    fn configure(&mut self, config: Self::Config) -> Result<(), ConfigError> {
        config.validate()?;
        *self = config;
        Ok(())
    }

    fn get_config_path() -> &'static str {
        "di.container"
    }
}

/// 容器统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerStats {
    /// 已注册组件数量
    pub registered_components: usize,
    /// 混入组件数量
    pub mixins: usize,
    /// 已缓存解析结果的类型数量
    pub resolved_types: usize,
    /// 已登记的上下文数量
    pub registered_contexts: usize,
    /// 是否已部署
    pub deployed: bool,
}
