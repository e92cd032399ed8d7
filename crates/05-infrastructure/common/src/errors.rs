//! 错误类型定义

use thiserror::Error;

/// 用户回调（构造器、生产者、钩子）返回的装箱错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置解析失败: {source}")]
    ParseError { source: BoxError },

    #[error("配置序列化失败: {source}")]
    SerializationError {
        #[from]
        source: serde_json::Error,
    },

    #[error("配置键不存在: {key}")]
    KeyNotFound { key: String },

    #[error("配置验证失败: {message}")]
    ValidationError { message: String },
}

/// 依赖注入错误类型
///
/// 所有错误都是本地、同步的失败，直接返回给调用方，容器内部不做重试。
#[derive(Error, Debug)]
pub enum DependencyError {
    #[error("依赖无法满足: {type_name} {qualifiers}, 注入点: {site}")]
    UnsatisfiedDependency {
        type_name: String,
        qualifiers: String,
        site: String,
    },

    #[error("依赖存在歧义: {type_name} {qualifiers}, 注入点: {site}, 候选组件: [{}]", .candidates.join(", "))]
    AmbiguousDependency {
        type_name: String,
        qualifiers: String,
        site: String,
        candidates: Vec<String>,
    },

    #[error("循环依赖检测到: {}", .chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    #[error("作用域没有活动的上下文: {scope}")]
    ContextNotActive { scope: String },

    #[error("作用域存在多个活动的上下文: {scope} ({count} 个)")]
    DuplicateActiveContext { scope: String, count: usize },

    #[error("组件创建失败: {component}, 原因: {source}")]
    ConstructionFailed { component: String, source: BoxError },

    #[error("组件销毁失败: {component}, 原因: {source}")]
    DestructionFailed { component: String, source: BoxError },

    #[error("注入点不支持泛型参数转换: {injection_point}, 原因: {reason}")]
    TranslationNotSupported {
        injection_point: String,
        reason: String,
    },

    #[error("注入点不支持直接注入: {injection_point}")]
    InjectionNotSupported { injection_point: String },

    #[error("组件声明无效: {component}, 原因: {message}")]
    InvalidDeclaration { component: String, message: String },

    #[error("类型不匹配: 期望 {expected}, 实际来自 {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("参数缺失: 位置 {index}")]
    ArgumentMissing { index: usize },

    #[error("组件已重复声明: {id}")]
    DuplicateComponent { id: String },

    #[error("容器尚未部署")]
    NotDeployed,

    #[error("容器已部署: {id}")]
    AlreadyDeployed { id: String },

    #[error("容器部署已中止: {id}")]
    DeploymentAborted { id: String },

    #[error("容器已关闭")]
    ContainerShutDown,

    #[error("解析深度超过上限 {max_depth}: {}", .chain.join(" -> "))]
    ResolutionDepthExceeded { max_depth: usize, chain: Vec<String> },
}

impl DependencyError {
    /// 创建构造失败错误
    pub fn construction_failed(component: impl Into<String>, source: BoxError) -> Self {
        Self::ConstructionFailed {
            component: component.into(),
            source,
        }
    }

    /// 创建销毁失败错误
    pub fn destruction_failed(component: impl Into<String>, source: BoxError) -> Self {
        Self::DestructionFailed {
            component: component.into(),
            source,
        }
    }

    /// 创建类型不匹配错误
    pub fn type_mismatch<T: ?Sized + 'static>(actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: std::any::type_name::<T>().to_string(),
            actual: actual.into(),
        }
    }

    /// 是否为部署期致命错误
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::CircularDependency { .. } | Self::ResolutionDepthExceeded { .. }
        )
    }
}

/// 基础设施错误类型
#[derive(Error, Debug)]
pub enum InfrastructureError {
    #[error("配置错误: {source}")]
    ConfigError {
        #[from]
        source: ConfigError,
    },

    #[error("依赖注入错误: {source}")]
    DependencyError {
        #[from]
        source: DependencyError,
    },
}

/// 结果类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type DependencyResult<T> = Result<T, DependencyError>;
pub type InfrastructureResult<T> = Result<T, InfrastructureError>;
