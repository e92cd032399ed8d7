//! 组件生命周期与作用域标记

use std::fmt;
use std::sync::Arc;

/// 组件生命周期类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lifetime {
    /// 单例模式 - 整个应用生命周期内只创建一个实例
    Singleton,
    /// 作用域模式 - 在同一作用域（请求）内共享实例
    Scoped,
    /// 瞬时模式 - 每次注入都创建新实例
    #[default]
    Transient,
}

/// 作用域标记
///
/// 每个作用域由一个 Context 实现管理。“普通”作用域在运行时通过延迟句柄间接访问，
/// 因此经过普通作用域的依赖边不构成构造期循环。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeType {
    name: Arc<str>,
    normal: bool,
}

impl ScopeType {
    /// 创建作用域标记
    pub fn new(name: impl Into<Arc<str>>, normal: bool) -> Self {
        Self {
            name: name.into(),
            normal,
        }
    }

    /// 创建普通（需要代理）作用域
    pub fn normal(name: impl Into<Arc<str>>) -> Self {
        Self::new(name, true)
    }

    /// 创建伪作用域
    pub fn pseudo(name: impl Into<Arc<str>>) -> Self {
        Self::new(name, false)
    }

    /// 依赖作用域，每次注入都创建新实例，随注入方一起销毁
    pub fn dependent() -> Self {
        Self::pseudo("Dependent")
    }

    /// 单例伪作用域
    pub fn singleton() -> Self {
        Self::pseudo("Singleton")
    }

    /// 应用作用域
    pub fn application() -> Self {
        Self::normal("Application")
    }

    /// 请求作用域
    pub fn request() -> Self {
        Self::normal("Request")
    }

    /// 会话作用域
    pub fn session() -> Self {
        Self::normal("Session")
    }

    /// 作用域名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 是否为普通作用域
    pub fn is_normal(&self) -> bool {
        self.normal
    }
}

impl Default for ScopeType {
    fn default() -> Self {
        Self::dependent()
    }
}

impl From<Lifetime> for ScopeType {
    fn from(lifetime: Lifetime) -> Self {
        match lifetime {
            Lifetime::Singleton => Self::singleton(),
            Lifetime::Scoped => Self::request(),
            Lifetime::Transient => Self::dependent(),
        }
    }
}

impl fmt::Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)
    }
}
