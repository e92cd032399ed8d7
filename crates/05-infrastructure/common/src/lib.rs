//! # Infrastructure Common
//!
//! 依赖注入引擎的公共基础类型。
//!
//! ## 核心内容
//!
//! - [`TypeRef`] - 运行时类型引用，支持开放泛型与封闭
//! - [`ScopeType`] - 作用域标记
//! - [`DependencyError`] - 依赖注入错误分类
//! - [`ConfigSection`] / [`Configurable`] - 配置绑定约定
//!
//! ## 设计原则
//!
//! - 不依赖运行时反射，类型信息由声明表显式提供
//! - 错误在调用路径上同步返回，不做内部重试

pub mod configuration;
pub mod errors;
pub mod lifecycle;
pub mod metadata;

pub use configuration::*;
pub use errors::*;
pub use lifecycle::*;
pub use metadata::*;
