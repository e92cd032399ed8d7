//! # Dependency Injection Abstractions
//!
//! 依赖注入抽象层，定义组件声明与解析的公共契约。
//!
//! ## 核心接口
//!
//! - [`QualifierSet`] - 限定符集合
//! - [`ComponentProvider`] - 按类型获取组件实例的容器契约
//! - [`ContainerConfig`] - 容器配置
//! - [`Arguments`] - 构造器与注入方法的参数
//! - [`ResolutionChain`] - 循环依赖检测使用的解析链

pub mod container;
pub mod factory;
pub mod qualifiers;
pub mod resolver;

pub use container::*;
pub use factory::*;
pub use qualifiers::*;
pub use resolver::*;
