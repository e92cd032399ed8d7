//! # 依赖注入具体实现
//!
//! 类型安全的组件解析与构造引擎。
//!
//! ## 核心组件
//!
//! - [`ComponentManager`] - 部署声明表、解析组件、通过作用域上下文获取实例
//! - [`ManagerHandle`] - 可注入的管理器弱引用句柄，供组件做编程式查找
//! - [`Environment`] - 组件声明表及其构建器
//! - [`TypeSafeResolver`] - 按类型与限定符收窄候选组件，封闭开放泛型组件
//! - [`InjectionPoint`] - 注入点及其取值、注入计划
//! - [`CreationalContext`] - 单次获取引用的创建状态
//! - [`Context`] - 作用域上下文，内置依赖、共享与可激活三种实现
//! - [`BuildPlanCell`] / [`BuildPlanCache`] - 首个发布者胜出的构建计划缓存
//!
//! ## 使用示例
//!
//! ```ignore
//! let environment = Environment::new()
//!     .add_managed(ManagedComponentBuilder::of::<Clock, _>(|_| Ok(Clock::default()))
//!         .with_scope(ScopeType::singleton()))?;
//! let manager = ComponentManager::new("app");
//! manager.deploy(environment)?;
//! let clock = manager.get::<Clock>()?;
//! ```

pub mod build_plan;
pub mod component;
pub mod context;
pub mod creational;
pub mod environment;
pub mod injection;
pub mod instance;
pub mod managed;
pub mod manager;
pub mod producer;
pub mod registry;
pub mod resolver;
pub mod validation;

pub use build_plan::{BuildPlanCache, BuildPlanCell, Publication};
pub use component::{Component, ComponentId, ComponentKind};
pub use context::{
    BoundContext, Context, ContextualStore, DependentContext, SharedContext, StoredInstance,
};
pub use creational::{ConstructionGuard, CreationalContext, DependentInstance};
pub use environment::{Environment, ManagedComponentBuilder, ProducerComponentBuilder};
pub use injection::{InjectionKind, InjectionPoint, ValuePlan};
pub use instance::{Instance, InstanceComponent};
pub use managed::{InjectableMethod, ManagedComponent};
pub use manager::{ComponentManager, ManagerHandle};
pub use producer::ProducerComponent;
pub use registry::ComponentRegistry;
pub use resolver::{resolve_ambiguity, Resolution, TypeSafeResolver};
pub use validation::DependencyValidator;
