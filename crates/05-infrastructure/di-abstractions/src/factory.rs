//! 组件构造回调
//!
//! 声明表不依赖反射，组件的构造器、字段、方法与钩子都以回调形式登记。
//! 构造阶段实例以 [`PartialInstance`] 独占持有，全部注入完成后才发布为共享的
//! [`ComponentInstance`]。

pub use infrastructure_common::BoxError;
use infrastructure_common::{DependencyError, TypeRef};
use std::any::Any;
use std::sync::Arc;

/// 已发布的组件实例
pub type ComponentInstance = Arc<dyn Any + Send + Sync>;

/// 构造中的组件实例
pub type PartialInstance = Box<dyn Any + Send + Sync>;

/// 构造器：接收封闭后的组件类型与按位置排列的构造参数
pub type ConstructorFn =
    Arc<dyn Fn(&TypeRef, Arguments) -> Result<PartialInstance, BoxError> + Send + Sync>;

/// 字段注入器
pub type FieldInjectorFn =
    Arc<dyn Fn(&mut (dyn Any + Send + Sync), ComponentInstance) -> Result<(), BoxError> + Send + Sync>;

/// 注入方法：以完整参数列表调用一次
pub type MethodInjectorFn =
    Arc<dyn Fn(&mut (dyn Any + Send + Sync), Arguments) -> Result<(), BoxError> + Send + Sync>;

/// 构造后钩子
pub type PostConstructFn =
    Arc<dyn Fn(&mut (dyn Any + Send + Sync)) -> Result<(), BoxError> + Send + Sync>;

/// 混入钩子：接收所有适用混入的实例
pub type MixinHookFn = Arc<
    dyn Fn(&mut (dyn Any + Send + Sync), Vec<ComponentInstance>) -> Result<(), BoxError>
        + Send
        + Sync,
>;

/// 销毁钩子
pub type DisposeFn = Arc<dyn Fn(&ComponentInstance) -> Result<(), BoxError> + Send + Sync>;

/// 首次解析前执行的初始化
pub type TouchFn = Arc<dyn Fn() + Send + Sync>;

/// 生产者工厂：接收封闭后的产品类型、声明组件实例（静态生产者为 `None`）和参数
pub type ProducerFn = Arc<
    dyn Fn(&TypeRef, Option<&ComponentInstance>, Arguments) -> Result<ComponentInstance, BoxError>
        + Send
        + Sync,
>;

/// 按位置排列的注入参数
#[derive(Clone, Default)]
pub struct Arguments {
    values: Vec<ComponentInstance>,
}

impl Arguments {
    /// 创建参数列表
    pub fn new(values: Vec<ComponentInstance>) -> Self {
        Self { values }
    }

    /// 参数数量
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 是否没有参数
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 获取未转换的参数
    pub fn raw(&self, index: usize) -> Result<&ComponentInstance, DependencyError> {
        self.values
            .get(index)
            .ok_or(DependencyError::ArgumentMissing { index })
    }

    /// 获取指定位置的参数并向下转型
    pub fn get<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>, DependencyError> {
        downcast_instance::<T>(self.raw(index)?.clone(), &format!("参数 #{index}"))
    }

    /// 取出全部参数
    pub fn into_inner(self) -> Vec<ComponentInstance> {
        self.values
    }
}

impl std::fmt::Debug for Arguments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arguments")
            .field("len", &self.values.len())
            .finish()
    }
}

/// 将组件实例向下转型为具体类型
pub fn downcast_instance<T: Any + Send + Sync>(
    instance: ComponentInstance,
    origin: &str,
) -> Result<Arc<T>, DependencyError> {
    instance
        .downcast::<T>()
        .map_err(|_| DependencyError::type_mismatch::<T>(origin))
}

/// 将构造中的实例引用转为具体类型
pub fn downcast_partial<'a, T: Any>(
    target: &'a mut (dyn Any + Send + Sync),
    origin: &str,
) -> Result<&'a mut T, BoxError> {
    target
        .downcast_mut::<T>()
        .ok_or_else(|| Box::new(DependencyError::type_mismatch::<T>(origin)) as BoxError)
}
