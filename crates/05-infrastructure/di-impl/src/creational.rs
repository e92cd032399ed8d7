//! 创建上下文
//!
//! 每次顶层获取引用都拥有自己的创建上下文，跨越组件边界时派生子上下文。
//! 同一次遍历中的所有上下文共享一条解析链，用于发现构造中的实例被重新进入。

use crate::build_plan::BuildPlanCache;
use crate::component::{Component, ComponentId};
use crate::injection::InjectionPoint;
use crate::manager::ComponentManager;
use di_abstractions::{ComponentInstance, ResolutionChain};
use infrastructure_common::{DependencyError, DependencyResult};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::warn;
use uuid::Uuid;

/// 依附于创建上下文的依赖实例，随上下文释放而销毁
#[derive(Clone)]
pub struct DependentInstance {
    /// 组件
    pub component: Arc<Component>,
    /// 实例
    pub instance: ComponentInstance,
    /// 创建该实例使用的上下文
    pub creational: CreationalContext,
}

type DependentList = Arc<Mutex<Vec<DependentInstance>>>;

/// 创建上下文
#[derive(Clone)]
pub struct CreationalContext {
    inner: Arc<CreationalState>,
}

struct CreationalState {
    id: Uuid,
    contextual: Option<ComponentId>,
    injection_point: Option<InjectionPoint>,
    requesting: Option<InjectionPoint>,
    chain: Arc<Mutex<ResolutionChain>>,
    values: BuildPlanCache<Uuid, ComponentInstance>,
    dependents: DependentList,
    parent_dependents: Option<Weak<Mutex<Vec<DependentInstance>>>>,
    depth: usize,
}

impl CreationalContext {
    /// 创建顶层上下文
    pub fn new(max_depth: usize) -> Self {
        Self::with_chain(
            Arc::new(Mutex::new(ResolutionChain::new(max_depth))),
            None,
            None,
            None,
            None,
            0,
        )
    }

    fn with_chain(
        chain: Arc<Mutex<ResolutionChain>>,
        contextual: Option<ComponentId>,
        injection_point: Option<InjectionPoint>,
        requesting: Option<InjectionPoint>,
        parent_dependents: Option<Weak<Mutex<Vec<DependentInstance>>>>,
        depth: usize,
    ) -> Self {
        Self {
            inner: Arc::new(CreationalState {
                id: Uuid::new_v4(),
                contextual,
                injection_point,
                requesting,
                chain,
                values: BuildPlanCache::new(),
                dependents: Arc::new(Mutex::new(Vec::new())),
                parent_dependents,
                depth,
            }),
        }
    }

    /// 为通过 `injection_point` 注入的组件派生子上下文，共享解析链
    pub fn child(&self, component: &Component, injection_point: Option<InjectionPoint>) -> Self {
        Self::with_chain(
            Arc::clone(&self.inner.chain),
            Some(component.id().clone()),
            injection_point,
            self.inner.injection_point.clone(),
            Some(Arc::downgrade(&self.inner.dependents)),
            self.inner.depth + 1,
        )
    }

    /// 派生使用独立解析链的子上下文，用于在构造完成后通过延迟句柄获取实例
    pub fn fork(&self, component: &Component) -> Self {
        let max_depth = self.inner.chain.lock().max_depth();
        Self::with_chain(
            Arc::new(Mutex::new(ResolutionChain::new(max_depth))),
            Some(component.id().clone()),
            None,
            self.inner.injection_point.clone(),
            Some(Arc::downgrade(&self.inner.dependents)),
            self.inner.depth + 1,
        )
    }

    /// 上下文标识
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// 本上下文正在创建的组件
    pub fn contextual(&self) -> Option<&ComponentId> {
        self.inner.contextual.as_ref()
    }

    /// 本上下文的实例将被注入到的注入点
    pub fn injection_point(&self) -> Option<&InjectionPoint> {
        self.inner.injection_point.as_ref()
    }

    /// 父上下文的实例被注入到的注入点，即注入点元数据的值
    pub fn requesting(&self) -> Option<&InjectionPoint> {
        self.inner.requesting.as_ref()
    }

    /// 派生层级
    pub fn depth(&self) -> usize {
        self.inner.depth
    }

    /// 当前解析链
    pub fn chain(&self) -> Vec<String> {
        self.inner.chain.lock().entries().to_vec()
    }

    /// 标记组件开始构造，守卫释放时移除标记
    pub fn begin_construction(&self, id: &ComponentId) -> DependencyResult<ConstructionGuard> {
        self.inner.chain.lock().push(id.as_str())?;
        Ok(ConstructionGuard {
            chain: Arc::clone(&self.inner.chain),
        })
    }

    /// 同一上下文内只解析一次的注入值
    pub fn cached_value(
        &self,
        key: Uuid,
        compute: impl FnOnce() -> DependencyResult<ComponentInstance>,
    ) -> DependencyResult<ComponentInstance> {
        self.inner.values.get_or_publish(key, compute)
    }

    /// 把实例登记为父上下文的依赖实例
    pub fn register_with_parent(&self, component: &Arc<Component>, instance: &ComponentInstance) {
        let Some(parent) = self.inner.parent_dependents.as_ref().and_then(Weak::upgrade) else {
            return;
        };
        parent.lock().push(DependentInstance {
            component: Arc::clone(component),
            instance: Arc::clone(instance),
            creational: self.clone(),
        });
    }

    /// 依赖实例数量
    pub fn dependents_len(&self) -> usize {
        self.inner.dependents.lock().len()
    }

    /// 从依赖实例中移除指定实例并释放它自己的依赖实例，找到时返回 `true`
    pub fn release_instance(
        &self,
        manager: &ComponentManager,
        instance: &ComponentInstance,
    ) -> DependencyResult<bool> {
        let removed = {
            let mut dependents = self.inner.dependents.lock();
            dependents
                .iter()
                .position(|dependent| Arc::ptr_eq(&dependent.instance, instance))
                .map(|index| dependents.remove(index))
        };
        match removed {
            Some(dependent) => {
                dependent.creational.release(manager)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// 销毁全部依赖实例，返回遇到的第一个错误
    pub fn release(&self, manager: &ComponentManager) -> DependencyResult<()> {
        let dependents = std::mem::take(&mut *self.inner.dependents.lock());
        let mut first_error: Option<DependencyError> = None;
        for dependent in dependents.into_iter().rev() {
            if let Err(e) = manager.destroy_instance(&dependent.component, &dependent.instance, &dependent.creational) {
                warn!(component = %dependent.component.id(), "销毁依赖实例失败: {}", e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl fmt::Debug for CreationalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreationalContext")
            .field("id", &self.inner.id)
            .field("contextual", &self.inner.contextual)
            .field("depth", &self.inner.depth)
            .field("dependents", &self.dependents_len())
            .finish()
    }
}

/// 构造标记守卫
#[must_use]
pub struct ConstructionGuard {
    chain: Arc<Mutex<ResolutionChain>>,
}

impl Drop for ConstructionGuard {
    fn drop(&mut self) {
        self.chain.lock().pop();
    }
}
