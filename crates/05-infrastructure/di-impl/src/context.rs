//! 作用域上下文
//!
//! 每个作用域由一个上下文管理实例的获取或创建与释放。同一作用域可以登记多个上下文，
//! 但查找时最多只能有一个处于活动状态。

use crate::build_plan::{BuildPlanCache, Publication};
use crate::component::{Component, ComponentId};
use crate::creational::CreationalContext;
use crate::injection::InjectionPoint;
use crate::manager::ComponentManager;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use di_abstractions::ComponentInstance;
use infrastructure_common::{DependencyError, DependencyResult, ScopeType};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 作用域上下文
pub trait Context: Send + Sync {
    /// 管理的作用域
    fn scope(&self) -> &ScopeType;

    /// 是否处于活动状态
    fn is_active(&self) -> bool;

    /// 获取已有实例，不存在时创建
    fn get(
        &self,
        manager: &ComponentManager,
        component: &Arc<Component>,
        creational: &CreationalContext,
        injection_point: Option<&InjectionPoint>,
    ) -> DependencyResult<ComponentInstance>;

    /// 释放实例，由本上下文管理时返回 `true`
    fn release(
        &self,
        _manager: &ComponentManager,
        _component: &Component,
        _instance: &ComponentInstance,
    ) -> DependencyResult<bool> {
        Ok(false)
    }

    /// 销毁本上下文管理的全部实例
    fn clear(&self, _manager: &ComponentManager) -> DependencyResult<()> {
        Ok(())
    }
}

/// 为组件分配稳定的存储槽位
#[derive(Debug, Default)]
pub struct ContextualStore {
    slots: DashMap<ComponentId, usize>,
    next: AtomicUsize,
}

impl ContextualStore {
    /// 创建存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取组件的槽位，不存在时分配
    pub fn put_if_absent(&self, id: &ComponentId) -> usize {
        if let Some(slot) = self.slots.get(id) {
            return *slot;
        }
        *self
            .slots
            .entry(id.clone())
            .or_insert_with(|| self.next.fetch_add(1, Ordering::SeqCst))
    }

    /// 获取组件的槽位
    pub fn slot(&self, id: &ComponentId) -> Option<usize> {
        self.slots.get(id).map(|slot| *slot)
    }

    /// 已分配槽位数量
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// 上下文中保存的实例
#[derive(Clone)]
pub struct StoredInstance {
    /// 组件
    pub component: Arc<Component>,
    /// 实例
    pub instance: ComponentInstance,
    /// 创建实例使用的上下文
    pub creational: CreationalContext,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl StoredInstance {
    /// 实例已存活的时长
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }
}

/// 按槽位保存实例的存储，首个发布的实例胜出
#[derive(Default)]
struct InstanceStore {
    instances: BuildPlanCache<usize, StoredInstance>,
}

impl InstanceStore {
    fn get_or_create(
        &self,
        scope: &ScopeType,
        manager: &ComponentManager,
        component: &Arc<Component>,
        creational: &CreationalContext,
    ) -> DependencyResult<ComponentInstance> {
        let slot = manager.contextual_store().put_if_absent(component.id());
        if let Some(stored) = self.instances.get(&slot) {
            return Ok(stored.instance);
        }

        let instance = component.create(manager, creational)?;
        let stored = StoredInstance {
            component: Arc::clone(component),
            instance,
            creational: creational.clone(),
            created_at: Utc::now(),
        };
        match self.instances.publish(slot, stored) {
            Publication::Won(stored) => {
                debug!(component = %component.id(), scope = %scope, "实例已创建");
                Ok(stored.instance)
            }
            Publication::Lost { winner, rejected } => {
                debug!(component = %component.id(), scope = %scope, "并发创建的实例被丢弃");
                if let Err(e) = manager.destroy_instance(&rejected.component, &rejected.instance, &rejected.creational) {
                    warn!(component = %component.id(), "销毁被丢弃的实例失败: {}", e);
                }
                Ok(winner.instance)
            }
        }
    }

    fn release(
        &self,
        manager: &ComponentManager,
        component: &Component,
        instance: &ComponentInstance,
    ) -> DependencyResult<bool> {
        let Some(slot) = manager.contextual_store().slot(component.id()) else {
            return Ok(false);
        };
        match self
            .instances
            .remove_if(&slot, |stored| Arc::ptr_eq(&stored.instance, instance))
        {
            Some(stored) => {
                stored.creational.release(manager)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn clear(&self, manager: &ComponentManager) -> DependencyResult<()> {
        let mut first_error = None;
        for stored in self.instances.drain() {
            debug!(
                component = %stored.component.id(),
                created_at = %stored.created_at,
                age_ms = stored.age().num_milliseconds(),
                "销毁上下文中的实例"
            );
            if let Err(e) = manager.destroy_instance(&stored.component, &stored.instance, &stored.creational) {
                warn!(component = %stored.component.id(), "销毁实例失败: {}", e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn snapshot(&self) -> Vec<StoredInstance> {
        self.instances.values()
    }
}

/// 依赖作用域上下文：每次获取都创建新实例，实例随注入方一起销毁
#[derive(Debug)]
pub struct DependentContext {
    scope: ScopeType,
}

impl DependentContext {
    /// 创建依赖作用域上下文
    pub fn new() -> Self {
        Self {
            scope: ScopeType::dependent(),
        }
    }
}

impl Default for DependentContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Context for DependentContext {
    fn scope(&self) -> &ScopeType {
        &self.scope
    }

    fn is_active(&self) -> bool {
        true
    }

    fn get(
        &self,
        manager: &ComponentManager,
        component: &Arc<Component>,
        creational: &CreationalContext,
        _injection_point: Option<&InjectionPoint>,
    ) -> DependencyResult<ComponentInstance> {
        let instance = component.create(manager, creational)?;
        creational.register_with_parent(component, &instance);
        Ok(instance)
    }
}

/// 始终活动的共享上下文，用于单例与应用作用域
pub struct SharedContext {
    scope: ScopeType,
    store: InstanceStore,
}

impl SharedContext {
    /// 为指定作用域创建共享上下文
    pub fn new(scope: ScopeType) -> Self {
        Self {
            scope,
            store: InstanceStore::default(),
        }
    }

    /// 单例上下文
    pub fn singleton() -> Self {
        Self::new(ScopeType::singleton())
    }

    /// 应用上下文
    pub fn application() -> Self {
        Self::new(ScopeType::application())
    }

    /// 当前保存的实例
    pub fn instances(&self) -> Vec<StoredInstance> {
        self.store.snapshot()
    }
}

impl Context for SharedContext {
    fn scope(&self) -> &ScopeType {
        &self.scope
    }

    fn is_active(&self) -> bool {
        true
    }

    fn get(
        &self,
        manager: &ComponentManager,
        component: &Arc<Component>,
        creational: &CreationalContext,
        _injection_point: Option<&InjectionPoint>,
    ) -> DependencyResult<ComponentInstance> {
        self.store
            .get_or_create(&self.scope, manager, component, creational)
    }

    fn release(
        &self,
        manager: &ComponentManager,
        component: &Component,
        instance: &ComponentInstance,
    ) -> DependencyResult<bool> {
        self.store.release(manager, component, instance)
    }

    fn clear(&self, manager: &ComponentManager) -> DependencyResult<()> {
        self.store.clear(manager)
    }
}

/// 可激活的上下文，用于请求、会话等动态作用域
pub struct BoundContext {
    scope: ScopeType,
    active: AtomicBool,
    store: InstanceStore,
}

impl BoundContext {
    /// 为指定作用域创建未激活的上下文
    pub fn new(scope: ScopeType) -> Self {
        Self {
            scope,
            active: AtomicBool::new(false),
            store: InstanceStore::default(),
        }
    }

    /// 激活上下文
    pub fn activate(&self) {
        self.active.store(true, Ordering::SeqCst);
        info!(scope = %self.scope, "上下文已激活");
    }

    /// 停用上下文并销毁全部实例
    pub fn deactivate(&self, manager: &ComponentManager) -> DependencyResult<()> {
        self.active.store(false, Ordering::SeqCst);
        info!(scope = %self.scope, "上下文已停用");
        self.store.clear(manager)
    }

    /// 当前保存的实例
    pub fn instances(&self) -> Vec<StoredInstance> {
        self.store.snapshot()
    }
}

impl Context for BoundContext {
    fn scope(&self) -> &ScopeType {
        &self.scope
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn get(
        &self,
        manager: &ComponentManager,
        component: &Arc<Component>,
        creational: &CreationalContext,
        _injection_point: Option<&InjectionPoint>,
    ) -> DependencyResult<ComponentInstance> {
        if !self.is_active() {
            return Err(DependencyError::ContextNotActive {
                scope: self.scope.to_string(),
            });
        }
        self.store
            .get_or_create(&self.scope, manager, component, creational)
    }

    fn release(
        &self,
        manager: &ComponentManager,
        component: &Component,
        instance: &ComponentInstance,
    ) -> DependencyResult<bool> {
        self.store.release(manager, component, instance)
    }

    fn clear(&self, manager: &ComponentManager) -> DependencyResult<()> {
        self.store.clear(manager)
    }
}
