//! 延迟句柄
//!
//! 请求 `Instance<T>` 的注入点得到一个 [`Instance`]，由使用方决定何时获取 `T`。

use crate::component::{Component, ComponentKind};
use crate::creational::CreationalContext;
use crate::manager::ComponentManager;
use di_abstractions::{downcast_instance, ComponentInstance, QualifierSet};
use infrastructure_common::{DependencyError, DependencyResult, TypeRef};
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

/// 包装同一类型全部匹配组件的合成组件
pub struct InstanceComponent {
    requested: TypeRef,
    qualifiers: QualifierSet,
    candidates: Vec<Arc<Component>>,
}

impl InstanceComponent {
    pub(crate) fn new(
        requested: TypeRef,
        qualifiers: QualifierSet,
        candidates: Vec<Arc<Component>>,
    ) -> Self {
        Self {
            requested,
            qualifiers,
            candidates,
        }
    }

    /// 被包装的类型
    pub fn requested(&self) -> &TypeRef {
        &self.requested
    }

    /// 匹配的组件
    pub fn candidates(&self) -> &[Arc<Component>] {
        &self.candidates
    }

    pub(crate) fn build(
        &self,
        manager: &ComponentManager,
        creational: &CreationalContext,
    ) -> ComponentInstance {
        Arc::new(Instance {
            manager: manager.downgrade(),
            requested: self.requested.clone(),
            qualifiers: self.qualifiers.clone(),
            candidates: self.candidates.clone(),
            creational: creational.clone(),
        })
    }
}

/// 延迟句柄
#[derive(Clone)]
pub struct Instance {
    manager: Weak<ComponentManager>,
    requested: TypeRef,
    qualifiers: QualifierSet,
    candidates: Vec<Arc<Component>>,
    creational: CreationalContext,
}

impl Instance {
    fn manager(&self) -> DependencyResult<Arc<ComponentManager>> {
        self.manager.upgrade().ok_or(DependencyError::ContainerShutDown)
    }

    /// 被包装的类型
    pub fn requested(&self) -> &TypeRef {
        &self.requested
    }

    /// 请求的限定符
    pub fn qualifiers(&self) -> &QualifierSet {
        &self.qualifiers
    }

    /// 匹配的组件
    pub fn candidates(&self) -> &[Arc<Component>] {
        &self.candidates
    }

    /// 没有匹配的组件
    pub fn is_unsatisfied(&self) -> bool {
        self.candidates.is_empty()
    }

    /// 匹配到多个组件
    pub fn is_ambiguous(&self) -> bool {
        self.candidates.len() > 1
    }

    /// 获取唯一匹配组件的实例
    pub fn get(&self) -> DependencyResult<ComponentInstance> {
        let manager = self.manager()?;
        let component = self.single()?;
        manager.get_reference(component, &self.creational.fork(component))
    }

    /// 获取实例并向下转型
    pub fn get_typed<T: Any + Send + Sync>(&self) -> DependencyResult<Arc<T>> {
        downcast_instance::<T>(self.get()?, &self.requested.to_string())
    }

    /// 按匹配顺序获取全部实例
    pub fn get_all(&self) -> DependencyResult<Vec<ComponentInstance>> {
        let manager = self.manager()?;
        self.candidates
            .iter()
            .map(|component| manager.get_reference(component, &self.creational.fork(component)))
            .collect()
    }

    /// 追加限定符后重新解析
    pub fn select(&self, qualifiers: &QualifierSet) -> DependencyResult<Instance> {
        let manager = self.manager()?;
        let qualifiers = self.qualifiers.union(qualifiers);
        let wrapper = manager.get_component(&TypeRef::instance_of(self.requested.clone()), &qualifiers)?;
        let ComponentKind::Instance(wrapped) = wrapper.kind() else {
            return Err(DependencyError::TypeMismatch {
                expected: TypeRef::instance_of(self.requested.clone()).to_string(),
                actual: wrapper.ty().to_string(),
            });
        };
        Ok(Self {
            manager: self.manager.clone(),
            requested: self.requested.clone(),
            qualifiers,
            candidates: wrapped.candidates().to_vec(),
            creational: self.creational.clone(),
        })
    }

    /// 销毁通过本句柄获得的实例
    pub fn destroy(&self, instance: &ComponentInstance) -> DependencyResult<()> {
        let manager = self.manager()?;
        let component = self.single()?;
        manager.destroy(component, instance, &self.creational)
    }

    fn single(&self) -> DependencyResult<&Arc<Component>> {
        match self.candidates.as_slice() {
            [component] => Ok(component),
            [] => Err(DependencyError::UnsatisfiedDependency {
                type_name: self.requested.to_string(),
                qualifiers: self.qualifiers.to_string(),
                site: "Instance::get".to_string(),
            }),
            candidates => Err(DependencyError::AmbiguousDependency {
                type_name: self.requested.to_string(),
                qualifiers: self.qualifiers.to_string(),
                site: "Instance::get".to_string(),
                candidates: candidates.iter().map(|c| c.id().to_string()).collect(),
            }),
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("requested", &self.requested)
            .field("qualifiers", &self.qualifiers)
            .field(
                "candidates",
                &self
                    .candidates
                    .iter()
                    .map(|c| c.id().as_str())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
