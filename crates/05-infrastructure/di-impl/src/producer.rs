//! 生产者组件

use crate::component::{Component, ComponentId};
use crate::creational::CreationalContext;
use crate::injection::resolve_arguments;
use crate::manager::ComponentManager;
use di_abstractions::{ComponentInstance, DisposeFn, ProducerFn};
use infrastructure_common::{DependencyError, DependencyResult};
use std::sync::Arc;

/// 通过声明组件的工厂方法获得实例的组件
#[derive(Clone)]
pub struct ProducerComponent {
    declaring: Option<ComponentId>,
    method: Arc<str>,
    factory: ProducerFn,
    disposer: Option<DisposeFn>,
}

impl ProducerComponent {
    pub(crate) fn new(
        declaring: Option<ComponentId>,
        method: Arc<str>,
        factory: ProducerFn,
        disposer: Option<DisposeFn>,
    ) -> Self {
        Self {
            declaring,
            method,
            factory,
            disposer,
        }
    }

    /// 声明组件，静态工厂为 `None`
    pub fn declaring(&self) -> Option<&ComponentId> {
        self.declaring.as_ref()
    }

    /// 工厂方法名
    pub fn method(&self) -> &str {
        &self.method
    }

    pub(crate) fn disposer(&self) -> Option<&DisposeFn> {
        self.disposer.as_ref()
    }

    pub(crate) fn build(
        &self,
        component: &Component,
        manager: &ComponentManager,
        creational: &CreationalContext,
    ) -> DependencyResult<ComponentInstance> {
        let _guard = creational.begin_construction(component.id())?;

        let declaring = match &self.declaring {
            Some(id) => {
                let declaring = manager.registered_component(id)?;
                Some(manager.get_reference(&declaring, &creational.child(&declaring, None))?)
            }
            None => None,
        };
        let arguments = resolve_arguments(component.injection_points(), manager, creational)?;

        (self.factory)(component.ty(), declaring.as_ref(), arguments)
            .map_err(|e| DependencyError::construction_failed(component.id().as_str(), e))
    }
}
