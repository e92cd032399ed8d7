//! 托管组件
//!
//! 构建顺序：构造器参数 → 构造器 → 字段 → 注入方法 → 混入钩子 → 构造后钩子。

use crate::component::Component;
use crate::creational::CreationalContext;
use crate::injection::resolve_arguments;
use crate::manager::ComponentManager;
use di_abstractions::{
    ComponentInstance, ConstructorFn, DisposeFn, MethodInjectorFn, MixinHookFn, PostConstructFn,
};
use infrastructure_common::{DependencyError, DependencyResult};
use std::any::Any;
use std::sync::Arc;

/// 注入方法
#[derive(Clone)]
pub struct InjectableMethod {
    name: Arc<str>,
    injector: MethodInjectorFn,
}

impl InjectableMethod {
    pub(crate) fn new(name: Arc<str>, injector: MethodInjectorFn) -> Self {
        Self { name, injector }
    }

    /// 方法名
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// 托管组件的构建回调
#[derive(Clone)]
pub struct ManagedComponent {
    constructor: ConstructorFn,
    methods: Vec<InjectableMethod>,
    post_construct: Vec<PostConstructFn>,
    dispose: Option<DisposeFn>,
    mixin_hook: Option<MixinHookFn>,
}

impl ManagedComponent {
    pub(crate) fn new(
        constructor: ConstructorFn,
        methods: Vec<InjectableMethod>,
        post_construct: Vec<PostConstructFn>,
        dispose: Option<DisposeFn>,
        mixin_hook: Option<MixinHookFn>,
    ) -> Self {
        Self {
            constructor,
            methods,
            post_construct,
            dispose,
            mixin_hook,
        }
    }

    /// 注入方法，按声明顺序
    pub fn methods(&self) -> &[InjectableMethod] {
        &self.methods
    }

    /// 是否声明了销毁钩子
    pub fn is_disposable(&self) -> bool {
        self.dispose.is_some()
    }

    pub(crate) fn dispose_hook(&self) -> Option<&DisposeFn> {
        self.dispose.as_ref()
    }

    pub(crate) fn build(
        &self,
        component: &Component,
        manager: &ComponentManager,
        creational: &CreationalContext,
    ) -> DependencyResult<ComponentInstance> {
        let _guard = creational.begin_construction(component.id())?;

        let arguments = resolve_arguments(
            component
                .injection_points()
                .iter()
                .filter(|point| point.is_constructor()),
            manager,
            creational,
        )?;
        let mut instance = (self.constructor)(component.ty(), arguments)
            .map_err(|e| DependencyError::construction_failed(component.id().as_str(), e))?;

        self.inject_members(component, manager, &mut *instance, creational)?;
        self.post_construct(component, &mut *instance)?;
        Ok(Arc::from(instance))
    }

    /// 字段、注入方法与混入
    pub(crate) fn inject_members(
        &self,
        component: &Component,
        manager: &ComponentManager,
        target: &mut (dyn Any + Send + Sync),
        creational: &CreationalContext,
    ) -> DependencyResult<()> {
        for point in component.injection_points().iter().filter(|p| p.is_field()) {
            point.inject(manager, &mut *target, creational)?;
        }

        for method in &self.methods {
            let arguments = resolve_arguments(
                component
                    .injection_points()
                    .iter()
                    .filter(|point| point.method() == Some(method.name())),
                manager,
                creational,
            )?;
            (method.injector)(&mut *target, arguments)
                .map_err(|e| DependencyError::construction_failed(component.id().as_str(), e))?;
        }

        if let Some(hook) = &self.mixin_hook {
            let mixins = manager
                .get_mixins(component)?
                .iter()
                .map(|mixin| manager.get_reference(mixin, &creational.child(mixin, None)))
                .collect::<DependencyResult<Vec<_>>>()?;
            hook(&mut *target, mixins)
                .map_err(|e| DependencyError::construction_failed(component.id().as_str(), e))?;
        }
        Ok(())
    }

    pub(crate) fn post_construct(
        &self,
        component: &Component,
        target: &mut (dyn Any + Send + Sync),
    ) -> DependencyResult<()> {
        for hook in &self.post_construct {
            hook(&mut *target)
                .map_err(|e| DependencyError::construction_failed(component.id().as_str(), e))?;
        }
        Ok(())
    }
}
