//! 声明表
//!
//! 组件的类型、限定符、作用域与注入点都由构建器显式登记，部署时一次性交给
//! [`ComponentManager::deploy`](crate::ComponentManager::deploy)。

use crate::component::{Component, ComponentId, ComponentKind, ComponentParts};
use crate::injection::{InjectionKind, InjectionPoint};
use crate::managed::{InjectableMethod, ManagedComponent};
use crate::producer::ProducerComponent;
use di_abstractions::{
    downcast_partial, Arguments, BoxError, ComponentInstance, ConstructorFn, DisposeFn,
    FieldInjectorFn, MethodInjectorFn, MixinHookFn, PostConstructFn, ProducerFn, Qualifier,
    QualifierSet, TouchFn,
};
use infrastructure_common::{DependencyError, DependencyResult, Lifetime, ScopeType, TypeRef};
use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

type Parameter = (TypeRef, QualifierSet);

/// 部署使用的声明表
#[derive(Default)]
pub struct Environment {
    components: Vec<Component>,
    configurations: Vec<ComponentId>,
    ids: HashSet<ComponentId>,
}

impl Environment {
    /// 创建空的声明表
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加托管组件
    pub fn add_managed(self, builder: ManagedComponentBuilder) -> DependencyResult<Self> {
        let component = builder.build(ComponentKind::Managed)?;
        self.push(component)
    }

    /// 添加混入组件
    pub fn add_mixin(self, builder: ManagedComponentBuilder) -> DependencyResult<Self> {
        let component = builder.build(ComponentKind::Mixin)?;
        self.push(component)
    }

    /// 添加配置组件，部署时获取一次实例以执行其构造与构造后钩子
    pub fn add_configuration(self, builder: ManagedComponentBuilder) -> DependencyResult<Self> {
        let component = builder.build(ComponentKind::Managed)?;
        let id = component.id().clone();
        let mut environment = self.push(component)?;
        environment.configurations.push(id);
        Ok(environment)
    }

    /// 添加生产者组件
    pub fn add_producer(self, builder: ProducerComponentBuilder) -> DependencyResult<Self> {
        let component = builder.build()?;
        self.push(component)
    }

    /// 添加预先构建的值，按值的 Rust 类型解析
    pub fn add_value<T: Any + Send + Sync>(
        self,
        value: T,
        qualifiers: QualifierSet,
    ) -> DependencyResult<Self> {
        self.add_value_as(TypeRef::of::<T>(), qualifiers, Arc::new(value))
    }

    /// 以指定类型添加预先构建的值
    pub fn add_value_as(
        self,
        ty: TypeRef,
        qualifiers: QualifierSet,
        instance: ComponentInstance,
    ) -> DependencyResult<Self> {
        if !ty.is_concrete() {
            return Err(DependencyError::InvalidDeclaration {
                component: ty.to_string(),
                message: "值组件必须是具体类型".to_string(),
            });
        }
        let component = Component::from_parts(ComponentParts {
            id: ComponentId::new(format!("value:{ty}{qualifiers}")),
            ty,
            exposed: Vec::new(),
            qualifiers,
            scope: ScopeType::singleton(),
            conditional_on_missing: false,
            injection_points: Vec::new(),
            kind: ComponentKind::Value(instance),
            touch: None,
        });
        self.push(component)
    }

    /// 组件数量
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// 已登记的组件
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub(crate) fn into_parts(self) -> (Vec<Component>, Vec<ComponentId>) {
        (self.components, self.configurations)
    }

    fn push(mut self, component: Component) -> DependencyResult<Self> {
        if !self.ids.insert(component.id().clone()) {
            return Err(DependencyError::DuplicateComponent {
                id: component.id().to_string(),
            });
        }
        debug!(component = %component.id(), "登记组件声明");
        self.components.push(component);
        Ok(self)
    }
}

fn default_id(ty: &TypeRef, qualifiers: &QualifierSet) -> ComponentId {
    if qualifiers.is_default() {
        ComponentId::new(ty.to_string())
    } else {
        ComponentId::new(format!("{ty}{qualifiers}"))
    }
}

fn check_parameter(
    id: &ComponentId,
    component_ty: &TypeRef,
    parameter_ty: &TypeRef,
) -> DependencyResult<()> {
    let declared = component_ty.params();
    match parameter_ty.params().into_iter().find(|p| !declared.contains(p)) {
        Some(param) => Err(DependencyError::InvalidDeclaration {
            component: id.to_string(),
            message: format!("注入点类型 {parameter_ty} 使用了组件未声明的泛型参数 {param}"),
        }),
        None => Ok(()),
    }
}

/// 托管组件构建器
pub struct ManagedComponentBuilder {
    id: Option<ComponentId>,
    ty: TypeRef,
    exposed: Vec<TypeRef>,
    qualifiers: Vec<Qualifier>,
    scope: ScopeType,
    conditional_on_missing: bool,
    constructor: ConstructorFn,
    constructor_parameters: Vec<Parameter>,
    fields: Vec<(Arc<str>, Parameter, FieldInjectorFn)>,
    methods: Vec<(Arc<str>, Vec<Parameter>, MethodInjectorFn)>,
    post_construct: Vec<PostConstructFn>,
    dispose: Option<DisposeFn>,
    mixin_hook: Option<MixinHookFn>,
    touch: Option<TouchFn>,
}

impl ManagedComponentBuilder {
    /// 以声明类型和构造器创建构建器，构造器接收封闭后的类型
    pub fn new<F>(ty: TypeRef, constructor: F) -> Self
    where
        F: Fn(&TypeRef, Arguments) -> Result<Box<dyn Any + Send + Sync>, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            id: None,
            ty,
            exposed: Vec::new(),
            qualifiers: Vec::new(),
            scope: ScopeType::dependent(),
            conditional_on_missing: false,
            constructor: Arc::new(constructor),
            constructor_parameters: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            post_construct: Vec::new(),
            dispose: None,
            mixin_hook: None,
            touch: None,
        }
    }

    /// 以 Rust 类型 `T` 作为声明类型
    pub fn of<T, F>(constructor: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(Arguments) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self::new(TypeRef::of::<T>(), move |_, arguments| {
            constructor(arguments).map(|instance| Box::new(instance) as Box<dyn Any + Send + Sync>)
        })
    }

    /// 指定组件标识
    pub fn with_id(mut self, id: impl Into<ComponentId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// 添加限定符
    pub fn with_qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifiers.push(qualifier);
        self
    }

    /// 指定作用域
    pub fn with_scope(mut self, scope: ScopeType) -> Self {
        self.scope = scope;
        self
    }

    /// 以生命周期指定作用域
    pub fn with_lifetime(self, lifetime: Lifetime) -> Self {
        self.with_scope(lifetime.into())
    }

    /// 额外暴露的可赋值类型
    pub fn exposing(mut self, ty: TypeRef) -> Self {
        self.exposed.push(ty);
        self
    }

    /// 仅在没有其他候选时生效
    pub fn conditional_on_missing(mut self) -> Self {
        self.conditional_on_missing = true;
        self
    }

    /// 添加构造器参数，位置按添加顺序
    pub fn with_constructor_parameter(mut self, ty: TypeRef, qualifiers: QualifierSet) -> Self {
        self.constructor_parameters.push((ty, qualifiers));
        self
    }

    /// 添加字段注入
    pub fn with_field<T, F>(
        mut self,
        name: impl Into<Arc<str>>,
        ty: TypeRef,
        qualifiers: QualifierSet,
        setter: F,
    ) -> Self
    where
        T: Any,
        F: Fn(&mut T, ComponentInstance) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let name = name.into();
        let origin = name.to_string();
        let injector: FieldInjectorFn = Arc::new(move |target, value| {
            setter(downcast_partial::<T>(target, &origin)?, value)
        });
        self.fields.push((name, (ty, qualifiers), injector));
        self
    }

    /// 添加注入方法，参数解析完成后以完整参数列表调用一次
    pub fn with_method<T, F>(
        mut self,
        name: impl Into<Arc<str>>,
        parameters: impl IntoIterator<Item = (TypeRef, QualifierSet)>,
        method: F,
    ) -> Self
    where
        T: Any,
        F: Fn(&mut T, Arguments) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let name = name.into();
        let origin = name.to_string();
        let injector: MethodInjectorFn = Arc::new(move |target, arguments| {
            method(downcast_partial::<T>(target, &origin)?, arguments)
        });
        self.methods
            .push((name, parameters.into_iter().collect(), injector));
        self
    }

    /// 添加构造后钩子，按添加顺序执行
    pub fn with_post_construct<T, F>(mut self, hook: F) -> Self
    where
        T: Any,
        F: Fn(&mut T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.post_construct.push(Arc::new(move |target| {
            hook(downcast_partial::<T>(target, "post_construct")?)
        }));
        self
    }

    /// 指定销毁钩子
    pub fn with_dispose<T, F>(mut self, hook: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.dispose = Some(Arc::new(move |instance| {
            let target = instance.downcast_ref::<T>().ok_or_else(|| {
                Box::new(DependencyError::type_mismatch::<T>("dispose")) as BoxError
            })?;
            hook(target)
        }));
        self
    }

    /// 指定混入钩子，接收全部适用混入的实例
    pub fn with_mixin_hook<T, F>(mut self, hook: F) -> Self
    where
        T: Any,
        F: Fn(&mut T, Vec<ComponentInstance>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.mixin_hook = Some(Arc::new(move |target, mixins| {
            hook(downcast_partial::<T>(target, "mixin_hook")?, mixins)
        }));
        self
    }

    /// 首次解析前执行一次的初始化
    pub fn with_touch<F>(mut self, touch: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.touch = Some(Arc::new(touch));
        self
    }

    fn build(self, wrap: fn(ManagedComponent) -> ComponentKind) -> DependencyResult<Component> {
        let qualifiers = QualifierSet::new(self.qualifiers);
        let id = self
            .id
            .unwrap_or_else(|| default_id(&self.ty, &qualifiers));

        let mut injection_points = Vec::new();
        for (position, (ty, point_qualifiers)) in self.constructor_parameters.into_iter().enumerate() {
            check_parameter(&id, &self.ty, &ty)?;
            injection_points.push(InjectionPoint::declared(
                &id,
                &self.ty,
                ty,
                point_qualifiers,
                InjectionKind::ConstructorParameter { position },
            ));
        }
        for (name, (ty, point_qualifiers), injector) in self.fields {
            check_parameter(&id, &self.ty, &ty)?;
            injection_points.push(InjectionPoint::declared(
                &id,
                &self.ty,
                ty,
                point_qualifiers,
                InjectionKind::Field { name, injector },
            ));
        }

        let mut methods = Vec::new();
        for (name, parameters, injector) in self.methods {
            if methods.iter().any(|m: &InjectableMethod| m.name() == &*name) {
                return Err(DependencyError::InvalidDeclaration {
                    component: id.to_string(),
                    message: format!("注入方法重复声明: {name}"),
                });
            }
            for (position, (ty, point_qualifiers)) in parameters.into_iter().enumerate() {
                check_parameter(&id, &self.ty, &ty)?;
                injection_points.push(InjectionPoint::declared(
                    &id,
                    &self.ty,
                    ty,
                    point_qualifiers,
                    InjectionKind::MethodParameter {
                        method: Arc::clone(&name),
                        position,
                    },
                ));
            }
            methods.push(InjectableMethod::new(name, injector));
        }

        Ok(Component::from_parts(ComponentParts {
            id,
            ty: self.ty,
            exposed: self.exposed,
            qualifiers,
            scope: self.scope,
            conditional_on_missing: self.conditional_on_missing,
            injection_points,
            kind: wrap(ManagedComponent::new(
                self.constructor,
                methods,
                self.post_construct,
                self.dispose,
                self.mixin_hook,
            )),
            touch: self.touch,
        }))
    }
}

/// 生产者组件构建器
pub struct ProducerComponentBuilder {
    id: Option<ComponentId>,
    ty: TypeRef,
    exposed: Vec<TypeRef>,
    qualifiers: Vec<Qualifier>,
    scope: ScopeType,
    conditional_on_missing: bool,
    declaring: Option<ComponentId>,
    method: Arc<str>,
    factory: ProducerFn,
    parameters: Vec<Parameter>,
    disposer: Option<DisposeFn>,
}

impl ProducerComponentBuilder {
    /// 以产品类型和工厂创建构建器，工厂接收封闭后的产品类型、声明组件实例和参数
    pub fn new<F>(ty: TypeRef, factory: F) -> Self
    where
        F: Fn(&TypeRef, Option<&ComponentInstance>, Arguments) -> Result<ComponentInstance, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            id: None,
            ty,
            exposed: Vec::new(),
            qualifiers: Vec::new(),
            scope: ScopeType::dependent(),
            conditional_on_missing: false,
            declaring: None,
            method: Arc::from("produce"),
            factory: Arc::new(factory),
            parameters: Vec::new(),
            disposer: None,
        }
    }

    /// 以 Rust 类型 `T` 作为产品类型
    pub fn of<T, F>(factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(Option<&ComponentInstance>, Arguments) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self::new(TypeRef::of::<T>(), move |_, declaring, arguments| {
            factory(declaring, arguments).map(|product| Arc::new(product) as ComponentInstance)
        })
    }

    /// 指定声明组件与工厂方法名
    pub fn declared_by(mut self, declaring: impl Into<ComponentId>, method: impl Into<Arc<str>>) -> Self {
        self.declaring = Some(declaring.into());
        self.method = method.into();
        self
    }

    /// 指定静态工厂方法名
    pub fn named(mut self, method: impl Into<Arc<str>>) -> Self {
        self.method = method.into();
        self
    }

    /// 指定组件标识
    pub fn with_id(mut self, id: impl Into<ComponentId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// 添加限定符
    pub fn with_qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifiers.push(qualifier);
        self
    }

    /// 指定作用域
    pub fn with_scope(mut self, scope: ScopeType) -> Self {
        self.scope = scope;
        self
    }

    /// 额外暴露的可赋值类型
    pub fn exposing(mut self, ty: TypeRef) -> Self {
        self.exposed.push(ty);
        self
    }

    /// 仅在没有其他候选时生效
    pub fn conditional_on_missing(mut self) -> Self {
        self.conditional_on_missing = true;
        self
    }

    /// 添加工厂方法参数，位置按添加顺序
    pub fn with_parameter(mut self, ty: TypeRef, qualifiers: QualifierSet) -> Self {
        self.parameters.push((ty, qualifiers));
        self
    }

    /// 指定销毁产品时调用的方法
    pub fn with_disposer<T, F>(mut self, disposer: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.disposer = Some(Arc::new(move |instance| {
            let product = instance.downcast_ref::<T>().ok_or_else(|| {
                Box::new(DependencyError::type_mismatch::<T>("disposer")) as BoxError
            })?;
            disposer(product)
        }));
        self
    }

    fn build(self) -> DependencyResult<Component> {
        let qualifiers = QualifierSet::new(self.qualifiers);
        let id = self.id.unwrap_or_else(|| match &self.declaring {
            Some(declaring) => ComponentId::new(format!("{declaring}::{}", self.method)),
            None => ComponentId::new(format!("{}::{}", default_id(&self.ty, &qualifiers), self.method)),
        });

        let mut injection_points = Vec::new();
        for (position, (ty, point_qualifiers)) in self.parameters.into_iter().enumerate() {
            check_parameter(&id, &self.ty, &ty)?;
            injection_points.push(InjectionPoint::declared(
                &id,
                &self.ty,
                ty,
                point_qualifiers,
                InjectionKind::MethodParameter {
                    method: Arc::clone(&self.method),
                    position,
                },
            ));
        }

        Ok(Component::from_parts(ComponentParts {
            id,
            ty: self.ty,
            exposed: self.exposed,
            qualifiers,
            scope: self.scope,
            conditional_on_missing: self.conditional_on_missing,
            injection_points,
            kind: ComponentKind::Producer(ProducerComponent::new(
                self.declaring,
                self.method,
                self.factory,
                self.disposer,
            )),
            touch: None,
        }))
    }
}
