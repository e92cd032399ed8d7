//! 组件模型
//!
//! 所有组件变体共享同一组能力：按类型解析、构建、初始化（touch）和销毁。
//! 变体之间的差异通过 [`ComponentKind`] 分派。

use crate::build_plan::BuildPlanCache;
use crate::creational::CreationalContext;
use crate::injection::InjectionPoint;
use crate::instance::InstanceComponent;
use crate::managed::ManagedComponent;
use crate::manager::{ComponentManager, ManagerHandle};
use crate::producer::ProducerComponent;
use di_abstractions::{ComponentInstance, QualifierSet, TouchFn};
use infrastructure_common::{DependencyError, DependencyResult, ScopeType, TypeBindings, TypeRef};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// 组件标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(Arc<str>);

impl ComponentId {
    /// 创建组件标识
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// 字符串形式
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ComponentId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// 组件变体
pub enum ComponentKind {
    /// 由构造器创建并注入成员的组件
    Managed(ManagedComponent),
    /// 横切组件，贡献给限定符匹配的托管组件，不参与主解析池
    Mixin(ManagedComponent),
    /// 由声明组件的工厂方法生产
    Producer(ProducerComponent),
    /// 延迟句柄 `Instance<T>`
    Instance(InstanceComponent),
    /// 预先构建的实例
    Value(ComponentInstance),
    /// 注入点元数据
    InjectionPointMetadata,
}

impl ComponentKind {
    fn label(&self) -> &'static str {
        match self {
            Self::Managed(_) => "managed",
            Self::Mixin(_) => "mixin",
            Self::Producer(_) => "producer",
            Self::Instance(_) => "instance",
            Self::Value(_) => "value",
            Self::InjectionPointMetadata => "injection-point",
        }
    }
}

/// 组件
pub struct Component {
    id: ComponentId,
    ty: TypeRef,
    types: Vec<TypeRef>,
    qualifiers: QualifierSet,
    scope: ScopeType,
    conditional_on_missing: bool,
    injection_points: Vec<InjectionPoint>,
    kind: ComponentKind,
    touch: Option<TouchFn>,
    touched: OnceCell<()>,
    closings: BuildPlanCache<TypeRef, Arc<Component>>,
}

/// 组件的组成部分，由声明表构建器填写
pub(crate) struct ComponentParts {
    pub id: ComponentId,
    pub ty: TypeRef,
    pub exposed: Vec<TypeRef>,
    pub qualifiers: QualifierSet,
    pub scope: ScopeType,
    pub conditional_on_missing: bool,
    pub injection_points: Vec<InjectionPoint>,
    pub kind: ComponentKind,
    pub touch: Option<TouchFn>,
}

impl Component {
    pub(crate) fn from_parts(parts: ComponentParts) -> Self {
        let mut types = vec![parts.ty.clone()];
        for exposed in parts.exposed {
            if !types.contains(&exposed) {
                types.push(exposed);
            }
        }
        Self {
            id: parts.id,
            ty: parts.ty,
            types,
            qualifiers: parts.qualifiers,
            scope: parts.scope,
            conditional_on_missing: parts.conditional_on_missing,
            injection_points: parts.injection_points,
            kind: parts.kind,
            touch: parts.touch,
            touched: OnceCell::new(),
            closings: BuildPlanCache::new(),
        }
    }

    /// 内置的注入点元数据组件
    pub(crate) fn injection_point_metadata() -> Self {
        Self::from_parts(ComponentParts {
            id: ComponentId::new(infrastructure_common::INJECTION_POINT_TYPE_NAME),
            ty: TypeRef::injection_point(),
            exposed: Vec::new(),
            qualifiers: QualifierSet::default_set(),
            scope: ScopeType::dependent(),
            conditional_on_missing: false,
            injection_points: Vec::new(),
            kind: ComponentKind::InjectionPointMetadata,
            touch: None,
        })
    }

    /// 内置的管理器句柄组件，供组件注入后做编程式查找
    pub(crate) fn manager_handle(handle: ComponentInstance) -> Self {
        let ty = TypeRef::of::<ManagerHandle>();
        Self::from_parts(ComponentParts {
            id: ComponentId::new(format!("value:{ty}")),
            ty,
            exposed: Vec::new(),
            qualifiers: QualifierSet::default_set(),
            scope: ScopeType::singleton(),
            conditional_on_missing: false,
            injection_points: Vec::new(),
            kind: ComponentKind::Value(handle),
            touch: None,
        })
    }

    /// 延迟句柄组件，包装同一类型的全部匹配组件
    pub(crate) fn instance_wrapper(
        requested: &TypeRef,
        qualifiers: &QualifierSet,
        candidates: Vec<Arc<Component>>,
    ) -> Self {
        let ty = TypeRef::instance_of(requested.clone());
        Self::from_parts(ComponentParts {
            id: ComponentId::new(format!("instance:{ty}{qualifiers}")),
            ty,
            exposed: Vec::new(),
            qualifiers: qualifiers.clone(),
            scope: ScopeType::dependent(),
            conditional_on_missing: false,
            injection_points: Vec::new(),
            kind: ComponentKind::Instance(InstanceComponent::new(
                requested.clone(),
                qualifiers.clone(),
                candidates,
            )),
            touch: None,
        })
    }

    /// 组件标识
    pub fn id(&self) -> &ComponentId {
        &self.id
    }

    /// 声明类型
    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    /// 可赋值的全部类型，第一个是声明类型
    pub fn types(&self) -> &[TypeRef] {
        &self.types
    }

    /// 限定符
    pub fn qualifiers(&self) -> &QualifierSet {
        &self.qualifiers
    }

    /// 作用域
    pub fn scope(&self) -> &ScopeType {
        &self.scope
    }

    /// 声明类型是否不含开放的泛型参数
    pub fn is_concrete(&self) -> bool {
        self.ty.is_concrete()
    }

    /// 是否仅在没有其他候选时生效
    pub fn is_conditional_on_missing(&self) -> bool {
        self.conditional_on_missing
    }

    /// 注入点，按声明顺序
    pub fn injection_points(&self) -> &[InjectionPoint] {
        &self.injection_points
    }

    /// 组件变体
    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    /// 是否为混入组件
    pub fn is_mixin(&self) -> bool {
        matches!(self.kind, ComponentKind::Mixin(_))
    }

    /// 按请求类型解析：类型相同时返回自身，开放泛型可封闭时返回封闭后的组件
    pub fn resolve(self: &Arc<Self>, requested: &TypeRef) -> DependencyResult<Option<Arc<Component>>> {
        if self.is_concrete() {
            return Ok(self.types.contains(requested).then(|| Arc::clone(self)));
        }
        if !requested.is_concrete() {
            return Ok(None);
        }
        for exposed in &self.types {
            let Some(bindings) = exposed.unify(requested) else {
                continue;
            };
            if !bindings.covers(&self.ty) {
                continue;
            }
            let closed_ty = self.ty.substitute(&bindings);
            let closed = self
                .closings
                .get_or_publish(closed_ty, || self.close(&bindings).map(Arc::new))?;
            return Ok(Some(closed));
        }
        Ok(None)
    }

    /// 用泛型参数绑定生成封闭组件
    pub fn close(&self, bindings: &TypeBindings) -> DependencyResult<Component> {
        let kind = match &self.kind {
            ComponentKind::Managed(managed) => ComponentKind::Managed(managed.clone()),
            ComponentKind::Mixin(managed) => ComponentKind::Mixin(managed.clone()),
            ComponentKind::Producer(producer) => ComponentKind::Producer(producer.clone()),
            other => {
                return Err(DependencyError::InvalidDeclaration {
                    component: self.id.to_string(),
                    message: format!("{} 组件不支持封闭泛型参数", other.label()),
                })
            }
        };

        let id = ComponentId::new(format!("{}[{}]", self.id, bindings));
        let injection_points = self
            .injection_points
            .iter()
            .map(|point| point.translate(&id, bindings))
            .collect::<DependencyResult<Vec<_>>>()?;
        debug!(component = %self.id, closed = %id, "封闭泛型组件");

        Ok(Self::from_parts(ComponentParts {
            ty: self.ty.substitute(bindings),
            exposed: self.types[1..]
                .iter()
                .map(|ty| ty.substitute(bindings))
                .collect(),
            id,
            qualifiers: self.qualifiers.clone(),
            scope: self.scope.clone(),
            conditional_on_missing: self.conditional_on_missing,
            injection_points,
            kind,
            touch: self.touch.clone(),
        }))
    }

    /// 首次解析前执行一次初始化
    pub fn touch(&self) {
        if let Some(touch) = &self.touch {
            self.touched.get_or_init(|| touch());
        }
    }

    /// 构建新实例；失败时释放本次构建已创建的依赖实例
    pub fn create(
        &self,
        manager: &ComponentManager,
        creational: &CreationalContext,
    ) -> DependencyResult<ComponentInstance> {
        let result = match &self.kind {
            ComponentKind::Managed(managed) | ComponentKind::Mixin(managed) => {
                managed.build(self, manager, creational)
            }
            ComponentKind::Producer(producer) => producer.build(self, manager, creational),
            ComponentKind::Instance(wrapper) => Ok(wrapper.build(manager, creational)),
            ComponentKind::Value(instance) => Ok(Arc::clone(instance)),
            ComponentKind::InjectionPointMetadata => creational
                .requesting()
                .map(|point| Arc::new(point.clone()) as ComponentInstance)
                .ok_or_else(|| DependencyError::UnsatisfiedDependency {
                    type_name: self.ty.to_string(),
                    qualifiers: self.qualifiers.to_string(),
                    site: "没有正在注入的注入点".to_string(),
                }),
        };

        if let Err(e) = &result {
            match e {
                DependencyError::ConstructionFailed { component, .. }
                    if component == self.id.as_str() =>
                {
                    error!(component = %self.id, "组件创建失败: {}", e)
                }
                _ => debug!(component = %self.id, "依赖创建失败: {}", e),
            }
            if let Err(release_error) = creational.release(manager) {
                warn!(component = %self.id, "回滚依赖实例失败: {}", release_error);
            }
        }
        result
    }

    /// 调用销毁钩子
    pub fn dispose(&self, instance: &ComponentInstance) -> DependencyResult<()> {
        let hook = match &self.kind {
            ComponentKind::Managed(managed) | ComponentKind::Mixin(managed) => managed.dispose_hook(),
            ComponentKind::Producer(producer) => producer.disposer(),
            _ => None,
        };
        match hook {
            Some(hook) => hook(instance).map_err(|e| {
                error!(component = %self.id, "组件销毁失败: {}", e);
                DependencyError::destruction_failed(self.id.as_str(), e)
            }),
            None => Ok(()),
        }
    }

    /// 依赖边：注入点解析到的组件、生产者的声明组件、托管组件的混入
    pub fn dependencies(&self, manager: &ComponentManager) -> DependencyResult<Vec<Arc<Component>>> {
        let mut dependencies = self
            .injection_points
            .iter()
            .map(|point| point.component(manager))
            .collect::<DependencyResult<Vec<_>>>()?;

        match &self.kind {
            ComponentKind::Producer(producer) => {
                if let Some(declaring) = producer.declaring() {
                    dependencies.push(manager.registered_component(declaring)?);
                }
            }
            ComponentKind::Managed(_) => dependencies.extend(manager.get_mixins(self)?),
            _ => {}
        }
        Ok(dependencies)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.id)
            .field("kind", &self.kind.label())
            .field("ty", &self.ty)
            .field("qualifiers", &self.qualifiers)
            .field("scope", &self.scope)
            .field("injection_points", &self.injection_points.len())
            .finish()
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.id, self.qualifiers, self.scope)
    }
}
