//! 注入点
//!
//! 每个注入点在首次使用时计算三个构建计划，并发首次访问时可能重复计算，
//! 但只有一个结果被发布：
//!
//! - 解析计划：注入点解析到的目标组件
//! - 取值计划：普通具体类型在同一创建上下文内缓存，延迟句柄与注入点类型每次重新解析
//! - 注入计划：字段写入目标实例，构造器与方法参数由所属组件统一调用

use crate::build_plan::BuildPlanCell;
use crate::component::{Component, ComponentId};
use crate::creational::CreationalContext;
use crate::manager::ComponentManager;
use di_abstractions::{Arguments, ComponentInstance, FieldInjectorFn, QualifierSet};
use infrastructure_common::{DependencyError, DependencyResult, TypeBindings, TypeRef};
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// 注入点所在的成员
#[derive(Clone)]
pub enum InjectionKind {
    /// 构造器参数
    ConstructorParameter { position: usize },
    /// 注入方法或生产者方法的参数
    MethodParameter { method: Arc<str>, position: usize },
    /// 字段
    Field {
        name: Arc<str>,
        injector: FieldInjectorFn,
    },
    /// 编程式查找，没有声明成员
    Synthetic,
}

impl fmt::Debug for InjectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConstructorParameter { position } => f
                .debug_struct("ConstructorParameter")
                .field("position", position)
                .finish(),
            Self::MethodParameter { method, position } => f
                .debug_struct("MethodParameter")
                .field("method", method)
                .field("position", position)
                .finish(),
            Self::Field { name, .. } => f.debug_struct("Field").field("name", name).finish(),
            Self::Synthetic => f.write_str("Synthetic"),
        }
    }
}

/// 取值计划
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValuePlan {
    /// 同一创建上下文内只解析一次
    Cached,
    /// 每次访问都重新解析
    Fresh,
}

#[derive(Clone)]
enum InjectPlan {
    WriteField(FieldInjectorFn),
    Unsupported,
}

/// 注入点
#[derive(Clone)]
pub struct InjectionPoint {
    inner: Arc<InjectionPointState>,
}

struct InjectionPointState {
    id: Uuid,
    declaring: Option<ComponentId>,
    declaring_concrete: bool,
    ty: TypeRef,
    qualifiers: QualifierSet,
    kind: InjectionKind,
    resolved: BuildPlanCell<Weak<Component>>,
    value_plan: BuildPlanCell<ValuePlan>,
    inject_plan: BuildPlanCell<InjectPlan>,
}

impl InjectionPoint {
    fn from_parts(
        declaring: Option<ComponentId>,
        declaring_concrete: bool,
        ty: TypeRef,
        qualifiers: QualifierSet,
        kind: InjectionKind,
    ) -> Self {
        Self {
            inner: Arc::new(InjectionPointState {
                id: Uuid::new_v4(),
                declaring,
                declaring_concrete,
                ty,
                qualifiers,
                kind,
                resolved: BuildPlanCell::new(),
                value_plan: BuildPlanCell::new(),
                inject_plan: BuildPlanCell::new(),
            }),
        }
    }

    /// 声明在组件上的注入点
    pub(crate) fn declared(
        declaring: &ComponentId,
        declaring_ty: &TypeRef,
        ty: TypeRef,
        qualifiers: QualifierSet,
        kind: InjectionKind,
    ) -> Self {
        Self::from_parts(
            Some(declaring.clone()),
            declaring_ty.is_concrete(),
            ty,
            qualifiers,
            kind,
        )
    }

    /// 编程式查找使用的注入点
    pub fn synthetic(ty: TypeRef, qualifiers: QualifierSet) -> Self {
        Self::from_parts(None, true, ty, qualifiers, InjectionKind::Synthetic)
    }

    /// 注入点标识
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// 声明组件
    pub fn declaring(&self) -> Option<&ComponentId> {
        self.inner.declaring.as_ref()
    }

    /// 请求类型
    pub fn ty(&self) -> &TypeRef {
        &self.inner.ty
    }

    /// 请求的限定符
    pub fn qualifiers(&self) -> &QualifierSet {
        &self.inner.qualifiers
    }

    /// 注入点所在成员
    pub fn kind(&self) -> &InjectionKind {
        &self.inner.kind
    }

    /// 是否为构造器参数
    pub fn is_constructor(&self) -> bool {
        matches!(self.inner.kind, InjectionKind::ConstructorParameter { .. })
    }

    /// 是否为字段
    pub fn is_field(&self) -> bool {
        matches!(self.inner.kind, InjectionKind::Field { .. })
    }

    /// 所属方法名
    pub fn method(&self) -> Option<&str> {
        match &self.inner.kind {
            InjectionKind::MethodParameter { method, .. } => Some(method),
            _ => None,
        }
    }

    /// 参数位置，字段与合成注入点为 0
    pub fn position(&self) -> usize {
        match &self.inner.kind {
            InjectionKind::ConstructorParameter { position }
            | InjectionKind::MethodParameter { position, .. } => *position,
            _ => 0,
        }
    }

    /// 成员名称
    pub fn member_name(&self) -> String {
        match &self.inner.kind {
            InjectionKind::ConstructorParameter { position } => format!("new#{position}"),
            InjectionKind::MethodParameter { method, position } => format!("{method}#{position}"),
            InjectionKind::Field { name, .. } => name.to_string(),
            InjectionKind::Synthetic => "<lookup>".to_string(),
        }
    }

    /// 解析目标组件，结果在首次成功后缓存
    pub fn component(&self, manager: &ComponentManager) -> DependencyResult<Arc<Component>> {
        let resolved = self.inner.resolved.get_or_publish(|| {
            manager
                .resolve_injection_point(self)
                .map(|component| Arc::downgrade(&component))
        })?;
        resolved.upgrade().ok_or(DependencyError::ContainerShutDown)
    }

    /// 取值计划
    pub fn value_plan(&self) -> ValuePlan {
        *self.inner.value_plan.get_or_compute(|| {
            let ty = &self.inner.ty;
            if ty.is_concrete() && !ty.is_instance() && !ty.is_injection_point() {
                ValuePlan::Cached
            } else {
                ValuePlan::Fresh
            }
        })
    }

    /// 获取注入值
    pub fn get_value(
        &self,
        manager: &ComponentManager,
        creational: &CreationalContext,
    ) -> DependencyResult<ComponentInstance> {
        match self.value_plan() {
            ValuePlan::Cached => creational.cached_value(self.id(), || {
                manager.get_injectable_reference(self, creational)
            }),
            ValuePlan::Fresh => manager.get_injectable_reference(self, creational),
        }
    }

    /// 将注入值写入目标实例
    pub fn inject(
        &self,
        manager: &ComponentManager,
        target: &mut (dyn Any + Send + Sync),
        creational: &CreationalContext,
    ) -> DependencyResult<()> {
        let plan = self.inner.inject_plan.get_or_compute(|| match &self.inner.kind {
            InjectionKind::Field { injector, .. } => InjectPlan::WriteField(Arc::clone(injector)),
            _ => InjectPlan::Unsupported,
        });
        match plan {
            InjectPlan::WriteField(injector) => {
                let value = self.get_value(manager, creational)?;
                injector(target, value).map_err(|e| {
                    DependencyError::construction_failed(self.declaring_name(), e)
                })
            }
            InjectPlan::Unsupported => Err(DependencyError::InjectionNotSupported {
                injection_point: self.to_string(),
            }),
        }
    }

    /// 在泛型组件封闭时生成新注入点
    pub fn translate(
        &self,
        declaring: &ComponentId,
        bindings: &TypeBindings,
    ) -> DependencyResult<InjectionPoint> {
        let reason = match &self.inner.kind {
            InjectionKind::Synthetic => Some("编程式查找没有可转换的声明成员"),
            _ if self.inner.declaring_concrete => Some("注入点已属于封闭类型"),
            _ => None,
        };
        if let Some(reason) = reason {
            return Err(DependencyError::TranslationNotSupported {
                injection_point: self.to_string(),
                reason: reason.to_string(),
            });
        }

        Ok(Self::from_parts(
            Some(declaring.clone()),
            true,
            self.inner.ty.substitute(bindings),
            self.inner.qualifiers.clone(),
            self.inner.kind.clone(),
        ))
    }

    fn declaring_name(&self) -> String {
        self.inner
            .declaring
            .as_ref()
            .map_or_else(|| "<lookup>".to_string(), ToString::to_string)
    }
}

/// 按位置顺序解析一组参数注入点
pub(crate) fn resolve_arguments<'a>(
    points: impl IntoIterator<Item = &'a InjectionPoint>,
    manager: &ComponentManager,
    creational: &CreationalContext,
) -> DependencyResult<Arguments> {
    let mut points: Vec<&InjectionPoint> = points.into_iter().collect();
    points.sort_by_key(|point| point.position());
    let values = points
        .into_iter()
        .map(|point| point.get_value(manager, creational))
        .collect::<DependencyResult<Vec<_>>>()?;
    Ok(Arguments::new(values))
}

impl fmt::Display for InjectionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}::{} ({} {})",
            self.declaring_name(),
            self.member_name(),
            self.inner.ty,
            self.inner.qualifiers
        )
    }
}

impl fmt::Debug for InjectionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectionPoint")
            .field("id", &self.inner.id)
            .field("declaring", &self.inner.declaring)
            .field("ty", &self.inner.ty)
            .field("qualifiers", &self.inner.qualifiers)
            .field("kind", &self.inner.kind)
            .finish()
    }
}

impl PartialEq for InjectionPoint {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for InjectionPoint {}
