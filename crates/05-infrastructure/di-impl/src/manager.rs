//! 组件管理器
//!
//! 协调组件解析、运行时发现、作用域上下文查找、创建上下文传递和部署期校验。

use crate::build_plan::{BuildPlanCache, BuildPlanCell, Publication};
use crate::component::{Component, ComponentId, ComponentKind};
use crate::context::{Context, ContextualStore, DependentContext, SharedContext};
use crate::creational::CreationalContext;
use crate::environment::Environment;
use crate::injection::InjectionPoint;
use crate::instance::Instance;
use crate::registry::ComponentRegistry;
use crate::resolver::TypeSafeResolver;
use crate::validation::DependencyValidator;
use dashmap::DashMap;
use di_abstractions::{
    downcast_instance, ComponentInstance, ComponentProvider, ContainerConfig, ContainerStats,
    QualifierSet,
};
use infrastructure_common::{DependencyError, DependencyResult, ScopeType, TypeRef};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// 组件管理器
pub struct ComponentManager {
    id: String,
    config: ContainerConfig,
    self_ref: Weak<ComponentManager>,
    registry: ComponentRegistry,
    resolver: TypeSafeResolver,
    pool: BuildPlanCell<Arc<[Arc<Component>]>>,
    mixins: BuildPlanCell<Arc<[Arc<Component>]>>,
    applied_mixins: BuildPlanCache<ComponentId, Arc<[Arc<Component>]>>,
    contexts: DashMap<ScopeType, Vec<Arc<dyn Context>>>,
    contextual_store: ContextualStore,
    deploying: AtomicBool,
    deployed: AtomicBool,
    aborted: AtomicBool,
}

impl ComponentManager {
    /// 使用默认配置创建管理器
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        Self::with_config(id, ContainerConfig::default())
    }

    /// 使用指定配置创建管理器，并登记依赖、单例与应用作用域的上下文
    pub fn with_config(id: impl Into<String>, config: ContainerConfig) -> Arc<Self> {
        let manager = Arc::new_cyclic(|self_ref| Self {
            id: id.into(),
            config,
            self_ref: self_ref.clone(),
            registry: ComponentRegistry::new(),
            resolver: TypeSafeResolver::new(),
            pool: BuildPlanCell::new(),
            mixins: BuildPlanCell::new(),
            applied_mixins: BuildPlanCache::new(),
            contexts: DashMap::new(),
            contextual_store: ContextualStore::new(),
            deploying: AtomicBool::new(false),
            deployed: AtomicBool::new(false),
            aborted: AtomicBool::new(false),
        });
        manager.add_context(Arc::new(DependentContext::new()));
        manager.add_context(Arc::new(SharedContext::singleton()));
        manager.add_context(Arc::new(SharedContext::application()));
        info!(manager = %manager.id, "组件管理器已创建");
        manager
    }

    /// 管理器标识
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 容器配置
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// 是否已部署
    pub fn is_deployed(&self) -> bool {
        self.deployed.load(Ordering::SeqCst)
    }

    /// 部署是否因错误中止，中止后管理器不再解析任何组件
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    pub(crate) fn downgrade(&self) -> Weak<Self> {
        self.self_ref.clone()
    }

    /// 可注入的管理器句柄
    pub fn handle(&self) -> ManagerHandle {
        ManagerHandle {
            manager: self.downgrade(),
        }
    }

    /// 组件存储槽位
    pub fn contextual_store(&self) -> &ContextualStore {
        &self.contextual_store
    }

    /// 登记作用域上下文
    pub fn add_context(&self, context: Arc<dyn Context>) {
        let scope = context.scope().clone();
        info!(manager = %self.id, scope = %scope, "登记上下文");
        self.contexts.entry(scope).or_default().push(context);
    }

    /// 查找作用域唯一的活动上下文
    pub fn get_context(&self, scope: &ScopeType) -> DependencyResult<Arc<dyn Context>> {
        let registered = self
            .contexts
            .get(scope)
            .map(|contexts| contexts.clone())
            .unwrap_or_default();
        let active: Vec<_> = registered
            .into_iter()
            .filter(|context| context.is_active())
            .collect();
        match active.as_slice() {
            [context] => Ok(Arc::clone(context)),
            [] => Err(DependencyError::ContextNotActive {
                scope: scope.to_string(),
            }),
            many => Err(DependencyError::DuplicateActiveContext {
                scope: scope.to_string(),
                count: many.len(),
            }),
        }
    }

    /// 部署声明表
    ///
    /// 把组件分为混入与主解析池，校验全部组件，执行配置组件后标记为已部署。
    /// 部署失败后管理器进入中止状态，之后的解析全部返回 [`DependencyError::DeploymentAborted`]。
    pub fn deploy(&self, environment: Environment) -> DependencyResult<()> {
        if self.is_aborted() {
            return Err(DependencyError::DeploymentAborted {
                id: self.id.clone(),
            });
        }
        if self
            .deploying
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(DependencyError::AlreadyDeployed {
                id: self.id.clone(),
            });
        }
        info!(manager = %self.id, "开始部署");

        self.deploy_environment(environment).map_err(|e| {
            self.aborted.store(true, Ordering::SeqCst);
            error!(manager = %self.id, "部署中止: {}", e);
            e
        })
    }

    fn deploy_environment(&self, environment: Environment) -> DependencyResult<()> {
        let (components, configurations) = environment.into_parts();
        let (mixins, mut primary): (Vec<_>, Vec<_>) = components
            .into_iter()
            .map(Arc::new)
            .partition(|component| component.is_mixin());
        primary.push(Arc::new(Component::injection_point_metadata()));
        primary.push(Arc::new(Component::manager_handle(Arc::new(self.handle()))));

        for component in mixins.iter().chain(primary.iter()) {
            if !self.registry.register(Arc::clone(component)).is_won() {
                return Err(DependencyError::DuplicateComponent {
                    id: component.id().to_string(),
                });
            }
            self.contextual_store.put_if_absent(component.id());
        }

        let pool_size = primary.len();
        let mixin_count = mixins.len();
        if !self.pool.publish(Arc::from(primary)).is_won()
            || !self.mixins.publish(Arc::from(mixins)).is_won()
        {
            return Err(DependencyError::AlreadyDeployed {
                id: self.id.clone(),
            });
        }

        if self.config.enable_circular_dependency_detection {
            let mut validator = DependencyValidator::new(self);
            validator.validate_all(self.pool()?.iter())?;
            validator.validate_all(self.deployed_mixins()?.iter())?;
        } else {
            warn!(manager = %self.id, "循环依赖检测已关闭");
        }

        if self.config.execute_configurations {
            for id in &configurations {
                let component = self.registered_component(id)?;
                self.get_reference(&component, &self.create_creational_context())?;
                debug!(component = %id, "配置组件已执行");
            }
        }

        self.deployed.store(true, Ordering::SeqCst);
        info!(
            manager = %self.id,
            components = pool_size,
            mixins = mixin_count,
            configurations = configurations.len(),
            "部署完成"
        );
        Ok(())
    }

    fn ensure_serving(&self) -> DependencyResult<()> {
        if self.is_aborted() {
            return Err(DependencyError::DeploymentAborted {
                id: self.id.clone(),
            });
        }
        Ok(())
    }

    fn pool(&self) -> DependencyResult<&Arc<[Arc<Component>]>> {
        self.ensure_serving()?;
        self.pool.get().ok_or(DependencyError::NotDeployed)
    }

    fn deployed_mixins(&self) -> DependencyResult<&Arc<[Arc<Component>]>> {
        self.ensure_serving()?;
        self.mixins.get().ok_or(DependencyError::NotDeployed)
    }

    /// 解析请求类型的全部组件，新发现的组件登记到注册表
    pub fn get_components(
        &self,
        ty: &TypeRef,
        qualifiers: &QualifierSet,
    ) -> DependencyResult<Vec<Arc<Component>>> {
        let resolution = self.resolver.resolve(self.pool()?, ty, qualifiers)?;
        let matched = resolution
            .matched
            .iter()
            .map(|component| self.register_discovered(component))
            .collect::<DependencyResult<Vec<_>>>()?;
        match &resolution.wrapper {
            Some(wrapper) => Ok(vec![self.register_discovered(wrapper)?]),
            None => Ok(matched),
        }
    }

    /// 解析请求类型的唯一组件
    pub fn get_component(
        &self,
        ty: &TypeRef,
        qualifiers: &QualifierSet,
    ) -> DependencyResult<Arc<Component>> {
        let components = self.get_components(ty, qualifiers)?;
        select_one(components, ty, qualifiers, "编程式查找")
    }

    pub(crate) fn resolve_injection_point(
        &self,
        point: &InjectionPoint,
    ) -> DependencyResult<Arc<Component>> {
        let components = self.get_components(point.ty(), point.qualifiers())?;
        select_one(components, point.ty(), point.qualifiers(), &point.to_string())
    }

    fn register_discovered(&self, component: &Arc<Component>) -> DependencyResult<Arc<Component>> {
        if let Some(existing) = self.registry.get(component.id()) {
            return Ok(existing);
        }
        match self.registry.register(Arc::clone(component)) {
            Publication::Won(component) => {
                self.contextual_store.put_if_absent(component.id());
                debug!(component = %component.id(), "发现新组件");
                if self.is_deployed()
                    && self.config.validate_discovered_components
                    && self.config.enable_circular_dependency_detection
                {
                    DependencyValidator::new(self).validate(&component)?;
                }
                Ok(component)
            }
            Publication::Lost { winner, .. } => Ok(winner),
        }
    }

    /// 按标识获取已登记的组件
    pub fn registered_component(&self, id: &ComponentId) -> DependencyResult<Arc<Component>> {
        self.registry
            .get(id)
            .ok_or_else(|| DependencyError::InvalidDeclaration {
                component: id.to_string(),
                message: "组件未登记".to_string(),
            })
    }

    /// 应用到托管组件上的混入，混入的限定符必须覆盖组件的限定符
    pub fn get_mixins(&self, component: &Component) -> DependencyResult<Vec<Arc<Component>>> {
        if !matches!(component.kind(), ComponentKind::Managed(_)) {
            return Ok(Vec::new());
        }
        let mixins = self.deployed_mixins()?;
        let applied = self
            .applied_mixins
            .get_or_publish(component.id().clone(), || {
                Ok::<_, DependencyError>(
                    mixins
                        .iter()
                        .filter(|mixin| {
                            mixin.is_concrete()
                                && mixin.qualifiers().can_satisfy(component.qualifiers())
                        })
                        .cloned()
                        .collect::<Vec<_>>()
                        .into(),
                )
            })?;
        Ok(applied.to_vec())
    }

    /// 创建顶层创建上下文
    pub fn create_creational_context(&self) -> CreationalContext {
        CreationalContext::new(self.config.max_resolution_depth)
    }

    /// 通过组件作用域的活动上下文获取或创建实例
    pub fn get_reference(
        &self,
        component: &Arc<Component>,
        creational: &CreationalContext,
    ) -> DependencyResult<ComponentInstance> {
        self.ensure_serving()?;
        let context = self.get_context(component.scope())?;
        context.get(self, component, creational, creational.injection_point())
    }

    /// 获取注入点的值
    pub fn get_injectable_reference(
        &self,
        point: &InjectionPoint,
        creational: &CreationalContext,
    ) -> DependencyResult<ComponentInstance> {
        let component = point.component(self)?;
        let child = creational.child(&component, Some(point.clone()));
        self.get_reference(&component, &child)
    }

    /// 获取延迟句柄
    pub fn instance(&self, ty: &TypeRef, qualifiers: &QualifierSet) -> DependencyResult<Arc<Instance>> {
        let handle = self.get_reference_by_type(&TypeRef::instance_of(ty.clone()), qualifiers)?;
        downcast_instance::<Instance>(handle, "Instance")
    }

    /// 对外部创建的托管组件实例执行字段与方法注入，随后执行构造后钩子
    pub fn inject(
        &self,
        component: &Component,
        target: &mut (dyn Any + Send + Sync),
        creational: &CreationalContext,
    ) -> DependencyResult<()> {
        match component.kind() {
            ComponentKind::Managed(managed) => {
                managed.inject_members(component, self, &mut *target, creational)?;
                managed.post_construct(component, target)
            }
            _ => Err(DependencyError::InvalidDeclaration {
                component: component.id().to_string(),
                message: "只有托管组件支持外部实例注入".to_string(),
            }),
        }
    }

    /// 销毁实例：调用销毁钩子，再从所属上下文释放
    ///
    /// 上下文不管理该实例时，从 `creational` 的依赖实例中移除它并释放它自己的依赖。
    /// 实例不在其中时，只有当 `creational` 是顶层上下文或正是创建该组件的上下文，
    /// 才释放 `creational` 的全部依赖实例；其他上下文中的兄弟实例保持不变。
    pub fn destroy(
        &self,
        component: &Component,
        instance: &ComponentInstance,
        creational: &CreationalContext,
    ) -> DependencyResult<()> {
        component.dispose(instance)?;
        let released = match self.get_context(component.scope()) {
            Ok(context) => context.release(self, component, instance)?,
            Err(e) => {
                debug!(component = %component.id(), "上下文不可用，改由创建上下文释放: {}", e);
                false
            }
        };
        if released || creational.release_instance(self, instance)? {
            return Ok(());
        }
        if creational.contextual().map_or(true, |id| id == component.id()) {
            creational.release(self)
        } else {
            warn!(
                component = %component.id(),
                creational = ?creational.contextual(),
                "创建上下文不属于该实例，跳过释放依赖实例"
            );
            Ok(())
        }
    }

    pub(crate) fn destroy_instance(
        &self,
        component: &Component,
        instance: &ComponentInstance,
        creational: &CreationalContext,
    ) -> DependencyResult<()> {
        component.dispose(instance)?;
        creational.release(self)
    }

    /// 组件作用域是否需要代理
    pub fn is_proxy_required(&self, component: &Component) -> bool {
        component.scope().is_normal()
    }

    /// 按登记顺序返回全部组件
    pub fn all_components(&self) -> Vec<Arc<Component>> {
        self.registry.all()
    }

    /// 统计信息
    pub fn stats(&self) -> ContainerStats {
        ContainerStats {
            registered_components: self.registry.len(),
            mixins: self.mixins.get().map_or(0, |mixins| mixins.len()),
            resolved_types: self.resolver.cached_types(),
            registered_contexts: self.contexts.iter().map(|entry| entry.value().len()).sum(),
            deployed: self.is_deployed(),
        }
    }

    /// 销毁全部上下文中的实例
    pub fn shutdown(&self) -> DependencyResult<()> {
        info!(manager = %self.id, "关闭组件管理器");
        let contexts: Vec<Arc<dyn Context>> = self
            .contexts
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect();
        let mut first_error = None;
        for context in contexts {
            if let Err(e) = context.clear(self) {
                warn!(scope = %context.scope(), "清理上下文失败: {}", e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl ComponentProvider for ComponentManager {
    fn get_reference_by_type(
        &self,
        ty: &TypeRef,
        qualifiers: &QualifierSet,
    ) -> DependencyResult<ComponentInstance> {
        let point = InjectionPoint::synthetic(ty.clone(), qualifiers.clone());
        self.get_injectable_reference(&point, &self.create_creational_context())
    }

    fn can_resolve(&self, ty: &TypeRef, qualifiers: &QualifierSet) -> bool {
        self.get_component(ty, qualifiers).is_ok()
    }
}

/// 可注入的管理器句柄
///
/// 只持有管理器的弱引用，组件保存句柄不会延长管理器的生命周期。管理器释放后
/// 查找返回 [`DependencyError::ContainerShutDown`]。
#[derive(Clone)]
pub struct ManagerHandle {
    manager: Weak<ComponentManager>,
}

impl ManagerHandle {
    /// 获取管理器
    pub fn manager(&self) -> DependencyResult<Arc<ComponentManager>> {
        self.manager.upgrade().ok_or(DependencyError::ContainerShutDown)
    }
}

impl fmt::Debug for ManagerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.manager.upgrade().map(|manager| manager.id.clone());
        f.debug_struct("ManagerHandle").field("manager", &id).finish()
    }
}

impl ComponentProvider for ManagerHandle {
    fn get_reference_by_type(
        &self,
        ty: &TypeRef,
        qualifiers: &QualifierSet,
    ) -> DependencyResult<ComponentInstance> {
        self.manager()?.get_reference_by_type(ty, qualifiers)
    }

    fn can_resolve(&self, ty: &TypeRef, qualifiers: &QualifierSet) -> bool {
        self.manager()
            .map(|manager| manager.can_resolve(ty, qualifiers))
            .unwrap_or(false)
    }
}

fn select_one(
    mut components: Vec<Arc<Component>>,
    ty: &TypeRef,
    qualifiers: &QualifierSet,
    site: &str,
) -> DependencyResult<Arc<Component>> {
    match components.len() {
        1 => Ok(components.remove(0)),
        0 => Err(DependencyError::UnsatisfiedDependency {
            type_name: ty.to_string(),
            qualifiers: qualifiers.to_string(),
            site: site.to_string(),
        }),
        _ => Err(DependencyError::AmbiguousDependency {
            type_name: ty.to_string(),
            qualifiers: qualifiers.to_string(),
            site: site.to_string(),
            candidates: components.iter().map(|c| c.id().to_string()).collect(),
        }),
    }
}
