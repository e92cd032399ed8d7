//! 泛型组件封闭测试

mod common;

use common::init_test_logger;
use di_abstractions::{BoxError, ComponentInstance, ComponentProvider, QualifierSet};
use di_impl::{ComponentId, ComponentManager, Environment, InjectionPoint, ManagedComponentBuilder, ProducerComponentBuilder};
use infrastructure_common::{DependencyError, TypeBindings, TypeRef};
use std::sync::Arc;

struct Store {
    element: String,
}

struct Repository {
    element: String,
    store: Arc<Store>,
}

struct Cache {
    element: String,
}

fn param() -> TypeRef {
    TypeRef::param("T")
}

fn of(name: &str, arg: TypeRef) -> TypeRef {
    TypeRef::generic(name, [arg])
}

fn user() -> TypeRef {
    TypeRef::named("User")
}

fn element(ty: &TypeRef) -> String {
    ty.args().first().map(ToString::to_string).unwrap_or_default()
}

fn store() -> ManagedComponentBuilder {
    ManagedComponentBuilder::new(of("Store", param()), |ty, _| {
        Ok(Box::new(Store { element: element(ty) }))
    })
    .with_id("store")
}

fn repository() -> ManagedComponentBuilder {
    ManagedComponentBuilder::new(of("Repository", param()), |ty, args| {
        Ok(Box::new(Repository {
            element: element(ty),
            store: args.get::<Store>(0)?,
        }))
    })
    .with_id("repository")
    .with_constructor_parameter(of("Store", param()), QualifierSet::default_set())
}

fn deploy(environment: Environment) -> Arc<ComponentManager> {
    init_test_logger();
    let manager = ComponentManager::new("generic-test");
    manager.deploy(environment).unwrap();
    manager
}

fn standard() -> Arc<ComponentManager> {
    deploy(
        Environment::new()
            .add_managed(store())
            .unwrap()
            .add_managed(repository())
            .unwrap(),
    )
}

/// 测试请求封闭类型时生成封闭组件，注入点随之转换
#[test]
fn test_close_generic_component() {
    let manager = standard();
    let ty = of("Repository", user());

    let instance = manager
        .get_reference_by_type(&ty, &QualifierSet::default_set())
        .unwrap();
    let repository = di_abstractions::downcast_instance::<Repository>(instance, "repository").unwrap();
    assert_eq!(repository.element, "User");
    assert_eq!(repository.store.element, "User");

    let component = manager.get_component(&ty, &QualifierSet::default_set()).unwrap();
    assert_eq!(component.id().as_str(), "repository[T=User]");
    assert_eq!(component.ty(), &ty);
    assert!(component.is_concrete());
    assert_eq!(component.injection_points()[0].ty(), &of("Store", user()));

    let ids: Vec<String> = manager
        .all_components()
        .iter()
        .map(|c| c.id().to_string())
        .collect();
    assert!(ids.contains(&"repository[T=User]".to_string()));
    assert!(ids.contains(&"store[T=User]".to_string()));
}

/// 测试同一封闭类型只生成一个组件
#[test]
fn test_closed_component_is_shared() {
    let manager = standard();
    let ty = of("Repository", user());

    let first = manager.get_component(&ty, &QualifierSet::default_set()).unwrap();
    let second = manager.get_component(&ty, &QualifierSet::default_set()).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let other = manager
        .get_component(&of("Repository", TypeRef::named("Order")), &QualifierSet::default_set())
        .unwrap();
    assert_eq!(other.id().as_str(), "repository[T=Order]");
    assert!(!Arc::ptr_eq(&first, &other));
}

/// 测试开放泛型组件不会出现在开放类型的请求结果中
#[test]
fn test_open_request_is_not_resolved() {
    let manager = standard();
    assert!(matches!(
        manager.get_component(&of("Repository", param()), &QualifierSet::default_set()),
        Err(DependencyError::UnsatisfiedDependency { .. })
    ));
}

/// 测试并发请求同一封闭类型：全部得到同一个组件
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_closing() {
    let manager = standard();
    let before = manager.stats().registered_components;

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::task::spawn_blocking(move || {
                manager.get_component(&of("Repository", TypeRef::named("Invoice")), &QualifierSet::default_set())
            })
        })
        .collect();

    let mut components = Vec::new();
    for task in tasks {
        components.push(task.await.unwrap().unwrap());
    }
    assert!(components.iter().all(|c| Arc::ptr_eq(c, &components[0])));
    // 封闭的 Repository 与校验时发现的 Store
    assert_eq!(manager.stats().registered_components, before + 2);
}

/// 测试通过暴露的泛型接口类型封闭组件
#[test]
fn test_close_through_exposed_type() {
    let manager = deploy(
        Environment::new()
            .add_managed(
                ManagedComponentBuilder::new(of("JdbcRepository", param()), |ty, _| {
                    Ok(Box::new(Cache { element: ty.to_string() }))
                })
                .with_id("jdbc")
                .exposing(of("Finder", param())),
            )
            .unwrap(),
    );

    let component = manager
        .get_component(&of("Finder", user()), &QualifierSet::default_set())
        .unwrap();
    assert_eq!(component.id().as_str(), "jdbc[T=User]");
    assert_eq!(component.types(), &[of("JdbcRepository", user()), of("Finder", user())]);

    let instance = manager
        .get_reference_by_type(&of("Finder", user()), &QualifierSet::default_set())
        .unwrap();
    let built = instance.downcast_ref::<Cache>().map(|cache| cache.element.clone());
    assert_eq!(built.as_deref(), Some("JdbcRepository<User>"));
}

/// 测试开放泛型生产者
#[test]
fn test_close_generic_producer() {
    let manager = deploy(
        Environment::new()
            .add_producer(
                ProducerComponentBuilder::new(of("Cache", param()), |ty, _, _| {
                    Ok(Arc::new(Cache { element: element(ty) }) as ComponentInstance)
                })
                .with_id("cache"),
            )
            .unwrap(),
    );

    let ty = of("Cache", user());
    let component = manager.get_component(&ty, &QualifierSet::default_set()).unwrap();
    assert_eq!(component.id().as_str(), "cache[T=User]");

    let instance = manager.get_reference_by_type(&ty, &QualifierSet::default_set()).unwrap();
    let cache = di_abstractions::downcast_instance::<Cache>(instance, "cache").unwrap();
    assert_eq!(cache.element, "User");
}

/// 测试部署后发现的封闭组件同样执行循环依赖校验
#[test]
fn test_discovered_component_is_validated() {
    let manager = deploy(
        Environment::new()
            .add_managed(
                ManagedComponentBuilder::new(of("Node", param()), |_, _| {
                    Err(BoxError::from("不应被构造"))
                })
                .with_id("node")
                .with_constructor_parameter(of("Node", param()), QualifierSet::default_set()),
            )
            .unwrap(),
    );

    let result = manager.get_component(&of("Node", user()), &QualifierSet::default_set());
    match result {
        Err(DependencyError::CircularDependency { chain }) => {
            assert_eq!(chain, vec!["node[T=User]", "node[T=User]"]);
        }
        other => panic!("期望循环依赖错误, 实际: {other:?}"),
    }
}

/// 测试注入点转换的限制
#[test]
fn test_translation_limits() {
    let manager = standard();
    let mut bindings = TypeBindings::new();
    assert!(bindings.bind(Arc::from("T"), user()));

    let synthetic = InjectionPoint::synthetic(of("Store", param()), QualifierSet::default_set());
    assert!(matches!(
        synthetic.translate(&ComponentId::new("x"), &bindings),
        Err(DependencyError::TranslationNotSupported { .. })
    ));

    let closed = manager
        .get_component(&of("Repository", user()), &QualifierSet::default_set())
        .unwrap();
    assert!(matches!(
        closed.injection_points()[0].translate(closed.id(), &bindings),
        Err(DependencyError::TranslationNotSupported { .. })
    ));
}

/// 测试值组件不支持封闭
#[test]
fn test_value_component_cannot_be_closed() {
    let manager = deploy(Environment::new().add_value(7_u8, QualifierSet::default_set()).unwrap());
    let component = manager
        .get_component(&TypeRef::of::<u8>(), &QualifierSet::default_set())
        .unwrap();
    assert!(matches!(
        component.close(&TypeBindings::new()),
        Err(DependencyError::InvalidDeclaration { .. })
    ));
}

/// 测试注入点使用组件未声明的泛型参数
#[test]
fn test_undeclared_parameter_is_rejected() {
    let result = Environment::new().add_managed(
        ManagedComponentBuilder::new(TypeRef::named("Plain"), |_, _| Ok(Box::new(())))
            .with_constructor_parameter(of("Store", param()), QualifierSet::default_set()),
    );
    assert!(matches!(result, Err(DependencyError::InvalidDeclaration { .. })));

    let result = Environment::new().add_producer(
        ProducerComponentBuilder::new(of("Cache", param()), |_, _, _| Ok(Arc::new(()) as ComponentInstance))
            .with_parameter(of("Store", TypeRef::param("U")), QualifierSet::default_set()),
    );
    assert!(matches!(result, Err(DependencyError::InvalidDeclaration { .. })));
}
