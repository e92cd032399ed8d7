//! 托管组件与生产者构造测试

mod common;

use common::{init_test_logger, qualifiers, Journal};
use di_abstractions::{
    downcast_instance, BoxError, ComponentInstance, ContainerConfig, Qualifier, QualifierSet,
    TypedComponentProvider,
};
use di_impl::{ComponentManager, Environment, InjectionPoint, ManagedComponentBuilder, ProducerComponentBuilder};
use infrastructure_common::{DependencyError, ScopeType, TypeRef};
use std::sync::Arc;

struct Part(&'static str);

#[derive(Default)]
struct Service {
    parts: Vec<&'static str>,
    mixins: usize,
}

fn part_ty() -> TypeRef {
    TypeRef::of::<Part>()
}

fn part(journal: &Journal, name: &'static str, kind: &str) -> ManagedComponentBuilder {
    let journal = journal.clone();
    let disposed = journal.clone();
    ManagedComponentBuilder::of(move |_| {
        journal.record(format!("new {name}"));
        Ok(Part(name))
    })
    .with_id(format!("part-{name}"))
    .with_qualifier(Qualifier::new(kind))
    .with_dispose(move |part: &Part| {
        disposed.record(format!("dispose {}", part.0));
        Ok(())
    })
}

fn field_setter(
    journal: &Journal,
    name: &'static str,
) -> impl Fn(&mut Service, ComponentInstance) -> Result<(), BoxError> + Send + Sync + 'static {
    let journal = journal.clone();
    move |service, value| {
        journal.record(name);
        service.parts.push(downcast_instance::<Part>(value, name)?.0);
        Ok(())
    }
}

fn service(journal: &Journal) -> ManagedComponentBuilder {
    let (constructor, method, h0, h1) = (journal.clone(), journal.clone(), journal.clone(), journal.clone());
    ManagedComponentBuilder::of(move |args| {
        constructor.record("constructor");
        Ok(Service {
            parts: vec![args.get::<Part>(0)?.0, args.get::<Part>(1)?.0],
            mixins: 0,
        })
    })
    .with_id("service")
    .with_constructor_parameter(part_ty(), qualifiers(&["P0"]))
    .with_constructor_parameter(part_ty(), qualifiers(&["P1"]))
    .with_field("f0", part_ty(), qualifiers(&["F0"]), field_setter(journal, "f0"))
    .with_field("f1", part_ty(), qualifiers(&["F1"]), field_setter(journal, "f1"))
    .with_method(
        "configure",
        [(part_ty(), qualifiers(&["M0"])), (part_ty(), qualifiers(&["M1"]))],
        move |service: &mut Service, args| {
            method.record("method(m0, m1)");
            service.parts.push(args.get::<Part>(0)?.0);
            service.parts.push(args.get::<Part>(1)?.0);
            Ok(())
        },
    )
    .with_post_construct(move |_: &mut Service| {
        h0.record("h0");
        Ok(())
    })
    .with_post_construct(move |_: &mut Service| {
        h1.record("h1");
        Ok(())
    })
}

fn parts(journal: &Journal) -> Environment {
    [("p0", "P0"), ("p1", "P1"), ("f0", "F0"), ("f1", "F1"), ("m0", "M0"), ("m1", "M1")]
        .into_iter()
        .try_fold(Environment::new(), |env, (name, kind)| env.add_managed(part(journal, name, kind)))
        .unwrap()
}

fn deploy(environment: Environment) -> Arc<ComponentManager> {
    init_test_logger();
    let manager = ComponentManager::new("construction-test");
    manager.deploy(environment).unwrap();
    manager
}

/// 测试构造顺序：构造器 → 字段 → 注入方法 → 构造后钩子
#[test]
fn test_construction_order() {
    let journal = Journal::new();
    let manager = deploy(parts(&journal).add_managed(service(&journal)).unwrap());

    let service = manager.get::<Service>().unwrap();

    assert_eq!(
        journal.entries(),
        vec![
            "new p0",
            "new p1",
            "constructor",
            "new f0",
            "f0",
            "new f1",
            "f1",
            "new m0",
            "new m1",
            "method(m0, m1)",
            "h0",
            "h1",
        ]
    );
    assert_eq!(service.parts, vec!["p0", "p1", "f0", "f1", "m0", "m1"]);
}

/// 测试构造后钩子失败时报告构造失败并销毁已创建的依赖实例
#[test]
fn test_post_construct_failure_rolls_back_dependents() {
    let journal = Journal::new();
    let failing = service(&journal)
        .with_post_construct(|_: &mut Service| Err(BoxError::from("初始化失败")));
    let manager = deploy(parts(&journal).add_managed(failing).unwrap());

    match manager.get::<Service>() {
        Err(DependencyError::ConstructionFailed { component, source }) => {
            assert_eq!(component, "service");
            assert_eq!(source.to_string(), "初始化失败");
        }
        other => panic!("期望构造失败, 实际: {:?}", other.map(|_| ())),
    }
    for name in ["p0", "p1", "f0", "f1", "m0", "m1"] {
        assert_eq!(journal.count(&format!("dispose {name}")), 1, "{name} 应该被销毁一次");
    }
}

/// 测试构造器失败
#[test]
fn test_constructor_failure() {
    struct Broken;
    let manager = deploy(
        Environment::new()
            .add_managed(ManagedComponentBuilder::of(|_| Err::<Broken, _>(BoxError::from("拒绝创建"))).with_id("broken"))
            .unwrap(),
    );

    let result = manager.get::<Broken>();
    assert!(matches!(
        result,
        Err(DependencyError::ConstructionFailed { ref component, .. }) if component == "broken"
    ));
}

/// 测试混入钩子在注入方法之后、构造后钩子之前执行，只接收适用的混入
#[test]
fn test_mixin_hook() {
    struct Audit(&'static str);
    let journal = Journal::new();
    let hook = journal.clone();
    let target = service(&journal).with_mixin_hook(move |service: &mut Service, mixins| {
        hook.record("mixins");
        service.mixins = mixins.len();
        Ok(())
    });

    let environment = parts(&journal)
        .add_managed(target)
        .unwrap()
        .add_mixin(ManagedComponentBuilder::of(|_| Ok(Audit("audit"))).with_id("audit"))
        .unwrap()
        .add_mixin(
            ManagedComponentBuilder::of(|_| Ok(Audit("trace")))
                .with_id("trace")
                .with_qualifier(Qualifier::default_qualifier())
                .with_qualifier(Qualifier::new("Traced")),
        )
        .unwrap()
        .add_mixin(
            ManagedComponentBuilder::of(|_| Ok(Audit("secure")))
                .with_id("secure")
                .with_qualifier(Qualifier::new("Secured")),
        )
        .unwrap();
    let manager = deploy(environment);

    let service = manager.get::<Service>().unwrap();
    assert_eq!(service.mixins, 2);

    let entries = journal.entries();
    let position = |entry: &str| entries.iter().position(|e| e == entry).unwrap();
    assert!(position("method(m0, m1)") < position("mixins"));
    assert!(position("mixins") < position("h0"));

    let component = manager
        .get_component(&TypeRef::of::<Service>(), &QualifierSet::default_set())
        .unwrap();
    let ids: Vec<String> = manager
        .get_mixins(&component)
        .unwrap()
        .iter()
        .map(|mixin| mixin.id().to_string())
        .collect();
    assert_eq!(ids, vec!["audit", "trace"]);
    assert_eq!(manager.stats().mixins, 3);
}

/// 测试对外部创建的实例执行注入：不调用构造器，构造后钩子照常执行
#[test]
fn test_inject_external_instance() {
    let journal = Journal::new();
    let manager = deploy(parts(&journal).add_managed(service(&journal)).unwrap());
    let component = manager
        .get_component(&TypeRef::of::<Service>(), &QualifierSet::default_set())
        .unwrap();

    let mut external = Service::default();
    manager
        .inject(&component, &mut external, &manager.create_creational_context())
        .unwrap();

    assert_eq!(external.parts, vec!["f0", "f1", "m0", "m1"]);
    assert_eq!(journal.count("constructor"), 0);
    assert_eq!(journal.count("h1"), 1);
}

/// 测试构造器参数注入点不支持直接注入
#[test]
fn test_constructor_parameter_injection_not_supported() {
    let journal = Journal::new();
    let manager = deploy(parts(&journal).add_managed(service(&journal)).unwrap());
    let component = manager
        .get_component(&TypeRef::of::<Service>(), &QualifierSet::default_set())
        .unwrap();

    let point = component
        .injection_points()
        .iter()
        .find(|point| point.is_constructor())
        .unwrap();
    let mut target = Service::default();
    let result = point.inject(&manager, &mut target, &manager.create_creational_context());
    assert!(matches!(result, Err(DependencyError::InjectionNotSupported { .. })));
}

struct ConnectionFactory {
    url: &'static str,
}

struct Connection {
    url: &'static str,
}

fn connection_producer(journal: &Journal) -> ProducerComponentBuilder {
    let journal = journal.clone();
    ProducerComponentBuilder::of(|declaring, _| {
        let factory = declaring
            .and_then(|instance| instance.downcast_ref::<ConnectionFactory>())
            .ok_or_else(|| BoxError::from("缺少连接工厂"))?;
        Ok(Connection { url: factory.url })
    })
    .declared_by("connection-factory", "open")
    .with_disposer(move |connection: &Connection| {
        journal.record(format!("close {}", connection.url));
        Ok(())
    })
}

/// 测试生产者通过声明组件创建实例，销毁时调用清理方法一次
#[test]
fn test_producer_with_disposer() {
    let journal = Journal::new();
    let manager = deploy(
        Environment::new()
            .add_managed(
                ManagedComponentBuilder::of(|_| Ok(ConnectionFactory { url: "db://main" }))
                    .with_id("connection-factory")
                    .with_scope(ScopeType::singleton()),
            )
            .unwrap()
            .add_producer(connection_producer(&journal))
            .unwrap(),
    );

    let component = manager
        .get_component(&TypeRef::of::<Connection>(), &QualifierSet::default_set())
        .unwrap();
    assert_eq!(component.id().as_str(), "connection-factory::open");

    let root = manager.create_creational_context();
    let instance = manager
        .get_reference(&component, &root.child(&component, None))
        .unwrap();
    let connection = downcast_instance::<Connection>(Arc::clone(&instance), "connection").unwrap();
    assert_eq!(connection.url, "db://main");
    assert_eq!(root.dependents_len(), 1);

    manager.destroy(&component, &instance, &root).unwrap();
    assert_eq!(journal.count("close db://main"), 1);
    assert_eq!(root.dependents_len(), 0);
}

/// 测试生产者读取注入点元数据
#[test]
fn test_injection_point_metadata() {
    struct CookieValue(String);
    struct Controller {
        session: Option<Arc<CookieValue>>,
    }

    let cookie = ProducerComponentBuilder::of(|_, args| {
        let point = args.get::<InjectionPoint>(0)?;
        let name = point
            .qualifiers()
            .find("Cookie")
            .and_then(|q| q.member("name"))
            .unwrap_or_default()
            .to_string();
        Ok(CookieValue(format!("{name}@{}", point.member_name())))
    })
    .named("cookie")
    .with_qualifier(Qualifier::new("Cookie"))
    .with_parameter(TypeRef::injection_point(), QualifierSet::default_set());

    let controller = ManagedComponentBuilder::of(|_| Ok(Controller { session: None })).with_field(
        "session",
        TypeRef::of::<CookieValue>(),
        QualifierSet::from(Qualifier::new("Cookie").with_member("name", "sid")),
        |controller: &mut Controller, value| {
            controller.session = Some(downcast_instance::<CookieValue>(value, "session")?);
            Ok(())
        },
    );

    let manager = deploy(
        Environment::new()
            .add_producer(cookie)
            .unwrap()
            .add_managed(controller)
            .unwrap(),
    );

    let controller = manager.get::<Controller>().unwrap();
    let session = controller.session.as_ref().unwrap();
    assert_eq!(session.0, "sid@session");
}

/// 测试没有正在注入的注入点时元数据无法满足
#[test]
fn test_injection_point_metadata_without_site() {
    let manager = deploy(Environment::new());
    let result = manager.get::<InjectionPoint>();
    assert!(result.is_err());

    let by_type = manager.get_component(&TypeRef::injection_point(), &QualifierSet::default_set());
    assert!(by_type.is_ok());
}

/// 测试配置组件在部署时执行一次
#[test]
fn test_configuration_runs_once_at_deploy() {
    struct Setup;
    let journal = Journal::new();
    let recorder = journal.clone();
    let environment = Environment::new()
        .add_configuration(ManagedComponentBuilder::of(move |_| {
            recorder.record("configured");
            Ok(Setup)
        }))
        .unwrap();

    let manager = deploy(environment);
    assert!(manager.is_deployed());
    assert_eq!(journal.count("configured"), 1);
}

/// 测试关闭配置执行
#[test]
fn test_configuration_can_be_disabled() {
    struct Setup;
    init_test_logger();
    let journal = Journal::new();
    let recorder = journal.clone();
    let environment = Environment::new()
        .add_configuration(ManagedComponentBuilder::of(move |_| {
            recorder.record("configured");
            Ok(Setup)
        }))
        .unwrap();
    let config = ContainerConfig {
        execute_configurations: false,
        ..ContainerConfig::default()
    };

    let manager = ComponentManager::with_config("no-configurations", config);
    manager.deploy(environment).unwrap();
    assert_eq!(journal.count("configured"), 0);
}

/// 测试预先构建的值组件
#[test]
fn test_value_component() {
    struct Settings {
        name: &'static str,
    }
    let settings: ComponentInstance = Arc::new(Settings { name: "prod" });
    let manager = deploy(
        Environment::new()
            .add_value_as(TypeRef::of::<Settings>(), QualifierSet::default_set(), Arc::clone(&settings))
            .unwrap()
            .add_value(42_u32, qualifiers(&["Answer"]))
            .unwrap(),
    );

    let resolved = manager.get::<Settings>().unwrap();
    assert_eq!(resolved.name, "prod");
    let resolved: ComponentInstance = resolved;
    assert!(Arc::ptr_eq(&resolved, &settings));
    assert_eq!(*manager.get_qualified::<u32>(&qualifiers(&["Answer"])).unwrap(), 42);
}

/// 测试声明表拒绝重复标识与无效值类型
#[test]
fn test_environment_rejects_invalid_declarations() {
    struct Plain;
    let duplicate = Environment::new()
        .add_managed(ManagedComponentBuilder::of(|_| Ok(Plain)))
        .unwrap()
        .add_managed(ManagedComponentBuilder::of(|_| Ok(Plain)));
    assert!(matches!(duplicate, Err(DependencyError::DuplicateComponent { .. })));

    let open_value = Environment::new().add_value_as(
        TypeRef::generic("Box", [TypeRef::param("T")]),
        QualifierSet::default_set(),
        Arc::new(Plain),
    );
    assert!(matches!(open_value, Err(DependencyError::InvalidDeclaration { .. })));

    let duplicate_method = Environment::new().add_managed(
        ManagedComponentBuilder::of(|_| Ok(Plain))
            .with_method("init", [], |_: &mut Plain, _| Ok(()))
            .with_method("init", [], |_: &mut Plain, _| Ok(())),
    );
    assert!(matches!(duplicate_method, Err(DependencyError::InvalidDeclaration { .. })));
}
