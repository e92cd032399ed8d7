//! 端到端集成测试：配置加载、部署、请求作用域、外部集成与关闭

use di_abstractions::{
    downcast_instance, BoxError, ComponentProvider, ContainerConfig, Qualifier, QualifierSet,
    TypedComponentProvider,
};
use di_impl::{
    BoundContext, ComponentManager, Environment, Instance, ManagedComponentBuilder,
    ProducerComponentBuilder,
};
use infrastructure_common::{ConfigSection, DependencyError, Lifetime, ScopeType, TypeRef};
use parking_lot::Mutex;
use std::sync::{Arc, Once};

static INIT_LOGGER: Once = Once::new();

fn init_test_logger() {
    INIT_LOGGER.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

const CONTAINER_TOML: &str = r#"
enable_circular_dependency_detection = true
max_resolution_depth = 32
"#;

#[derive(Clone, Default)]
struct Events(Arc<Mutex<Vec<String>>>);

impl Events {
    fn push(&self, event: impl Into<String>) {
        self.0.lock().push(event.into());
    }

    fn snapshot(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

struct Settings {
    url: String,
}

struct DatabaseConfig {
    settings: Option<Arc<Settings>>,
}

struct DataSource {
    url: String,
}

struct UserRepository {
    source: Arc<DataSource>,
}

struct RequestInfo {
    path: String,
}

struct UserService {
    repository: Option<Arc<UserRepository>>,
    request: Option<Arc<RequestInfo>>,
    audit: Option<Arc<Instance>>,
}

struct AuditLog {
    target: &'static str,
}

fn environment(events: &Events) -> Result<Environment, DependencyError> {
    let opened = events.clone();
    let closed = events.clone();
    let initialised = events.clone();
    let configured = events.clone();

    Environment::new()
        .add_value(
            Settings {
                url: "postgres://ads".to_string(),
            },
            QualifierSet::default_set(),
        )?
        .add_managed(
            ManagedComponentBuilder::of(|_| Ok(DatabaseConfig { settings: None }))
                .with_id("database-config")
                .with_lifetime(Lifetime::Singleton)
                .with_field(
                    "settings",
                    TypeRef::of::<Settings>(),
                    QualifierSet::default_set(),
                    |config: &mut DatabaseConfig, value| {
                        config.settings = Some(downcast_instance(value, "settings")?);
                        Ok(())
                    },
                ),
        )?
        .add_producer(
            ProducerComponentBuilder::of(move |declaring, _| {
                let url = declaring
                    .and_then(|config| config.downcast_ref::<DatabaseConfig>())
                    .and_then(|config| config.settings.as_ref())
                    .map(|settings| settings.url.clone())
                    .ok_or_else(|| BoxError::from("数据库配置缺失"))?;
                opened.push(format!("open {url}"));
                Ok(DataSource { url })
            })
            .declared_by("database-config", "data_source")
            .with_scope(ScopeType::application())
            .with_disposer(move |source: &DataSource| {
                closed.push(format!("close {}", source.url));
                Ok(())
            }),
        )?
        .add_managed(
            ManagedComponentBuilder::of(|args| {
                Ok(UserRepository {
                    source: args.get::<DataSource>(0)?,
                })
            })
            .with_id("user-repository")
            .with_lifetime(Lifetime::Singleton)
            .with_constructor_parameter(TypeRef::of::<DataSource>(), QualifierSet::default_set()),
        )?
        .add_managed(
            ManagedComponentBuilder::of(|_| {
                Ok(UserService {
                    repository: None,
                    request: None,
                    audit: None,
                })
            })
            .with_id("user-service")
            .with_scope(ScopeType::request())
            .with_field(
                "repository",
                TypeRef::of::<UserRepository>(),
                QualifierSet::default_set(),
                |service: &mut UserService, value| {
                    service.repository = Some(downcast_instance(value, "repository")?);
                    Ok(())
                },
            )
            .with_field(
                "request",
                TypeRef::of::<RequestInfo>(),
                QualifierSet::default_set(),
                |service: &mut UserService, value| {
                    service.request = Some(downcast_instance(value, "request")?);
                    Ok(())
                },
            )
            .with_field(
                "audit",
                TypeRef::instance_of(TypeRef::of::<AuditLog>()),
                QualifierSet::default_set(),
                |service: &mut UserService, value| {
                    service.audit = Some(downcast_instance(value, "audit")?);
                    Ok(())
                },
            )
            .with_post_construct(move |service: &mut UserService| {
                let path = service.request.as_ref().map_or("", |r| r.path.as_str());
                initialised.push(format!("service ready for {path}"));
                Ok(())
            }),
        )?
        .add_producer(
            ProducerComponentBuilder::of(|_, _| {
                Ok(RequestInfo {
                    path: "/users".to_string(),
                })
            })
            .named("current_request")
            .with_scope(ScopeType::request()),
        )?
        .add_managed(
            ManagedComponentBuilder::of(|_| Ok(AuditLog { target: "console" }))
                .with_id("console-audit")
                .conditional_on_missing(),
        )?
        .add_managed(
            ManagedComponentBuilder::of(|_| Ok(AuditLog { target: "kafka" }))
                .with_id("kafka-audit")
                .with_qualifier(Qualifier::new("Remote")),
        )?
        .add_configuration(ManagedComponentBuilder::of(move |_| {
            configured.push("bootstrap");
            Ok(())
        }))
}

fn bootstrap(events: &Events) -> (Arc<ComponentManager>, Arc<BoundContext>) {
    init_test_logger();
    let config = ContainerConfig::from_toml_str(CONTAINER_TOML).unwrap();
    let manager = ComponentManager::with_config("ad-server", config);
    let request = Arc::new(BoundContext::new(ScopeType::request()));
    manager.add_context(request.clone());
    manager.deploy(environment(events).unwrap()).unwrap();
    (manager, request)
}

/// 测试从配置节加载容器配置
#[test]
fn test_container_config_from_section() {
    let section = ConfigSection::from_value(serde_json::json!({
        "di": {
            "container": {
                "max_resolution_depth": 8,
                "execute_configurations": false
            }
        }
    }));
    let config = ContainerConfig::from_section(&section).unwrap();
    assert_eq!(config.max_resolution_depth, 8);
    assert!(!config.execute_configurations);
    assert!(config.enable_circular_dependency_detection);

    let events = Events::default();
    let manager = ComponentManager::with_config("no-bootstrap", config);
    manager.add_context(Arc::new(BoundContext::new(ScopeType::request())));
    manager.deploy(environment(&events).unwrap()).unwrap();
    assert!(events.snapshot().is_empty());
    assert_eq!(manager.config().max_resolution_depth, 8);
}

/// 测试一次完整的请求：请求作用域实例在请求结束时销毁，共享实例保留到关闭
#[test]
fn test_request_lifecycle() {
    let events = Events::default();
    let (manager, request) = bootstrap(&events);
    assert_eq!(events.snapshot(), vec!["bootstrap"]);
    assert!(manager.is_deployed());

    request.activate();
    let service = manager.get::<UserService>().unwrap();
    let again = manager.get::<UserService>().unwrap();
    assert!(Arc::ptr_eq(&service, &again));

    let repository = service.repository.as_ref().unwrap();
    assert_eq!(repository.source.url, "postgres://ads");
    assert_eq!(service.request.as_ref().unwrap().path, "/users");

    let audit = service.audit.as_ref().unwrap();
    assert_eq!(audit.get_typed::<AuditLog>().unwrap().target, "console");
    let remote = audit.select(&QualifierSet::new([Qualifier::new("Remote")])).unwrap();
    assert_eq!(remote.get_typed::<AuditLog>().unwrap().target, "kafka");

    request.deactivate(&manager).unwrap();
    assert_eq!(request.instances().len(), 0);

    request.activate();
    let next = manager.get::<UserService>().unwrap();
    assert!(!Arc::ptr_eq(&service, &next));
    assert!(Arc::ptr_eq(
        service.repository.as_ref().unwrap(),
        next.repository.as_ref().unwrap()
    ));
    request.deactivate(&manager).unwrap();

    manager.shutdown().unwrap();
    assert_eq!(
        events.snapshot(),
        vec![
            "bootstrap",
            "open postgres://ads",
            "service ready for /users",
            "service ready for /users",
            "close postgres://ads",
        ]
    );
}

/// 测试外部集成只通过组件提供者契约访问容器
#[test]
fn test_provider_contract() {
    let events = Events::default();
    let (manager, request) = bootstrap(&events);
    let provider: Arc<dyn ComponentProvider> = manager.clone();

    assert!(provider.can_resolve(&TypeRef::of::<UserRepository>(), &QualifierSet::default_set()));
    assert!(!provider.can_resolve(&TypeRef::of::<String>(), &QualifierSet::default_set()));

    let repository = provider
        .get_reference_by_type(&TypeRef::of::<UserRepository>(), &QualifierSet::default_set())
        .unwrap();
    assert!(repository.downcast_ref::<UserRepository>().is_some());

    assert!(matches!(
        provider.get::<UserService>(),
        Err(DependencyError::ContextNotActive { .. })
    ));
    request.activate();
    assert!(provider.get::<UserService>().is_ok());

    let stats = manager.stats();
    assert!(stats.deployed);
    assert_eq!(stats.registered_contexts, 4);
    assert!(stats.registered_components >= 9);
}

/// 测试多线程并发处理请求时共享组件只创建一次
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests() {
    let events = Events::default();
    let (manager, _request) = bootstrap(&events);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::task::spawn_blocking(move || manager.get::<UserRepository>())
        })
        .collect();

    let mut repositories = Vec::new();
    for task in tasks {
        repositories.push(task.await.unwrap().unwrap());
    }
    assert!(repositories.iter().all(|r| Arc::ptr_eq(r, &repositories[0])));

    let opened = events
        .snapshot()
        .iter()
        .filter(|e| e.starts_with("open"))
        .count();
    let closed = events
        .snapshot()
        .iter()
        .filter(|e| e.starts_with("close"))
        .count();
    assert_eq!(opened - closed, 1);
}
