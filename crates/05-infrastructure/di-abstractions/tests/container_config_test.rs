//! 容器配置测试

use di_abstractions::ContainerConfig;
use infrastructure_common::{ConfigError, ConfigSection, Configurable};
use serde_json::json;

/// 测试默认配置
#[test]
fn test_default_config() {
    let config = ContainerConfig::default();
    assert!(config.enable_circular_dependency_detection);
    assert_eq!(config.max_resolution_depth, 100);
    assert!(config.validate_discovered_components);
    assert!(config.execute_configurations);
    assert_eq!(ContainerConfig::get_config_path(), "di.container");
}

/// 测试从 TOML 加载，缺省字段使用默认值
#[test]
fn test_from_toml_with_defaults() {
    let config = ContainerConfig::from_toml_str(
        r#"
        max_resolution_depth = 16
        execute_configurations = false
        "#,
    )
    .unwrap();

    assert_eq!(config.max_resolution_depth, 16);
    assert!(!config.execute_configurations);
    assert!(config.enable_circular_dependency_detection);
}

/// 测试无效配置
#[test]
fn test_invalid_toml() {
    assert!(matches!(
        ContainerConfig::from_toml_str("max_resolution_depth = \"deep\""),
        Err(ConfigError::ParseError { .. })
    ));
    assert!(matches!(
        ContainerConfig::from_toml_str("max_resolution_depth = 0"),
        Err(ConfigError::ValidationError { .. })
    ));
}

/// 测试从配置节加载
#[test]
fn test_from_section() {
    let section = ConfigSection::from_value(json!({
        "di": {
            "container": {
                "enable_circular_dependency_detection": false,
                "max_resolution_depth": 32
            }
        }
    }));

    let config = ContainerConfig::from_section(&section).unwrap();
    assert!(!config.enable_circular_dependency_detection);
    assert_eq!(config.max_resolution_depth, 32);
    assert!(config.validate_discovered_components);
}

/// 测试配置节缺少路径时使用默认配置
#[test]
fn test_from_section_missing_path() {
    let config = ContainerConfig::from_section(&ConfigSection::new()).unwrap();
    assert_eq!(config, ContainerConfig::default());
}

/// 测试通过 Configurable 应用配置
#[test]
fn test_configure() {
    let mut config = ContainerConfig::default();
    let update = ContainerConfig {
        max_resolution_depth: 0,
        ..ContainerConfig::default()
    };
    assert!(config.configure(update).is_err());

    let update = ContainerConfig {
        max_resolution_depth: 12,
        ..ContainerConfig::default()
    };
    config.configure(update).unwrap();
    assert_eq!(config.max_resolution_depth, 12);
}
