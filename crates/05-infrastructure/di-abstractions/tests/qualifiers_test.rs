//! 限定符集合测试

use di_abstractions::{Qualifier, QualifierSet, DEFAULT_QUALIFIER};

fn named(kind: &str) -> Qualifier {
    Qualifier::new(kind)
}

/// 测试空集合自动包含默认限定符
#[test]
fn test_empty_set_contains_default() {
    let set = QualifierSet::new([]);
    assert_eq!(set.len(), 1);
    assert!(set.is_default());
    assert!(!set.is_empty());
    assert!(set.contains_kind(DEFAULT_QUALIFIER));
    assert_eq!(set, QualifierSet::default());
}

/// 测试超集判断只比较种类
#[test]
fn test_can_satisfy_by_kind() {
    let held = QualifierSet::new([named("Primary"), named("Cookie").with_member("name", "sid")]);

    assert!(held.can_satisfy(&QualifierSet::new([named("Cookie")])));
    assert!(held.can_satisfy(&QualifierSet::new([named("Primary"), named("Cookie")])));
    assert!(!held.can_satisfy(&QualifierSet::new([named("Secondary")])));
    assert!(!held.can_satisfy(&QualifierSet::default_set()));
}

/// 测试任意子集都能被满足
#[test]
fn test_every_subset_is_satisfied() {
    let kinds = ["Default", "Primary", "Audited"];
    let held = QualifierSet::new(kinds.iter().map(|k| named(k)));

    for mask in 1..(1 << kinds.len()) {
        let subset = QualifierSet::new(
            kinds
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, k)| named(k)),
        );
        assert!(held.can_satisfy(&subset), "子集 {subset} 应该被满足");
    }
}

/// 测试派生集合不修改原集合
#[test]
fn test_with_derives_new_set() {
    let base = QualifierSet::default_set();
    let derived = base.with(named("Primary"));

    assert_eq!(base.len(), 1);
    assert_eq!(derived.len(), 2);
    assert!(derived.contains_kind("Primary"));
    assert!(derived.can_satisfy(&base));
}

/// 测试合并时忽略默认限定符
#[test]
fn test_union_drops_default() {
    let left = QualifierSet::new([named("Primary")]);
    let right = QualifierSet::default_set().with(named("Audited"));

    let merged = left.union(&right);
    assert_eq!(merged.len(), 2);
    assert!(!merged.contains_kind(DEFAULT_QUALIFIER));

    let defaults = QualifierSet::default_set().union(&QualifierSet::default_set());
    assert!(defaults.is_default());
}

/// 测试成员值读取与显示
#[test]
fn test_members_and_display() {
    let cookie = named("Cookie").with_member("name", "sid");
    let set = QualifierSet::from(cookie);

    assert_eq!(set.find("Cookie").and_then(|q| q.member("name")), Some("sid"));
    assert_eq!(set.to_string(), "[@Cookie(name=sid)]");
    assert_eq!(QualifierSet::default_set().to_string(), "[@Default]");
}
