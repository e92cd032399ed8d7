//! 限定符集合
//!
//! 限定符用于在同一类型的多个组件之间消歧。匹配只比较限定符的种类，
//! 成员值仅供消费方读取（例如 Cookie 参数的名称）。

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// 默认限定符的种类名称
pub const DEFAULT_QUALIFIER: &str = "Default";

/// 限定符
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Qualifier {
    kind: Arc<str>,
    members: BTreeMap<Arc<str>, Arc<str>>,
}

impl Qualifier {
    /// 创建限定符
    pub fn new(kind: impl Into<Arc<str>>) -> Self {
        Self {
            kind: kind.into(),
            members: BTreeMap::new(),
        }
    }

    /// 默认限定符
    pub fn default_qualifier() -> Self {
        Self::new(DEFAULT_QUALIFIER)
    }

    /// 添加成员值
    pub fn with_member(mut self, key: impl Into<Arc<str>>, value: impl Into<Arc<str>>) -> Self {
        self.members.insert(key.into(), value.into());
        self
    }

    /// 限定符种类
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// 获取成员值
    pub fn member(&self, key: &str) -> Option<&str> {
        self.members.get(key).map(|v| &**v)
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.kind)?;
        if !self.members.is_empty() {
            let members = self
                .members
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, "({members})")?;
        }
        Ok(())
    }
}

/// 不可变的限定符集合
///
/// 集合永远不为空：未声明任何限定符时自动包含 `@Default`。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifierSet {
    qualifiers: Arc<[Qualifier]>,
}

impl QualifierSet {
    /// 创建限定符集合
    pub fn new(qualifiers: impl IntoIterator<Item = Qualifier>) -> Self {
        let mut qualifiers: Vec<Qualifier> = qualifiers.into_iter().collect();
        if qualifiers.is_empty() {
            qualifiers.push(Qualifier::default_qualifier());
        }
        Self {
            qualifiers: qualifiers.into(),
        }
    }

    /// 只包含 `@Default` 的集合
    pub fn default_set() -> Self {
        Self::new([])
    }

    /// 派生一个追加了限定符的新集合
    pub fn with(&self, qualifier: Qualifier) -> Self {
        let mut qualifiers = self.qualifiers.to_vec();
        qualifiers.push(qualifier);
        Self {
            qualifiers: qualifiers.into(),
        }
    }

    /// 合并两个集合，`@Default` 不参与合并；结果为空时回到 `[@Default]`
    pub fn union(&self, other: &QualifierSet) -> Self {
        let explicit = self
            .qualifiers
            .iter()
            .chain(other.qualifiers.iter())
            .filter(|q| q.kind() != DEFAULT_QUALIFIER)
            .fold(Vec::<Qualifier>::new(), |mut acc, q| {
                if !acc.iter().any(|existing| existing.kind() == q.kind()) {
                    acc.push(q.clone());
                }
                acc
            });
        Self::new(explicit)
    }

    /// 当前集合是否是 `requested` 的超集（按限定符种类比较）
    pub fn can_satisfy(&self, requested: &QualifierSet) -> bool {
        requested.kinds().all(|kind| self.contains_kind(kind))
    }

    /// 是否包含指定种类
    pub fn contains_kind(&self, kind: &str) -> bool {
        self.qualifiers.iter().any(|q| q.kind() == kind)
    }

    /// 按种类查找限定符
    pub fn find(&self, kind: &str) -> Option<&Qualifier> {
        self.qualifiers.iter().find(|q| q.kind() == kind)
    }

    /// 遍历限定符种类
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.qualifiers.iter().map(Qualifier::kind)
    }

    /// 遍历限定符
    pub fn iter(&self) -> impl Iterator<Item = &Qualifier> {
        self.qualifiers.iter()
    }

    /// 是否只包含默认限定符
    pub fn is_default(&self) -> bool {
        self.qualifiers.len() == 1 && self.contains_kind(DEFAULT_QUALIFIER)
    }

    /// 限定符数量，至少为 1
    pub fn len(&self) -> usize {
        self.qualifiers.len()
    }

    /// 集合永远不为空
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Default for QualifierSet {
    fn default() -> Self {
        Self::default_set()
    }
}

impl FromIterator<Qualifier> for QualifierSet {
    fn from_iter<I: IntoIterator<Item = Qualifier>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl From<Qualifier> for QualifierSet {
    fn from(qualifier: Qualifier) -> Self {
        Self::new([qualifier])
    }
}

impl fmt::Display for QualifierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let qualifiers = self
            .qualifiers
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        write!(f, "[{qualifiers}]")
    }
}
