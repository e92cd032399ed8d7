//! 类型安全解析器
//!
//! 解析步骤：
//!
//! 1. 拆开 `Instance<T>`，记录是否拆开过
//! 2. 按拆开后的类型查找（或计算并发布）可赋值的全部组件，开放泛型组件在此封闭
//! 3. 按限定符过滤
//! 4. 消歧：多个候选中存在普通组件时丢弃全部条件组件，否则只保留第一个条件组件
//! 5. 对剩余候选执行 touch
//! 6. 拆开过时把候选包装为一个延迟句柄组件

use crate::build_plan::BuildPlanCache;
use crate::component::Component;
use di_abstractions::QualifierSet;
use infrastructure_common::{DependencyError, DependencyResult, TypeRef};
use std::sync::Arc;
use tracing::debug;

/// 解析结果
#[derive(Debug, Clone)]
pub struct Resolution {
    /// 消歧后的候选组件
    pub matched: Vec<Arc<Component>>,
    /// 请求延迟句柄时的包装组件
    pub wrapper: Option<Arc<Component>>,
}

impl Resolution {
    /// 返回给请求方的组件
    pub fn components(&self) -> Vec<Arc<Component>> {
        match &self.wrapper {
            Some(wrapper) => vec![Arc::clone(wrapper)],
            None => self.matched.clone(),
        }
    }
}

/// 类型安全解析器
#[derive(Default)]
pub struct TypeSafeResolver {
    cache: BuildPlanCache<TypeRef, Arc<[Arc<Component>]>>,
}

impl TypeSafeResolver {
    /// 创建解析器
    pub fn new() -> Self {
        Self::default()
    }

    /// 在组件池中解析请求类型
    pub fn resolve(
        &self,
        pool: &[Arc<Component>],
        requested: &TypeRef,
        qualifiers: &QualifierSet,
    ) -> DependencyResult<Resolution> {
        let (ty, wrapped) = match requested.unwrap_instance() {
            Some(inner) => (inner, true),
            None => (requested, false),
        };

        let assignable = self.cache.get_or_publish(ty.clone(), || {
            let assignable = pool
                .iter()
                .map(|component| component.resolve(ty))
                .collect::<DependencyResult<Vec<_>>>()?
                .into_iter()
                .flatten()
                .collect::<Vec<_>>();
            debug!(ty = %ty, count = assignable.len(), "解析缓存已填充");
            Ok::<_, DependencyError>(Arc::from(assignable))
        })?;

        let qualified = assignable
            .iter()
            .filter(|component| component.qualifiers().can_satisfy(qualifiers))
            .cloned()
            .collect();
        let matched = resolve_ambiguity(qualified);
        for component in &matched {
            component.touch();
        }

        let wrapper = wrapped
            .then(|| Arc::new(Component::instance_wrapper(ty, qualifiers, matched.clone())));
        Ok(Resolution { matched, wrapper })
    }

    /// 已缓存的类型数量
    pub fn cached_types(&self) -> usize {
        self.cache.len()
    }
}

/// 条件组件只在没有普通候选时生效，且最多保留一个
pub fn resolve_ambiguity(candidates: Vec<Arc<Component>>) -> Vec<Arc<Component>> {
    if candidates.len() <= 1 {
        return candidates;
    }
    let (conditional, normal): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|component| component.is_conditional_on_missing());
    if normal.is_empty() {
        conditional.into_iter().take(1).collect()
    } else {
        normal
    }
}
