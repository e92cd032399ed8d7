//! 部署期校验
//!
//! 从每个组件出发做深度优先遍历并维护当前路径，依赖边指向路径上已有的组件时
//! 报告循环依赖。指向普通作用域组件的边不延伸当前路径：普通作用域在运行时通过
//! 延迟句柄访问，经过它的环不是构造期的环。这类组件放入待办列表，之后以空路径
//! 单独遍历，因此任意时刻进行中的组件恰好是当前路径上的组件。

use crate::component::{Component, ComponentId};
use crate::manager::ComponentManager;
use di_abstractions::ResolutionChain;
use infrastructure_common::DependencyResult;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error};

/// 循环依赖校验器
pub struct DependencyValidator<'a> {
    manager: &'a ComponentManager,
    chain: ResolutionChain,
    in_progress: HashSet<ComponentId>,
    finished: HashSet<ComponentId>,
}

impl<'a> DependencyValidator<'a> {
    /// 创建校验器
    pub fn new(manager: &'a ComponentManager) -> Self {
        Self {
            manager,
            chain: ResolutionChain::new(manager.config().max_resolution_depth),
            in_progress: HashSet::new(),
            finished: HashSet::new(),
        }
    }

    /// 校验一组组件，共享已完成的遍历结果
    pub fn validate_all<'c>(
        &mut self,
        components: impl IntoIterator<Item = &'c Arc<Component>>,
    ) -> DependencyResult<()> {
        for component in components {
            self.validate(component)?;
        }
        Ok(())
    }

    /// 校验单个组件及其可达的全部组件
    pub fn validate(&mut self, component: &Arc<Component>) -> DependencyResult<()> {
        if !component.is_concrete() {
            return Ok(());
        }
        let mut pending = vec![Arc::clone(component)];
        while let Some(next) = pending.pop() {
            if self.finished.contains(next.id()) {
                continue;
            }
            self.chain.reset();
            self.in_progress.clear();
            self.visit(&next, &mut pending).map_err(|e| {
                error!(component = %next.id(), "组件校验失败: {}", e);
                e
            })?;
        }
        Ok(())
    }

    fn visit(
        &mut self,
        component: &Arc<Component>,
        pending: &mut Vec<Arc<Component>>,
    ) -> DependencyResult<()> {
        self.chain.push(component.id().as_str())?;
        self.in_progress.insert(component.id().clone());

        for dependency in component.dependencies(self.manager)? {
            let id = dependency.id();
            if dependency.scope().is_normal() {
                if !self.finished.contains(id) {
                    pending.push(dependency);
                }
            } else if self.in_progress.contains(id) {
                self.chain.push(id.as_str())?;
            } else if !self.finished.contains(id) {
                self.visit(&dependency, pending)?;
            }
        }

        self.chain.pop();
        self.in_progress.remove(component.id());
        self.finished.insert(component.id().clone());
        debug!(component = %component.id(), "组件校验通过");
        Ok(())
    }
}
