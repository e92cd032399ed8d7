//! 组件注册表
//!
//! 只追加的注册表：部署时登记声明表中的组件，运行时登记新发现的封闭泛型组件
//! 和延迟句柄组件。组件一旦登记就不会移除。

use crate::build_plan::{BuildPlanCache, Publication};
use crate::component::{Component, ComponentId};
use parking_lot::Mutex;
use std::sync::Arc;

/// 组件注册表
#[derive(Default)]
pub struct ComponentRegistry {
    by_id: BuildPlanCache<ComponentId, Arc<Component>>,
    ordered: Mutex<Vec<Arc<Component>>>,
}

impl ComponentRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记组件，同一标识已存在时返回先登记者
    pub fn register(&self, component: Arc<Component>) -> Publication<Arc<Component>> {
        let publication = self.by_id.publish(component.id().clone(), component);
        if let Publication::Won(component) = &publication {
            self.ordered.lock().push(Arc::clone(component));
        }
        publication
    }

    /// 按标识查找
    pub fn get(&self, id: &ComponentId) -> Option<Arc<Component>> {
        self.by_id.get(id)
    }

    /// 是否已登记
    pub fn contains(&self, id: &ComponentId) -> bool {
        self.by_id.contains(id)
    }

    /// 按登记顺序返回全部组件
    pub fn all(&self) -> Vec<Arc<Component>> {
        self.ordered.lock().clone()
    }

    /// 组件数量
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
