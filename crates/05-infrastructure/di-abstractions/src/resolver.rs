//! 解析链
//!
//! 记录当前正在构造或校验的组件路径，用于检测循环依赖和限制解析深度

use infrastructure_common::DependencyError;

/// 解析链
#[derive(Debug, Clone)]
pub struct ResolutionChain {
    entries: Vec<String>,
    max_depth: usize,
}

impl ResolutionChain {
    /// 创建新的解析链
    pub fn new(max_depth: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_depth,
        }
    }

    /// 添加组件到解析链
    pub fn push(&mut self, id: &str) -> Result<(), DependencyError> {
        if self.contains(id) {
            let mut chain = self.cycle_from(id);
            chain.push(id.to_string());
            return Err(DependencyError::CircularDependency { chain });
        }
        if self.entries.len() >= self.max_depth {
            let mut chain = self.entries.clone();
            chain.push(id.to_string());
            return Err(DependencyError::ResolutionDepthExceeded {
                max_depth: self.max_depth,
                chain,
            });
        }
        self.entries.push(id.to_string());
        Ok(())
    }

    /// 从解析链中移除最后一个组件
    pub fn pop(&mut self) -> Option<String> {
        self.entries.pop()
    }

    /// 清空解析链，经过普通作用域时使用
    pub fn reset(&mut self) -> Vec<String> {
        std::mem::take(&mut self.entries)
    }

    /// 恢复之前清空的解析链
    pub fn restore(&mut self, entries: Vec<String>) {
        self.entries = entries;
    }

    /// 是否包含指定组件
    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|entry| entry == id)
    }

    /// 最大深度
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// 当前深度
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 当前路径
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    fn cycle_from(&self, id: &str) -> Vec<String> {
        let start = self
            .entries
            .iter()
            .position(|entry| entry == id)
            .unwrap_or_default();
        self.entries[start..].to_vec()
    }
}

impl Default for ResolutionChain {
    fn default() -> Self {
        Self::new(100)
    }
}
