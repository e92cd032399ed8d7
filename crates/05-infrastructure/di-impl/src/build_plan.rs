//! 构建计划缓存
//!
//! 计算在锁外进行，允许多个线程并发地重复计算同一项；发布是原子的，
//! 只有第一个发布的结果可见。计算失败的结果不会被缓存。

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::hash::Hash;

/// 单值构建计划
#[derive(Debug)]
pub struct BuildPlanCell<T> {
    cell: OnceCell<T>,
}

impl<T> BuildPlanCell<T> {
    /// 创建空的构建计划
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// 已发布的值
    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    /// 发布值，已有值时返回先发布者
    pub fn publish(&self, value: T) -> Publication<&T, T> {
        match self.cell.try_insert(value) {
            Ok(published) => Publication::Won(published),
            Err((winner, rejected)) => Publication::Lost { winner, rejected },
        }
    }

    /// 获取已发布的值，没有时计算并发布
    pub fn get_or_compute(&self, compute: impl FnOnce() -> T) -> &T {
        if let Some(value) = self.cell.get() {
            return value;
        }
        self.publish(compute()).into_winner()
    }

    /// 获取已发布的值，没有时计算并发布；计算失败时不发布
    pub fn get_or_publish<E>(&self, compute: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }
        let value = compute()?;
        Ok(self.publish(value).into_winner())
    }
}

impl<T> Default for BuildPlanCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// 发布结果
#[derive(Debug)]
pub enum Publication<W, R = W> {
    /// 本次发布成功
    Won(W),
    /// 已有先发布者，本次的值被拒绝
    Lost { winner: W, rejected: R },
}

impl<W, R> Publication<W, R> {
    /// 最终可见的值
    pub fn into_winner(self) -> W {
        match self {
            Self::Won(value) | Self::Lost { winner: value, .. } => value,
        }
    }

    /// 本次发布是否成功
    pub fn is_won(&self) -> bool {
        matches!(self, Self::Won(_))
    }
}

/// 按键缓存的构建计划
#[derive(Debug)]
pub struct BuildPlanCache<K: Eq + Hash, V> {
    entries: DashMap<K, V>,
}

impl<K, V> BuildPlanCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// 创建空缓存
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// 获取已发布的值
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// 是否已发布
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// 原子地发布值
    pub fn publish(&self, key: K, value: V) -> Publication<V> {
        match self.entries.entry(key) {
            Entry::Occupied(entry) => Publication::Lost {
                winner: entry.get().clone(),
                rejected: value,
            },
            Entry::Vacant(entry) => {
                entry.insert(value.clone());
                Publication::Won(value)
            }
        }
    }

    /// 获取已发布的值，没有时在锁外计算再发布
    pub fn get_or_publish<E>(
        &self,
        key: K,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = compute()?;
        Ok(self.publish(key, value).into_winner())
    }

    /// 满足条件时移除
    pub fn remove_if(&self, key: &K, predicate: impl FnOnce(&V) -> bool) -> Option<V> {
        self.entries
            .remove_if(key, |_, value| predicate(value))
            .map(|(_, value)| value)
    }

    /// 移除全部条目
    pub fn drain(&self) -> Vec<V> {
        let keys: Vec<K> = self.entries.iter().map(|entry| entry.key().clone()).collect();
        keys.into_iter()
            .filter_map(|key| self.entries.remove(&key).map(|(_, value)| value))
            .collect()
    }

    /// 全部已发布的值
    pub fn values(&self) -> Vec<V> {
        self.entries.iter().map(|entry| entry.value().clone()).collect()
    }

    /// 条目数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> Default for BuildPlanCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
