//! 测试公共工具

#![allow(dead_code)]

use di_abstractions::{Qualifier, QualifierSet};
use std::sync::{Arc, Once};
use parking_lot::Mutex;

static INIT_LOGGER: Once = Once::new();

/// 初始化测试日志系统（只初始化一次）
pub fn init_test_logger() {
    INIT_LOGGER.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// 按种类创建限定符集合
pub fn qualifiers(kinds: &[&str]) -> QualifierSet {
    QualifierSet::new(kinds.iter().map(|kind| Qualifier::new(*kind)))
}

/// 记录回调调用顺序
#[derive(Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries.lock().iter().filter(|e| e.as_str() == entry).count()
    }
}
