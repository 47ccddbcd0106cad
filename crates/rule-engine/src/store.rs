//! 规则存储
//!
//! 存储只需提供追加写入和按 ID 查找，不需要原地更新。
//! [`InMemoryRuleStore`] 使用 DashMap 提供线程安全的内存实现。

use crate::error::Result;
use crate::models::StoredRule;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// 规则仓储接口
#[cfg_attr(test, mockall::automock)]
pub trait RuleRepository: Send + Sync {
    /// 写入规则记录，返回存储分配的 ID
    fn insert(&self, rule: StoredRule) -> Result<String>;

    /// 按 ID 查找规则记录
    fn find(&self, id: &str) -> Result<Option<StoredRule>>;
}

/// 内存规则存储
#[derive(Clone, Default)]
pub struct InMemoryRuleStore {
    rules: Arc<DashMap<String, StoredRule>>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取当前存储的规则数量
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rules.contains_key(id)
    }

    /// 获取所有规则 ID
    pub fn list_ids(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.key().clone()).collect()
    }
}

impl RuleRepository for InMemoryRuleStore {
    #[instrument(skip(self, rule), fields(rule_text = %rule.rule_text))]
    fn insert(&self, rule: StoredRule) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.rules.insert(id.clone(), rule);

        info!(rule_id = %id, "规则已保存");
        Ok(id)
    }

    fn find(&self, id: &str) -> Result<Option<StoredRule>> {
        let found = self.rules.get(id).map(|r| r.value().clone());
        debug!(rule_id = %id, found = found.is_some(), "规则查找");
        Ok(found)
    }
}
