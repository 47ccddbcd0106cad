//! 规则服务
//!
//! 串联编译、编码、存储与解码、评估两条流程，供请求层调用。

use crate::compiler::RuleCompiler;
use crate::error::{Result, RuleError};
use crate::executor::RuleExecutor;
use crate::models::{Ast, EvaluationReport, Record, StoredRule};
use crate::parser::ParseOptions;
use crate::store::RuleRepository;
use tracing::{instrument, warn};

/// 规则服务
pub struct RuleService<R> {
    repository: R,
    compiler: RuleCompiler,
}

impl<R: RuleRepository> RuleService<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository,
            compiler: RuleCompiler::default(),
        }
    }

    pub fn with_options(repository: R, options: ParseOptions) -> Self {
        Self {
            repository,
            compiler: RuleCompiler::new(options),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// 编译并保存规则，返回规则 ID
    #[instrument(skip(self))]
    pub fn create_rule(&self, rule_text: &str) -> Result<String> {
        let ast = self.compiler.compile(rule_text);
        let stored = StoredRule {
            rule_text: rule_text.to_string(),
            ast: ast.encode(),
        };
        self.repository.insert(stored)
    }

    /// 读取已保存规则并针对记录评估
    #[instrument(skip(self, record))]
    pub fn evaluate_rule(&self, rule_id: &str, record: &Record) -> Result<bool> {
        let ast = self.load_ast(rule_id)?;
        Ok(ast.evaluate(record))
    }

    /// 同 [`Self::evaluate_rule`]，但返回带追踪信息的评估结果
    #[instrument(skip(self, record))]
    pub fn evaluate_rule_with_report(
        &self,
        rule_id: &str,
        record: &Record,
    ) -> Result<EvaluationReport> {
        let ast = self.load_ast(rule_id)?;
        Ok(RuleExecutor::new().with_trace().execute(&ast, record))
    }

    fn load_ast(&self, rule_id: &str) -> Result<Ast> {
        let stored = self.repository.find(rule_id)?.ok_or_else(|| {
            warn!(rule_id, "规则不存在");
            RuleError::RuleNotFound(rule_id.to_string())
        })?;

        Ast::decode(&stored.ast).map_err(|e| {
            warn!(rule_id, error = %e, "规则 AST 解码失败");
            RuleError::from(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::store::{InMemoryRuleStore, MockRuleRepository};
    use serde_json::json;

    #[test]
    fn test_create_and_evaluate() {
        let service = RuleService::new(InMemoryRuleStore::new());
        let id = service.create_rule("age > 18 AND age < 65").unwrap();

        assert!(service.evaluate_rule(&id, &Record::new().with("age", 40)).unwrap());
        assert!(!service.evaluate_rule(&id, &Record::new().with("age", 10)).unwrap());
    }

    #[test]
    fn test_create_rule_stores_text_and_ast() {
        let service = RuleService::new(InMemoryRuleStore::new());
        let id = service.create_rule("30").unwrap();

        let stored = service.repository().find(&id).unwrap().unwrap();
        assert_eq!(stored.rule_text, "30");
        assert_eq!(
            stored.ast,
            json!({"kind": "operand", "value": "30", "left": null, "right": null})
        );
    }

    #[test]
    fn test_evaluate_unknown_rule() {
        let service = RuleService::new(InMemoryRuleStore::new());
        let err = service
            .evaluate_rule("missing", &Record::new())
            .unwrap_err();
        assert!(matches!(err, RuleError::RuleNotFound(id) if id == "missing"));
    }

    #[test]
    fn test_evaluate_corrupted_rule() {
        let mut repository = MockRuleRepository::new();
        repository
            .expect_find()
            .withf(|id| id == "rule-1")
            .times(1)
            .returning(|_| {
                Ok(Some(StoredRule {
                    rule_text: "age > 30".to_string(),
                    ast: json!({"kind": "unknown", "value": "x", "left": null, "right": null})
                        .into(),
                }))
            });

        let service = RuleService::new(repository);
        let err = service
            .evaluate_rule("rule-1", &Record::new())
            .unwrap_err();
        assert!(matches!(
            err,
            RuleError::Decode(DecodeError::UnknownKind { .. })
        ));
    }

    #[test]
    fn test_storage_error_propagates() {
        let mut repository = MockRuleRepository::new();
        repository
            .expect_insert()
            .times(1)
            .returning(|_| Err(RuleError::Storage("connection refused".to_string())));

        let service = RuleService::new(repository);
        let err = service.create_rule("age > 30").unwrap_err();
        assert!(matches!(err, RuleError::Storage(_)));
    }

    #[test]
    fn test_create_rule_passes_encoded_ast() {
        let mut repository = MockRuleRepository::new();
        repository
            .expect_insert()
            .withf(|rule| rule.rule_text == "a = 1 OR b = 2" && rule.ast["value"] == "OR")
            .times(1)
            .returning(|_| Ok("rule-42".to_string()));

        let service = RuleService::new(repository);
        assert_eq!(service.create_rule("a = 1 OR b = 2").unwrap(), "rule-42");
    }

    #[test]
    fn test_legacy_service() {
        let service = RuleService::with_options(InMemoryRuleStore::new(), ParseOptions::legacy());
        let id = service.create_rule("age > 30").unwrap();
        assert!(!service.evaluate_rule(&id, &Record::new().with("age", 35)).unwrap());
    }

    #[test]
    fn test_long_rule_survives_store() {
        let rule = (0..20_000)
            .map(|i| format!("c{} > 0", i % 7))
            .collect::<Vec<_>>()
            .join(" OR ");
        let service = RuleService::new(InMemoryRuleStore::new());
        let id = service.create_rule(&rule).unwrap();

        assert!(service.evaluate_rule(&id, &Record::new().with("c6", 1)).unwrap());
        assert!(!service.evaluate_rule(&id, &Record::new()).unwrap());
    }

    #[test]
    fn test_evaluate_with_report() {
        let service = RuleService::new(InMemoryRuleStore::new());
        let id = service.create_rule("age > 30 OR department = 'Sales'").unwrap();

        let report = service
            .evaluate_rule_with_report(&id, &Record::new().with("department", "Sales"))
            .unwrap();
        assert!(report.matched);
        assert_eq!(report.matched_conditions, vec!["department='Sales'".to_string()]);
        assert!(!report.evaluation_trace.is_empty());
    }
}
