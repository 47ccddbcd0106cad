//! 规则编译与评估引擎
//!
//! 将 `age > 30 AND department = 'Sales'` 这样的中缀规则文本编译为 AST，
//! 以嵌套 JSON 形式持久化，之后针对任意键值记录评估出布尔结果：
//! - 分词与单遍栈式语法分析
//! - 短路求值与评估追踪（显式栈，不受规则长度影响）
//! - AST 编解码
//! - 规则仓储接口与服务编排
//!
//! 编译器是宽松的：畸形规则文本不会报错，而是得到尽力而为的树；
//! 无法解析的条件评估为 false。需要严格校验的调用方应自行检查。

pub mod codec;
pub mod compiler;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod models;
pub mod operators;
pub mod parser;
#[cfg(test)]
mod property_tests;
pub mod service;
pub mod store;
pub mod tokenizer;

pub use codec::{SerializedNode, decode, encode, from_json_str, to_json_string};
pub use compiler::{RuleCompiler, compile};
pub use error::{DecodeError, Result, RuleError};
pub use evaluator::{Condition, ConditionEvaluator};
pub use executor::RuleExecutor;
pub use models::{Ast, AstNode, EvaluationReport, FieldValue, Record, StoredRule};
pub use operators::{Comparator, LogicalOperator};
pub use parser::{ParseOptions, RuleParser};
pub use service::RuleService;
pub use store::{InMemoryRuleStore, RuleRepository};
pub use tokenizer::{Token, TokenKind, tokenize};

/// 针对记录评估规则
pub fn evaluate(ast: &Ast, record: &Record) -> bool {
    ast.evaluate(record)
}
