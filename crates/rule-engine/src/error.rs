//! 规则引擎错误类型

use thiserror::Error;

/// AST 解码错误
///
/// 存储的 AST 记录结构非法时返回，`path` 指向出错节点（如 `$.left.right`）。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("节点不是对象: {path}")]
    NotAnObject { path: String },

    #[error("节点缺少字段 '{field}': {path}")]
    MissingField { path: String, field: &'static str },

    #[error("字段 '{field}' 类型错误: 期望 {expected}, 实际 {actual} ({path})")]
    InvalidFieldType {
        path: String,
        field: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("未知的节点类型 '{kind}': {path}")]
    UnknownKind { path: String, kind: String },

    #[error("未知的逻辑操作符 '{operator}': {path}")]
    UnknownOperator { path: String, operator: String },

    #[error("操作数节点不能包含子节点: {path}")]
    OperandWithChildren { path: String },
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("规则解码失败: {0}")]
    Decode(#[from] DecodeError),

    #[error("规则未找到: {0}")]
    RuleNotFound(String),

    #[error("无效的评估数据: {0}")]
    InvalidRecord(String),

    #[error("规则存储失败: {0}")]
    Storage(String),

    #[error("JSON 序列化错误: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RuleError>;
