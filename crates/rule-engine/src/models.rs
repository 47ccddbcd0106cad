//! 规则引擎领域模型

use crate::codec::SerializedNode;
use crate::error::{Result, RuleError};
use crate::operators::LogicalOperator;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// AST 节点
///
/// 严格的二叉树：每个节点由父节点独占。畸形输入解析出的操作符节点可能缺少子节点，
/// 求值与序列化都必须容忍这种不完整的节点。
///
/// 左深链式规则每多一个条件树就深一层，因此遍历、比较、格式化与释放都用显式栈实现。
#[derive(Debug, Eq)]
pub enum AstNode {
    Operator {
        op: LogicalOperator,
        left: Option<Box<AstNode>>,
        right: Option<Box<AstNode>>,
    },
    Operand {
        text: String,
    },
}

impl AstNode {
    pub fn operand(text: impl Into<String>) -> Self {
        Self::Operand { text: text.into() }
    }

    pub fn operator(op: LogicalOperator, left: Option<AstNode>, right: Option<AstNode>) -> Self {
        Self::Operator {
            op,
            left: left.map(Box::new),
            right: right.map(Box::new),
        }
    }

    pub fn and(left: AstNode, right: AstNode) -> Self {
        Self::operator(LogicalOperator::And, Some(left), Some(right))
    }

    pub fn or(left: AstNode, right: AstNode) -> Self {
        Self::operator(LogicalOperator::Or, Some(left), Some(right))
    }

    /// 前序遍历子树中的节点
    pub fn nodes(&self) -> Nodes<'_> {
        Nodes {
            pending: vec![self],
        }
    }

    /// 子树中的节点总数
    pub fn node_count(&self) -> usize {
        self.nodes().count()
    }

    /// 子树中缺失的子节点数量（畸形输入的产物）
    pub fn missing_children(&self) -> usize {
        self.nodes()
            .map(|node| match node {
                Self::Operand { .. } => 0,
                Self::Operator { left, right, .. } => {
                    usize::from(left.is_none()) + usize::from(right.is_none())
                }
            })
            .sum()
    }
}

/// [`AstNode::nodes`] 返回的前序迭代器
pub struct Nodes<'a> {
    pending: Vec<&'a AstNode>,
}

impl<'a> Iterator for Nodes<'a> {
    type Item = &'a AstNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.pending.pop()?;
        if let AstNode::Operator { left, right, .. } = node {
            self.pending.extend(right.as_deref());
            self.pending.extend(left.as_deref());
        }
        Some(node)
    }
}

impl PartialEq for AstNode {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];

        while let Some(pair) = pending.pop() {
            match pair {
                (Self::Operand { text: a }, Self::Operand { text: b }) => {
                    if a != b {
                        return false;
                    }
                }
                (
                    Self::Operator {
                        op: op_a,
                        left: left_a,
                        right: right_a,
                    },
                    Self::Operator {
                        op: op_b,
                        left: left_b,
                        right: right_b,
                    },
                ) => {
                    if op_a != op_b {
                        return false;
                    }
                    for (a, b) in [(left_a, left_b), (right_a, right_b)] {
                        match (a.as_deref(), b.as_deref()) {
                            (Some(a), Some(b)) => pending.push((a, b)),
                            (None, None) => {}
                            _ => return false,
                        }
                    }
                }
                _ => return false,
            }
        }

        true
    }
}

impl Drop for AstNode {
    fn drop(&mut self) {
        let mut pending: Vec<Box<AstNode>> = Vec::new();
        if let Self::Operator { left, right, .. } = self {
            pending.extend(left.take());
            pending.extend(right.take());
        }

        // 子节点先被取出，每个节点自身的释放都是浅层的
        while let Some(mut node) = pending.pop() {
            if let Self::Operator { left, right, .. } = node.as_mut() {
                pending.extend(left.take());
                pending.extend(right.take());
            }
        }
    }
}

/// 以中缀形式输出，缺失的子节点显示为 `?`
impl fmt::Display for AstNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        enum Piece<'a> {
            Node(Option<&'a AstNode>),
            Keyword(LogicalOperator),
            Close,
        }

        let mut pending = vec![Piece::Node(Some(self))];
        while let Some(piece) = pending.pop() {
            match piece {
                Piece::Node(None) => f.write_str("?")?,
                Piece::Node(Some(Self::Operand { text })) => f.write_str(text)?,
                Piece::Node(Some(Self::Operator { op, left, right })) => {
                    f.write_str("(")?;
                    pending.push(Piece::Close);
                    pending.push(Piece::Node(right.as_deref()));
                    pending.push(Piece::Keyword(*op));
                    pending.push(Piece::Node(left.as_deref()));
                }
                Piece::Keyword(op) => write!(f, " {} ", op)?,
                Piece::Close => f.write_str(")")?,
            }
        }
        Ok(())
    }
}

/// 编译后的规则树
///
/// 空规则文本没有根节点。
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Ast {
    root: Option<AstNode>,
}

impl Ast {
    pub fn new(root: Option<AstNode>) -> Self {
        Self { root }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<&AstNode> {
        self.root.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn node_count(&self) -> usize {
        self.root.as_ref().map_or(0, AstNode::node_count)
    }

    /// 树是否完整（没有缺失的子节点）
    pub fn is_complete(&self) -> bool {
        self.root
            .as_ref()
            .is_some_and(|root| root.missing_children() == 0)
    }
}

impl From<AstNode> for Ast {
    fn from(root: AstNode) -> Self {
        Self { root: Some(root) }
    }
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.root {
            Some(root) => write!(f, "{}", root),
            None => write!(f, "<empty>"),
        }
    }
}

/// 记录字段值：整数或字符串
///
/// 不同类型之间既不相等也不可比较，`>` / `<` 遇到类型不匹配时判定为 false。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
}

impl PartialOrd for FieldValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// 评估记录 - 提供给规则的键值数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: HashMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// 从 JSON 对象创建，只接受整数和字符串值
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| RuleError::InvalidRecord(e.to_string()))
    }

    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| RuleError::InvalidRecord(e.to_string()))
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// 持久化的规则记录，存储负责分配 ID
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRule {
    pub rule_text: String,
    pub ast: SerializedNode,
}

/// 评估结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvaluationReport {
    pub matched: bool,
    pub matched_conditions: Vec<String>,
    pub evaluation_trace: Vec<String>,
    pub evaluation_time_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_from_json() {
        let record = Record::from_json(r#"{"age": 35, "department": "Sales"}"#).unwrap();

        assert_eq!(record.len(), 2);
        assert_eq!(record.get("age"), Some(&FieldValue::Integer(35)));
        assert_eq!(record.get("department"), Some(&FieldValue::from("Sales")));
        assert_eq!(record.get("salary"), None);
    }

    #[test]
    fn test_record_rejects_non_scalar_values() {
        for json in [
            r#"{"age": 35.5}"#,
            r#"{"active": true}"#,
            r#"{"tags": ["a"]}"#,
            r#"{"user": {"age": 1}}"#,
            r#"[1, 2]"#,
        ] {
            let err = Record::from_json(json).unwrap_err();
            assert!(matches!(err, RuleError::InvalidRecord(_)), "{}", json);
        }
    }

    #[test]
    fn test_record_from_value() {
        let record = Record::from_value(json!({"experience": 5})).unwrap();
        assert_eq!(record.get("experience"), Some(&FieldValue::Integer(5)));
    }

    #[test]
    fn test_field_value_ordering() {
        assert!(FieldValue::Integer(35) > FieldValue::Integer(30));
        assert!(FieldValue::from("Sales") > FieldValue::from("Marketing"));
        assert_eq!(
            FieldValue::Integer(5).partial_cmp(&FieldValue::from("5")),
            None
        );
        assert_ne!(FieldValue::Integer(5), FieldValue::from("5"));
    }

    #[test]
    fn test_ast_node_display() {
        let node = AstNode::or(
            AstNode::and(AstNode::operand("age>30"), AstNode::operand("x=1")),
            AstNode::operator(LogicalOperator::And, Some(AstNode::operand("y<2")), None),
        );

        assert_eq!(node.to_string(), "((age>30 AND x=1) OR (y<2 AND ?))");
        assert_eq!(node.node_count(), 6);
        assert_eq!(node.missing_children(), 1);
    }

    fn left_deep_chain(terms: usize) -> AstNode {
        let mut node = AstNode::operand("c0=0");
        for i in 1..terms {
            node = AstNode::and(node, AstNode::operand(format!("c{}={}", i, i)));
        }
        node
    }

    #[test]
    fn test_deep_tree_walks_use_explicit_stack() {
        let deep = left_deep_chain(50_000);
        let same = left_deep_chain(50_000);

        assert_eq!(deep.node_count(), 99_999);
        assert_eq!(deep.missing_children(), 0);
        assert!(deep == same);
        assert!(deep != left_deep_chain(49_999));

        let text = deep.to_string();
        assert!(text.starts_with("((((c0=0 AND c1=1) AND c2=2)"));
        assert!(text.ends_with(" AND c49999=49999)"));

        // 释放同样不能递归
        drop(deep);
        drop(same);
    }

    #[test]
    fn test_ast_completeness() {
        assert!(!Ast::empty().is_complete());
        assert!(Ast::from(AstNode::operand("30")).is_complete());

        let partial = Ast::from(AstNode::operator(LogicalOperator::Or, None, None));
        assert!(!partial.is_complete());
        assert_eq!(partial.node_count(), 1);
    }
}
