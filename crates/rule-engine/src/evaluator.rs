//! 条件评估器
//!
//! 操作数文本按 `<字段><比较符><值>` 解析，不符合该形状的条件直接判定为 false。
//! 类型策略：整数与整数按数值比较，字符串与字符串按字典序比较，类型不匹配一律为 false。

use crate::models::{Ast, AstNode, FieldValue, Record};
use crate::operators::{Comparator, LogicalOperator};
use regex::Regex;
use std::sync::LazyLock;

static CONDITION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\w+)\s*([<>=])\s*('[\w\s]*'|\w+)").expect("condition pattern is valid")
});

/// `>` / `<` 比较时缺失字段的默认值
const MISSING_ORDERED_DEFAULT: FieldValue = FieldValue::Integer(0);

/// 解析后的单个条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: String,
    pub comparator: Comparator,
    pub value: FieldValue,
}

impl Condition {
    /// 解析条件文本，形状不匹配时返回 None
    pub fn parse(text: &str) -> Option<Self> {
        let caps = CONDITION_REGEX.captures(text)?;
        let comparator = Comparator::from_symbol(&caps[2])?;

        Some(Self {
            field: caps[1].to_string(),
            comparator,
            value: parse_literal(&caps[3]),
        })
    }

    /// 针对记录评估条件
    pub fn matches(&self, record: &Record) -> bool {
        let actual = record.get(&self.field);
        match self.comparator {
            Comparator::Gt => actual.unwrap_or(&MISSING_ORDERED_DEFAULT) > &self.value,
            Comparator::Lt => actual.unwrap_or(&MISSING_ORDERED_DEFAULT) < &self.value,
            Comparator::Eq => actual.is_some_and(|v| v == &self.value),
        }
    }
}

/// 右值：全是数字的解析为整数（溢出时按字符串处理），否则去掉一层单引号作为字符串
fn parse_literal(raw: &str) -> FieldValue {
    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = raw.parse::<i64>() {
            return FieldValue::Integer(n);
        }
    }

    let unquoted = raw
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(raw);
    FieldValue::Text(unquoted.to_string())
}

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估单个条件文本，无法解析的条件为 false
    pub fn evaluate(condition: &str, record: &Record) -> bool {
        Condition::parse(condition).is_some_and(|cond| cond.matches(record))
    }

    /// 短路评估节点，缺失的节点为 false
    ///
    /// 用显式栈代替递归，深度只受内存限制。
    pub fn evaluate_node(node: Option<&AstNode>, record: &Record) -> bool {
        enum Step<'a> {
            Visit(Option<&'a AstNode>),
            Combine(LogicalOperator, Option<&'a AstNode>),
        }

        let mut steps = vec![Step::Visit(node)];
        let mut matched = false;

        while let Some(step) = steps.pop() {
            match step {
                Step::Visit(None) => matched = false,
                Step::Visit(Some(AstNode::Operand { text })) => {
                    matched = Self::evaluate(text, record);
                }
                Step::Visit(Some(AstNode::Operator { op, left, right })) => {
                    steps.push(Step::Combine(*op, right.as_deref()));
                    steps.push(Step::Visit(left.as_deref()));
                }
                // `matched` 此时是左子树的结果，短路时它就是整个节点的结果
                Step::Combine(op, right) => {
                    let short_circuit = match op {
                        LogicalOperator::And => !matched,
                        LogicalOperator::Or => matched,
                    };
                    if !short_circuit {
                        steps.push(Step::Visit(right));
                    }
                }
            }
        }

        matched
    }
}

impl Ast {
    /// 针对记录评估规则，空规则为 false
    pub fn evaluate(&self, record: &Record) -> bool {
        ConditionEvaluator::evaluate_node(self.root(), record)
    }
}
