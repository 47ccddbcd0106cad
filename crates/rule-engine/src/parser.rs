//! 规则语法分析器
//!
//! 单遍从左到右扫描词法单元，用显式栈处理括号嵌套：
//! - `(` 保存当前节点并开始新的子构建
//! - `)` 弹出保存的节点，把刚完成的分组挂到它空闲的子节点位置
//! - `AND`/`OR` 以当前节点为左子节点创建操作符节点
//! - 其余单元作为操作数
//!
//! 分析器从不失败：括号不平衡、空分组等畸形输入会得到尽力而为的（可能不完整的）树。

use crate::models::{Ast, AstNode};
use crate::tokenizer::{Token, TokenKind};
use tracing::debug;

/// 语法分析选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// 是否把相邻的 字段/比较符/值 合并为一个条件操作数
    ///
    /// 关闭时保持旧行为：操作数只保留第一个单元，后续单元被丢弃。
    pub merge_conditions: bool,
}

impl ParseOptions {
    pub fn legacy() -> Self {
        Self {
            merge_conditions: false,
        }
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            merge_conditions: true,
        }
    }
}

/// 规则语法分析器
#[derive(Debug, Clone, Default)]
pub struct RuleParser {
    options: ParseOptions,
}

impl RuleParser {
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> ParseOptions {
        self.options
    }

    /// 将词法单元序列构建为 AST
    pub fn parse(&self, tokens: &[Token<'_>]) -> Ast {
        if let [only] = tokens {
            return Ast::from(AstNode::operand(only.text));
        }

        let mut stack: Vec<Option<AstNode>> = Vec::new();
        let mut current: Option<AstNode> = None;
        // 最近的操作数拒绝过单元后不再合并任何单元
        let mut sealed = false;

        for token in tokens {
            match token.kind {
                TokenKind::LeftParen => {
                    stack.push(current.take());
                }
                TokenKind::RightParen => {
                    let group = current.take();
                    // 多余的 `)` 视为弹出空节点
                    current = match stack.pop().flatten() {
                        Some(saved) => Some(Self::attach_group(saved, group)),
                        None => group,
                    };
                    sealed = true;
                }
                TokenKind::Keyword(op) => {
                    current = Some(AstNode::operator(op, current.take(), None));
                }
                _ => {
                    current = Some(self.push_operand(current.take(), token, &mut sealed));
                }
            }
        }

        if !stack.is_empty() {
            debug!(unclosed = stack.len(), "rule has unclosed parentheses");
        }

        Ast::new(current)
    }

    /// 把完成的分组挂到保存的节点上：左子节点为空时挂左边，否则挂右边
    fn attach_group(mut saved: AstNode, group: Option<AstNode>) -> AstNode {
        match &mut saved {
            AstNode::Operator { left, right, .. } => {
                let slot = if left.is_none() { left } else { right };
                *slot = group.map(Box::new);
            }
            AstNode::Operand { text } => {
                // 操作数没有子节点位置，分组被丢弃
                if let Some(group) = group {
                    debug!(
                        operand = %text,
                        dropped_nodes = group.node_count(),
                        "discarding group after operand"
                    );
                }
            }
        }
        saved
    }

    fn push_operand(
        &self,
        current: Option<AstNode>,
        token: &Token<'_>,
        sealed: &mut bool,
    ) -> AstNode {
        let Some(mut node) = current else {
            *sealed = false;
            return AstNode::operand(token.text);
        };

        match &mut node {
            AstNode::Operator { right, .. } => {
                let absorbed = match right.as_deref_mut() {
                    Some(AstNode::Operand { text }) if self.options.merge_conditions => {
                        absorb(text, token, sealed)
                    }
                    _ => false,
                };
                if !absorbed {
                    *right = Some(Box::new(AstNode::operand(token.text)));
                    *sealed = false;
                }
            }
            AstNode::Operand { text } => {
                if !(self.options.merge_conditions && absorb(text, token, sealed)) {
                    debug!(operand = %text, token = token.text, "discarding token after operand");
                }
            }
        }
        node
    }
}

/// 尝试把单元并入未完成的条件文本
///
/// 尚无比较符的文本吸收一个比较符；以比较符结尾的文本吸收一个值。
/// 一旦拒绝某个单元，文本即被封闭：`age >= 30` 停在 `age>`，而不是被改写成 `age>30`。
fn absorb(text: &mut String, token: &Token<'_>, sealed: &mut bool) -> bool {
    if *sealed {
        return false;
    }

    let has_comparator = text.chars().any(is_comparator_char);
    let ends_with_comparator = text.chars().last().is_some_and(is_comparator_char);

    let accepted = if token.is_comparator() {
        !has_comparator
    } else {
        ends_with_comparator
    };

    if accepted {
        text.push_str(token.text);
    } else {
        *sealed = true;
    }
    accepted
}

fn is_comparator_char(c: char) -> bool {
    matches!(c, '>' | '<' | '=')
}
