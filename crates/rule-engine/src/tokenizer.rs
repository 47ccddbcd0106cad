//! 规则文本分词器
//!
//! 按优先级依次匹配：括号、`AND`/`OR` 关键字、比较符、单词、单引号字符串、整数。
//! 无法匹配的字符（如多余的标点）会被直接跳过，分词阶段不做任何合法性校验。

use crate::operators::{Comparator, LogicalOperator};
use regex::Regex;
use std::sync::LazyLock;

static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(|\)|AND|OR|>|<|=|\w+|'[\w\s]+'|\d+").expect("token pattern is valid")
});

/// 词法单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    Keyword(LogicalOperator),
    Comparator(Comparator),
    Word,
    Quoted,
}

/// 词法单元，借用原始规则文本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

impl<'a> Token<'a> {
    fn classify(text: &'a str) -> Self {
        let kind = match text {
            "(" => TokenKind::LeftParen,
            ")" => TokenKind::RightParen,
            _ => {
                if let Some(op) = LogicalOperator::from_keyword(text) {
                    TokenKind::Keyword(op)
                } else if let Some(cmp) = Comparator::from_symbol(text) {
                    TokenKind::Comparator(cmp)
                } else if text.starts_with('\'') {
                    TokenKind::Quoted
                } else {
                    TokenKind::Word
                }
            }
        };
        Self { kind, text }
    }

    pub fn is_comparator(&self) -> bool {
        matches!(self.kind, TokenKind::Comparator(_))
    }
}

/// 将规则文本切分为有序的词法单元序列
pub fn tokenize(rule_text: &str) -> Vec<Token<'_>> {
    TOKEN_REGEX
        .find_iter(rule_text)
        .map(|m| Token::classify(m.as_str()))
        .collect()
}
