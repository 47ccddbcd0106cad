//! 规则编译器
//!
//! 分词 + 语法分析。编译永不失败：畸形规则文本也会得到一棵（可能退化的）树，
//! 需要严格校验的调用方应通过 [`Ast::is_complete`] 等方式自行检查。

use crate::models::Ast;
use crate::parser::{ParseOptions, RuleParser};
use crate::tokenizer::{Token, tokenize};
use tracing::debug;

/// 规则编译器
#[derive(Debug, Clone, Default)]
pub struct RuleCompiler {
    parser: RuleParser,
}

impl RuleCompiler {
    pub fn new(options: ParseOptions) -> Self {
        Self {
            parser: RuleParser::new(options),
        }
    }

    pub fn options(&self) -> ParseOptions {
        self.parser.options()
    }

    pub fn tokenize<'a>(&self, rule_text: &'a str) -> Vec<Token<'a>> {
        tokenize(rule_text)
    }

    /// 编译规则文本
    pub fn compile(&self, rule_text: &str) -> Ast {
        let tokens = tokenize(rule_text);
        let ast = self.parser.parse(&tokens);

        debug!(
            tokens = tokens.len(),
            nodes = ast.node_count(),
            complete = ast.is_complete(),
            "rule compiled"
        );

        ast
    }
}

/// 使用默认选项编译规则文本
pub fn compile(rule_text: &str) -> Ast {
    RuleCompiler::default().compile(rule_text)
}
