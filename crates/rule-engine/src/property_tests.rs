//! 编译、编解码与求值的性质测试
//!
//! 随机生成词法单元序列（包括不平衡括号、悬空操作符等畸形输入），
//! 检查编解码往返、文本往返与求值一致性对任意编译结果都成立。

use proptest::prelude::*;

use crate::codec::{decode, encode, from_json_str, to_json_string};
use crate::compiler::RuleCompiler;
use crate::executor::RuleExecutor;
use crate::models::Record;
use crate::parser::ParseOptions;

// ==================== 生成策略 ====================

/// 单个词法单元：括号、关键字、比较符、标识符、数字、引号字符串
fn token_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("(".to_string()),
        Just(")".to_string()),
        Just("AND".to_string()),
        Just("OR".to_string()),
        Just(">".to_string()),
        Just("<".to_string()),
        Just("=".to_string()),
        "[a-z_]{1,6}",
        "[0-9]{1,4}",
        "'[a-z ]{1,6}'",
        "[!@#]",
    ]
}

/// 空格分隔的词法单元序列
fn rule_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(token_strategy(), 0..40).prop_map(|tokens| tokens.join(" "))
}

fn options_strategy() -> impl Strategy<Value = ParseOptions> {
    prop_oneof![Just(ParseOptions::default()), Just(ParseOptions::legacy())]
}

fn record_strategy() -> impl Strategy<Value = Record> {
    (0..100i64, "[a-z]{1,4}", prop::option::of(0..100i64)).prop_map(|(age, name, level)| {
        let record = Record::new().with("age", age).with("name", name);
        match level {
            Some(level) => record.with("level", level),
            None => record,
        }
    })
}

// ==================== 性质 ====================

proptest! {
    /// 任意编译结果经过编码、解码后不变
    #[test]
    fn prop_codec_roundtrip(rule in rule_strategy(), options in options_strategy()) {
        let ast = RuleCompiler::new(options).compile(&rule);
        let decoded = decode(&encode(&ast));
        prop_assert_eq!(decoded, Ok(ast), "rule: {}", rule);
    }

    /// JSON 文本往返与值往返一致
    #[test]
    fn prop_json_text_roundtrip(rule in rule_strategy()) {
        let ast = RuleCompiler::default().compile(&rule);
        let text = to_json_string(&ast);

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        prop_assert_eq!(encode(&ast), value);
        prop_assert_eq!(from_json_str(&text).unwrap(), ast);
    }

    /// 任意可打印文本都能编译并往返，不会 panic
    #[test]
    fn prop_arbitrary_text_compiles(rule in "[ -~]{0,60}") {
        let ast = RuleCompiler::default().compile(&rule);
        prop_assert_eq!(decode(&encode(&ast)).unwrap(), ast);
    }

    /// 求值是纯函数，执行器与直接求值结果一致
    #[test]
    fn prop_evaluation_is_consistent(rule in rule_strategy(), record in record_strategy()) {
        let ast = RuleCompiler::default().compile(&rule);
        let matched = ast.evaluate(&record);

        prop_assert_eq!(ast.evaluate(&record), matched);
        prop_assert_eq!(RuleExecutor::new().execute(&ast, &record).matched, matched);
        prop_assert_eq!(
            RuleExecutor::new().with_trace().execute(&ast, &record).matched,
            matched
        );
    }

    /// 合并模式下 `field > n` 与整数比较一致
    #[test]
    fn prop_integer_comparison(age in 0..1000i64, threshold in 0..1000i64) {
        let record = Record::new().with("age", age);
        let compiler = RuleCompiler::default();

        prop_assert_eq!(compiler.compile(&format!("age > {}", threshold)).evaluate(&record), age > threshold);
        prop_assert_eq!(compiler.compile(&format!("age < {}", threshold)).evaluate(&record), age < threshold);
        prop_assert_eq!(compiler.compile(&format!("age = {}", threshold)).evaluate(&record), age == threshold);
    }
}
