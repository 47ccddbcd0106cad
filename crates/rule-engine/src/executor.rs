//! 规则执行器
//!
//! 短路求值执行规则树，返回匹配结果、命中的条件和评估追踪信息。

use crate::evaluator::ConditionEvaluator;
use crate::models::{Ast, AstNode, EvaluationReport, Record};
use crate::operators::LogicalOperator;
use std::time::Instant;

/// 规则执行器
#[derive(Debug, Clone, Default)]
pub struct RuleExecutor {
    /// 是否记录详细评估追踪
    trace_enabled: bool,
}

impl RuleExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 启用评估追踪
    pub fn with_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    /// 执行规则评估
    pub fn execute(&self, ast: &Ast, record: &Record) -> EvaluationReport {
        let start = Instant::now();
        let mut report = EvaluationReport::default();

        if ast.is_empty() && self.trace_enabled {
            report.evaluation_trace.push("root: 空规则 => NOT_MATCHED".to_string());
        }

        report.matched = self.evaluate_tree(ast.root(), record, &mut report);
        report.evaluation_time_ms = start.elapsed().as_millis() as i64;

        report
    }

    /// 短路求值，显式栈代替递归
    ///
    /// 路径按段保存，只有开启追踪时才拼成 `root.left.right` 形式。
    fn evaluate_tree(
        &self,
        root: Option<&AstNode>,
        record: &Record,
        report: &mut EvaluationReport,
    ) -> bool {
        enum Step<'a> {
            Visit {
                node: Option<&'a AstNode>,
                depth: usize,
                slot: Option<&'static str>,
            },
            Combine {
                op: LogicalOperator,
                right: Option<&'a AstNode>,
                depth: usize,
            },
            Finish {
                op: LogicalOperator,
                depth: usize,
            },
        }

        let mut steps = vec![Step::Visit {
            node: root,
            depth: 0,
            slot: None,
        }];
        let mut path: Vec<&'static str> = Vec::new();
        let mut matched = false;

        while let Some(step) = steps.pop() {
            match step {
                Step::Visit { node, depth, slot } => {
                    path.truncate(depth);
                    path.extend(slot);

                    match node {
                        None => {
                            if self.trace_enabled && !path.is_empty() {
                                report.evaluation_trace.push(format!(
                                    "{}: 缺失节点 => NOT_MATCHED",
                                    render_path(&path)
                                ));
                            }
                            matched = false;
                        }
                        Some(AstNode::Operand { text }) => {
                            matched = self.evaluate_condition(text, record, report, &path);
                        }
                        Some(AstNode::Operator { op, left, right }) => {
                            if self.trace_enabled {
                                report
                                    .evaluation_trace
                                    .push(format!("{}: 开始评估 {}", render_path(&path), op));
                            }
                            let depth = path.len();
                            steps.push(Step::Combine {
                                op: *op,
                                right: right.as_deref(),
                                depth,
                            });
                            steps.push(Step::Visit {
                                node: left.as_deref(),
                                depth,
                                slot: Some("left"),
                            });
                        }
                    }
                }
                // `matched` 此时是左子树的结果
                Step::Combine { op, right, depth } => {
                    path.truncate(depth);
                    let short_circuit = match op {
                        LogicalOperator::And => !matched,
                        LogicalOperator::Or => matched,
                    };

                    if short_circuit {
                        if self.trace_enabled {
                            report
                                .evaluation_trace
                                .push(format!("{}: {} 短路", render_path(&path), op));
                        }
                        continue;
                    }

                    steps.push(Step::Finish { op, depth });
                    steps.push(Step::Visit {
                        node: right,
                        depth,
                        slot: Some("right"),
                    });
                }
                Step::Finish { op, depth } => {
                    path.truncate(depth);
                    if self.trace_enabled {
                        report.evaluation_trace.push(format!(
                            "{}: {} => {}",
                            render_path(&path),
                            op,
                            verdict(matched)
                        ));
                    }
                }
            }
        }

        matched
    }

    fn evaluate_condition(
        &self,
        text: &str,
        record: &Record,
        report: &mut EvaluationReport,
        path: &[&str],
    ) -> bool {
        let matched = ConditionEvaluator::evaluate(text, record);

        if self.trace_enabled {
            report.evaluation_trace.push(format!(
                "{}: {} => {}",
                render_path(path),
                text,
                verdict(matched)
            ));
        }

        if matched {
            report.matched_conditions.push(text.to_string());
        }

        matched
    }
}

fn render_path(segments: &[&str]) -> String {
    let mut path = String::from("root");
    for segment in segments {
        path.push('.');
        path.push_str(segment);
    }
    path
}

fn verdict(matched: bool) -> &'static str {
    if matched { "MATCHED" } else { "NOT_MATCHED" }
}
