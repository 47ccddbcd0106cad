//! 规则引擎命令行工具
//!
//! 编译规则文本、查看 AST 编码，以及针对 JSON 记录评估规则。

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rule_engine::{Ast, ParseOptions, Record, RuleCompiler, RuleExecutor};
use rule_shared::{AppConfig, logging};
use tracing::{debug, info};

const SERVICE_NAME: &str = "rule-engine";

/// 规则引擎命令行工具
#[derive(Parser, Debug)]
#[command(name = "rule-engine")]
#[command(version, about = "规则编译与评估工具")]
#[command(propagate_version = true)]
struct Cli {
    /// 日志级别，覆盖配置文件 (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// 使用旧的分析行为：条件只保留第一个单元
    #[arg(long, global = true)]
    legacy: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 输出规则的词法单元，每行一个
    Tokenize {
        /// 规则文本
        rule: String,
    },

    /// 编译规则并输出 AST 的 JSON 编码
    Compile {
        /// 规则文本
        rule: String,
    },

    /// 编译规则并针对 JSON 记录评估
    Evaluate {
        /// 规则文本
        #[arg(short, long)]
        rule: String,

        /// JSON 记录，如 '{"age": 35, "department": "Sales"}'
        #[arg(long)]
        record: String,

        /// 输出评估追踪
        #[arg(long)]
        trace: bool,
    },

    /// 解码已保存的 AST 并针对 JSON 记录评估
    EvaluateStored {
        /// AST 的 JSON 编码
        #[arg(short, long)]
        ast: String,

        /// JSON 记录
        #[arg(long)]
        record: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(SERVICE_NAME).unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });
    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }
    logging::init(&config.log)?;

    let options = if cli.legacy {
        ParseOptions::legacy()
    } else {
        ParseOptions {
            merge_conditions: config.compiler.merge_conditions,
        }
    };
    debug!(?options, environment = %config.environment, "compiler configured");
    let compiler = RuleCompiler::new(options);

    match cli.command {
        Commands::Tokenize { rule } => {
            for token in compiler.tokenize(&rule) {
                println!("{}", token.text);
            }
        }
        Commands::Compile { rule } => {
            let ast = compiler.compile(&rule);
            if !ast.is_complete() {
                info!(rule = %rule, "rule compiled to an incomplete tree");
            }
            println!("{}", ast.to_json_string());
        }
        Commands::Evaluate {
            rule,
            record,
            trace,
        } => {
            let ast = compiler.compile(&rule);
            let record = Record::from_json(&record)?;
            run_evaluation(&ast, &record, trace);
        }
        Commands::EvaluateStored { ast, record } => {
            let ast = Ast::from_json_str(&ast).context("stored AST could not be read")?;
            let record = Record::from_json(&record)?;
            run_evaluation(&ast, &record, false);
        }
    }

    Ok(())
}

fn run_evaluation(ast: &Ast, record: &Record, trace: bool) {
    let executor = if trace {
        RuleExecutor::new().with_trace()
    } else {
        RuleExecutor::new()
    };
    let report = executor.execute(ast, record);

    for line in &report.evaluation_trace {
        println!("{}", line);
    }
    println!("{}", report.matched);
}
