//! AST 编解码
//!
//! 将 AST 转换为可存储、可传输的嵌套 JSON 结构：
//!
//! ```json
//! {"kind": "operator", "value": "AND", "left": {...}, "right": null}
//! ```
//!
//! 缺失的子节点显式编码为 `null`，解码是编码的精确逆过程。
//! 结构非法的记录返回 [`DecodeError`]，不会用默认值替代。
//!
//! 左深链式规则的编码深度与条件数相同。编码、解码、文本读写以及 [`SerializedNode`]
//! 的克隆与释放都用显式栈完成，不依赖调用栈深度。

use crate::error::{DecodeError, Result};
use crate::models::{Ast, AstNode};
use crate::operators::LogicalOperator;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::Deref;

const KIND_OPERATOR: &str = "operator";
const KIND_OPERAND: &str = "operand";

const ROOT_PATH: &str = "$";

// ==================== 编码结果 ====================

/// 编码后的节点结构
///
/// 序列化时与内部的 JSON 值完全一致（`serde(transparent)`）。
#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerializedNode(Value);

impl SerializedNode {
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(mut self) -> Value {
        std::mem::take(&mut self.0)
    }
}

impl From<Value> for SerializedNode {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl Deref for SerializedNode {
    type Target = Value;

    fn deref(&self) -> &Value {
        &self.0
    }
}

impl PartialEq<Value> for SerializedNode {
    fn eq(&self, other: &Value) -> bool {
        self.0 == *other
    }
}

impl Clone for SerializedNode {
    fn clone(&self) -> Self {
        Self(clone_value(&self.0))
    }
}

impl Drop for SerializedNode {
    fn drop(&mut self) {
        release(std::mem::take(&mut self.0));
    }
}

// ==================== 编码 ====================

/// 编码整棵树，空树编码为 `null`
pub fn encode(ast: &Ast) -> SerializedNode {
    SerializedNode(encode_tree(ast.root()))
}

/// 编码单个节点
pub fn encode_node(node: &AstNode) -> SerializedNode {
    SerializedNode(encode_tree(Some(node)))
}

fn encode_tree(root: Option<&AstNode>) -> Value {
    enum Step<'a> {
        Visit(Option<&'a AstNode>),
        Join(LogicalOperator),
    }

    let mut steps = vec![Step::Visit(root)];
    let mut built: Vec<Value> = Vec::new();

    while let Some(step) = steps.pop() {
        match step {
            Step::Visit(None) => built.push(Value::Null),
            Step::Visit(Some(AstNode::Operand { text })) => {
                built.push(node_object(KIND_OPERAND, text, Value::Null, Value::Null));
            }
            Step::Visit(Some(AstNode::Operator { op, left, right })) => {
                steps.push(Step::Join(*op));
                steps.push(Step::Visit(right.as_deref()));
                steps.push(Step::Visit(left.as_deref()));
            }
            Step::Join(op) => {
                let right = built.pop().unwrap_or(Value::Null);
                let left = built.pop().unwrap_or(Value::Null);
                built.push(node_object(KIND_OPERATOR, op.keyword(), left, right));
            }
        }
    }

    built.pop().unwrap_or(Value::Null)
}

/// 子节点按值移入，避免 `json!` 对已编码子树的整体复制
fn node_object(kind: &str, value: &str, left: Value, right: Value) -> Value {
    let mut object = Map::new();
    object.insert("kind".to_string(), Value::from(kind));
    object.insert("value".to_string(), Value::from(value));
    object.insert("left".to_string(), left);
    object.insert("right".to_string(), right);
    Value::Object(object)
}

// ==================== 解码 ====================

/// 解码整棵树，`null` 解码为空树
pub fn decode(value: &Value) -> std::result::Result<Ast, DecodeError> {
    decode_tree(value).map(Ast::new)
}

/// 解码单个节点，根必须是对象
pub fn decode_node(value: &Value) -> std::result::Result<AstNode, DecodeError> {
    decode_tree(value)?.ok_or_else(|| DecodeError::NotAnObject {
        path: ROOT_PATH.to_string(),
    })
}

/// 通过校验的单个节点
enum NodeFields<'a> {
    Operator {
        op: LogicalOperator,
        left: &'a Value,
        right: &'a Value,
    },
    Operand(&'a str),
}

fn decode_tree(root: &Value) -> std::result::Result<Option<AstNode>, DecodeError> {
    enum Step<'a> {
        Visit {
            value: &'a Value,
            depth: usize,
            slot: Option<&'static str>,
        },
        Join(LogicalOperator),
    }

    let mut steps = vec![Step::Visit {
        value: root,
        depth: 0,
        slot: None,
    }];
    // 当前节点的路径段，只在出错时拼成字符串
    let mut path: Vec<&'static str> = Vec::new();
    let mut built: Vec<Option<AstNode>> = Vec::new();

    while let Some(step) = steps.pop() {
        match step {
            Step::Visit { value, depth, slot } => {
                path.truncate(depth);
                path.extend(slot);

                if value.is_null() {
                    built.push(None);
                    continue;
                }

                match node_fields(value, &path)? {
                    NodeFields::Operand(text) => built.push(Some(AstNode::operand(text))),
                    NodeFields::Operator { op, left, right } => {
                        let depth = path.len();
                        steps.push(Step::Join(op));
                        steps.push(Step::Visit {
                            value: right,
                            depth,
                            slot: Some("right"),
                        });
                        steps.push(Step::Visit {
                            value: left,
                            depth,
                            slot: Some("left"),
                        });
                    }
                }
            }
            Step::Join(op) => {
                let right = built.pop().flatten();
                let left = built.pop().flatten();
                built.push(Some(AstNode::operator(op, left, right)));
            }
        }
    }

    Ok(built.pop().flatten())
}

fn node_fields<'a>(
    value: &'a Value,
    path: &[&str],
) -> std::result::Result<NodeFields<'a>, DecodeError> {
    let object = value.as_object().ok_or_else(|| DecodeError::NotAnObject {
        path: render_path(path),
    })?;

    let kind = string_field(object, "kind", path)?;
    let node_value = string_field(object, "value", path)?;
    let left = required_field(object, "left", path)?;
    let right = required_field(object, "right", path)?;

    match kind {
        KIND_OPERATOR => {
            let op = LogicalOperator::from_keyword(node_value).ok_or_else(|| {
                DecodeError::UnknownOperator {
                    path: render_path(path),
                    operator: node_value.to_string(),
                }
            })?;
            Ok(NodeFields::Operator { op, left, right })
        }
        KIND_OPERAND => {
            if !left.is_null() || !right.is_null() {
                return Err(DecodeError::OperandWithChildren {
                    path: render_path(path),
                });
            }
            Ok(NodeFields::Operand(node_value))
        }
        other => Err(DecodeError::UnknownKind {
            path: render_path(path),
            kind: other.to_string(),
        }),
    }
}

fn render_path(segments: &[&str]) -> String {
    let mut path = String::from(ROOT_PATH);
    for segment in segments {
        path.push('.');
        path.push_str(segment);
    }
    path
}

fn required_field<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
    path: &[&str],
) -> std::result::Result<&'a Value, DecodeError> {
    object.get(field).ok_or_else(|| DecodeError::MissingField {
        path: render_path(path),
        field,
    })
}

fn string_field<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
    path: &[&str],
) -> std::result::Result<&'a str, DecodeError> {
    let value = required_field(object, field, path)?;
    value.as_str().ok_or_else(|| DecodeError::InvalidFieldType {
        path: render_path(path),
        field,
        expected: "string",
        actual: type_name(value),
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ==================== JSON 文本 ====================

/// 输出紧凑的 JSON 文本，字段顺序为 kind / value / left / right
pub fn to_json_string(ast: &Ast) -> String {
    enum Piece<'a> {
        Node(Option<&'a AstNode>),
        Text(&'static str),
    }

    let mut out = String::new();
    let mut pending = vec![Piece::Node(ast.root())];

    while let Some(piece) = pending.pop() {
        match piece {
            Piece::Text(text) => out.push_str(text),
            Piece::Node(None) => out.push_str("null"),
            Piece::Node(Some(AstNode::Operand { text })) => {
                out.push_str(r#"{"kind":"operand","value":"#);
                out.push_str(&Value::from(text.as_str()).to_string());
                out.push_str(r#","left":null,"right":null}"#);
            }
            Piece::Node(Some(AstNode::Operator { op, left, right })) => {
                out.push_str(r#"{"kind":"operator","value":""#);
                out.push_str(op.keyword());
                out.push_str(r#"","left":"#);
                pending.push(Piece::Text("}"));
                pending.push(Piece::Node(right.as_deref()));
                pending.push(Piece::Text(r#","right":"#));
                pending.push(Piece::Node(left.as_deref()));
            }
        }
    }

    out
}

/// 从 JSON 文本解码
///
/// 关闭 serde_json 的默认递归上限（128 层），解析栈由 `serde_stacker` 按需扩展。
pub fn from_json_str(text: &str) -> Result<Ast> {
    let value = parse_json_text(text)?;
    let decoded = decode(&value);
    release(value);
    Ok(decoded?)
}

fn parse_json_text(text: &str) -> serde_json::Result<Value> {
    let mut deserializer = serde_json::Deserializer::from_str(text);
    deserializer.disable_recursion_limit();
    let value = Value::deserialize(serde_stacker::Deserializer::new(&mut deserializer))?;

    if let Err(e) = deserializer.end() {
        release(value);
        return Err(e);
    }
    Ok(value)
}

// ==================== 深层 JSON 值 ====================

/// 逐层拆开 JSON 值再释放，每一层的释放都是浅层的
fn release(value: Value) {
    let mut pending = vec![value];
    while let Some(value) = pending.pop() {
        match value {
            Value::Object(map) => pending.extend(map.into_iter().map(|(_, child)| child)),
            Value::Array(items) => pending.extend(items),
            _ => {}
        }
    }
}

fn clone_value(value: &Value) -> Value {
    enum Step<'a> {
        Visit(&'a Value),
        Object(&'a Map<String, Value>),
        Array(usize),
    }

    let mut steps = vec![Step::Visit(value)];
    let mut built: Vec<Value> = Vec::new();

    while let Some(step) = steps.pop() {
        match step {
            Step::Visit(Value::Object(map)) => {
                steps.push(Step::Object(map));
                steps.extend(map.values().rev().map(Step::Visit));
            }
            Step::Visit(Value::Array(items)) => {
                steps.push(Step::Array(items.len()));
                steps.extend(items.iter().rev().map(Step::Visit));
            }
            Step::Visit(scalar) => built.push(scalar.clone()),
            Step::Object(map) => {
                let values = built.split_off(built.len() - map.len());
                built.push(Value::Object(map.keys().cloned().zip(values).collect()));
            }
            Step::Array(len) => {
                let items = built.split_off(built.len() - len);
                built.push(Value::Array(items));
            }
        }
    }

    built.pop().unwrap_or(Value::Null)
}

impl Ast {
    pub fn encode(&self) -> SerializedNode {
        encode(self)
    }

    pub fn decode(value: &Value) -> std::result::Result<Self, DecodeError> {
        decode(value)
    }

    pub fn to_json_string(&self) -> String {
        to_json_string(self)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        from_json_str(text)
    }
}
