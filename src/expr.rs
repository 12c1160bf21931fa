// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The expression translator (spec.md §4.3): dispatch over an abstract
//! expression tree to EdgeQL fragments.
//!
//! Design Note 2 replaces dynamic dispatch over expression-tree node types
//! with a tagged variant (`Expr`) and a `match`-based translator; Design Note
//! 5 replaces assembly-wide reflective discovery of operators with an
//! explicit, module-init-time registry (`operator_registry`).

use lazy_static::lazy_static;

use crate::error::BuilderError;
use crate::value::Value;
use crate::variables::QueryVariables;

/// The kind of an expression-tree node, used to key the operator registry
/// (spec.md §4.3: "Type-keyed translators… Operator registry: a flat list of
/// `EdgeQLOperator` descriptors `{ expression_kind?, template }`").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprKind {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    Not,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
    Contains,
    Like,
    ILike,
    Call(&'static str),
}

/// An abstract expression tree node. Lambdas are translated with the "it"
/// parameter exposed as the implicit subject (`.prop` member access), per
/// spec.md §4.3's "exposes the lambda's single parameter as the 'it' name".
#[derive(Debug, Clone)]
pub enum Expr {
    /// A literal value to be bound as a query variable (scalars only; object
    /// references go through the insert node's link resolver instead).
    Constant(Value),
    /// `null` — always renders as `{}`, never bound as a variable.
    Null,
    /// A type name rendered as its EdgeQL type name (spec.md §4.3: "types
    /// render as their EdgeQL type name"). Never a bindable value.
    TypeName(&'static str),
    /// An enum value, honoring an annotation selecting lowercase-string or
    /// numeric serialization (spec.md §4.3). Never a bindable value.
    EnumValue {
        lowercase_string: Option<&'static str>,
        numeric: Option<i64>,
    },
    /// Member access against the lambda's "it" parameter: `.edgedb_name`.
    Member(Box<Expr>, &'static str),
    /// Reference to the lambda's own parameter ("it" itself, e.g. passed
    /// whole to a nested call).
    It,
    Binary(ExprKind, Box<Expr>, Box<Expr>),
    Unary(ExprKind, Box<Expr>),
    /// A method call. If `target` is `None` the call is a free function.
    Call {
        method: &'static str,
        target: Option<Box<Expr>>,
        args: Vec<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },
}

/// `{ expression_kind?, template }` from spec.md §4.3. `template` uses
/// positional `{0}`, `{1}`, … placeholders; a trailing `?` on a placeholder
/// (e.g. `{1?}`) marks it optional — the renderer omits the placeholder and
/// its preceding separator when the corresponding argument is absent.
#[derive(Debug, Clone)]
pub struct EdgeQlOperator {
    pub kind: ExprKind,
    pub template: &'static str,
}

lazy_static! {
    /// Populated once at startup (spec.md §4.3: "both populated once at
    /// startup"), mirroring Design Note 5's explicit-registration
    /// replacement for reflective scanning.
    static ref OPERATOR_REGISTRY: Vec<EdgeQlOperator> = vec![
        EdgeQlOperator { kind: ExprKind::Eq, template: "{0} = {1}" },
        EdgeQlOperator { kind: ExprKind::Neq, template: "{0} != {1}" },
        EdgeQlOperator { kind: ExprKind::Lt, template: "{0} < {1}" },
        EdgeQlOperator { kind: ExprKind::Lte, template: "{0} <= {1}" },
        EdgeQlOperator { kind: ExprKind::Gt, template: "{0} > {1}" },
        EdgeQlOperator { kind: ExprKind::Gte, template: "{0} >= {1}" },
        EdgeQlOperator { kind: ExprKind::And, template: "{0} and {1}" },
        EdgeQlOperator { kind: ExprKind::Or, template: "{0} or {1}" },
        EdgeQlOperator { kind: ExprKind::Not, template: "not {0}" },
        EdgeQlOperator { kind: ExprKind::Add, template: "{0} + {1}" },
        EdgeQlOperator { kind: ExprKind::Sub, template: "{0} - {1}" },
        EdgeQlOperator { kind: ExprKind::Mul, template: "{0} * {1}" },
        EdgeQlOperator { kind: ExprKind::Div, template: "{0} / {1}" },
        EdgeQlOperator { kind: ExprKind::Mod, template: "{0} % {1}" },
        EdgeQlOperator { kind: ExprKind::Concat, template: "{0} ++ {1}" },
        EdgeQlOperator { kind: ExprKind::Contains, template: "contains({0}, {1})" },
        EdgeQlOperator { kind: ExprKind::Like, template: "{0} like {1}" },
        EdgeQlOperator { kind: ExprKind::ILike, template: "{0} ilike {1}" },
        EdgeQlOperator { kind: ExprKind::Call("to_bigint"), template: "to_bigint({0}, {1?})" },
        EdgeQlOperator { kind: ExprKind::Call("to_str"), template: "to_str({0}, {1?})" },
        EdgeQlOperator { kind: ExprKind::Call("len"), template: "len({0})" },
        EdgeQlOperator { kind: ExprKind::Call("count"), template: "count({0})" },
        EdgeQlOperator { kind: ExprKind::Call("exists"), template: "exists {0}" },
    ];
}

fn find_operator(kind: &ExprKind) -> Option<&'static EdgeQlOperator> {
    OPERATOR_REGISTRY.iter().find(|op| &op.kind == kind)
}

/// One piece of a parsed template: literal text, or a `{n}`/`{n?}` slot.
enum TemplateSegment<'a> {
    Text(&'a str),
    Slot { index: usize, optional: bool },
}

fn parse_template(template: &str) -> Vec<TemplateSegment<'_>> {
    let mut segments = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        if open > 0 {
            segments.push(TemplateSegment::Text(&rest[..open]));
        }
        let after_open = &rest[open + 1..];
        let close = after_open.find('}').expect("unterminated placeholder in operator template");
        let inner = &after_open[..close];
        let optional = inner.ends_with('?');
        let idx_str = if optional { &inner[..inner.len() - 1] } else { inner };
        let index: usize = idx_str.parse().expect("non-numeric placeholder index in operator template");
        segments.push(TemplateSegment::Slot { index, optional });
        rest = &after_open[close + 1..];
    }
    if !rest.is_empty() {
        segments.push(TemplateSegment::Text(rest));
    }
    segments
}

/// Renders `template` against `args`, where `None` marks an absent optional
/// argument. A `{n?}` placeholder and the literal text immediately preceding
/// it are both omitted when `args[n]` is `None` (spec.md §4.3: "the renderer
/// omits them (and the preceding separator) when the corresponding argument
/// is absent").
fn render_template(template: &str, args: &[Option<String>]) -> String {
    let segments = parse_template(template);
    let mut out = String::new();
    let mut pending_text: Option<&str> = None;
    for segment in segments {
        match segment {
            TemplateSegment::Text(text) => {
                if let Some(buffered) = pending_text.take() {
                    out.push_str(buffered);
                }
                pending_text = Some(text);
            }
            TemplateSegment::Slot { index, optional } => {
                let value = args.get(index).and_then(|v| v.clone());
                match value {
                    Some(v) => {
                        if let Some(buffered) = pending_text.take() {
                            out.push_str(buffered);
                        }
                        out.push_str(&v);
                    }
                    None if optional => {
                        // Drop the separator text buffered ahead of this slot too.
                        pending_text = None;
                    }
                    None => {
                        out.push_str("{}");
                    }
                }
            }
        }
    }
    if let Some(buffered) = pending_text.take() {
        out.push_str(buffered);
    }
    out
}

/// Per-call translation scope: tracks the lambda parameter stack so nested
/// lambdas (e.g. sub-queries within a filter) push/pop scopes without
/// interfering with an outer "it" (spec.md §4.3).
#[derive(Default)]
pub struct TranslationScope {
    it_stack: Vec<()>,
}

impl TranslationScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_lambda(&mut self) {
        self.it_stack.push(());
    }

    pub fn pop_lambda(&mut self) {
        self.it_stack.pop();
    }
}

/// Renders a constant via `parse_object` rules (spec.md §4.3): strings and
/// chars are quoted; enums honor an annotation that selects lowercase-string
/// or numeric serialization; types render as their EdgeQL type name; null
/// becomes `{}`; all else uses the value's canonical textual form. Constants
/// in the expression translator are always rendered inline — parameter
/// binding is a different mechanism, specific to the Insert node's
/// typed-object scalar-property path (spec.md §4.2.1), not to this
/// translator.
fn render_enum(lowercase_string: Option<&str>, numeric: Option<i64>) -> String {
    match (lowercase_string, numeric) {
        (Some(s), _) => format!("'{}'", s.to_lowercase()),
        (None, Some(n)) => n.to_string(),
        (None, None) => "{}".to_string(),
    }
}

/// Escapes a string for embedding inside EdgeQL double quotes.
fn quote_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Renders a byte string as an EdgeQL `bytes` literal using `\xHH` escapes
/// for every byte — always valid regardless of the underlying bytes being
/// printable text.
fn render_bytes_literal(bytes: &bytes::Bytes) -> String {
    let mut out = String::with_capacity(bytes.len() * 4 + 3);
    out.push_str("b\"");
    for byte in bytes.iter() {
        out.push_str(&format!("\\x{byte:02x}"));
    }
    out.push('"');
    out
}

/// Renders a `chrono::Duration` as an ISO-8601 duration string, the textual
/// form EdgeQL's `<duration>` cast accepts.
fn render_duration_literal(duration: &chrono::Duration) -> String {
    let micros = duration.num_microseconds().unwrap_or(0);
    let sign = if micros < 0 { "-" } else { "" };
    let whole_seconds = micros.abs() / 1_000_000;
    let sub_micros = micros.abs() % 1_000_000;
    if sub_micros == 0 {
        format!("<duration>\"{sign}PT{whole_seconds}S\"")
    } else {
        format!("<duration>\"{sign}PT{whole_seconds}.{sub_micros:06}S\"")
    }
}

/// `parse_object` (spec.md §4.3, §4.4): the canonical inline textual form of
/// a constant [`Value`], used for every `Expr::Constant` the translator
/// encounters.
fn render_literal(value: &Value) -> String {
    match value {
        Value::Null => "{}".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int16(n) => n.to_string(),
        Value::Int32(n) => n.to_string(),
        Value::Int64(n) => n.to_string(),
        Value::Float32(n) => n.to_string(),
        Value::Float64(n) => n.to_string(),
        Value::Decimal(digits) => digits.clone(),
        Value::Str(s) => quote_str(s),
        Value::Bytes(bytes) => render_bytes_literal(bytes),
        Value::Uuid(uuid) => format!("<uuid>\"{uuid}\""),
        Value::Json(json) => format!("<json>{}", quote_str(&json.to_string())),
        Value::LocalDate(date) => format!("<cal::local_date>\"{date}\""),
        Value::LocalTime(time) => format!("<cal::local_time>\"{time}\""),
        Value::LocalDateTime(dt) => format!("<cal::local_datetime>\"{dt}\""),
        Value::Instant(dt) => format!("<datetime>\"{}\"", dt.to_rfc3339()),
        Value::Duration(duration) => render_duration_literal(duration),
        Value::Array(items) => format!("[{}]", items.iter().map(render_literal).collect::<Vec<_>>().join(", ")),
        Value::Tuple(items) => format!("({})", items.iter().map(render_literal).collect::<Vec<_>>().join(", ")),
        Value::NamedTuple(fields) => format!(
            "({})",
            fields
                .iter()
                .map(|(name, v)| format!("{name} := {}", render_literal(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Value::Set(items) => format!("{{{}}}", items.iter().map(render_literal).collect::<Vec<_>>().join(", ")),
    }
}

/// Translates an expression tree to EdgeQL text. Constants render inline via
/// [`render_literal`]; `variables` is threaded through purely for the
/// recursive calls other expression kinds make (spec.md §4.3 never binds a
/// constant the translator renders).
pub fn translate(
    expr: &Expr,
    scope: &mut TranslationScope,
    variables: &mut QueryVariables,
) -> Result<String, BuilderError> {
    match expr {
        Expr::Constant(value) => Ok(render_literal(value)),
        Expr::Null => Ok("{}".to_string()),
        Expr::TypeName(name) => Ok((*name).to_string()),
        Expr::EnumValue { lowercase_string, numeric } => {
            Ok(render_enum(*lowercase_string, *numeric))
        }
        Expr::It => Ok(String::new()),
        Expr::Member(base, edgedb_name) => {
            let base_text = translate(base, scope, variables)?;
            if base_text.is_empty() {
                Ok(format!(".{edgedb_name}"))
            } else {
                Ok(format!("{base_text}.{edgedb_name}"))
            }
        }
        Expr::Binary(kind, lhs, rhs) => {
            let operator = find_operator(kind).ok_or_else(|| {
                BuilderError::UnsupportedExpression(format!("{kind:?}"))
            })?;
            let lhs_text = translate(lhs, scope, variables)?;
            let rhs_text = translate(rhs, scope, variables)?;
            Ok(render_template(operator.template, &[Some(lhs_text), Some(rhs_text)]))
        }
        Expr::Unary(kind, operand) => {
            let operator = find_operator(kind).ok_or_else(|| {
                BuilderError::UnsupportedExpression(format!("{kind:?}"))
            })?;
            let operand_text = translate(operand, scope, variables)?;
            Ok(render_template(operator.template, &[Some(operand_text)]))
        }
        Expr::Call { method, target, args } => {
            let operator = find_operator(&ExprKind::Call(method)).ok_or_else(|| {
                BuilderError::UnsupportedExpression(format!("call `{method}`"))
            })?;
            let mut rendered = Vec::new();
            if let Some(target) = target {
                rendered.push(Some(translate(target, scope, variables)?));
            }
            for arg in args {
                rendered.push(Some(translate(arg, scope, variables)?));
            }
            Ok(render_template(operator.template, &rendered))
        }
        Expr::Conditional { condition, if_true, if_false } => {
            let cond_text = translate(condition, scope, variables)?;
            let true_text = translate(if_true, scope, variables)?;
            let false_text = translate(if_false, scope, variables)?;
            Ok(format!("{true_text} if {cond_text} else {false_text}"))
        }
    }
}

/// The scalar [`ValueType`](crate::schema::ValueType) a bound [`Value`]
/// holds, for callers that need to restate a binding's EdgeQL scalar type
/// (the `with_globals` variable-alias path in `builder.rs`). `Null` and the
/// container kinds (`Tuple`, `NamedTuple`, `Set`) have no EdgeQL scalar
/// mapping — spec.md §7's `UnserializableType`, not a silent guess.
pub(crate) fn value_type_of(value: &Value) -> Result<crate::schema::ValueType, BuilderError> {
    use crate::schema::ValueType;
    Ok(match value {
        Value::Bool(_) => ValueType::Bool,
        Value::Int16(_) => ValueType::Int16,
        Value::Int32(_) => ValueType::Int32,
        Value::Int64(_) => ValueType::Int64,
        Value::Float32(_) => ValueType::Float32,
        Value::Float64(_) => ValueType::Float64,
        Value::Decimal(_) => ValueType::Decimal,
        Value::Str(_) => ValueType::Str,
        Value::Bytes(_) => ValueType::Bytes,
        Value::Uuid(_) => ValueType::Uuid,
        Value::Json(_) => ValueType::Json,
        Value::LocalDate(_) => ValueType::LocalDate,
        Value::LocalTime(_) => ValueType::LocalTime,
        Value::LocalDateTime(_) => ValueType::LocalDateTime,
        Value::Instant(_) => ValueType::Instant,
        Value::Duration(_) => ValueType::Duration,
        Value::Array(items) => {
            let inner = match items.first() {
                Some(item) => value_type_of(item)?,
                None => ValueType::Str,
            };
            ValueType::Array(Box::new(inner))
        }
        Value::Null => return Err(BuilderError::UnserializableType(ValueType::Unsupported("null"))),
        Value::Tuple(_) => return Err(BuilderError::UnserializableType(ValueType::Unsupported("tuple"))),
        Value::NamedTuple(_) => return Err(BuilderError::UnserializableType(ValueType::Unsupported("named tuple"))),
        Value::Set(_) => return Err(BuilderError::UnserializableType(ValueType::Unsupported("set"))),
    })
}

/// Translates a filter lambda `it => <bool expr>` (spec.md §8 scenario 6):
/// `it => it.age > 18 && it.name == "Alice"` → `.age > 18 and .name = "Alice"`.
pub fn translate_filter(
    body: &Expr,
    variables: &mut QueryVariables,
) -> Result<String, BuilderError> {
    let mut scope = TranslationScope::new();
    scope.push_lambda();
    let text = translate(body, &mut scope, variables)?;
    scope.pop_lambda();
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_translation_matches_scenario_six() {
        // it => it.age > 18 && it.name == "Alice"
        let body = Expr::Binary(
            ExprKind::And,
            Box::new(Expr::Binary(
                ExprKind::Gt,
                Box::new(Expr::Member(Box::new(Expr::It), "age")),
                Box::new(Expr::Constant(Value::Int32(18))),
            )),
            Box::new(Expr::Binary(
                ExprKind::Eq,
                Box::new(Expr::Member(Box::new(Expr::It), "name")),
                Box::new(Expr::Constant(Value::Str("Alice".to_string()))),
            )),
        );
        let mut variables = QueryVariables::new();
        let text = translate_filter(&body, &mut variables).unwrap();
        assert_eq!(text, ".age > 18 and .name = \"Alice\"");
        assert!(variables.is_empty(), "constants render inline, never bound");
    }

    #[test]
    fn string_constant_escapes_quotes_and_backslashes() {
        let rendered = render_literal(&Value::Str("a \"quoted\" \\path".to_string()));
        assert_eq!(rendered, "\"a \\\"quoted\\\" \\\\path\"");
    }

    #[test]
    fn null_constant_renders_as_empty_set() {
        assert_eq!(render_literal(&Value::Null), "{}");
    }

    #[test]
    fn array_constant_renders_elements_recursively() {
        let rendered = render_literal(&Value::Array(vec![Value::Int32(1), Value::Int32(2)]));
        assert_eq!(rendered, "[1, 2]");
    }

    #[test]
    fn value_type_of_rejects_null_tuple_named_tuple_and_set() {
        assert!(matches!(
            value_type_of(&Value::Null),
            Err(BuilderError::UnserializableType(crate::schema::ValueType::Unsupported("null")))
        ));
        assert!(matches!(
            value_type_of(&Value::Tuple(vec![])),
            Err(BuilderError::UnserializableType(crate::schema::ValueType::Unsupported("tuple")))
        ));
        assert!(matches!(
            value_type_of(&Value::NamedTuple(indexmap::IndexMap::new())),
            Err(BuilderError::UnserializableType(crate::schema::ValueType::Unsupported("named tuple")))
        ));
        assert!(matches!(
            value_type_of(&Value::Set(vec![])),
            Err(BuilderError::UnserializableType(crate::schema::ValueType::Unsupported("set")))
        ));
    }

    #[test]
    fn value_type_of_accepts_scalars() {
        assert_eq!(value_type_of(&Value::Str("x".to_string())).unwrap(), crate::schema::ValueType::Str);
        assert_eq!(value_type_of(&Value::Bool(true)).unwrap(), crate::schema::ValueType::Bool);
    }
}
