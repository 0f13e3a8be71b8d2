// src/expr/eval.rs

//! Evaluation of expressions over a read-only JSON scope.
//!
//! Missing data never raises an error: it evaluates to [`Val::Absent`], which
//! propagates through operators. Only malformed input (unknown identifiers,
//! type mismatches, division by zero) produces an [`ExprError`].

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::{Number, Value};

use crate::expr::parser::{BinaryOp, Expr, InterpPart, Program, UnaryOp};
use crate::expr::ExprError;

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Val {
    /// The referenced data does not exist (yet).
    Absent,
    Value(Value),
}

impl Val {
    pub fn is_absent(&self) -> bool {
        matches!(self, Val::Absent)
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Val::Absent => None,
            Val::Value(v) => Some(v),
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Val::Absent => None,
            Val::Value(v) => Some(v),
        }
    }
}

impl From<Value> for Val {
    fn from(v: Value) -> Self {
        Val::Value(v)
    }
}

/// Values produced by a [`Program`], by binding name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bindings {
    values: BTreeMap<String, Val>,
}

impl Bindings {
    pub fn get(&self, name: &str) -> Option<&Val> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Program {
    /// Evaluate every binding in order against `root`.
    ///
    /// `root` must be an object; its keys (`context`, `parameter`) are the
    /// top-level identifiers.
    pub fn evaluate(&self, root: &Value) -> Result<Bindings, ExprError> {
        let mut locals = BTreeMap::new();
        for binding in &self.bindings {
            let val = {
                let scope = Scope {
                    root,
                    locals: &locals,
                };
                scope.eval(&binding.expr)?
            };
            locals.insert(binding.name.clone(), val);
        }
        Ok(Bindings { values: locals })
    }
}

/// Evaluate a single expression against `root` with no local bindings.
pub fn evaluate(expr: &Expr, root: &Value) -> Result<Val, ExprError> {
    let locals = BTreeMap::new();
    Scope {
        root,
        locals: &locals,
    }
    .eval(expr)
}

/// Render a value the way string interpolation shows it.
pub fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "struct",
    }
}

struct Scope<'a> {
    root: &'a Value,
    locals: &'a BTreeMap<String, Val>,
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn from_json(n: &Number) -> Num {
        match n.as_i64() {
            Some(i) => Num::Int(i),
            None => Num::Float(n.as_f64().unwrap_or(f64::NAN)),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    fn into_val(self) -> Result<Val, ExprError> {
        match self {
            Num::Int(i) => Ok(Val::Value(Value::from(i))),
            Num::Float(f) => Number::from_f64(f)
                .map(|n| Val::Value(Value::Number(n)))
                .ok_or_else(|| ExprError::TypeMismatch("arithmetic produced a non-finite number".into())),
        }
    }
}

impl Scope<'_> {
    fn eval(&self, expr: &Expr) -> Result<Val, ExprError> {
        match expr {
            Expr::Literal(v) => Ok(Val::Value(v.clone())),
            Expr::Bottom => Ok(Val::Absent),
            Expr::Ident(name) => self.lookup(name),
            Expr::Field(base, name) => {
                let base = self.eval(base)?;
                Ok(field(&base, name))
            }
            Expr::Index(base, index) => {
                let base = self.eval(base)?;
                let index = self.eval(index)?;
                index_into(&base, &index)
            }
            Expr::Unary(op, inner) => {
                let v = self.eval(inner)?;
                unary(*op, v)
            }
            Expr::Binary(BinaryOp::And, lhs, rhs) => self.eval_and(lhs, rhs),
            Expr::Binary(BinaryOp::Or, lhs, rhs) => self.eval_or(lhs, rhs),
            Expr::Binary(op @ (BinaryOp::Eq | BinaryOp::NotEq), lhs, rhs) => {
                self.eval_equality(*op, lhs, rhs)
            }
            Expr::Binary(op, lhs, rhs) => {
                let l = self.eval(lhs)?;
                let r = self.eval(rhs)?;
                binary(*op, l, r)
            }
            Expr::Interp(parts) => self.eval_interp(parts),
            Expr::Call(name, args) => self.eval_call(name, args),
        }
    }

    fn lookup(&self, name: &str) -> Result<Val, ExprError> {
        if let Some(v) = self.locals.get(name) {
            return Ok(v.clone());
        }
        match self.root.get(name) {
            Some(v) => Ok(Val::Value(v.clone())),
            None => Err(ExprError::UnknownIdentifier(name.to_string())),
        }
    }

    fn eval_bool(&self, expr: &Expr, op: &str) -> Result<Option<bool>, ExprError> {
        match self.eval(expr)? {
            Val::Absent => Ok(None),
            Val::Value(Value::Bool(b)) => Ok(Some(b)),
            Val::Value(other) => Err(ExprError::TypeMismatch(format!(
                "operand of '{op}' must be bool, got {}",
                type_name(&other)
            ))),
        }
    }

    fn eval_and(&self, lhs: &Expr, rhs: &Expr) -> Result<Val, ExprError> {
        match self.eval_bool(lhs, "&&")? {
            Some(false) => Ok(Val::Value(Value::Bool(false))),
            Some(true) => Ok(self
                .eval_bool(rhs, "&&")?
                .map(|b| Val::Value(Value::Bool(b)))
                .unwrap_or(Val::Absent)),
            None => match self.eval_bool(rhs, "&&")? {
                Some(false) => Ok(Val::Value(Value::Bool(false))),
                _ => Ok(Val::Absent),
            },
        }
    }

    fn eval_or(&self, lhs: &Expr, rhs: &Expr) -> Result<Val, ExprError> {
        match self.eval_bool(lhs, "||")? {
            Some(true) => Ok(Val::Value(Value::Bool(true))),
            Some(false) => Ok(self
                .eval_bool(rhs, "||")?
                .map(|b| Val::Value(Value::Bool(b)))
                .unwrap_or(Val::Absent)),
            None => match self.eval_bool(rhs, "||")? {
                Some(true) => Ok(Val::Value(Value::Bool(true))),
                _ => Ok(Val::Absent),
            },
        }
    }

    fn eval_equality(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Val, ExprError> {
        let negate = matches!(op, BinaryOp::NotEq);

        // `x == _|_` / `x != _|_` test for existence.
        let existence = match (lhs, rhs) {
            (Expr::Bottom, Expr::Bottom) => Some(Val::Absent),
            (Expr::Bottom, other) | (other, Expr::Bottom) => Some(self.eval(other)?),
            _ => None,
        };
        if let Some(v) = existence {
            let absent = v.is_absent();
            return Ok(Val::Value(Value::Bool(absent != negate)));
        }

        let l = self.eval(lhs)?;
        let r = self.eval(rhs)?;
        match (l, r) {
            (Val::Value(a), Val::Value(b)) => {
                let eq = values_equal(&a, &b);
                Ok(Val::Value(Value::Bool(eq != negate)))
            }
            _ => Ok(Val::Absent),
        }
    }

    fn eval_interp(&self, parts: &[InterpPart]) -> Result<Val, ExprError> {
        let mut out = String::new();
        let mut absent = false;
        for part in parts {
            match part {
                InterpPart::Lit(s) => out.push_str(s),
                InterpPart::Expr(e) => match self.eval(e)? {
                    // Keep evaluating so malformed parts still surface as errors.
                    Val::Absent => absent = true,
                    Val::Value(v) => out.push_str(&display_value(&v)),
                },
            }
        }
        if absent {
            Ok(Val::Absent)
        } else {
            Ok(Val::Value(Value::String(out)))
        }
    }

    fn eval_call(&self, name: &str, args: &[Expr]) -> Result<Val, ExprError> {
        match name {
            "len" => {
                let [arg] = args else {
                    return Err(ExprError::TypeMismatch(format!(
                        "len() takes 1 argument, got {}",
                        args.len()
                    )));
                };
                match self.eval(arg)? {
                    Val::Absent => Ok(Val::Absent),
                    Val::Value(Value::String(s)) => Ok(Val::Value(Value::from(s.chars().count()))),
                    Val::Value(Value::Array(a)) => Ok(Val::Value(Value::from(a.len()))),
                    Val::Value(Value::Object(o)) => Ok(Val::Value(Value::from(o.len()))),
                    Val::Value(other) => Err(ExprError::TypeMismatch(format!(
                        "len() of {}",
                        type_name(&other)
                    ))),
                }
            }
            other => Err(ExprError::UnknownFunction(other.to_string())),
        }
    }
}

fn field(base: &Val, name: &str) -> Val {
    match base {
        Val::Value(Value::Object(map)) => map
            .get(name)
            .cloned()
            .map(Val::Value)
            .unwrap_or(Val::Absent),
        _ => Val::Absent,
    }
}

fn index_into(base: &Val, index: &Val) -> Result<Val, ExprError> {
    let Val::Value(index) = index else {
        return Ok(Val::Absent);
    };
    match (base, index) {
        (Val::Absent, _) => Ok(Val::Absent),
        (Val::Value(Value::Object(map)), Value::String(key)) => Ok(map
            .get(key)
            .cloned()
            .map(Val::Value)
            .unwrap_or(Val::Absent)),
        (Val::Value(Value::Array(items)), Value::Number(n)) => {
            let item = n
                .as_u64()
                .and_then(|i| usize::try_from(i).ok())
                .and_then(|i| items.get(i));
            Ok(item.cloned().map(Val::Value).unwrap_or(Val::Absent))
        }
        (Val::Value(_), Value::String(_) | Value::Number(_)) => Ok(Val::Absent),
        (Val::Value(_), other) => Err(ExprError::TypeMismatch(format!(
            "index must be a string or number, got {}",
            type_name(other)
        ))),
    }
}

fn unary(op: UnaryOp, v: Val) -> Result<Val, ExprError> {
    let Val::Value(v) = v else {
        return Ok(Val::Absent);
    };
    match (op, v) {
        (UnaryOp::Not, Value::Bool(b)) => Ok(Val::Value(Value::Bool(!b))),
        (UnaryOp::Neg, Value::Number(n)) => match Num::from_json(&n) {
            Num::Int(i) => i
                .checked_neg()
                .map(|i| Val::Value(Value::from(i)))
                .ok_or_else(|| ExprError::TypeMismatch("integer overflow in negation".into())),
            Num::Float(f) => Num::Float(-f).into_val(),
        },
        (UnaryOp::Not, other) => Err(ExprError::TypeMismatch(format!(
            "'!' needs bool, got {}",
            type_name(&other)
        ))),
        (UnaryOp::Neg, other) => Err(ExprError::TypeMismatch(format!(
            "'-' needs number, got {}",
            type_name(&other)
        ))),
    }
}

fn binary(op: BinaryOp, l: Val, r: Val) -> Result<Val, ExprError> {
    let (Val::Value(l), Val::Value(r)) = (l, r) else {
        return Ok(Val::Absent);
    };

    match op {
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ord = compare(&l, &r, op)?;
            let result = match op {
                BinaryOp::Lt => ord == Ordering::Less,
                BinaryOp::Le => ord != Ordering::Greater,
                BinaryOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            };
            Ok(Val::Value(Value::Bool(result)))
        }
        BinaryOp::Add => match (&l, &r) {
            (Value::String(a), Value::String(b)) => Ok(Val::Value(Value::String(format!("{a}{b}")))),
            (Value::Number(a), Value::Number(b)) => arith(op, Num::from_json(a), Num::from_json(b)),
            _ => Err(mismatch("+", &l, &r)),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => match (&l, &r) {
            (Value::Number(a), Value::Number(b)) => arith(op, Num::from_json(a), Num::from_json(b)),
            _ => Err(mismatch(op_symbol(op), &l, &r)),
        },
        // Logical and equality operators are handled with short-circuiting
        // in `Scope::eval`.
        BinaryOp::And | BinaryOp::Or | BinaryOp::Eq | BinaryOp::NotEq => Err(ExprError::TypeMismatch(
            format!("operator '{}' evaluated out of place", op_symbol(op)),
        )),
    }
}

fn op_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Or => "||",
        BinaryOp::And => "&&",
        BinaryOp::Eq => "==",
        BinaryOp::NotEq => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Rem => "%",
    }
}

fn mismatch(op: &str, l: &Value, r: &Value) -> ExprError {
    ExprError::TypeMismatch(format!(
        "cannot apply '{op}' to {} and {}",
        type_name(l),
        type_name(r)
    ))
}

fn compare(l: &Value, r: &Value, op: BinaryOp) -> Result<Ordering, ExprError> {
    match (l, r) {
        (Value::Number(a), Value::Number(b)) => {
            let ord = match (Num::from_json(a), Num::from_json(b)) {
                (Num::Int(x), Num::Int(y)) => x.cmp(&y),
                (x, y) => x
                    .as_f64()
                    .partial_cmp(&y.as_f64())
                    .unwrap_or(Ordering::Equal),
            };
            Ok(ord)
        }
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(mismatch(op_symbol(op), l, r)),
    }
}

fn arith(op: BinaryOp, a: Num, b: Num) -> Result<Val, ExprError> {
    let overflow = || ExprError::TypeMismatch("integer overflow".into());
    let result = match (op, a, b) {
        (BinaryOp::Div, _, b) if b.as_f64() == 0.0 => return Err(ExprError::DivisionByZero),
        (BinaryOp::Rem, _, b) if b.as_f64() == 0.0 => return Err(ExprError::DivisionByZero),
        (BinaryOp::Add, Num::Int(x), Num::Int(y)) => Num::Int(x.checked_add(y).ok_or_else(overflow)?),
        (BinaryOp::Sub, Num::Int(x), Num::Int(y)) => Num::Int(x.checked_sub(y).ok_or_else(overflow)?),
        (BinaryOp::Mul, Num::Int(x), Num::Int(y)) => Num::Int(x.checked_mul(y).ok_or_else(overflow)?),
        (BinaryOp::Rem, Num::Int(x), Num::Int(y)) => Num::Int(x.checked_rem(y).ok_or_else(overflow)?),
        (BinaryOp::Div, x, y) => Num::Float(x.as_f64() / y.as_f64()),
        (BinaryOp::Add, x, y) => Num::Float(x.as_f64() + y.as_f64()),
        (BinaryOp::Sub, x, y) => Num::Float(x.as_f64() - y.as_f64()),
        (BinaryOp::Mul, x, y) => Num::Float(x.as_f64() * y.as_f64()),
        (BinaryOp::Rem, x, y) => Num::Float(x.as_f64() % y.as_f64()),
        (other, _, _) => {
            return Err(ExprError::TypeMismatch(format!(
                "'{}' is not arithmetic",
                op_symbol(other)
            )));
        }
    };
    result.into_val()
}

/// JSON equality where `1 == 1.0`.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (Num::from_json(x), Num::from_json(y)) {
            (Num::Int(i), Num::Int(j)) => i == j,
            (i, j) => i.as_f64() == j.as_f64(),
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval_str(src: &str, root: &Value) -> Result<Val, ExprError> {
        evaluate(&Expr::parse(src)?, root)
    }

    fn root() -> Value {
        json!({
            "context": {
                "output": {
                    "spec": { "replicas": 3 },
                    "status": { "readyReplicas": 1, "phase": "Running" }
                },
                "outputs": {
                    "cm": { "data": { "value": "2" } }
                }
            },
            "parameter": { "threshold": 0.5, "tags": ["a", "b"] }
        })
    }

    #[test]
    fn compares_live_fields() {
        let r = root();
        assert_eq!(eval_str("context.output.status.readyReplicas > 0", &r).unwrap(), Val::Value(json!(true)));
        assert_eq!(
            eval_str("context.output.status.readyReplicas == context.output.spec.replicas", &r).unwrap(),
            Val::Value(json!(false))
        );
        assert_eq!(eval_str(r#"context.outputs.cm.data.value != "2""#, &r).unwrap(), Val::Value(json!(false)));
    }

    #[test]
    fn absent_fields_propagate_instead_of_failing() {
        let r = json!({ "context": {}, "parameter": {} });
        assert_eq!(eval_str("context.output.status.readyReplicas > 0", &r).unwrap(), Val::Absent);
        assert_eq!(eval_str("!(context.output.status.ready)", &r).unwrap(), Val::Absent);
        assert_eq!(eval_str("context.output.x == _|_", &r).unwrap(), Val::Value(json!(true)));
        assert_eq!(eval_str("context.output.x != _|_", &r).unwrap(), Val::Value(json!(false)));
    }

    #[test]
    fn short_circuit_decides_over_absent() {
        let r = json!({ "context": {}, "parameter": {} });
        assert_eq!(eval_str("context.x > 1 && false", &r).unwrap(), Val::Value(json!(false)));
        assert_eq!(eval_str("context.x > 1 || true", &r).unwrap(), Val::Value(json!(true)));
        assert_eq!(eval_str("context.x > 1 || false", &r).unwrap(), Val::Absent);
        assert_eq!(
            eval_str("context.x != _|_ && context.x > 1", &r).unwrap(),
            Val::Value(json!(false))
        );
    }

    #[test]
    fn arithmetic_and_strings() {
        let r = root();
        assert_eq!(eval_str("1 + 2 * 3", &r).unwrap(), Val::Value(json!(7)));
        assert_eq!(eval_str("7 / 2", &r).unwrap(), Val::Value(json!(3.5)));
        assert_eq!(eval_str("7 % 4", &r).unwrap(), Val::Value(json!(3)));
        assert_eq!(eval_str("1 == 1.0", &r).unwrap(), Val::Value(json!(true)));
        assert_eq!(eval_str(r#""a" + "b""#, &r).unwrap(), Val::Value(json!("ab")));
        assert_eq!(eval_str("len(parameter.tags)", &r).unwrap(), Val::Value(json!(2)));
        assert_eq!(eval_str("parameter.tags[1]", &r).unwrap(), Val::Value(json!("b")));
        assert_eq!(eval_str("parameter.tags[9]", &r).unwrap(), Val::Absent);
    }

    #[test]
    fn interpolation_formats_values() {
        let r = root();
        assert_eq!(
            eval_str(
                r#""Ready:\(context.output.status.readyReplicas)/\(context.output.spec.replicas)""#,
                &r
            )
            .unwrap(),
            Val::Value(json!("Ready:1/3"))
        );
        assert_eq!(eval_str(r#""x=\(context.nothing)""#, &r).unwrap(), Val::Absent);
    }

    #[test]
    fn malformed_input_is_an_error() {
        let r = root();
        assert!(matches!(eval_str("nope.x", &r), Err(ExprError::UnknownIdentifier(_))));
        assert!(matches!(eval_str(r#""a" > 1"#, &r), Err(ExprError::TypeMismatch(_))));
        assert!(matches!(eval_str("1 / 0", &r), Err(ExprError::DivisionByZero)));
        assert!(matches!(eval_str("!3", &r), Err(ExprError::TypeMismatch(_))));
        assert!(matches!(eval_str("size(1)", &r), Err(ExprError::UnknownFunction(_))));
    }

    #[test]
    fn program_bindings_see_earlier_ones() {
        let p = Program::parse("ready: context.output.status.readyReplicas\nisHealth: ready >= 1").unwrap();
        let b = p.evaluate(&root()).unwrap();
        assert_eq!(b.get("isHealth"), Some(&Val::Value(json!(true))));
        assert_eq!(b.len(), 2);
    }
}
