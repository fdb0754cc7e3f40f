//! Formula evaluation.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use super::FormulaError;
use super::parser::{BinaryOp, Expr, Function, UnaryOp};
use crate::value::{Number, Value};

type EvalResult = Result<Value, FormulaError>;

/// Resolves free names in a formula.
pub trait Scope {
    fn lookup(&self, name: &str) -> Option<Value>;
}

/// Names bound with `--before-all`.
pub type Bindings = HashMap<String, Value>;

impl Scope for Bindings {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// Evaluate bindings in order; each sees the ones before it.
pub fn evaluate_bindings(bindings: &[(String, Expr)]) -> Result<Bindings, (String, FormulaError)> {
    let mut scope = Bindings::new();
    for (name, expr) in bindings {
        let value = evaluate(expr, &scope).map_err(|e| (name.clone(), e))?;
        scope.insert(name.clone(), value);
    }
    Ok(scope)
}

pub fn evaluate(expr: &Expr, scope: &dyn Scope) -> EvalResult {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Name(name) => scope
            .lookup(name)
            .ok_or_else(|| FormulaError::UnknownName(name.clone())),
        Expr::Unary(UnaryOp::Not, operand) => Ok(Value::Bool(!evaluate(operand, scope)?.is_truthy())),
        Expr::Unary(UnaryOp::Neg, operand) => negate(evaluate(operand, scope)?),
        Expr::And(left, right) => {
            let left = evaluate(left, scope)?;
            if left.is_truthy() { evaluate(right, scope) } else { Ok(left) }
        }
        Expr::Or(left, right) => {
            let left = evaluate(left, scope)?;
            if left.is_truthy() { Ok(left) } else { evaluate(right, scope) }
        }
        Expr::Binary(op, left, right) => {
            let left = evaluate(left, scope)?;
            let right = evaluate(right, scope)?;
            binary(*op, left, right)
        }
        Expr::Call(Function::If, args) => {
            let [cond, then, otherwise] = args.as_slice() else {
                return Err(FormulaError::Arity {
                    function: Function::If.name(),
                    expected: "3",
                    found: args.len(),
                });
            };
            if evaluate(cond, scope)?.is_truthy() {
                evaluate(then, scope)
            } else {
                evaluate(otherwise, scope)
            }
        }
        Expr::Call(function, args) => {
            let args = args
                .iter()
                .map(|arg| evaluate(arg, scope))
                .collect::<Result<Vec<_>, _>>()?;
            call(*function, args)
        }
        Expr::Index(container, index) => {
            let container = evaluate(container, scope)?;
            let index = evaluate(index, scope)?;
            subscript(container, index)
        }
    }
}

/// `list[int]`, counting from the end when negative, or `record['field']`.
fn subscript(container: Value, index: Value) -> EvalResult {
    match (container, index) {
        (Value::List(mut items), Value::Int(i)) => {
            let len = items.len();
            let pos = if i < 0 { i.checked_add(len as i64) } else { Some(i) };
            match pos.and_then(|p| usize::try_from(p).ok()).filter(|&p| p < len) {
                Some(p) => Ok(items.swap_remove(p)),
                None => Err(FormulaError::IndexOutOfRange { index: i, len }),
            }
        }
        (Value::Record(mut fields), Value::Str(name)) => {
            fields.swap_remove(&name).ok_or(FormulaError::MissingField(name))
        }
        (container, index) => Err(FormulaError::type_error(format!(
            "'{}' cannot be indexed by '{}'",
            container.type_name(),
            index.type_name()
        ))),
    }
}

fn negate(value: Value) -> EvalResult {
    match value.as_number() {
        Some(Number::Int(n)) => n.checked_neg().map(Value::Int).ok_or(FormulaError::Overflow),
        Some(Number::Float(f)) => Ok(Value::Float(-f)),
        None => Err(FormulaError::type_error(format!(
            "bad operand type for unary -: '{}'",
            value.type_name()
        ))),
    }
}

fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        Some(q - 1)
    } else {
        Some(q)
    }
}

fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Some(r + b)
    } else {
        Some(r)
    }
}

fn float_mod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && ((r < 0.0) != (b < 0.0)) { r + b } else { r }
}

fn arithmetic(op: BinaryOp, a: Number, b: Number) -> EvalResult {
    if matches!(op, BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod) && b.as_f64() == 0.0 {
        return Err(FormulaError::DivisionByZero);
    }
    if let (Number::Int(a), Number::Int(b)) = (a, b) {
        let result = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div => return Ok(Value::Float(a as f64 / b as f64)),
            BinaryOp::FloorDiv => floor_div(a, b),
            BinaryOp::Mod => floor_mod(a, b),
            _ => unreachable!("comparison handled by caller"),
        };
        return result.map(Value::Int).ok_or(FormulaError::Overflow);
    }
    let (a, b) = (a.as_f64(), b.as_f64());
    Ok(Value::Float(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::FloorDiv => (a / b).floor(),
        BinaryOp::Mod => float_mod(a, b),
        _ => unreachable!("comparison handled by caller"),
    }))
}

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::FloorDiv => "//",
        BinaryOp::Mod => "%",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> EvalResult {
    let mismatch = |left: &Value, right: &Value| {
        FormulaError::type_error(format!(
            "unsupported operand types for {}: '{}' and '{}'",
            symbol(op),
            left.type_name(),
            right.type_name()
        ))
    };
    match op {
        BinaryOp::Eq => Ok(Value::Bool(left.loose_eq(&right))),
        BinaryOp::Ne => Ok(Value::Bool(!left.loose_eq(&right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = left.compare(&right).ok_or_else(|| mismatch(&left, &right))?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        _ => match (left, right) {
            (Value::Str(a), Value::Str(b)) if op == BinaryOp::Add => Ok(Value::Str(a + &b)),
            (Value::List(mut a), Value::List(b)) if op == BinaryOp::Add => {
                a.extend(b);
                Ok(Value::List(a))
            }
            (left, right) => match (left.as_number(), right.as_number()) {
                (Some(a), Some(b)) => arithmetic(op, a, b),
                _ => Err(mismatch(&left, &right)),
            },
        },
    }
}

fn expect_list(function: Function, value: Value) -> Result<Vec<Value>, FormulaError> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(FormulaError::type_error(format!(
            "{}() expects a list, got '{}'",
            function.name(),
            other.type_name()
        ))),
    }
}

/// Non-blank values of a list, read as numbers.
fn numbers(function: Function, items: &[Value]) -> Result<Vec<Number>, FormulaError> {
    items
        .iter()
        .filter(|v| !v.is_blank())
        .map(|v| {
            v.coerce_number().ok_or_else(|| {
                FormulaError::type_error(format!("{}() cannot use '{v}' as a number", function.name()))
            })
        })
        .collect()
}

fn sum(values: &[Number]) -> EvalResult {
    let mut total = Number::Int(0);
    for &value in values {
        total = match (total, value) {
            (Number::Int(a), Number::Int(b)) => Number::Int(a.checked_add(b).ok_or(FormulaError::Overflow)?),
            (a, b) => Number::Float(a.as_f64() + b.as_f64()),
        };
    }
    Ok(total.into_value())
}

fn extreme(function: Function, args: Vec<Value>, wanted: Ordering) -> EvalResult {
    let items = if args.len() == 1 {
        expect_list(function, args.into_iter().next().unwrap_or(Value::Null))?
    } else {
        args
    };
    let present: Vec<Value> = items.into_iter().filter(|v| !v.is_blank()).collect();
    let candidates: Vec<Value> = match present.iter().map(Value::coerce_number).collect::<Option<Vec<_>>>() {
        Some(numbers) => numbers.into_iter().map(Number::into_value).collect(),
        None => present,
    };
    let mut best: Option<Value> = None;
    for value in candidates {
        best = Some(match best {
            None => value,
            Some(current) => {
                let ordering = value.compare(&current).ok_or_else(|| {
                    FormulaError::type_error(format!(
                        "{}() cannot compare '{}' and '{}'",
                        function.name(),
                        value.type_name(),
                        current.type_name()
                    ))
                })?;
                if ordering == wanted { value } else { current }
            }
        });
    }
    Ok(best.unwrap_or(Value::Null))
}

fn round(value: Value, digits: Option<Value>) -> EvalResult {
    let number = value
        .as_number()
        .ok_or_else(|| FormulaError::type_error(format!("round() expects a number, got '{}'", value.type_name())))?;
    let digits = match digits {
        None | Some(Value::Null) => None,
        Some(Value::Int(n)) => Some(n),
        Some(other) => {
            return Err(FormulaError::type_error(format!(
                "round() digits must be int, got '{}'",
                other.type_name()
            )));
        }
    };
    match (number, digits) {
        (Number::Int(n), None) => Ok(Value::Int(n)),
        (Number::Int(n), Some(digits)) => round_int(n, digits),
        (Number::Float(f), None) => {
            let rounded = f.round_ties_even();
            if !rounded.is_finite() || rounded.abs() >= i64::MAX as f64 {
                return Err(FormulaError::Overflow);
            }
            Ok(Value::Int(rounded as i64))
        }
        (Number::Float(f), Some(n)) => {
            let scale = 10f64.powi(n.clamp(-308, 308) as i32);
            let scaled = f * scale;
            if !scaled.is_finite() {
                // too many digits to matter, or `f` is not finite
                return Ok(Value::Float(f));
            }
            Ok(Value::Float(scaled.round_ties_even() / scale))
        }
    }
}

/// Round `n` to a multiple of `10^-digits`, ties to even.
fn round_int(n: i64, digits: i64) -> EvalResult {
    if digits >= 0 {
        return Ok(Value::Int(n));
    }
    let Some(unit) = u32::try_from(-digits).ok().and_then(|exp| 10i64.checked_pow(exp)) else {
        return Ok(Value::Int(0));
    };
    let (mut quotient, remainder) = (n.div_euclid(unit), n.rem_euclid(unit));
    if remainder * 2 > unit || (remainder * 2 == unit && quotient % 2 != 0) {
        quotient += 1;
    }
    quotient.checked_mul(unit).map(Value::Int).ok_or(FormulaError::Overflow)
}

fn to_int(value: Value) -> EvalResult {
    match &value {
        Value::Int(_) => Ok(value),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) if f.is_finite() && f.abs() < i64::MAX as f64 => Ok(Value::Int(f.trunc() as i64)),
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| FormulaError::type_error(format!("invalid literal for int(): '{s}'"))),
        other => Err(FormulaError::type_error(format!("int() cannot convert '{}'", other.type_name()))),
    }
}

fn to_float(value: Value) -> EvalResult {
    match value.coerce_number() {
        Some(n) => Ok(Value::Float(n.as_f64())),
        None => Err(FormulaError::type_error(format!("could not convert '{value}' to float"))),
    }
}

fn call(function: Function, args: Vec<Value>) -> EvalResult {
    let mut args_iter = args.into_iter();
    let mut next = || args_iter.next().unwrap_or(Value::Null);
    match function {
        Function::Len => match next() {
            Value::List(items) => Ok(Value::Int(items.len() as i64)),
            Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
            other => Err(FormulaError::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            ))),
        },
        Function::Count => {
            let items = expect_list(function, next())?;
            Ok(Value::Int(items.iter().filter(|v| !v.is_blank()).count() as i64))
        }
        Function::Sum => sum(&numbers(function, &expect_list(function, next())?)?),
        Function::Avg => {
            let values = numbers(function, &expect_list(function, next())?)?;
            if values.is_empty() {
                return Ok(Value::Null);
            }
            let total: f64 = values.iter().map(|n| n.as_f64()).sum();
            Ok(Value::Float(total / values.len() as f64))
        }
        Function::Min | Function::Max => {
            let args: Vec<Value> = args_iter.collect();
            let wanted = if function == Function::Min { Ordering::Less } else { Ordering::Greater };
            extreme(function, args, wanted)
        }
        Function::First => Ok(expect_list(function, next())?.into_iter().next().unwrap_or(Value::Null)),
        Function::Last => Ok(expect_list(function, next())?.pop().unwrap_or(Value::Null)),
        Function::Distinct => {
            let items = expect_list(function, next())?;
            let unique: HashSet<&Value> = items.iter().filter(|v| !v.is_blank()).collect();
            Ok(Value::Int(unique.len() as i64))
        }
        Function::Join => {
            let items = expect_list(function, next())?;
            let separator = match next() {
                Value::Null => ",".to_string(),
                Value::Str(s) => s,
                other => {
                    return Err(FormulaError::type_error(format!(
                        "join() separator must be str, got '{}'",
                        other.type_name()
                    )));
                }
            };
            let parts: Vec<String> = items.iter().map(Value::to_string).collect();
            Ok(Value::Str(parts.join(&separator)))
        }
        Function::Round => {
            let value = next();
            let digits = next();
            round(value, Some(digits))
        }
        Function::Abs => match next().as_number() {
            Some(Number::Int(n)) => n.checked_abs().map(Value::Int).ok_or(FormulaError::Overflow),
            Some(Number::Float(f)) => Ok(Value::Float(f.abs())),
            None => Err(FormulaError::type_error("abs() expects a number")),
        },
        Function::Int => to_int(next()),
        Function::Float => to_float(next()),
        Function::Str => Ok(Value::Str(next().to_string())),
        Function::If => {
            let cond = next();
            let then = next();
            let otherwise = next();
            Ok(if cond.is_truthy() { then } else { otherwise })
        }
    }
}
