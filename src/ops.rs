//! Operator semantics shared by the tree-walking interpreter and the IL VM.
//!
//! Integer arithmetic wraps on overflow. Integer `/` and `%` by zero are
//! runtime errors; float arithmetic follows IEEE 754.

use crate::ast::{BinaryOp, UnaryOp};
use crate::error::{SlateError, Span};
use crate::value::Value;

pub fn binary(operator: BinaryOp, left: Value, right: Value, span: Span) -> Result<Value, SlateError> {
    match operator {
        BinaryOp::Add => match (left, right) {
            (Value::Str(l), r) => Ok(Value::Str(format!("{}{}", l, r))),
            (l, Value::Str(r)) => Ok(Value::Str(format!("{}{}", l, r))),
            (l, r) => arithmetic(operator, l, r, span, i64::wrapping_add, |a, b| a + b),
        },
        BinaryOp::Subtract => arithmetic(operator, left, right, span, i64::wrapping_sub, |a, b| a - b),
        BinaryOp::Multiply => arithmetic(operator, left, right, span, i64::wrapping_mul, |a, b| a * b),
        BinaryOp::Divide | BinaryOp::Modulo => {
            if matches!(right, Value::Int(0)) && matches!(left, Value::Int(_)) {
                return Err(SlateError::runtime_error_with_help(
                    span,
                    "Division by zero".to_string(),
                    format!("The right-hand side of integer '{}' must not be 0.", operator),
                ));
            }
            if operator == BinaryOp::Divide {
                arithmetic(operator, left, right, span, i64::wrapping_div, |a, b| a / b)
            } else {
                arithmetic(operator, left, right, span, i64::wrapping_rem, |a, b| a % b)
            }
        }
        BinaryOp::Equal => Ok(Value::Bool(left == right)),
        BinaryOp::NotEqual => Ok(Value::Bool(left != right)),
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
            let (l, r) = match (left.as_number(), right.as_number()) {
                (Some(l), Some(r)) => (l, r),
                _ => return Err(unsupported(operator, &left, &right, span)),
            };
            let result = match operator {
                BinaryOp::Less => l < r,
                BinaryOp::LessEqual => l <= r,
                BinaryOp::Greater => l > r,
                _ => l >= r,
            };
            Ok(Value::Bool(result))
        }
        // Both operands are already evaluated: logical operators never short-circuit
        BinaryOp::And | BinaryOp::Or => match (left.to_bool(), right.to_bool()) {
            (Some(l), Some(r)) => Ok(Value::Bool(if operator == BinaryOp::And {
                l && r
            } else {
                l || r
            })),
            (None, _) => Err(not_a_bool(operator, &left, span)),
            (_, None) => Err(not_a_bool(operator, &right, span)),
        },
        BinaryOp::BitAnd | BinaryOp::BitOr => match (&left, &right) {
            (Value::Int(l), Value::Int(r)) => Ok(Value::Int(if operator == BinaryOp::BitAnd {
                l & r
            } else {
                l | r
            })),
            _ => Err(SlateError::runtime_error(
                span,
                format!(
                    "Bitwise '{}' requires int operands, found {} and {}",
                    operator,
                    left.type_name(),
                    right.type_name()
                ),
            )),
        },
    }
}

fn arithmetic(
    operator: BinaryOp,
    left: Value,
    right: Value,
    span: Span,
    int_op: fn(i64, i64) -> i64,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, SlateError> {
    match (&left, &right) {
        (Value::Int(l), Value::Int(r)) => Ok(Value::Int(int_op(*l, *r))),
        (Value::Float(l), Value::Float(r)) => Ok(Value::Float(float_op(*l, *r))),
        (Value::Int(l), Value::Float(r)) => Ok(Value::Float(float_op(*l as f64, *r))),
        (Value::Float(l), Value::Int(r)) => Ok(Value::Float(float_op(*l, *r as f64))),
        _ => Err(unsupported(operator, &left, &right, span)),
    }
}

fn unsupported(operator: BinaryOp, left: &Value, right: &Value, span: Span) -> SlateError {
    SlateError::runtime_error(
        span,
        format!(
            "Unsupported operator '{}' for {} and {}",
            operator,
            left.type_name(),
            right.type_name()
        ),
    )
}

fn not_a_bool(operator: BinaryOp, operand: &Value, span: Span) -> SlateError {
    SlateError::runtime_error_with_help(
        span,
        format!(
            "Operator '{}' cannot convert {} to bool",
            operator,
            operand.type_name()
        ),
        "Bools, numbers, null and the strings \"true\"/\"false\" convert to bool.".to_string(),
    )
}

pub fn unary(operator: UnaryOp, operand: Value, span: Span) -> Result<Value, SlateError> {
    match (operator, operand) {
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Negate, Value::Int(n)) => Ok(Value::Int(n.wrapping_neg())),
        (UnaryOp::Negate, Value::Float(n)) => Ok(Value::Float(-n)),
        (UnaryOp::Not, other) => Err(SlateError::runtime_error(
            span,
            format!("Operator '!' expects a bool, found {}", other.type_name()),
        )),
        (UnaryOp::Negate, other) => Err(SlateError::runtime_error(
            span,
            format!("Cannot negate {}", other.type_name()),
        )),
    }
}

/// Coerce a condition value for `if`, `while` and `for`.
pub fn condition(value: Value, construct: &str, span: Span) -> Result<bool, SlateError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(SlateError::runtime_error_with_help(
            span,
            format!("{} condition must be a bool, found {}", construct, other.type_name()),
            "Conditions are not coerced: write 'x != 0' instead of 'x'.".to_string(),
        )),
    }
}

/// Validate an array index against the array's length.
pub fn index(items_len: usize, index: &Value, name: &str, span: Span) -> Result<usize, SlateError> {
    match index {
        Value::Int(i) if *i >= 0 && (*i as usize) < items_len => Ok(*i as usize),
        Value::Int(i) => Err(SlateError::runtime_error(
            span,
            format!(
                "Index {} out of bounds for array '{}' of length {}",
                i, name, items_len
            ),
        )),
        other => Err(SlateError::runtime_error(
            span,
            format!("Array index must be an int, found {}", other.type_name()),
        )),
    }
}
