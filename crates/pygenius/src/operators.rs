//! Binary and comparison operators for the interpreter.
//!
//! This module implements Python operators:
//! - Arithmetic: +, -, *, /, //, %, **
//! - Bitwise: |, ^, &, <<, >>
//! - Comparison: ==, !=, <, <=, >, >=, in, not in, is, is not
//!
//! Arrays and series take the element-wise path in [`crate::array`].

use std::cmp::Ordering;

use rustpython_parser::ast::{CmpOp, Operator};

use crate::array::{self, ArithOp};
use crate::error::{Error, Result};
use crate::value::PyValue;

fn symbol(op: &Operator) -> &'static str {
    match op {
        Operator::Add => "+",
        Operator::Sub => "-",
        Operator::Mult => "*",
        Operator::MatMult => "@",
        Operator::Div => "/",
        Operator::Mod => "%",
        Operator::Pow => "**",
        Operator::LShift => "<<",
        Operator::RShift => ">>",
        Operator::BitOr => "|",
        Operator::BitXor => "^",
        Operator::BitAnd => "&",
        Operator::FloorDiv => "//",
    }
}

fn unsupported_operands(op: &Operator, left: &PyValue, right: &PyValue) -> Error {
    Error::raise(
        "TypeError",
        format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            symbol(op),
            left.type_name(),
            right.type_name()
        ),
    )
}

fn arith_op(op: &Operator) -> Option<ArithOp> {
    match op {
        Operator::Add => Some(ArithOp::Add),
        Operator::Sub => Some(ArithOp::Sub),
        Operator::Mult => Some(ArithOp::Mul),
        Operator::Div => Some(ArithOp::Div),
        Operator::Pow => Some(ArithOp::Pow),
        _ => None,
    }
}

/// Apply a binary operator to two values.
///
/// Handles arithmetic (+, -, *, /, //, %, **), bitwise (|, ^, &, <<, >>),
/// and special cases like string concatenation, sequence repetition,
/// set algebra and element-wise array math.
pub fn apply_binop(op: &Operator, left: &PyValue, right: &PyValue) -> Result<PyValue> {
    if matches!(left, PyValue::Array(_)) || matches!(right, PyValue::Array(_)) {
        let arith = arith_op(op).ok_or_else(|| unsupported_operands(op, left, right))?;
        return array::elementwise(arith, left, right);
    }
    if let PyValue::Series(series) = left {
        return Ok(PyValue::Series(
            series.zip_with(right, false, |a, b| apply_binop(op, a, b))?,
        ));
    }
    if let PyValue::Series(series) = right {
        return Ok(PyValue::Series(
            series.zip_with(left, true, |a, b| apply_binop(op, a, b))?,
        ));
    }

    match op {
        Operator::Add => match (left, right) {
            (PyValue::Str(a), PyValue::Str(b)) => Ok(PyValue::Str(format!("{}{}", a, b))),
            (PyValue::List(a), PyValue::List(b)) => {
                let mut result = a.snapshot();
                result.extend(b.borrow().iter().cloned());
                Ok(PyValue::list(result))
            }
            (PyValue::Tuple(a), PyValue::Tuple(b)) => {
                let mut result = a.clone();
                result.extend(b.iter().cloned());
                Ok(PyValue::Tuple(result))
            }
            _ => numeric_binop(op, left, right, i64::checked_add, |a, b| a + b),
        },
        Operator::Sub => match (left, right) {
            (PyValue::Set(a), PyValue::Set(b)) => {
                let b = b.borrow();
                Ok(PyValue::set(
                    a.borrow().iter().filter(|x| !b.contains(x)).cloned().collect(),
                ))
            }
            _ => numeric_binop(op, left, right, i64::checked_sub, |a, b| a - b),
        },
        Operator::Mult => match (left, right) {
            (PyValue::Str(s), PyValue::Int(n)) | (PyValue::Int(n), PyValue::Str(s)) => {
                Ok(PyValue::Str(s.repeat((*n).max(0) as usize)))
            }
            (PyValue::List(l), PyValue::Int(n)) | (PyValue::Int(n), PyValue::List(l)) => {
                Ok(PyValue::list(repeat_items(&l.borrow(), *n)))
            }
            (PyValue::Tuple(t), PyValue::Int(n)) | (PyValue::Int(n), PyValue::Tuple(t)) => {
                Ok(PyValue::Tuple(repeat_items(t, *n)))
            }
            _ => numeric_binop(op, left, right, i64::checked_mul, |a, b| a * b),
        },
        Operator::Div => {
            let (a, b) = float_operands(op, left, right)?;
            if b == 0.0 {
                Err(Error::DivisionByZero)
            } else {
                Ok(PyValue::Float(a / b))
            }
        }
        Operator::FloorDiv => match (left.as_int(), right.as_int()) {
            (Some(a), Some(b)) if is_integral(left) && is_integral(right) => {
                if b == 0 {
                    return Err(Error::raise(
                        "ZeroDivisionError",
                        "integer division or modulo by zero",
                    ));
                }
                Ok(PyValue::Int(a.div_euclid(b) - i64::from(a.rem_euclid(b) != 0 && b < 0)))
            }
            _ => {
                let (a, b) = float_operands(op, left, right)?;
                if b == 0.0 {
                    return Err(Error::raise("ZeroDivisionError", "float floor division by zero"));
                }
                Ok(PyValue::Float((a / b).floor()))
            }
        },
        Operator::Mod => match (left, right) {
            (PyValue::Str(fmt), args) => percent_format(fmt, args),
            _ if is_integral(left) && is_integral(right) => {
                let (a, b) = (left.as_int().unwrap_or(0), right.as_int().unwrap_or(0));
                if b == 0 {
                    return Err(Error::raise(
                        "ZeroDivisionError",
                        "integer division or modulo by zero",
                    ));
                }
                Ok(PyValue::Int(((a % b) + b) % b))
            }
            _ => {
                let (a, b) = float_operands(op, left, right)?;
                if b == 0.0 {
                    return Err(Error::raise("ZeroDivisionError", "float modulo"));
                }
                Ok(PyValue::Float(a - b * (a / b).floor()))
            }
        },
        Operator::Pow => {
            if is_integral(left) && is_integral(right) {
                let (a, b) = (left.as_int().unwrap_or(0), right.as_int().unwrap_or(0));
                if b >= 0 {
                    return u32::try_from(b)
                        .ok()
                        .and_then(|exp| a.checked_pow(exp))
                        .map(PyValue::Int)
                        .ok_or_else(overflow);
                }
                if a == 0 {
                    return Err(Error::raise(
                        "ZeroDivisionError",
                        "0.0 cannot be raised to a negative power",
                    ));
                }
                return Ok(PyValue::Float((a as f64).powf(b as f64)));
            }
            let (a, b) = float_operands(op, left, right)?;
            Ok(PyValue::Float(a.powf(b)))
        }
        Operator::BitOr => match (left, right) {
            (PyValue::Set(a), PyValue::Set(b)) => {
                let mut result = a.snapshot();
                for item in b.borrow().iter() {
                    if !result.contains(item) {
                        result.push(item.clone());
                    }
                }
                Ok(PyValue::set(result))
            }
            (PyValue::Dict(a), PyValue::Dict(b)) => {
                let mut result = a.snapshot();
                for (k, v) in b.borrow().iter() {
                    match result.iter_mut().find(|(ek, _)| ek == k) {
                        Some(entry) => entry.1 = v.clone(),
                        None => result.push((k.clone(), v.clone())),
                    }
                }
                Ok(PyValue::dict(result))
            }
            _ => int_binop(op, left, right, |a, b| Some(a | b)),
        },
        Operator::BitAnd => match (left, right) {
            (PyValue::Set(a), PyValue::Set(b)) => {
                let b = b.borrow();
                Ok(PyValue::set(
                    a.borrow().iter().filter(|x| b.contains(x)).cloned().collect(),
                ))
            }
            _ => int_binop(op, left, right, |a, b| Some(a & b)),
        },
        Operator::BitXor => match (left, right) {
            (PyValue::Set(a), PyValue::Set(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                let mut result: Vec<PyValue> =
                    a.iter().filter(|x| !b.contains(x)).cloned().collect();
                result.extend(b.iter().filter(|x| !a.contains(x)).cloned());
                Ok(PyValue::set(result))
            }
            _ => int_binop(op, left, right, |a, b| Some(a ^ b)),
        },
        Operator::LShift => int_binop(op, left, right, |a, b| {
            u32::try_from(b).ok().and_then(|b| a.checked_shl(b))
        }),
        Operator::RShift => int_binop(op, left, right, |a, b| {
            u32::try_from(b).ok().map(|b| a >> b.min(63))
        }),
        Operator::MatMult => Err(Error::Unsupported("matrix multiplication".to_string())),
    }
}

fn overflow() -> Error {
    Error::raise("OverflowError", "integer result too large")
}

fn is_integral(value: &PyValue) -> bool {
    matches!(value, PyValue::Int(_) | PyValue::Bool(_))
}

fn repeat_items(items: &[PyValue], n: i64) -> Vec<PyValue> {
    let mut result = Vec::new();
    for _ in 0..n.max(0) {
        result.extend(items.iter().cloned());
    }
    result
}

fn float_operands(op: &Operator, left: &PyValue, right: &PyValue) -> Result<(f64, f64)> {
    match (left.as_float(), right.as_float()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(unsupported_operands(op, left, right)),
    }
}

/// Apply a numeric binary operation, staying in `int` when both sides are.
fn numeric_binop<F, G>(
    op: &Operator,
    left: &PyValue,
    right: &PyValue,
    int_op: F,
    float_op: G,
) -> Result<PyValue>
where
    F: Fn(i64, i64) -> Option<i64>,
    G: Fn(f64, f64) -> f64,
{
    if is_integral(left) && is_integral(right) {
        let (a, b) = (left.as_int().unwrap_or(0), right.as_int().unwrap_or(0));
        return int_op(a, b).map(PyValue::Int).ok_or_else(overflow);
    }
    let (a, b) = float_operands(op, left, right)?;
    Ok(PyValue::Float(float_op(a, b)))
}

/// Apply an integer binary operation.
fn int_binop<F>(op: &Operator, left: &PyValue, right: &PyValue, f: F) -> Result<PyValue>
where
    F: Fn(i64, i64) -> Option<i64>,
{
    match (left, right) {
        (PyValue::Int(_) | PyValue::Bool(_), PyValue::Int(_) | PyValue::Bool(_)) => {
            let (a, b) = (left.as_int().unwrap_or(0), right.as_int().unwrap_or(0));
            f(a, b).map(PyValue::Int).ok_or_else(|| {
                Error::raise("ValueError", format!("invalid shift count {}", b))
            })
        }
        _ => Err(unsupported_operands(op, left, right)),
    }
}

/// printf-style `"%s %d" % args` formatting.
fn percent_format(fmt: &str, args: &PyValue) -> Result<PyValue> {
    let values: Vec<PyValue> = match args {
        PyValue::Tuple(items) => items.clone(),
        other => vec![other.clone()],
    };
    let mut values = values.into_iter();
    let mut out = String::new();
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut spec = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_ascii_digit() || next == '.' || next == '-' {
                spec.push(next);
                chars.next();
            } else {
                break;
            }
        }
        let conv = chars.next().ok_or_else(|| {
            Error::raise("ValueError", "incomplete format")
        })?;
        if conv == '%' {
            out.push('%');
            continue;
        }
        let value = values.next().ok_or_else(|| {
            Error::raise("TypeError", "not enough arguments for format string")
        })?;
        let formatted = match conv {
            's' => value.to_print_string(),
            'r' => value.to_string(),
            'd' | 'i' => match value.as_float() {
                Some(f) => (f.trunc() as i64).to_string(),
                None => {
                    return Err(Error::raise(
                        "TypeError",
                        format!("%d format: a real number is required, not {}", value.type_name()),
                    ));
                }
            },
            'f' => {
                let precision = spec
                    .split_once('.')
                    .and_then(|(_, p)| p.parse().ok())
                    .unwrap_or(6);
                let f = value.as_float().ok_or_else(|| {
                    Error::raise(
                        "TypeError",
                        format!("must be real number, not {}", value.type_name()),
                    )
                })?;
                format!("{:.*}", precision, f)
            }
            other => {
                return Err(Error::raise(
                    "ValueError",
                    format!("unsupported format character '{}'", other),
                ));
            }
        };
        let width: usize = spec
            .split('.')
            .next()
            .and_then(|w| w.trim_start_matches('-').parse().ok())
            .unwrap_or(0);
        if spec.starts_with('-') {
            out.push_str(&format!("{:<width$}", formatted));
        } else {
            out.push_str(&format!("{:>width$}", formatted));
        }
    }
    if values.next().is_some() {
        return Err(Error::raise(
            "TypeError",
            "not all arguments converted during string formatting",
        ));
    }
    Ok(PyValue::Str(out))
}

/// Apply a comparison operator to two values.
///
/// `in` / `not in` test membership in sequences, strings, dicts, sets,
/// arrays and series. `is` compares identity for singletons and
/// containers, and equality otherwise.
pub fn apply_cmpop(op: &CmpOp, left: &PyValue, right: &PyValue) -> Result<bool> {
    match op {
        CmpOp::Eq => Ok(left == right),
        CmpOp::NotEq => Ok(left != right),
        CmpOp::Lt => Ok(compare_values(left, right)? == Ordering::Less),
        CmpOp::LtE => Ok(compare_values(left, right)? != Ordering::Greater),
        CmpOp::Gt => Ok(compare_values(left, right)? == Ordering::Greater),
        CmpOp::GtE => Ok(compare_values(left, right)? != Ordering::Less),
        CmpOp::In => contains(right, left),
        CmpOp::NotIn => Ok(!contains(right, left)?),
        CmpOp::Is => Ok(left.is_same(right)),
        CmpOp::IsNot => Ok(!left.is_same(right)),
    }
}

/// Membership test: `needle in container`.
pub fn contains(container: &PyValue, needle: &PyValue) -> Result<bool> {
    match container {
        PyValue::List(items) | PyValue::Set(items) => Ok(items.borrow().contains(needle)),
        PyValue::Tuple(items) => Ok(items.contains(needle)),
        PyValue::Str(s) => match needle {
            PyValue::Str(sub) => Ok(s.contains(sub.as_str())),
            other => Err(Error::raise(
                "TypeError",
                format!(
                    "'in <string>' requires string as left operand, not {}",
                    other.type_name()
                ),
            )),
        },
        PyValue::Dict(pairs) => Ok(pairs.borrow().iter().any(|(k, _)| k == needle)),
        PyValue::Array(arr) => Ok(arr.to_values().contains(needle)),
        PyValue::Series(series) => Ok(series.index.contains(&needle.to_print_string())),
        PyValue::DataFrame(df) => Ok(df.columns.contains(&needle.to_print_string())),
        other => Err(Error::raise(
            "TypeError",
            format!("argument of type '{}' is not iterable", other.type_name()),
        )),
    }
}

/// Order two values the way Python's `<` does.
pub fn compare_values(left: &PyValue, right: &PyValue) -> Result<Ordering> {
    match (left, right) {
        (PyValue::Int(a), PyValue::Int(b)) => Ok(a.cmp(b)),
        (PyValue::Str(a), PyValue::Str(b)) => Ok(a.cmp(b)),
        (PyValue::List(a), PyValue::List(b)) => compare_sequences(&a.borrow(), &b.borrow()),
        (PyValue::Tuple(a), PyValue::Tuple(b)) => compare_sequences(a, b),
        _ => match (left.as_float(), right.as_float()) {
            (Some(a), Some(b)) => Ok(a.partial_cmp(&b).unwrap_or(Ordering::Equal)),
            _ => Err(Error::raise(
                "TypeError",
                format!(
                    "'<' not supported between instances of '{}' and '{}'",
                    left.type_name(),
                    right.type_name()
                ),
            )),
        },
    }
}

/// Lexicographic order, element by element.
fn compare_sequences(a: &[PyValue], b: &[PyValue]) -> Result<Ordering> {
    for (x, y) in a.iter().zip(b.iter()) {
        if x != y {
            return compare_values(x, y);
        }
    }
    Ok(a.len().cmp(&b.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_floor_division_rounds_down() {
        let result = apply_binop(&Operator::FloorDiv, &PyValue::Int(-7), &PyValue::Int(2)).unwrap();
        assert_eq!(result, PyValue::Int(-4));
        let result = apply_binop(&Operator::Mod, &PyValue::Int(-7), &PyValue::Int(2)).unwrap();
        assert_eq!(result, PyValue::Int(1));
    }

    #[test]
    fn test_division_by_zero_category() {
        let err = apply_binop(&Operator::Div, &PyValue::Int(1), &PyValue::Int(0)).unwrap_err();
        assert_eq!(err.to_string(), "ZeroDivisionError: division by zero");
    }

    #[test]
    fn test_mixed_type_error_message() {
        let err = apply_binop(&Operator::Add, &PyValue::Int(1), &PyValue::from("a")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: unsupported operand type(s) for +: 'int' and 'str'"
        );
    }

    #[test]
    fn test_percent_format() {
        let args = PyValue::Tuple(vec![PyValue::from("x"), PyValue::Float(1.5)]);
        let result = apply_binop(&Operator::Mod, &PyValue::from("%s=%.2f"), &args).unwrap();
        assert_eq!(result, PyValue::from("x=1.50"));
    }

    #[test]
    fn test_tuple_ordering() {
        let a = PyValue::Tuple(vec![PyValue::Int(1), PyValue::Int(2)]);
        let b = PyValue::Tuple(vec![PyValue::Int(1), PyValue::Int(3)]);
        assert!(apply_cmpop(&CmpOp::Lt, &a, &b).unwrap());
        assert!(!apply_cmpop(&CmpOp::Is, &PyValue::Int(0), &PyValue::Bool(false)).unwrap());
    }

    #[test]
    fn test_identity_of_containers() {
        let list = PyValue::from(vec![1]);
        assert!(apply_cmpop(&CmpOp::Is, &list, &list.clone()).unwrap());
        assert!(!apply_cmpop(&CmpOp::Is, &list, &PyValue::from(vec![1])).unwrap());
        assert!(apply_cmpop(&CmpOp::Eq, &list, &PyValue::from(vec![1])).unwrap());

        let joined = apply_binop(&Operator::Add, &list, &PyValue::from(vec![2])).unwrap();
        assert!(!apply_cmpop(&CmpOp::Is, &joined, &list).unwrap());
        assert_eq!(list.to_string(), "[1]");
    }
}
