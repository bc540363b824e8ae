//! Built-in Python functions, types and exception classes.
//!
//! Most built-ins are pure functions of their arguments. The ones that
//! call back into snippet code (`sorted(key=...)`, `map`, `filter`) or
//! write output (`print`) go through the [`Interpreter`] host.

use std::cmp::Ordering;

use rustpython_parser::ast::Operator;

use crate::args::{Args, arg_float, arg_int, arg_str};
use crate::array::NdArray;
use crate::error::{Error, Exception, Result};
use crate::operators::{apply_binop, compare_values};
use crate::value::{PyValue, Stream};

/// What a built-in needs from the running evaluator.
pub trait Interpreter {
    /// Call any callable value with evaluated arguments.
    fn call(&mut self, func: &PyValue, args: Args) -> Result<PyValue>;

    /// Write program output to stdout or stderr.
    fn write(&mut self, stream: Stream, text: &str);
}

const FUNCTIONS: &[&str] = &[
    "print",
    "len",
    "repr",
    "range",
    "enumerate",
    "zip",
    "reversed",
    "sorted",
    "map",
    "filter",
    "sum",
    "min",
    "max",
    "abs",
    "round",
    "any",
    "all",
    "isinstance",
    "divmod",
    "pow",
    "chr",
    "ord",
    "input",
    "callable",
];

const TYPES: &[&str] = &[
    "int", "float", "str", "bool", "list", "tuple", "dict", "set", "type", "object",
];

/// Exception classes with their base class.
const EXCEPTIONS: &[(&str, &str)] = &[
    ("BaseException", ""),
    ("Exception", "BaseException"),
    ("ArithmeticError", "Exception"),
    ("ZeroDivisionError", "ArithmeticError"),
    ("OverflowError", "ArithmeticError"),
    ("LookupError", "Exception"),
    ("IndexError", "LookupError"),
    ("KeyError", "LookupError"),
    ("TypeError", "Exception"),
    ("ValueError", "Exception"),
    ("JSONDecodeError", "ValueError"),
    ("NameError", "Exception"),
    ("UnboundLocalError", "NameError"),
    ("AttributeError", "Exception"),
    ("ImportError", "Exception"),
    ("ModuleNotFoundError", "ImportError"),
    ("RuntimeError", "Exception"),
    ("RecursionError", "RuntimeError"),
    ("NotImplementedError", "RuntimeError"),
    ("AssertionError", "Exception"),
    ("EOFError", "Exception"),
    ("StopIteration", "Exception"),
];

/// Resolve a name in the builtins scope.
pub fn lookup(name: &str) -> Option<PyValue> {
    if let Some(found) = FUNCTIONS.iter().copied().find(|&f| f == name) {
        return Some(PyValue::Builtin(found));
    }
    if let Some(found) = TYPES.iter().copied().find(|&t| t == name) {
        return Some(PyValue::Type(found));
    }
    EXCEPTIONS
        .iter()
        .find(|(e, _)| *e == name)
        .map(|&(e, _)| PyValue::Type(e))
}

pub fn is_exception_type(name: &str) -> bool {
    EXCEPTIONS.iter().any(|(e, _)| *e == name)
}

/// Whether an exception of category `kind` is caught by `except handler`.
pub fn exception_matches(kind: &str, handler: &str) -> bool {
    if handler == "BaseException" || handler == "Exception" {
        return true;
    }
    let mut current = kind;
    loop {
        if current == handler {
            return true;
        }
        match EXCEPTIONS.iter().find(|(e, _)| *e == current) {
            Some((_, base)) if !base.is_empty() => current = *base,
            _ => return false,
        }
    }
}

/// Map a value's runtime type onto the `type` object naming it.
fn type_of(value: &PyValue) -> PyValue {
    let name = match value {
        PyValue::None => "NoneType",
        PyValue::Bool(_) => "bool",
        PyValue::Int(_) => "int",
        PyValue::Float(_) => "float",
        PyValue::Str(_) => "str",
        PyValue::List(_) => "list",
        PyValue::Tuple(_) => "tuple",
        PyValue::Dict(_) => "dict",
        PyValue::Set(_) => "set",
        PyValue::Function(_) => "function",
        PyValue::Builtin(_) | PyValue::NativeFunction(_) => "builtin_function_or_method",
        PyValue::Type(_) => "type",
        PyValue::Exception(exc) => {
            return EXCEPTIONS
                .iter()
                .find(|(e, _)| *e == exc.kind)
                .map_or(PyValue::Type("Exception"), |&(e, _)| PyValue::Type(e));
        }
        PyValue::Module(_) => "module",
        PyValue::Stream(_) => "TextIOWrapper",
        PyValue::Array(_) => "numpy.ndarray",
        PyValue::DataFrame(_) => "pandas.DataFrame",
        PyValue::Series(_) => "pandas.Series",
    };
    PyValue::Type(name)
}

fn is_instance(value: &PyValue, class: &str) -> bool {
    match (value, class) {
        (_, "object") => true,
        (PyValue::Bool(_), "int") => true,
        (PyValue::Exception(exc), _) => exception_matches(&exc.kind, class),
        _ => match type_of(value) {
            PyValue::Type(name) => name == class,
            _ => false,
        },
    }
}

/// Expand any iterable value into its items.
pub fn iterate(value: &PyValue) -> Result<Vec<PyValue>> {
    match value {
        PyValue::List(items) | PyValue::Set(items) => Ok(items.snapshot()),
        PyValue::Tuple(items) => Ok(items.clone()),
        PyValue::Dict(pairs) => Ok(pairs.borrow().iter().map(|(k, _)| k.clone()).collect()),
        PyValue::Str(s) => Ok(s.chars().map(|c| PyValue::Str(c.to_string())).collect()),
        PyValue::Array(arr) => Ok(arr.iter_items()),
        PyValue::Series(series) => Ok(series.values.clone()),
        PyValue::DataFrame(df) => Ok(df
            .columns
            .iter()
            .map(|c| PyValue::from(c.as_str()))
            .collect()),
        other => Err(Error::raise(
            "TypeError",
            format!("'{}' object is not iterable", other.type_name()),
        )),
    }
}

/// Split a two-element iterable into a key/value pair.
pub fn pair(item: &PyValue) -> Result<(PyValue, PyValue)> {
    let parts = iterate(item)?;
    match <[PyValue; 2]>::try_from(parts) {
        Ok([key, value]) => Ok((key, value)),
        Err(parts) => Err(Error::raise(
            "ValueError",
            format!(
                "dictionary update sequence element has length {}; 2 is required",
                parts.len()
            ),
        )),
    }
}

/// Stable sort of `items`, ordered by `keys` when given.
pub fn sort_by_keys(
    items: Vec<PyValue>,
    keys: Option<Vec<PyValue>>,
    reverse: bool,
) -> Result<Vec<PyValue>> {
    let keys = keys.unwrap_or_else(|| items.clone());
    let mut order: Vec<usize> = (0..items.len()).collect();
    let mut failure = None;
    order.sort_by(|&a, &b| match compare_values(&keys[a], &keys[b]) {
        Ok(ordering) if reverse => ordering.reverse(),
        Ok(ordering) => ordering,
        Err(err) => {
            failure.get_or_insert(err);
            Ordering::Equal
        }
    });
    if let Some(err) = failure {
        return Err(err);
    }
    let mut slots: Vec<Option<PyValue>> = items.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}

/// Sort with an optional key callable, as `sorted` and `list.sort` do.
pub fn sorted_with(
    host: &mut dyn Interpreter,
    items: Vec<PyValue>,
    key: Option<&PyValue>,
    reverse: bool,
) -> Result<Vec<PyValue>> {
    let keys = match key {
        Some(func) if !func.is_none() => Some(
            items
                .iter()
                .map(|item| host.call(func, Args::new(vec![item.clone()])))
                .collect::<Result<Vec<_>>>()?,
        ),
        _ => None,
    };
    sort_by_keys(items, keys, reverse)
}

/// Call a built-in function by name.
pub fn call_builtin(host: &mut dyn Interpreter, name: &str, args: Args) -> Result<PyValue> {
    match name {
        "print" => builtin_print(host, args),
        "len" => {
            args.expect("len", 1, 1)?;
            let value = &args.positional[0];
            value.len().map(PyValue::from).ok_or_else(|| {
                Error::raise(
                    "TypeError",
                    format!("object of type '{}' has no len()", value.type_name()),
                )
            })
        }
        "repr" => {
            args.expect("repr", 1, 1)?;
            Ok(PyValue::Str(args.positional[0].to_string()))
        }
        "range" => builtin_range(args),
        "enumerate" => {
            args.expect("enumerate", 1, 2)?;
            let start = args.int(1, "start")?.unwrap_or(0);
            let items = iterate(&args.positional[0])?;
            Ok(PyValue::list(
                items
                    .into_iter()
                    .zip(start..)
                    .map(|(item, i)| PyValue::Tuple(vec![PyValue::Int(i), item]))
                    .collect(),
            ))
        }
        "zip" => {
            let columns = args
                .positional
                .iter()
                .map(iterate)
                .collect::<Result<Vec<_>>>()?;
            let len = columns.iter().map(Vec::len).min().unwrap_or(0);
            Ok(PyValue::list(
                (0..len)
                    .map(|i| PyValue::Tuple(columns.iter().map(|c| c[i].clone()).collect()))
                    .collect(),
            ))
        }
        "reversed" => {
            args.expect("reversed", 1, 1)?;
            let mut items = iterate(&args.positional[0])?;
            items.reverse();
            Ok(PyValue::list(items))
        }
        "sorted" => {
            args.expect("sorted", 1, 1)?;
            let items = iterate(&args.positional[0])?;
            let reverse = args.keyword("reverse").is_some_and(PyValue::is_truthy);
            let sorted = sorted_with(host, items, args.keyword("key"), reverse)?;
            Ok(PyValue::list(sorted))
        }
        "map" => {
            if args.len() < 2 {
                return Err(Error::raise(
                    "TypeError",
                    "map() must have at least two arguments.",
                ));
            }
            let func = args.positional[0].clone();
            let zipped = call_builtin(host, "zip", Args::new(args.positional[1..].to_vec()))?;
            let mut results = Vec::new();
            for group in iterate(&zipped)? {
                let PyValue::Tuple(call_args) = group else {
                    continue;
                };
                results.push(host.call(&func, Args::new(call_args))?);
            }
            Ok(PyValue::list(results))
        }
        "filter" => {
            args.expect("filter", 2, 2)?;
            let func = &args.positional[0];
            let mut kept = Vec::new();
            for item in iterate(&args.positional[1])? {
                let keep = if func.is_none() {
                    item.is_truthy()
                } else {
                    host.call(func, Args::new(vec![item.clone()]))?.is_truthy()
                };
                if keep {
                    kept.push(item);
                }
            }
            Ok(PyValue::list(kept))
        }
        "sum" => {
            args.expect("sum", 1, 2)?;
            let mut total = args.get(1, "start").cloned().unwrap_or(PyValue::Int(0));
            if let PyValue::Str(_) = total {
                return Err(Error::raise(
                    "TypeError",
                    "sum() can't sum strings [use ''.join(seq) instead]",
                ));
            }
            for item in iterate(&args.positional[0])? {
                total = apply_binop(&Operator::Add, &total, &item)?;
            }
            Ok(total)
        }
        "min" | "max" => builtin_min_max(host, name, args),
        "abs" => {
            args.expect("abs", 1, 1)?;
            match &args.positional[0] {
                PyValue::Int(i) => i
                    .checked_abs()
                    .map(PyValue::Int)
                    .ok_or_else(|| Error::raise("OverflowError", "integer overflow")),
                PyValue::Bool(b) => Ok(PyValue::Int(i64::from(*b))),
                PyValue::Float(f) => Ok(PyValue::Float(f.abs())),
                PyValue::Array(arr) => Ok(PyValue::Array(arr.map(f64::abs).astype(arr.dtype()))),
                other => Err(Error::raise(
                    "TypeError",
                    format!("bad operand type for abs(): '{}'", other.type_name()),
                )),
            }
        }
        "round" => builtin_round(args),
        "any" => {
            args.expect("any", 1, 1)?;
            Ok(PyValue::Bool(
                iterate(&args.positional[0])?.iter().any(PyValue::is_truthy),
            ))
        }
        "all" => {
            args.expect("all", 1, 1)?;
            Ok(PyValue::Bool(
                iterate(&args.positional[0])?.iter().all(PyValue::is_truthy),
            ))
        }
        "isinstance" => {
            args.expect("isinstance", 2, 2)?;
            let value = &args.positional[0];
            let classes = match &args.positional[1] {
                PyValue::Tuple(items) => items.clone(),
                other => vec![other.clone()],
            };
            let mut result = false;
            for class in &classes {
                let PyValue::Type(class) = class else {
                    return Err(Error::raise(
                        "TypeError",
                        "isinstance() arg 2 must be a type, a tuple of types, or a union",
                    ));
                };
                result |= is_instance(value, class);
            }
            Ok(PyValue::Bool(result))
        }
        "divmod" => {
            args.expect("divmod", 2, 2)?;
            let (a, b) = (&args.positional[0], &args.positional[1]);
            Ok(PyValue::Tuple(vec![
                apply_binop(&Operator::FloorDiv, a, b)?,
                apply_binop(&Operator::Mod, a, b)?,
            ]))
        }
        "pow" => builtin_pow(args),
        "chr" => {
            args.expect("chr", 1, 1)?;
            let code = arg_int(&args.positional[0])?;
            u32::try_from(code)
                .ok()
                .and_then(char::from_u32)
                .map(|c| PyValue::Str(c.to_string()))
                .ok_or_else(|| Error::raise("ValueError", "chr() arg not in range(0x110000)"))
        }
        "ord" => {
            args.expect("ord", 1, 1)?;
            let s = arg_str(&args.positional[0])?;
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(PyValue::Int(c as i64)),
                _ => Err(Error::raise(
                    "TypeError",
                    format!(
                        "ord() expected a character, but string of length {} found",
                        s.chars().count()
                    ),
                )),
            }
        }
        "input" => {
            args.expect("input", 0, 1)?;
            if let Some(prompt) = args.first() {
                host.write(Stream::Stdout, &prompt.to_print_string());
            }
            Err(Error::raise("EOFError", "EOF when reading a line"))
        }
        "callable" => {
            args.expect("callable", 1, 1)?;
            Ok(PyValue::Bool(matches!(
                args.positional[0],
                PyValue::Function(_)
                    | PyValue::Builtin(_)
                    | PyValue::Type(_)
                    | PyValue::NativeFunction(_)
            )))
        }
        other => Err(Error::NameError(other.to_string())),
    }
}

/// Call a type object: a constructor or an exception class.
pub fn call_type(name: &str, args: Args) -> Result<PyValue> {
    if is_exception_type(name) {
        let message = match args.positional.as_slice() {
            [] => String::new(),
            [single] => single.to_print_string(),
            many => PyValue::Tuple(many.to_vec()).to_string(),
        };
        return Ok(PyValue::Exception(Box::new(Exception::new(name, message))));
    }
    match name {
        "int" => builtin_int(args),
        "float" => builtin_float(args),
        "str" => {
            args.expect("str", 0, 1)?;
            Ok(PyValue::Str(
                args.first().map(PyValue::to_print_string).unwrap_or_default(),
            ))
        }
        "bool" => {
            args.expect("bool", 0, 1)?;
            Ok(PyValue::Bool(args.first().is_some_and(PyValue::is_truthy)))
        }
        "list" => {
            args.expect("list", 0, 1)?;
            Ok(PyValue::list(match args.first() {
                Some(value) => iterate(value)?,
                None => Vec::new(),
            }))
        }
        "tuple" => {
            args.expect("tuple", 0, 1)?;
            Ok(PyValue::Tuple(match args.first() {
                Some(value) => iterate(value)?,
                None => Vec::new(),
            }))
        }
        "set" => {
            args.expect("set", 0, 1)?;
            let mut items: Vec<PyValue> = Vec::new();
            if let Some(value) = args.first() {
                for item in iterate(value)? {
                    if !item.is_hashable() {
                        return Err(Error::raise(
                            "TypeError",
                            format!("unhashable type: '{}'", item.type_name()),
                        ));
                    }
                    if !items.contains(&item) {
                        items.push(item);
                    }
                }
            }
            Ok(PyValue::set(items))
        }
        "dict" => {
            args.expect("dict", 0, 1)?;
            let value = PyValue::dict(Vec::new());
            crate::methods::mutate(&value, "update", args)?;
            Ok(value)
        }
        "type" => {
            args.expect("type", 1, 1)?;
            Ok(type_of(&args.positional[0]))
        }
        "object" => Err(Error::Unsupported("object()".to_string())),
        other => Err(Error::raise(
            "TypeError",
            format!("cannot create '{}' instances", other),
        )),
    }
}

fn builtin_print(host: &mut dyn Interpreter, args: Args) -> Result<PyValue> {
    let text_kw = |name: &str, default: &str| -> Result<String> {
        match args.keyword(name) {
            None | Some(PyValue::None) => Ok(default.to_string()),
            Some(PyValue::Str(s)) => Ok(s.clone()),
            Some(other) => Err(Error::raise(
                "TypeError",
                format!("{} must be None or a string, not {}", name, other.type_name()),
            )),
        }
    };
    let sep = text_kw("sep", " ")?;
    let end = text_kw("end", "\n")?;
    let stream = match args.keyword("file") {
        None | Some(PyValue::None) => Stream::Stdout,
        Some(PyValue::Stream(stream)) => *stream,
        Some(other) => {
            return Err(Error::raise(
                "AttributeError",
                format!("'{}' object has no attribute 'write'", other.type_name()),
            ));
        }
    };
    for (i, value) in args.positional.iter().enumerate() {
        if i > 0 {
            host.write(stream, &sep);
        }
        host.write(stream, &value.to_print_string());
    }
    host.write(stream, &end);
    Ok(PyValue::None)
}

fn builtin_range(args: Args) -> Result<PyValue> {
    args.expect("range", 1, 3)?;
    let bounds = args
        .positional
        .iter()
        .map(arg_int)
        .collect::<Result<Vec<_>>>()?;
    let (start, stop, step) = match bounds.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step, ..] => (*start, *stop, *step),
        [] => return Err(Error::raise("TypeError", "range expected at least 1 argument, got 0")),
    };
    if step == 0 {
        return Err(Error::raise("ValueError", "range() arg 3 must not be zero"));
    }
    let mut items = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        items.push(PyValue::Int(i));
        i += step;
    }
    Ok(PyValue::list(items))
}

fn builtin_min_max(host: &mut dyn Interpreter, name: &str, args: Args) -> Result<PyValue> {
    let items = match args.positional.as_slice() {
        [] => {
            return Err(Error::raise(
                "TypeError",
                format!("{} expected at least 1 argument, got 0", name),
            ));
        }
        [single] => iterate(single)?,
        many => many.to_vec(),
    };
    if items.is_empty() {
        return args.keyword("default").cloned().ok_or_else(|| {
            Error::raise("ValueError", format!("{}() arg is an empty sequence", name))
        });
    }
    let keys = match args.keyword("key") {
        Some(func) if !func.is_none() => items
            .iter()
            .map(|item| host.call(func, Args::new(vec![item.clone()])))
            .collect::<Result<Vec<_>>>()?,
        _ => items.clone(),
    };
    let wanted = if name == "min" {
        Ordering::Less
    } else {
        Ordering::Greater
    };
    let mut best = 0;
    for i in 1..items.len() {
        if compare_values(&keys[i], &keys[best])? == wanted {
            best = i;
        }
    }
    Ok(items[best].clone())
}

fn builtin_round(args: Args) -> Result<PyValue> {
    args.expect("round", 1, 2)?;
    let ndigits = match args.get(1, "ndigits") {
        None | Some(PyValue::None) => None,
        Some(value) => Some(arg_int(value)?),
    };
    match (&args.positional[0], ndigits) {
        (PyValue::Int(i), None) => Ok(PyValue::Int(*i)),
        (PyValue::Bool(b), None) => Ok(PyValue::Int(i64::from(*b))),
        (PyValue::Int(i), Some(n)) if n >= 0 => Ok(PyValue::Int(*i)),
        (PyValue::Int(i), Some(n)) => {
            let factor = 10f64.powi(-n as i32);
            float_to_int((*i as f64 / factor).round_ties_even() * factor).map(PyValue::Int)
        }
        (PyValue::Float(f), None) => float_to_int(f.round_ties_even()).map(PyValue::Int),
        (PyValue::Float(f), Some(n)) => {
            let factor = 10f64.powi(n as i32);
            Ok(PyValue::Float((f * factor).round_ties_even() / factor))
        }
        (other, _) => Err(Error::raise(
            "TypeError",
            format!(
                "type {} doesn't define __round__ method",
                other.type_name()
            ),
        )),
    }
}

fn builtin_pow(args: Args) -> Result<PyValue> {
    args.expect("pow", 2, 3)?;
    let (base, exp) = (&args.positional[0], &args.positional[1]);
    let Some(modulus) = args.positional.get(2) else {
        return apply_binop(&Operator::Pow, base, exp);
    };
    let (base, exp, modulus) = (arg_int(base)?, arg_int(exp)?, arg_int(modulus)?);
    if modulus == 0 {
        return Err(Error::raise("ValueError", "pow() 3rd argument cannot be 0"));
    }
    if exp < 0 {
        return Err(Error::Unsupported("pow() with negative exponent and modulus".to_string()));
    }
    let m = modulus as i128;
    let mut result: i128 = 1;
    let mut b = (base as i128).rem_euclid(m);
    let mut e = exp;
    while e > 0 {
        if e & 1 == 1 {
            result = (result * b).rem_euclid(m);
        }
        b = (b * b).rem_euclid(m);
        e >>= 1;
    }
    // Python gives the result the sign of the modulus.
    if m < 0 && result > 0 {
        result += m;
    }
    Ok(PyValue::Int(result as i64))
}

fn builtin_int(args: Args) -> Result<PyValue> {
    args.expect("int", 0, 2)?;
    let Some(value) = args.first() else {
        return Ok(PyValue::Int(0));
    };
    let base = args.int(1, "base")?;
    match (value, base) {
        (PyValue::Str(s), base) => {
            let base = base.unwrap_or(10);
            let trimmed = s.trim().replace('_', "");
            let digits = match base {
                16 => trimmed.trim_start_matches("0x").trim_start_matches("0X"),
                8 => trimmed.trim_start_matches("0o").trim_start_matches("0O"),
                2 => trimmed.trim_start_matches("0b").trim_start_matches("0B"),
                _ => trimmed.as_str(),
            };
            u32::try_from(base)
                .ok()
                .filter(|b| (2..=36).contains(b))
                .and_then(|b| i64::from_str_radix(digits, b).ok())
                .map(PyValue::Int)
                .ok_or_else(|| {
                    Error::raise(
                        "ValueError",
                        format!(
                            "invalid literal for int() with base {}: {}",
                            base,
                            crate::value::repr_str(s)
                        ),
                    )
                })
        }
        (_, Some(_)) => Err(Error::raise(
            "TypeError",
            "int() can't convert non-string with explicit base",
        )),
        (PyValue::Int(i), None) => Ok(PyValue::Int(*i)),
        (PyValue::Bool(b), None) => Ok(PyValue::Int(i64::from(*b))),
        (PyValue::Float(f), None) => float_to_int(f.trunc()).map(PyValue::Int),
        (other, None) => Err(Error::raise(
            "TypeError",
            format!(
                "int() argument must be a string, a bytes-like object or a real number, not '{}'",
                other.type_name()
            ),
        )),
    }
}

/// Convert an integral float, refusing values an `int` cannot hold.
fn float_to_int(f: f64) -> Result<i64> {
    // 2**63, exactly representable.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f.is_nan() {
        Err(Error::raise("ValueError", "cannot convert float NaN to integer"))
    } else if f.is_infinite() {
        Err(Error::raise(
            "OverflowError",
            "cannot convert float infinity to integer",
        ))
    } else if !(-LIMIT..LIMIT).contains(&f) {
        Err(Error::raise("OverflowError", "integer result too large"))
    } else {
        Ok(f as i64)
    }
}

fn builtin_float(args: Args) -> Result<PyValue> {
    args.expect("float", 0, 1)?;
    let Some(value) = args.first() else {
        return Ok(PyValue::Float(0.0));
    };
    match value {
        PyValue::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(PyValue::Float)
            .map_err(|_| {
                Error::raise(
                    "ValueError",
                    format!(
                        "could not convert string to float: {}",
                        crate::value::repr_str(s)
                    ),
                )
            }),
        other => arg_float(other).map(PyValue::Float).map_err(|_| {
            Error::raise(
                "TypeError",
                format!(
                    "float() argument must be a string or a real number, not '{}'",
                    other.type_name()
                ),
            )
        }),
    }
}

/// Build an `ndarray` from any iterable of numbers.
pub fn to_array(value: &PyValue) -> Result<NdArray> {
    match value {
        PyValue::Array(arr) => Ok(arr.clone()),
        PyValue::List(_) | PyValue::Tuple(_) => NdArray::from_value(value),
        other => NdArray::from_value(&PyValue::list(iterate(other)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// A host that records writes and only knows how to call built-ins.
    #[derive(Default)]
    struct Recorder {
        written: Vec<(Stream, String)>,
    }

    impl Interpreter for Recorder {
        fn call(&mut self, func: &PyValue, args: Args) -> Result<PyValue> {
            match func {
                PyValue::Builtin(name) => call_builtin(self, name, args),
                PyValue::Type(name) => call_type(name, args),
                other => Err(Error::Unsupported(other.to_string())),
            }
        }

        fn write(&mut self, stream: Stream, text: &str) {
            self.written.push((stream, text.to_string()));
        }
    }

    fn call(name: &str, positional: Vec<PyValue>) -> Result<PyValue> {
        call_builtin(&mut Recorder::default(), name, Args::new(positional))
    }

    #[test]
    fn test_print_writes_pieces_separately() {
        let mut host = Recorder::default();
        let args = Args::with_keywords(
            vec![PyValue::Int(1), PyValue::from("a")],
            vec![
                ("sep".to_string(), PyValue::from("-")),
                ("file".to_string(), PyValue::Stream(Stream::Stderr)),
            ],
        );
        call_builtin(&mut host, "print", args).unwrap();
        let pieces: Vec<&str> = host.written.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(pieces, vec!["1", "-", "a", "\n"]);
        assert!(host.written.iter().all(|(s, _)| *s == Stream::Stderr));
    }

    #[test]
    fn test_range_variants() {
        assert_eq!(
            call("range", vec![PyValue::Int(3)]).unwrap(),
            PyValue::from(vec![0, 1, 2])
        );
        assert_eq!(
            call("range", vec![PyValue::Int(5), PyValue::Int(0), PyValue::Int(-2)]).unwrap(),
            PyValue::from(vec![5, 3, 1])
        );
    }

    #[test]
    fn test_sorted_with_key_and_reverse() {
        let mut host = Recorder::default();
        let words = PyValue::from(vec!["ccc", "a", "bb"]);
        let args = Args::with_keywords(
            vec![words],
            vec![
                ("key".to_string(), PyValue::Builtin("len")),
                ("reverse".to_string(), PyValue::Bool(true)),
            ],
        );
        assert_eq!(
            call_builtin(&mut host, "sorted", args).unwrap(),
            PyValue::from(vec!["ccc", "bb", "a"])
        );
    }

    #[test]
    fn test_round_half_even() {
        assert_eq!(call("round", vec![PyValue::Float(2.5)]).unwrap(), PyValue::Int(2));
        assert_eq!(call("round", vec![PyValue::Float(3.5)]).unwrap(), PyValue::Int(4));
        assert_eq!(
            call("round", vec![PyValue::Float(3.14159), PyValue::Int(2)]).unwrap(),
            PyValue::Float(3.14)
        );
    }

    #[test]
    fn test_exception_hierarchy() {
        assert!(exception_matches("ZeroDivisionError", "ArithmeticError"));
        assert!(exception_matches("KeyError", "LookupError"));
        assert!(exception_matches("ModuleNotFoundError", "ImportError"));
        assert!(exception_matches("ValueError", "Exception"));
        assert!(!exception_matches("ValueError", "TypeError"));
        assert!(!exception_matches("ImportError", "ModuleNotFoundError"));
    }

    #[test]
    fn test_conversion_errors() {
        let err = call_type("int", Args::new(vec![PyValue::from("abc")])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ValueError: invalid literal for int() with base 10: 'abc'"
        );
        let err = call("len", vec![PyValue::Int(5)]).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: object of type 'int' has no len()");
    }

    #[test]
    fn test_float_to_int_range() {
        assert_eq!(
            call_type("int", Args::new(vec![PyValue::Float(-7.9)])).unwrap(),
            PyValue::Int(-7)
        );
        let err = call_type("int", Args::new(vec![PyValue::Float(1e300)])).unwrap_err();
        assert_eq!(err.to_string(), "OverflowError: integer result too large");
        let err = call("round", vec![PyValue::Float(-1e19)]).unwrap_err();
        assert_eq!(err.category(), "OverflowError");
        let err = call_type("int", Args::new(vec![PyValue::Float(f64::NAN)])).unwrap_err();
        assert_eq!(err.to_string(), "ValueError: cannot convert float NaN to integer");
    }

    #[test]
    fn test_copies_are_new_containers() {
        let original = PyValue::from(vec![1, 2]);
        let copy = call_type("list", Args::new(vec![original.clone()])).unwrap();
        assert_eq!(copy, original);
        assert!(!copy.is_same(&original));

        let dict = call_type(
            "dict",
            Args::with_keywords(vec![], vec![("a".to_string(), PyValue::Int(1))]),
        )
        .unwrap();
        assert_eq!(dict.to_string(), "{'a': 1}");
    }

    #[test]
    fn test_isinstance_with_tuple() {
        let result = call(
            "isinstance",
            vec![
                PyValue::Bool(true),
                PyValue::Tuple(vec![PyValue::Type("str"), PyValue::Type("int")]),
            ],
        )
        .unwrap();
        assert_eq!(result, PyValue::Bool(true));
    }
}
