//! Built-in modules: math, json, sys, typing, numpy, pandas and
//! matplotlib.
//!
//! Modules are plain [`Module`] values built on demand by [`load`]. The
//! numerical, tabular and plotting modules are also what the engine binds
//! as `np`, `pd` and `plt` before a snippet runs.

use std::rc::Rc;
use std::sync::Arc;

use tracing::debug;

use crate::args::{Args, arg_float, arg_int, arg_str};
use crate::array::{DType, DataFrame, NdArray, Series};
use crate::builtins::to_array;
use crate::error::{Error, Result};
use crate::value::{Module, NativeFunction, PyValue, Stream};

/// Version string reported as `sys.version`.
pub const PYTHON_VERSION: &str = "3.11.0 (pygenius)";

/// Collects the attributes of a module under construction.
pub struct ModuleBuilder {
    name: String,
    attrs: Vec<(String, PyValue)>,
}

impl ModuleBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attrs: Vec::new(),
        }
    }

    /// Register a function implemented in Rust.
    pub fn function<F>(&mut self, name: &str, f: F)
    where
        F: Fn(Args) -> Result<PyValue> + Send + Sync + 'static,
    {
        let func = NativeFunction {
            name: name.to_string(),
            func: Arc::new(f),
        };
        self.attrs
            .push((name.to_string(), PyValue::NativeFunction(func)));
    }

    pub fn constant(&mut self, name: &str, value: PyValue) {
        self.attrs.push((name.to_string(), value));
    }

    fn build(self) -> PyValue {
        PyValue::Module(Rc::new(Module {
            name: self.name,
            attrs: self.attrs,
        }))
    }
}

fn module(name: &str, register: impl FnOnce(&mut ModuleBuilder)) -> PyValue {
    let mut builder = ModuleBuilder::new(name);
    register(&mut builder);
    builder.build()
}

/// Load a module by its dotted import name, or `None` if it does not exist.
pub fn load(name: &str) -> Option<PyValue> {
    let loaded = match name {
        "math" => module("math", register_math),
        "json" => module("json", register_json),
        "sys" => module("sys", register_sys),
        "typing" => module("typing", register_typing),
        "numpy" => module("numpy", register_numpy),
        "pandas" => module("pandas", register_pandas),
        "matplotlib.pyplot" => module("matplotlib.pyplot", register_pyplot),
        "matplotlib" => module("matplotlib", |m| {
            m.constant("pyplot", module("matplotlib.pyplot", register_pyplot));
        }),
        _ => return None,
    };
    debug!(module = name, "loaded built-in module");
    Some(loaded)
}

/// Interpret a `dtype=` argument.
pub fn dtype_arg(value: &PyValue) -> Result<DType> {
    match value {
        PyValue::Type("int") => Ok(DType::Int),
        PyValue::Type("float") => Ok(DType::Float),
        PyValue::Str(s) if s.starts_with("int") => Ok(DType::Int),
        PyValue::Str(s) if s.starts_with("float") => Ok(DType::Float),
        other => Err(Error::raise(
            "TypeError",
            format!("data type {} not understood", other),
        )),
    }
}

// ============================================================================
// math module
// ============================================================================

fn register_math(m: &mut ModuleBuilder) {
    m.constant("pi", PyValue::Float(std::f64::consts::PI));
    m.constant("e", PyValue::Float(std::f64::consts::E));
    m.constant("tau", PyValue::Float(std::f64::consts::TAU));
    m.constant("inf", PyValue::Float(f64::INFINITY));
    m.constant("nan", PyValue::Float(f64::NAN));

    m.function("sqrt", |args| {
        let x = float_arg(&args, "sqrt")?;
        if x < 0.0 {
            return Err(Error::raise("ValueError", "math domain error"));
        }
        Ok(PyValue::Float(x.sqrt()))
    });
    m.function("floor", |args| to_int(float_arg(&args, "floor")?.floor()));
    m.function("ceil", |args| to_int(float_arg(&args, "ceil")?.ceil()));
    m.function("trunc", |args| to_int(float_arg(&args, "trunc")?.trunc()));
    m.function("log", |args| {
        args.expect("log", 1, 2)?;
        let x = arg_float(&args.positional[0])?;
        if x <= 0.0 {
            return Err(Error::raise("ValueError", "math domain error"));
        }
        match args.positional.get(1) {
            Some(base) => Ok(PyValue::Float(x.ln() / arg_float(base)?.ln())),
            None => Ok(PyValue::Float(x.ln())),
        }
    });
    m.function("log2", |args| unary(&args, "log2", f64::log2));
    m.function("log10", |args| unary(&args, "log10", f64::log10));
    m.function("exp", |args| unary(&args, "exp", f64::exp));
    m.function("sin", |args| unary(&args, "sin", f64::sin));
    m.function("cos", |args| unary(&args, "cos", f64::cos));
    m.function("tan", |args| unary(&args, "tan", f64::tan));
    m.function("asin", |args| unary(&args, "asin", f64::asin));
    m.function("acos", |args| unary(&args, "acos", f64::acos));
    m.function("atan", |args| unary(&args, "atan", f64::atan));
    m.function("fabs", |args| unary(&args, "fabs", f64::abs));
    m.function("degrees", |args| unary(&args, "degrees", f64::to_degrees));
    m.function("radians", |args| unary(&args, "radians", f64::to_radians));
    m.function("atan2", |args| {
        args.expect("atan2", 2, 2)?;
        let y = arg_float(&args.positional[0])?;
        let x = arg_float(&args.positional[1])?;
        Ok(PyValue::Float(y.atan2(x)))
    });
    m.function("pow", |args| {
        args.expect("pow", 2, 2)?;
        let x = arg_float(&args.positional[0])?;
        let y = arg_float(&args.positional[1])?;
        Ok(PyValue::Float(x.powf(y)))
    });
    m.function("hypot", |args| {
        let sum: f64 = args
            .positional
            .iter()
            .map(arg_float)
            .collect::<Result<Vec<_>>>()?
            .iter()
            .map(|x| x * x)
            .sum();
        Ok(PyValue::Float(sum.sqrt()))
    });
    m.function("isnan", |args| {
        Ok(PyValue::Bool(float_arg(&args, "isnan")?.is_nan()))
    });
    m.function("isinf", |args| {
        Ok(PyValue::Bool(float_arg(&args, "isinf")?.is_infinite()))
    });
    m.function("gcd", |args| {
        args.expect("gcd", 2, 2)?;
        let a = arg_int(&args.positional[0])?.unsigned_abs();
        let b = arg_int(&args.positional[1])?.unsigned_abs();
        Ok(PyValue::Int(gcd(a, b) as i64))
    });
    m.function("factorial", |args| {
        args.expect("factorial", 1, 1)?;
        let n = arg_int(&args.positional[0])?;
        if n < 0 {
            return Err(Error::raise(
                "ValueError",
                "factorial() not defined for negative values",
            ));
        }
        (2..=n)
            .try_fold(1i64, |acc, i| acc.checked_mul(i))
            .map(PyValue::Int)
            .ok_or_else(|| Error::raise("OverflowError", "factorial result too large"))
    });
}

fn float_arg(args: &Args, func: &str) -> Result<f64> {
    args.expect(func, 1, 1)?;
    arg_float(&args.positional[0])
}

fn unary(args: &Args, func: &str, f: fn(f64) -> f64) -> Result<PyValue> {
    Ok(PyValue::Float(f(float_arg(args, func)?)))
}

fn to_int(x: f64) -> Result<PyValue> {
    if x.is_finite() {
        Ok(PyValue::Int(x as i64))
    } else if x.is_nan() {
        Err(Error::raise("ValueError", "cannot convert float NaN to integer"))
    } else {
        Err(Error::raise(
            "OverflowError",
            "cannot convert float infinity to integer",
        ))
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

// ============================================================================
// json module
// ============================================================================

fn register_json(m: &mut ModuleBuilder) {
    m.function("loads", |args| {
        args.expect("loads", 1, 1)?;
        let text = arg_str(&args.positional[0])?;
        serde_json::from_str::<serde_json::Value>(text)
            .map(|value| json_value_to_pyvalue(&value))
            .map_err(|err| Error::raise("JSONDecodeError", err.to_string()))
    });
    m.function("dumps", |args| {
        args.expect("dumps", 1, 1)?;
        let value = pyvalue_to_json_value(&args.positional[0])?;
        let indent = match args.keyword("indent") {
            None | Some(PyValue::None) => None,
            Some(n) => Some(arg_int(n)?.max(0) as usize),
        };
        let mut out = String::new();
        write_json(&value, indent, 0, &mut out);
        Ok(PyValue::Str(out))
    });
}

fn json_value_to_pyvalue(val: &serde_json::Value) -> PyValue {
    match val {
        serde_json::Value::Null => PyValue::None,
        serde_json::Value::Bool(b) => PyValue::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                PyValue::Int(i)
            } else {
                n.as_f64().map_or(PyValue::None, PyValue::Float)
            }
        }
        serde_json::Value::String(s) => PyValue::Str(s.clone()),
        serde_json::Value::Array(arr) => {
            PyValue::list(arr.iter().map(json_value_to_pyvalue).collect())
        }
        serde_json::Value::Object(obj) => PyValue::dict(
            obj.iter()
                .map(|(k, v)| (PyValue::Str(k.clone()), json_value_to_pyvalue(v)))
                .collect(),
        ),
    }
}

fn pyvalue_to_json_value(val: &PyValue) -> Result<serde_json::Value> {
    Ok(match val {
        PyValue::None => serde_json::Value::Null,
        PyValue::Bool(b) => serde_json::Value::Bool(*b),
        PyValue::Int(i) => serde_json::Value::Number((*i).into()),
        PyValue::Float(f) => serde_json::Number::from_f64(*f)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        PyValue::Str(s) => serde_json::Value::String(s.clone()),
        PyValue::List(_) | PyValue::Tuple(_) => serde_json::Value::Array(
            val.sequence_items()
                .unwrap_or_default()
                .iter()
                .map(pyvalue_to_json_value)
                .collect::<Result<_>>()?,
        ),
        PyValue::Dict(pairs) => {
            let mut map = serde_json::Map::new();
            for (key, value) in pairs.borrow().iter() {
                let key = match key {
                    PyValue::Str(s) => s.clone(),
                    PyValue::Int(_) | PyValue::Float(_) => key.to_string(),
                    PyValue::Bool(b) => b.to_string(),
                    PyValue::None => "null".to_string(),
                    other => {
                        return Err(Error::raise(
                            "TypeError",
                            format!(
                                "keys must be str, int, float, bool or None, not {}",
                                other.type_name()
                            ),
                        ));
                    }
                };
                map.insert(key, pyvalue_to_json_value(value)?);
            }
            serde_json::Value::Object(map)
        }
        other => {
            return Err(Error::raise(
                "TypeError",
                format!(
                    "Object of type {} is not JSON serializable",
                    other.type_name()
                ),
            ));
        }
    })
}

/// Serialize with the separators `json.dumps` uses (`", "` and `": "`).
fn write_json(value: &serde_json::Value, indent: Option<usize>, level: usize, out: &mut String) {
    let newline = |out: &mut String, level: usize| {
        if let Some(width) = indent {
            out.push('\n');
            out.push_str(&" ".repeat(width * level));
        }
    };
    let item_sep = if indent.is_some() { "," } else { ", " };
    match value {
        serde_json::Value::Array(items) if !items.is_empty() => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(item_sep);
                }
                newline(out, level + 1);
                write_json(item, indent, level + 1, out);
            }
            newline(out, level);
            out.push(']');
        }
        serde_json::Value::Object(map) if !map.is_empty() => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(item_sep);
                }
                newline(out, level + 1);
                out.push_str(&serde_json::Value::String(key.clone()).to_string());
                out.push_str(": ");
                write_json(item, indent, level + 1, out);
            }
            newline(out, level);
            out.push('}');
        }
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(f) if !n.is_i64() && !n.is_u64() => out.push_str(&crate::value::format_float(f)),
            _ => out.push_str(&n.to_string()),
        },
        scalar => out.push_str(&scalar.to_string()),
    }
}

// ============================================================================
// sys module
// ============================================================================

fn register_sys(m: &mut ModuleBuilder) {
    m.constant("stdout", PyValue::Stream(Stream::Stdout));
    m.constant("stderr", PyValue::Stream(Stream::Stderr));
    m.constant("version", PyValue::from(PYTHON_VERSION));
    m.constant(
        "version_info",
        PyValue::Tuple(vec![PyValue::Int(3), PyValue::Int(11), PyValue::Int(0)]),
    );
    m.constant("platform", PyValue::from(std::env::consts::OS));
    m.constant("argv", PyValue::list(vec![PyValue::from("")]));
    m.constant("maxsize", PyValue::Int(i64::MAX));
}

// ============================================================================
// typing module
// ============================================================================

fn register_typing(m: &mut ModuleBuilder) {
    // Annotations are never checked, so every typing name is inert.
    for name in [
        "Any", "Union", "Optional", "List", "Dict", "Tuple", "Set", "Iterable", "Iterator",
        "Callable", "Sequence", "Mapping",
    ] {
        m.constant(name, PyValue::None);
    }
}

// ============================================================================
// numpy module
// ============================================================================

fn register_numpy(m: &mut ModuleBuilder) {
    m.constant("pi", PyValue::Float(std::f64::consts::PI));
    m.constant("e", PyValue::Float(std::f64::consts::E));
    m.constant("nan", PyValue::Float(f64::NAN));
    m.constant("inf", PyValue::Float(f64::INFINITY));

    m.function("array", |args| {
        args.expect("array", 1, 2)?;
        let arr = NdArray::from_value(&args.positional[0])?;
        match args.get(1, "dtype") {
            Some(dtype) => Ok(PyValue::Array(arr.astype(dtype_arg(dtype)?))),
            None => Ok(PyValue::Array(arr)),
        }
    });
    m.function("zeros", |args| filled(&args, "zeros", 0.0));
    m.function("ones", |args| filled(&args, "ones", 1.0));
    m.function("arange", |args| {
        args.expect("arange", 1, 3)?;
        let all_int = args
            .positional
            .iter()
            .all(|v| matches!(v, PyValue::Int(_) | PyValue::Bool(_)));
        let bounds = args
            .positional
            .iter()
            .map(arg_float)
            .collect::<Result<Vec<_>>>()?;
        let (start, stop, step) = match bounds.as_slice() {
            [stop] => (0.0, *stop, 1.0),
            [start, stop] => (*start, *stop, 1.0),
            [start, stop, step, ..] => (*start, *stop, *step),
            [] => (0.0, 0.0, 1.0),
        };
        let dtype = if all_int { DType::Int } else { DType::Float };
        NdArray::arange(start, stop, step, dtype).map(PyValue::Array)
    });
    m.function("linspace", |args| {
        args.expect("linspace", 2, 3)?;
        let start = arg_float(&args.positional[0])?;
        let stop = arg_float(&args.positional[1])?;
        let num = args.int(2, "num")?.unwrap_or(50);
        if num < 0 {
            return Err(Error::raise(
                "ValueError",
                format!("Number of samples, {}, must be non-negative.", num),
            ));
        }
        Ok(PyValue::Array(NdArray::linspace(start, stop, num as usize)))
    });
    m.function("sum", |args| Ok(array_arg(&args, "sum")?.sum()));
    m.function("mean", |args| Ok(array_arg(&args, "mean")?.mean()));
    m.function("std", |args| Ok(array_arg(&args, "std")?.std()));
    m.function("min", |args| array_arg(&args, "min")?.min());
    m.function("max", |args| array_arg(&args, "max")?.max());
    m.function("sqrt", |args| elementwise(&args, "sqrt", f64::sqrt));
    m.function("exp", |args| elementwise(&args, "exp", f64::exp));
    m.function("log", |args| elementwise(&args, "log", f64::ln));
    m.function("abs", |args| {
        args.expect("abs", 1, 1)?;
        match &args.positional[0] {
            PyValue::Int(i) => Ok(PyValue::Int(i.wrapping_abs())),
            scalar @ (PyValue::Float(_) | PyValue::Bool(_)) => {
                Ok(PyValue::Float(arg_float(scalar)?.abs()))
            }
            other => {
                let arr = to_array(other)?;
                Ok(PyValue::Array(arr.map(f64::abs).astype(arr.dtype())))
            }
        }
    });
}

fn filled(args: &Args, func: &str, value: f64) -> Result<PyValue> {
    args.expect(func, 1, 2)?;
    let dims = match &args.positional[0] {
        dims @ (PyValue::Tuple(_) | PyValue::List(_)) => dims
            .sequence_items()
            .unwrap_or_default()
            .iter()
            .map(arg_int)
            .collect::<Result<Vec<_>>>()?,
        n => vec![arg_int(n)?],
    };
    if dims.iter().any(|&d| d < 0) {
        return Err(Error::raise("ValueError", "negative dimensions are not allowed"));
    }
    let shape: Vec<usize> = dims.into_iter().map(|d| d as usize).collect();
    let arr = NdArray::filled(shape, value);
    match args.get(1, "dtype") {
        Some(dtype) => Ok(PyValue::Array(arr.astype(dtype_arg(dtype)?))),
        None => Ok(PyValue::Array(arr)),
    }
}

fn array_arg(args: &Args, func: &str) -> Result<NdArray> {
    args.expect(func, 1, 1)?;
    to_array(&args.positional[0])
}

/// Apply `f` to a scalar, or to every element of an array-like.
fn elementwise(args: &Args, func: &str, f: fn(f64) -> f64) -> Result<PyValue> {
    args.expect(func, 1, 1)?;
    match &args.positional[0] {
        scalar @ (PyValue::Int(_) | PyValue::Float(_) | PyValue::Bool(_)) => {
            Ok(PyValue::Float(f(arg_float(scalar)?)))
        }
        other => Ok(PyValue::Array(to_array(other)?.map(f))),
    }
}

// ============================================================================
// pandas module
// ============================================================================

fn register_pandas(m: &mut ModuleBuilder) {
    m.function("DataFrame", |args| {
        args.expect("DataFrame", 0, 1)?;
        let data = args.get(0, "data").cloned().unwrap_or(PyValue::None);
        DataFrame::from_value(&data).map(PyValue::DataFrame)
    });
    m.function("Series", |args| {
        args.expect("Series", 0, 1)?;
        let data = args
            .get(0, "data")
            .cloned()
            .unwrap_or_else(|| PyValue::list(Vec::new()));
        let name = match args.keyword("name") {
            None | Some(PyValue::None) => None,
            Some(name) => Some(name.to_print_string()),
        };
        Series::from_value(&data, name).map(PyValue::Series)
    });
}

// ============================================================================
// matplotlib.pyplot module
// ============================================================================

fn register_pyplot(m: &mut ModuleBuilder) {
    // There is no display: plotting calls are accepted and ignored.
    for name in [
        "plot", "scatter", "bar", "hist", "pie", "title", "xlabel", "ylabel", "legend", "grid",
        "figure", "subplot", "tight_layout", "show", "savefig", "close", "xlim", "ylim",
    ] {
        m.function(name, |_| Ok(PyValue::None));
    }
}
