//! Method and attribute implementations for Python types.
//!
//! Every method takes its receiver by reference. Mutating methods
//! (`list.append`, `dict.update`, ...) edit the shared container behind
//! it, so every binding of that container sees the change, temporaries
//! included.

use crate::args::{Args, arg_int, arg_str};
use crate::array::NdArray;
use crate::error::{Error, Result};
use crate::value::{PyValue, Shared, format_float};

fn no_attribute(value: &PyValue, name: &str) -> Error {
    match value {
        PyValue::Module(module) => Error::raise(
            "AttributeError",
            format!("module '{}' has no attribute '{}'", module.name, name),
        ),
        _ => Error::raise(
            "AttributeError",
            format!("'{}' object has no attribute '{}'", value.type_name(), name),
        ),
    }
}

fn hashable(value: &PyValue) -> Result<()> {
    if value.is_hashable() {
        Ok(())
    } else {
        Err(Error::raise(
            "TypeError",
            format!("unhashable type: '{}'", value.type_name()),
        ))
    }
}

fn key_error(key: &PyValue) -> Error {
    Error::raise("KeyError", key.to_string())
}

/// Read a non-callable attribute: `arr.shape`, `df.columns`, `math.pi`.
pub fn get_attribute(value: &PyValue, name: &str) -> Result<PyValue> {
    let found = match (value, name) {
        (PyValue::Module(module), _) => module.get(name).cloned(),
        (PyValue::Array(arr), "shape") => Some(PyValue::shape_tuple(arr.shape())),
        (PyValue::Array(arr), "ndim") => Some(PyValue::Int(arr.ndim() as i64)),
        (PyValue::Array(arr), "size") => Some(PyValue::Int(arr.size() as i64)),
        (PyValue::Array(arr), "T") => Some(PyValue::Array(arr.transpose())),
        (PyValue::Array(arr), "dtype") => Some(PyValue::from(arr.dtype().name())),
        (PyValue::DataFrame(df), "shape") => {
            Some(PyValue::shape_tuple(&[df.rows(), df.columns.len()]))
        }
        (PyValue::DataFrame(df), "columns") => Some(PyValue::list(
            df.columns.iter().map(|c| PyValue::from(c.as_str())).collect(),
        )),
        (PyValue::DataFrame(df), "index") => Some(PyValue::list(
            df.index.iter().map(|c| PyValue::from(c.as_str())).collect(),
        )),
        (PyValue::DataFrame(df), "size") => {
            Some(PyValue::Int((df.rows() * df.columns.len()) as i64))
        }
        (PyValue::DataFrame(df), "empty") => Some(PyValue::Bool(df.rows() == 0)),
        (PyValue::DataFrame(df), column) if df.columns.iter().any(|c| c == column) => {
            Some(PyValue::Series(df.column(column)?))
        }
        (PyValue::Series(s), "shape") => Some(PyValue::shape_tuple(&[s.len()])),
        (PyValue::Series(s), "size") => Some(PyValue::Int(s.len() as i64)),
        (PyValue::Series(s), "name") => Some(s.name.as_deref().map(PyValue::from).into()),
        (PyValue::Series(s), "values") => Some(PyValue::Array(NdArray::from_value(
            &PyValue::list(s.values.clone()),
        )?)),
        (PyValue::Exception(exc), "args") => {
            Some(PyValue::Tuple(vec![PyValue::from(exc.message.as_str())]))
        }
        (PyValue::Function(func), "__name__") => Some(PyValue::from(func.name.as_str())),
        (PyValue::Type(name), "__name__") | (PyValue::Builtin(name), "__name__") => {
            Some(PyValue::from(*name))
        }
        _ => None,
    };
    found.ok_or_else(|| no_attribute(value, name))
}

/// Whether `value.method(...)` edits the receiver.
pub fn is_mutating(value: &PyValue, method: &str) -> bool {
    match value {
        PyValue::List(_) => matches!(
            method,
            "append" | "extend" | "insert" | "pop" | "remove" | "clear" | "sort" | "reverse"
        ),
        PyValue::Dict(_) => matches!(
            method,
            "update" | "pop" | "setdefault" | "clear" | "popitem"
        ),
        PyValue::Set(_) => matches!(
            method,
            "add" | "remove" | "discard" | "pop" | "clear" | "update"
        ),
        _ => false,
    }
}

/// Call `value.method(*args)`.
pub fn call_method(value: &PyValue, method: &str, args: Args) -> Result<PyValue> {
    if is_mutating(value, method) {
        return mutate(value, method, args);
    }
    match value {
        PyValue::Str(s) => call_str_method(s, method, args),
        PyValue::List(items) => call_sequence_method(value, &items.borrow(), method, args),
        PyValue::Tuple(items) => call_sequence_method(value, items, method, args),
        PyValue::Dict(pairs) => call_dict_method(&pairs.borrow(), method, args),
        PyValue::Set(items) => call_set_method(&items.borrow(), method, args),
        PyValue::Array(arr) => call_array_method(arr, method, args),
        PyValue::Series(series) => match method {
            "sum" => series.sum(),
            "mean" => series.mean(),
            "min" => series.min(),
            "max" => series.max(),
            "std" => series.std(),
            "tolist" | "to_list" => Ok(series.tolist()),
            "head" => Ok(PyValue::Series(series.head(count_arg(&args)?))),
            "tail" => Ok(PyValue::Series(series.tail(count_arg(&args)?))),
            _ => Err(no_attribute(value, method)),
        },
        PyValue::DataFrame(df) => match method {
            "head" => Ok(PyValue::DataFrame(df.head(count_arg(&args)?))),
            "tail" => Ok(PyValue::DataFrame(df.tail(count_arg(&args)?))),
            "describe" => Ok(PyValue::DataFrame(df.describe()?)),
            _ => Err(no_attribute(value, method)),
        },
        _ => Err(no_attribute(value, method)),
    }
}

fn count_arg(args: &Args) -> Result<usize> {
    Ok(args.int(0, "n")?.unwrap_or(5).max(0) as usize)
}

fn call_array_method(arr: &NdArray, method: &str, args: Args) -> Result<PyValue> {
    match method {
        "sum" => Ok(arr.sum()),
        "mean" => Ok(arr.mean()),
        "min" => arr.min(),
        "max" => arr.max(),
        "std" => Ok(arr.std()),
        "tolist" => Ok(arr.tolist()),
        "copy" => Ok(PyValue::Array(arr.clone())),
        "astype" => {
            args.expect("astype", 1, 1)?;
            Ok(PyValue::Array(arr.astype(crate::modules::dtype_arg(&args.positional[0])?)))
        }
        "transpose" => Ok(PyValue::Array(arr.transpose())),
        "flatten" => Ok(PyValue::Array(arr.reshape(&[-1])?)),
        "reshape" => {
            let dims: Vec<i64> = match args.positional.as_slice() {
                [PyValue::Tuple(dims)] => dims.iter().map(arg_int).collect::<Result<_>>()?,
                [PyValue::List(dims)] => {
                    dims.borrow().iter().map(arg_int).collect::<Result<_>>()?
                }
                dims => dims.iter().map(arg_int).collect::<Result<_>>()?,
            };
            Ok(PyValue::Array(arr.reshape(&dims)?))
        }
        _ => Err(no_attribute(&PyValue::Array(arr.clone()), method)),
    }
}

/// Call a method on a string value.
pub fn call_str_method(s: &str, method: &str, args: Args) -> Result<PyValue> {
    let chars_arg = |args: &Args| -> Result<Option<String>> {
        match args.first() {
            None | Some(PyValue::None) => Ok(None),
            Some(v) => Ok(Some(arg_str(v)?.to_string())),
        }
    };
    match method {
        "lower" => {
            args.expect("lower", 0, 0)?;
            Ok(PyValue::Str(s.to_lowercase()))
        }
        "upper" => {
            args.expect("upper", 0, 0)?;
            Ok(PyValue::Str(s.to_uppercase()))
        }
        "strip" | "lstrip" | "rstrip" => {
            args.expect(method, 0, 1)?;
            let chars = chars_arg(&args)?;
            let is_strip = |c: char| match &chars {
                Some(set) => set.contains(c),
                None => c.is_whitespace(),
            };
            let result = match method {
                "strip" => s.trim_matches(is_strip),
                "lstrip" => s.trim_start_matches(is_strip),
                _ => s.trim_end_matches(is_strip),
            };
            Ok(PyValue::Str(result.to_string()))
        }
        "split" | "rsplit" => {
            args.expect(method, 0, 2)?;
            let sep = match args.get(0, "sep") {
                None | Some(PyValue::None) => None,
                Some(v) => Some(arg_str(v)?.to_string()),
            };
            let maxsplit = args.int(1, "maxsplit")?.unwrap_or(-1);
            let parts: Vec<String> = match (&sep, maxsplit) {
                (Some(sep), _) if sep.is_empty() => {
                    return Err(Error::raise("ValueError", "empty separator"));
                }
                (Some(sep), n) if n >= 0 => {
                    if method == "split" {
                        s.splitn(n as usize + 1, sep.as_str()).map(str::to_string).collect()
                    } else {
                        let mut parts: Vec<String> =
                            s.rsplitn(n as usize + 1, sep.as_str()).map(str::to_string).collect();
                        parts.reverse();
                        parts
                    }
                }
                (Some(sep), _) => s.split(sep.as_str()).map(str::to_string).collect(),
                (None, _) => s.split_whitespace().map(str::to_string).collect(),
            };
            Ok(PyValue::list(parts.into_iter().map(PyValue::Str).collect()))
        }
        "splitlines" => Ok(PyValue::list(
            s.lines().map(|l| PyValue::Str(l.to_string())).collect(),
        )),
        "join" => {
            args.expect("join", 1, 1)?;
            let items = crate::builtins::iterate(&args.positional[0])?;
            let strings = items
                .iter()
                .map(|v| match v {
                    PyValue::Str(s) => Ok(s.clone()),
                    other => Err(Error::raise(
                        "TypeError",
                        format!(
                            "sequence item: expected str instance, {} found",
                            other.type_name()
                        ),
                    )),
                })
                .collect::<Result<Vec<String>>>()?;
            Ok(PyValue::Str(strings.join(s)))
        }
        "replace" => {
            args.expect("replace", 2, 3)?;
            let old = arg_str(&args.positional[0])?;
            let new = arg_str(&args.positional[1])?;
            match args.int(2, "count")? {
                Some(n) if n >= 0 => Ok(PyValue::Str(s.replacen(old, new, n as usize))),
                _ => Ok(PyValue::Str(s.replace(old, new))),
            }
        }
        "startswith" | "endswith" => {
            args.expect(method, 1, 1)?;
            let candidates: Vec<PyValue> = match &args.positional[0] {
                PyValue::Tuple(items) => items.clone(),
                other => vec![other.clone()],
            };
            for candidate in &candidates {
                let affix = arg_str(candidate)?;
                let hit = if method == "startswith" {
                    s.starts_with(affix)
                } else {
                    s.ends_with(affix)
                };
                if hit {
                    return Ok(PyValue::Bool(true));
                }
            }
            Ok(PyValue::Bool(false))
        }
        "find" | "index" => {
            args.expect(method, 1, 1)?;
            let needle = arg_str(&args.positional[0])?;
            match s.find(needle) {
                Some(byte) => Ok(PyValue::Int(s[..byte].chars().count() as i64)),
                None if method == "find" => Ok(PyValue::Int(-1)),
                None => Err(Error::raise("ValueError", "substring not found")),
            }
        }
        "count" => {
            args.expect("count", 1, 1)?;
            let needle = arg_str(&args.positional[0])?;
            if needle.is_empty() {
                return Ok(PyValue::Int(s.chars().count() as i64 + 1));
            }
            Ok(PyValue::Int(s.matches(needle).count() as i64))
        }
        "isdigit" | "isnumeric" | "isdecimal" => {
            Ok(PyValue::Bool(!s.is_empty() && s.chars().all(|c| c.is_ascii_digit())))
        }
        "isalpha" => Ok(PyValue::Bool(!s.is_empty() && s.chars().all(char::is_alphabetic))),
        "isalnum" => Ok(PyValue::Bool(!s.is_empty() && s.chars().all(char::is_alphanumeric))),
        "isspace" => Ok(PyValue::Bool(!s.is_empty() && s.chars().all(char::is_whitespace))),
        "isupper" => Ok(PyValue::Bool(
            s.chars().any(char::is_alphabetic) && !s.chars().any(char::is_lowercase),
        )),
        "islower" => Ok(PyValue::Bool(
            s.chars().any(char::is_alphabetic) && !s.chars().any(char::is_uppercase),
        )),
        "title" => {
            let mut result = String::with_capacity(s.len());
            let mut boundary = true;
            for c in s.chars() {
                if c.is_alphabetic() {
                    if boundary {
                        result.extend(c.to_uppercase());
                    } else {
                        result.extend(c.to_lowercase());
                    }
                    boundary = false;
                } else {
                    result.push(c);
                    boundary = true;
                }
            }
            Ok(PyValue::Str(result))
        }
        "capitalize" => {
            let mut chars = s.chars();
            let result = match chars.next() {
                Some(c) => c.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            };
            Ok(PyValue::Str(result))
        }
        "swapcase" => Ok(PyValue::Str(
            s.chars()
                .map(|c| {
                    if c.is_uppercase() {
                        c.to_lowercase().collect::<String>()
                    } else {
                        c.to_uppercase().collect::<String>()
                    }
                })
                .collect(),
        )),
        "center" | "ljust" | "rjust" => {
            args.expect(method, 1, 2)?;
            let width = arg_int(&args.positional[0])?.max(0) as usize;
            let fill = match args.positional.get(1) {
                Some(v) => arg_str(v)?.chars().next().unwrap_or(' '),
                None => ' ',
            };
            let align = match method {
                "center" => '^',
                "ljust" => '<',
                _ => '>',
            };
            Ok(PyValue::Str(pad(s, width, fill, align)))
        }
        "zfill" => {
            args.expect("zfill", 1, 1)?;
            let width = arg_int(&args.positional[0])?.max(0) as usize;
            let len = s.chars().count();
            if len >= width {
                return Ok(PyValue::Str(s.to_string()));
            }
            let zeros = "0".repeat(width - len);
            let result = match s.strip_prefix(['-', '+']) {
                Some(rest) => format!("{}{}{}", &s[..1], zeros, rest),
                None => format!("{}{}", zeros, s),
            };
            Ok(PyValue::Str(result))
        }
        "format" => format_str(s, &args).map(PyValue::Str),
        _ => Err(no_attribute(&PyValue::Str(s.to_string()), method)),
    }
}

/// Methods shared by list and tuple.
fn call_sequence_method(
    value: &PyValue,
    items: &[PyValue],
    method: &str,
    args: Args,
) -> Result<PyValue> {
    match method {
        "index" => {
            args.expect("index", 1, 1)?;
            items
                .iter()
                .position(|item| item == &args.positional[0])
                .map(|i| PyValue::Int(i as i64))
                .ok_or_else(|| {
                    Error::raise(
                        "ValueError",
                        format!("{} is not in {}", args.positional[0], value.type_name()),
                    )
                })
        }
        "count" => {
            args.expect("count", 1, 1)?;
            let count = items.iter().filter(|&item| item == &args.positional[0]).count();
            Ok(PyValue::Int(count as i64))
        }
        "copy" if matches!(value, PyValue::List(_)) => {
            args.expect("copy", 0, 0)?;
            Ok(PyValue::list(items.to_vec()))
        }
        _ => Err(no_attribute(value, method)),
    }
}

/// Call a method on a dict value (non-mutating).
pub fn call_dict_method(pairs: &[(PyValue, PyValue)], method: &str, args: Args) -> Result<PyValue> {
    match method {
        "get" => {
            args.expect("get", 1, 2)?;
            let key = &args.positional[0];
            hashable(key)?;
            let default = args.positional.get(1).cloned().unwrap_or(PyValue::None);
            Ok(pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap_or(default))
        }
        "keys" => {
            args.expect("keys", 0, 0)?;
            Ok(PyValue::list(pairs.iter().map(|(k, _)| k.clone()).collect()))
        }
        "values" => {
            args.expect("values", 0, 0)?;
            Ok(PyValue::list(pairs.iter().map(|(_, v)| v.clone()).collect()))
        }
        "items" => {
            args.expect("items", 0, 0)?;
            Ok(PyValue::list(
                pairs
                    .iter()
                    .map(|(k, v)| PyValue::Tuple(vec![k.clone(), v.clone()]))
                    .collect(),
            ))
        }
        "copy" => {
            args.expect("copy", 0, 0)?;
            Ok(PyValue::dict(pairs.to_vec()))
        }
        _ => Err(no_attribute(&PyValue::dict(vec![]), method)),
    }
}

fn call_set_method(items: &[PyValue], method: &str, args: Args) -> Result<PyValue> {
    let other = |args: &Args| -> Result<Vec<PyValue>> {
        args.expect(method, 1, 1)?;
        crate::builtins::iterate(&args.positional[0])
    };
    match method {
        "copy" => Ok(PyValue::set(items.to_vec())),
        "union" => {
            let mut result = items.to_vec();
            for item in other(&args)? {
                if !result.contains(&item) {
                    result.push(item);
                }
            }
            Ok(PyValue::set(result))
        }
        "intersection" => {
            let other = other(&args)?;
            Ok(PyValue::set(
                items.iter().filter(|x| other.contains(x)).cloned().collect(),
            ))
        }
        "difference" => {
            let other = other(&args)?;
            Ok(PyValue::set(
                items.iter().filter(|x| !other.contains(x)).cloned().collect(),
            ))
        }
        "issubset" => {
            let other = other(&args)?;
            Ok(PyValue::Bool(items.iter().all(|x| other.contains(x))))
        }
        "issuperset" => {
            let other = other(&args)?;
            Ok(PyValue::Bool(other.iter().all(|x| items.contains(x))))
        }
        _ => Err(no_attribute(&PyValue::set(vec![]), method)),
    }
}

/// Apply a mutating method to the container behind `value`.
///
/// Arguments are fully read before the container is borrowed for writing,
/// so `items.extend(items)` and friends are safe.
pub fn mutate(value: &PyValue, method: &str, args: Args) -> Result<PyValue> {
    match value {
        PyValue::List(items) => mutate_list(items, method, args),
        PyValue::Dict(pairs) => mutate_dict(pairs, method, args),
        PyValue::Set(items) => mutate_set(items, method, args),
        other => Err(no_attribute(other, method)),
    }
}

/// Mutating list methods (append, extend, pop, etc.)
fn mutate_list(list: &Shared<Vec<PyValue>>, method: &str, args: Args) -> Result<PyValue> {
    match method {
        "append" => {
            args.expect("append", 1, 1)?;
            list.borrow_mut().extend(args.positional);
            Ok(PyValue::None)
        }
        "extend" => {
            args.expect("extend", 1, 1)?;
            let extra = crate::builtins::iterate(&args.positional[0])?;
            list.borrow_mut().extend(extra);
            Ok(PyValue::None)
        }
        "pop" => {
            args.expect("pop", 0, 1)?;
            let index = args.int(0, "index")?.unwrap_or(-1);
            let mut items = list.borrow_mut();
            if items.is_empty() {
                return Err(Error::raise("IndexError", "pop from empty list"));
            }
            let len = items.len() as i64;
            let index = if index < 0 { len + index } else { index };
            if !(0..len).contains(&index) {
                return Err(Error::raise("IndexError", "pop index out of range"));
            }
            Ok(items.remove(index as usize))
        }
        "clear" => {
            args.expect("clear", 0, 0)?;
            list.borrow_mut().clear();
            Ok(PyValue::None)
        }
        "insert" => {
            args.expect("insert", 2, 2)?;
            let index = arg_int(&args.positional[0])?;
            let mut items = list.borrow_mut();
            let len = items.len() as i64;
            let idx = if index < 0 {
                (len + index).max(0) as usize
            } else {
                (index as usize).min(items.len())
            };
            items.insert(idx, args.positional[1].clone());
            Ok(PyValue::None)
        }
        "remove" => {
            args.expect("remove", 1, 1)?;
            let found = list.borrow().iter().position(|x| x == &args.positional[0]);
            match found {
                Some(idx) => {
                    list.borrow_mut().remove(idx);
                    Ok(PyValue::None)
                }
                None => Err(Error::raise("ValueError", "list.remove(x): x not in list")),
            }
        }
        "reverse" => {
            args.expect("reverse", 0, 0)?;
            list.borrow_mut().reverse();
            Ok(PyValue::None)
        }
        "sort" => {
            args.expect("sort", 0, 0)?;
            let reverse = args.keyword("reverse").is_some_and(PyValue::is_truthy);
            let sorted = crate::builtins::sort_by_keys(list.snapshot(), None, reverse)?;
            *list.borrow_mut() = sorted;
            Ok(PyValue::None)
        }
        _ => Err(no_attribute(&PyValue::list(vec![]), method)),
    }
}

/// Mutating dict methods (update, setdefault, pop, clear, popitem)
fn mutate_dict(
    dict: &Shared<Vec<(PyValue, PyValue)>>,
    method: &str,
    args: Args,
) -> Result<PyValue> {
    match method {
        "update" => {
            args.expect("update", 0, 1)?;
            let mut incoming: Vec<(PyValue, PyValue)> = match args.positional.first() {
                Some(PyValue::Dict(new_pairs)) => new_pairs.snapshot(),
                Some(other) => crate::builtins::iterate(other)?
                    .into_iter()
                    .map(|item| crate::builtins::pair(&item))
                    .collect::<Result<_>>()?,
                None => Vec::new(),
            };
            incoming.extend(
                args.keywords
                    .into_iter()
                    .map(|(k, v)| (PyValue::Str(k), v)),
            );
            for (k, v) in incoming {
                hashable(&k)?;
                insert_pair(dict, k, v);
            }
            Ok(PyValue::None)
        }
        "setdefault" => {
            args.expect("setdefault", 1, 2)?;
            let key = &args.positional[0];
            hashable(key)?;
            if let Some((_, v)) = dict.borrow().iter().find(|(k, _)| k == key) {
                return Ok(v.clone());
            }
            let default = args.positional.get(1).cloned().unwrap_or(PyValue::None);
            dict.borrow_mut().push((key.clone(), default.clone()));
            Ok(default)
        }
        "pop" => {
            args.expect("pop", 1, 2)?;
            let key = &args.positional[0];
            let found = dict.borrow().iter().position(|(k, _)| k == key);
            if let Some(pos) = found {
                let (_, v) = dict.borrow_mut().remove(pos);
                return Ok(v);
            }
            args.positional.get(1).cloned().ok_or_else(|| key_error(key))
        }
        "popitem" => {
            args.expect("popitem", 0, 0)?;
            let last = dict.borrow_mut().pop();
            let (k, v) = last.ok_or_else(|| {
                Error::raise("KeyError", "'popitem(): dictionary is empty'")
            })?;
            Ok(PyValue::Tuple(vec![k, v]))
        }
        "clear" => {
            args.expect("clear", 0, 0)?;
            dict.borrow_mut().clear();
            Ok(PyValue::None)
        }
        _ => Err(no_attribute(&PyValue::dict(vec![]), method)),
    }
}

/// Bind `key` to `value`, keeping the key's original position if present.
fn insert_pair(dict: &Shared<Vec<(PyValue, PyValue)>>, key: PyValue, value: PyValue) {
    let found = dict.borrow().iter().position(|(k, _)| *k == key);
    let mut pairs = dict.borrow_mut();
    match found {
        Some(pos) => pairs[pos].1 = value,
        None => pairs.push((key, value)),
    }
}

/// Mutating set methods (add, remove, discard, pop, clear, update)
fn mutate_set(set: &Shared<Vec<PyValue>>, method: &str, args: Args) -> Result<PyValue> {
    match method {
        "add" => {
            args.expect("add", 1, 1)?;
            let item = &args.positional[0];
            hashable(item)?;
            if !set.borrow().contains(item) {
                set.borrow_mut().push(item.clone());
            }
            Ok(PyValue::None)
        }
        "remove" | "discard" => {
            args.expect(method, 1, 1)?;
            let item = &args.positional[0];
            let found = set.borrow().iter().position(|x| x == item);
            match found {
                Some(idx) => {
                    set.borrow_mut().remove(idx);
                }
                None if method == "remove" => return Err(key_error(item)),
                None => {}
            }
            Ok(PyValue::None)
        }
        "pop" => {
            args.expect("pop", 0, 0)?;
            let mut items = set.borrow_mut();
            if items.is_empty() {
                return Err(Error::raise("KeyError", "'pop from an empty set'"));
            }
            Ok(items.remove(0))
        }
        "clear" => {
            args.expect("clear", 0, 0)?;
            set.borrow_mut().clear();
            Ok(PyValue::None)
        }
        "update" => {
            for iterable in &args.positional {
                for item in crate::builtins::iterate(iterable)? {
                    hashable(&item)?;
                    if !set.borrow().contains(&item) {
                        set.borrow_mut().push(item);
                    }
                }
            }
            Ok(PyValue::None)
        }
        _ => Err(no_attribute(&PyValue::set(vec![]), method)),
    }
}

/// Index a value: `value[key]`.
pub fn get_item(value: &PyValue, key: &PyValue) -> Result<PyValue> {
    match (value, key) {
        (PyValue::List(items), _) => {
            let items = items.borrow();
            let index = sequence_index(key, items.len(), "list")?;
            Ok(items[index].clone())
        }
        (PyValue::Tuple(items), _) => {
            let index = sequence_index(key, items.len(), "tuple")?;
            Ok(items[index].clone())
        }
        (PyValue::Str(s), _) => {
            let chars: Vec<char> = s.chars().collect();
            let index = sequence_index(key, chars.len(), "string")?;
            Ok(PyValue::Str(chars[index].to_string()))
        }
        (PyValue::Dict(pairs), _) => {
            hashable(key)?;
            pairs
                .borrow()
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| key_error(key))
        }
        (PyValue::Array(arr), PyValue::Tuple(indices)) => match indices.as_slice() {
            [row, col] => arr.index2(arg_int(row)?, arg_int(col)?),
            _ => Err(Error::Unsupported("multi-axis array indexing".to_string())),
        },
        (PyValue::Array(arr), _) => arr.index(arg_int(key)?),
        (PyValue::DataFrame(df), PyValue::Str(name)) => Ok(PyValue::Series(df.column(name)?)),
        (PyValue::DataFrame(df), PyValue::List(names)) => {
            let names = names.borrow();
            let mut columns = Vec::with_capacity(names.len());
            for name in names.iter() {
                let name = arg_str(name)?;
                columns.push((PyValue::from(name), PyValue::Series(df.column(name)?)));
            }
            Ok(PyValue::DataFrame(crate::array::DataFrame::from_value(
                &PyValue::dict(columns),
            )?))
        }
        (PyValue::DataFrame(_), other) => Err(key_error(other)),
        (PyValue::Series(series), _) => series.get(key),
        _ => Err(Error::raise(
            "TypeError",
            format!("'{}' object is not subscriptable", value.type_name()),
        )),
    }
}

/// Assign `container[key] = item` in place.
///
/// Lists and dicts change behind every reference to them. A frame is a
/// plain value, so only `container` itself changes.
pub fn set_item(container: &mut PyValue, key: PyValue, item: PyValue) -> Result<()> {
    match container {
        PyValue::List(items) => {
            let len = items.borrow().len();
            let index = sequence_index(&key, len, "list assignment")?;
            items.borrow_mut()[index] = item;
            Ok(())
        }
        PyValue::Dict(pairs) => {
            hashable(&key)?;
            insert_pair(pairs, key, item);
            Ok(())
        }
        PyValue::DataFrame(df) => {
            let name = arg_str(&key)?.to_string();
            df.set_column(&name, &item)
        }
        other => Err(Error::raise(
            "TypeError",
            format!(
                "'{}' object does not support item assignment",
                other.type_name()
            ),
        )),
    }
}

/// Delete `container[key]` in place.
pub fn del_item(container: &PyValue, key: &PyValue) -> Result<()> {
    match container {
        PyValue::List(items) => {
            let len = items.borrow().len();
            let index = sequence_index(key, len, "list assignment")?;
            items.borrow_mut().remove(index);
            Ok(())
        }
        PyValue::Dict(pairs) => {
            let found = pairs.borrow().iter().position(|(k, _)| k == key);
            match found {
                Some(pos) => {
                    pairs.borrow_mut().remove(pos);
                    Ok(())
                }
                None => Err(key_error(key)),
            }
        }
        other => Err(Error::raise(
            "TypeError",
            format!(
                "'{}' object doesn't support item deletion",
                other.type_name()
            ),
        )),
    }
}

fn sequence_index(key: &PyValue, len: usize, what: &str) -> Result<usize> {
    let index = match key {
        PyValue::Int(_) | PyValue::Bool(_) => key.as_int().unwrap_or(0),
        other => {
            return Err(Error::raise(
                "TypeError",
                format!(
                    "{} indices must be integers or slices, not {}",
                    what.split(' ').next().unwrap_or(what),
                    other.type_name()
                ),
            ));
        }
    };
    let len = len as i64;
    let actual = if index < 0 { len + index } else { index };
    if (0..len).contains(&actual) {
        Ok(actual as usize)
    } else {
        Err(Error::raise("IndexError", format!("{} index out of range", what)))
    }
}

fn pad(s: &str, width: usize, fill: char, align: char) -> String {
    let len = s.chars().count();
    if len >= width {
        return s.to_string();
    }
    let total = width - len;
    let (left, right) = match align {
        '<' => (0, total),
        '^' => (total / 2, total - total / 2),
        _ => (total, 0),
    };
    let fill_str = |n: usize| std::iter::repeat_n(fill, n).collect::<String>();
    format!("{}{}{}", fill_str(left), s, fill_str(right))
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Apply a format spec (`.2f`, `>10`, `,d`, `05.1%`) to a value.
pub fn format_with_spec(value: &PyValue, spec: &str) -> Result<String> {
    if spec.is_empty() {
        return Ok(value.to_print_string());
    }
    let invalid = || {
        Error::raise(
            "ValueError",
            format!(
                "Invalid format specifier '{}' for object of type '{}'",
                spec,
                value.type_name()
            ),
        )
    };
    let chars: Vec<char> = spec.chars().collect();
    let mut pos = 0;
    let mut fill = ' ';
    let mut align = None;
    if chars.len() >= 2 && matches!(chars[1], '<' | '>' | '^' | '=') {
        fill = chars[0];
        align = Some(chars[1]);
        pos = 2;
    } else if matches!(chars.first(), Some('<' | '>' | '^' | '=')) {
        align = Some(chars[0]);
        pos = 1;
    }
    let mut sign = '-';
    if let Some(&c) = chars.get(pos)
        && matches!(c, '+' | '-' | ' ')
    {
        sign = c;
        pos += 1;
    }
    if chars.get(pos) == Some(&'0') {
        fill = '0';
        align = align.or(Some('='));
        pos += 1;
    }
    let mut width = String::new();
    while let Some(c) = chars.get(pos).filter(|c| c.is_ascii_digit()) {
        width.push(*c);
        pos += 1;
    }
    let grouping = chars.get(pos) == Some(&',');
    if grouping {
        pos += 1;
    }
    let mut precision = None;
    if chars.get(pos) == Some(&'.') {
        pos += 1;
        let mut digits = String::new();
        while let Some(c) = chars.get(pos).filter(|c| c.is_ascii_digit()) {
            digits.push(*c);
            pos += 1;
        }
        precision = Some(digits.parse::<usize>().map_err(|_| invalid())?);
    }
    let kind = chars.get(pos).copied();
    if chars.len() > pos + 1 {
        return Err(invalid());
    }
    let width: usize = if width.is_empty() { 0 } else { width.parse().map_err(|_| invalid())? };

    let numeric = matches!(value, PyValue::Int(_) | PyValue::Float(_) | PyValue::Bool(_));
    let (negative, body) = match kind {
        Some('d') => {
            let n = value.as_int().ok_or_else(invalid)?;
            let digits = n.unsigned_abs().to_string();
            (n < 0, if grouping { group_thousands(&digits) } else { digits })
        }
        Some('f' | 'F' | '%') => {
            let mut f = value.as_float().ok_or_else(invalid)?;
            if kind == Some('%') {
                f *= 100.0;
            }
            let text = format!("{:.*}", precision.unwrap_or(6), f.abs());
            let text = match text.split_once('.') {
                Some((int, frac)) if grouping => format!("{}.{}", group_thousands(int), frac),
                _ if grouping => group_thousands(&text),
                _ => text,
            };
            let suffix = if kind == Some('%') { "%" } else { "" };
            (f.is_sign_negative() && f != 0.0, format!("{}{}", text, suffix))
        }
        Some('e' | 'E') => {
            let f = value.as_float().ok_or_else(invalid)?;
            let text = format!("{:.*e}", precision.unwrap_or(6), f.abs());
            let text = match text.split_once('e') {
                Some((mantissa, exp)) => {
                    let (esign, digits) = match exp.strip_prefix('-') {
                        Some(d) => ('-', d),
                        None => ('+', exp),
                    };
                    format!("{}e{}{:0>2}", mantissa, esign, digits)
                }
                None => text,
            };
            (f < 0.0, text)
        }
        Some('x' | 'X' | 'b' | 'o') => {
            let n = value.as_int().ok_or_else(invalid)?;
            let magnitude = n.unsigned_abs();
            let text = match kind {
                Some('x') => format!("{:x}", magnitude),
                Some('X') => format!("{:X}", magnitude),
                Some('b') => format!("{:b}", magnitude),
                _ => format!("{:o}", magnitude),
            };
            (n < 0, text)
        }
        Some('s') | None if !matches!(value, PyValue::Float(_)) || precision.is_none() => {
            let mut text = match value {
                PyValue::Float(f) if kind.is_none() => format_float(f.abs()),
                PyValue::Int(i) if kind.is_none() => i.unsigned_abs().to_string(),
                other => other.to_print_string(),
            };
            let negative = match value {
                PyValue::Float(f) if kind.is_none() => *f < 0.0,
                PyValue::Int(i) if kind.is_none() => *i < 0,
                _ => false,
            };
            if let Some(p) = precision {
                text = text.chars().take(p).collect();
            }
            if grouping && numeric {
                text = match text.split_once('.') {
                    Some((int, frac)) => format!("{}.{}", group_thousands(int), frac),
                    None => group_thousands(&text),
                };
            }
            (negative, text)
        }
        Some('g' | 'G') | None => {
            let f = value.as_float().ok_or_else(invalid)?;
            let p = precision.unwrap_or(6).max(1);
            let text = format_general(f.abs(), p);
            (f < 0.0, text)
        }
        Some(_) => return Err(invalid()),
    };

    let sign_str = match (negative, sign) {
        (true, _) => "-",
        (false, '+') => "+",
        (false, ' ') => " ",
        _ => "",
    };
    let default_align = if numeric { '>' } else { '<' };
    let align = align.unwrap_or(default_align);
    if align == '=' {
        let inner_width = width.saturating_sub(sign_str.chars().count());
        return Ok(format!("{}{}", sign_str, pad(&body, inner_width, fill, '>')));
    }
    Ok(pad(&format!("{}{}", sign_str, body), width, fill, align))
}

/// `%g`-style formatting with `precision` significant digits.
fn format_general(f: f64, precision: usize) -> String {
    if f == 0.0 {
        return "0".to_string();
    }
    let exp = f.log10().floor() as i32;
    if exp < -4 || exp >= precision as i32 {
        let text = format!("{:.*e}", precision - 1, f);
        return match text.split_once('e') {
            Some((mantissa, e)) => {
                let mantissa = trim_fraction(mantissa);
                let (esign, digits) = match e.strip_prefix('-') {
                    Some(d) => ('-', d),
                    None => ('+', e),
                };
                format!("{}e{}{:0>2}", mantissa, esign, digits)
            }
            None => text,
        };
    }
    let decimals = (precision as i32 - 1 - exp).max(0) as usize;
    trim_fraction(&format!("{:.*}", decimals, f))
}

fn trim_fraction(text: &str) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text.to_string()
    }
}

/// `str.format`: positional `{}` / `{0}`, keyword `{name}`, and specs.
pub fn format_str(template: &str, args: &Args) -> Result<String> {
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    let mut auto_index = 0;
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => field.push(ch),
                        None => {
                            return Err(Error::raise(
                                "ValueError",
                                "expected '}' before end of string",
                            ));
                        }
                    }
                }
                let (name, spec) = field.split_once(':').unwrap_or((field.as_str(), ""));
                let (name, conversion) = match name.split_once('!') {
                    Some((name, conv)) => (name, Some(conv)),
                    None => (name, None),
                };
                let value = if name.is_empty() {
                    let value = args.positional.get(auto_index).cloned();
                    auto_index += 1;
                    value
                } else if let Ok(index) = name.parse::<usize>() {
                    args.positional.get(index).cloned()
                } else {
                    args.keyword(name).cloned()
                };
                let value = value.ok_or_else(|| {
                    if name.is_empty() || name.parse::<usize>().is_ok() {
                        Error::raise(
                            "IndexError",
                            "Replacement index out of range for positional args tuple",
                        )
                    } else {
                        Error::raise("KeyError", crate::value::repr_str(name))
                    }
                })?;
                let value = match conversion {
                    Some("r") => PyValue::Str(value.to_string()),
                    Some("s") => PyValue::Str(value.to_print_string()),
                    _ => value,
                };
                out.push_str(&format_with_spec(&value, spec)?);
            }
            '}' => {
                return Err(Error::raise(
                    "ValueError",
                    "Single '}' encountered in format string",
                ));
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn spec(value: PyValue, spec: &str) -> String {
        format_with_spec(&value, spec).unwrap()
    }

    #[test]
    fn test_format_specs() {
        assert_eq!(spec(PyValue::Float(3.14159), ".2f"), "3.14");
        assert_eq!(spec(PyValue::Int(42), "5d"), "   42");
        assert_eq!(spec(PyValue::Int(42), "05d"), "00042");
        assert_eq!(spec(PyValue::Int(1234567), ",d"), "1,234,567");
        assert_eq!(spec(PyValue::from("ab"), ">4"), "  ab");
        assert_eq!(spec(PyValue::from("ab"), "*^6"), "**ab**");
        assert_eq!(spec(PyValue::Float(0.256), ".1%"), "25.6%");
        assert_eq!(spec(PyValue::Float(-1.5), "+.1f"), "-1.5");
        assert_eq!(spec(PyValue::Int(7), "+d"), "+7");
        assert_eq!(spec(PyValue::Float(1234.5), ".3g"), "1.23e+03");
    }

    #[test]
    fn test_str_format() {
        let args = Args::with_keywords(
            vec![PyValue::from("Ada"), PyValue::Float(2.5)],
            vec![("unit".to_string(), PyValue::from("kg"))],
        );
        assert_eq!(
            format_str("{} weighs {:.1f} {unit} {{ok}}", &args).unwrap(),
            "Ada weighs 2.5 kg {ok}"
        );
        assert_eq!(format_str("{1}-{0}", &args).unwrap(), "2.5-Ada");
    }

    #[test]
    fn test_split_variants() {
        let result =
            call_str_method("a,b,,c", "split", Args::new(vec![PyValue::from(",")])).unwrap();
        assert_eq!(result, PyValue::from(vec!["a", "b", "", "c"]));
        let result = call_str_method("  a  b ", "split", Args::default()).unwrap();
        assert_eq!(result, PyValue::from(vec!["a", "b"]));
    }

    #[test]
    fn test_list_mutation() {
        let value = PyValue::from(vec![3, 1]);
        let alias = value.clone();
        call_method(&value, "append", Args::new(vec![PyValue::Int(2)])).unwrap();
        call_method(&value, "sort", Args::default()).unwrap();
        assert_eq!(alias, PyValue::from(vec![1, 2, 3]));
        let popped = call_method(&alias, "pop", Args::new(vec![PyValue::Int(0)])).unwrap();
        assert_eq!(popped, PyValue::Int(1));
        assert_eq!(value, PyValue::from(vec![2, 3]));
    }

    #[test]
    fn test_extend_with_itself() {
        let value = PyValue::from(vec![1, 2]);
        call_method(&value, "extend", Args::new(vec![value.clone()])).unwrap();
        assert_eq!(value, PyValue::from(vec![1, 2, 1, 2]));
    }

    #[test]
    fn test_setdefault_returns_the_stored_container() {
        let dict = PyValue::dict(vec![]);
        let args = || Args::new(vec![PyValue::from("k"), PyValue::list(vec![])]);
        let bucket = call_method(&dict, "setdefault", args()).unwrap();
        call_method(&bucket, "append", Args::new(vec![PyValue::Int(1)])).unwrap();
        let again = call_method(&dict, "setdefault", args()).unwrap();
        call_method(&again, "append", Args::new(vec![PyValue::Int(2)])).unwrap();
        assert_eq!(dict.to_string(), "{'k': [1, 2]}");
    }

    #[test]
    fn test_missing_attribute() {
        let err = call_method(&PyValue::from("x"), "append", Args::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "AttributeError: 'str' object has no attribute 'append'"
        );
    }

    #[test]
    fn test_index_errors() {
        let list = PyValue::from(vec![1]);
        let err = get_item(&list, &PyValue::Int(5)).unwrap_err();
        assert_eq!(err.to_string(), "IndexError: list index out of range");
        let dict = PyValue::dict(vec![]);
        let err = get_item(&dict, &PyValue::from("k")).unwrap_err();
        assert_eq!(err.to_string(), "KeyError: 'k'");
    }
}
