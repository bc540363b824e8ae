use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use rustpython_parser::ast::{Expr, Stmt};

use crate::args::Args;
use crate::array::{DataFrame, NdArray, Series};
use crate::error::{Exception, Result};
use crate::traceback::SourceCode;

/// A function implemented in Rust and exposed through a module.
pub type NativeFn = Arc<dyn Fn(Args) -> Result<PyValue> + Send + Sync>;

/// A mutable container shared by every binding that refers to it.
///
/// Cloning a `Shared` makes another reference to the same storage, the
/// way assigning a list to a second name does in Python.
pub struct Shared<T>(Rc<RefCell<T>>);

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    /// Borrow the contents.
    ///
    /// # Panics
    ///
    /// Panics if the contents are mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    /// Borrow the contents mutably. Callers keep the borrow short and run
    /// no snippet code while holding it.
    ///
    /// # Panics
    ///
    /// Panics if the contents are already borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    /// Whether both handles refer to the same container (Python `is`).
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl<T: Clone> Shared<T> {
    /// A copy of the current contents, detached from this container.
    pub fn snapshot(&self) -> T {
        self.0.borrow().clone()
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        guarded(f, self.addr(), "Shared(..)", |f| match self.0.try_borrow() {
            Ok(inner) => inner.fmt(f),
            Err(_) => f.write_str("Shared(<borrowed>)"),
        })
    }
}

/// Represents a Python value inside the interpreter.
///
/// Lists, dicts and sets are [`Shared`]: cloning the value aliases the
/// container, so a mutation through one binding is seen through all of
/// them. Tuples and strings are immutable and held directly. Arrays,
/// frames and series stay plain values.
#[derive(Debug, Clone)]
pub enum PyValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Shared<Vec<PyValue>>),
    Tuple(Vec<PyValue>),
    /// Insertion-ordered key/value pairs. Keys are hashable values.
    Dict(Shared<Vec<(PyValue, PyValue)>>),
    /// Insertion-ordered unique elements.
    Set(Shared<Vec<PyValue>>),
    /// A `def` or `lambda` defined by the snippet.
    Function(Rc<UserFunction>),
    /// A built-in function such as `len` or `print`.
    Builtin(&'static str),
    /// A built-in type (`int`, `list`, ...) or exception class (`ValueError`, ...).
    Type(&'static str),
    /// A module-level function implemented in Rust.
    NativeFunction(NativeFunction),
    /// An exception instance, as bound by `except ... as e`.
    Exception(Box<Exception>),
    Module(Rc<Module>),
    /// `sys.stdout` or `sys.stderr`.
    Stream(Stream),
    Array(NdArray),
    DataFrame(DataFrame),
    Series(Series),
}

/// A function defined by snippet code.
#[derive(Debug)]
pub struct UserFunction {
    pub name: String,
    /// Positional parameters, including positional-only ones.
    pub params: Vec<Param>,
    pub vararg: Option<String>,
    pub kwonly: Vec<Param>,
    pub kwarg: Option<String>,
    /// Names the body binds, which makes them local for the whole call.
    /// Names declared `global` are left out.
    pub assigned: Vec<String>,
    pub body: FunctionBody,
    /// Enclosing function locals captured when the function was defined.
    pub closure: Vec<(String, PyValue)>,
    pub source: Arc<SourceCode>,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    /// Default value, evaluated once at definition time.
    pub default: Option<PyValue>,
}

#[derive(Debug)]
pub enum FunctionBody {
    Block(Vec<Stmt>),
    Lambda(Box<Expr>),
}

#[derive(Clone)]
pub struct NativeFunction {
    pub name: String,
    pub func: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A module object: a name plus its attributes.
#[derive(Debug)]
pub struct Module {
    pub name: String,
    pub attrs: Vec<(String, PyValue)>,
}

impl Module {
    pub fn get(&self, name: &str) -> Option<&PyValue> {
        self.attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl PyValue {
    /// A new list holding `items`.
    pub fn list(items: Vec<PyValue>) -> PyValue {
        PyValue::List(Shared::new(items))
    }

    /// A new dict holding `pairs`, which must already have unique keys.
    pub fn dict(pairs: Vec<(PyValue, PyValue)>) -> PyValue {
        PyValue::Dict(Shared::new(pairs))
    }

    /// A new set holding `items`, which must already be unique.
    pub fn set(items: Vec<PyValue>) -> PyValue {
        PyValue::Set(Shared::new(items))
    }

    /// The elements of a list or tuple, copied out.
    pub fn sequence_items(&self) -> Option<Vec<PyValue>> {
        match self {
            PyValue::List(items) => Some(items.snapshot()),
            PyValue::Tuple(items) => Some(items.clone()),
            _ => None,
        }
    }

    /// Python `is`: same container for lists, dicts and sets, equal value
    /// for everything else.
    pub fn is_same(&self, other: &PyValue) -> bool {
        match (self, other) {
            (PyValue::List(a), PyValue::List(b)) | (PyValue::Set(a), PyValue::Set(b)) => {
                a.ptr_eq(b)
            }
            (PyValue::Dict(a), PyValue::Dict(b)) => a.ptr_eq(b),
            (PyValue::List(_) | PyValue::Set(_) | PyValue::Dict(_), _)
            | (_, PyValue::List(_) | PyValue::Set(_) | PyValue::Dict(_)) => false,
            (PyValue::None, PyValue::None) => true,
            (PyValue::Bool(a), PyValue::Bool(b)) => a == b,
            (PyValue::None | PyValue::Bool(_), _) | (_, PyValue::None | PyValue::Bool(_)) => false,
            _ => self == other,
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
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
            PyValue::Exception(exc) => &exc.kind,
            PyValue::Module(_) => "module",
            PyValue::Stream(_) => "TextIOWrapper",
            PyValue::Array(_) => "ndarray",
            PyValue::DataFrame(_) => "DataFrame",
            PyValue::Series(_) => "Series",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            PyValue::None => false,
            PyValue::Bool(b) => *b,
            PyValue::Int(i) => *i != 0,
            PyValue::Float(f) => *f != 0.0,
            PyValue::Str(s) => !s.is_empty(),
            PyValue::List(items) | PyValue::Set(items) => !items.borrow().is_empty(),
            PyValue::Tuple(items) => !items.is_empty(),
            PyValue::Dict(pairs) => !pairs.borrow().is_empty(),
            PyValue::Array(arr) => arr.size() > 0,
            PyValue::DataFrame(df) => df.rows() > 0,
            PyValue::Series(s) => !s.values.is_empty(),
            _ => true,
        }
    }

    /// Whether the value can be used as a dict key or set element.
    pub fn is_hashable(&self) -> bool {
        match self {
            PyValue::List(_)
            | PyValue::Dict(_)
            | PyValue::Set(_)
            | PyValue::Array(_)
            | PyValue::DataFrame(_)
            | PyValue::Series(_) => false,
            PyValue::Tuple(items) => items.iter().all(PyValue::is_hashable),
            _ => true,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PyValue::Int(i) => Some(*i),
            PyValue::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            PyValue::Float(f) => Some(*f),
            PyValue::Int(i) => Some(*i as f64),
            PyValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, PyValue::None)
    }

    /// The number of elements, for values that support `len()`.
    pub fn len(&self) -> Option<usize> {
        match self {
            PyValue::Str(s) => Some(s.chars().count()),
            PyValue::List(items) | PyValue::Set(items) => Some(items.borrow().len()),
            PyValue::Tuple(items) => Some(items.len()),
            PyValue::Dict(pairs) => Some(pairs.borrow().len()),
            PyValue::Array(arr) => Some(arr.shape().first().copied().unwrap_or(0)),
            PyValue::DataFrame(df) => Some(df.rows()),
            PyValue::Series(s) => Some(s.values.len()),
            _ => None,
        }
    }

    /// The `shape` attribute of array-like values.
    pub fn shape(&self) -> Option<Vec<usize>> {
        match self {
            PyValue::Array(arr) => Some(arr.shape().to_vec()),
            PyValue::DataFrame(df) => Some(vec![df.rows(), df.columns.len()]),
            PyValue::Series(s) => Some(vec![s.values.len()]),
            _ => None,
        }
    }

    /// Build a tuple value from a shape, the way `arr.shape` reads back.
    pub fn shape_tuple(shape: &[usize]) -> PyValue {
        PyValue::Tuple(shape.iter().map(|&n| PyValue::Int(n as i64)).collect())
    }

    /// Convert to string for `print()` / `str()`.
    pub fn to_print_string(&self) -> String {
        match self {
            PyValue::Str(s) => s.clone(),
            PyValue::Exception(exc) => exc.message.clone(),
            PyValue::Array(arr) => arr.to_str(),
            _ => self.to_string(),
        }
    }
}

/// Format a float the way Python's `repr` does.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let magnitude = f.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let formatted = format!("{:e}", f);
        return match formatted.split_once('e') {
            Some((mantissa, exp)) => {
                let (sign, digits) = match exp.strip_prefix('-') {
                    Some(digits) => ('-', digits),
                    None => ('+', exp),
                };
                format!("{}e{}{:0>2}", mantissa, sign, digits)
            }
            None => formatted,
        };
    }
    if f.fract() == 0.0 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

/// Quote a string the way Python's `repr` does.
pub fn repr_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

thread_local! {
    /// Containers whose repr is being written on this thread.
    static REPR_ACTIVE: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Run `write` unless the container at `addr` is already being written
/// further up, in which case `placeholder` stands in for it.
fn guarded(
    f: &mut fmt::Formatter<'_>,
    addr: usize,
    placeholder: &str,
    write: impl FnOnce(&mut fmt::Formatter<'_>) -> fmt::Result,
) -> fmt::Result {
    let entered = REPR_ACTIVE.with(|active| {
        let mut active = active.borrow_mut();
        if active.contains(&addr) {
            false
        } else {
            active.push(addr);
            true
        }
    });
    if !entered {
        return f.write_str(placeholder);
    }
    let result = write(f);
    REPR_ACTIVE.with(|active| active.borrow_mut().retain(|&a| a != addr));
    result
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[PyValue]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// `Display` renders the Python `repr` of a value.
impl fmt::Display for PyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PyValue::None => write!(f, "None"),
            PyValue::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            PyValue::Int(i) => write!(f, "{}", i),
            PyValue::Float(fl) => write!(f, "{}", format_float(*fl)),
            PyValue::Str(s) => write!(f, "{}", repr_str(s)),
            PyValue::List(items) => guarded(f, items.addr(), "[...]", |f| {
                write!(f, "[")?;
                write_items(f, &items.borrow())?;
                write!(f, "]")
            }),
            PyValue::Tuple(items) => {
                write!(f, "(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            PyValue::Dict(pairs) => guarded(f, pairs.addr(), "{...}", |f| {
                write!(f, "{{")?;
                for (i, (key, value)) in pairs.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }),
            PyValue::Set(items) => {
                let items = items.borrow();
                if items.is_empty() {
                    return write!(f, "set()");
                }
                write!(f, "{{")?;
                write_items(f, &items)?;
                write!(f, "}}")
            }
            PyValue::Function(func) => write!(f, "<function {}>", func.name),
            PyValue::Builtin(name) => write!(f, "<built-in function {}>", name),
            PyValue::NativeFunction(nf) => write!(f, "<built-in function {}>", nf.name),
            PyValue::Type(name) => write!(f, "<class '{}'>", name),
            PyValue::Exception(exc) => write!(f, "{}({})", exc.kind, repr_str(&exc.message)),
            PyValue::Module(module) => write!(f, "<module '{}' (built-in)>", module.name),
            PyValue::Stream(Stream::Stdout) => write!(f, "<_io.TextIOWrapper name='<stdout>'>"),
            PyValue::Stream(Stream::Stderr) => write!(f, "<_io.TextIOWrapper name='<stderr>'>"),
            PyValue::Array(arr) => write!(f, "{}", arr.to_repr()),
            PyValue::DataFrame(df) => write!(f, "{}", df),
            PyValue::Series(s) => write!(f, "{}", s),
        }
    }
}

/// Equality follows Python `==`: numbers compare across `bool`, `int` and
/// `float`; dicts and sets ignore order; functions compare by identity.
/// A container always equals itself.
impl PartialEq for PyValue {
    fn eq(&self, other: &Self) -> bool {
        use PyValue::*;
        match (self, other) {
            (None, None) => true,
            (Bool(_) | Int(_), Bool(_) | Int(_)) => self.as_int() == other.as_int(),
            (Bool(_) | Int(_) | Float(_), Bool(_) | Int(_) | Float(_)) => {
                self.as_float() == other.as_float()
            }
            (Str(a), Str(b)) => a == b,
            (Tuple(a), Tuple(b)) => a == b,
            (List(a), List(b)) => a.ptr_eq(b) || *a.borrow() == *b.borrow(),
            (Dict(a), Dict(b)) => {
                if a.ptr_eq(b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.iter().any(|(k2, v2)| k == k2 && v == v2))
            }
            (Set(a), Set(b)) => {
                if a.ptr_eq(b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().all(|item| b.contains(item))
            }
            (Function(a), Function(b)) => Rc::ptr_eq(a, b),
            (Builtin(a), Builtin(b)) | (Type(a), Type(b)) => a == b,
            (NativeFunction(a), NativeFunction(b)) => {
                a.name == b.name && Arc::ptr_eq(&a.func, &b.func)
            }
            (Exception(a), Exception(b)) => a.kind == b.kind && a.message == b.message,
            (Module(a), Module(b)) => a.name == b.name,
            (Stream(a), Stream(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (DataFrame(a), DataFrame(b)) => a == b,
            (Series(a), Series(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for PyValue {
    fn from(b: bool) -> Self {
        PyValue::Bool(b)
    }
}

impl From<i64> for PyValue {
    fn from(i: i64) -> Self {
        PyValue::Int(i)
    }
}

impl From<i32> for PyValue {
    fn from(i: i32) -> Self {
        PyValue::Int(i as i64)
    }
}

impl From<usize> for PyValue {
    fn from(i: usize) -> Self {
        PyValue::Int(i as i64)
    }
}

impl From<f64> for PyValue {
    fn from(f: f64) -> Self {
        PyValue::Float(f)
    }
}

impl From<String> for PyValue {
    fn from(s: String) -> Self {
        PyValue::Str(s)
    }
}

impl From<&str> for PyValue {
    fn from(s: &str) -> Self {
        PyValue::Str(s.to_string())
    }
}

impl<T: Into<PyValue>> From<Vec<T>> for PyValue {
    fn from(v: Vec<T>) -> Self {
        PyValue::list(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<PyValue>> From<Option<T>> for PyValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(PyValue::None, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_float_repr() {
        assert_eq!(format_float(2.5), "2.5");
        assert_eq!(format_float(3.0), "3.0");
        assert_eq!(format_float(-0.5), "-0.5");
        assert_eq!(format_float(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_float(1e20), "1e+20");
        assert_eq!(format_float(1.5e-5), "1.5e-05");
        assert_eq!(format_float(f64::INFINITY), "inf");
    }

    #[test]
    fn test_str_repr_quotes() {
        assert_eq!(repr_str("hi"), "'hi'");
        assert_eq!(repr_str("it's"), "\"it's\"");
        assert_eq!(repr_str("a\nb"), "'a\\nb'");
        assert_eq!(repr_str("'\""), "'\\'\"'");
    }

    #[test]
    fn test_container_repr() {
        let value = PyValue::dict(vec![
            (PyValue::from("a"), PyValue::list(vec![PyValue::Int(1), PyValue::Float(2.0)])),
            (PyValue::Int(3), PyValue::Tuple(vec![PyValue::None])),
        ]);
        assert_eq!(value.to_string(), "{'a': [1, 2.0], 3: (None,)}");
        assert_eq!(PyValue::set(vec![]).to_string(), "set()");
        assert_eq!(PyValue::Type("int").to_string(), "<class 'int'>");
    }

    #[test]
    fn test_numeric_equality_crosses_types() {
        assert_eq!(PyValue::Int(1), PyValue::Float(1.0));
        assert_eq!(PyValue::Bool(true), PyValue::Int(1));
        assert_ne!(PyValue::Int(1), PyValue::from("1"));
        assert_eq!(
            PyValue::set(vec![PyValue::Int(1), PyValue::Int(2)]),
            PyValue::set(vec![PyValue::Int(2), PyValue::Int(1)])
        );
    }

    #[test]
    fn test_clones_share_containers() {
        let first = PyValue::from(vec![1, 2]);
        let alias = first.clone();
        if let PyValue::List(items) = &alias {
            items.borrow_mut().push(PyValue::Int(3));
        }
        assert_eq!(first.to_string(), "[1, 2, 3]");
        assert!(first.is_same(&alias));
        assert!(!first.is_same(&PyValue::from(vec![1, 2, 3])));
        assert_eq!(first, PyValue::from(vec![1, 2, 3]));
    }

    #[test]
    fn test_self_referencing_repr() {
        let items = Shared::new(vec![PyValue::Int(1)]);
        let list = PyValue::List(items.clone());
        items.borrow_mut().push(list.clone());
        assert_eq!(list.to_string(), "[1, [...]]");

        let pairs = Shared::new(Vec::new());
        let dict = PyValue::Dict(pairs.clone());
        pairs.borrow_mut().push((PyValue::from("me"), dict.clone()));
        assert_eq!(dict.to_string(), "{'me': {...}}");
    }

    #[test]
    fn test_print_string() {
        assert_eq!(PyValue::from("plain").to_print_string(), "plain");
        assert_eq!(
            PyValue::list(vec![PyValue::from("x")]).to_print_string(),
            "['x']"
        );
    }
}
