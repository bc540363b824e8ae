//! Numerical and tabular kernels behind the `numpy` and `pandas` modules.
//!
//! `NdArray` holds up to two dimensions of numbers in row-major order.
//! `DataFrame` is a set of named columns sharing one row index, and
//! `Series` is a single labelled column.

use std::fmt;

use crate::error::{Error, Result};
use crate::value::{PyValue, format_float};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    Int,
    Float,
}

impl DType {
    pub fn name(&self) -> &'static str {
        match self {
            DType::Int => "int64",
            DType::Float => "float64",
        }
    }
}

/// Element-wise arithmetic supported between arrays and scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl ArithOp {
    fn apply(&self, a: f64, b: f64) -> f64 {
        match self {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div => a / b,
            ArithOp::Pow => a.powf(b),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    shape: Vec<usize>,
    data: Vec<f64>,
    dtype: DType,
}

impl NdArray {
    pub fn new(shape: Vec<usize>, data: Vec<f64>, dtype: DType) -> Self {
        Self { shape, data, dtype }
    }

    /// Build an array from a list, nested list, tuple, series or array.
    pub fn from_value(value: &PyValue) -> Result<Self> {
        match value {
            PyValue::Array(arr) => Ok(arr.clone()),
            PyValue::Series(series) => Self::from_flat(&series.values),
            PyValue::List(_) | PyValue::Tuple(_) => {
                let items = value.sequence_items().unwrap_or_default();
                let nested = items.iter().any(|item| {
                    matches!(item, PyValue::List(_) | PyValue::Tuple(_) | PyValue::Array(_))
                });
                if !nested {
                    return Self::from_flat(&items);
                }
                let mut rows = Vec::with_capacity(items.len());
                for item in &items {
                    let row = match item {
                        PyValue::List(_) | PyValue::Tuple(_) => {
                            item.sequence_items().unwrap_or_default()
                        }
                        PyValue::Array(arr) if arr.ndim() == 1 => arr.to_values(),
                        PyValue::Array(_) => {
                            return Err(Error::Unsupported(
                                "an array with more than 2 dimensions".to_string(),
                            ));
                        }
                        _ => return Err(inhomogeneous()),
                    };
                    rows.push(row);
                }
                let width = rows.first().map_or(0, Vec::len);
                if rows.iter().any(|row| row.len() != width) {
                    return Err(inhomogeneous());
                }
                let flat: Vec<PyValue> = rows.into_iter().flatten().collect();
                if flat
                    .iter()
                    .any(|v| matches!(v, PyValue::List(_) | PyValue::Tuple(_)))
                {
                    return Err(Error::Unsupported(
                        "an array with more than 2 dimensions".to_string(),
                    ));
                }
                let mut arr = Self::from_flat(&flat)?;
                arr.shape = vec![items.len(), width];
                Ok(arr)
            }
            PyValue::Int(_) | PyValue::Float(_) | PyValue::Bool(_) => {
                Err(Error::Unsupported("a 0-dimensional array".to_string()))
            }
            other => Err(Error::type_error("array-like", other.type_name())),
        }
    }

    fn from_flat(items: &[PyValue]) -> Result<Self> {
        let mut dtype = DType::Int;
        let mut data = Vec::with_capacity(items.len());
        for item in items {
            match item {
                PyValue::Int(_) | PyValue::Bool(_) => {}
                PyValue::Float(_) => dtype = DType::Float,
                _ => return Err(Error::Unsupported("a non-numeric array".to_string())),
            }
            data.push(item.as_float().unwrap_or(f64::NAN));
        }
        Ok(Self::new(vec![items.len()], data, dtype))
    }

    pub fn filled(shape: Vec<usize>, value: f64) -> Self {
        let size = shape.iter().product();
        Self::new(shape, vec![value; size], DType::Float)
    }

    pub fn arange(start: f64, stop: f64, step: f64, dtype: DType) -> Result<Self> {
        if step == 0.0 {
            return Err(Error::raise("ZeroDivisionError", "division by zero"));
        }
        let count = ((stop - start) / step).ceil().max(0.0) as usize;
        let data: Vec<f64> = (0..count).map(|i| start + step * i as f64).collect();
        Ok(Self::new(vec![count], data, dtype))
    }

    pub fn linspace(start: f64, stop: f64, num: usize) -> Self {
        let data = match num {
            0 => Vec::new(),
            1 => vec![start],
            n => {
                let step = (stop - start) / (n - 1) as f64;
                (0..n)
                    .map(|i| if i == n - 1 { stop } else { start + step * i as f64 })
                    .collect()
            }
        };
        Self::new(vec![num], data, DType::Float)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Convert the element type, truncating toward zero for `int`.
    pub fn astype(&self, dtype: DType) -> Self {
        let data = match dtype {
            DType::Int => self.data.iter().map(|v| v.trunc()).collect(),
            DType::Float => self.data.clone(),
        };
        Self::new(self.shape.clone(), data, dtype)
    }

    fn scalar(&self, v: f64) -> PyValue {
        match self.dtype {
            DType::Int => PyValue::Int(v as i64),
            DType::Float => PyValue::Float(v),
        }
    }

    /// The elements as a flat list of scalars.
    pub fn to_values(&self) -> Vec<PyValue> {
        self.data.iter().map(|&v| self.scalar(v)).collect()
    }

    pub fn tolist(&self) -> PyValue {
        match self.shape.as_slice() {
            [_, cols] if *cols > 0 => PyValue::list(
                self.data
                    .chunks(*cols)
                    .map(|row| PyValue::list(row.iter().map(|&v| self.scalar(v)).collect()))
                    .collect(),
            ),
            [rows, _] => PyValue::list((0..*rows).map(|_| PyValue::list(vec![])).collect()),
            _ => PyValue::list(self.to_values()),
        }
    }

    /// Items produced when iterating: scalars for 1-D, row arrays for 2-D.
    pub fn iter_items(&self) -> Vec<PyValue> {
        match self.shape.as_slice() {
            [rows, cols] => (0..*rows)
                .map(|r| {
                    PyValue::Array(Self::new(
                        vec![*cols],
                        self.data[r * cols..(r + 1) * cols].to_vec(),
                        self.dtype,
                    ))
                })
                .collect(),
            _ => self.to_values(),
        }
    }

    /// Index along the first axis.
    pub fn index(&self, index: i64) -> Result<PyValue> {
        let len = self.shape.first().copied().unwrap_or(0);
        let i = normalize_index(index, len).ok_or_else(|| {
            Error::raise(
                "IndexError",
                format!(
                    "index {} is out of bounds for axis 0 with size {}",
                    index, len
                ),
            )
        })?;
        let mut items = self.iter_items();
        Ok(items.swap_remove(i))
    }

    /// `arr[i, j]` on a 2-D array.
    pub fn index2(&self, row: i64, col: i64) -> Result<PyValue> {
        let [rows, cols] = self.shape.as_slice() else {
            return Err(Error::raise(
                "IndexError",
                format!(
                    "too many indices for array: array is {}-dimensional, but 2 were indexed",
                    self.ndim()
                ),
            ));
        };
        let r = normalize_index(row, *rows).ok_or_else(|| {
            Error::raise(
                "IndexError",
                format!("index {} is out of bounds for axis 0 with size {}", row, rows),
            )
        })?;
        let c = normalize_index(col, *cols).ok_or_else(|| {
            Error::raise(
                "IndexError",
                format!("index {} is out of bounds for axis 1 with size {}", col, cols),
            )
        })?;
        Ok(self.scalar(self.data[r * cols + c]))
    }

    pub fn sum(&self) -> PyValue {
        self.scalar(self.data.iter().sum())
    }

    pub fn mean(&self) -> PyValue {
        if self.data.is_empty() {
            return PyValue::Float(f64::NAN);
        }
        PyValue::Float(self.data.iter().sum::<f64>() / self.data.len() as f64)
    }

    pub fn min(&self) -> Result<PyValue> {
        self.reduce("minimum", f64::min)
    }

    pub fn max(&self) -> Result<PyValue> {
        self.reduce("maximum", f64::max)
    }

    fn reduce(&self, name: &str, f: fn(f64, f64) -> f64) -> Result<PyValue> {
        let mut iter = self.data.iter().copied();
        let first = iter.next().ok_or_else(|| {
            Error::raise(
                "ValueError",
                format!(
                    "zero-size array to reduction operation {} which has no identity",
                    name
                ),
            )
        })?;
        Ok(self.scalar(iter.fold(first, f)))
    }

    /// Population standard deviation.
    pub fn std(&self) -> PyValue {
        PyValue::Float(population_std(&self.data))
    }

    /// Reshape, allowing one dimension to be `-1`.
    pub fn reshape(&self, dims: &[i64]) -> Result<Self> {
        let size = self.size();
        let known: i64 = dims.iter().filter(|&&d| d != -1).product();
        let mut shape = Vec::with_capacity(dims.len());
        for &d in dims {
            if d == -1 {
                if known == 0 || size as i64 % known != 0 {
                    return Err(reshape_error(size, dims));
                }
                shape.push((size as i64 / known) as usize);
            } else if d < 0 {
                return Err(reshape_error(size, dims));
            } else {
                shape.push(d as usize);
            }
        }
        if shape.len() > 2 {
            return Err(Error::Unsupported(
                "an array with more than 2 dimensions".to_string(),
            ));
        }
        if shape.iter().product::<usize>() != size {
            return Err(reshape_error(size, dims));
        }
        Ok(Self::new(shape, self.data.clone(), self.dtype))
    }

    pub fn transpose(&self) -> Self {
        match self.shape.as_slice() {
            [rows, cols] => {
                let mut data = Vec::with_capacity(self.data.len());
                for c in 0..*cols {
                    for r in 0..*rows {
                        data.push(self.data[r * cols + c]);
                    }
                }
                Self::new(vec![*cols, *rows], data, self.dtype)
            }
            _ => self.clone(),
        }
    }

    /// Apply a float function to every element.
    pub fn map(&self, f: fn(f64) -> f64) -> Self {
        Self::new(
            self.shape.clone(),
            self.data.iter().map(|&v| f(v)).collect(),
            DType::Float,
        )
    }

    fn combine(&self, other: &Self, op: ArithOp, result: DType) -> Result<Self> {
        if self.shape != other.shape {
            return Err(Error::raise(
                "ValueError",
                format!(
                    "operands could not be broadcast together with shapes {} {}",
                    shape_str(&self.shape),
                    shape_str(&other.shape)
                ),
            ));
        }
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(&a, &b)| op.apply(a, b))
            .collect();
        Ok(Self::new(self.shape.clone(), data, result))
    }

    /// numpy's `str()` rendering: `[1 2 3]`, `[[1. 2.]\n [3. 4.]]`.
    pub fn to_str(&self) -> String {
        self.render(" ", "\n ")
    }

    /// numpy's `repr()` rendering: `array([1, 2, 3])`.
    pub fn to_repr(&self) -> String {
        format!("array({})", self.render(", ", ",\n       "))
    }

    fn render(&self, sep: &str, row_sep: &str) -> String {
        let cells = format_cells(&self.data, self.dtype);
        match self.shape.as_slice() {
            [_, cols] if *cols > 0 => {
                let rows: Vec<String> = cells
                    .chunks(*cols)
                    .map(|row| format!("[{}]", row.join(sep)))
                    .collect();
                format!("[{}]", rows.join(row_sep))
            }
            _ => format!("[{}]", cells.join(sep)),
        }
    }
}

/// Element-wise arithmetic where at least one side is an array.
pub fn elementwise(op: ArithOp, left: &PyValue, right: &PyValue) -> Result<PyValue> {
    let (l_arr, r_arr) = (array_operand(left)?, array_operand(right)?);
    let result_dtype = |a: DType, b: DType| match op {
        ArithOp::Div => DType::Float,
        _ if a == DType::Int && b == DType::Int => DType::Int,
        _ => DType::Float,
    };
    let arr = match (l_arr, r_arr) {
        (Operand::Array(a), Operand::Array(b)) => {
            let dtype = result_dtype(a.dtype, b.dtype);
            a.combine(&b, op, dtype)?
        }
        (Operand::Array(a), Operand::Scalar(s, sd)) => {
            let dtype = result_dtype(a.dtype, sd);
            NdArray::new(
                a.shape.clone(),
                a.data.iter().map(|&v| op.apply(v, s)).collect(),
                dtype,
            )
        }
        (Operand::Scalar(s, sd), Operand::Array(b)) => {
            let dtype = result_dtype(sd, b.dtype);
            NdArray::new(
                b.shape.clone(),
                b.data.iter().map(|&v| op.apply(s, v)).collect(),
                dtype,
            )
        }
        (Operand::Scalar(..), Operand::Scalar(..)) => {
            return Err(Error::Runtime("elementwise needs an array operand".to_string()));
        }
    };
    Ok(PyValue::Array(arr))
}

enum Operand {
    Array(NdArray),
    Scalar(f64, DType),
}

fn array_operand(value: &PyValue) -> Result<Operand> {
    match value {
        PyValue::Int(i) => Ok(Operand::Scalar(*i as f64, DType::Int)),
        PyValue::Bool(b) => Ok(Operand::Scalar(if *b { 1.0 } else { 0.0 }, DType::Int)),
        PyValue::Float(f) => Ok(Operand::Scalar(*f, DType::Float)),
        PyValue::Array(_) | PyValue::List(_) | PyValue::Tuple(_) => {
            Ok(Operand::Array(NdArray::from_value(value)?))
        }
        other => Err(Error::raise(
            "TypeError",
            format!(
                "unsupported operand type(s) for array arithmetic: '{}'",
                other.type_name()
            ),
        )),
    }
}

fn inhomogeneous() -> Error {
    Error::raise(
        "ValueError",
        "setting an array element with a sequence. The requested array has an inhomogeneous shape",
    )
}

fn reshape_error(size: usize, dims: &[i64]) -> Error {
    let dims: Vec<String> = dims.iter().map(i64::to_string).collect();
    let shape = if dims.len() == 1 {
        format!("({},)", dims[0])
    } else {
        format!("({})", dims.join(", "))
    };
    Error::raise(
        "ValueError",
        format!("cannot reshape array of size {} into shape {}", size, shape),
    )
}

/// Render a shape as a Python tuple: `(3,)`, `(2, 3)`.
pub fn shape_str(shape: &[usize]) -> String {
    PyValue::shape_tuple(shape).to_string()
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let i = if index < 0 { len + index } else { index };
    (0..len).contains(&i).then_some(i as usize)
}

fn population_std(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;
    (data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// Format numbers aligned the way numpy prints them.
fn format_cells(data: &[f64], dtype: DType) -> Vec<String> {
    match dtype {
        DType::Int => {
            let cells: Vec<String> = data.iter().map(|v| (*v as i64).to_string()).collect();
            let width = cells.iter().map(String::len).max().unwrap_or(0);
            cells.iter().map(|c| format!("{:>width$}", c)).collect()
        }
        DType::Float => {
            let parts: Vec<(String, Option<String>)> = data
                .iter()
                .map(|&v| {
                    let repr = format_float(v);
                    match repr.split_once('.') {
                        Some((int, frac)) => {
                            (int.to_string(), Some(frac.trim_end_matches('0').to_string()))
                        }
                        None => (repr, None),
                    }
                })
                .collect();
            let int_w = parts.iter().map(|(i, _)| i.len()).max().unwrap_or(0);
            let frac_w = parts
                .iter()
                .filter_map(|(_, f)| f.as_ref().map(String::len))
                .max()
                .unwrap_or(0);
            parts
                .into_iter()
                .map(|(int, frac)| match frac {
                    Some(frac) => format!("{:>int_w$}.{:<frac_w$}", int, frac),
                    None => format!("{:>w$}", int, w = int_w + 1 + frac_w),
                })
                .collect()
        }
    }
}

fn numbers(values: &[PyValue]) -> Result<Vec<f64>> {
    values
        .iter()
        .map(|v| {
            v.as_float().ok_or_else(|| {
                Error::raise(
                    "TypeError",
                    format!("unsupported operand type for numeric reduction: '{}'", v.type_name()),
                )
            })
        })
        .collect()
}

fn is_numeric_column(values: &[PyValue]) -> bool {
    !values.is_empty()
        && values
            .iter()
            .all(|v| matches!(v, PyValue::Int(_) | PyValue::Float(_) | PyValue::Bool(_)))
}

fn cell_text(value: &PyValue) -> String {
    match value {
        PyValue::Float(f) if f.is_nan() => "NaN".to_string(),
        other => other.to_print_string(),
    }
}

fn dtype_name(values: &[PyValue]) -> &'static str {
    if values.iter().all(|v| matches!(v, PyValue::Bool(_))) && !values.is_empty() {
        "bool"
    } else if values
        .iter()
        .all(|v| matches!(v, PyValue::Int(_) | PyValue::Bool(_)))
    {
        "int64"
    } else if is_numeric_column(values) {
        "float64"
    } else {
        "object"
    }
}

fn default_index(len: usize) -> Vec<String> {
    (0..len).map(|i| i.to_string()).collect()
}

/// A labelled one-dimensional column.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: Option<String>,
    pub values: Vec<PyValue>,
    pub index: Vec<String>,
}

impl Series {
    pub fn new(name: Option<String>, values: Vec<PyValue>) -> Self {
        let index = default_index(values.len());
        Self {
            name,
            values,
            index,
        }
    }

    pub fn from_value(value: &PyValue, name: Option<String>) -> Result<Self> {
        match value {
            PyValue::List(_) | PyValue::Tuple(_) => {
                Ok(Self::new(name, value.sequence_items().unwrap_or_default()))
            }
            PyValue::Array(arr) if arr.ndim() == 1 => Ok(Self::new(name, arr.to_values())),
            PyValue::Series(series) => {
                let mut series = series.clone();
                if name.is_some() {
                    series.name = name;
                }
                Ok(series)
            }
            PyValue::Dict(pairs) => {
                let pairs = pairs.borrow();
                Ok(Self {
                    name,
                    values: pairs.iter().map(|(_, v)| v.clone()).collect(),
                    index: pairs.iter().map(|(k, _)| k.to_print_string()).collect(),
                })
            }
            other => Err(Error::type_error("list-like", other.type_name())),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Label-based lookup, as `s[label]` does.
    pub fn get(&self, key: &PyValue) -> Result<PyValue> {
        let label = key.to_print_string();
        self.index
            .iter()
            .position(|l| *l == label)
            .map(|i| self.values[i].clone())
            .ok_or_else(|| Error::raise("KeyError", key.to_string()))
    }

    pub fn sum(&self) -> Result<PyValue> {
        if self.values.iter().all(|v| matches!(v, PyValue::Int(_) | PyValue::Bool(_))) {
            let total = self.values.iter().filter_map(PyValue::as_int).sum::<i64>();
            return Ok(PyValue::Int(total));
        }
        Ok(PyValue::Float(numbers(&self.values)?.iter().sum()))
    }

    pub fn mean(&self) -> Result<PyValue> {
        let data = numbers(&self.values)?;
        if data.is_empty() {
            return Ok(PyValue::Float(f64::NAN));
        }
        Ok(PyValue::Float(data.iter().sum::<f64>() / data.len() as f64))
    }

    /// Sample standard deviation, pandas' default.
    pub fn std(&self) -> Result<PyValue> {
        let data = numbers(&self.values)?;
        if data.len() < 2 {
            return Ok(PyValue::Float(f64::NAN));
        }
        let n = data.len() as f64;
        let mean = data.iter().sum::<f64>() / n;
        let var = data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        Ok(PyValue::Float(var.sqrt()))
    }

    pub fn min(&self) -> Result<PyValue> {
        self.extreme(|a, b| a < b)
    }

    pub fn max(&self) -> Result<PyValue> {
        self.extreme(|a, b| a > b)
    }

    fn extreme(&self, better: fn(f64, f64) -> bool) -> Result<PyValue> {
        let data = numbers(&self.values)?;
        let mut best: Option<usize> = None;
        for (i, v) in data.iter().enumerate() {
            if v.is_nan() {
                continue;
            }
            if best.is_none_or(|b| better(*v, data[b])) {
                best = Some(i);
            }
        }
        Ok(best.map_or(PyValue::Float(f64::NAN), |i| self.values[i].clone()))
    }

    pub fn head(&self, n: usize) -> Self {
        let n = n.min(self.values.len());
        Self {
            name: self.name.clone(),
            values: self.values[..n].to_vec(),
            index: self.index[..n].to_vec(),
        }
    }

    pub fn tail(&self, n: usize) -> Self {
        let start = self.values.len().saturating_sub(n);
        Self {
            name: self.name.clone(),
            values: self.values[start..].to_vec(),
            index: self.index[start..].to_vec(),
        }
    }

    pub fn tolist(&self) -> PyValue {
        PyValue::list(self.values.clone())
    }

    /// Combine with a scalar or an equal-length series using `f`.
    pub fn zip_with(
        &self,
        other: &PyValue,
        reversed: bool,
        f: impl Fn(&PyValue, &PyValue) -> Result<PyValue>,
    ) -> Result<Self> {
        let values = match other {
            PyValue::Series(rhs) => {
                if rhs.len() != self.len() {
                    return Err(Error::raise(
                        "ValueError",
                        "Can only compare identically-labeled Series objects",
                    ));
                }
                self.values
                    .iter()
                    .zip(&rhs.values)
                    .map(|(a, b)| f(a, b))
                    .collect::<Result<Vec<_>>>()?
            }
            scalar => self
                .values
                .iter()
                .map(|v| if reversed { f(scalar, v) } else { f(v, scalar) })
                .collect::<Result<Vec<_>>>()?,
        };
        Ok(Self {
            name: self.name.clone(),
            values,
            index: self.index.clone(),
        })
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<String> = self.values.iter().map(cell_text).collect();
        let index_w = self.index.iter().map(String::len).max().unwrap_or(0);
        let value_w = cells.iter().map(String::len).max().unwrap_or(0);
        for (label, cell) in self.index.iter().zip(&cells) {
            writeln!(f, "{:<index_w$}    {:>value_w$}", label, cell)?;
        }
        match &self.name {
            Some(name) => write!(f, "Name: {}, dtype: {}", name, dtype_name(&self.values)),
            None => write!(f, "dtype: {}", dtype_name(&self.values)),
        }
    }
}

/// Named columns of equal length sharing a row index.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    pub columns: Vec<String>,
    /// Column-major cell storage, one vector per column.
    pub data: Vec<Vec<PyValue>>,
    pub index: Vec<String>,
}

impl DataFrame {
    /// Build a frame from a dict of columns or a list of row dicts.
    pub fn from_value(value: &PyValue) -> Result<Self> {
        match value {
            PyValue::Dict(pairs) => Self::from_columns(&pairs.borrow()),
            PyValue::List(rows) => Self::from_records(&rows.borrow()),
            PyValue::None => Ok(Self {
                columns: vec![],
                data: vec![],
                index: vec![],
            }),
            other => Err(Error::type_error("dict or list of dicts", other.type_name())),
        }
    }

    fn from_columns(pairs: &[(PyValue, PyValue)]) -> Result<Self> {
        let mut columns = Vec::with_capacity(pairs.len());
        let mut data: Vec<Option<Vec<PyValue>>> = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            columns.push(key.to_print_string());
            data.push(match value {
                PyValue::List(_) | PyValue::Tuple(_) => value.sequence_items(),
                PyValue::Array(arr) if arr.ndim() == 1 => Some(arr.to_values()),
                PyValue::Series(series) => Some(series.values.clone()),
                _ => None,
            });
        }
        let rows = match data.iter().flatten().map(Vec::len).next() {
            Some(rows) => rows,
            None if pairs.is_empty() => 0,
            None => {
                return Err(Error::raise(
                    "ValueError",
                    "If using all scalar values, you must pass an index",
                ));
            }
        };
        let mut filled = Vec::with_capacity(data.len());
        for (column, (_, value)) in data.into_iter().zip(pairs) {
            let column = column.unwrap_or_else(|| vec![value.clone(); rows]);
            if column.len() != rows {
                return Err(Error::raise(
                    "ValueError",
                    "All arrays must be of the same length",
                ));
            }
            filled.push(column);
        }
        Ok(Self {
            columns,
            data: filled,
            index: default_index(rows),
        })
    }

    fn from_records(rows: &[PyValue]) -> Result<Self> {
        let mut columns: Vec<String> = Vec::new();
        for row in rows {
            let PyValue::Dict(pairs) = row else {
                return Err(Error::type_error("dict", row.type_name()));
            };
            for (key, _) in pairs.borrow().iter() {
                let name = key.to_print_string();
                if !columns.contains(&name) {
                    columns.push(name);
                }
            }
        }
        let mut data = vec![Vec::with_capacity(rows.len()); columns.len()];
        for row in rows {
            if let PyValue::Dict(pairs) = row {
                for (c, name) in columns.iter().enumerate() {
                    let cell = pairs
                        .borrow()
                        .iter()
                        .find(|(k, _)| k.to_print_string() == *name)
                        .map_or(PyValue::Float(f64::NAN), |(_, v)| v.clone());
                    data[c].push(cell);
                }
            }
        }
        Ok(Self {
            columns,
            data,
            index: default_index(rows.len()),
        })
    }

    pub fn rows(&self) -> usize {
        self.index.len()
    }

    pub fn column(&self, name: &str) -> Result<Series> {
        let c = self
            .columns
            .iter()
            .position(|col| col == name)
            .ok_or_else(|| Error::raise("KeyError", crate::value::repr_str(name)))?;
        Ok(Series {
            name: Some(name.to_string()),
            values: self.data[c].clone(),
            index: self.index.clone(),
        })
    }

    /// `df[name] = values`, replacing or appending a column.
    pub fn set_column(&mut self, name: &str, value: &PyValue) -> Result<()> {
        let rows = self.rows();
        let column = match value {
            PyValue::List(_) | PyValue::Tuple(_) => value.sequence_items().unwrap_or_default(),
            PyValue::Array(arr) if arr.ndim() == 1 => arr.to_values(),
            PyValue::Series(series) => series.values.clone(),
            scalar => vec![scalar.clone(); rows],
        };
        if column.len() != rows && !(self.columns.is_empty() && rows == 0) {
            return Err(Error::raise(
                "ValueError",
                format!(
                    "Length of values ({}) does not match length of index ({})",
                    column.len(),
                    rows
                ),
            ));
        }
        if self.columns.is_empty() {
            self.index = default_index(column.len());
        }
        match self.columns.iter().position(|col| col == name) {
            Some(c) => self.data[c] = column,
            None => {
                self.columns.push(name.to_string());
                self.data.push(column);
            }
        }
        Ok(())
    }

    fn slice_rows(&self, start: usize, end: usize) -> Self {
        Self {
            columns: self.columns.clone(),
            data: self.data.iter().map(|col| col[start..end].to_vec()).collect(),
            index: self.index[start..end].to_vec(),
        }
    }

    pub fn head(&self, n: usize) -> Self {
        self.slice_rows(0, n.min(self.rows()))
    }

    pub fn tail(&self, n: usize) -> Self {
        self.slice_rows(self.rows().saturating_sub(n), self.rows())
    }

    /// Summary statistics (count / mean / min / max) of the numeric columns.
    pub fn describe(&self) -> Result<Self> {
        let mut columns = Vec::new();
        let mut data = Vec::new();
        for (name, values) in self.columns.iter().zip(&self.data) {
            if !is_numeric_column(values) {
                continue;
            }
            let nums: Vec<f64> = numbers(values)?.into_iter().filter(|v| !v.is_nan()).collect();
            let count = nums.len() as f64;
            let mean = if nums.is_empty() {
                f64::NAN
            } else {
                nums.iter().sum::<f64>() / count
            };
            let min = nums.iter().copied().fold(f64::NAN, f64::min);
            let max = nums.iter().copied().fold(f64::NAN, f64::max);
            columns.push(name.clone());
            data.push(
                [count, mean, min, max]
                    .into_iter()
                    .map(PyValue::Float)
                    .collect(),
            );
        }
        Ok(Self {
            columns,
            data,
            index: ["count", "mean", "min", "max"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        })
    }
}

impl fmt::Display for DataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.columns.is_empty() {
            return write!(f, "Empty DataFrame\nColumns: []\nIndex: []");
        }
        let cells: Vec<Vec<String>> = self
            .data
            .iter()
            .map(|col| col.iter().map(cell_text).collect())
            .collect();
        let widths: Vec<usize> = self
            .columns
            .iter()
            .zip(&cells)
            .map(|(name, col)| col.iter().map(String::len).chain([name.len()]).max().unwrap_or(0))
            .collect();
        let index_w = self.index.iter().map(String::len).max().unwrap_or(0);

        write!(f, "{:index_w$}", "")?;
        for (name, width) in self.columns.iter().zip(widths.iter().copied()) {
            write!(f, "  {:>width$}", name)?;
        }
        for (r, label) in self.index.iter().enumerate() {
            write!(f, "\n{:<index_w$}", label)?;
            for (col, width) in cells.iter().zip(widths.iter().copied()) {
                write!(f, "  {:>width$}", col[r])?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ints(values: &[i64]) -> PyValue {
        PyValue::list(values.iter().map(|&v| PyValue::Int(v)).collect())
    }

    #[test]
    fn test_array_from_nested_list() {
        let arr = NdArray::from_value(&PyValue::list(vec![ints(&[1, 2, 3]), ints(&[4, 5, 6])]))
            .unwrap();
        assert_eq!(arr.shape(), &[2, 3]);
        assert_eq!(arr.sum(), PyValue::Int(21));
        assert_eq!(arr.to_str(), "[[1 2 3]\n [4 5 6]]");
        assert_eq!(arr.transpose().shape(), &[3, 2]);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = NdArray::from_value(&PyValue::list(vec![ints(&[1, 2]), ints(&[3])])).unwrap_err();
        assert_eq!(err.category(), "ValueError");
    }

    #[test]
    fn test_float_formatting_aligns_points() {
        let arr = NdArray::from_value(&PyValue::list(vec![
            PyValue::Float(1.0),
            PyValue::Float(2.5),
            PyValue::Float(3.0),
        ]))
        .unwrap();
        assert_eq!(arr.to_str(), "[1.  2.5 3. ]");
        assert_eq!(arr.to_repr(), "array([1. , 2.5, 3. ])");
        assert_eq!(NdArray::filled(vec![3], 0.0).to_str(), "[0. 0. 0.]");
    }

    #[test]
    fn test_reshape() {
        let arr = NdArray::arange(0.0, 6.0, 1.0, DType::Int).unwrap();
        assert_eq!(arr.reshape(&[2, -1]).unwrap().shape(), &[2, 3]);
        let err = arr.reshape(&[4]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ValueError: cannot reshape array of size 6 into shape (4,)"
        );
    }

    #[test]
    fn test_elementwise_broadcasts_scalars() {
        let arr = PyValue::Array(NdArray::from_value(&ints(&[1, 2, 3])).unwrap());
        let doubled = elementwise(ArithOp::Mul, &arr, &PyValue::Int(2)).unwrap();
        assert_eq!(doubled.to_print_string(), "[2 4 6]");
        let halves = elementwise(ArithOp::Div, &arr, &PyValue::Int(2)).unwrap();
        assert_eq!(halves.to_print_string(), "[0.5 1.  1.5]");
        let err = elementwise(ArithOp::Add, &arr, &ints(&[1, 2])).unwrap_err();
        assert_eq!(err.category(), "ValueError");
    }

    #[test]
    fn test_linspace_endpoints() {
        let arr = NdArray::linspace(0.0, 1.0, 5);
        assert_eq!(arr.to_str(), "[0.   0.25 0.5  0.75 1.  ]");
    }

    #[test]
    fn test_dataframe_shape_and_describe() {
        let df = DataFrame::from_value(&PyValue::dict(vec![
            (PyValue::from("a"), ints(&[1, 2, 3])),
            (PyValue::from("b"), PyValue::list(vec!["x".into(), "y".into(), "z".into()])),
        ]))
        .unwrap();
        assert_eq!(df.rows(), 3);
        assert_eq!(df.columns, vec!["a", "b"]);
        assert_eq!(df.to_string(), "   a  b\n0  1  x\n1  2  y\n2  3  z");

        let summary = df.describe().unwrap();
        assert_eq!(summary.columns, vec!["a"]);
        assert_eq!(
            summary.column("a").unwrap().values,
            vec![
                PyValue::Float(3.0),
                PyValue::Float(2.0),
                PyValue::Float(1.0),
                PyValue::Float(3.0)
            ]
        );
    }

    #[test]
    fn test_dataframe_column_length_mismatch() {
        let err = DataFrame::from_value(&PyValue::dict(vec![
            (PyValue::from("a"), ints(&[1, 2, 3])),
            (PyValue::from("b"), ints(&[1])),
        ]))
        .unwrap_err();
        assert_eq!(err.to_string(), "ValueError: All arrays must be of the same length");
    }

    #[test]
    fn test_series_display_and_stats() {
        let series = Series::new(Some("a".to_string()), vec![PyValue::Int(1), PyValue::Int(3)]);
        assert_eq!(series.to_string(), "0    1\n1    3\nName: a, dtype: int64");
        assert_eq!(series.sum().unwrap(), PyValue::Int(4));
        assert_eq!(series.mean().unwrap(), PyValue::Float(2.0));
        assert_eq!(series.max().unwrap(), PyValue::Int(3));
    }
}
