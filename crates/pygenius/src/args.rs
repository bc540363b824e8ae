//! Call arguments for built-in and native functions.

use crate::error::{Error, Result};
use crate::value::PyValue;

/// Evaluated positional and keyword arguments of a call.
#[derive(Debug, Clone, Default)]
pub struct Args {
    pub positional: Vec<PyValue>,
    pub keywords: Vec<(String, PyValue)>,
}

impl Args {
    pub fn new(positional: Vec<PyValue>) -> Self {
        Self {
            positional,
            keywords: Vec::new(),
        }
    }

    pub fn with_keywords(positional: Vec<PyValue>, keywords: Vec<(String, PyValue)>) -> Self {
        Self {
            positional,
            keywords,
        }
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty()
    }

    /// Check the positional argument count is within `min..=max`.
    pub fn expect(&self, func: &str, min: usize, max: usize) -> Result<()> {
        let got = self.positional.len();
        if got >= min && got <= max {
            return Ok(());
        }
        let message = if min == max {
            match min {
                0 => format!("{}() takes no arguments ({} given)", func, got),
                1 => format!("{}() takes exactly one argument ({} given)", func, got),
                n => format!("{}() takes exactly {} arguments ({} given)", func, n, got),
            }
        } else {
            format!(
                "{}() takes from {} to {} arguments ({} given)",
                func, min, max, got
            )
        };
        Err(Error::raise("TypeError", message))
    }

    /// Reject keyword arguments for functions that take none.
    pub fn no_keywords(&self, func: &str) -> Result<()> {
        match self.keywords.first() {
            Some((name, _)) => Err(Error::raise(
                "TypeError",
                format!("{}() got an unexpected keyword argument '{}'", func, name),
            )),
            None => Ok(()),
        }
    }

    pub fn keyword(&self, name: &str) -> Option<&PyValue> {
        self.keywords.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Get an argument by position, falling back to its keyword name.
    pub fn get(&self, index: usize, name: &str) -> Option<&PyValue> {
        self.positional.get(index).or_else(|| self.keyword(name))
    }

    pub fn first(&self) -> Option<&PyValue> {
        self.positional.first()
    }

    /// Get a required argument, raising `TypeError` when it is missing.
    pub fn required(&self, index: usize, name: &str, func: &str) -> Result<&PyValue> {
        self.get(index, name).ok_or_else(|| {
            Error::raise(
                "TypeError",
                format!("{}() missing required argument: '{}'", func, name),
            )
        })
    }

    pub fn int(&self, index: usize, name: &str) -> Result<Option<i64>> {
        self.get(index, name).map(arg_int).transpose()
    }

    pub fn float(&self, index: usize, name: &str) -> Result<Option<f64>> {
        self.get(index, name).map(arg_float).transpose()
    }
}

/// Extract an integer argument.
pub fn arg_int(value: &PyValue) -> Result<i64> {
    value.as_int().ok_or_else(|| {
        Error::raise(
            "TypeError",
            format!(
                "'{}' object cannot be interpreted as an integer",
                value.type_name()
            ),
        )
    })
}

/// Extract a numeric argument as a float.
pub fn arg_float(value: &PyValue) -> Result<f64> {
    value.as_float().ok_or_else(|| {
        Error::raise(
            "TypeError",
            format!("must be real number, not {}", value.type_name()),
        )
    })
}

pub fn arg_str<'v>(value: &'v PyValue) -> Result<&'v str> {
    value
        .as_str()
        .ok_or_else(|| Error::type_error("str", value.type_name()))
}
