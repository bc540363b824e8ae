//! `seq[lower:upper:step]` reads, writes and deletions.
//!
//! A [`SliceSpec`] is resolved against a length the way `slice.indices()`
//! does; every sequence kind then picks elements at those positions.

use crate::error::{Error, Result};
use crate::value::PyValue;

/// The evaluated bounds of a slice expression. `None` means omitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SliceSpec {
    pub lower: Option<i64>,
    pub upper: Option<i64>,
    pub step: Option<i64>,
}

impl SliceSpec {
    pub fn new(lower: Option<i64>, upper: Option<i64>, step: Option<i64>) -> Self {
        Self { lower, upper, step }
    }

    fn step(&self) -> Result<i64> {
        match self.step.unwrap_or(1) {
            0 => Err(Error::raise("ValueError", "slice step cannot be zero")),
            step => Ok(step),
        }
    }

    /// Element positions selected from a sequence of `len` items.
    pub fn positions(&self, len: usize) -> Result<Vec<usize>> {
        let step = self.step()?;
        let len = len as i64;
        let resolve = |bound: i64, floor: i64, ceil: i64| {
            let bound = if bound < 0 { bound + len } else { bound };
            bound.clamp(floor, ceil)
        };

        let (start, stop) = if step > 0 {
            (
                self.lower.map_or(0, |b| resolve(b, 0, len)),
                self.upper.map_or(len, |b| resolve(b, 0, len)),
            )
        } else {
            (
                self.lower.map_or(len - 1, |b| resolve(b, -1, len - 1)),
                self.upper.map_or(-1, |b| resolve(b, -1, len - 1)),
            )
        };

        let count = if step > 0 {
            (stop - start + step - 1).max(0) / step
        } else {
            (start - stop - step - 1).max(0) / -step
        };
        Ok((0..count).map(|k| (start + k * step) as usize).collect())
    }

    /// Read the slice out of a list, tuple or string.
    pub fn read(&self, value: &PyValue) -> Result<PyValue> {
        let pick = |items: &[PyValue]| -> Result<Vec<PyValue>> {
            Ok(self
                .positions(items.len())?
                .into_iter()
                .map(|i| items[i].clone())
                .collect())
        };
        match value {
            PyValue::List(items) => pick(&items.borrow()).map(PyValue::list),
            PyValue::Tuple(items) => pick(items).map(PyValue::Tuple),
            PyValue::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let picked = self.positions(chars.len())?.into_iter().map(|i| chars[i]);
                Ok(PyValue::Str(picked.collect()))
            }
            other => Err(Error::raise(
                "TypeError",
                format!("'{}' object is not sliceable", other.type_name()),
            )),
        }
    }

    /// Replace the slice of a list with `items`.
    ///
    /// A contiguous slice may change the list's length; an extended slice
    /// must be matched one for one.
    pub fn write(&self, target: &PyValue, items: Vec<PyValue>) -> Result<()> {
        let PyValue::List(list) = target else {
            return Err(Error::raise(
                "TypeError",
                format!(
                    "'{}' object does not support slice assignment",
                    target.type_name()
                ),
            ));
        };
        let mut list = list.borrow_mut();

        if self.step()? == 1 {
            let positions = self.positions(list.len())?;
            let start = match (positions.first(), self.lower) {
                (Some(&first), _) => first,
                (None, Some(lower)) => {
                    let len = list.len() as i64;
                    let lower = if lower < 0 { lower + len } else { lower };
                    lower.clamp(0, len) as usize
                }
                (None, None) => 0,
            };
            list.splice(start..start + positions.len(), items);
            return Ok(());
        }

        let positions = self.positions(list.len())?;
        if positions.len() != items.len() {
            return Err(Error::raise(
                "ValueError",
                format!(
                    "attempt to assign sequence of size {} to extended slice of size {}",
                    items.len(),
                    positions.len()
                ),
            ));
        }
        for (position, item) in positions.into_iter().zip(items) {
            list[position] = item;
        }
        Ok(())
    }

    /// Remove the slice from a list: `del items[lower:upper:step]`.
    pub fn delete(&self, target: &PyValue) -> Result<()> {
        let PyValue::List(list) = target else {
            return Err(Error::raise(
                "TypeError",
                format!(
                    "'{}' object doesn't support item deletion",
                    target.type_name()
                ),
            ));
        };
        let mut list = list.borrow_mut();
        let mut positions = self.positions(list.len())?;
        positions.sort_unstable();
        for position in positions.into_iter().rev() {
            list.remove(position);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ints(values: &[i64]) -> PyValue {
        PyValue::from(values.to_vec())
    }

    fn spec(lower: Option<i64>, upper: Option<i64>, step: Option<i64>) -> SliceSpec {
        SliceSpec::new(lower, upper, step)
    }

    #[test]
    fn test_forward_positions() {
        let five = ints(&[0, 1, 2, 3, 4]);
        assert_eq!(spec(Some(1), Some(3), None).read(&five).unwrap(), ints(&[1, 2]));
        assert_eq!(spec(None, None, Some(2)).read(&five).unwrap(), ints(&[0, 2, 4]));
        assert_eq!(spec(Some(-2), None, None).read(&five).unwrap(), ints(&[3, 4]));
        assert_eq!(spec(Some(10), None, None).read(&five).unwrap(), ints(&[]));
        assert_eq!(spec(Some(3), Some(1), None).positions(5).unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn test_negative_step() {
        let five = ints(&[0, 1, 2, 3, 4]);
        assert_eq!(
            spec(None, None, Some(-1)).read(&five).unwrap(),
            ints(&[4, 3, 2, 1, 0])
        );
        assert_eq!(spec(Some(3), Some(0), Some(-1)).read(&five).unwrap(), ints(&[3, 2, 1]));
        assert_eq!(spec(Some(-1), Some(-4), Some(-2)).read(&five).unwrap(), ints(&[4, 2]));
        assert_eq!(
            spec(None, None, Some(-1))
                .read(&PyValue::Str("héllo".to_string()))
                .unwrap(),
            PyValue::Str("olléh".to_string())
        );
    }

    #[test]
    fn test_write() {
        let value = ints(&[0, 1, 2, 3]);
        spec(Some(1), Some(3), None)
            .write(&value, vec![PyValue::Int(9)])
            .unwrap();
        assert_eq!(value, ints(&[0, 9, 3]));

        spec(Some(3), None, None)
            .write(&value, vec![PyValue::Int(7)])
            .unwrap();
        assert_eq!(value, ints(&[0, 9, 3, 7]));

        let err = spec(None, None, Some(2))
            .write(&value, vec![PyValue::Int(1)])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "ValueError: attempt to assign sequence of size 1 to extended slice of size 2"
        );
    }

    #[test]
    fn test_delete() {
        let value = ints(&[0, 1, 2, 3, 4, 5]);
        spec(None, None, Some(2)).delete(&value).unwrap();
        assert_eq!(value, ints(&[1, 3, 5]));

        spec(None, None, Some(-2)).delete(&value).unwrap();
        assert_eq!(value, ints(&[3]));

        spec(Some(5), None, None).delete(&value).unwrap();
        assert_eq!(value, ints(&[3]));

        let err = SliceSpec::default()
            .delete(&PyValue::Tuple(vec![]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: 'tuple' object doesn't support item deletion"
        );
    }

    #[test]
    fn test_rejections() {
        let err = spec(None, None, Some(0))
            .read(&PyValue::Tuple(vec![PyValue::Int(1)]))
            .unwrap_err();
        assert_eq!(err.to_string(), "ValueError: slice step cannot be zero");

        let err = SliceSpec::default().read(&PyValue::Int(3)).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: 'int' object is not sliceable");
    }
}
