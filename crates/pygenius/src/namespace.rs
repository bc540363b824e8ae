//! Variable bindings for one execution scope.

use std::collections::HashMap;

use crate::value::PyValue;

/// An insertion-ordered mapping from identifier to value.
///
/// Enumeration always follows first-binding order; rebinding a name keeps
/// its original position and deleting it removes that position. The
/// introspector relies on this to report variables in a stable order.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    entries: Vec<(String, PyValue)>,
    index: HashMap<String, usize>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&PyValue> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: PyValue) {
        let name = name.into();
        match self.index.get(&name) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, value));
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<PyValue> {
        let position = self.index.remove(name)?;
        let (_, value) = self.entries.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PyValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_insertion_order_survives_rebinding() {
        let mut ns = Namespace::new();
        ns.set("b", PyValue::Int(1));
        ns.set("a", PyValue::Int(2));
        ns.set("b", PyValue::Int(3));

        let names: Vec<&str> = ns.names().collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(ns.get("b"), Some(&PyValue::Int(3)));
    }

    #[test]
    fn test_remove_reindexes() {
        let mut ns = Namespace::new();
        ns.set("x", PyValue::Int(1));
        ns.set("y", PyValue::Int(2));
        ns.set("z", PyValue::Int(3));

        assert_eq!(ns.remove("y"), Some(PyValue::Int(2)));
        assert_eq!(ns.remove("y"), None);
        assert_eq!(ns.get("z"), Some(&PyValue::Int(3)));

        ns.set("y", PyValue::Int(4));
        let names: Vec<&str> = ns.names().collect();
        assert_eq!(names, vec!["x", "z", "y"]);
        assert_eq!(ns.len(), 3);
    }
}
