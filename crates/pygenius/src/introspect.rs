//! Post-execution summaries of the variables a snippet left behind.

use crate::namespace::Namespace;
use crate::value::PyValue;

/// Names the engine binds before a snippet runs. Never reported.
pub const LIBRARY_HANDLES: &[&str] = &["np", "pd", "plt"];

/// Describe every interesting variable in `namespace`, in binding order.
///
/// Arrays, frames and series are reported with their shape; lists, dicts
/// and sets with their item count. Names starting with `_` and the
/// library handles are skipped, as is every other kind of value.
pub fn summarize(namespace: &Namespace) -> Vec<String> {
    namespace
        .iter()
        .filter(|(name, _)| !is_hidden(name))
        .filter_map(|(name, value)| describe(name, value))
        .collect()
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('_') || LIBRARY_HANDLES.contains(&name)
}

fn describe(name: &str, value: &PyValue) -> Option<String> {
    match value {
        PyValue::Array(_) | PyValue::DataFrame(_) | PyValue::Series(_) => Some(match value.shape() {
            Some(shape) => format!(
                "📊 Variable '{}': {} shape={}",
                name,
                value.type_name(),
                PyValue::shape_tuple(&shape)
            ),
            None => format!("📊 Variable '{}': {}", name, value.type_name()),
        }),
        PyValue::List(_) | PyValue::Dict(_) | PyValue::Set(_) => Some(format!(
            "📦 Variable '{}': {} with {} items",
            name,
            value.type_name(),
            value.len().unwrap_or(0)
        )),
        _ => None,
    }
}
