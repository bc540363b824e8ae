/// Settings for one [`ExecutionEngine`](crate::ExecutionEngine) or
/// [`Console`](crate::Console).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Bind `np`, `pd` and `plt` before each snippet runs.
    pub preload_libraries: bool,
    /// Maximum depth of nested function calls.
    pub recursion_limit: usize,
    /// File name shown in tracebacks.
    pub filename: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            preload_libraries: true,
            recursion_limit: 200,
            filename: "<string>".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn with_preload_libraries(mut self, preload: bool) -> Self {
        self.preload_libraries = preload;
        self
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }
}
