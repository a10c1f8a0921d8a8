use serde_json::Value;

/// A trait for components that can be instrumented from tests and tools.
pub trait Debuggable {
    /// Reads the component's state and returns it as a JSON value.
    fn read_state(&self) -> Value;

    /// Writes the component's state from a JSON value.
    fn write_state(&mut self, state: &Value);
}
