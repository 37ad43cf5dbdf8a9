//! Lenient typed lookups into a JSON parameter object.
//!
//! A missing key, a `null`, or a value of the wrong type yields the caller's
//! default. Range checks are left to the consumer.

use serde_json::Value;

/// Borrowed view over a JSON object of effect parameters.
#[derive(Debug, Clone, Copy)]
pub struct Params<'a> {
    value: &'a Value,
}

impl<'a> Params<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self { value }
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.value.get(name)
    }

    /// Any JSON number, integers included, narrowed to `f32`.
    pub fn f32(&self, name: &str, default: f32) -> f32 {
        self.get(name)
            .and_then(Value::as_f64)
            .map(|v| v as f32)
            .unwrap_or(default)
    }

    /// Non-negative integers that fit in `u32`. Floats fall back to the default.
    pub fn u32(&self, name: &str, default: u32) -> u32 {
        self.get(name)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(default)
    }

    pub fn bool(&self, name: &str, default: bool) -> bool {
        self.get(name).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn str(&self, name: &str) -> Option<&'a str> {
        self.get(name).and_then(Value::as_str)
    }
}
