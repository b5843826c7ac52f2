//! Resolution - Future が最終的に解決された値

use serde_json::Value;

use super::status::Status;

/// Final value of a future.
///
/// A direct future resolves to the completed [`Status`] of its job. A
/// continuation that returned a plain value resolves to [`Resolution::Value`];
/// `Value(Null)` means "no result", which is not the same as "not finished".
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Status(Status),
    Value(Value),
}

impl Resolution {
    /// Field lookup: payload field of a status, or object key of a value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Resolution::Status(st) => st.get(key),
            Resolution::Value(v) => v.get(key),
        }
    }

    pub fn as_status(&self) -> Option<&Status> {
        match self {
            Resolution::Status(st) => Some(st),
            Resolution::Value(_) => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Resolution::Status(_) => None,
            Resolution::Value(v) => Some(v),
        }
    }

    /// Converts into a JSON value. A status becomes its payload object.
    pub fn into_value(self) -> Value {
        match self {
            Resolution::Status(st) => Value::Object(st.payload),
            Resolution::Value(v) => v,
        }
    }

    /// True for the explicit "no result" value.
    pub fn is_empty(&self) -> bool {
        matches!(self, Resolution::Value(Value::Null))
    }
}

impl From<Status> for Resolution {
    fn from(st: Status) -> Self {
        Resolution::Status(st)
    }
}
