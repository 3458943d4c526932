//! Scalar values carried by criteria, bindings and entity records.

use std::fmt::Write as _;

use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

/// A scalar value as it appears in a criterion literal, a bound argument or
/// an entity field.
///
/// Lists are typed (e.g. `Int64Array`, `StringArray`) so the enum stays flat
/// for rkyv, the same way membership tests (`$in`) receive their operands.
#[derive(
    Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize,
)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit floating point.
    Float64(f64),
    /// UTF-8 string.
    String(String),
    /// Timestamp as milliseconds since Unix epoch.
    Timestamp(i64),
    /// UUID as 16 bytes.
    Uuid([u8; 16]),
    /// List of 64-bit integers.
    Int64Array(Vec<i64>),
    /// List of 64-bit floats.
    Float64Array(Vec<f64>),
    /// List of strings.
    StringArray(Vec<String>),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is a list.
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            Value::Int64Array(_) | Value::Float64Array(_) | Value::StringArray(_)
        )
    }

    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float64(_) => "float64",
            Value::String(_) => "string",
            Value::Timestamp(_) => "timestamp",
            Value::Uuid(_) => "uuid",
            Value::Int64Array(_) => "int64[]",
            Value::Float64Array(_) => "float64[]",
            Value::StringArray(_) => "string[]",
        }
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as i64, widening 32-bit integers.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(i) | Value::Timestamp(i) => Some(*i),
            Value::Int32(i) => Some(*i as i64),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Split a list value into its elements. Scalars yield themselves.
    pub fn elements(&self) -> Vec<Value> {
        match self {
            Value::Int64Array(items) => items.iter().copied().map(Value::Int64).collect(),
            Value::Float64Array(items) => items.iter().copied().map(Value::Float64).collect(),
            Value::StringArray(items) => items.iter().cloned().map(Value::String).collect(),
            other => vec![other.clone()],
        }
    }

    /// Append the document-literal form of this value to `out`.
    ///
    /// Integers print as digits, booleans lower-case, strings single-quoted
    /// with `'` and `\` escaped, null as `null` and lists as `[a,b]`.
    pub fn write_literal(&self, out: &mut String) {
        match self {
            Value::Null => out.push_str("null"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Int32(i) => {
                let _ = write!(out, "{}", i);
            }
            Value::Int64(i) | Value::Timestamp(i) => {
                let _ = write!(out, "{}", i);
            }
            Value::Float64(f) if f.is_nan() => out.push_str("NaN"),
            Value::Float64(f) if f.is_infinite() => {
                out.push_str(if f.is_sign_positive() { "Infinity" } else { "-Infinity" })
            }
            Value::Float64(f) => {
                let _ = write!(out, "{}", f);
            }
            Value::String(s) => write_quoted(out, s),
            Value::Uuid(bytes) => write_quoted(out, &format_uuid(bytes)),
            Value::Int64Array(_) | Value::Float64Array(_) | Value::StringArray(_) => {
                out.push('[');
                for (i, element) in self.elements().iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    element.write_literal(out);
                }
                out.push(']');
            }
        }
    }

    /// The document-literal form of this value.
    pub fn to_literal(&self) -> String {
        let mut out = String::new();
        self.write_literal(&mut out);
        out
    }
}

/// Write `s` single-quoted, escaping quotes and backslashes.
pub fn write_quoted(out: &mut String, s: &str) {
    out.push('\'');
    for c in s.chars() {
        if c == '\'' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
}

fn format_uuid(bytes: &[u8; 16]) -> String {
    let mut s = String::with_capacity(36);
    for (i, b) in bytes.iter().enumerate() {
        if matches!(i, 4 | 6 | 8 | 10) {
            s.push('-');
        }
        let _ = write!(s, "{:02x}", b);
    }
    s
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<[u8; 16]> for Value {
    fn from(v: [u8; 16]) -> Self {
        Value::Uuid(v)
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::Int64Array(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::StringArray(v)
    }
}

impl From<Vec<&str>> for Value {
    fn from(v: Vec<&str>) -> Self {
        Value::StringArray(v.into_iter().map(str::to_string).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_rendering() {
        assert_eq!(Value::Null.to_literal(), "null");
        assert_eq!(Value::Bool(true).to_literal(), "true");
        assert_eq!(Value::Bool(false).to_literal(), "false");
        assert_eq!(Value::Int32(-7).to_literal(), "-7");
        assert_eq!(Value::Int64(1_000_000).to_literal(), "1000000");
        assert_eq!(Value::Float64(2.5).to_literal(), "2.5");
        assert_eq!(Value::from("abc").to_literal(), "'abc'");
    }

    #[test]
    fn test_non_finite_floats_use_shell_names() {
        assert_eq!(Value::Float64(f64::NAN).to_literal(), "NaN");
        assert_eq!(Value::Float64(f64::INFINITY).to_literal(), "Infinity");
        assert_eq!(Value::Float64(f64::NEG_INFINITY).to_literal(), "-Infinity");
        assert_eq!(
            Value::Float64Array(vec![1.5, f64::NAN]).to_literal(),
            "[1.5,NaN]"
        );
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(Value::from("it's").to_literal(), r"'it\'s'");
        assert_eq!(Value::from(r"a\b").to_literal(), r"'a\\b'");
    }

    #[test]
    fn test_list_rendering() {
        assert_eq!(Value::from(vec![1i64, 2, 3]).to_literal(), "[1,2,3]");
        assert_eq!(Value::from(vec!["a", "b"]).to_literal(), "['a','b']");
        assert_eq!(Value::StringArray(vec![]).to_literal(), "[]");
    }

    #[test]
    fn test_uuid_rendering() {
        let id = [
            0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0, 0, 1, 2, 3, 4, 5, 6, 7,
        ];
        assert_eq!(
            Value::Uuid(id).to_literal(),
            "'12345678-9abc-def0-0001-020304050607'"
        );
    }

    #[test]
    fn test_value_conversions() {
        let v: Value = None::<i32>.into();
        assert_eq!(v, Value::Null);

        let v: Value = Some(42i32).into();
        assert_eq!(v, Value::Int32(42));
        assert_eq!(v.as_i64(), Some(42));

        assert!(Value::from(vec![1i64]).is_array());
        assert!(!Value::from(1i64).is_array());
    }

    #[test]
    fn test_elements() {
        assert_eq!(
            Value::from(vec![1i64, 2]).elements(),
            vec![Value::Int64(1), Value::Int64(2)]
        );
        assert_eq!(Value::Bool(true).elements(), vec![Value::Bool(true)]);
    }
}
