//! Owned value model with a deterministic total order
//!
//! Values of different types order by type rank; values of the same type
//! order by their natural comparison. Doubles use `total_cmp` so the order
//! is total even in the presence of NaN. Range computation relies on this
//! order to produce sorted, non-overlapping scan ranges.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A concrete column value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Value {
    /// Absent / null
    Null,
    /// Boolean
    Boolean(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point
    Double(f64),
    /// UTF-8 string
    Text(String),
    /// Raw bytes
    Blob(Vec<u8>),
    /// Ordered collection
    List(Vec<Value>),
    /// Unique collection (stored sorted by the builder)
    Set(Vec<Value>),
    /// Key/value collection as ordered pairs
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Returns true for the null value
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convenience constructor for text values
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
        }
    }

    /// Rank used to order values of different types
    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Int(_) => 2,
            Value::Double(_) => 3,
            Value::Text(_) => 4,
            Value::Blob(_) => 5,
            Value::List(_) => 6,
            Value::Set(_) => 7,
            Value::Map(_) => 8,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Double(a), Value::Double(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Blob(a), Value::Blob(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => a.cmp(b),
            (Value::Set(a), Value::Set(b)) => a.cmp(b),
            (Value::Map(a), Value::Map(b)) => a.cmp(b),
            (a, b) => a.type_rank().cmp(&b.type_rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{}", d),
            Value::Text(s) => write!(f, "'{}'", s),
            Value::Blob(bytes) => {
                write!(f, "0x")?;
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Set(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "}}")
            }
            Value::Map(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_type_ordering() {
        assert!(Value::Int(1) < Value::Int(2));
        assert!(Value::Text("a".into()) < Value::Text("b".into()));
        assert!(Value::Boolean(false) < Value::Boolean(true));
    }

    #[test]
    fn test_cross_type_ordering_is_total() {
        let mut values = vec![
            Value::Text("x".into()),
            Value::Int(5),
            Value::Null,
            Value::Double(1.5),
        ];
        values.sort();
        assert_eq!(values[0], Value::Null);
        assert_eq!(values[1], Value::Int(5));
    }

    #[test]
    fn test_double_total_order() {
        assert!(Value::Double(f64::NEG_INFINITY) < Value::Double(0.0));
        assert!(Value::Double(0.0) < Value::Double(f64::NAN));
        assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Int(7).to_string(), "7");
        assert_eq!(Value::text("abc").to_string(), "'abc'");
        assert_eq!(Value::Blob(vec![0xab, 0x01]).to_string(), "0xab01");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Int(2)]).to_string(),
            "[1, 2]"
        );
    }
}
