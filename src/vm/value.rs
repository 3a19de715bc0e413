use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::types::TypeDescriptor;

/// A tagged runtime value.
///
/// Every value carries enough information for dynamic type checks:
/// primitives are self-describing, records point at their type
/// descriptor, and `Any` boxes a value whose static type was erased.
/// Composite values exclusively own their children; cycles are not
/// constructible because records, arrays and maps are built bottom-up.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Null,
    Array(Vec<Value>),
    Map(HashMap<String, Value>),
    Record(RecordValue),
    Json(serde_json::Value),
    Any(Box<Value>),
}

/// A record instance: a shared type descriptor plus the field values in
/// declared order.
///
/// Invariant: `fields.len()` equals the descriptor's field count, and
/// `fields[i]` is the value of the descriptor's i-th field.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordValue {
    pub descriptor: Arc<TypeDescriptor>,
    pub fields: Vec<Value>,
}

impl RecordValue {
    pub fn new(descriptor: Arc<TypeDescriptor>, fields: Vec<Value>) -> Self {
        debug_assert_eq!(
            descriptor.fields().map(|f| f.len()).unwrap_or(0),
            fields.len(),
            "record field vector must parallel its descriptor"
        );
        Self { descriptor, fields }
    }

    /// Look up a field value by declared name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        let fields = self.descriptor.fields()?;
        let index = fields.iter().position(|f| f.name == name)?;
        self.fields.get(index)
    }

    pub fn type_name(&self) -> &str {
        self.descriptor.name()
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordValue> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Get the dynamic type name of this value.
    ///
    /// Records report their declared type name; an `Any` box reports the
    /// type of the value inside it; `Null` reports the literal `"null"`.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "boolean",
            Value::Str(_) => "string",
            Value::Null => "null",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Record(r) => r.type_name(),
            Value::Json(_) => "json",
            Value::Any(inner) => inner.type_name(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => {
                if n.fract() == 0.0 {
                    write!(f, "{}.0", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{}", s),
            Value::Null => write!(f, "null"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(_) => write!(f, "<map>"),
            Value::Record(r) => write!(f, "<{}>", r.type_name()),
            Value::Json(json) => write!(f, "{}", json),
            Value::Any(inner) => write!(f, "{}", inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::types::FieldDescriptor;

    fn person() -> Arc<TypeDescriptor> {
        TypeDescriptor::record(
            "Person",
            vec![
                FieldDescriptor::new("name", TypeDescriptor::string()),
                FieldDescriptor::new("age", TypeDescriptor::int()),
            ],
        )
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Int(1).type_name(), "int");
        assert_eq!(Value::Float(1.0).type_name(), "float");
        assert_eq!(Value::Bool(true).type_name(), "boolean");
        assert_eq!(Value::Str("x".to_string()).type_name(), "string");
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::Array(vec![]).type_name(), "array");
        assert_eq!(Value::Map(HashMap::new()).type_name(), "map");
        assert_eq!(Value::Json(serde_json::Value::Null).type_name(), "json");
    }

    #[test]
    fn test_record_type_name() {
        let record = RecordValue::new(
            person(),
            vec![Value::Str("kevin".to_string()), Value::Int(25)],
        );
        assert_eq!(Value::Record(record).type_name(), "Person");
    }

    #[test]
    fn test_any_reports_inner_type() {
        let boxed = Value::Any(Box::new(Value::Int(5)));
        assert_eq!(boxed.type_name(), "int");
    }

    #[test]
    fn test_record_field_lookup() {
        let record = RecordValue::new(
            person(),
            vec![Value::Str("kevin".to_string()), Value::Int(25)],
        );
        assert_eq!(record.field("age"), Some(&Value::Int(25)));
        assert_eq!(record.field("name"), Some(&Value::Str("kevin".to_string())));
        assert_eq!(record.field("missing"), None);
    }

    #[test]
    fn test_strict_accessors() {
        assert_eq!(Value::Int(42).as_int(), Some(42));
        assert_eq!(Value::Bool(true).as_int(), None);
        assert_eq!(Value::Int(42).as_float(), None);
        assert_eq!(Value::Float(2.5).as_float(), Some(2.5));
    }

    #[test]
    fn test_display_floats_keep_decimal_point() {
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
        assert_eq!(Value::Float(3.5).to_string(), "3.5");
    }

    #[test]
    fn test_display_array() {
        let array = Value::Array(vec![Value::Int(1), Value::Str("a".to_string())]);
        assert_eq!(array.to_string(), "[1, a]");
    }
}
