//! Runtime type conversions.
//!
//! Every operation returns a `(Value, Option<ConversionError>)` pair. The
//! error half is a language-level value, not a Rust error: callers route
//! it into the program's error slot and branch on its presence. No
//! operation mutates a value passed into it, so conversions are safe to
//! run from concurrently executing strands.

use std::sync::{Arc, OnceLock};

use serde_json::Value as JsonValue;

use super::types::{FieldDescriptor, TypeDescriptor, TypeKind, structurally_equivalent};
use super::value::{RecordValue, Value};

/// Result pair produced by every conversion operation.
pub type Converted = (Value, Option<ConversionError>);

/// A failed conversion, carried as a value.
///
/// The message is human-readable; the type names and field path are
/// machine-inspectable so calling code can branch without string parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionError {
    pub message: String,
    pub source_type: Option<String>,
    pub target_type: Option<String>,
    pub field_path: Option<String>,
}

impl ConversionError {
    fn cast(source: &str, target: &str) -> Self {
        Self {
            message: format!("'{}' cannot be cast to '{}'", source, target),
            source_type: Some(source.to_string()),
            target_type: Some(target.to_string()),
            field_path: None,
        }
    }

    /// The fixed schema of the error record exposed to programs.
    pub fn descriptor() -> Arc<TypeDescriptor> {
        static DESCRIPTOR: OnceLock<Arc<TypeDescriptor>> = OnceLock::new();
        DESCRIPTOR
            .get_or_init(|| {
                TypeDescriptor::record(
                    "CastError",
                    vec![
                        FieldDescriptor::new("message", TypeDescriptor::string()),
                        FieldDescriptor::new("sourceTypeName", TypeDescriptor::string()),
                        FieldDescriptor::new("targetTypeName", TypeDescriptor::string()),
                        FieldDescriptor::new("fieldPath", TypeDescriptor::string()),
                    ],
                )
            })
            .clone()
    }

    /// Materialize the error as its record value.
    pub fn into_record(self) -> Value {
        let fields = vec![
            Value::Str(self.message),
            self.source_type.map(Value::Str).unwrap_or(Value::Null),
            self.target_type.map(Value::Str).unwrap_or(Value::Null),
            self.field_path.map(Value::Str).unwrap_or(Value::Null),
        ];
        Value::Record(RecordValue::new(Self::descriptor(), fields))
    }
}

/// The zero value of a declared type.
///
/// `0`, `0.0`, `false` and `""` for the value types; `Null` for every
/// reference type. This is the fallback result of a failed direct cast.
pub fn zero_value(target: &TypeDescriptor) -> Value {
    match target.kind() {
        TypeKind::Int => Value::Int(0),
        TypeKind::Float => Value::Float(0.0),
        TypeKind::Boolean => Value::Bool(false),
        TypeKind::String => Value::Str(String::new()),
        _ => Value::Null,
    }
}

/// Checked direct cast.
///
/// Tag-exact: the value's dynamic type must equal the target type, with
/// two exceptions - `any` accepts every value unchanged, and `Any` boxes
/// are unwrapped before the check. There is no int/float coercion. On
/// mismatch the returned value is the target's zero value and the error
/// names both types.
pub fn cast(value: &Value, target: &TypeDescriptor) -> Converted {
    if matches!(target.kind(), TypeKind::Any) {
        return (value.clone(), None);
    }
    let inner = unwrap_any(value);
    let matched = match (inner, target.kind()) {
        (Value::Int(_), TypeKind::Int) => true,
        (Value::Float(_), TypeKind::Float) => true,
        (Value::Bool(_), TypeKind::Boolean) => true,
        (Value::Str(_), TypeKind::String) => true,
        (Value::Array(_), TypeKind::Array(_)) => true,
        (Value::Map(_), TypeKind::Map) => true,
        (Value::Json(_), TypeKind::Json) => true,
        (Value::Record(rec), TypeKind::Record(_)) => rec.descriptor.as_ref() == target,
        _ => false,
    };
    if matched {
        (inner.clone(), None)
    } else {
        (
            zero_value(target),
            Some(ConversionError::cast(inner.type_name(), target.name())),
        )
    }
}

/// Record force-cast.
///
/// Succeeds iff the source record's type is structurally equivalent to
/// the target: the target's field list must be a name+type prefix of the
/// source's. The result copies the target-length prefix of the source's
/// fields; the source is never mutated.
pub fn force_cast(value: &Value, target: &Arc<TypeDescriptor>) -> Converted {
    let source = unwrap_any(value);
    if let (Value::Record(rec), TypeKind::Record(target_fields)) = (source, target.kind()) {
        if structurally_equivalent(&rec.descriptor, target) {
            let fields = rec.fields[..target_fields.len()].to_vec();
            return (
                Value::Record(RecordValue::new(target.clone(), fields)),
                None,
            );
        }
    }
    (
        Value::Null,
        Some(ConversionError::cast(source.type_name(), target.name())),
    )
}

/// Structural mapping of a JSON document or a map into a record.
///
/// Walks the target's fields in declared order, depth-first. The first
/// failure wins: a missing key or a shape mismatch stops the walk, and
/// nested failures compose their mapping clauses outermost-field-first.
pub fn map_to_record(value: &Value, target: &Arc<TypeDescriptor>) -> Converted {
    let source = unwrap_any(value);
    let TypeKind::Record(fields) = target.kind() else {
        return (
            Value::Null,
            Some(ConversionError::cast(source.type_name(), target.name())),
        );
    };
    let outcome = match source {
        Value::Json(JsonValue::Object(members)) => map_json_fields(members, fields),
        Value::Json(other) => Err(Failure::shape("json-object", json_kind(other))),
        Value::Map(members) => map_value_fields(members, fields),
        other => {
            return (
                Value::Null,
                Some(ConversionError::cast(other.type_name(), target.name())),
            );
        }
    };
    match outcome {
        Ok(record_fields) => (
            Value::Record(RecordValue::new(target.clone(), record_fields)),
            None,
        ),
        Err(failure) => {
            let error = failure.into_error(source.type_name(), target.name());
            (Value::Null, Some(error))
        }
    }
}

/// Re-serialize a value as a JSON document.
///
/// Records become objects keyed by field name; maps become objects;
/// non-finite floats have no JSON representation and become null.
pub fn to_json(value: &Value) -> JsonValue {
    match value {
        Value::Int(n) => JsonValue::from(*n),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Str(s) => JsonValue::String(s.clone()),
        Value::Null => JsonValue::Null,
        Value::Array(items) => JsonValue::Array(items.iter().map(to_json).collect()),
        Value::Map(members) => JsonValue::Object(
            members
                .iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect(),
        ),
        Value::Record(rec) => {
            let fields = rec.descriptor.fields().unwrap_or(&[]);
            JsonValue::Object(
                fields
                    .iter()
                    .zip(rec.fields.iter())
                    .map(|(f, v)| (f.name.clone(), to_json(v)))
                    .collect(),
            )
        }
        Value::Json(json) => json.clone(),
        Value::Any(inner) => to_json(inner),
    }
}

fn unwrap_any(value: &Value) -> &Value {
    let mut current = value;
    while let Value::Any(inner) = current {
        current = inner;
    }
    current
}

/// A mapping failure in progress: the clause composed so far plus the
/// field path walked to reach it.
struct Failure {
    clause: String,
    path: Vec<String>,
}

impl Failure {
    fn missing(field: &str) -> Self {
        Self {
            clause: format!("error while mapping '{}': no such field found", field),
            path: vec![field.to_string()],
        }
    }

    fn incompatible(field: &str, expected: &str, found: &str) -> Self {
        Self {
            clause: format!(
                "error while mapping '{}': incompatible types: expected '{}', found '{}'",
                field, expected, found
            ),
            path: vec![field.to_string()],
        }
    }

    fn shape(expected: &str, found: &str) -> Self {
        Self {
            clause: format!(
                "incompatible types: expected '{}', found '{}'",
                expected, found
            ),
            path: Vec::new(),
        }
    }

    fn wrap(self, field: &str) -> Self {
        let mut path = Vec::with_capacity(self.path.len() + 1);
        path.push(field.to_string());
        path.extend(self.path);
        Self {
            clause: format!("error while mapping '{}': {}", field, self.clause),
            path,
        }
    }

    fn into_error(self, source: &str, target: &str) -> ConversionError {
        let field_path = if self.path.is_empty() {
            None
        } else {
            Some(self.path.join("."))
        };
        ConversionError {
            message: format!(
                "cannot convert '{}' to type '{}': {}",
                source, target, self.clause
            ),
            source_type: Some(source.to_string()),
            target_type: Some(target.to_string()),
            field_path,
        }
    }
}

/// A failed field member: either a flat shape mismatch (reported at the
/// enclosing field) or a failure from a nested record walk.
enum MemberFailure {
    Shape {
        expected: &'static str,
        found: String,
    },
    Nested(Failure),
}

impl MemberFailure {
    fn shape(expected: &'static str, found: impl Into<String>) -> Self {
        Self::Shape {
            expected,
            found: found.into(),
        }
    }

    fn at_field(self, field: &str) -> Failure {
        match self {
            Self::Shape { expected, found } => Failure::incompatible(field, expected, &found),
            Self::Nested(inner) => inner.wrap(field),
        }
    }
}

/// The fixed kind vocabulary used in mapping error messages.
fn json_kind(json: &JsonValue) -> &'static str {
    match json {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(n) => {
            if n.is_f64() {
                "float"
            } else {
                "int"
            }
        }
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "json-object",
    }
}

fn map_json_fields(
    members: &serde_json::Map<String, JsonValue>,
    fields: &[FieldDescriptor],
) -> Result<Vec<Value>, Failure> {
    let mut out = Vec::with_capacity(fields.len());
    for field in fields {
        let Some(member) = members.get(&field.name) else {
            return Err(Failure::missing(&field.name));
        };
        match json_member(member, &field.ty) {
            Ok(value) => out.push(value),
            Err(failure) => return Err(failure.at_field(&field.name)),
        }
    }
    Ok(out)
}

/// Convert one JSON member against its declared field type.
fn json_member(member: &JsonValue, ty: &Arc<TypeDescriptor>) -> Result<Value, MemberFailure> {
    match ty.kind() {
        TypeKind::Int => match member {
            JsonValue::Number(n) => match n.as_i64() {
                Some(v) => Ok(Value::Int(v)),
                None => Err(MemberFailure::shape("int", json_kind(member))),
            },
            other => Err(MemberFailure::shape("int", json_kind(other))),
        },
        TypeKind::Float => match member {
            // Any JSON number narrows to float; ints widen losslessly
            // enough for document data.
            JsonValue::Number(n) => match n.as_f64() {
                Some(v) => Ok(Value::Float(v)),
                None => Err(MemberFailure::shape("float", json_kind(member))),
            },
            other => Err(MemberFailure::shape("float", json_kind(other))),
        },
        TypeKind::Boolean => match member {
            JsonValue::Bool(b) => Ok(Value::Bool(*b)),
            other => Err(MemberFailure::shape("boolean", json_kind(other))),
        },
        TypeKind::String => match member {
            JsonValue::String(s) => Ok(Value::Str(s.clone())),
            other => Err(MemberFailure::shape("string", json_kind(other))),
        },
        TypeKind::Json => Ok(Value::Json(member.clone())),
        TypeKind::Any => Ok(Value::Json(member.clone())),
        TypeKind::Map => match member {
            JsonValue::Object(obj) => Ok(Value::Map(
                obj.iter()
                    .map(|(k, v)| (k.clone(), Value::Json(v.clone())))
                    .collect(),
            )),
            JsonValue::Null => Ok(Value::Null),
            other => Err(MemberFailure::shape("json-object", json_kind(other))),
        },
        TypeKind::Array(element) => match member {
            JsonValue::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(json_member(item, element)?);
                }
                Ok(Value::Array(out))
            }
            JsonValue::Null => Ok(Value::Null),
            other => Err(MemberFailure::shape("array", json_kind(other))),
        },
        TypeKind::Record(fields) => match member {
            JsonValue::Object(obj) => map_json_fields(obj, fields)
                .map(|values| Value::Record(RecordValue::new(ty.clone(), values)))
                .map_err(MemberFailure::Nested),
            JsonValue::Null => Ok(Value::Null),
            other => Err(MemberFailure::shape("json-object", json_kind(other))),
        },
    }
}

fn map_value_fields(
    members: &std::collections::HashMap<String, Value>,
    fields: &[FieldDescriptor],
) -> Result<Vec<Value>, Failure> {
    let mut out = Vec::with_capacity(fields.len());
    for field in fields {
        let Some(member) = members.get(&field.name) else {
            return Err(Failure::missing(&field.name));
        };
        match value_member(member, &field.ty) {
            Ok(value) => out.push(value),
            Err(failure) => return Err(failure.at_field(&field.name)),
        }
    }
    Ok(out)
}

/// Convert one map member against its declared field type.
///
/// Map members already carry runtime tags, so the shape check compares
/// tags directly; mismatches report the member's dynamic type name.
fn value_member(value: &Value, ty: &Arc<TypeDescriptor>) -> Result<Value, MemberFailure> {
    let member = unwrap_any(value);
    match ty.kind() {
        TypeKind::Int => match member {
            Value::Int(_) => Ok(member.clone()),
            other => Err(MemberFailure::shape("int", other.type_name())),
        },
        TypeKind::Float => match member {
            Value::Float(_) => Ok(member.clone()),
            other => Err(MemberFailure::shape("float", other.type_name())),
        },
        TypeKind::Boolean => match member {
            Value::Bool(_) => Ok(member.clone()),
            other => Err(MemberFailure::shape("boolean", other.type_name())),
        },
        TypeKind::String => match member {
            Value::Str(_) => Ok(member.clone()),
            other => Err(MemberFailure::shape("string", other.type_name())),
        },
        TypeKind::Json => match member {
            Value::Json(_) | Value::Null => Ok(member.clone()),
            other => Err(MemberFailure::shape("json", other.type_name())),
        },
        TypeKind::Any => Ok(member.clone()),
        TypeKind::Map => match member {
            Value::Map(_) | Value::Null => Ok(member.clone()),
            other => Err(MemberFailure::shape("map", other.type_name())),
        },
        TypeKind::Array(element) => match member {
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(value_member(item, element)?);
                }
                Ok(Value::Array(out))
            }
            Value::Null => Ok(Value::Null),
            other => Err(MemberFailure::shape("array", other.type_name())),
        },
        TypeKind::Record(fields) => match member {
            Value::Map(m) => map_value_fields(m, fields)
                .map(|values| Value::Record(RecordValue::new(ty.clone(), values)))
                .map_err(MemberFailure::Nested),
            Value::Record(rec) if structurally_equivalent(&rec.descriptor, ty) => {
                let values = rec.fields[..fields.len()].to_vec();
                Ok(Value::Record(RecordValue::new(ty.clone(), values)))
            }
            Value::Null => Ok(Value::Null),
            other => Err(MemberFailure::shape("json-object", other.type_name())),
        },
    }
}
