//! Type descriptors for declared tala types.
//!
//! Descriptors are created once while a program is loaded and shared by
//! reference afterwards; every record value points at the descriptor of
//! its declared type.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A named field inside a record type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: Arc<TypeDescriptor>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, ty: Arc<TypeDescriptor>) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// The kind of a declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// 64-bit signed integer: `int`
    Int,
    /// IEEE 754 double: `float`
    Float,
    /// Boolean type: `boolean`
    Boolean,
    /// Text type: `string`
    String,
    /// String-keyed map with dynamically typed values: `map`
    Map,
    /// JSON document: `json`
    Json,
    /// Top type accepting every value: `any`
    Any,
    /// Array type: `array<T>`
    Array(Arc<TypeDescriptor>),
    /// Record type with ordered, named fields
    Record(Vec<FieldDescriptor>),
}

/// A declared type: a name plus its kind.
///
/// Primitive descriptors carry their canonical name (`"int"`, `"float"`,
/// ...); record descriptors carry the declared record name.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    name: String,
    kind: TypeKind,
}

impl TypeDescriptor {
    pub fn int() -> Arc<Self> {
        Arc::new(Self {
            name: "int".to_string(),
            kind: TypeKind::Int,
        })
    }

    pub fn float() -> Arc<Self> {
        Arc::new(Self {
            name: "float".to_string(),
            kind: TypeKind::Float,
        })
    }

    pub fn boolean() -> Arc<Self> {
        Arc::new(Self {
            name: "boolean".to_string(),
            kind: TypeKind::Boolean,
        })
    }

    pub fn string() -> Arc<Self> {
        Arc::new(Self {
            name: "string".to_string(),
            kind: TypeKind::String,
        })
    }

    pub fn map() -> Arc<Self> {
        Arc::new(Self {
            name: "map".to_string(),
            kind: TypeKind::Map,
        })
    }

    pub fn json() -> Arc<Self> {
        Arc::new(Self {
            name: "json".to_string(),
            kind: TypeKind::Json,
        })
    }

    pub fn any() -> Arc<Self> {
        Arc::new(Self {
            name: "any".to_string(),
            kind: TypeKind::Any,
        })
    }

    /// Create a new array type descriptor.
    pub fn array(element: Arc<TypeDescriptor>) -> Arc<Self> {
        Arc::new(Self {
            name: format!("{}[]", element.name),
            kind: TypeKind::Array(element),
        })
    }

    /// Create a new record type descriptor from ordered field definitions.
    pub fn record(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            kind: TypeKind::Record(fields),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn is_record(&self) -> bool {
        matches!(self.kind, TypeKind::Record(_))
    }

    /// The ordered field list of a record descriptor.
    pub fn fields(&self) -> Option<&[FieldDescriptor]> {
        match &self.kind {
            TypeKind::Record(fields) => Some(fields),
            _ => None,
        }
    }

    /// Look up a record field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields()?.iter().find(|f| f.name == name)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Structural width-equivalence between record types.
///
/// `target`'s field list must be a prefix of `source`'s with identical
/// names and types, in declared order. The source must be at least as
/// wide as the target; identical descriptors trivially qualify.
pub fn structurally_equivalent(source: &TypeDescriptor, target: &TypeDescriptor) -> bool {
    match (&source.kind, &target.kind) {
        (TypeKind::Record(src), TypeKind::Record(dst)) => {
            src.len() >= dst.len()
                && dst
                    .iter()
                    .zip(src.iter())
                    .all(|(d, s)| d.name == s.name && d.ty == s.ty)
        }
        _ => false,
    }
}

/// Resolves declared type names to their descriptors.
///
/// Built once per loaded program; read-only afterwards, so concurrent
/// lookups need no synchronization. Names may be package-qualified with
/// the `package:Type` form.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, Arc<TypeDescriptor>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The canonical package-qualified form of a type name.
    pub fn qualify(package: &str, name: &str) -> String {
        format!("{}:{}", package, name)
    }

    pub fn register(&mut self, name: impl Into<String>, ty: Arc<TypeDescriptor>) {
        self.types.insert(name.into(), ty);
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        self.types.get(name).cloned()
    }

    /// Whether `source` can be force-cast to `target`.
    pub fn is_equivalent(&self, source: &TypeDescriptor, target: &TypeDescriptor) -> bool {
        structurally_equivalent(source, target)
    }

    /// The declared type of a record field, if the field exists.
    pub fn field_descriptor(
        &self,
        record: &TypeDescriptor,
        name: &str,
    ) -> Option<Arc<TypeDescriptor>> {
        record.field(name).map(|f| f.ty.clone())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_a() -> Arc<TypeDescriptor> {
        TypeDescriptor::record(
            "A",
            vec![
                FieldDescriptor::new("x", TypeDescriptor::string()),
                FieldDescriptor::new("y", TypeDescriptor::int()),
            ],
        )
    }

    fn record_b() -> Arc<TypeDescriptor> {
        TypeDescriptor::record(
            "B",
            vec![
                FieldDescriptor::new("x", TypeDescriptor::string()),
                FieldDescriptor::new("y", TypeDescriptor::int()),
                FieldDescriptor::new("z", TypeDescriptor::float()),
            ],
        )
    }

    #[test]
    fn test_prefix_equivalence() {
        // B carries all of A's fields first, so B force-casts to A.
        assert!(structurally_equivalent(&record_b(), &record_a()));
        assert!(!structurally_equivalent(&record_a(), &record_b()));
    }

    #[test]
    fn test_identical_records_are_equivalent() {
        assert!(structurally_equivalent(&record_a(), &record_a()));
    }

    #[test]
    fn test_field_name_mismatch_breaks_equivalence() {
        let c = TypeDescriptor::record(
            "C",
            vec![
                FieldDescriptor::new("x", TypeDescriptor::string()),
                FieldDescriptor::new("other", TypeDescriptor::int()),
            ],
        );
        assert!(!structurally_equivalent(&c, &record_a()));
    }

    #[test]
    fn test_field_type_mismatch_breaks_equivalence() {
        let c = TypeDescriptor::record(
            "C",
            vec![
                FieldDescriptor::new("x", TypeDescriptor::string()),
                FieldDescriptor::new("y", TypeDescriptor::float()),
            ],
        );
        assert!(!structurally_equivalent(&c, &record_a()));
    }

    #[test]
    fn test_primitives_never_equivalent() {
        assert!(!structurally_equivalent(
            &TypeDescriptor::int(),
            &TypeDescriptor::int()
        ));
    }

    #[test]
    fn test_registry_resolution() {
        let mut registry = TypeRegistry::new();
        registry.register("A", record_a());
        registry.register(TypeRegistry::qualify("demo.types", "B"), record_b());

        assert_eq!(registry.resolve("A").unwrap().name(), "A");
        assert_eq!(registry.resolve("demo.types:B").unwrap().name(), "B");
        assert!(registry.resolve("missing").is_none());
    }

    #[test]
    fn test_registry_field_descriptor() {
        let registry = TypeRegistry::new();
        let a = record_a();
        let field = registry.field_descriptor(&a, "y").unwrap();
        assert_eq!(field.name(), "int");
        assert!(registry.field_descriptor(&a, "missing").is_none());
        assert!(
            registry
                .field_descriptor(&TypeDescriptor::int(), "y")
                .is_none()
        );
    }

    #[test]
    fn test_array_descriptor_name() {
        let ints = TypeDescriptor::array(TypeDescriptor::int());
        assert_eq!(ints.name(), "int[]");
    }
}
