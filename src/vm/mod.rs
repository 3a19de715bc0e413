mod convert;
mod loader;
mod natives;
mod pool;
mod types;
mod value;

pub use convert::{Converted, ConversionError, cast, force_cast, map_to_record, to_json, zero_value};
pub use loader::{FormatError, MAGIC, VERSION, deserialize, read_program, serialize, write_program};
pub use natives::{AccessError, IoError, NativeResult, file_descriptor, list_files};
pub use pool::{ConstantPool, PoolEntry};
pub use types::{
    FieldDescriptor, TypeDescriptor, TypeKind, TypeRegistry, structurally_equivalent,
};
pub use value::{RecordValue, Value};

use std::collections::HashMap;
use std::sync::Arc;

/// A function exposed by a compiled package.
///
/// Functions return multiple values; that is how `(value, error)` pairs
/// surface to programs.
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub name: String,
    pub param_types: Vec<Arc<TypeDescriptor>>,
    pub return_types: Vec<Arc<TypeDescriptor>>,
    /// Whether the body is provided by the host rather than compiled code
    pub native: bool,
}

/// Per-package metadata: the function table and the type table.
#[derive(Debug, Clone)]
pub struct PackageInfo {
    name: String,
    functions: Vec<FunctionInfo>,
    function_index: HashMap<String, usize>,
    types: TypeRegistry,
    type_order: Vec<String>,
}

impl PackageInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
            function_index: HashMap::new(),
            types: TypeRegistry::new(),
            type_order: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a function, replacing any previous one with the same name.
    pub fn add_function(&mut self, info: FunctionInfo) {
        if let Some(&index) = self.function_index.get(&info.name) {
            self.functions[index] = info;
        } else {
            self.function_index
                .insert(info.name.clone(), self.functions.len());
            self.functions.push(info);
        }
    }

    pub fn get_function(&self, name: &str) -> Option<&FunctionInfo> {
        self.function_index
            .get(name)
            .map(|&index| &self.functions[index])
    }

    /// Functions in registration order.
    pub fn functions(&self) -> &[FunctionInfo] {
        &self.functions
    }

    /// Register a declared type, replacing any previous one with the
    /// same name.
    pub fn add_type(&mut self, name: impl Into<String>, ty: Arc<TypeDescriptor>) {
        let name = name.into();
        if self.types.resolve(&name).is_none() {
            self.type_order.push(name.clone());
        }
        self.types.register(name, ty);
    }

    pub fn get_type(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        self.types.resolve(name)
    }

    /// Declared type names in registration order.
    pub fn type_names(&self) -> &[String] {
        &self.type_order
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }
}

/// The runtime representation of a compiled tala program.
///
/// Assembled once while the program binary is loaded: the loader
/// validates the magic/version pair, populates the constant pool, and
/// registers each package. After loading completes the whole structure
/// is read-only shared state.
#[derive(Debug, Clone)]
pub struct Program {
    magic_value: u32,
    version: u16,
    const_pool: ConstantPool,
    packages: HashMap<String, PackageInfo>,
    // Insertion order of package names, kept for re-serialization.
    package_order: Vec<String>,
}

impl Program {
    pub fn new() -> Self {
        Self {
            magic_value: u32::from_be_bytes(*MAGIC),
            version: VERSION,
            const_pool: ConstantPool::new(),
            packages: HashMap::new(),
            package_order: Vec::new(),
        }
    }

    pub fn magic_value(&self) -> u32 {
        self.magic_value
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn const_pool(&self) -> &ConstantPool {
        &self.const_pool
    }

    pub fn const_pool_mut(&mut self) -> &mut ConstantPool {
        &mut self.const_pool
    }

    /// Register a package under a name, overwriting silently if the name
    /// already exists. A replaced package keeps its original position.
    pub fn add_package(&mut self, name: impl Into<String>, info: PackageInfo) {
        let name = name.into();
        if !self.packages.contains_key(&name) {
            self.package_order.push(name.clone());
        }
        self.packages.insert(name, info);
    }

    pub fn get_package(&self, name: &str) -> Option<&PackageInfo> {
        self.packages.get(name)
    }

    /// Package names in first-registration order.
    pub fn package_names(&self) -> &[String] {
        &self.package_order
    }

    /// Packages in first-registration order.
    pub fn packages(&self) -> impl Iterator<Item = &PackageInfo> {
        self.package_order
            .iter()
            .filter_map(|name| self.packages.get(name))
    }

    /// Resolve a package-qualified type name (`package:Type`).
    pub fn resolve_type(&self, package: &str, name: &str) -> Option<Arc<TypeDescriptor>> {
        self.get_package(package)?.get_type(name)
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_function(name: &str) -> FunctionInfo {
        FunctionInfo {
            name: name.to_string(),
            param_types: vec![TypeDescriptor::int()],
            return_types: vec![TypeDescriptor::string(), ConversionError::descriptor()],
            native: false,
        }
    }

    #[test]
    fn test_magic_and_version_are_exposed() {
        let program = Program::new();
        assert_eq!(program.magic_value(), u32::from_be_bytes(*MAGIC));
        assert_eq!(program.version(), VERSION);
    }

    #[test]
    fn test_add_package_last_write_wins() {
        let mut program = Program::new();
        let mut first = PackageInfo::new("demo");
        first.add_function(sample_function("f"));
        program.add_package("demo", first);

        let replacement = PackageInfo::new("demo");
        program.add_package("demo", replacement);

        let info = program.get_package("demo").unwrap();
        assert!(info.get_function("f").is_none());
        assert_eq!(program.package_names(), ["demo".to_string()]);
    }

    #[test]
    fn test_package_order_preserved() {
        let mut program = Program::new();
        program.add_package("b", PackageInfo::new("b"));
        program.add_package("a", PackageInfo::new("a"));
        program.add_package("b", PackageInfo::new("b"));
        let names: Vec<_> = program.packages().map(|p| p.name().to_string()).collect();
        assert_eq!(names, ["b", "a"]);
    }

    #[test]
    fn test_get_absent_package() {
        let program = Program::new();
        assert!(program.get_package("missing").is_none());
    }

    #[test]
    fn test_function_replacement_keeps_position() {
        let mut info = PackageInfo::new("demo");
        info.add_function(sample_function("f"));
        info.add_function(sample_function("g"));
        let mut replacement = sample_function("f");
        replacement.native = true;
        info.add_function(replacement);

        assert_eq!(info.functions().len(), 2);
        assert_eq!(info.functions()[0].name, "f");
        assert!(info.functions()[0].native);
        assert!(info.get_function("f").unwrap().native);
    }

    #[test]
    fn test_resolve_type_through_package() {
        let mut info = PackageInfo::new("demo.types");
        info.add_type("Person", TypeDescriptor::record("Person", vec![]));
        let mut program = Program::new();
        program.add_package("demo.types", info);

        assert_eq!(
            program.resolve_type("demo.types", "Person").unwrap().name(),
            "Person"
        );
        assert!(program.resolve_type("demo.types", "Missing").is_none());
        assert!(program.resolve_type("missing", "Person").is_none());
    }
}
