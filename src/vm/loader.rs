//! Program-file serialization/deserialization for tala.
//!
//! Binary format:
//! - Magic: "TALC" (4 bytes)
//! - Version: u16 (little-endian)
//! - Constant pool: entry count + tagged entries
//! - Packages, in registration order: name, type table, function table
//!
//! The magic/version pair is validated before anything else is read; a
//! mismatch is fatal and aborts the load.

use std::io::{self, Read, Write};
use std::sync::Arc;

use crate::config::LoadConfig;

use super::pool::PoolEntry;
use super::types::{FieldDescriptor, TypeDescriptor, TypeKind};
use super::{FunctionInfo, PackageInfo, Program};

/// Magic bytes for tala program files
pub const MAGIC: &[u8; 4] = b"TALC";

/// Current program file format version
pub const VERSION: u16 = 1;

/// Error type for program-file operations
#[derive(Debug)]
pub enum FormatError {
    /// Invalid magic number
    InvalidMagic,
    /// Unsupported format version
    UnsupportedVersion(u16),
    /// Truncated data
    UnexpectedEof,
    /// Invalid UTF-8 in string
    InvalidUtf8,
    /// Invalid constant pool entry tag
    InvalidEntryTag(u8),
    /// Invalid type descriptor tag
    InvalidTypeTag(u8),
    /// Constant pool entry count exceeds the configured limit
    PoolTooLarge(usize),
    /// String length exceeds the configured limit
    StringTooLong(usize),
    /// I/O error
    Io(io::Error),
}

impl From<io::Error> for FormatError {
    fn from(e: io::Error) -> Self {
        FormatError::Io(e)
    }
}

impl std::fmt::Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatError::InvalidMagic => write!(f, "invalid magic number"),
            FormatError::UnsupportedVersion(v) => write!(f, "unsupported version: {}", v),
            FormatError::UnexpectedEof => write!(f, "unexpected end of file"),
            FormatError::InvalidUtf8 => write!(f, "invalid UTF-8 string"),
            FormatError::InvalidEntryTag(tag) => write!(f, "invalid constant pool tag: {}", tag),
            FormatError::InvalidTypeTag(tag) => write!(f, "invalid type descriptor tag: {}", tag),
            FormatError::PoolTooLarge(count) => {
                write!(f, "constant pool too large: {} entries", count)
            }
            FormatError::StringTooLong(len) => write!(f, "string too long: {} bytes", len),
            FormatError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for FormatError {}

/// Serialize a Program to bytes
pub fn serialize(program: &Program) -> Vec<u8> {
    let mut buf = Vec::new();
    write_program(&mut buf, program).expect("writing to Vec cannot fail");
    buf
}

/// Deserialize a Program from bytes with default load guards
pub fn deserialize(data: &[u8]) -> Result<Program, FormatError> {
    let mut cursor = io::Cursor::new(data);
    read_program(&mut cursor, &LoadConfig::default())
}

/// Write a Program to a writer
pub fn write_program<W: Write>(w: &mut W, program: &Program) -> io::Result<()> {
    // Magic
    w.write_all(MAGIC)?;

    // Version
    w.write_all(&program.version().to_le_bytes())?;

    // Constant pool
    write_u32(w, program.const_pool().len() as u32)?;
    for entry in program.const_pool().entries() {
        write_entry(w, entry)?;
    }

    // Packages, in registration order
    write_u32(w, program.package_names().len() as u32)?;
    for package in program.packages() {
        write_package(w, package)?;
    }

    Ok(())
}

/// Read a Program from a reader
pub fn read_program<R: Read>(r: &mut R, config: &LoadConfig) -> Result<Program, FormatError> {
    // Magic
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)
        .map_err(|_| FormatError::UnexpectedEof)?;
    if &magic != MAGIC {
        return Err(FormatError::InvalidMagic);
    }

    // Version
    let version = read_u16(r)?;
    if version != VERSION {
        return Err(FormatError::UnsupportedVersion(version));
    }

    let mut program = Program::new();

    // Constant pool
    let entry_count = read_u32(r)? as usize;
    if entry_count > config.max_pool_entries {
        return Err(FormatError::PoolTooLarge(entry_count));
    }
    for _ in 0..entry_count {
        let entry = read_entry(r, config)?;
        program.const_pool_mut().add(entry);
    }

    // Packages
    let package_count = read_u32(r)? as usize;
    for _ in 0..package_count {
        let package = read_package(r, config)?;
        program.add_package(package.name().to_string(), package);
    }

    Ok(program)
}

// Constant pool entry tags
const ENTRY_UTF8: u8 = 0;
const ENTRY_INT: u8 = 1;
const ENTRY_FLOAT: u8 = 2;
const ENTRY_TYPE_REF: u8 = 3;
const ENTRY_FUNCTION_REF: u8 = 4;
const ENTRY_PACKAGE_REF: u8 = 5;

fn write_entry<W: Write>(w: &mut W, entry: &PoolEntry) -> io::Result<()> {
    match entry {
        PoolEntry::Utf8(s) => {
            w.write_all(&[ENTRY_UTF8])?;
            write_string(w, s)?;
        }
        PoolEntry::Int(v) => {
            w.write_all(&[ENTRY_INT])?;
            write_i64(w, *v)?;
        }
        PoolEntry::Float(v) => {
            w.write_all(&[ENTRY_FLOAT])?;
            write_f64(w, *v)?;
        }
        PoolEntry::TypeRef(name) => {
            w.write_all(&[ENTRY_TYPE_REF])?;
            write_string(w, name)?;
        }
        PoolEntry::FunctionRef { package, name } => {
            w.write_all(&[ENTRY_FUNCTION_REF])?;
            write_string(w, package)?;
            write_string(w, name)?;
        }
        PoolEntry::PackageRef(name) => {
            w.write_all(&[ENTRY_PACKAGE_REF])?;
            write_string(w, name)?;
        }
    }
    Ok(())
}

fn read_entry<R: Read>(r: &mut R, config: &LoadConfig) -> Result<PoolEntry, FormatError> {
    let tag = read_u8(r)?;
    let entry = match tag {
        ENTRY_UTF8 => PoolEntry::Utf8(read_string(r, config)?),
        ENTRY_INT => PoolEntry::Int(read_i64(r)?),
        ENTRY_FLOAT => PoolEntry::Float(read_f64(r)?),
        ENTRY_TYPE_REF => PoolEntry::TypeRef(read_string(r, config)?),
        ENTRY_FUNCTION_REF => PoolEntry::FunctionRef {
            package: read_string(r, config)?,
            name: read_string(r, config)?,
        },
        ENTRY_PACKAGE_REF => PoolEntry::PackageRef(read_string(r, config)?),
        _ => return Err(FormatError::InvalidEntryTag(tag)),
    };
    Ok(entry)
}

fn write_package<W: Write>(w: &mut W, package: &PackageInfo) -> io::Result<()> {
    write_string(w, package.name())?;

    // Type table
    write_u32(w, package.type_names().len() as u32)?;
    for name in package.type_names() {
        write_string(w, name)?;
        // Registered names always resolve; the order list is kept in sync.
        if let Some(ty) = package.get_type(name) {
            write_type(w, &ty)?;
        }
    }

    // Function table
    write_u32(w, package.functions().len() as u32)?;
    for function in package.functions() {
        write_function(w, function)?;
    }

    Ok(())
}

fn read_package<R: Read>(r: &mut R, config: &LoadConfig) -> Result<PackageInfo, FormatError> {
    let name = read_string(r, config)?;
    let mut package = PackageInfo::new(name);

    let type_count = read_u32(r)? as usize;
    for _ in 0..type_count {
        let type_name = read_string(r, config)?;
        let ty = read_type(r, config)?;
        package.add_type(type_name, ty);
    }

    let function_count = read_u32(r)? as usize;
    for _ in 0..function_count {
        package.add_function(read_function(r, config)?);
    }

    Ok(package)
}

fn write_function<W: Write>(w: &mut W, function: &FunctionInfo) -> io::Result<()> {
    write_string(w, &function.name)?;
    w.write_all(&[function.native as u8])?;

    write_u32(w, function.param_types.len() as u32)?;
    for ty in &function.param_types {
        write_type(w, ty)?;
    }

    write_u32(w, function.return_types.len() as u32)?;
    for ty in &function.return_types {
        write_type(w, ty)?;
    }

    Ok(())
}

fn read_function<R: Read>(r: &mut R, config: &LoadConfig) -> Result<FunctionInfo, FormatError> {
    let name = read_string(r, config)?;
    let native = read_u8(r)? != 0;

    let param_count = read_u32(r)? as usize;
    let mut param_types = Vec::with_capacity(param_count);
    for _ in 0..param_count {
        param_types.push(read_type(r, config)?);
    }

    let return_count = read_u32(r)? as usize;
    let mut return_types = Vec::with_capacity(return_count);
    for _ in 0..return_count {
        return_types.push(read_type(r, config)?);
    }

    Ok(FunctionInfo {
        name,
        native,
        param_types,
        return_types,
    })
}

// Type descriptor tags
const TYPE_INT: u8 = 0;
const TYPE_FLOAT: u8 = 1;
const TYPE_BOOLEAN: u8 = 2;
const TYPE_STRING: u8 = 3;
const TYPE_MAP: u8 = 4;
const TYPE_JSON: u8 = 5;
const TYPE_ANY: u8 = 6;
const TYPE_ARRAY: u8 = 7;
const TYPE_RECORD: u8 = 8;

fn write_type<W: Write>(w: &mut W, ty: &TypeDescriptor) -> io::Result<()> {
    match ty.kind() {
        TypeKind::Int => w.write_all(&[TYPE_INT])?,
        TypeKind::Float => w.write_all(&[TYPE_FLOAT])?,
        TypeKind::Boolean => w.write_all(&[TYPE_BOOLEAN])?,
        TypeKind::String => w.write_all(&[TYPE_STRING])?,
        TypeKind::Map => w.write_all(&[TYPE_MAP])?,
        TypeKind::Json => w.write_all(&[TYPE_JSON])?,
        TypeKind::Any => w.write_all(&[TYPE_ANY])?,
        TypeKind::Array(element) => {
            w.write_all(&[TYPE_ARRAY])?;
            write_type(w, element)?;
        }
        TypeKind::Record(fields) => {
            w.write_all(&[TYPE_RECORD])?;
            write_string(w, ty.name())?;
            write_u32(w, fields.len() as u32)?;
            for field in fields {
                write_string(w, &field.name)?;
                write_type(w, &field.ty)?;
            }
        }
    }
    Ok(())
}

fn read_type<R: Read>(r: &mut R, config: &LoadConfig) -> Result<Arc<TypeDescriptor>, FormatError> {
    let tag = read_u8(r)?;
    let ty = match tag {
        TYPE_INT => TypeDescriptor::int(),
        TYPE_FLOAT => TypeDescriptor::float(),
        TYPE_BOOLEAN => TypeDescriptor::boolean(),
        TYPE_STRING => TypeDescriptor::string(),
        TYPE_MAP => TypeDescriptor::map(),
        TYPE_JSON => TypeDescriptor::json(),
        TYPE_ANY => TypeDescriptor::any(),
        TYPE_ARRAY => TypeDescriptor::array(read_type(r, config)?),
        TYPE_RECORD => {
            let name = read_string(r, config)?;
            let field_count = read_u32(r)? as usize;
            let mut fields = Vec::with_capacity(field_count);
            for _ in 0..field_count {
                let field_name = read_string(r, config)?;
                fields.push(FieldDescriptor::new(field_name, read_type(r, config)?));
            }
            TypeDescriptor::record(name, fields)
        }
        _ => return Err(FormatError::InvalidTypeTag(tag)),
    };
    Ok(ty)
}

// Helper functions for reading/writing primitives

fn read_u8<R: Read>(r: &mut R) -> Result<u8, FormatError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)
        .map_err(|_| FormatError::UnexpectedEof)?;
    Ok(buf[0])
}

fn read_u16<R: Read>(r: &mut R) -> Result<u16, FormatError> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)
        .map_err(|_| FormatError::UnexpectedEof)?;
    Ok(u16::from_le_bytes(buf))
}

fn write_u32<W: Write>(w: &mut W, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32, FormatError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)
        .map_err(|_| FormatError::UnexpectedEof)?;
    Ok(u32::from_le_bytes(buf))
}

fn write_i64<W: Write>(w: &mut W, v: i64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn read_i64<R: Read>(r: &mut R) -> Result<i64, FormatError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)
        .map_err(|_| FormatError::UnexpectedEof)?;
    Ok(i64::from_le_bytes(buf))
}

fn write_f64<W: Write>(w: &mut W, v: f64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn read_f64<R: Read>(r: &mut R) -> Result<f64, FormatError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)
        .map_err(|_| FormatError::UnexpectedEof)?;
    Ok(f64::from_le_bytes(buf))
}

fn write_string<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    write_u32(w, s.len() as u32)?;
    w.write_all(s.as_bytes())
}

fn read_string<R: Read>(r: &mut R, config: &LoadConfig) -> Result<String, FormatError> {
    let len = read_u32(r)? as usize;
    if len > config.max_string_bytes {
        return Err(FormatError::StringTooLong(len));
    }
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)
        .map_err(|_| FormatError::UnexpectedEof)?;
    String::from_utf8(buf).map_err(|_| FormatError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_program() -> Program {
        let mut program = Program::new();
        program
            .const_pool_mut()
            .add(PoolEntry::Utf8("hello".to_string()));
        program.const_pool_mut().add(PoolEntry::Int(42));
        program
            .const_pool_mut()
            .add(PoolEntry::Float(std::f64::consts::PI));
        program.const_pool_mut().add(PoolEntry::FunctionRef {
            package: "demo".to_string(),
            name: "main".to_string(),
        });

        let person = TypeDescriptor::record(
            "Person",
            vec![
                FieldDescriptor::new("name", TypeDescriptor::string()),
                FieldDescriptor::new("parent", TypeDescriptor::json()),
                FieldDescriptor::new(
                    "scores",
                    TypeDescriptor::array(TypeDescriptor::int()),
                ),
            ],
        );

        let mut types_pkg = PackageInfo::new("demo.types");
        types_pkg.add_type("Person", person.clone());

        let mut main_pkg = PackageInfo::new("demo");
        main_pkg.add_function(FunctionInfo {
            name: "main".to_string(),
            param_types: vec![],
            return_types: vec![person, TypeDescriptor::any()],
            native: false,
        });
        main_pkg.add_function(FunctionInfo {
            name: "list".to_string(),
            param_types: vec![TypeDescriptor::string()],
            return_types: vec![TypeDescriptor::array(TypeDescriptor::string())],
            native: true,
        });

        program.add_package("demo.types", types_pkg);
        program.add_package("demo", main_pkg);
        program
    }

    #[test]
    fn test_roundtrip_preserves_pool_indices() {
        let program = sample_program();
        let bytes = serialize(&program);
        let restored = deserialize(&bytes).unwrap();

        assert_eq!(restored.const_pool().len(), program.const_pool().len());
        for (index, entry) in program.const_pool().entries().iter().enumerate() {
            assert_eq!(restored.const_pool().index_of(entry), Some(index));
        }
    }

    #[test]
    fn test_roundtrip_preserves_package_order() {
        let program = sample_program();
        let restored = deserialize(&serialize(&program)).unwrap();
        assert_eq!(
            restored.package_names(),
            ["demo.types".to_string(), "demo".to_string()]
        );
    }

    #[test]
    fn test_roundtrip_preserves_tables() {
        let program = sample_program();
        let restored = deserialize(&serialize(&program)).unwrap();

        let person = restored.resolve_type("demo.types", "Person").unwrap();
        assert_eq!(person.name(), "Person");
        assert_eq!(person.fields().unwrap().len(), 3);
        assert_eq!(person.field("scores").unwrap().ty.name(), "int[]");

        let main = restored.get_package("demo").unwrap();
        let function = main.get_function("main").unwrap();
        assert_eq!(function.return_types.len(), 2);
        assert_eq!(function.return_types[0].name(), "Person");
        assert!(main.get_function("list").unwrap().native);
    }

    #[test]
    fn test_roundtrip_version() {
        let restored = deserialize(&serialize(&Program::new())).unwrap();
        assert_eq!(restored.version(), VERSION);
        assert_eq!(restored.magic_value(), u32::from_be_bytes(*MAGIC));
    }

    #[test]
    fn test_invalid_magic() {
        let data = b"BADC\x01\x00";
        assert!(matches!(
            deserialize(data),
            Err(FormatError::InvalidMagic)
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let data = b"TALC\xff\x00";
        assert!(matches!(
            deserialize(data),
            Err(FormatError::UnsupportedVersion(255))
        ));
    }

    #[test]
    fn test_truncated_data() {
        let bytes = serialize(&sample_program());
        let result = deserialize(&bytes[..bytes.len() - 3]);
        assert!(matches!(result, Err(FormatError::UnexpectedEof)));
    }

    #[test]
    fn test_pool_limit_enforced() {
        let bytes = serialize(&sample_program());
        let config = LoadConfig {
            max_pool_entries: 2,
            ..LoadConfig::default()
        };
        let result = read_program(&mut io::Cursor::new(&bytes[..]), &config);
        assert!(matches!(result, Err(FormatError::PoolTooLarge(4))));
    }

    #[test]
    fn test_string_limit_enforced() {
        let bytes = serialize(&sample_program());
        let config = LoadConfig {
            max_string_bytes: 3,
            ..LoadConfig::default()
        };
        let result = read_program(&mut io::Cursor::new(&bytes[..]), &config);
        assert!(matches!(result, Err(FormatError::StringTooLong(5))));
    }

    #[test]
    fn test_invalid_entry_tag() {
        let mut data = Vec::new();
        data.extend_from_slice(MAGIC);
        data.extend_from_slice(&VERSION.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.push(0xff);
        assert!(matches!(
            deserialize(&data),
            Err(FormatError::InvalidEntryTag(0xff))
        ));
    }
}
