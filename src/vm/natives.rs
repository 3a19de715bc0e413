//! Native function boundary.
//!
//! Native functions consume already-constructed values and produce new
//! values; failures come back as a pair of optional error halves rather
//! than panics, mirroring how conversion errors travel as values. At
//! most one half of the pair is present.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use super::types::{FieldDescriptor, TypeDescriptor};
use super::value::{RecordValue, Value};

/// Access-denied half of a native result.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessError {
    pub message: String,
}

/// I/O half of a native result.
#[derive(Debug, Clone, PartialEq)]
pub struct IoError {
    pub message: String,
}

/// The triple produced by filesystem natives.
pub type NativeResult = (Value, Option<AccessError>, Option<IoError>);

/// The record type of a file handle: `File { path: string }`.
pub fn file_descriptor() -> Arc<TypeDescriptor> {
    static DESCRIPTOR: OnceLock<Arc<TypeDescriptor>> = OnceLock::new();
    DESCRIPTOR
        .get_or_init(|| {
            TypeDescriptor::record(
                "File",
                vec![FieldDescriptor::new("path", TypeDescriptor::string())],
            )
        })
        .clone()
}

fn file_record(path: &Path) -> Value {
    Value::Record(RecordValue::new(
        file_descriptor(),
        vec![Value::Str(path.display().to_string())],
    ))
}

/// List the files in a directory as an array of `File` records.
///
/// Entries are sorted by path so the result is stable across runs.
pub fn list_files(dir: &Path) -> NativeResult {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            return (
                Value::Null,
                Some(AccessError {
                    message: format!(
                        "Permission denied. Could not open directory: {}",
                        dir.display()
                    ),
                }),
                None,
            );
        }
        Err(_) => {
            return (
                Value::Null,
                None,
                Some(IoError {
                    message: format!("Error occurred while opening directory: {}", dir.display()),
                }),
            );
        }
    };

    let mut paths = Vec::new();
    for entry in entries {
        match entry {
            Ok(entry) => paths.push(entry.path()),
            Err(_) => {
                return (
                    Value::Null,
                    None,
                    Some(IoError {
                        message: format!(
                            "Error occurred while opening directory: {}",
                            dir.display()
                        ),
                    }),
                );
            }
        }
    }
    paths.sort();

    let files = paths.iter().map(|p| file_record(p)).collect();
    (Value::Array(files), None, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn test_list_files_returns_file_records() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("a.txt")).unwrap();
        File::create(dir.path().join("b.txt")).unwrap();

        let (value, access, io) = list_files(dir.path());
        assert!(access.is_none());
        assert!(io.is_none());

        let Value::Array(files) = value else {
            panic!("expected an array of file records");
        };
        assert_eq!(files.len(), 2);
        let first = files[0].as_record().unwrap();
        assert_eq!(first.type_name(), "File");
        let path = first.field("path").unwrap().as_str().unwrap();
        assert!(path.ends_with("a.txt"));
    }

    #[test]
    fn test_list_files_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-dir");

        let (value, access, io) = list_files(&missing);
        assert_eq!(value, Value::Null);
        assert!(access.is_none());
        let io = io.unwrap();
        assert_eq!(
            io.message,
            format!(
                "Error occurred while opening directory: {}",
                missing.display()
            )
        );
    }
}
