//! Load and CLI configuration types.

/// Output format for the `inspect` command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable tables
    #[default]
    Human,
    /// Machine-readable JSON summary
    Json,
}

/// Guards applied while reading a program file.
///
/// Corrupt binaries fail fast against these limits instead of driving
/// huge allocations.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Maximum number of constant pool entries accepted
    pub max_pool_entries: usize,
    /// Maximum byte length of any string in the file
    pub max_string_bytes: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            max_pool_entries: 1 << 20,
            max_string_bytes: 1 << 24,
        }
    }
}
