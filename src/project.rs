use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Project manifest (pkg.toml)
#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub package: PackageDecl,
    #[serde(default)]
    pub build: BuildDecl,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PackageDecl {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BuildDecl {
    /// Source entry point compiled into the program file
    #[serde(default = "default_entry")]
    pub entry: String,
    /// Compiled program file path
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for BuildDecl {
    fn default() -> Self {
        Self {
            entry: default_entry(),
            output: default_output(),
        }
    }
}

fn default_entry() -> String {
    "src/main.tala".to_string()
}

fn default_output() -> String {
    "main.talc".to_string()
}

impl ProjectManifest {
    /// Create a new project manifest with default values
    pub fn new(name: &str) -> Self {
        Self {
            package: PackageDecl {
                name: name.to_string(),
                version: "0.1.0".to_string(),
            },
            build: BuildDecl::default(),
        }
    }

    /// Load manifest from a directory
    pub fn load(dir: &Path) -> Result<Self, String> {
        let manifest_path = dir.join("pkg.toml");
        let content = fs::read_to_string(&manifest_path)
            .map_err(|e| format!("failed to read pkg.toml: {}", e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse pkg.toml: {}", e))
    }

    /// Save manifest to a directory
    pub fn save(&self, dir: &Path) -> Result<(), String> {
        let manifest_path = dir.join("pkg.toml");
        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("failed to serialize pkg.toml: {}", e))?;
        fs::write(&manifest_path, content).map_err(|e| format!("failed to write pkg.toml: {}", e))
    }
}

/// Initialize a new tala project
pub fn init_project(dir: &Path, name: Option<&str>) -> Result<(), String> {
    // Determine project name
    let project_name = name
        .map(|s| s.to_string())
        .or_else(|| dir.file_name().map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_else(|| "myproject".to_string());

    // Check if pkg.toml already exists
    let manifest_path = dir.join("pkg.toml");
    if manifest_path.exists() {
        return Err(format!("pkg.toml already exists in {}", dir.display()));
    }

    // Create directory structure
    let src_dir = dir.join("src");
    fs::create_dir_all(&src_dir).map_err(|e| format!("failed to create src directory: {}", e))?;

    // Create pkg.toml
    let manifest = ProjectManifest::new(&project_name);
    manifest.save(dir)?;

    // Create src/main.tala with hello world
    let main_tala = src_dir.join("main.tala");
    if !main_tala.exists() {
        let content = r#"// Welcome to tala!
function main() {
    println("Hello, world!");
}
"#;
        fs::write(&main_tala, content).map_err(|e| format!("failed to write main.tala: {}", e))?;
    }

    Ok(())
}
