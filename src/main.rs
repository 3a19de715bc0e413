use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use tala::config::{LoadConfig, OutputFormat};
use tala::vm::{self, Program};
use tala::project;

// Wrapper type for clap ValueEnum support
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormatArg {
    #[default]
    Human,
    Json,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(Parser)]
#[command(name = "tala")]
#[command(about = "Runtime core for the tala virtual machine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new tala project
    Init {
        /// Project name (defaults to directory name)
        name: Option<String>,
    },
    /// Inspect a compiled program file
    Inspect {
        /// The program file to inspect
        file: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormatArg,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { name } => {
            let dir = match std::env::current_dir() {
                Ok(dir) => dir,
                Err(e) => {
                    eprintln!("error: cannot determine current directory: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            match project::init_project(&dir, name.as_deref()) {
                Ok(()) => {
                    println!("Initialized tala project in {}", dir.display());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("error: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Inspect { file, format } => inspect(&file, format.into()),
    }
}

fn inspect(file: &PathBuf, format: OutputFormat) -> ExitCode {
    let data = match fs::read(file) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("error: failed to read '{}': {}", file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let program = match vm::read_program(&mut std::io::Cursor::new(data), &LoadConfig::default()) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("error: failed to load '{}': {}", file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    match format {
        OutputFormat::Human => print_human(&program),
        OutputFormat::Json => print_json(&program),
    }
    ExitCode::SUCCESS
}

fn print_human(program: &Program) {
    println!(
        "program file: magic 0x{:08X}, version {}",
        program.magic_value(),
        program.version()
    );

    println!("constant pool ({} entries):", program.const_pool().len());
    for (index, entry) in program.const_pool().entries().iter().enumerate() {
        println!("  #{:<4} {}", index, entry);
    }

    for package in program.packages() {
        println!("package {}:", package.name());
        for name in package.type_names() {
            println!("  type {}", name);
        }
        for function in package.functions() {
            let params: Vec<_> = function
                .param_types
                .iter()
                .map(|t| t.name().to_string())
                .collect();
            let returns: Vec<_> = function
                .return_types
                .iter()
                .map(|t| t.name().to_string())
                .collect();
            let marker = if function.native { " [native]" } else { "" };
            println!(
                "  function {}({}) -> ({}){}",
                function.name,
                params.join(", "),
                returns.join(", "),
                marker
            );
        }
    }
}

fn print_json(program: &Program) {
    let packages: Vec<_> = program
        .packages()
        .map(|package| {
            serde_json::json!({
                "name": package.name(),
                "types": package.type_names(),
                "functions": package
                    .functions()
                    .iter()
                    .map(|f| {
                        serde_json::json!({
                            "name": f.name,
                            "params": f.param_types.iter().map(|t| t.name()).collect::<Vec<_>>(),
                            "returns": f.return_types.iter().map(|t| t.name()).collect::<Vec<_>>(),
                            "native": f.native,
                        })
                    })
                    .collect::<Vec<_>>(),
            })
        })
        .collect();

    let summary = serde_json::json!({
        "magic": format!("0x{:08X}", program.magic_value()),
        "version": program.version(),
        "constantPool": program
            .const_pool()
            .entries()
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>(),
        "packages": packages,
    });

    println!("{}", serde_json::to_string_pretty(&summary).unwrap_or_default());
}
