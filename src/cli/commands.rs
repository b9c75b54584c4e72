use std::io::Write;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use codegraph::error::{CodegraphError, Result};
use codegraph::loader::{LoadOutcome, ModuleStatus, PackageLoadPipeline};
use codegraph::TargetDirectory;

#[derive(Parser)]
#[command(name = "codegraph")]
#[command(about = "Load the package structure of a Go codebase using tree-sitter")]
#[command(version)]
#[command(after_long_help = r#"
EXAMPLES:
    # Parse the current directory
    codegraph parse --output graph.graphml

    # Parse a specific module including its test files
    codegraph parse ./service --output graph.graphml --include-tests

    # Print the package summary as JSON
    codegraph parse --output graph.graphml --format json
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load and summarise the Go packages below a directory
    Parse(ParseArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ParseArgs {
    /// Directory to parse (defaults to the current directory)
    pub directory: Option<String>,

    /// Output file path
    #[arg(long)]
    pub output: String,

    /// Include test files in parsing
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = false,
        default_missing_value = "true"
    )]
    pub include_tests: bool,

    /// Report format written to stdout
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// A validated `parse` invocation.
#[derive(Debug, Clone)]
pub struct ParseCommand {
    pub target_directory: TargetDirectory,
    pub output_file: String,
    pub include_tests: bool,
    pub format: OutputFormat,
}

impl ParseCommand {
    pub fn from_args(args: ParseArgs) -> Result<Self> {
        let target_directory = TargetDirectory::resolve(args.directory.as_deref().unwrap_or(""))?;

        let command = Self {
            target_directory,
            output_file: args.output,
            include_tests: args.include_tests,
            format: args.format,
        };
        command.validate()?;

        Ok(command)
    }

    pub fn validate(&self) -> Result<()> {
        if self.output_file.is_empty() {
            return Err(CodegraphError::InvalidArguments(
                "--output flag requires a file path".to_string(),
            ));
        }
        Ok(())
    }

    pub fn execute(&self) -> Result<()> {
        let outcome = PackageLoadPipeline::new().load(&self.target_directory, self.include_tests)?;

        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        self.write_report(&outcome, &mut out)?;

        let parse_errors = outcome.package_error_count();
        if parse_errors > 0 {
            eprintln!("Encountered {} parse errors", parse_errors);
        }

        Ok(())
    }

    pub fn write_report<W: Write>(&self, outcome: &LoadOutcome, out: &mut W) -> Result<()> {
        match self.format {
            OutputFormat::Text => write_text_report(outcome, out),
            OutputFormat::Json => {
                let report = ParseReport::from_outcome(outcome);
                let json = serde_json::to_string_pretty(&report)
                    .map_err(|e| CodegraphError::Io(std::io::Error::other(e)))?;
                writeln!(out, "{}", json)?;
                Ok(())
            }
        }
    }
}

fn write_text_report<W: Write>(outcome: &LoadOutcome, out: &mut W) -> Result<()> {
    for package in &outcome.packages {
        writeln!(out, "\nPackage: {}", package.pkg_path)?;
        writeln!(out, "  Name: {}", package.name)?;
        writeln!(out, "  Files ({}):", package.go_files.len())?;
        for file in &package.go_files {
            writeln!(out, "    - {}", file.display())?;
        }
        if package.has_errors() {
            writeln!(out, "  Errors: {}", package.errors.len())?;
        }
    }

    writeln!(out)?;
    match outcome.module() {
        ModuleStatus::Resolved(module) => writeln!(out, "Module: {}", module.path)?,
        ModuleStatus::Ambiguous(paths) => writeln!(out, "Module: ambiguous ({})", paths.join(", "))?,
        ModuleStatus::Undetermined => {}
    }
    writeln!(
        out,
        "Loaded {} packages, parsed {} files",
        outcome.len(),
        outcome.total_files()
    )?;

    Ok(())
}

#[derive(Debug, Serialize)]
pub struct ParseReport {
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ambiguous_modules: Vec<String>,
    pub packages: Vec<PackageSummary>,
    pub total_files: usize,
    pub error_count: usize,
}

#[derive(Debug, Serialize)]
pub struct PackageSummary {
    pub path: String,
    pub name: String,
    pub files: Vec<String>,
    pub imports: Vec<String>,
    pub errors: Vec<String>,
}

impl ParseReport {
    pub fn from_outcome(outcome: &LoadOutcome) -> Self {
        let (module, ambiguous_modules) = match outcome.module() {
            ModuleStatus::Resolved(module) => (Some(module.path), Vec::new()),
            ModuleStatus::Ambiguous(paths) => (None, paths),
            ModuleStatus::Undetermined => (None, Vec::new()),
        };

        let packages = outcome
            .packages
            .iter()
            .map(|p| PackageSummary {
                path: p.pkg_path.clone(),
                name: p.name.clone(),
                files: p.go_files.iter().map(|f| f.display().to_string()).collect(),
                imports: p.imports.clone(),
                errors: p.errors.iter().map(|e| e.to_string()).collect(),
            })
            .collect();

        Self {
            module,
            ambiguous_modules,
            packages,
            total_files: outcome.total_files(),
            error_count: outcome.error_count,
        }
    }
}
