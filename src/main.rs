//! flowforge CLI - workflow compiler

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use flowforge::compiler::{self, CompileOptions};
use flowforge::error::{CompileError, FixSuggestion};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "flowforge")]
#[command(about = "Compile agentic workflow files into CI automation graphs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a workflow file into its lock file
    Compile {
        /// Path to a .flow.md file
        file: PathBuf,

        /// Output path (default: <name>.lock.yml next to the source)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Stop dispatch-target validation at the first failure
        #[arg(long)]
        fail_fast: bool,

        /// Directory scanned for sibling workflows
        #[arg(long)]
        workflows_dir: Option<PathBuf>,
    },

    /// Compile every .flow.md file under a directory
    CompileAll {
        /// Directory to scan recursively
        dir: PathBuf,

        /// Stop dispatch-target validation at the first failure
        #[arg(long)]
        fail_fast: bool,
    },

    /// Compile without writing, report what would be generated
    Validate {
        /// Path to a .flow.md file
        file: PathBuf,

        /// Stop dispatch-target validation at the first failure
        #[arg(long)]
        fail_fast: bool,
    },

    /// Print the agent-facing tool catalog as JSON
    Tools {
        /// Path to a .flow.md file
        file: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile {
            file,
            out,
            fail_fast,
            workflows_dir,
        } => compile(&file, out, fail_fast, workflows_dir).map_err(anyhow::Error::from),
        Commands::CompileAll { dir, fail_fast } => compile_all(&dir, fail_fast),
        Commands::Validate { file, fail_fast } => {
            validate(&file, fail_fast).map_err(anyhow::Error::from)
        }
        Commands::Tools { file } => tools(&file).map_err(anyhow::Error::from),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        if let Some(suggestion) = e
            .downcast_ref::<CompileError>()
            .and_then(FixSuggestion::fix_suggestion)
        {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

/// Batch mode: each document compiles independently; the first
/// failure aborts with the failing file named.
fn compile_all(dir: &Path, fail_fast: bool) -> anyhow::Result<()> {
    let mut compiled = 0usize;
    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if !entry.file_type().is_file()
            || !path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".flow.md"))
        {
            continue;
        }
        compile(&path.to_path_buf(), None, fail_fast, None)
            .with_context(|| format!("while compiling {}", path.display()))?;
        compiled += 1;
    }
    println!(
        "{} {} workflow(s) compiled under {}",
        "✓".green().bold(),
        compiled,
        dir.display()
    );
    Ok(())
}

fn compile(
    file: &PathBuf,
    out: Option<PathBuf>,
    fail_fast: bool,
    workflows_dir: Option<PathBuf>,
) -> Result<(), CompileError> {
    let options = CompileOptions {
        fail_fast,
        workflows_dir,
    };
    let compiled = compiler::compile_file(file, &options)?;
    let target = out.unwrap_or_else(|| compiler::lock_path(file));
    std::fs::write(&target, compiled.to_yaml()?)?;

    println!(
        "{} Compiled {} ({} jobs, {} tools) → {}",
        "✓".green().bold(),
        compiled.data.name.cyan().bold(),
        compiled.jobs.len(),
        compiled.tools.len(),
        target.display()
    );
    Ok(())
}

fn validate(file: &PathBuf, fail_fast: bool) -> Result<(), CompileError> {
    let options = CompileOptions {
        fail_fast,
        ..Default::default()
    };
    let compiled = compiler::compile_file(file, &options)?;

    println!(
        "{} {} is valid",
        "✓".green().bold(),
        compiled.data.name.cyan().bold()
    );
    println!("  engine: {}", compiled.data.engine);
    println!("  jobs:");
    for job in &compiled.jobs {
        let perms = job.permissions.to_lines().join(", ");
        if perms.is_empty() {
            println!("    - {}", job.name);
        } else {
            println!("    - {} ({})", job.name, perms);
        }
    }
    if !compiled.tools.is_empty() {
        println!(
            "  tools: {}",
            compiled
                .tools
                .iter()
                .map(|t| t.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    Ok(())
}

fn tools(file: &PathBuf) -> Result<(), CompileError> {
    let compiled = compiler::compile_file(file, &CompileOptions::default())?;
    println!("{}", compiled.tool_catalog_json());
    Ok(())
}
