use clap::{Parser, Subcommand};
use colored::Colorize;
use anyhow::{Context, Result};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use flowlineage_core::{Config, Report, Severity};
use flowlineage_lineage::{BatchOutcome, LineagePipeline};
use flowlineage_macro::{InteractivePolicy, MacroInventory, MacroStatus, NonInteractivePolicy, ResolutionContext};
use flowlineage_workflow::discover_workflows;

mod prompt;

use prompt::TerminalPrompt;

/// Default config file looked up in the working directory
const CONFIG_FILE: &str = "flowlineage.toml";

/// FlowLineage - Macro resolution and data lineage for ETL workflows
#[derive(Parser)]
#[command(name = "flowlineage")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: flowlineage.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve macros and build lineage graphs
    Lineage {
        /// Workflow files or directories to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Output file for the lineage graphs
        #[arg(short, long, default_value = "lineage.json")]
        output: PathBuf,

        /// Output file for report.json
        #[arg(short, long, default_value = "report.json")]
        report: PathBuf,

        /// Additional macro search directory (repeatable)
        #[arg(short = 'm', long = "macro-dir")]
        macro_dirs: Vec<PathBuf>,

        /// Never prompt; unlocated macros are reported as missing
        #[arg(long)]
        non_interactive: bool,
    },

    /// Resolve macros and print the macro inventory
    Macros {
        /// Workflow files or directories to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Additional macro search directory (repeatable)
        #[arg(short = 'm', long = "macro-dir")]
        macro_dirs: Vec<PathBuf>,

        /// Never prompt; unlocated macros are reported as missing
        #[arg(long)]
        non_interactive: bool,

        /// Also write report.json here
        #[arg(short, long)]
        report: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Load config if specified
    let config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else if Path::new(CONFIG_FILE).exists() {
        Config::from_file(Path::new(CONFIG_FILE))?
    } else {
        if cli.verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    match cli.command {
        Commands::Lineage {
            paths,
            output,
            report,
            macro_dirs,
            non_interactive,
        } => lineage_command(&config, &paths, &output, &report, &macro_dirs, non_interactive, cli.verbose),
        Commands::Macros {
            paths,
            macro_dirs,
            non_interactive,
            report,
        } => macros_command(&config, &paths, &macro_dirs, non_interactive, report.as_deref(), cli.verbose),
    }
}

/// Log to stderr; `RUST_LOG` wins over the default level
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Discover, resolve and build every workflow under `paths`
fn run_batch(
    config: &Config,
    paths: &[PathBuf],
    macro_dirs: &[PathBuf],
    non_interactive: bool,
    verbose: bool,
) -> Result<BatchOutcome> {
    let workflows = discover_workflows(paths).context("Failed to discover workflows")?;
    if workflows.is_empty() {
        anyhow::bail!("No workflow files (.yxmd, .yxwz) found");
    }

    tracing::info!(workflows = workflows.len(), "Starting lineage run");
    if verbose {
        eprintln!("{} {} workflow(s)", "Found".cyan(), workflows.len());
    }

    let mut search_dirs = config.macro_search_dirs();
    search_dirs.extend(macro_dirs.iter().cloned());
    let mut context = ResolutionContext::new(search_dirs);

    let pipeline = LineagePipeline::from_config(config);
    let interactive = config.macros.interactive && !non_interactive && std::io::stdin().is_terminal();

    let batch = if interactive {
        let mut policy = InteractivePolicy::new(TerminalPrompt::stdio());
        pipeline.run(&workflows, &mut context, &mut policy)
    } else {
        if verbose {
            eprintln!("{}", "Non-interactive: unlocated macros are reported as missing".cyan());
        }
        pipeline.run(&workflows, &mut context, &mut NonInteractivePolicy)
    };

    if verbose && context.prompts_issued() > 0 {
        eprintln!("{} {} macro prompt(s)", "Answered".cyan(), context.prompts_issued());
    }

    Ok(batch)
}

/// Lineage command - resolve macros, build and classify lineage graphs
fn lineage_command(
    config: &Config,
    paths: &[PathBuf],
    output: &Path,
    report_path: &Path,
    macro_dirs: &[PathBuf],
    non_interactive: bool,
    verbose: bool,
) -> Result<()> {
    let batch = run_batch(config, paths, macro_dirs, non_interactive, verbose)?;

    // Partial results are written even when some documents failed
    let graphs = serde_json::to_string_pretty(&batch.graphs)?;
    std::fs::write(output, graphs)
        .with_context(|| format!("Failed to write lineage graphs to {}", output.display()))?;
    if verbose {
        eprintln!("{} {}", "Lineage saved to:".green(), output.display());
    }

    let report = batch.to_report();
    report
        .save_to_file(report_path)
        .with_context(|| format!("Failed to write report to {}", report_path.display()))?;
    if verbose {
        eprintln!("{} {}", "Report saved to:".green(), report_path.display());
    }

    print_graph_summary(&batch);
    print_report_summary(&report);

    // Exit with error code if there are errors
    if report.has_errors() {
        std::process::exit(1);
    }

    Ok(())
}

/// Macros command - resolution report and macro inventory only
fn macros_command(
    config: &Config,
    paths: &[PathBuf],
    macro_dirs: &[PathBuf],
    non_interactive: bool,
    report_path: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let batch = run_batch(config, paths, macro_dirs, non_interactive, verbose)?;
    let report = batch.to_report();

    if let Some(path) = report_path {
        report
            .save_to_file(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        if verbose {
            eprintln!("{} {}", "Report saved to:".green(), path.display());
        }
    }

    print_inventory(&batch.inventory);

    if report.has_errors() {
        std::process::exit(1);
    }

    Ok(())
}

/// Print one line per built graph and failed document
fn print_graph_summary(batch: &BatchOutcome) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Lineage Graphs".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    for graph in &batch.graphs {
        let incomplete = graph.incomplete_nodes().len();
        let status = if incomplete == 0 {
            "✓".green()
        } else {
            "⚠".yellow()
        };

        println!(
            "  {} {} ({} stages, {} edges, {} sources, {} sinks)",
            status,
            graph.name.bold(),
            graph.nodes().len(),
            graph.edges().len(),
            graph.sources().len(),
            graph.sinks().len()
        );
        if incomplete > 0 {
            println!("      {} unresolved macro placeholder(s)", incomplete.to_string().yellow());
        }
    }

    for failure in &batch.failures {
        let name = failure
            .workflow
            .clone()
            .unwrap_or_else(|| failure.path.display().to_string());
        println!("  {} {}: {}", "✗".red(), name.bold(), failure.message);
    }
}

/// Print the macro inventory to stdout
fn print_inventory(inventory: &MacroInventory) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Macro Inventory".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    let summary = inventory.summary();
    println!("{}", "Summary:".bold());
    println!("  Total macros: {}", summary.total);
    println!("  Found:        {}", format!("{}", summary.found).green());
    if summary.missing > 0 {
        println!("  Unresolved:   {}", format!("{}", summary.missing).yellow().bold());
    } else {
        println!("  Unresolved:   {}", format!("{}", summary.missing).green());
    }
    println!("  Shared:       {}", summary.shared);
    println!();

    if inventory.is_empty() {
        println!("{}", "No macros referenced.".green());
    }

    for record in inventory.records() {
        let status = match record.status {
            MacroStatus::Found => record.status.as_str().green(),
            MacroStatus::Cyclic => record.status.as_str().red().bold(),
            _ => record.status.as_str().yellow(),
        };

        println!("  [{}] {}", status, record.name.bold());
        if let Some(path) = &record.resolved_path {
            println!("    Path:  {}", path.display());
            println!("    Ports: {} in, {} out", record.inputs, record.outputs);
        }
        let used_by: Vec<&str> = record.used_by.iter().map(String::as_str).collect();
        println!("    Used by: {}", used_by.join(", "));
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());
}

/// Print report summary to stdout
fn print_report_summary(report: &Report) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Workflow Lineage Report".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("Version: {}", report.version);
    println!("Timestamp: {}", report.timestamp);
    println!();

    println!("{}", "Summary:".bold());
    println!("  Workflows processed: {}", report.summary.workflows_processed);
    println!("  Graphs built:        {}", report.summary.graphs_built);
    if report.summary.workflows_failed > 0 {
        println!("  Workflows failed:    {}", format!("{}", report.summary.workflows_failed).red().bold());
    } else {
        println!("  Workflows failed:    {}", format!("{}", report.summary.workflows_failed).green());
    }
    println!("  Total diagnostics:   {}", report.summary.total);

    if report.summary.errors > 0 {
        println!("  Errors:   {}", format!("{}", report.summary.errors).red().bold());
    } else {
        println!("  Errors:   {}", format!("{}", report.summary.errors).green());
    }

    if report.summary.warnings > 0 {
        println!("  Warnings: {}", format!("{}", report.summary.warnings).yellow());
    } else {
        println!("  Warnings: {}", format!("{}", report.summary.warnings).green());
    }

    println!("  Info:     {}", report.summary.info);
    println!();

    if report.diagnostics.is_empty() {
        println!("{}", "✓ All macros resolved!".green().bold());
    } else {
        println!("{}", "Diagnostics:".bold());
        for diag in &report.diagnostics {
            let severity_str = match diag.severity {
                Severity::Error => "ERROR".red().bold(),
                Severity::Warn => "WARN".yellow().bold(),
                Severity::Info => "INFO".cyan(),
            };

            println!("  [{}] {}: {}", severity_str, diag.code, diag.message);

            if let Some(loc) = &diag.location {
                match &loc.node {
                    Some(node) => println!("    at {} (node {})", loc.file, node),
                    None => println!("    at {}", loc.file),
                }
            }

            if let Some(exp) = &diag.expected {
                println!("    Expected: {}", exp);
            }
            if let Some(act) = &diag.actual {
                println!("    Actual:   {}", act);
            }

            if !diag.impact.is_empty() {
                println!("    Impact: {} downstream stages", diag.impact.len());
                for stage in &diag.impact {
                    println!("      - {}", stage);
                }
            }
        }
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());
}
