//! Riskmap CLI - corruption-risk register scoring, matrix and dashboard

// Global invariants enforced:
// - Deterministic output ordering
// - Identical input yields byte-for-byte identical output

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use riskmap_core::config::{self, ResolvedConfig};
use riskmap_core::register::IssueLevel;
use riskmap_core::report::{self, render_json};
use riskmap_core::store::{self, Store};
use riskmap_core::{MatrixView, Register, RegisterDocument, RiskFilter, Severity};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "riskmap")]
#[command(about = "Corruption-risk scoring: normalized register, risk matrix and dashboard KPIs")]
#[command(version = env!("RISKMAP_VERSION"))]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Where the register is read from
#[derive(Args)]
struct SourceArgs {
    /// Directory holding one JSON blob per key (risks, controls, ...)
    #[arg(long, conflicts_with = "input")]
    store: Option<PathBuf>,

    /// Single JSON register document
    #[arg(long)]
    input: Option<PathBuf>,

    /// Path to config file (default: auto-discover)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize every risk and print the resulting register
    Normalize {
        #[command(flatten)]
        source: SourceArgs,

        /// Write the normalized register back instead of printing it
        #[arg(long)]
        write: bool,
    },
    /// Per-risk brut and net scores
    Scores {
        #[command(flatten)]
        source: SourceArgs,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Only list validated risks
        #[arg(long)]
        validated_only: bool,
    },
    /// Place risks on the 4x4 matrix
    Matrix {
        #[command(flatten)]
        source: SourceArgs,

        /// Matrix view
        #[arg(long, default_value = "brut")]
        view: ViewArg,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Only place risks of this process
        #[arg(long)]
        process: Option<String>,

        /// Only place risks of this sub-process
        #[arg(long)]
        sub_process: Option<String>,

        /// Only place risks with this status
        #[arg(long)]
        status: Option<String>,

        /// Only place risks with this brut severity (faible, modere, fort, critique)
        #[arg(long, value_parser = parse_severity)]
        severity: Option<Severity>,

        /// Case-insensitive text search
        #[arg(long)]
        query: Option<String>,
    },
    /// KPI summary over validated risks
    Dashboard {
        #[command(flatten)]
        source: SourceArgs,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Report register diagnostics (exit code 1 on errors)
    Check {
        #[command(flatten)]
        source: SourceArgs,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Validate or show the configuration
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a config file without loading a register
    Validate {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the resolved configuration (merged defaults + config file)
    Show {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ViewArg {
    Brut,
    Net,
}

impl From<ViewArg> for MatrixView {
    fn from(view: ViewArg) -> Self {
        match view {
            ViewArg::Brut => MatrixView::Brut,
            ViewArg::Net => MatrixView::Net,
        }
    }
}

fn parse_severity(value: &str) -> Result<Severity, String> {
    Severity::parse(value).ok_or_else(|| {
        format!(
            "unknown severity '{}' (expected faible, modere, fort or critique)",
            value
        )
    })
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Normalize { source, write } => {
            let resolved = resolve_config(&source)?;
            let register = load_register(&source, &resolved)?;

            if !write {
                println!("{}", render_json(&register.to_document()?));
                return Ok(());
            }

            match (&source.store, &source.input) {
                (Some(dir), _) => {
                    Store::open(dir).save_register(&register)?;
                    eprintln!(
                        "Normalized {} risk(s) in {}",
                        register.risks().len(),
                        dir.display()
                    );
                }
                (None, Some(path)) => {
                    let json = render_json(&register.to_document()?);
                    store::atomic_write(path, &json)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    eprintln!(
                        "Normalized {} risk(s) in {}",
                        register.risks().len(),
                        path.display()
                    );
                }
                (None, None) => missing_source()?,
            }
        }
        Commands::Scores {
            source,
            format,
            validated_only,
        } => {
            let resolved = resolve_config(&source)?;
            let register = load_register(&source, &resolved)?;
            let risks = if validated_only {
                register.validated_risks()
            } else {
                register.risks().to_vec()
            };
            let rows = report::sort_rows(report::score_rows(&risks, register.model()));

            match format {
                OutputFormat::Text => print!("{}", report::render_scores_text(&rows)),
                OutputFormat::Json => println!("{}", render_json(&rows)),
            }
        }
        Commands::Matrix {
            source,
            view,
            format,
            process,
            sub_process,
            status,
            severity,
            query,
        } => {
            let resolved = resolve_config(&source)?;
            let register = load_register(&source, &resolved)?;
            let filter = RiskFilter {
                process,
                sub_process,
                status,
                severity,
                query,
            };
            let view = MatrixView::from(view);
            let placements = riskmap_core::matrix(&register, &filter, view, &resolved.geometry);

            match format {
                OutputFormat::Text => print!("{}", report::render_matrix_text(&placements, view)),
                OutputFormat::Json => println!("{}", render_json(&placements)),
            }
        }
        Commands::Dashboard { source, format } => {
            let resolved = resolve_config(&source)?;
            let register = load_register(&source, &resolved)?;
            let summary = riskmap_core::dashboard(&register);

            match format {
                OutputFormat::Text => print!("{}", report::render_dashboard_text(&summary)),
                OutputFormat::Json => println!("{}", render_json(&summary)),
            }
        }
        Commands::Check { source, format } => {
            let resolved = resolve_config(&source)?;
            let register = load_register(&source, &resolved)?;
            let issues = register.validate();

            match format {
                OutputFormat::Text => print!("{}", report::render_issues_text(&issues)),
                OutputFormat::Json => println!("{}", render_json(&issues)),
            }

            let errors = issues
                .iter()
                .filter(|i| i.level == IssueLevel::Error)
                .count();
            if errors > 0 {
                eprintln!("{} error(s) found", errors);
                std::process::exit(1);
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Validate { path } => {
                let project_root = std::env::current_dir()?;
                let result = match &path {
                    Some(p) => config::load_config_file(p).map(|_| Some(p.clone())),
                    None => config::discover_config(&project_root)
                        .map(|found| found.map(|(_, p)| p)),
                };

                match result {
                    Ok(Some(p)) => println!("Config valid: {}", p.display()),
                    Ok(None) => println!("No config file found, using defaults"),
                    Err(e) => {
                        eprintln!("Config validation failed: {:#}", e);
                        std::process::exit(1);
                    }
                }
            }
            ConfigAction::Show { path } => {
                let project_root = std::env::current_dir()?;
                let resolved = config::load_and_resolve(&project_root, path.as_deref())
                    .context("failed to load configuration")?;
                print!("{}", render_config(&resolved));
            }
        },
    }

    Ok(())
}

fn resolve_config(source: &SourceArgs) -> anyhow::Result<ResolvedConfig> {
    let project_root = std::env::current_dir()?;
    config::load_and_resolve(&project_root, source.config.as_deref())
        .context("failed to load configuration")
}

fn load_register(source: &SourceArgs, resolved: &ResolvedConfig) -> anyhow::Result<Register> {
    let model = resolved.scoring.clone();
    match (&source.store, &source.input) {
        (Some(dir), _) => {
            if !dir.is_dir() {
                anyhow::bail!("Store directory does not exist: {}", dir.display());
            }
            Store::open(dir).load_register(model)
        }
        (None, Some(path)) => load_document(path).map(|doc| Register::from_document(doc, model)),
        (None, None) => missing_source(),
    }
}

fn load_document(path: &Path) -> anyhow::Result<RegisterDocument> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read register: {}", path.display()))?;
    RegisterDocument::from_json(&json).with_context(|| format!("in {}", path.display()))
}

fn missing_source<T>() -> anyhow::Result<T> {
    anyhow::bail!("either --store <dir> or --input <file> is required")
}

fn render_config(resolved: &ResolvedConfig) -> String {
    let model = &resolved.scoring;
    let mut out = String::new();

    out.push_str("Configuration:\n");
    match &resolved.config_path {
        Some(p) => out.push_str(&format!("  Source: {}\n", p.display())),
        None => out.push_str("  Source: defaults (no config file found)\n"),
    }
    out.push('\n');

    out.push_str("Thresholds:\n");
    out.push_str(&format!("  modere: {}\n", model.thresholds.modere));
    out.push_str(&format!("  fort: {}\n", model.thresholds.fort));
    out.push_str(&format!("  critique: {}\n", model.thresholds.critique));
    out.push('\n');

    out.push_str("Aggravating groups:\n");
    for (name, group) in [
        ("group1", &model.aggravating.group1),
        ("group2", &model.aggravating.group2),
    ] {
        out.push_str(&format!(
            "  {}: {} (x{}, {} factor(s))\n",
            name,
            group.label,
            group.coefficient,
            group.factors.len()
        ));
    }
    out.push('\n');

    out.push_str("Mitigation levels:\n");
    let default_level = &model.mitigation.default_level().value;
    for level in model.mitigation.levels() {
        let marker = if &level.value == default_level {
            " (default)"
        } else {
            ""
        };
        out.push_str(&format!(
            "  {}: {}{}\n",
            level.value, level.coefficient, marker
        ));
    }
    out.push('\n');

    out.push_str("Net impact references:\n");
    for severity in Severity::ALL {
        out.push_str(&format!(
            "  {}: {} -> {}\n",
            severity.as_str(),
            model.net_impact.reference_for(severity),
            model.net_impact.impact_for(severity)
        ));
    }
    out.push('\n');

    out.push_str("Matrix:\n");
    out.push_str(&format!(
        "  marker_diameter: {}\n",
        resolved.geometry.marker_diameter
    ));
    out.push_str(&format!("  margin: {}\n", resolved.geometry.margin));
    out
}
