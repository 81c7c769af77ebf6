//! Card Sheet CLI
//!
//! Commands: plan, request, build
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 when a build is refused, 1 on bad input

use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use cardsheet_core::{
    BackDesign, BuildError, DirectoryProvider, DocumentAssembler, Orientation, PageFormat,
    PrintConfig, Roster, Selection,
};

#[derive(Parser)]
#[command(name = "cardsheet-cli")]
#[command(about = "Card Sheet CLI - print-ready ID card sheets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// PrintConfig JSON file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Page format: a3, a4, a5, letter, legal
    #[arg(long)]
    format: Option<String>,

    #[arg(long)]
    landscape: bool,

    #[arg(long)]
    no_bleed: bool,

    #[arg(long)]
    no_cut_marks: bool,

    /// Add a mirrored back page after every front page
    #[arg(long)]
    back: bool,

    /// Reuse one back design for every card
    #[arg(long)]
    shared_back: bool,
}

#[derive(Args)]
struct SelectionArgs {
    /// Roster JSON document ({company, employees})
    #[arg(short, long)]
    roster: PathBuf,

    /// Copies per employee id ({"id": count}); defaults to one of each
    #[arg(short, long)]
    selection: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the card grid for a config
    Plan {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Expand a roster selection into the ordered print request
    Request {
        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// Build the card sheet PDF
    Build {
        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        config: ConfigArgs,

        /// Directory holding <id>.front.png / <id>.back.png
        #[arg(short, long)]
        artifacts: PathBuf,

        #[arg(short, long, default_value = "id-cards.pdf")]
        output: PathBuf,
    },
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!("{}", value),
    }
}

fn fail(code: u8, error: impl std::fmt::Display) -> ExitCode {
    println!("{}", json!({ "success": false, "error": error.to_string() }));
    ExitCode::from(code)
}

fn load_config(args: &ConfigArgs) -> Result<PrintConfig, String> {
    let mut config = match &args.config {
        Some(path) => {
            let content = fs::read_to_string(path)
                .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
            serde_json::from_str(&content).map_err(|e| format!("Invalid config: {}", e))?
        }
        None => PrintConfig::default(),
    };

    if let Some(format) = &args.format {
        config.page_format = serde_json::from_value::<PageFormat>(Value::String(format.to_lowercase()))
            .map_err(|_| format!("Unknown page format '{}'", format))?;
    }
    if args.landscape {
        config.orientation = Orientation::Landscape;
    }
    if args.no_bleed {
        config.show_bleed = false;
    }
    if args.no_cut_marks {
        config.show_cut_marks = false;
    }
    if args.back {
        config.print_back_side = true;
    }
    if args.shared_back {
        config.back_design = BackDesign::Shared;
    }
    Ok(config)
}

fn load_selection(args: &SelectionArgs) -> Result<(Roster, Selection), String> {
    let roster = Roster::load(&args.roster).map_err(|e| e.to_string())?;
    let selection = match &args.selection {
        Some(path) => Selection::load(path).map_err(|e| e.to_string())?,
        None => Selection::all(&roster, 1),
    };
    Ok((roster, selection))
}

fn run_build(
    selection: &SelectionArgs,
    config: &ConfigArgs,
    artifacts: &Path,
    output: &Path,
) -> ExitCode {
    let config = match load_config(config) {
        Ok(c) => c,
        Err(e) => return fail(1, e),
    };
    let (roster, selection) = match load_selection(selection) {
        Ok(r) => r,
        Err(e) => return fail(1, e),
    };

    let request = roster.expand(&selection);
    info!("Building {} card copies for {}", request.len(), roster.company.name);

    let provider = DirectoryProvider::new(artifacts);
    let mut assembler = DocumentAssembler::new(config);
    let built = match assembler.build(&request, &provider) {
        Ok(b) => b,
        Err(e @ (BuildError::Configuration(_) | BuildError::EmptyRequest | BuildError::NothingPlaced { .. })) => {
            return fail(2, e)
        }
        Err(e) => return fail(1, e),
    };

    let written = match cardsheet_core::write_pdf(&built.document, output) {
        Ok(n) => n,
        Err(e) => return fail(1, e),
    };
    info!("Wrote {} bytes to {}", written, output.display());

    print_json(&json!({
        "success": true,
        "degraded": built.report.is_degraded(),
        "output": output.display().to_string(),
        "document": built.document.id,
        "report": built.report,
    }));
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Plan { config } => {
            let config = match load_config(&config) {
                Ok(c) => c,
                Err(e) => return fail(1, e),
            };
            match DocumentAssembler::new(config).plan() {
                Ok(geometry) => {
                    print_json(&json!({
                        "success": true,
                        "geometry": geometry,
                        "cardsPerPage": geometry.capacity(),
                    }));
                    ExitCode::SUCCESS
                }
                Err(e) => fail(2, e),
            }
        }

        Commands::Request { selection } => {
            let (roster, selection) = match load_selection(&selection) {
                Ok(r) => r,
                Err(e) => return fail(1, e),
            };
            let request = roster.expand(&selection);
            print_json(&json!({
                "success": true,
                "copies": request.len(),
                "request": request,
            }));
            ExitCode::SUCCESS
        }

        Commands::Build { selection, config, artifacts, output } => {
            run_build(&selection, &config, &artifacts, &output)
        }
    }
}
