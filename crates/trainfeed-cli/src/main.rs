//! trainfeed CLI — collect, inspect and move training feedback surveys.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

use commands::export::ExportArgs;
use commands::instructor::InstructorCommand;
use commands::submit::SubmitArgs;

#[derive(Parser)]
#[command(name = "trainfeed", version, about = "Training feedback survey collection")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter trainfeed.toml
    Init,

    /// Record one feedback survey
    Submit(SubmitArgs),

    /// List records, newest first
    List,

    /// Show one record in full
    Show {
        /// Record id
        id: String,
    },

    /// Delete one record
    Delete {
        /// Record id
        id: String,
    },

    /// Aggregate statistics
    Summary {
        /// Only records for this instructor (exact name)
        #[arg(long)]
        instructor: Option<String>,
    },

    /// Export all records to a date-stamped file
    Export(ExportArgs),

    /// Merge records from a JSON export
    Import {
        /// JSON file produced by `export --format json`
        file: PathBuf,
    },

    /// Manage the instructor roster
    Instructor {
        #[command(subcommand)]
        command: InstructorCommand,
    },
}

#[tokio::main]
async fn main() {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "trainfeed=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Submit(args) => commands::submit::execute(args, config).await,
        Commands::List => commands::list::execute(config),
        Commands::Show { id } => commands::show::execute(&id, config),
        Commands::Delete { id } => commands::delete::execute(&id, config),
        Commands::Summary { instructor } => {
            commands::summary::execute(instructor.as_deref(), config)
        }
        Commands::Export(args) => commands::export::execute(args, config),
        Commands::Import { file } => commands::import::execute(&file, config),
        Commands::Instructor { command } => commands::instructor::execute(command, config).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
