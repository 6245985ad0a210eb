mod commands;
mod display;

use std::io;
use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use privlabel_core::{ParseOptions, ValidationMode};

#[derive(Parser, Debug)]
#[command(
    name = "privlabel",
    version,
    about = "Parse, migrate and re-export privacy finding labels"
)]
struct Cli {
    /// Reject single-object and untagged outputs instead of recovering them
    #[arg(long, global = true, env = "PRIVLABEL_STRICT", action = ArgAction::SetTrue)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Migrate a label archive and write it back in canonical export layout
    Migrate {
        /// Archive JSON: an object of image key to tagged text
        archive: PathBuf,
        /// Output path (default: stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Re-serialize one tagged-text file
    Format {
        file: PathBuf,
        /// Keep exact coordinates instead of rounding them
        #[arg(long, action = ArgAction::SetTrue)]
        display: bool,
    },
    /// Show the findings in one tagged-text file
    Inspect { file: PathBuf },
    /// Print every finding in an archive as a table
    Table { archive: PathBuf },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();
    tracing::info!("privlabel v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let options = ParseOptions {
        mode: if cli.strict {
            ValidationMode::Strict
        } else {
            ValidationMode::Permissive
        },
    };

    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr();
    match cli.command {
        Commands::Migrate { archive, out } => commands::migrate(
            &archive,
            out.as_deref(),
            &options,
            &mut stdout,
            &mut stderr,
        ),
        Commands::Format { file, display } => {
            commands::format_file(&file, display, &options, &mut stdout)
        }
        Commands::Inspect { file } => commands::inspect(&file, &options, &mut stdout),
        Commands::Table { archive } => {
            commands::table(&archive, &options, &mut stdout, &mut stderr)
        }
    }
}
