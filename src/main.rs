//! `app-composer` command-line entry point.

use std::path::PathBuf;

use app_composer::logging::init_logging;
use app_composer::Composer;
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "app-composer")]
#[command(about = "Composes a project's config folder into app.json", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose the files in the config folder into the app.json file
    Compose {
        /// Config folder, relative to the project (default: config)
        config_path: Option<PathBuf>,

        /// Project folder holding app.json (default: current directory)
        project_path: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Commands::Compose {
            config_path,
            project_path,
        } => {
            let mut builder = Composer::builder();
            if let Some(project_path) = project_path {
                builder = builder.root(project_path);
            }
            if let Some(config_path) = config_path {
                builder = builder.config_dir(config_path);
            }

            let summary = builder.build()?.compose()?;
            info!(
                event = "cli.compose_finished",
                manifest = %summary.manifest_path.display(),
                locale_files_written = summary.locale_files_written.len(),
                locale_files_removed = summary.locale_files_removed.len(),
                preserved_hand_edits = summary.preserved_hand_edits.len()
            );
        }
    }

    Ok(())
}
