//! Main CLI application structure

use anyhow::Result;
use clap::{Parser, Subcommand};

use super::output::{Output, OutputFormat};
use super::{build, serve, start};
use crate::storage::{Config, Project};

#[derive(Parser)]
#[command(name = "assetpipe")]
#[command(author, version, about = "Front-end asset pipeline: bundle scripts, compile styles, inject and serve")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config's `default_format`)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Defaults to `start`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new assetpipe project
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,
    },

    /// Build everything, then serve and rebuild on change
    Start {
        /// Port to serve on (overrides the config)
        #[arg(long, short = 'p')]
        port: Option<u16>,

        /// Watch without starting the server
        #[arg(long)]
        no_serve: bool,
    },

    /// Clean the output directory and build everything once
    Build,

    /// Empty the output directory
    Clean,

    /// Serve the existing output directory
    Serve {
        /// Port to serve on (overrides the config)
        #[arg(long, short = 'p')]
        port: Option<u16>,
    },
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = match cli.format {
        Some(format) => format,
        None => Config::load_global()?.default_format.into(),
    };
    let output = Output::new(format, cli.verbose);

    output.verbose("assetpipe starting");

    let command = cli.command.unwrap_or(Commands::Start {
        port: None,
        no_serve: false,
    });

    match command {
        Commands::Init { path } => {
            output.verbose_ctx("init", &format!("Initializing project at: {}", path));
            let project = Project::init(&path)?;
            output.success(&format!(
                "Initialized assetpipe project at {}",
                project.root().display()
            ));
        }

        Commands::Start { port, no_serve } => {
            output.verbose_ctx("start", &format!("port={:?}, no_serve={}", port, no_serve));
            start::start(&output, port, no_serve)?
        }

        Commands::Build => build::build(&output)?,
        Commands::Clean => build::clean(&output)?,

        Commands::Serve { port } => {
            output.verbose_ctx("serve", &format!("port={:?}", port));
            serve::serve(&output, port)?
        }
    }

    output.verbose("Command completed successfully");
    Ok(())
}
