mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "judge-cli")]
#[command(about = "Judge CLI - Run submissions locally and inspect generated programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an execution request file and print the graded results
    Run {
        /// Request JSON ({"language", "code", "testCases"})
        #[arg(short, long)]
        request: PathBuf,

        /// Isolate backend (docker or process); defaults to SANDBOX_BACKEND
        #[arg(short, long)]
        backend: Option<String>,
    },

    /// Print the program generated for one test case without running it
    Wrap {
        /// Language name (python, javascript, java)
        #[arg(short, long)]
        language: String,

        /// File holding the function body
        #[arg(short, long)]
        code_file: PathBuf,

        /// Test input as a JSON object of named arguments
        #[arg(short, long, default_value = "{}")]
        input: String,
    },

    /// List enabled languages and their commands
    Languages,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { request, backend } => {
            commands::run_request(&request, backend.as_deref()).await?;
        }
        Commands::Wrap {
            language,
            code_file,
            input,
        } => {
            commands::wrap_code(&language, &code_file, &input)?;
        }
        Commands::Languages => {
            commands::list_languages()?;
        }
    }

    Ok(())
}
