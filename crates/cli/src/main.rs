//! Joi CLI: the main entry point.
//!
//! Commands:
//! - `serve`: Start the HTTP/WebSocket gateway
//! - `chat`: Interactive chat or single-message mode
//! - `tools`: List the tools the assistant can call
//! - `config`: Print the effective configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "joi", about = "Joi: a tool-using chat assistant", version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat with Joi in the terminal
    Chat {
        /// Model selector (openai, gemini)
        #[arg(short = 'M', long)]
        model: Option<String>,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// List registered tools
    Tools,

    /// Show the effective configuration with secrets redacted
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Chat { model, message } => commands::chat::run(model, message).await?,
        Commands::Tools => commands::tools::run()?,
        Commands::Config => commands::config_cmd::show()?,
    }

    Ok(())
}
