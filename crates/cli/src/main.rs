//! rlmgate CLI: the main entry point.
//!
//! Commands:
//! - `serve`: Start the HTTP gateway
//! - `stdio`: Serve JSON-line requests on stdin/stdout
//! - `call`: Run a single request
//! - `models`: List the model catalog
//! - `config`: Print the effective configuration, secrets redacted

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "rlmgate",
    about = "rlmgate: budget-aware orchestration gateway for language models",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines, one event per operation step
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Read one JSON request per line from stdin, write one reply per line
    Stdio,

    /// Run a single request, e.g. `rlmgate call state '{"op":"list","sessionId":"s"}'`
    Call {
        /// Tool name: rlm or state
        name: String,

        /// Arguments as a JSON object
        arguments: Option<String>,
    },

    /// List models, tier defaults and ready backends
    Models,

    /// Print the effective configuration with secrets redacted
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is reserved for replies.
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Stdio => commands::stdio::run().await?,
        Commands::Call { name, arguments } => {
            if !commands::call::run(&name, arguments.as_deref()).await? {
                std::process::exit(1);
            }
        }
        Commands::Models => commands::models::run().await?,
        Commands::Config => commands::config_cmd::show().await?,
    }

    Ok(())
}
