mod config_cmd;
mod input;
mod live_cmd;
mod output;
mod relay_cmd;
mod replay;

use agentstream_pipeline::{Framing, RelayFormat};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "agentstream",
    about = "Decode, relay and replay agent backend event streams"
)]
struct Cli {
    /// Config file (defaults to ./agentstream.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild a stored conversation (JSONL or JSON array of records)
    Replay {
        /// History file, or `-` for stdin
        #[arg(default_value = "-")]
        input: String,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Run the live pipeline over a recorded stream and print each update
    Decode {
        /// Wire framing of the input (defaults to the configured framing)
        #[arg(long)]
        framing: Option<Framing>,

        /// Stream file, or `-` for stdin
        #[arg(default_value = "-")]
        input: String,
    },

    /// Forward a stream as deduplicated, standardized events
    Relay {
        #[arg(long)]
        framing: Option<Framing>,

        /// Output framing
        #[arg(long, default_value = "sse")]
        output: RelayFormat,

        #[arg(default_value = "-")]
        input: String,
    },

    /// Send a message to the configured backend and follow the response stream
    Fetch {
        /// Message text to send
        #[arg(long, short)]
        message: String,

        /// Existing session id; a new session is created when omitted
        #[arg(long)]
        session: Option<String>,

        #[arg(long)]
        framing: Option<Framing>,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match config_cmd::load(cli.config.as_deref()) {
        Ok(config) => match cli.command {
            Commands::Replay { input, pretty } => replay::run_replay(&input, &config, pretty).await,
            Commands::Decode { framing, input } => {
                live_cmd::run_decode(&input, framing, &config).await
            }
            Commands::Relay {
                framing,
                output,
                input,
            } => relay_cmd::run_relay(&input, framing, output, &config).await,
            Commands::Fetch {
                message,
                session,
                framing,
            } => live_cmd::run_fetch(&message, session, framing, &config).await,
            Commands::Config => config_cmd::show_config(&config),
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
    // A stdin read can still be parked on a blocking thread after a timeout;
    // dropping the runtime would wait for it.
    std::process::exit(0);
}
