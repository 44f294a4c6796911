//! Purpose: `placementd` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::json;

use placementd::api::{to_exit_code, Error, ErrorKind, Store};
use placementd::serve::{serve, ServeConfig};

#[derive(Parser)]
#[command(name = "placementd", version, about = "Placement-portal backend")]
struct Cli {
    /// Path to the SQLite database file.
    #[arg(long, global = true, default_value = "placementd.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server.
    Serve(ServeArgs),
    /// Create the database schema (idempotent).
    InitDb,
    /// Inspect or update the notification outbox.
    Outbox {
        #[command(subcommand)]
        command: OutboxCommand,
    },
}

#[derive(Args)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8642")]
    bind: SocketAddr,

    /// Bearer token required on every /v1 request.
    #[arg(long, conflicts_with = "token_file")]
    token: Option<String>,

    /// Read the bearer token from a file.
    #[arg(long)]
    token_file: Option<PathBuf>,

    /// Permit binding to a non-loopback address.
    #[arg(long)]
    allow_non_loopback: bool,

    /// Maximum accepted request body size in bytes.
    #[arg(long, default_value_t = 1024 * 1024)]
    max_body_bytes: u64,

    /// Allowed CORS origin; repeat for multiple origins.
    #[arg(long = "cors-origin")]
    cors_origins: Vec<String>,
}

#[derive(Subcommand)]
enum OutboxCommand {
    /// List queued notifications as JSON.
    List {
        /// Include notifications already marked sent.
        #[arg(long)]
        all: bool,
    },
    /// Mark a notification as delivered.
    MarkSent { id: i64 },
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        let mut body = json!({
            "error": {
                "kind": format!("{:?}", err.kind()),
                "message": err.message().unwrap_or("error"),
            }
        });
        if let Some(hint) = err.hint() {
            body["error"]["hint"] = json!(hint);
        }
        eprintln!("{body}");
        std::process::exit(to_exit_code(err.kind()));
    }
}

fn run(cli: Cli) -> Result<(), Error> {
    match cli.command {
        Command::Serve(args) => {
            let token_file_used = args.token_file.is_some();
            let token = match args.token_file {
                Some(path) => Some(read_token_file(&path)?),
                None => args.token,
            };
            let config = ServeConfig {
                bind: args.bind,
                db_path: cli.db,
                token,
                token_file_used,
                allow_non_loopback: args.allow_non_loopback,
                max_body_bytes: args.max_body_bytes,
                cors_origins: args.cors_origins,
            };
            let runtime = tokio::runtime::Runtime::new().map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to start async runtime")
                    .with_source(err)
            })?;
            runtime.block_on(serve(config))
        }
        Command::InitDb => {
            let store = Store::open(&cli.db)?;
            store.init_schema()?;
            println!("{}", json!({ "ok": true, "db": cli.db.display().to_string() }));
            Ok(())
        }
        Command::Outbox { command } => {
            let store = Store::open(&cli.db)?;
            store.init_schema()?;
            match command {
                OutboxCommand::List { all } => {
                    let entries = store.outbox(all)?;
                    let payload = serde_json::to_value(&entries).map_err(|err| {
                        Error::new(ErrorKind::Internal)
                            .with_message("failed to encode outbox entries")
                            .with_source(err)
                    })?;
                    println!("{}", json!({ "outbox": payload }));
                }
                OutboxCommand::MarkSent { id } => {
                    store.mark_sent(id)?;
                    println!("{}", json!({ "ok": true, "id": id }));
                }
            }
            Ok(())
        }
    }
}

fn read_token_file(path: &PathBuf) -> Result<String, Error> {
    let raw = std::fs::read_to_string(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read token file")
            .with_context(path.display().to_string())
            .with_source(err)
    })?;
    let token = raw.trim().to_string();
    if token.is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("token file is empty")
            .with_context(path.display().to_string()));
    }
    Ok(token)
}
