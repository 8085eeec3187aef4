use clap::{Parser, Subcommand};
use std::process::ExitCode;

use schema_warden::config::FleetConfig;
use schema_warden::mcp::SchemaWardenServer;
use schema_warden::utils::logger::init_logger;

#[derive(Parser)]
#[command(name = "swd", version, about = "Schema Registry control plane MCP server")]
struct Cli {
    /// Log level (trace, debug, info, warn, error); defaults to RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the MCP server on stdio (the default).
    Serve,
    /// Print the fleet configuration parsed from the environment and exit.
    CheckConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_logger(cli.log_level.as_deref()) {
        eprintln!("failed to initialize logging: {err}");
        return ExitCode::from(1);
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let server = match SchemaWardenServer::bootstrap() {
                Ok(server) => server,
                Err(err) => {
                    eprintln!("failed to start: {err}");
                    return ExitCode::from(1);
                }
            };
            if let Err(err) = server.run().await {
                eprintln!("{err}");
                return ExitCode::from(1);
            }
            ExitCode::SUCCESS
        }
        Command::CheckConfig => {
            let fleet = FleetConfig::from_env();
            if fleet.is_empty() {
                eprintln!(
                    "no registry configured; set SCHEMA_REGISTRY_URL or \
                     SCHEMA_REGISTRY_NAME_1/SCHEMA_REGISTRY_URL_1"
                );
                return ExitCode::from(1);
            }
            for registry in &fleet.registries {
                let default_marker = if Some(&registry.name) == fleet.default_registry.as_ref() {
                    " (default)"
                } else {
                    ""
                };
                println!(
                    "{}{} -> {} readonly={}",
                    registry.name, default_marker, registry.url, registry.readonly
                );
            }
            ExitCode::SUCCESS
        }
    }
}
