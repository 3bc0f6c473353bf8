use clap::Parser;
use tracing_subscriber::EnvFilter;
use ui_transfer::cli::commands::{TransferArgs, cmd_paths, cmd_rank, cmd_transfer};
use ui_transfer::cli::config::{Cli, Commands, load_config};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ui_transfer={}", default_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;
    let oracle_endpoint = cli.oracle_endpoint.as_deref();

    match cli.command {
        Commands::Transfer {
            events,
            widgets,
            graph,
            rid_names,
            test_name,
            resume,
            endpoint,
        } => {
            let args = TransferArgs {
                events,
                widgets,
                graph,
                rid_names,
                test_name,
                resume,
                endpoint,
            };
            cmd_transfer(&args, &config, oracle_endpoint)?;
        }
        Commands::Rank {
            events,
            widgets,
            index,
            top,
        } => {
            cmd_rank(&events, &widgets, index, top, &config, oracle_endpoint)?;
        }
        Commands::Paths {
            graph,
            rid_names,
            from,
            to,
        } => {
            cmd_paths(&graph, &rid_names, &from, &to)?;
        }
    }

    Ok(())
}
