use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use slideshow_manager::api::{ApiServer, ApiState};
use slideshow_manager::registry::parse_tag_list;
use slideshow_manager::{Config, DeviceService, NewDevice, Operator, OperatorAuth, Updater};

/// Slideshow Manager - manage a fleet of networked slideshow players
#[derive(Parser)]
#[command(name = "slideshow-manager", version, about)]
struct Cli {
    /// Port to listen on (overrides config)
    #[arg(long, env = "SLIDESHOW_MANAGER_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API server (default)
    Serve,
    /// Manage the device registry
    #[command(subcommand)]
    Devices(DevicesCommand),
}

#[derive(Subcommand)]
enum DevicesCommand {
    /// List registered devices
    List,
    /// Register a device
    Add(AddDevice),
    /// Remove a device
    Remove {
        /// Device id
        id: String,
    },
    /// Fetch a device's current player state
    State {
        /// Device id
        id: String,
    },
}

#[derive(Args)]
struct AddDevice {
    /// Display name
    #[arg(long)]
    name: String,
    /// Base URL of the device's web API (e.g. https://pi1.local)
    #[arg(long)]
    base_url: String,
    /// Device login username
    #[arg(long)]
    username: String,
    /// Device login password
    #[arg(long, env = "SLIDESHOW_DEVICE_PASSWORD", hide_env_values = true)]
    password: String,
    /// Free-form notes
    #[arg(long)]
    notes: Option<String>,
    /// Comma separated tags
    #[arg(long, default_value = "")]
    tags: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,slideshow_manager=info",
        1 => "info,slideshow_manager=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(port) = cli.port {
        config.api_server.port = port;
    }
    tracing::debug!(?config, "loaded configuration");

    let service = DeviceService::from_config(&config).context("failed to open device registry")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, service).await,
        Command::Devices(cmd) => devices(cmd, &service).await,
    }
}

async fn serve(config: Config, service: DeviceService) -> anyhow::Result<()> {
    tracing::info!(
        port = config.api_server.port,
        auth_mode = %config.auth.mode,
        "starting slideshow manager"
    );

    let auth = OperatorAuth::from_config(&config.auth);
    let updates = Updater::new(config.updates).context("failed to set up updater")?;
    let server = ApiServer::new(
        ApiState {
            service,
            auth,
            updates,
        },
        config.api_server,
    );
    server.run().await?;
    Ok(())
}

async fn devices(cmd: DevicesCommand, service: &DeviceService) -> anyhow::Result<()> {
    let operator = Operator::local();

    match cmd {
        DevicesCommand::List => {
            let devices = service.list_devices(&operator)?;
            if devices.is_empty() {
                println!("No devices registered");
            }
            for device in devices {
                let tags = if device.tags.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", device.tags.join(", "))
                };
                println!("{}  {}  {}{tags}", device.id, device.name, device.base_url);
            }
        }
        DevicesCommand::Add(add) => {
            let device = service.add_device(
                &operator,
                NewDevice {
                    name: add.name,
                    base_url: add.base_url,
                    username: add.username,
                    password: add.password,
                    notes: add.notes,
                    tags: parse_tag_list(&add.tags),
                },
            )?;
            println!("Added device {} ({})", device.name, device.id);
        }
        DevicesCommand::Remove { id } => {
            if service.delete_device(&operator, &id)? {
                println!("Removed device {id}");
            } else {
                anyhow::bail!("device '{id}' not found");
            }
        }
        DevicesCommand::State { id } => {
            let state = service
                .get_state(&operator, &id)
                .await?
                .with_context(|| format!("device '{id}' not found"))?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
    }

    Ok(())
}
