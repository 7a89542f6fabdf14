//! Command-line interface: one subcommand per service.

use crate::config::Config;
use crate::seller::SellerKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "a2a-purchasing",
    version,
    about = "Purchasing concierge and burger/pizza seller agents speaking A2A"
)]
pub struct Cli {
    /// Configuration file (default: ~/.a2a-purchasing/config.toml)
    #[arg(short, long, global = true, env = "A2A_PURCHASING_CONFIG")]
    pub config: Option<PathBuf>,

    /// Debug logging when RUST_LOG is unset
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Burger seller agent (HTTP Basic auth, default port 10001)
    BurgerSeller(ServeArgs),
    /// Pizza seller agent (Bearer API key, default port 10000)
    PizzaSeller(ServeArgs),
    /// Purchasing concierge with its chat UI (default port 8000)
    Concierge(ServeArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Bind address
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port
    #[arg(long)]
    pub port: Option<u16>,
}

impl Commands {
    pub fn service_name(&self) -> &'static str {
        match self {
            Commands::BurgerSeller(_) => "burger-seller",
            Commands::PizzaSeller(_) => "pizza-seller",
            Commands::Concierge(_) => "concierge",
        }
    }

    /// Apply `--host` / `--port` on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        let (args, host, port) = match self {
            Commands::BurgerSeller(a) => (a, &mut config.burger.host, &mut config.burger.port),
            Commands::PizzaSeller(a) => (a, &mut config.pizza.host, &mut config.pizza.port),
            Commands::Concierge(a) => (a, &mut config.concierge.host, &mut config.concierge.port),
        };
        if let Some(h) = &args.host {
            *host = h.clone();
        }
        if let Some(p) = args.port {
            *port = p;
        }
    }
}

/// Run the selected service to completion.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    cli.command.apply_overrides(&mut config);

    let _guard = crate::logging::init(&config.logging, cli.command.service_name(), cli.debug)?;
    tracing::info!(
        "a2a-purchasing v{} starting {}",
        crate::VERSION,
        cli.command.service_name()
    );

    match cli.command {
        Commands::BurgerSeller(_) => crate::seller::run(SellerKind::Burger, &config).await,
        Commands::PizzaSeller(_) => crate::seller::run(SellerKind::Pizza, &config).await,
        Commands::Concierge(_) => crate::concierge::run(&config).await,
    }
}
