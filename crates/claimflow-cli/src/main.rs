// Claimflow CLI - drives the multi-step claim form against a server

mod client;
mod driver;

use clap::{Parser, Subcommand};
use colored::Colorize;

use claimflow_core::lookup::{classify_lookup_result, LookupStatus};
use claimflow_core::messages::friendly_message;

use crate::client::ApiClient;

/// Claimflow - lead submission tool
#[derive(Parser)]
#[command(name = "claimflow")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Server base URL
    #[arg(long, default_value = "http://localhost:4000", global = true)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the server is up
    Health,
    /// Look up addresses for a postcode
    Lookup {
        /// UK postcode, e.g. "SW1A 1AA"
        postcode: String,
    },
    /// Run a lead file through the full multi-step flow
    Submit {
        /// Path to a flat lead JSON file
        path: String,

        /// Which lookup suggestion to select for each postcode
        #[arg(long, default_value_t = 0)]
        select: usize,

        /// Opt-in URL recorded on the lead
        #[arg(long, default_value = "https://claims.example/")]
        optin_url: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = ApiClient::new(cli.server);

    match cli.command {
        Commands::Health => {
            if client.health()? {
                println!("{}", "server is up".green());
            } else {
                println!("{}", "server responded but is not healthy".yellow());
            }
        }
        Commands::Lookup { postcode } => match classify_lookup_result(client.lookup(&postcode)) {
            LookupStatus::Selectable(addresses) => {
                for (index, address) in addresses.iter().enumerate() {
                    println!("{index:>3}  {}", address.label);
                }
            }
            LookupStatus::NoResults => {
                println!("{}", friendly_message("currentPostcode.lookupNoResults").yellow());
            }
            LookupStatus::Failed => {
                anyhow::bail!("{}", friendly_message("currentPostcode.lookupFailed"));
            }
        },
        Commands::Submit { path, select, optin_url } => {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("cannot read lead file {path}: {e}"))?;
            let lead: serde_json::Value = serde_json::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("lead file {path} is not valid JSON: {e}"))?;
            driver::run_lead(&client, &lead, &optin_url, select)?;
        }
    }

    Ok(())
}
