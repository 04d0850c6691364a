//! Command line client for offchain token transfers.

use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use structopt::StructOpt;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use txf_cli::commands::{gen_address, mint, receive, send, verify};
use txf_cli::txf::data_from_text;
use txf_cli::{CliConfig, CliError, Wallet};
use txf_network::JsonRpcAggregatorClient;

/// Command line arguments for the client.
#[derive(Debug, StructOpt)]
#[structopt(name = "txf", about = "Offchain token transfers with unicity proofs")]
struct Opt {
    /// Path to the configuration file
    #[structopt(short, long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// Aggregator endpoint
    #[structopt(short, long)]
    aggregator: Option<String>,

    /// Network name
    #[structopt(short, long)]
    network: Option<String>,

    /// Path to the trust base file
    #[structopt(long, parse(from_os_str))]
    trust_base: Option<PathBuf>,

    /// Secret the signing key is derived from
    #[structopt(long, env = "SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Subcommand to run
    #[structopt(subcommand)]
    cmd: Command,
}

/// Subcommands for the client.
#[derive(Debug, StructOpt)]
enum Command {
    /// Print the address to receive tokens of a type at
    #[structopt(name = "gen-address")]
    GenAddress {
        /// Token type, as 64 hex characters or text
        #[structopt(long)]
        token_type: String,

        /// Nonce for a one-time masked address
        #[structopt(long)]
        nonce: Option<String>,
    },

    /// Mint a new token to yourself
    #[structopt(name = "mint")]
    Mint {
        /// Token id, random when omitted
        #[structopt(long)]
        token_id: Option<String>,

        /// Token type, as 64 hex characters or text
        #[structopt(long)]
        token_type: String,

        /// Immutable token data
        #[structopt(long)]
        token_data: Option<String>,

        /// Mutable state data
        #[structopt(long)]
        data: Option<String>,

        /// Nonce for a masked owner predicate
        #[structopt(long)]
        nonce: Option<String>,

        /// Where to write the token
        #[structopt(short, long, parse(from_os_str))]
        out: PathBuf,
    },

    /// Send a token to an address
    #[structopt(name = "send")]
    Send {
        /// Token file
        #[structopt(long, parse(from_os_str))]
        token: PathBuf,

        /// Recipient address
        #[structopt(long)]
        to: String,

        /// State data for the recipient
        #[structopt(long)]
        data: Option<String>,

        /// Message committed with the transfer
        #[structopt(long)]
        message: Option<String>,

        /// Only package the transfer; the recipient submits it
        #[structopt(long)]
        offline: bool,

        /// Where to write the transfer document
        #[structopt(short, long, parse(from_os_str))]
        out: PathBuf,
    },

    /// Receive a token from a transfer document
    #[structopt(name = "receive")]
    Receive {
        /// Transfer document
        #[structopt(long, parse(from_os_str))]
        transfer: PathBuf,

        /// Nonce the receiving address was generated with
        #[structopt(long)]
        nonce: Option<String>,

        /// Where to write the received token
        #[structopt(short, long, parse(from_os_str))]
        out: PathBuf,
    },

    /// Verify a token document; exits non-zero on any violation
    #[structopt(name = "verify")]
    Verify {
        /// Token file
        #[structopt(long, parse(from_os_str))]
        token: PathBuf,
    },
}

fn wallet(secret: &Option<String>) -> Result<Wallet, CliError> {
    Wallet::from_secret(secret.as_deref().unwrap_or_default())
}

async fn run(opt: Opt) -> Result<(), CliError> {
    // Load configuration
    let config_path = opt.config.clone().or_else(|| {
        CliConfig::default_path().filter(|path| path.exists())
    });
    let mut config = match &config_path {
        Some(path) => CliConfig::from_file(path)?,
        None => CliConfig::default(),
    };

    // Command line flags win over the file
    if let Some(aggregator) = opt.aggregator {
        config.aggregator_url = aggregator;
    }
    if let Some(network) = opt.network {
        config.network = network;
    }
    if let Some(trust_base) = opt.trust_base {
        config.trust_base_path = Some(trust_base);
    }

    match opt.cmd {
        Command::GenAddress { token_type, nonce } => {
            let wallet = wallet(&opt.secret)?;
            let address = gen_address::run(&wallet, &token_type, nonce.as_deref())?;
            println!("{} {}", "Address:".green(), address);
        }
        Command::Mint {
            token_id,
            token_type,
            token_data,
            data,
            nonce,
            out,
        } => {
            let wallet = wallet(&opt.secret)?;
            let trust_base = config.load_trust_base()?;
            let client = JsonRpcAggregatorClient::new(&config.aggregator_url, config.request_timeout())?;
            let request = mint::MintRequest {
                token_id,
                token_type,
                token_data: token_data.map(String::into_bytes).unwrap_or_default(),
                data: data_from_text(data.as_deref()),
                nonce,
            };
            let token = mint::run(&config, &client, &trust_base, &wallet, request, &out).await?;
            println!("{} {} -> {}", "Token minted:".green(), token.id(), out.display());
        }
        Command::Send {
            token,
            to,
            data,
            message,
            offline,
            out,
        } => {
            let wallet = wallet(&opt.secret)?;
            let trust_base = config.load_trust_base()?;
            let client = JsonRpcAggregatorClient::new(&config.aggregator_url, config.request_timeout())?;
            let request = send::SendRequest {
                recipient: to,
                data: data_from_text(data.as_deref()),
                message,
                offline,
            };
            let document = send::run(&config, &client, &trust_base, &wallet, &token, request, &out).await?;
            println!(
                "{} {} ({}) -> {}",
                "Transfer written:".green(),
                document.id(),
                document.transfer_state(),
                out.display()
            );
        }
        Command::Receive { transfer, nonce, out } => {
            let wallet = wallet(&opt.secret)?;
            let trust_base = config.load_trust_base()?;
            let client = JsonRpcAggregatorClient::new(&config.aggregator_url, config.request_timeout())?;
            let token = receive::run(
                &config,
                &client,
                &trust_base,
                &wallet,
                &transfer,
                nonce.as_deref(),
                &out,
            )
            .await?;
            println!("{} {} -> {}", "Token received:".green(), token.id(), out.display());
        }
        Command::Verify { token } => {
            let trust_base = config.load_trust_base()?;
            let token = verify::run(&trust_base, &token)?;
            println!("{} {}", "Token valid:".green(), token);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Parse command line arguments
    let opt = Opt::from_args();

    if let Err(e) = run(opt).await {
        eprintln!("{} {}", "Error:".red(), e);
        std::process::exit(1);
    }
    Ok(())
}
