//! bountyd: run the development ledger service, or drive a bounty ledger
//! from the command line.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;

use bounty_client::{
    render, rows, BountyClient, BountyEntry, BountyRow, ClientConfig, NewBounty, PendingTx,
    RpcLedger,
};
use bounty_ledger::BountyLedger;
use bounty_rpc::{GenesisAllocation, RpcServer, ShutdownController};
use bounty_types::{BountyId, Identity, Timestamp, Wei};
use bounty_utils::LogFormat;

use crate::config::DaemonConfig;

const SECS_PER_DAY: u64 = 86_400;

#[derive(Parser)]
#[command(name = "bountyd", version, about = "Bounty ledger service and client")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, env = "BOUNTY_CONFIG")]
    config: Option<PathBuf>,

    /// Ledger JSON-RPC endpoint.
    #[arg(long, env = "BOUNTY_ENDPOINT")]
    endpoint: Option<String>,

    /// Account used as the sender of writes.
    #[arg(long, env = "BOUNTY_ACCOUNT")]
    account: Option<Identity>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "BOUNTY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "BOUNTY_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the development ledger service.
    Serve {
        /// Address to bind.
        #[arg(long, env = "BOUNTY_BIND")]
        bind: Option<String>,

        /// Port for the JSON-RPC endpoint.
        #[arg(long, env = "BOUNTY_PORT")]
        port: Option<u16>,

        /// Milliseconds between produced blocks.
        #[arg(long, env = "BOUNTY_BLOCK_INTERVAL_MS")]
        block_interval_ms: Option<u64>,

        /// Fund an account at startup, as ACCOUNT=ETHER. Repeatable.
        #[arg(long = "fund", value_parser = parse_allocation)]
        fund: Vec<GenesisAllocation>,

        /// Disable the /metrics endpoint.
        #[arg(long)]
        no_metrics: bool,
    },

    /// List every bounty with its fulfillments.
    List {
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Show one bounty.
    Show {
        id: u64,

        #[arg(long)]
        json: bool,
    },

    /// Issue a new bounty funded from the configured account.
    Create {
        #[arg(long)]
        title: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Reward in ether, e.g. "0.01".
        #[arg(long)]
        amount: String,

        /// Deadline as Unix seconds. Defaults to now plus --days.
        #[arg(long, conflicts_with = "days")]
        deadline: Option<u64>,

        #[arg(long)]
        days: Option<u64>,

        /// Arbiter allowed to accept fulfillments. Defaults to the issuer.
        #[arg(long)]
        arbiter: Option<Identity>,

        #[command(flatten)]
        wait: WaitArgs,
    },

    /// Submit evidence for a bounty.
    Fulfill {
        id: u64,

        link: String,

        #[command(flatten)]
        wait: WaitArgs,
    },

    /// Accept a fulfillment and pay out the bounty.
    Accept {
        id: u64,

        /// Position of the fulfillment within the bounty.
        #[arg(default_value_t = 0)]
        fulfillment: usize,

        #[command(flatten)]
        wait: WaitArgs,
    },

    /// Kill a bounty and refund the issuer.
    Cancel {
        id: u64,

        #[command(flatten)]
        wait: WaitArgs,
    },

    /// Show an account's spendable balance.
    Balance {
        /// Defaults to the configured account.
        account: Option<Identity>,
    },
}

#[derive(clap::Args)]
struct WaitArgs {
    /// Block until the transaction is confirmed or fails.
    #[arg(long)]
    wait: bool,
}

fn parse_allocation(s: &str) -> Result<GenesisAllocation, String> {
    let (account, ether) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ACCOUNT=ETHER, got {s:?}"))?;
    let account: Identity = account.trim().parse().map_err(|e| format!("{e}"))?;
    let ether = ether.trim().to_string();
    Wei::parse_ether(&ether).map_err(|e| format!("{e}"))?;
    Ok(GenesisAllocation { account, ether })
}

impl Cli {
    /// Load the file config (if any) and apply flag and env overrides.
    fn resolve_config(&self) -> anyhow::Result<DaemonConfig> {
        let mut config = match &self.config {
            Some(path) => DaemonConfig::from_toml_file(path)?,
            None => DaemonConfig::default(),
        };
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(endpoint) = &self.endpoint {
            config.client.endpoint = endpoint.clone();
        }
        if self.account.is_some() {
            config.client.account = self.account;
        }
        if let Command::Serve {
            bind,
            port,
            block_interval_ms,
            fund,
            no_metrics,
        } = &self.command
        {
            if let Some(bind) = bind {
                config.server.bind = bind.clone();
            }
            if let Some(port) = port {
                config.server.port = *port;
            }
            if let Some(interval) = block_interval_ms {
                config.server.block_interval_ms = *interval;
            }
            config.server.genesis.extend(fund.iter().cloned());
            if *no_metrics {
                config.server.enable_metrics = false;
            }
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    bounty_utils::init_logging(config.log_format, &config.log_level)?;

    match cli.command {
        Command::Serve { .. } => serve(config).await,
        Command::List { json } => {
            let client = connect(config.client)?;
            let snapshot = client.query().refresh().await?;
            let rows = rows(&snapshot);
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                print!("{}", render(&rows));
            }
            Ok(())
        }
        Command::Show { id, json } => {
            let client = connect(config.client)?;
            let id = BountyId::new(id);
            let entry = BountyEntry {
                bounty: client.query().bounty(id).await?,
                fulfillments: client.query().fulfillments(id).await?,
            };
            let row = BountyRow::from(&entry);
            if json {
                println!("{}", serde_json::to_string_pretty(&row)?);
            } else {
                print!("{}", render(std::slice::from_ref(&row)));
            }
            Ok(())
        }
        Command::Create {
            title,
            description,
            amount,
            deadline,
            days,
            arbiter,
            wait,
        } => {
            let amount = Wei::parse_ether(&amount).context("invalid --amount")?;
            let deadline = match deadline {
                Some(secs) => Timestamp::new(secs),
                None => Timestamp::now().plus_secs(days.unwrap_or(7).saturating_mul(SECS_PER_DAY)),
            };
            let client = connect(config.client)?;
            let pending = client
                .commands()?
                .issue(NewBounty {
                    arbiter,
                    deadline,
                    amount,
                    title,
                    description,
                })
                .await?;
            report(pending, wait.wait).await
        }
        Command::Fulfill { id, link, wait } => {
            let client = connect(config.client)?;
            let pending = client.commands()?.fulfill(BountyId::new(id), link).await?;
            report(pending, wait.wait).await
        }
        Command::Accept {
            id,
            fulfillment,
            wait,
        } => {
            let client = connect(config.client)?;
            let pending = client
                .commands()?
                .accept_fulfillment(BountyId::new(id), fulfillment)
                .await?;
            report(pending, wait.wait).await
        }
        Command::Cancel { id, wait } => {
            let client = connect(config.client)?;
            let pending = client.commands()?.cancel(BountyId::new(id)).await?;
            report(pending, wait.wait).await
        }
        Command::Balance { account } => {
            let Some(account) = account.or(config.client.account) else {
                bail!("no account given and none configured (--account or BOUNTY_ACCOUNT)");
            };
            let client = connect(config.client)?;
            let balance = client.ledger().balance_of(account).await?;
            println!("{account} {balance}");
            Ok(())
        }
    }
}

async fn serve(config: DaemonConfig) -> anyhow::Result<()> {
    let server = RpcServer::bind(&config.server)
        .await
        .with_context(|| format!("starting ledger service on {}", config.server.listen_addr()))?;
    info!(
        addr = %server.local_addr()?,
        block_interval_ms = config.server.block_interval_ms,
        metrics = config.server.enable_metrics,
        "starting bounty ledger service"
    );

    let shutdown = Arc::new(ShutdownController::new());
    let run = server.run(&shutdown);
    let signals = shutdown.clone();
    tokio::spawn(async move { signals.wait_for_signal().await });

    run.await?;
    info!("bountyd exited cleanly");
    Ok(())
}

fn connect(config: ClientConfig) -> anyhow::Result<BountyClient<RpcLedger>> {
    let endpoint = config.endpoint.clone();
    BountyClient::connect(config).with_context(|| format!("connecting to {endpoint}"))
}

async fn report(pending: PendingTx<RpcLedger>, wait: bool) -> anyhow::Result<()> {
    println!("submitted {} {}", pending.call(), pending.hash());
    if wait {
        let hash = pending.wait().await?;
        println!("confirmed {hash}");
    } else {
        println!("pending; run `bountyd list` after the next block to see the result");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn accept_defaults_to_first_fulfillment() {
        let cli = Cli::try_parse_from(["bountyd", "accept", "3"]).unwrap();
        match cli.command {
            Command::Accept {
                id, fulfillment, ..
            } => {
                assert_eq!(id, 3);
                assert_eq!(fulfillment, 0);
            }
            _ => panic!("expected accept"),
        }
    }

    #[test]
    fn flags_override_file_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bountyd.toml");
        std::fs::write(&path, "[client]\nendpoint = \"http://file:1\"\n[server]\nport = 1\n").unwrap();
        let cli = Cli::try_parse_from([
            "bountyd",
            "--config",
            path.to_str().unwrap(),
            "--endpoint",
            "http://flag:2",
            "serve",
            "--port",
            "2",
            "--fund",
            "0x782396570dcc0cb520b5e1661d4a359e3dc00f9e=5",
        ])
        .unwrap();
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.client.endpoint, "http://flag:2");
        assert_eq!(config.server.port, 2);
        assert_eq!(config.server.genesis.len(), 1);
        assert_eq!(config.server.genesis[0].ether, "5");
    }

    #[test]
    fn allocation_requires_valid_parts() {
        assert!(parse_allocation("0x782396570dcc0cb520b5e1661d4a359e3dc00f9e=0.5").is_ok());
        assert!(parse_allocation("0x1234=1").is_err());
        assert!(parse_allocation("0x782396570dcc0cb520b5e1661d4a359e3dc00f9e").is_err());
        assert!(parse_allocation("0x782396570dcc0cb520b5e1661d4a359e3dc00f9e=much").is_err());
    }
}
