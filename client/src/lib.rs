//! Bounty client SDK.
//!
//! Provides everything a front-end needs to work against a bounty ledger:
//! - Batched, ordered reads with an immutable published snapshot
//! - Writes with local pre-flight checks and idempotent retries
//! - Pending / confirmed / failed tracking for every write
//! - Display records and plain-text rendering
//! - A JSON-RPC transport for the ledger service

pub mod command;
pub mod config;
pub mod convert;
pub mod error;
pub mod query;
pub mod rpc_ledger;
pub mod view;

use std::sync::Arc;

use bounty_ledger::BountyLedger;

pub use command::{CommandLayer, NewBounty, PendingTx};
pub use config::ClientConfig;
pub use error::{ClientError, Phase};
pub use query::{BountyEntry, QueryLayer, Snapshot};
pub use rpc_ledger::RpcLedger;
pub use view::{render, rows, BountyActions, BountyRow, FulfillmentRow};

/// Query and command layers sharing one ledger connection.
pub struct BountyClient<L> {
    ledger: Arc<L>,
    config: ClientConfig,
    query: QueryLayer<L>,
    commands: Option<CommandLayer<L>>,
}

impl BountyClient<RpcLedger> {
    /// Connect to the ledger service named in `config`.
    pub fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let ledger = RpcLedger::new(config.endpoint.clone(), config.request_timeout())?;
        Ok(Self::new(Arc::new(ledger), config))
    }
}

impl<L: BountyLedger> BountyClient<L> {
    pub fn new(ledger: Arc<L>, config: ClientConfig) -> Self {
        let query = QueryLayer::new(ledger.clone(), &config);
        let commands = config
            .account
            .map(|account| CommandLayer::new(ledger.clone(), account, &config));
        Self {
            ledger,
            config,
            query,
            commands,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    pub fn query(&self) -> &QueryLayer<L> {
        &self.query
    }

    /// Command layer for the configured account.
    pub fn commands(&self) -> Result<&CommandLayer<L>, ClientError> {
        self.commands.as_ref().ok_or(ClientError::NoAccount)
    }
}
