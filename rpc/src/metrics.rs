//! Prometheus metrics for the ledger service.
//!
//! [`LedgerMetrics`] owns a dedicated [`Registry`] that the `/metrics`
//! endpoint encodes into the Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, Histogram,
    HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

pub struct LedgerMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// RPC requests by action.
    pub requests: IntCounterVec,
    /// RPC requests that returned an error, by error kind.
    pub request_errors: IntCounterVec,
    pub transactions_submitted: IntCounter,
    pub transactions_confirmed: IntCounter,
    pub transactions_failed: IntCounter,
    pub blocks_produced: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub block_height: IntGauge,
    pub pending_transactions: IntGauge,
    pub bounty_count: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time spent handling one RPC request, in milliseconds.
    pub request_latency_ms: Histogram,
}

impl LedgerMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests = register_int_counter_vec_with_registry!(
            Opts::new("bounty_rpc_requests_total", "RPC requests received"),
            &["action"],
            registry
        )?;
        let request_errors = register_int_counter_vec_with_registry!(
            Opts::new("bounty_rpc_errors_total", "RPC requests answered with an error"),
            &["kind"],
            registry
        )?;
        let transactions_submitted = register_int_counter_with_registry!(
            Opts::new("bounty_transactions_submitted_total", "Transactions accepted into the pool"),
            registry
        )?;
        let transactions_confirmed = register_int_counter_with_registry!(
            Opts::new("bounty_transactions_confirmed_total", "Transactions confirmed in a block"),
            registry
        )?;
        let transactions_failed = register_int_counter_with_registry!(
            Opts::new("bounty_transactions_failed_total", "Transactions that failed at inclusion"),
            registry
        )?;
        let blocks_produced = register_int_counter_with_registry!(
            Opts::new("bounty_blocks_produced_total", "Non-empty blocks produced"),
            registry
        )?;

        let block_height = register_int_gauge_with_registry!(
            Opts::new("bounty_block_height", "Current block height"),
            registry
        )?;
        let pending_transactions = register_int_gauge_with_registry!(
            Opts::new("bounty_pending_transactions", "Transactions waiting for inclusion"),
            registry
        )?;
        let bounty_count = register_int_gauge_with_registry!(
            Opts::new("bounty_count", "Bounties on the ledger"),
            registry
        )?;

        let request_latency_ms = register_histogram_with_registry!(
            HistogramOpts::new("bounty_rpc_latency_ms", "RPC handling time in milliseconds")
                .buckets(prometheus::exponential_buckets(0.1, 2.0, 15)?),
            registry
        )?;

        Ok(Self {
            registry,
            requests,
            request_errors,
            transactions_submitted,
            transactions_confirmed,
            transactions_failed,
            blocks_produced,
            block_height,
            pending_transactions,
            bounty_count,
            request_latency_ms,
        })
    }

    /// Encode every registered metric in the text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
