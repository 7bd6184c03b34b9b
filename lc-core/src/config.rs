//! Configuration for LC orchestration

use crate::operation::OperationKind;
use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// HTTP listen address
    pub listen_addr: String,

    /// Largest accepted document upload (bytes)
    pub max_document_bytes: usize,

    /// Ledger collaborator
    pub ledger: LedgerConfig,

    /// Transaction submission pipeline
    pub pipeline: PipelineConfig,

    /// Default parties
    pub parties: PartyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "lc-gateway".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            listen_addr: "0.0.0.0:5000".to_string(),
            max_document_bytes: 10 * 1024 * 1024, // 10 MiB
            ledger: LedgerConfig::default(),
            pipeline: PipelineConfig::default(),
            parties: PartyConfig::default(),
        }
    }
}

/// Which ledger collaborator to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerMode {
    /// Simulated in-process contract ledger
    Memory,
    /// JSON-RPC node
    Rpc,
}

/// Ledger collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Collaborator kind
    pub mode: LedgerMode,

    /// JSON-RPC endpoint
    pub rpc_url: String,

    /// Per-request timeout (milliseconds)
    pub request_timeout_ms: u64,

    /// Receipt poll interval (milliseconds)
    pub poll_interval_ms: u64,

    /// Fee floor of the in-memory ledger
    pub memory_fee_rate: u64,

    /// Delay before in-memory receipts become final (milliseconds)
    pub memory_confirmation_delay_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            mode: LedgerMode::Memory,
            rpc_url: "http://127.0.0.1:8545".to_string(),
            request_timeout_ms: 10_000,
            poll_interval_ms: 250,
            memory_fee_rate: 1_000,
            memory_confirmation_delay_ms: 500,
        }
    }
}

impl LedgerConfig {
    /// Receipt poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Per-request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Transaction submission pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bound on the confirmation wait (milliseconds)
    pub confirmation_timeout_ms: u64,

    /// Re-fetch attempts after a sequence collision
    pub max_sequence_retries: u32,

    /// Fee increase for the single underpriced retry (percent)
    pub fee_bump_percent: u64,

    /// Backoff for transient failures
    pub retry: RetryConfig,

    /// Computation budget ceilings
    pub gas_budgets: GasBudgets,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout_ms: 30_000,
            max_sequence_retries: 3,
            fee_bump_percent: 25,
            retry: RetryConfig::default(),
            gas_budgets: GasBudgets::default(),
        }
    }
}

impl PipelineConfig {
    /// Bound on the confirmation wait
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }
}

/// Exponential backoff with jitter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts after the first for transient ledger reads
    pub max_retries: u32,

    /// First backoff delay (milliseconds)
    pub initial_delay_ms: u64,

    /// Backoff cap (milliseconds)
    pub max_delay_ms: u64,

    /// Growth per attempt
    pub backoff_multiplier: f64,

    /// Randomised fraction of the delay
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 2_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1, // 10% jitter
        }
    }
}

/// Fixed computation budget per operation kind
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GasBudgets {
    /// `createLC`
    pub create_lc: u64,
    /// `approveLCByBank`
    pub approve_lc: u64,
    /// `submitDocuments`
    pub submit_documents: u64,
    /// `closeLC`
    pub close_lc: u64,
}

impl Default for GasBudgets {
    fn default() -> Self {
        Self {
            create_lc: 2_000_000,
            approve_lc: 1_000_000,
            submit_documents: 1_000_000,
            close_lc: 1_000_000,
        }
    }
}

impl GasBudgets {
    /// Ceiling for `kind`
    pub fn for_kind(&self, kind: OperationKind) -> u64 {
        match kind {
            OperationKind::CreateLc => self.create_lc,
            OperationKind::ApproveLc => self.approve_lc,
            OperationKind::SubmitDocuments => self.submit_documents,
            OperationKind::CloseLc => self.close_lc,
        }
    }
}

/// Default parties
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PartyConfig {
    /// Signer used when a request names none
    pub default_signer: Option<Address>,

    /// Buyer's bank used when `createLC` names none
    pub default_buyer_bank: Option<Address>,
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables (and `.env`, if present)
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match std::env::var("LC_CONFIG_FILE") {
            Ok(path) => Config::from_file(path)?,
            Err(_) => Config::default(),
        };

        if let Ok(addr) = std::env::var("LC_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Ok(mode) = std::env::var("LC_LEDGER_MODE") {
            config.ledger.mode = match mode.to_ascii_lowercase().as_str() {
                "memory" => LedgerMode::Memory,
                "rpc" => LedgerMode::Rpc,
                other => {
                    return Err(crate::Error::Config(format!(
                        "Unknown LC_LEDGER_MODE: {}",
                        other
                    )))
                }
            };
        }

        if let Ok(url) = std::env::var("LC_LEDGER_RPC_URL") {
            config.ledger.rpc_url = url;
        }

        if let Ok(timeout) = std::env::var("LC_CONFIRMATION_TIMEOUT_MS") {
            config.pipeline.confirmation_timeout_ms = timeout.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid LC_CONFIRMATION_TIMEOUT_MS: {}", e))
            })?;
        }

        if let Ok(signer) = std::env::var("LC_DEFAULT_SIGNER") {
            config.parties.default_signer = Some(
                Address::parse(&signer)
                    .map_err(|e| crate::Error::Config(format!("LC_DEFAULT_SIGNER: {}", e)))?,
            );
        }

        if let Ok(bank) = std::env::var("LC_DEFAULT_BUYER_BANK") {
            config.parties.default_buyer_bank = Some(
                Address::parse(&bank)
                    .map_err(|e| crate::Error::Config(format!("LC_DEFAULT_BUYER_BANK: {}", e)))?,
            );
        }

        Ok(config)
    }
}
