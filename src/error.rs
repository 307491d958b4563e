//! Error taxonomy for a monitoring run
//!
//! `MonitorError` covers everything the pipeline can surface. Decode misses
//! are a separate, non-fatal kind (`DecodeMiss`) that is counted and logged
//! rather than propagated.

use crate::report::ContractReport;
use alloy_primitives::B256;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MonitorError>;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// Node or explorer unreachable, timed out, or answered with a bad HTTP payload.
    #[error("transport error: {0}")]
    Transport(String),

    /// The JSON-RPC response carried an `error` object.
    #[error("rpc error {code}: {message}")]
    Protocol { code: i64, message: String },

    #[error("malformed ABI: {0}")]
    MalformedAbi(String),

    #[error("decode miss: {0}")]
    UnknownSelector(#[from] DecodeMiss),

    #[error("block not found: {0}")]
    BlockNotFound(String),

    #[error("transaction not found: 0x{0:x}")]
    TransactionNotFound(B256),

    /// A well-formed JSON-RPC result that could not be interpreted.
    #[error("malformed response for {method}: {reason}")]
    MalformedResponse { method: String, reason: String },

    /// Explorer answered with `status != "1"`.
    #[error("explorer request failed: {0}")]
    Explorer(String),

    #[error("sender recovery failed: {0}")]
    Signature(String),

    #[error("run cancelled")]
    Cancelled,
}

impl MonitorError {
    /// Whether this error must abort the whole run rather than one transaction.
    pub fn aborts_run(&self) -> bool {
        matches!(self, MonitorError::Transport(_) | MonitorError::Cancelled)
    }
}

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        MonitorError::Transport(err.to_string())
    }
}

/// Why a call or log could not be resolved against the ABI.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum DecodeMiss {
    #[error("calldata too short for a selector ({len} bytes)")]
    ShortCalldata { len: usize },

    #[error("selector 0x{} not in ABI", hex::encode(.0))]
    UnknownSelector([u8; 4]),

    #[error("log has no topics (anonymous event)")]
    AnonymousLog,

    #[error("topic 0x{0:x} not in ABI")]
    UnknownTopic(B256),
}

/// Pipeline phase a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    RegistryBuild,
    Fetch,
    Decode,
    Policy,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::RegistryBuild => "registry build",
            Phase::Fetch => "fetch",
            Phase::Decode => "decode",
            Phase::Policy => "policy",
        };
        f.write_str(name)
    }
}

/// A monitoring run that did not complete.
///
/// `partial` holds whatever was aggregated before the failure, if the run got
/// far enough to produce counters.
#[derive(Debug, Error)]
#[error("{phase} phase failed: {error}")]
pub struct RunFailure {
    pub phase: Phase,
    #[source]
    pub error: MonitorError,
    pub partial: Option<ContractReport>,
}

impl RunFailure {
    pub fn new(phase: Phase, error: MonitorError) -> Self {
        Self {
            phase,
            error,
            partial: None,
        }
    }

    pub fn with_partial(mut self, report: ContractReport) -> Self {
        self.partial = Some(report);
        self
    }

    pub fn has_partial(&self) -> bool {
        self.partial.is_some()
    }
}
