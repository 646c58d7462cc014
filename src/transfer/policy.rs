//! Transfer policy for KV block handoff between serving instances.
//!
//! A context instance produces KV blocks and a generation instance consumes
//! them. The [`TransferPolicy`] says which transport carries the handoff, how
//! many tokens may be staged in the transfer buffer at once and how long one
//! handoff may take before the transfer subsystem abandons it.
//!
//! Every field is optional. An unset field means "use the default", which the
//! transfer subsystem picks through [`TransferPolicy::resolve`].

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::TransferConfig;

/// Rejected transfer policy values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferPolicyError {
    #[error("Max tokens in buffer must be non-negative, got {0}")]
    NegativeTokenBound(i64),

    #[error("Max tokens in buffer {0} is not representable on this platform")]
    TokenBoundTooLarge(i64),

    #[error("Transfer timeout must be non-negative, got {0} ms")]
    NegativeTimeout(i64),

    #[error("Unknown transport backend: {0:?}")]
    UnknownBackend(String),
}

/// Transport implementation used for a handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportBackend {
    /// Let the transfer subsystem pick.
    #[serde(rename = "DEFAULT", alias = "AUTO", alias = "default", alias = "auto")]
    Auto,
    /// MPI point-to-point.
    #[serde(rename = "MPI", alias = "mpi")]
    Mpi,
    /// Unified Communication X.
    #[serde(rename = "UCX", alias = "ucx")]
    Ucx,
    /// NIXL transfer library.
    #[serde(rename = "NIXL", alias = "nixl")]
    Nixl,
}

impl FromStr for TransportBackend {
    type Err = TransferPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEFAULT" | "AUTO" => Ok(TransportBackend::Auto),
            "MPI" => Ok(TransportBackend::Mpi),
            "UCX" => Ok(TransportBackend::Ucx),
            "NIXL" => Ok(TransportBackend::Nixl),
            _ => Err(TransferPolicyError::UnknownBackend(s.to_string())),
        }
    }
}

impl fmt::Display for TransportBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportBackend::Auto => write!(f, "DEFAULT"),
            TransportBackend::Mpi => write!(f, "MPI"),
            TransportBackend::Ucx => write!(f, "UCX"),
            TransportBackend::Nixl => write!(f, "NIXL"),
        }
    }
}

/// Number of policies built in this process.
static POLICIES_CONSTRUCTED: AtomicU64 = AtomicU64::new(0);

/// How KV blocks are handed off from a context instance to a generation
/// instance.
///
/// Expected to be built once per serving session and owned by the session
/// controller. Setters take `&mut self`; sharing a policy across concurrent
/// handoffs requires the owner to serialize updates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransferPolicy {
    backend: Option<TransportBackend>,
    max_tokens_in_buffer: Option<usize>,
    transfer_timeout: Option<Duration>,
}

impl TransferPolicy {
    /// Store the given values verbatim.
    ///
    /// Logs whether an explicit transfer timeout was supplied, since an unset
    /// timeout means some downstream default governs the handoff.
    pub fn new(
        backend: Option<TransportBackend>,
        max_tokens_in_buffer: Option<usize>,
        transfer_timeout: Option<Duration>,
    ) -> Self {
        let constructed = POLICIES_CONSTRUCTED.fetch_add(1, Ordering::Relaxed) + 1;

        match transfer_timeout {
            Some(timeout) => info!(
                timeout_ms = duration_ms(timeout),
                "TransferPolicy initialized with transfer timeout"
            ),
            None => info!("TransferPolicy initialized without transfer timeout"),
        }

        // One policy per session is the contract; a second one usually means
        // the session config is being rebuilt.
        if constructed > 1 {
            debug!(
                constructed,
                "TransferPolicy constructed again in this process"
            );
        }

        Self {
            backend,
            max_tokens_in_buffer,
            transfer_timeout,
        }
    }

    /// Number of policies constructed so far in this process.
    pub fn constructed_count() -> u64 {
        POLICIES_CONSTRUCTED.load(Ordering::Relaxed)
    }

    /// Start building a policy; the diagnostic fires once, at `build()`.
    pub fn builder() -> TransferPolicyBuilder {
        TransferPolicyBuilder::default()
    }

    /// Replace the transport backend.
    pub fn set_backend(&mut self, backend: Option<TransportBackend>) {
        self.backend = backend;
    }

    /// Replace the transfer buffer bound, in tokens.
    pub fn set_max_tokens_in_buffer(&mut self, max_tokens: Option<usize>) {
        self.max_tokens_in_buffer = max_tokens;
    }

    /// Replace the handoff timeout.
    pub fn set_transfer_timeout(&mut self, timeout: Option<Duration>) {
        self.transfer_timeout = timeout;
    }

    /// Set the buffer bound from an untrusted signed value. On error the
    /// previous bound is kept.
    pub fn try_set_max_tokens_in_buffer(
        &mut self,
        max_tokens: Option<i64>,
    ) -> Result<(), TransferPolicyError> {
        self.max_tokens_in_buffer = max_tokens.map(validate_token_bound).transpose()?;
        Ok(())
    }

    /// Set the timeout from an untrusted signed millisecond count. On error the
    /// previous timeout is kept.
    pub fn try_set_transfer_timeout_ms(
        &mut self,
        timeout_ms: Option<i64>,
    ) -> Result<(), TransferPolicyError> {
        self.transfer_timeout = timeout_ms.map(validate_timeout_ms).transpose()?;
        Ok(())
    }

    /// Transport backend, if one was chosen.
    pub fn backend(&self) -> Option<TransportBackend> {
        self.backend
    }

    /// Transfer buffer bound in tokens, if set.
    pub fn max_tokens_in_buffer(&self) -> Option<usize> {
        self.max_tokens_in_buffer
    }

    /// Handoff timeout, if set.
    pub fn transfer_timeout(&self) -> Option<Duration> {
        self.transfer_timeout
    }

    /// The timeout in whole milliseconds.
    pub fn transfer_timeout_ms(&self) -> Option<u64> {
        self.transfer_timeout.map(duration_ms)
    }

    /// Fill unset fields from `defaults`, logging each default that ends up
    /// governing the handoff.
    pub fn resolve(&self, defaults: &TransferDefaults) -> ResolvedTransfer {
        let backend = match self.backend {
            Some(backend) => backend,
            None => {
                debug!(backend = %defaults.backend, "No transport backend set, using default");
                defaults.backend
            }
        };

        let max_tokens_in_buffer = match self.max_tokens_in_buffer {
            Some(max_tokens) => Some(max_tokens),
            None => {
                debug!(
                    max_tokens = ?defaults.max_tokens_in_buffer,
                    "No transfer buffer bound set, using default"
                );
                defaults.max_tokens_in_buffer
            }
        };

        let transfer_timeout = match self.transfer_timeout {
            Some(timeout) => timeout,
            None => {
                debug!(
                    timeout_ms = duration_ms(defaults.transfer_timeout),
                    "No transfer timeout set, using default"
                );
                defaults.transfer_timeout
            }
        };

        ResolvedTransfer {
            backend,
            max_tokens_in_buffer,
            transfer_timeout,
        }
    }
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

impl TryFrom<&TransferConfig> for TransferPolicy {
    type Error = TransferPolicyError;

    fn try_from(cfg: &TransferConfig) -> Result<Self, Self::Error> {
        let max_tokens = cfg.max_tokens_in_buffer.map(validate_token_bound).transpose()?;
        let timeout = cfg.transfer_timeout_ms.map(validate_timeout_ms).transpose()?;
        Ok(Self::new(cfg.backend, max_tokens, timeout))
    }
}

/// Collects policy fields in any order and constructs the policy once.
#[derive(Debug, Clone, Default)]
pub struct TransferPolicyBuilder {
    backend: Option<TransportBackend>,
    max_tokens_in_buffer: Option<usize>,
    transfer_timeout: Option<Duration>,
}

impl TransferPolicyBuilder {
    /// Set the transport backend.
    pub fn backend(mut self, backend: TransportBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the transfer buffer bound, in tokens.
    pub fn max_tokens_in_buffer(mut self, max_tokens: usize) -> Self {
        self.max_tokens_in_buffer = Some(max_tokens);
        self
    }

    /// Set the handoff timeout.
    pub fn transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout = Some(timeout);
        self
    }

    /// Construct the policy from the collected values.
    pub fn build(self) -> TransferPolicy {
        TransferPolicy::new(self.backend, self.max_tokens_in_buffer, self.transfer_timeout)
    }
}

/// Values the transfer subsystem applies when a policy field is unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferDefaults {
    pub backend: TransportBackend,
    pub max_tokens_in_buffer: Option<usize>,
    pub transfer_timeout: Duration,
}

impl Default for TransferDefaults {
    fn default() -> Self {
        Self {
            backend: TransportBackend::Auto,
            max_tokens_in_buffer: None,
            transfer_timeout: Duration::from_millis(5000),
        }
    }
}

/// A policy with every default applied; what a handoff actually runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTransfer {
    pub backend: TransportBackend,
    /// None = unbounded.
    pub max_tokens_in_buffer: Option<usize>,
    pub transfer_timeout: Duration,
}

impl ResolvedTransfer {
    /// The governing timeout in whole milliseconds.
    pub fn transfer_timeout_ms(&self) -> u64 {
        duration_ms(self.transfer_timeout)
    }
}

fn validate_token_bound(max_tokens: i64) -> Result<usize, TransferPolicyError> {
    if max_tokens < 0 {
        return Err(TransferPolicyError::NegativeTokenBound(max_tokens));
    }
    usize::try_from(max_tokens).map_err(|_| TransferPolicyError::TokenBoundTooLarge(max_tokens))
}

fn validate_timeout_ms(timeout_ms: i64) -> Result<Duration, TransferPolicyError> {
    u64::try_from(timeout_ms)
        .map(Duration::from_millis)
        .map_err(|_| TransferPolicyError::NegativeTimeout(timeout_ms))
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
