//! Runtime configuration for kv-block-index.
//!
//! Configuration is loaded from a JSON file or constructed programmatically.
//! Transfer knobs arrive here as raw numbers and are validated when converted
//! into a [`TransferPolicy`](crate::transfer::policy::TransferPolicy).

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::cache::tier::MemoryTier;
use crate::transfer::policy::{TransferDefaults, TransportBackend};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "kv-block-index", about = "Inspect KV block addresses and transfer policy")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the transfer policy from the config file, with defaults applied.
    Policy,

    /// Encode a slot and tier into an address word.
    Encode {
        /// Slot index within the tier's pool.
        #[arg(allow_negative_numbers = true)]
        slot: i64,

        /// Tier name: primary/gpu, secondary/host, tertiary/disk.
        #[arg(short, long, default_value = "primary")]
        tier: MemoryTier,
    },

    /// Decode an address word into its tier and slot.
    Decode {
        /// Encoded word, as printed by `encode`.
        #[arg(allow_negative_numbers = true)]
        word: i32,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Cross-instance transfer settings.
    #[serde(default)]
    pub transfer: TransferConfig,
}

/// Transfer settings as they appear in the config file.
///
/// Optional fields left out of the file stay unset in the policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Transport backend ("DEFAULT", "MPI", "UCX", "NIXL").
    pub backend: Option<TransportBackend>,

    /// Maximum tokens staged in the transfer buffer at once.
    pub max_tokens_in_buffer: Option<i64>,

    /// Handoff timeout in milliseconds.
    pub transfer_timeout_ms: Option<i64>,

    /// Backend used when `backend` is unset.
    pub default_backend: TransportBackend,

    /// Timeout applied when `transfer_timeout_ms` is unset.
    pub default_transfer_timeout_ms: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            backend: None,
            max_tokens_in_buffer: None,
            transfer_timeout_ms: None,
            default_backend: TransportBackend::Auto,
            default_transfer_timeout_ms: 5000,
        }
    }
}

impl TransferConfig {
    /// Defaults the transfer subsystem falls back to for unset fields.
    pub fn defaults(&self) -> TransferDefaults {
        TransferDefaults {
            backend: self.default_backend,
            max_tokens_in_buffer: None,
            transfer_timeout: Duration::from_millis(self.default_transfer_timeout_ms),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.transfer.backend, None);
        assert_eq!(cfg.transfer.default_transfer_timeout_ms, 5000);
        assert_eq!(
            cfg.transfer.defaults().transfer_timeout,
            Duration::from_millis(5000)
        );
    }

    #[test]
    fn test_partial_json() {
        let cfg: Config =
            serde_json::from_str(r#"{"transfer": {"backend": "UCX", "transfer_timeout_ms": 10000}}"#)
                .unwrap();
        assert_eq!(cfg.transfer.backend, Some(TransportBackend::Ucx));
        assert_eq!(cfg.transfer.transfer_timeout_ms, Some(10000));
        assert_eq!(cfg.transfer.max_tokens_in_buffer, None);
        assert_eq!(cfg.transfer.default_backend, TransportBackend::Auto);

        let empty: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, Config::default());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["kv-block-index", "encode", "5", "--tier", "host"]).unwrap();
        match cli.command {
            Command::Encode { slot, tier } => {
                assert_eq!(slot, 5);
                assert_eq!(tier, MemoryTier::Secondary);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::try_parse_from(["kv-block-index", "encode", "-5"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Encode {
                slot: -5,
                tier: MemoryTier::Primary
            }
        ));

        let cli = Cli::try_parse_from(["kv-block-index", "decode", "-2147483643"]).unwrap();
        assert!(matches!(cli.command, Command::Decode { word: -2147483643 }));
    }
}
