//! kv-block-index command-line tool.
//!
//! Inspects the transfer policy a serving session would run with, and
//! encodes/decodes block address words for debugging kernel inputs.

use clap::Parser;
use tracing::{error, info};

use kv_block_index::cache::address::{encoded_words, AddressError, BlockAddress};
use kv_block_index::config::{Cli, Command, Config};
use kv_block_index::transfer::policy::TransferPolicy;

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "kv_block_index=debug"
    } else {
        "kv_block_index=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("kv-block-index v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Policy => {
            let config = Config::load(&cli.config)?;
            let policy = TransferPolicy::try_from(&config.transfer).inspect_err(|e| {
                error!(error = %e, "Invalid transfer configuration");
            })?;
            let resolved = policy.resolve(&config.transfer.defaults());

            info!(
                backend = %resolved.backend,
                max_tokens_in_buffer = ?resolved.max_tokens_in_buffer,
                timeout_ms = resolved.transfer_timeout_ms(),
                "Resolved transfer policy"
            );
            println!("backend: {}", resolved.backend);
            match resolved.max_tokens_in_buffer {
                Some(max_tokens) => println!("max_tokens_in_buffer: {max_tokens}"),
                None => println!("max_tokens_in_buffer: unbounded"),
            }
            println!(
                "transfer_timeout_ms: {}{}",
                resolved.transfer_timeout_ms(),
                if policy.transfer_timeout().is_none() {
                    " (default)"
                } else {
                    ""
                }
            );
        }
        Command::Encode { slot, tier } => {
            let addr = match usize::try_from(slot) {
                Ok(index) => BlockAddress::try_from_index(index, tier)?,
                Err(_) => return Err(AddressError::NegativeSlot(slot).into()),
            };
            println!("{}", encoded_words(&[addr])[0]);
        }
        Command::Decode { word } => {
            let addr = BlockAddress::try_from_word(word)?;
            println!("tier: {} slot: {}", addr.tier(), addr.slot());
        }
    }

    Ok(())
}
