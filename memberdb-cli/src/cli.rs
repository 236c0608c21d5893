use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Subcommand, Debug, Serialize, Clone)]
pub enum Command {
    /// Register the commitment of an owner and publish the new root
    Register {
        #[arg(long)]
        owner: String,

        /// 32-byte commitment as 0x-prefixed hex
        #[arg(long)]
        commitment: String,
    },
    /// Show the commitment registered by an owner
    Lookup {
        #[arg(long)]
        owner: String,
    },
    /// Show the latest root, or the root of one version
    Root {
        #[arg(long)]
        version: Option<u64>,
    },
    /// List every published root, oldest first
    History,
    /// Inclusion proof of a commitment against the latest root
    Prove {
        #[arg(long, conflicts_with = "owner", required_unless_present = "owner")]
        commitment: Option<String>,

        #[arg(long)]
        owner: Option<String>,
    },
    /// Check a proof offline; needs no database
    Verify {
        #[arg(long)]
        leaf: String,

        #[arg(long)]
        root: String,

        /// Proof as JSON, e.g. [{"sibling":"0x..","position":"right"}]
        #[arg(long)]
        proof: String,
    },
    /// Record the payment-backed verification of an owner
    RecordVerification {
        #[arg(long)]
        owner: String,

        #[arg(long)]
        transaction_ref: String,

        #[arg(long)]
        amount: String,

        #[arg(long)]
        payer_address: String,
    },
    /// Show the verification state of an owner
    Status {
        #[arg(long)]
        owner: String,
    },
    /// Rebuild the tree from the stored commitments and publish it
    Rebuild,
}

#[derive(Parser, Debug, Serialize, Clone)]
#[command(version, about = "Commitment registry with versioned Merkle roots")]
pub struct RegistryCli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory to store the registry's table logs
    #[arg(long, default_value = "/tmp/memberdb")]
    pub db_dir: String,

    /// Acknowledge writes before they reach the disk
    #[arg(long, default_value_t = false)]
    pub no_sync: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
