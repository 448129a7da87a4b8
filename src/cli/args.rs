//! CLI argument definitions using clap
//!
//! Commands:
//! - docmodel get --id <id> [--partition-key <pk>]
//! - docmodel latest --model-field <field> --id <model id>
//! - docmodel versions --model-field <field> --id <model id>
//! - docmodel update-ttl --model-field <field> --id <model id> --ttl <secs|never>
//! - docmodel list --partition-field <field> --partition-value <value>

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::model::Ttl;
use crate::observability::LogFormat;

/// Inspect typed, versioned documents in a document store container
#[derive(Parser, Debug)]
#[command(name = "docmodel")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "./docmodel.json")]
    pub config: PathBuf,

    /// Log line format on stderr (compact or json)
    #[arg(long, global = true, default_value = "compact")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Locates one model's version chain
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ChainArgs {
    /// Payload field holding the logical model id
    #[arg(long)]
    pub model_field: String,

    /// Logical model id
    #[arg(long)]
    pub id: String,

    /// Payload field holding the container partition key
    #[arg(long)]
    pub partition_field: Option<String>,

    /// Partition key value, when it differs from the model id
    #[arg(long)]
    pub partition_key: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read one document by store id
    Get {
        #[arg(long)]
        id: String,

        /// Defaults to the id
        #[arg(long)]
        partition_key: Option<String>,
    },

    /// Show the latest version of a model
    Latest {
        #[command(flatten)]
        chain: ChainArgs,
    },

    /// List every version of a model, oldest first
    Versions {
        #[command(flatten)]
        chain: ChainArgs,
    },

    /// Set the same TTL on every version of a model
    UpdateTtl {
        #[command(flatten)]
        chain: ChainArgs,

        /// Seconds, or "never"
        #[arg(long)]
        ttl: Ttl,
    },

    /// Page through documents of one partition value, newest id first
    List {
        #[arg(long)]
        partition_field: String,

        #[arg(long)]
        partition_value: String,

        #[arg(long, default_value_t = 20)]
        page_size: usize,

        /// Continue after this cursor (a previous page's `next`)
        #[arg(long)]
        after: Option<String>,

        /// Go back before this cursor (a previous page's `prev`)
        #[arg(long)]
        before: Option<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_update_ttl() {
        let cli = Cli::try_parse_from([
            "docmodel",
            "update-ttl",
            "--model-field",
            "fiscalCode",
            "--id",
            "AAA",
            "--ttl",
            "never",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("./docmodel.json"));
        match cli.command {
            Command::UpdateTtl { chain, ttl } => {
                assert_eq!(chain.model_field, "fiscalCode");
                assert_eq!(ttl, Ttl::Never);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_rejects_invalid_ttl() {
        let result = Cli::try_parse_from([
            "docmodel",
            "update-ttl",
            "--model-field",
            "f",
            "--id",
            "a",
            "--ttl",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "docmodel",
            "get",
            "--id",
            "a",
            "--config",
            "/etc/docmodel.json",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/docmodel.json"));
        assert_eq!(cli.log_format, LogFormat::Json);
    }
}
