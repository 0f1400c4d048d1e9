// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # CLI Parser
//!
//! Command-line interface parsing using clap. Each subcommand is a direct
//! front end onto one pipeline stage or UBI assignment-engine operation
//! (spec's Router/Standard parser/Chunk splitter/Aggregator/Enricher/
//! Post-to-Entrata/UBI assignment engine/master-bill generator); security
//! validation happens afterwards in the `validator` module.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Main CLI structure
#[derive(Parser, Debug, Clone)]
#[command(name = "billpipe")]
#[command(about = concat!("Bill Ingest Pipeline v", env!("CARGO_PKG_VERSION")))]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path (layered under defaults and `BILLPIPE__*` env vars)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of concurrent chunk-processor workers
    ///
    /// Bounds how many chunks of a single job are in flight against the LLM
    /// at once. Default: the chunk count of the smallest routed job, capped
    /// by the configured key-pool size.
    #[arg(long)]
    pub workers: Option<usize>,
}

/// Shared arguments identifying a UBI ledger row.
#[derive(Args, Debug, Clone)]
pub struct UbiKeyArgs {
    /// Stable line hash (the UBI ledger's primary key)
    #[arg(long)]
    pub line_hash: String,

    /// Billing period, `YYYY-MM`
    #[arg(long)]
    pub period: String,
}

/// UBI assignment engine subcommands (spec.md §4.9).
#[derive(Subcommand, Debug, Clone)]
pub enum UbiCommand {
    /// Assign a line to a UBI code for a billing period
    Assign {
        #[command(flatten)]
        key: UbiKeyArgs,

        /// UBI code to assign
        #[arg(long)]
        ubi_code: String,
    },

    /// Reassign an already-assigned line to a different UBI code
    Reassign {
        #[command(flatten)]
        key: UbiKeyArgs,

        /// New UBI code
        #[arg(long)]
        ubi_code: String,
    },

    /// Remove a line's assignment for a period without archiving it
    Unassign {
        #[command(flatten)]
        key: UbiKeyArgs,
    },

    /// Move an assignment from the active table to the historical archive
    Archive {
        #[command(flatten)]
        key: UbiKeyArgs,
    },

    /// Suggest a UBI code for a property based on prior assignment history
    Suggest {
        /// Property identifier to suggest for
        #[arg(long)]
        property_id: String,
    },

    /// List lines with no UBI assignment for a given date
    ListUnassigned {
        /// Date in YYYY-MM-DD form
        #[arg(long)]
        date: String,
    },

    /// List lines already UBI-assigned for a given date
    ListAssigned {
        /// Date in YYYY-MM-DD form
        #[arg(long)]
        date: String,
    },

    /// List archived UBI assignments for a given date
    ListArchived {
        /// Date in YYYY-MM-DD form
        #[arg(long)]
        date: String,
    },

    /// Print unassigned/assigned/archived counts for a property
    Stats {
        /// Property identifier
        #[arg(long)]
        property_id: String,
    },

    /// Generate the master-bill roll-up for a date range
    MasterBills {
        /// Range start, YYYY-MM-DD
        #[arg(long)]
        from: String,

        /// Range end, YYYY-MM-DD
        #[arg(long)]
        to: String,
    },
}

/// Review/draft-store subcommands (spec.md §4.7).
#[derive(Subcommand, Debug, Clone)]
pub enum ReviewCommand {
    /// Start (or resume) a review draft for a PDF
    Start {
        #[arg(long)]
        pdf_id: String,
    },

    /// Record a field override on a line within an in-progress draft
    Override {
        #[arg(long)]
        pdf_id: String,

        #[arg(long)]
        line_id: String,

        #[arg(long)]
        field: String,

        #[arg(long)]
        value: String,
    },

    /// Mark a draft submitted, building its Stage 6 batch
    Submit {
        #[arg(long)]
        pdf_id: String,
    },
}

/// CLI subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Route a pending object to the standard or chunked parsing path
    Route {
        /// Object-store key under Stage1_Pending/
        #[arg(short, long)]
        key: String,
    },

    /// Run the standard (single-call) parser against a routed object
    Parse {
        /// Object-store key under Stage2_Routed/Standard/
        #[arg(short, long)]
        key: String,
    },

    /// Split a large PDF into page-range chunks and register the parse job
    Split {
        /// Object-store key under Stage2_Routed/LargeFile/
        #[arg(short, long)]
        key: String,
    },

    /// Print the status of a chunked parse job
    JobStatus {
        #[arg(long)]
        job_id: String,
    },

    /// Enrich the parsed rows for a PDF against the latest dimension exports
    Enrich {
        #[arg(long)]
        pdf_id: String,
    },

    /// Review/draft-store operations
    Review {
        #[command(subcommand)]
        command: ReviewCommand,
    },

    /// Post a batch of PDFs to Entrata
    PostEntrata {
        /// Object-store keys to post
        #[arg(long, value_delimiter = ',')]
        keys: Vec<String>,

        /// Optional vendor-name override applied to every row in the batch
        #[arg(long)]
        vendor_override: Option<String>,

        /// Optional posting month override, YYYY-MM
        #[arg(long)]
        post_month: Option<String>,
    },

    /// UBI assignment engine operations
    Ubi {
        #[command(subcommand)]
        command: UbiCommand,
    },

    /// Validate a pipeline configuration file without running anything
    ValidateConfig {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Parses CLI arguments, letting clap exit the process on `--help`/`--version`/parse failure.
pub fn parse_cli() -> Cli {
    Cli::parse()
}
