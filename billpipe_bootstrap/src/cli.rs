// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface Module
//!
//! Bootstrap-layer CLI handling with security-first design.
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  1. parser::parse()                 │  Parse CLI with clap
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  2. validator::validate()           │  Security validation
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  3. ValidatedCli                    │  Safe, validated config
//! └─────────────────────────────────────┘
//! ```

pub mod parser;
pub mod validator;

pub use parser::{Cli, Commands, ReviewCommand, UbiCommand};
pub use validator::{ParseError, SecureArgParser};

use std::path::PathBuf;

/// Validated CLI configuration: all arguments security-checked and,
/// for filesystem paths, canonicalized.
#[derive(Debug, Clone)]
pub struct ValidatedCli {
    pub command: ValidatedCommand,
    pub verbose: bool,
    pub config: Option<PathBuf>,
    pub workers: Option<usize>,
}

/// A validated UBI ledger key (`line_hash`, `period`).
#[derive(Debug, Clone)]
pub struct ValidatedUbiKey {
    pub line_hash: String,
    pub period: String,
}

/// Validated UBI assignment engine commands.
#[derive(Debug, Clone)]
pub enum ValidatedUbiCommand {
    Assign { key: ValidatedUbiKey, ubi_code: String },
    Reassign { key: ValidatedUbiKey, ubi_code: String },
    Unassign { key: ValidatedUbiKey },
    Archive { key: ValidatedUbiKey },
    Suggest { property_id: String },
    ListUnassigned { date: String },
    ListAssigned { date: String },
    ListArchived { date: String },
    Stats { property_id: String },
    MasterBills { from: String, to: String },
}

/// Validated review/draft-store commands.
#[derive(Debug, Clone)]
pub enum ValidatedReviewCommand {
    Start { pdf_id: String },
    Override { pdf_id: String, line_id: String, field: String, value: String },
    Submit { pdf_id: String },
}

/// Validated command variants.
#[derive(Debug, Clone)]
pub enum ValidatedCommand {
    Route { key: String },
    Parse { key: String },
    Split { key: String },
    JobStatus { job_id: String },
    Enrich { pdf_id: String },
    Review { command: ValidatedReviewCommand },
    PostEntrata { keys: Vec<String>, vendor_override: Option<String>, post_month: Option<String> },
    Ubi { command: ValidatedUbiCommand },
    ValidateConfig { config: PathBuf },
}

/// Parses CLI arguments and applies security validation in one step.
pub fn parse_and_validate() -> Result<ValidatedCli, ParseError> {
    let cli = parser::parse_cli();
    validate_cli(cli)
}

fn validate_ubi_key(key: parser::UbiKeyArgs) -> Result<ValidatedUbiKey, ParseError> {
    SecureArgParser::validate_argument(&key.line_hash)?;
    SecureArgParser::validate_period(&key.period)?;
    Ok(ValidatedUbiKey {
        line_hash: key.line_hash,
        period: key.period,
    })
}

fn validate_ubi_command(command: UbiCommand) -> Result<ValidatedUbiCommand, ParseError> {
    Ok(match command {
        UbiCommand::Assign { key, ubi_code } => {
            SecureArgParser::validate_argument(&ubi_code)?;
            ValidatedUbiCommand::Assign {
                key: validate_ubi_key(key)?,
                ubi_code,
            }
        }
        UbiCommand::Reassign { key, ubi_code } => {
            SecureArgParser::validate_argument(&ubi_code)?;
            ValidatedUbiCommand::Reassign {
                key: validate_ubi_key(key)?,
                ubi_code,
            }
        }
        UbiCommand::Unassign { key } => ValidatedUbiCommand::Unassign {
            key: validate_ubi_key(key)?,
        },
        UbiCommand::Archive { key } => ValidatedUbiCommand::Archive {
            key: validate_ubi_key(key)?,
        },
        UbiCommand::Suggest { property_id } => {
            SecureArgParser::validate_argument(&property_id)?;
            ValidatedUbiCommand::Suggest { property_id }
        }
        UbiCommand::ListUnassigned { date } => {
            SecureArgParser::validate_argument(&date)?;
            ValidatedUbiCommand::ListUnassigned { date }
        }
        UbiCommand::ListAssigned { date } => {
            SecureArgParser::validate_argument(&date)?;
            ValidatedUbiCommand::ListAssigned { date }
        }
        UbiCommand::ListArchived { date } => {
            SecureArgParser::validate_argument(&date)?;
            ValidatedUbiCommand::ListArchived { date }
        }
        UbiCommand::Stats { property_id } => {
            SecureArgParser::validate_argument(&property_id)?;
            ValidatedUbiCommand::Stats { property_id }
        }
        UbiCommand::MasterBills { from, to } => {
            SecureArgParser::validate_argument(&from)?;
            SecureArgParser::validate_argument(&to)?;
            ValidatedUbiCommand::MasterBills { from, to }
        }
    })
}

fn validate_review_command(command: ReviewCommand) -> Result<ValidatedReviewCommand, ParseError> {
    Ok(match command {
        ReviewCommand::Start { pdf_id } => {
            SecureArgParser::validate_argument(&pdf_id)?;
            ValidatedReviewCommand::Start { pdf_id }
        }
        ReviewCommand::Override { pdf_id, line_id, field, value } => {
            SecureArgParser::validate_argument(&pdf_id)?;
            SecureArgParser::validate_argument(&line_id)?;
            SecureArgParser::validate_argument(&field)?;
            SecureArgParser::validate_argument(&value)?;
            ValidatedReviewCommand::Override { pdf_id, line_id, field, value }
        }
        ReviewCommand::Submit { pdf_id } => {
            SecureArgParser::validate_argument(&pdf_id)?;
            ValidatedReviewCommand::Submit { pdf_id }
        }
    })
}

/// Applies security validation to all parsed CLI arguments.
fn validate_cli(cli: Cli) -> Result<ValidatedCli, ParseError> {
    let config = if let Some(ref path) = cli.config {
        SecureArgParser::validate_argument(&path.to_string_lossy())?;
        Some(path.clone())
    } else {
        None
    };

    if let Some(workers) = cli.workers {
        if workers == 0 || workers > 256 {
            return Err(ParseError::InvalidValue {
                arg: "workers".to_string(),
                reason: "must be between 1 and 256".to_string(),
            });
        }
    }

    let command = match cli.command {
        Commands::Route { key } => {
            SecureArgParser::validate_argument(&key)?;
            ValidatedCommand::Route { key }
        }
        Commands::Parse { key } => {
            SecureArgParser::validate_argument(&key)?;
            ValidatedCommand::Parse { key }
        }
        Commands::Split { key } => {
            SecureArgParser::validate_argument(&key)?;
            ValidatedCommand::Split { key }
        }
        Commands::JobStatus { job_id } => {
            SecureArgParser::validate_argument(&job_id)?;
            ValidatedCommand::JobStatus { job_id }
        }
        Commands::Enrich { pdf_id } => {
            SecureArgParser::validate_argument(&pdf_id)?;
            ValidatedCommand::Enrich { pdf_id }
        }
        Commands::Review { command } => ValidatedCommand::Review {
            command: validate_review_command(command)?,
        },
        Commands::PostEntrata { keys, vendor_override, post_month } => {
            if keys.is_empty() {
                return Err(ParseError::MissingArgument("keys".to_string()));
            }
            for key in &keys {
                SecureArgParser::validate_argument(key)?;
            }
            if let Some(ref vendor) = vendor_override {
                SecureArgParser::validate_argument(vendor)?;
            }
            if let Some(ref month) = post_month {
                SecureArgParser::validate_argument(month)?;
            }
            ValidatedCommand::PostEntrata { keys, vendor_override, post_month }
        }
        Commands::Ubi { command } => ValidatedCommand::Ubi {
            command: validate_ubi_command(command)?,
        },
        Commands::ValidateConfig { config } => {
            let validated_config = SecureArgParser::validate_path(&config.to_string_lossy())?;
            ValidatedCommand::ValidateConfig { config: validated_config }
        }
    };

    Ok(ValidatedCli {
        command,
        verbose: cli.verbose,
        config,
        workers: cli.workers,
    })
}
