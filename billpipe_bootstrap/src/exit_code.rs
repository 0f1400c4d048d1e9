// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Exit Code Management
//!
//! Standardized Unix exit codes following BSD `sysexits.h` conventions, so a
//! failed `billpipe` invocation tells a caller (shell script, cron, Step
//! Functions-style orchestrator) what category of failure occurred without
//! parsing stderr text.
//!
//! - **0**: Success
//! - **1**: General error
//! - **64-78**: Specific error conditions (BSD sysexits.h)
//! - **130/143**: Interrupted/terminated by signal

use std::fmt;

/// Exit codes following Unix conventions (BSD sysexits.h)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum ExitCode {
    /// Successful termination (0)
    #[default]
    Success = 0,

    /// General error (1)
    Error = 1,

    /// Command line usage error (64)
    UsageError = 64,

    /// Data format error (65) - malformed LLM reply, bad column count, invalid date
    DataError = 65,

    /// Cannot open input (66) - object not found at the given key
    NoInput = 66,

    /// User does not exist (67)
    NoUser = 67,

    /// Host name unknown (68)
    NoHost = 68,

    /// Service unavailable (69) - LLM/Entrata endpoint unreachable, all keys exhausted
    Unavailable = 69,

    /// Internal software error (70)
    Software = 70,

    /// System error (71)
    OsError = 71,

    /// Critical OS file missing (72) - missing config file
    OsFile = 72,

    /// Cannot create output file (73) - object-store put failed
    CantCreate = 73,

    /// I/O error (74)
    IoError = 74,

    /// Temporary failure, retry (75) - rate-limited, recoverable
    TempFail = 75,

    /// Remote error in protocol (76) - LLM/Entrata schema drift
    Protocol = 76,

    /// Permission denied (77) - access_denied category
    NoPerm = 77,

    /// Configuration error (78)
    Config = 78,

    /// Interrupted by signal (SIGINT - Ctrl+C) (130)
    Interrupted = 130,

    /// Terminated by signal (SIGTERM) (143)
    Terminated = 143,
}

impl ExitCode {
    /// Convert to i32 for use with std::process::exit
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Classify an arbitrary error by matching its `Display` text against
    /// the same category keywords the pipeline's own error taxonomy uses.
    /// Errors bubbling up through `anyhow`/`Box<dyn Error>` at the CLI
    /// boundary don't carry the original `PipelineError` variant, so this is
    /// a best-effort fallback rather than an exhaustive match.
    pub fn from_error(error: &dyn std::error::Error) -> Self {
        let error_string = error.to_string().to_lowercase();

        if error_string.contains("rate limit") || error_string.contains("rate-limit") || error_string.contains("429")
        {
            ExitCode::TempFail
        } else if error_string.contains("permission") || error_string.contains("access denied") {
            ExitCode::NoPerm
        } else if error_string.contains("not found") || error_string.contains("no such") {
            ExitCode::NoInput
        } else if error_string.contains("duplicate") {
            ExitCode::DataError
        } else if error_string.contains("exhausted") {
            ExitCode::Unavailable
        } else if error_string.contains("schema") || error_string.contains("drift") {
            ExitCode::Protocol
        } else if error_string.contains("invalid") || error_string.contains("argument") {
            ExitCode::UsageError
        } else if error_string.contains("parse") || error_string.contains("format") {
            ExitCode::DataError
        } else if error_string.contains("io") || error_string.contains("read") || error_string.contains("write") {
            ExitCode::IoError
        } else if error_string.contains("config") {
            ExitCode::Config
        } else if error_string.contains("unavailable") || error_string.contains("not available") {
            ExitCode::Unavailable
        } else {
            ExitCode::Error
        }
    }

    /// Human-readable description of exit code
    pub fn description(self) -> &'static str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::Error => "General error",
            ExitCode::UsageError => "Command line usage error",
            ExitCode::DataError => "Data format error",
            ExitCode::NoInput => "Cannot open input",
            ExitCode::NoUser => "User does not exist",
            ExitCode::NoHost => "Host name unknown",
            ExitCode::Unavailable => "Service unavailable",
            ExitCode::Software => "Internal software error",
            ExitCode::OsError => "System error",
            ExitCode::OsFile => "Critical OS file missing",
            ExitCode::CantCreate => "Cannot create output file",
            ExitCode::IoError => "I/O error",
            ExitCode::TempFail => "Temporary failure, retry",
            ExitCode::Protocol => "Remote error in protocol",
            ExitCode::NoPerm => "Permission denied",
            ExitCode::Config => "Configuration error",
            ExitCode::Interrupted => "Interrupted by signal (SIGINT)",
            ExitCode::Terminated => "Terminated by signal (SIGTERM)",
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Success)
    }

    pub fn is_error(self) -> bool {
        !self.is_success()
    }

    pub fn is_signal(self) -> bool {
        matches!(self, ExitCode::Interrupted | ExitCode::Terminated)
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_i32())
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code.as_i32()
    }
}

/// Maps any error to its exit code via [`ExitCode::from_error`].
pub fn map_error_to_exit_code<E: std::error::Error>(error: &E) -> ExitCode {
    ExitCode::from_error(error)
}

/// Converts an application `Result` into a `std::process::ExitCode`,
/// logging the error (if any) before returning so the exit code alone
/// doesn't have to carry the diagnostic.
pub fn result_to_exit_code<E: std::error::Error>(result: Result<(), E>) -> std::process::ExitCode {
    match result {
        Ok(()) => std::process::ExitCode::from(ExitCode::Success.as_i32() as u8),
        Err(e) => {
            tracing::error!(error = %e, "billpipe exited with error");
            std::process::ExitCode::from(map_error_to_exit_code(&e).as_i32() as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_values_match_sysexits() {
        assert_eq!(ExitCode::Success.as_i32(), 0);
        assert_eq!(ExitCode::Error.as_i32(), 1);
        assert_eq!(ExitCode::UsageError.as_i32(), 64);
        assert_eq!(ExitCode::Config.as_i32(), 78);
        assert_eq!(ExitCode::Interrupted.as_i32(), 130);
        assert_eq!(ExitCode::Terminated.as_i32(), 143);
    }

    #[test]
    fn is_success_and_is_error_are_complementary() {
        assert!(ExitCode::Success.is_success());
        assert!(!ExitCode::Success.is_error());
        assert!(!ExitCode::Config.is_success());
        assert!(ExitCode::Config.is_error());
    }

    #[test]
    fn is_signal_only_for_interrupted_and_terminated() {
        assert!(ExitCode::Interrupted.is_signal());
        assert!(ExitCode::Terminated.is_signal());
        assert!(!ExitCode::Success.is_signal());
        assert!(!ExitCode::DataError.is_signal());
    }

    #[test]
    fn display_includes_description_and_code() {
        let display = format!("{}", ExitCode::UsageError);
        assert!(display.contains("Command line usage error"));
        assert!(display.contains("64"));
    }

    #[test]
    fn from_error_classifies_rate_limit_as_tempfail() {
        let err = std::io::Error::other("rate limit exceeded, 429 from upstream");
        assert_eq!(ExitCode::from_error(&err), ExitCode::TempFail);
    }

    #[test]
    fn from_error_classifies_not_found() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "object not found");
        assert_eq!(ExitCode::from_error(&err), ExitCode::NoInput);
    }

    #[test]
    fn from_error_classifies_duplicate_as_data_error() {
        let err = std::io::Error::other("duplicate invoice number");
        assert_eq!(ExitCode::from_error(&err), ExitCode::DataError);
    }

    #[test]
    fn default_is_success() {
        assert_eq!(ExitCode::default(), ExitCode::Success);
    }
}
