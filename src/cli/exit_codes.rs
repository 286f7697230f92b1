//! Process exit status for scripted use of the decoder

use crate::config::ConfigError;
use std::fmt;
use std::process::ExitCode;

/// Exit status of a CLI run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExitStatus {
    Success = 0,
    Failure = 1,
    InvalidArgs = 2,
    /// A frame was not valid hex
    InvalidInput = 3,
    /// Every frame decoded, at least one with warning diagnostics (`--strict`)
    DecodeWarnings = 4,
    FileNotFound = 6,
    PermissionDenied = 7,
    Config = 8,
    Internal = 127,
}

impl ExitStatus {
    /// Every status, in code order
    pub const ALL: [ExitStatus; 9] = [
        Self::Success,
        Self::Failure,
        Self::InvalidArgs,
        Self::InvalidInput,
        Self::DecodeWarnings,
        Self::FileNotFound,
        Self::PermissionDenied,
        Self::Config,
        Self::Internal,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Failure => "General error",
            Self::InvalidArgs => "Invalid arguments",
            Self::InvalidInput => "Invalid hex input",
            Self::DecodeWarnings => "Decoded with warnings",
            Self::FileNotFound => "File not found",
            Self::PermissionDenied => "Permission denied",
            Self::Config => "Configuration error",
            Self::Internal => "Internal error",
        }
    }

    /// Status for a raw code
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>3}  {}", self.code(), self.description())
    }
}

/// Outcome of a CLI command: a status plus what to tell the user
#[derive(Debug)]
pub struct CliResult {
    pub status: ExitStatus,
    pub message: Option<String>,
}

impl CliResult {
    pub fn success() -> Self {
        Self {
            status: ExitStatus::Success,
            message: None,
        }
    }

    pub fn success_with_message(msg: impl Into<String>) -> Self {
        Self {
            status: ExitStatus::Success,
            message: Some(msg.into()),
        }
    }

    pub fn error(status: ExitStatus, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(msg.into()),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::error(ExitStatus::InvalidInput, msg)
    }

    /// Result of a decode run over `frames` frames, `warned` of them with warnings
    pub fn from_decode(frames: usize, warned: usize, strict: bool) -> Self {
        if strict && warned > 0 {
            Self::error(
                ExitStatus::DecodeWarnings,
                format!("{warned} of {frames} frame(s) decoded with warnings"),
            )
        } else {
            Self::success()
        }
    }

    pub fn code(&self) -> u8 {
        self.status.code()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.status == ExitStatus::Success
    }

    pub fn to_exit_code(&self) -> ExitCode {
        self.status.into()
    }
}

impl From<std::io::Error> for CliResult {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let status = match err.kind() {
            ErrorKind::NotFound => ExitStatus::FileNotFound,
            ErrorKind::PermissionDenied => ExitStatus::PermissionDenied,
            ErrorKind::InvalidData => ExitStatus::InvalidInput,
            _ => ExitStatus::Failure,
        };
        Self::error(status, err.to_string())
    }
}

impl From<ConfigError> for CliResult {
    fn from(err: ConfigError) -> Self {
        let status = match &err {
            ConfigError::Read { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                ExitStatus::FileNotFound
            }
            _ => ExitStatus::Config,
        };
        Self::error(status, err.to_string())
    }
}

/// Description for a raw exit code
pub fn exit_code_description(code: u8) -> &'static str {
    ExitStatus::from_code(code).map_or("Unknown error", ExitStatus::description)
}

/// Print the exit code table
pub fn print_exit_codes() {
    println!("Exit Codes:");
    for status in ExitStatus::ALL {
        println!("  {status}");
    }
}
