//! Error types for acserverctl

use std::path::PathBuf;

use openracing_acserver_client::ClientError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration file already exists: {}", .0.display())]
    ConfigExists(PathBuf),

    #[error("Report directory is not usable: {}", .0.display())]
    ReportDirectory(PathBuf),
}

/// Process exit code for a failed command.
///
/// Protocol mismatches and configuration problems get their own codes so
/// supervisors can tell a misconfigured server from a crashed one.
pub fn exit_code(error: &anyhow::Error) -> u8 {
    if let Some(client) = error.downcast_ref::<ClientError>() {
        return match client {
            ClientError::ProtocolVersionMismatch { .. } => 3,
            e if e.is_configuration() => 4,
            _ => 1,
        };
    }
    match error.downcast_ref::<CliError>() {
        Some(CliError::ConfigExists(_) | CliError::ReportDirectory(_)) => 4,
        _ => 1,
    }
}
