// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Connection failed to endpoint: {0}")]
    Connection(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("External API error: {provider} responded with {status}")]
    ApiCall { provider: String, status: u16 },

    #[error("Validation failed for field {field}: {message}")]
    Validation { field: String, message: String },

    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

/// Failures raised while driving one strategy through the trade pipeline.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Strategy has no session credential")]
    MissingCredential,

    #[error("Session credential is unusable: {0}")]
    InvalidCredential(String),

    #[error("Unknown asset mint {0}")]
    UnknownAsset(String),

    #[error("Invalid trade amount {amount}: {reason}")]
    InvalidAmount { amount: String, reason: String },

    #[error("Insufficient fee reserve. Required: {required} lamports, Available: {available}")]
    InsufficientFeeReserve { required: u64, available: u64 },

    #[error("Transaction {signature} not confirmed after {attempts} attempts")]
    ConfirmationTimeout { signature: String, attempts: u32 },

    #[error("Transaction {signature} failed on-chain: {reason}")]
    OnChainRejected { signature: String, reason: String },

    #[error("{service} request failed: {reason}")]
    Upstream { service: String, reason: String },

    #[error("Chain RPC error: {0}")]
    Chain(String),

    #[error("Privacy pool error: {0}")]
    Pool(String),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl ExecutionError {
    pub fn upstream(service: &str, reason: impl ToString) -> Self {
        ExecutionError::Upstream {
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Short machine-friendly label used in logs and counters.
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionError::MissingCredential
            | ExecutionError::InvalidCredential(_)
            | ExecutionError::UnknownAsset(_)
            | ExecutionError::InvalidAmount { .. }
            | ExecutionError::InsufficientFeeReserve { .. } => "precondition",
            ExecutionError::ConfirmationTimeout { .. } => "confirmation_timeout",
            ExecutionError::OnChainRejected { .. } => "onchain_rejected",
            ExecutionError::Upstream { .. } => "upstream",
            ExecutionError::Chain(_) => "chain",
            ExecutionError::Pool(_) => "pool",
            ExecutionError::Store(_) => "store",
        }
    }
}
