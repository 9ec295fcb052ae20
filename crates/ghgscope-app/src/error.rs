// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use thiserror::Error;

/// Failure taxonomy for every call that crosses the data-service seam.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The call was rejected, timed out, or returned a non-success status.
    #[error("request failed: {0}")]
    Network(String),
    #[error("unexpected response: {0}")]
    MalformedResponse(String),
    /// The service refused a write; the caller keeps its draft.
    #[error("write rejected: {0}")]
    Validation(String),
    #[error("login failed: {0}")]
    Auth(String),
}

impl ServiceError {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::MalformedResponse(_) => "malformed_response",
            Self::Validation(_) => "validation",
            Self::Auth(_) => "auth",
        }
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
