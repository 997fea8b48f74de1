//! Error types for adapter operations.
//!
//! Each adapter family has its own error enum. The engine records an
//! error's kind and message in the execution log; it never inspects
//! provider internals.

use leadflow_core::LeadId;
use std::fmt;

/// Errors from message, email, and SMS delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The channel or provider is not available.
    ChannelUnavailable { reason: String },
    /// The recipient address/handle was rejected.
    RecipientRejected { reason: String },
    /// Rate limit exceeded.
    RateLimited { retry_after_secs: Option<u64> },
    /// The provider reported a failure.
    ProviderError { reason: String },
    /// Delivery timed out.
    Timeout,
}

impl SendError {
    /// Returns the stable kind name recorded in execution logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ChannelUnavailable { .. } => "channel_unavailable",
            Self::RecipientRejected { .. } => "recipient_rejected",
            Self::RateLimited { .. } => "rate_limited",
            Self::ProviderError { .. } => "provider_error",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChannelUnavailable { reason } => {
                write!(f, "channel unavailable: {reason}")
            }
            Self::RecipientRejected { reason } => {
                write!(f, "recipient rejected: {reason}")
            }
            Self::RateLimited { retry_after_secs } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "rate limited, retry after {secs}s")
                } else {
                    write!(f, "rate limited")
                }
            }
            Self::ProviderError { reason } => write!(f, "provider error: {reason}"),
            Self::Timeout => write!(f, "send timed out"),
        }
    }
}

impl std::error::Error for SendError {}

/// Errors from CRM mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrmError {
    /// The lead does not exist.
    LeadNotFound { lead_id: LeadId },
    /// The target stage is not part of the pipeline.
    UnknownStage { stage: String },
    /// Lead fields failed validation.
    InvalidFields { reason: String },
    /// The CRM backend reported a failure.
    BackendError { reason: String },
    /// The operation timed out.
    Timeout,
}

impl CrmError {
    /// Returns the stable kind name recorded in execution logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LeadNotFound { .. } => "lead_not_found",
            Self::UnknownStage { .. } => "unknown_stage",
            Self::InvalidFields { .. } => "invalid_fields",
            Self::BackendError { .. } => "backend_error",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for CrmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LeadNotFound { lead_id } => write!(f, "lead not found: {lead_id}"),
            Self::UnknownStage { stage } => write!(f, "unknown stage: {stage}"),
            Self::InvalidFields { reason } => write!(f, "invalid lead fields: {reason}"),
            Self::BackendError { reason } => write!(f, "crm backend error: {reason}"),
            Self::Timeout => write!(f, "crm operation timed out"),
        }
    }
}

impl std::error::Error for CrmError {}

/// Errors from outbound HTTP calls.
///
/// A non-2xx response is not a `NetworkError`: the call succeeded at the
/// transport level and the engine decides what the status means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// The URL could not be parsed.
    InvalidUrl { url: String, reason: String },
    /// The connection could not be established.
    ConnectionFailed { reason: String },
    /// The request timed out.
    Timeout,
    /// The response body could not be read.
    InvalidResponse { reason: String },
}

impl NetworkError {
    /// Returns the stable kind name recorded in execution logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidUrl { .. } => "invalid_url",
            Self::ConnectionFailed { .. } => "connection_failed",
            Self::Timeout => "timeout",
            Self::InvalidResponse { .. } => "invalid_response",
        }
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl { url, reason } => write!(f, "invalid url '{url}': {reason}"),
            Self::ConnectionFailed { reason } => write!(f, "connection failed: {reason}"),
            Self::Timeout => write!(f, "request timed out"),
            Self::InvalidResponse { reason } => write!(f, "invalid response: {reason}"),
        }
    }
}

impl std::error::Error for NetworkError {}
