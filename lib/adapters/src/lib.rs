//! Action adapter contracts for the leadflow automation engine.
//!
//! Every side effect a workflow node performs goes through one of the
//! narrow adapter interfaces in this crate: outbound messages, CRM
//! mutations, HTTP calls, email, and SMS. The engine only sees the
//! success/failure contract; connection pooling, rate limits, and
//! provider-specific plumbing are the adapter implementation's own
//! concern.
//!
//! The crate ships a production [`HttpCaller`] backed by reqwest and a
//! [`recording::RecordingAdapters`] test double that records every call
//! and returns synthetic successes, used by the dry-run executor and by
//! tests.

pub mod adapter;
pub mod error;
pub mod http;
pub mod recording;

pub use adapter::{
    AdapterSet, CrmAdapter, EmailSender, HttpCallRequest, HttpCallResponse, HttpCaller,
    MessageSender, ProviderMessageId, SmsSender,
};
pub use error::{CrmError, NetworkError, SendError};
pub use http::ReqwestHttpCaller;
pub use recording::{RecordedCall, RecordingAdapters};
